use entsync_shared::{component, event, Protocol};

component! {
    /// Hit points of a tank
    pub struct Health(1_438_927_221_431) {
        pub current: f32,
        pub max: f32,
    }
}

component! {
    pub struct Position(1_438_927_221_432) {
        pub x: i32,
        pub y: i32,
    }
}

component! {
    pub struct Name(1_438_927_221_433) {
        pub value: String,
    }
}

event! {
    /// Chat line addressed to the target entities
    pub struct Chat(1_480_400_000_001) {
        pub text: String,
    }
}

event! {
    /// Asks the server to log the connection in as the user with this id
    pub struct Login(1_480_400_000_002) {
        pub user_id: i64,
        pub nickname: String,
    }
}

event! {
    /// Sent by tests to mark a point in a connection's outbound stream
    pub struct Barrier(1_480_400_000_003) {
        pub sequence: u32,
    }
}

/// The protocol every end-to-end test runs with.
pub fn protocol() -> Protocol {
    Protocol::builder()
        .add_component::<Health>()
        .add_component::<Position>()
        .add_component::<Name>()
        .add_event::<Chat>()
        .add_event::<Login>()
        .add_event::<Barrier>()
        .build()
}
