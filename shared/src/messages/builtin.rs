crate::event! {
    /// Periodic latency probe sent to every online connection.
    pub struct PingEvent(1_480_326_022_618) {
        pub server_time: i64,
        pub command_id: i8,
    }
}

crate::event! {
    /// Client answer to a [`PingEvent`], echoing its command id.
    pub struct PongEvent(1_480_333_679_186) {
        pub command_id: i8,
    }
}
