use std::env;

use log::{error, info};

use entsync_server::{send_event, HandlerError, Handlers, Lifetime, Server, ServerConfig};
use entsync_shared::{component, event, EntityId, Protocol};

const DEFAULT_ADDR: &str = "127.0.0.1:5050";
const LOBBY: EntityId = EntityId::new(1);

component! {
    pub struct Position(1_438_927_221_432) {
        pub x: i32,
        pub y: i32,
    }
}

event! {
    pub struct Chat(1_480_400_000_001) {
        pub text: String,
    }
}

fn protocol() -> Protocol {
    Protocol::builder()
        .add_component::<Position>()
        .add_event::<Chat>()
        .build()
}

fn handlers() -> Handlers {
    let mut handlers = Handlers::new();

    handlers.on_connect(|context| {
        let lobby = context
            .registry
            .get(LOBBY)
            .ok_or_else(|| HandlerError::rejected("lobby not ready"))?;
        context.connection.share(&lobby);
        Ok(())
    });

    handlers.add_event::<Chat>(|context, chat, targets| {
        if chat.text.is_empty() {
            return Err(HandlerError::rejected("empty chat line"));
        }
        info!("{}: says {:?}", context.connection, chat.text);
        send_event(chat.clone(), targets);
        Ok(())
    });

    handlers
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let address = env::var("ENTSYNC_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());

    let server = Server::new(ServerConfig::default(), protocol(), handlers());
    let lobby = match server
        .registry()
        .create_with_id(LOBBY, None, Lifetime::Permanent)
    {
        Ok(lobby) => lobby,
        Err(error) => {
            error!("Cannot create the lobby: {error}");
            return;
        }
    };
    if let Err(error) = lobby.add_component(Position { x: 0, y: 0 }) {
        error!("Cannot set up the lobby: {error}");
        return;
    }

    match server.listen(address.as_str()).await {
        Ok(bound) => info!("Demo server ready on {bound}"),
        Err(error) => {
            error!("Cannot start the demo server on {address}: {error}");
            return;
        }
    }

    if let Err(error) = tokio::signal::ctrl_c().await {
        error!("Cannot listen for ctrl-c: {error}");
    }
    info!("Shutting down");
    server.shutdown();
    // give pipelines the chance to flush `Close`
    tokio::time::sleep(server.config().connection.flush_timeout).await;
}
