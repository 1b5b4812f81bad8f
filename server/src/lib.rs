//! # Entsync Server
//! A TCP game server core: clients observe a shared world of entities and
//! mutate it with commands, and every change is replicated to exactly the
//! connections observing the entity it touched.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

pub mod shared {
    pub use entsync_shared::{
        Command, CommandCode, Component, ComponentKind, EntityId, Event, PingEvent, PongEvent,
        Protocol, ProtocolId, Replicate, TemplateAccessor, Timestamp,
    };
}

mod connection;
mod error;
mod executor;
mod handlers;
mod server;
mod world;

pub use connection::{
    connection_config::ConnectionConfig,
    disconnect_reason::DisconnectReason,
    handle::{ConnectionHandle, ConnectionKey, ConnectionPhase},
    io::is_disconnect,
    ping_config::PingConfig,
    queue::{monitored_channel, MonitoredReceiver, MonitoredSender},
    session::Session,
};
pub use error::{ExecuteError, HandlerError, ServerError};
pub use handlers::{ComponentAction, HandlerContext, Handlers};
pub use server::{Server, ServerConfig};
pub use world::{
    entity::{send_event, Entity, EntityRef},
    entity_registry::{EntityRegistry, Lifetime},
    error::{EntityError, RegistryError},
};
