use std::io;

use thiserror::Error;

use entsync_shared::{CommandCode, EntityId};

use crate::world::error::{EntityError, RegistryError};

/// Failure reported by a collaborator's handler or hook
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Rejected(String),

    #[error(transparent)]
    Entity(#[from] EntityError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl HandlerError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(reason.into())
    }
}

/// Errors local to one inbound command. The execute stage logs them and moves
/// on to the next command.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// Client referenced an entity it does not observe
    #[error("Entity {entity} is not shared with this connection")]
    EntityNotShared { entity: EntityId },

    /// Client sent a command only the server may send
    #[error("{code} may only be sent by the server")]
    ServerOnlyCommand { code: CommandCode },

    #[error(transparent)]
    Entity(#[from] EntityError),

    /// A registered handler or hook failed
    #[error("Handler for {name} failed: {source}")]
    Handler {
        name: &'static str,
        #[source]
        source: HandlerError,
    },
}

/// Errors that stop the server from accepting connections
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind listener: {0}")]
    Bind(#[source] io::Error),

    #[error("Failed to read listener address: {0}")]
    LocalAddr(#[source] io::Error),

    #[error("Server is already serving a listener")]
    AlreadyStarted,
}
