use std::sync::Arc;

use log::warn;

use entsync_shared::{Command, ComponentKind, EntityId};

use crate::{
    connection::handle::ConnectionHandle,
    error::ExecuteError,
    handlers::{ComponentAction, HandlerContext, Handlers},
    world::{entity::EntityRef, entity_registry::EntityRegistry},
};

/// Applies commands received from a client.
pub(crate) struct CommandExecutor {
    registry: Arc<EntityRegistry>,
    handlers: Arc<Handlers>,
}

impl CommandExecutor {
    pub fn new(registry: Arc<EntityRegistry>, handlers: Arc<Handlers>) -> Self {
        Self { registry, handlers }
    }

    pub fn execute(
        &self,
        connection: &ConnectionHandle,
        command: Command,
    ) -> Result<(), ExecuteError> {
        let code = command.code();
        if !code.is_client_allowed() {
            return Err(ExecuteError::ServerOnlyCommand { code });
        }

        let context = HandlerContext {
            connection,
            registry: &self.registry,
        };

        match command {
            Command::SendEvent { event, entities } => {
                let targets = entities
                    .into_iter()
                    .map(|entity| shared_entity(connection, entity))
                    .collect::<Result<Vec<_>, _>>()?;

                match self.handlers.dispatch_event(&context, event.as_ref(), &targets) {
                    Some(result) => result.map_err(|source| ExecuteError::Handler {
                        name: event.name(),
                        source,
                    }),
                    None => {
                        warn!(
                            "{connection}: no handler for event {} ({}), ignoring",
                            event.name(),
                            event.protocol_id()
                        );
                        Ok(())
                    }
                }
            }
            Command::ComponentAdd { entity, component } => {
                let entity = shared_entity(connection, entity)?;
                let (kind, name) = (component.kind(), component.name());
                entity.add_component_excluding(component, Some(connection.key()))?;
                self.run_hooks(&context, &entity, kind, name, ComponentAction::Added)
            }
            Command::ComponentChange { entity, component } => {
                let entity = shared_entity(connection, entity)?;
                let (kind, name) = (component.kind(), component.name());
                entity.replace_component(component, Some(connection.key()))?;
                self.run_hooks(&context, &entity, kind, name, ComponentAction::Changed)
            }
            Command::ComponentRemove { entity, kind } => {
                let entity = shared_entity(connection, entity)?;
                let removed = entity.remove_component_kind(kind, Some(connection.key()))?;
                self.run_hooks(&context, &entity, kind, removed.name(), ComponentAction::Removed)
            }
            Command::EntityShare { .. }
            | Command::EntityUnshare { .. }
            | Command::InitTime { .. }
            | Command::Close { .. } => Err(ExecuteError::ServerOnlyCommand { code }),
        }
    }

    fn run_hooks(
        &self,
        context: &HandlerContext,
        entity: &EntityRef,
        kind: ComponentKind,
        name: &'static str,
        action: ComponentAction,
    ) -> Result<(), ExecuteError> {
        self.handlers
            .component_hooks(context, entity, kind, action)
            .map_err(|source| ExecuteError::Handler { name, source })
    }
}

fn shared_entity(
    connection: &ConnectionHandle,
    entity: EntityId,
) -> Result<EntityRef, ExecuteError> {
    connection
        .shared_entity(entity)
        .ok_or(ExecuteError::EntityNotShared { entity })
}
