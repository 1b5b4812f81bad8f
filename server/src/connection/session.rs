use std::sync::Arc;

use log::info;

use crate::{
    connection::handle::ConnectionHandle,
    world::{entity::EntityRef, entity_registry::EntityRegistry, error::RegistryError},
};

/// The entities a connection is logged in as.
pub struct Session<'a> {
    connection: &'a ConnectionHandle,
    registry: &'a EntityRegistry,
}

impl<'a> Session<'a> {
    pub fn new(connection: &'a ConnectionHandle, registry: &'a EntityRegistry) -> Self {
        Self {
            connection,
            registry,
        }
    }

    pub fn client_session(&self) -> Option<EntityRef> {
        self.connection.client_session()
    }

    pub fn user(&self) -> Option<EntityRef> {
        self.connection.user()
    }

    /// Logs the connection in as `user`.
    ///
    /// `user` is registered as permanent if it is not registered yet. When a
    /// temporary entity with the same id exists, every connection observing it
    /// is moved over to `user` and the temporary entity is dropped. Finally
    /// `user` is shared with this connection.
    pub fn attach_user(&self, user: EntityRef) -> Result<(), RegistryError> {
        let id = user.id();

        let placeholder = match self.registry.get(id) {
            Some(existing) if Arc::ptr_eq(&existing, &user) => None,
            Some(existing) if self.registry.is_temporary(id) => {
                self.registry.try_remove_temporary(id);
                Some(existing)
            }
            Some(_) => return Err(RegistryError::EntityAlreadyExists(id)),
            None => None,
        };
        if !self.registry.contains(id) {
            self.registry.register(user.clone())?;
        }

        if let Some(placeholder) = placeholder {
            for observer in placeholder.shared_players() {
                placeholder.unshare(&observer);
                user.share(&observer);
            }
        }

        if let Some(previous) = self.connection.set_user(user.clone()) {
            if !Arc::ptr_eq(&previous, &user) {
                info!(
                    "{}: replacing user {} with {}",
                    self.connection,
                    previous.id(),
                    id
                );
            }
        }
        user.share(self.connection);
        Ok(())
    }
}
