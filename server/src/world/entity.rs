use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use log::debug;

use entsync_shared::{
    Command, Component, ComponentKind, EntityId, Event, Replicate, TemplateAccessor,
};

use crate::{
    connection::handle::{ConnectionHandle, ConnectionKey},
    world::{entity_registry::EntityRegistry, error::EntityError},
};

pub type EntityRef = Arc<Entity>;

#[derive(Default)]
struct EntityState {
    components: BTreeMap<ComponentKind, Box<dyn Replicate>>,
    shared_players: BTreeMap<ConnectionKey, ConnectionHandle>,
}

impl EntityState {
    /// Queues `command` for every observer except `excluded`, in key order.
    fn broadcast(&self, excluded: Option<ConnectionKey>, command: &Command) {
        for (key, connection) in &self.shared_players {
            if Some(*key) == excluded {
                continue;
            }
            connection.send(command.clone());
        }
    }
}

/// An identity, at most one component per kind, and the connections observing it.
///
/// Every mutation locks the entity, applies the change and queues the matching
/// command for each observer before unlocking, so all observers see the
/// changes of one entity in the same order.
pub struct Entity {
    id: EntityId,
    template: Option<TemplateAccessor>,
    state: Mutex<EntityState>,
    registry: Weak<EntityRegistry>,
}

impl Entity {
    pub(crate) fn new(
        id: EntityId,
        template: Option<TemplateAccessor>,
        registry: Weak<EntityRegistry>,
    ) -> Self {
        Self {
            id,
            template,
            state: Mutex::new(EntityState::default()),
            registry,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn template(&self) -> Option<&TemplateAccessor> {
        self.template.as_ref()
    }

    fn state(&self) -> MutexGuard<'_, EntityState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Components

    pub fn add_component<C: Component>(&self, component: C) -> Result<(), EntityError> {
        self.add_component_excluding(Box::new(component), None)
    }

    /// Adds a component, notifying every observer except `excluded`.
    pub fn add_component_excluding(
        &self,
        component: Box<dyn Replicate>,
        excluded: Option<ConnectionKey>,
    ) -> Result<(), EntityError> {
        let mut state = self.state();
        let kind = component.kind();
        if state.components.contains_key(&kind) {
            return Err(EntityError::DuplicateComponent {
                entity: self.id,
                kind,
                name: component.name(),
            });
        }

        state.broadcast(
            excluded,
            &Command::ComponentAdd {
                entity: self.id,
                component: component.clone(),
            },
        );
        state.components.insert(kind, component);
        Ok(())
    }

    /// Mutates a component in place and replicates the new value to every observer.
    pub fn change_component<C: Component>(
        &self,
        change: impl FnOnce(&mut C),
    ) -> Result<(), EntityError> {
        let mut state = self.state();
        let kind = C::kind();
        let Some(stored) = state.components.get_mut(&kind) else {
            return Err(EntityError::MissingComponent {
                entity: self.id,
                kind,
            });
        };
        let Some(component) = stored.downcast_mut::<C>() else {
            return Err(EntityError::ComponentTypeMismatch {
                entity: self.id,
                kind,
                expected: C::NAME,
            });
        };

        change(component);
        let command = Command::ComponentChange {
            entity: self.id,
            component: Box::new(component.clone()),
        };
        state.broadcast(None, &command);
        Ok(())
    }

    /// Replaces a component as a whole, notifying every observer except `excluded`.
    pub fn replace_component(
        &self,
        component: Box<dyn Replicate>,
        excluded: Option<ConnectionKey>,
    ) -> Result<(), EntityError> {
        let mut state = self.state();
        let kind = component.kind();
        if !state.components.contains_key(&kind) {
            return Err(EntityError::MissingComponent {
                entity: self.id,
                kind,
            });
        }

        state.broadcast(
            excluded,
            &Command::ComponentChange {
                entity: self.id,
                component: component.clone(),
            },
        );
        state.components.insert(kind, component);
        Ok(())
    }

    pub fn remove_component<C: Component>(&self) -> Result<C, EntityError> {
        let mut state = self.state();
        let kind = C::kind();
        let removed = match state.components.get(&kind) {
            None => {
                return Err(EntityError::MissingComponent {
                    entity: self.id,
                    kind,
                })
            }
            Some(stored) => stored.downcast_ref::<C>().cloned(),
        };
        let Some(removed) = removed else {
            return Err(EntityError::ComponentTypeMismatch {
                entity: self.id,
                kind,
                expected: C::NAME,
            });
        };

        self.remove_locked(&mut state, kind, None)?;
        Ok(removed)
    }

    /// Removes a component by kind, notifying every observer except `excluded`.
    pub fn remove_component_kind(
        &self,
        kind: ComponentKind,
        excluded: Option<ConnectionKey>,
    ) -> Result<Box<dyn Replicate>, EntityError> {
        let mut state = self.state();
        self.remove_locked(&mut state, kind, excluded)
    }

    fn remove_locked(
        &self,
        state: &mut EntityState,
        kind: ComponentKind,
        excluded: Option<ConnectionKey>,
    ) -> Result<Box<dyn Replicate>, EntityError> {
        let Some(removed) = state.components.remove(&kind) else {
            return Err(EntityError::MissingComponent {
                entity: self.id,
                kind,
            });
        };

        state.broadcast(
            excluded,
            &Command::ComponentRemove {
                entity: self.id,
                kind,
            },
        );
        Ok(removed)
    }

    pub fn has_component<C: Component>(&self) -> bool {
        self.has_kind(&C::kind())
    }

    pub fn has_kind(&self, kind: &ComponentKind) -> bool {
        self.state().components.contains_key(kind)
    }

    /// Returns a copy of the component.
    pub fn get_component<C: Component>(&self) -> Result<C, EntityError> {
        let state = self.state();
        let kind = C::kind();
        let Some(stored) = state.components.get(&kind) else {
            return Err(EntityError::MissingComponent {
                entity: self.id,
                kind,
            });
        };
        stored
            .downcast_ref::<C>()
            .cloned()
            .ok_or(EntityError::ComponentTypeMismatch {
                entity: self.id,
                kind,
                expected: C::NAME,
            })
    }

    /// Snapshot of every component, ordered by kind.
    pub fn components(&self) -> Vec<Box<dyn Replicate>> {
        self.state().components.values().cloned().collect()
    }

    pub fn component_count(&self) -> usize {
        self.state().components.len()
    }

    // Observers

    /// Starts replicating this entity to `connection`, sending it the full
    /// current state. Sharing twice is a no-op; returns whether this call shared.
    pub fn share(self: &Arc<Self>, connection: &ConnectionHandle) -> bool {
        let mut state = self.state();
        let key = connection.key();
        if state.shared_players.contains_key(&key) {
            return false;
        }
        if !connection.track(self.id, Arc::downgrade(self)) {
            debug!("{connection}: not sharing entity {}, connection is closing", self.id);
            return false;
        }

        state.shared_players.insert(key, connection.clone());
        connection.send(Command::EntityShare {
            entity: self.id,
            template: self.template.clone(),
            components: state.components.values().cloned().collect(),
        });
        true
    }

    /// Stops replicating this entity to `connection`. A temporary entity left
    /// without observers is reclaimed by its registry. Returns whether this
    /// call unshared.
    pub fn unshare(&self, connection: &ConnectionHandle) -> bool {
        let unobserved = {
            let mut state = self.state();
            if state.shared_players.remove(&connection.key()).is_none() {
                return false;
            }
            connection.untrack(self.id);
            connection.send(Command::EntityUnshare { entity: self.id });
            state.shared_players.is_empty()
        };

        // registry locks come before entity locks, so reclaim after unlocking
        if unobserved {
            if let Some(registry) = self.registry.upgrade() {
                registry.reclaim_if_temporary(self.id);
            }
        }
        true
    }

    /// Forgets an observer without notifying it; used when its connection is gone.
    pub(crate) fn detach(&self, key: ConnectionKey) -> bool {
        self.state().shared_players.remove(&key).is_some()
    }

    pub fn shared_players(&self) -> Vec<ConnectionHandle> {
        self.state().shared_players.values().cloned().collect()
    }

    pub fn is_shared_with(&self, key: ConnectionKey) -> bool {
        self.state().shared_players.contains_key(&key)
    }

    pub fn observer_count(&self) -> usize {
        self.state().shared_players.len()
    }

    pub fn is_unobserved(&self) -> bool {
        self.state().shared_players.is_empty()
    }

    /// Sends an event about this entity to every observer.
    pub fn send<E: Event>(&self, event: E) {
        let state = self.state();
        state.broadcast(None, &Command::send_event(event, vec![self.id]));
    }

    /// Copies this entity under a fresh id. The copy has no observers and is
    /// not registered.
    pub fn clone_detached(&self) -> Result<EntityRef, EntityError> {
        let registry = self
            .registry
            .upgrade()
            .ok_or(EntityError::RegistryUnavailable { entity: self.id })?;
        let components = self.state().components.clone();

        Ok(Arc::new(Self {
            id: registry.next_id(),
            template: self.template.clone(),
            state: Mutex::new(EntityState {
                components,
                shared_players: BTreeMap::new(),
            }),
            registry: self.registry.clone(),
        }))
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("template", &self.template)
            .finish()
    }
}

/// Sends one event concerning `targets` to the union of their observers; a
/// connection observing several targets receives it once. Returns the number
/// of recipients.
pub fn send_event<E: Event>(event: E, targets: &[EntityRef]) -> usize {
    let mut recipients = BTreeMap::new();
    for target in targets {
        for connection in target.shared_players() {
            recipients.entry(connection.key()).or_insert(connection);
        }
    }

    let command = Command::send_event(event, targets.iter().map(|target| target.id()).collect());
    for connection in recipients.values() {
        connection.send(command.clone());
    }
    recipients.len()
}
