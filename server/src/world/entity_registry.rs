use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, PoisonError, Weak,
    },
};

use log::debug;

use entsync_shared::{EntityId, TemplateAccessor};

use crate::world::{
    entity::{Entity, EntityRef},
    error::RegistryError,
};

/// How long a registered entity lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifetime {
    /// Reclaimed as soon as its last observer unshares it
    Temporary,
    /// Lives until removed explicitly
    Permanent,
}

#[derive(Default)]
struct EntityMaps {
    permanent: HashMap<EntityId, EntityRef>,
    temporary: HashMap<EntityId, EntityRef>,
}

impl EntityMaps {
    fn get(&self, id: &EntityId) -> Option<&EntityRef> {
        self.permanent.get(id).or_else(|| self.temporary.get(id))
    }
}

/// Owner of every live entity.
///
/// Ids come from a single counter that only moves forward, and is pushed past
/// any id registered from outside, so an id is never handed out twice.
pub struct EntityRegistry {
    maps: RwLock<EntityMaps>,
    free_id: AtomicI64,
    this: Weak<EntityRegistry>,
}

impl EntityRegistry {
    pub fn new() -> Arc<Self> {
        Self::starting_at(1)
    }

    /// A registry whose first allocated id is `first_id`.
    pub fn starting_at(first_id: i64) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            maps: RwLock::new(EntityMaps::default()),
            free_id: AtomicI64::new(first_id),
            this: this.clone(),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, EntityMaps> {
        self.maps.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, EntityMaps> {
        self.maps.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocates a fresh id without creating an entity.
    pub fn next_id(&self) -> EntityId {
        EntityId::new(self.free_id.fetch_add(1, Ordering::SeqCst))
    }

    fn reserve(&self, id: EntityId) {
        self.free_id
            .fetch_max(id.get().saturating_add(1), Ordering::SeqCst);
    }

    // Creation

    /// Creates and registers a temporary entity.
    pub fn create(&self, template: Option<TemplateAccessor>) -> EntityRef {
        self.create_fresh(template, Lifetime::Temporary)
    }

    /// Creates and registers a permanent entity.
    pub fn create_permanent(&self, template: Option<TemplateAccessor>) -> EntityRef {
        self.create_fresh(template, Lifetime::Permanent)
    }

    fn create_fresh(&self, template: Option<TemplateAccessor>, lifetime: Lifetime) -> EntityRef {
        let entity = Arc::new(Entity::new(self.next_id(), template, self.this.clone()));
        let mut maps = self.write();
        let map = match lifetime {
            Lifetime::Temporary => &mut maps.temporary,
            Lifetime::Permanent => &mut maps.permanent,
        };
        map.insert(entity.id(), entity.clone());
        entity
    }

    /// Creates and registers an entity under an id chosen by the caller, such
    /// as one loaded from storage.
    pub fn create_with_id(
        &self,
        id: EntityId,
        template: Option<TemplateAccessor>,
        lifetime: Lifetime,
    ) -> Result<EntityRef, RegistryError> {
        let entity = self.build(id, template);
        self.insert(entity.clone(), lifetime)?;
        Ok(entity)
    }

    /// Builds an entity under `id` without registering it, for callers that
    /// register it later, e.g. through [`Session::attach_user`](crate::Session::attach_user).
    pub fn build(&self, id: EntityId, template: Option<TemplateAccessor>) -> EntityRef {
        Arc::new(Entity::new(id, template, self.this.clone()))
    }

    /// Registers an entity built elsewhere, e.g. by [`Entity::clone_detached`], as permanent.
    pub fn register(&self, entity: EntityRef) -> Result<(), RegistryError> {
        self.insert(entity, Lifetime::Permanent)
    }

    pub fn register_temporary(&self, entity: EntityRef) -> Result<(), RegistryError> {
        self.insert(entity, Lifetime::Temporary)
    }

    fn insert(&self, entity: EntityRef, lifetime: Lifetime) -> Result<(), RegistryError> {
        let id = entity.id();
        let mut maps = self.write();
        if maps.get(&id).is_some() {
            return Err(RegistryError::EntityAlreadyExists(id));
        }

        self.reserve(id);
        match lifetime {
            Lifetime::Temporary => maps.temporary.insert(id, entity),
            Lifetime::Permanent => maps.permanent.insert(id, entity),
        };
        Ok(())
    }

    // Lifecycle

    /// Makes a temporary entity permanent.
    pub fn promote(&self, id: EntityId) -> Result<EntityRef, RegistryError> {
        let mut maps = self.write();
        if maps.permanent.contains_key(&id) {
            return Err(RegistryError::NotTemporary(id));
        }
        let entity = maps
            .temporary
            .remove(&id)
            .ok_or(RegistryError::EntityNotFound(id))?;
        maps.permanent.insert(id, entity.clone());
        Ok(entity)
    }

    /// Removes an entity of either lifetime. Its observers are left untouched.
    pub fn remove(&self, id: EntityId) -> Option<EntityRef> {
        let mut maps = self.write();
        let removed = maps
            .permanent
            .remove(&id)
            .or_else(|| maps.temporary.remove(&id));
        if removed.is_some() {
            debug!("Removed entity {id} from registry");
        }
        removed
    }

    pub fn try_remove_temporary(&self, id: EntityId) -> Option<EntityRef> {
        self.write().temporary.remove(&id)
    }

    /// Removes `id` if it is temporary and nobody observes it any more.
    pub fn reclaim_if_temporary(&self, id: EntityId) -> bool {
        let mut maps = self.write();
        let unobserved = maps
            .temporary
            .get(&id)
            .is_some_and(|entity| entity.is_unobserved());
        if unobserved {
            maps.temporary.remove(&id);
            debug!("Reclaimed temporary entity {id}");
        }
        unobserved
    }

    // Lookup

    pub fn get(&self, id: EntityId) -> Option<EntityRef> {
        self.read().get(&id).cloned()
    }

    pub fn try_get_temporary(&self, id: EntityId) -> Option<EntityRef> {
        self.read().temporary.get(&id).cloned()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.read().get(&id).is_some()
    }

    pub fn is_temporary(&self, id: EntityId) -> bool {
        self.read().temporary.contains_key(&id)
    }

    /// Number of live entities of both lifetimes
    pub fn len(&self) -> usize {
        let maps = self.read();
        maps.permanent.len() + maps.temporary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn temporary_len(&self) -> usize {
        self.read().temporary.len()
    }
}
