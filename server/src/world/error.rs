use thiserror::Error;

use entsync_shared::{ComponentKind, EntityId};

/// Errors raised by the mutation API of a single entity
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntityError {
    /// Entity already holds a component of this kind
    #[error("Entity {entity} already has component {name} ({kind})")]
    DuplicateComponent {
        entity: EntityId,
        kind: ComponentKind,
        name: &'static str,
    },

    /// Entity holds no component of this kind
    #[error("Entity {entity} has no component {kind}")]
    MissingComponent {
        entity: EntityId,
        kind: ComponentKind,
    },

    /// Stored component is not of the requested Rust type
    #[error("Component {kind} on entity {entity} is not a {expected}")]
    ComponentTypeMismatch {
        entity: EntityId,
        kind: ComponentKind,
        expected: &'static str,
    },

    /// The registry that created this entity has been dropped
    #[error("Entity {entity} outlived its registry")]
    RegistryUnavailable { entity: EntityId },
}

/// Errors raised by [`EntityRegistry`](crate::EntityRegistry) lookups and lifecycle changes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Entity {0} is not registered")]
    EntityNotFound(EntityId),

    #[error("An entity with id {0} is already registered")]
    EntityAlreadyExists(EntityId),

    #[error("Entity {0} is permanent, only temporary entities can be promoted")]
    NotTemporary(EntityId),
}
