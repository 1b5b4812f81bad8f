use entsync_shared::{Command, Component, EntityId, Replicate};

/// The components carried by an `EntityShare` of `entity`; panics on any
/// other command.
pub fn share_snapshot(command: &Command, entity: EntityId) -> &[Box<dyn Replicate>] {
    match command {
        Command::EntityShare {
            entity: shared,
            components,
            ..
        } if *shared == entity => components,
        other => panic!("expected EntityShare of {entity}, got {other}"),
    }
}

/// The `C` carried by a ComponentAdd or ComponentChange.
pub fn component_of<C: Component>(command: &Command) -> Option<C> {
    match command {
        Command::ComponentAdd { component, .. } | Command::ComponentChange { component, .. } => {
            component.downcast_ref::<C>().cloned()
        }
        _ => None,
    }
}
