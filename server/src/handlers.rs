use std::{collections::HashMap, sync::Arc, time::Instant};

use log::{debug, error, warn};

use entsync_shared::{Component, ComponentKind, Event, Message, PongEvent, ProtocolId};

use crate::{
    connection::{disconnect_reason::DisconnectReason, handle::ConnectionHandle, session::Session},
    error::HandlerError,
    world::{entity::EntityRef, entity_registry::EntityRegistry},
};

type EventFn = Box<
    dyn Fn(&HandlerContext, &dyn Message, &[EntityRef]) -> Result<(), HandlerError> + Send + Sync,
>;
type ComponentFn = Box<
    dyn Fn(&HandlerContext, &EntityRef, ComponentAction) -> Result<(), HandlerError> + Send + Sync,
>;
type ConnectFn = Box<dyn Fn(&HandlerContext) -> Result<(), HandlerError> + Send + Sync>;
type DisconnectFn = Box<dyn Fn(&HandlerContext, &DisconnectReason) + Send + Sync>;
type TickFn = Box<dyn Fn(&Arc<EntityRegistry>) -> Result<(), HandlerError> + Send + Sync>;

/// What a client did to a component, as reported to component hooks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentAction {
    Added,
    Changed,
    Removed,
}

/// The connection a handler runs for, and the registry it may mutate.
pub struct HandlerContext<'a> {
    pub connection: &'a ConnectionHandle,
    pub registry: &'a Arc<EntityRegistry>,
}

impl<'a> HandlerContext<'a> {
    pub fn session(&self) -> Session<'a> {
        Session::new(self.connection, self.registry)
    }
}

struct EventEntry {
    name: &'static str,
    handler: EventFn,
}

/// Maps protocol ids to effects: what to do when a client sends an event or
/// touches a component, plus connection lifecycle and tick hooks.
pub struct Handlers {
    events: HashMap<ProtocolId, EventEntry>,
    components: HashMap<ComponentKind, Vec<ComponentFn>>,
    connect: Vec<ConnectFn>,
    disconnect: Vec<DisconnectFn>,
    tick: Vec<TickFn>,
}

impl Handlers {
    /// Handlers with the built-in pong handler that measures connection ping.
    pub fn new() -> Self {
        let mut handlers = Self {
            events: HashMap::new(),
            components: HashMap::new(),
            connect: Vec::new(),
            disconnect: Vec::new(),
            tick: Vec::new(),
        };

        handlers.add_event::<PongEvent>(|context, pong, _| {
            if let Some(ping) = context
                .connection
                .record_pong(pong.command_id, Instant::now())
            {
                debug!("{}: ping {}ms", context.connection, ping.as_millis());
            }
            Ok(())
        });

        handlers
    }

    /// Registers the handler for events of type `E`, replacing any previous one.
    pub fn add_event<E: Event>(
        &mut self,
        handler: impl Fn(&HandlerContext, &E, &[EntityRef]) -> Result<(), HandlerError>
            + Send
            + Sync
            + 'static,
    ) -> &mut Self {
        let erased: EventFn = Box::new(
            move |context: &HandlerContext, event: &dyn Message, entities: &[EntityRef]| match event
                .as_any()
                .downcast_ref::<E>()
            {
                Some(event) => handler(context, event, entities),
                None => Err(HandlerError::rejected(format!(
                    "event {} is not a {}",
                    event.name(),
                    E::NAME
                ))),
            },
        );

        let previous = self.events.insert(
            E::PROTOCOL_ID,
            EventEntry {
                name: E::NAME,
                handler: erased,
            },
        );
        if let Some(previous) = previous {
            warn!("Replacing handler for event {} with {}", previous.name, E::NAME);
        }
        self
    }

    /// Adds a hook that runs after a client added, changed or removed a `C`.
    pub fn on_component<C: Component>(
        &mut self,
        hook: impl Fn(&HandlerContext, &EntityRef, ComponentAction) -> Result<(), HandlerError>
            + Send
            + Sync
            + 'static,
    ) -> &mut Self {
        self.components
            .entry(C::kind())
            .or_default()
            .push(Box::new(hook));
        self
    }

    pub fn on_connect(
        &mut self,
        hook: impl Fn(&HandlerContext) -> Result<(), HandlerError> + Send + Sync + 'static,
    ) -> &mut Self {
        self.connect.push(Box::new(hook));
        self
    }

    pub fn on_disconnect(
        &mut self,
        hook: impl Fn(&HandlerContext, &DisconnectReason) + Send + Sync + 'static,
    ) -> &mut Self {
        self.disconnect.push(Box::new(hook));
        self
    }

    pub fn on_tick(
        &mut self,
        hook: impl Fn(&Arc<EntityRegistry>) -> Result<(), HandlerError> + Send + Sync + 'static,
    ) -> &mut Self {
        self.tick.push(Box::new(hook));
        self
    }

    pub fn has_event(&self, id: &ProtocolId) -> bool {
        self.events.contains_key(id)
    }

    // Dispatch

    /// Runs the handler registered for the event's protocol id; `None` when
    /// there is none.
    pub(crate) fn dispatch_event(
        &self,
        context: &HandlerContext,
        event: &dyn Message,
        entities: &[EntityRef],
    ) -> Option<Result<(), HandlerError>> {
        let entry = self.events.get(&event.protocol_id())?;
        Some((entry.handler)(context, event, entities))
    }

    /// Runs the component hooks in registration order, stopping at the first failure.
    pub(crate) fn component_hooks(
        &self,
        context: &HandlerContext,
        entity: &EntityRef,
        kind: ComponentKind,
        action: ComponentAction,
    ) -> Result<(), HandlerError> {
        let Some(hooks) = self.components.get(&kind) else {
            return Ok(());
        };
        for hook in hooks {
            hook(context, entity, action)?;
        }
        Ok(())
    }

    pub(crate) fn connected(&self, context: &HandlerContext) -> Result<(), HandlerError> {
        for hook in &self.connect {
            hook(context)?;
        }
        Ok(())
    }

    pub(crate) fn disconnected(&self, context: &HandlerContext, reason: &DisconnectReason) {
        for hook in &self.disconnect {
            hook(context, reason);
        }
    }

    /// Runs every tick hook; failures are logged and do not stop the others.
    pub(crate) fn tick(&self, registry: &Arc<EntityRegistry>) {
        for hook in &self.tick {
            if let Err(error) = hook(registry) {
                error!("Tick hook failed: {error}");
            }
        }
    }
}

impl Default for Handlers {
    fn default() -> Self {
        Self::new()
    }
}
