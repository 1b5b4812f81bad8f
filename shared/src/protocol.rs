use log::debug;

use crate::{
    connection::compression_config::CompressionConfig,
    messages::{
        builtin::{PingEvent, PongEvent},
        event::Event,
        event_kinds::EventKinds,
    },
    world::component::{component_kinds::ComponentKinds, replicate::Component},
};

pub mod error;
pub use error::ProtocolError;

// Protocol Plugin
pub trait ProtocolPlugin {
    fn build(&self, protocol: &mut Protocol);
}

// Protocol
pub struct Protocol {
    pub component_kinds: ComponentKinds,
    pub event_kinds: EventKinds,
    /// Configuration used to control compression parameters
    pub compression: Option<CompressionConfig>,
    locked: bool,
}

impl Default for Protocol {
    fn default() -> Self {
        let mut event_kinds = EventKinds::new();
        for result in [
            event_kinds.add_event::<PingEvent>(),
            event_kinds.add_event::<PongEvent>(),
        ] {
            debug_assert!(result.is_ok(), "built-in events have distinct ids");
        }

        Self {
            component_kinds: ComponentKinds::new(),
            event_kinds,
            compression: None,
            locked: false,
        }
    }
}

impl Protocol {
    pub fn builder() -> Self {
        Self::default()
    }

    pub fn add_plugin<P: ProtocolPlugin>(&mut self, plugin: P) -> &mut Self {
        self.check_lock();
        plugin.build(self);
        self
    }

    pub fn compression(&mut self, config: CompressionConfig) -> &mut Self {
        self.check_lock();
        self.compression = Some(config);
        self
    }

    /// Registers a component type. Panics if the protocol is locked or the
    /// protocol id is taken; use [`Protocol::try_add_component`] to handle that.
    pub fn add_component<C: Component>(&mut self) -> &mut Self {
        if let Err(error) = self.try_add_component::<C>() {
            panic!("{error}");
        }
        self
    }

    /// Registers an event type. Panics if the protocol is locked or the
    /// protocol id is taken; use [`Protocol::try_add_event`] to handle that.
    pub fn add_event<E: Event>(&mut self) -> &mut Self {
        if let Err(error) = self.try_add_event::<E>() {
            panic!("{error}");
        }
        self
    }

    // Non-panicking builder methods

    pub fn try_add_plugin<P: ProtocolPlugin>(
        &mut self,
        plugin: P,
    ) -> Result<&mut Self, ProtocolError> {
        self.try_check_lock()?;
        plugin.build(self);
        Ok(self)
    }

    pub fn try_compression(
        &mut self,
        config: CompressionConfig,
    ) -> Result<&mut Self, ProtocolError> {
        self.try_check_lock()?;
        self.compression = Some(config);
        Ok(self)
    }

    pub fn try_add_component<C: Component>(&mut self) -> Result<&mut Self, ProtocolError> {
        self.try_check_lock()?;
        self.component_kinds.add_component::<C>()?;
        Ok(self)
    }

    pub fn try_add_event<E: Event>(&mut self) -> Result<&mut Self, ProtocolError> {
        self.try_check_lock()?;
        self.event_kinds.add_event::<E>()?;
        Ok(self)
    }

    pub fn try_lock(&mut self) -> Result<(), ProtocolError> {
        self.try_check_lock()?;
        self.locked = true;
        Ok(())
    }

    /// Locks the protocol against further registration. Locking twice is a no-op.
    pub fn lock(&mut self) {
        if !self.locked {
            debug!(
                "Protocol locked with {} components and {} events",
                self.component_kinds.len(),
                self.event_kinds.len()
            );
        }
        self.locked = true;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Checks if protocol is locked without panicking
    /// Returns Err if protocol is locked
    pub fn try_check_lock(&self) -> Result<(), ProtocolError> {
        if self.locked {
            Err(ProtocolError::AlreadyLocked)
        } else {
            Ok(())
        }
    }

    /// Checks if protocol is locked, panics if it is
    pub fn check_lock(&self) {
        if self.locked {
            panic!("Protocol already locked!");
        }
    }

    pub fn build(&mut self) -> Self {
        std::mem::take(self)
    }
}
