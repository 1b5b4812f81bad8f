use std::{any::Any, fmt::Debug};

use entsync_serde::{ByteWrite, Serde};

use crate::ProtocolId;

/// A one-shot notification. Events are delivered through `SendEvent` and never
/// stored on an entity.
pub trait Event: Serde + Debug + Send + Sync + 'static {
    const PROTOCOL_ID: ProtocolId;
    const NAME: &'static str;
}

/// Type-erased view of an [`Event`].
pub trait Message: Debug + Send + Sync + 'static {
    fn protocol_id(&self) -> ProtocolId;
    fn name(&self) -> &'static str;
    /// Writes the fields only; the protocol id is written by the caller
    fn write(&self, writer: &mut dyn ByteWrite);
    fn copy_to_box(&self) -> Box<dyn Message>;
    fn equals(&self, other: &dyn Message) -> bool;
    fn as_any(&self) -> &dyn Any;
}

impl<E: Event> Message for E {
    fn protocol_id(&self) -> ProtocolId {
        E::PROTOCOL_ID
    }

    fn name(&self) -> &'static str {
        E::NAME
    }

    fn write(&self, writer: &mut dyn ByteWrite) {
        self.ser(writer);
    }

    fn copy_to_box(&self) -> Box<dyn Message> {
        Box::new(self.clone())
    }

    fn equals(&self, other: &dyn Message) -> bool {
        other
            .as_any()
            .downcast_ref::<E>()
            .is_some_and(|other| self == other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl dyn Message {
    pub fn downcast_ref<E: Event>(&self) -> Option<&E> {
        self.as_any().downcast_ref::<E>()
    }
}

impl Clone for Box<dyn Message> {
    fn clone(&self) -> Self {
        self.copy_to_box()
    }
}

impl PartialEq for Box<dyn Message> {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other.as_ref())
    }
}

/// Declares an event struct bound to a protocol id. Same syntax as
/// [`component!`](crate::component).
#[macro_export]
macro_rules! event {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident ($id:expr) {
            $( $(#[$field_meta:meta])* $field_vis:vis $field:ident : $field_ty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq)]
        $vis struct $name {
            $( $(#[$field_meta])* $field_vis $field: $field_ty, )*
        }

        $crate::__wire_struct!($name { $($field : $field_ty),* });

        impl $crate::Event for $name {
            const PROTOCOL_ID: $crate::ProtocolId = $crate::ProtocolId::new($id);
            const NAME: &'static str = stringify!($name);
        }
    };
}
