use std::{any::Any, fmt::Debug};

use entsync_serde::{ByteWrite, Serde};

use crate::{world::component::component_kinds::ComponentKind, ProtocolId};

/// A typed value attached to an entity, replaced as a whole on change.
///
/// Declare components with the [`component!`](crate::component) macro, which
/// derives the wire layout from the field order.
pub trait Component: Serde + Debug + Send + Sync + 'static {
    const PROTOCOL_ID: ProtocolId;
    const NAME: &'static str;

    fn kind() -> ComponentKind {
        ComponentKind::new(Self::PROTOCOL_ID)
    }
}

/// Type-erased view of a [`Component`], as stored on entities and carried in commands.
pub trait Replicate: Debug + Send + Sync + 'static {
    fn kind(&self) -> ComponentKind;
    fn name(&self) -> &'static str;
    /// Writes the fields only; the protocol id is written by the caller
    fn write(&self, writer: &mut dyn ByteWrite);
    fn copy_to_box(&self) -> Box<dyn Replicate>;
    fn equals(&self, other: &dyn Replicate) -> bool;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<C: Component> Replicate for C {
    fn kind(&self) -> ComponentKind {
        C::kind()
    }

    fn name(&self) -> &'static str {
        C::NAME
    }

    fn write(&self, writer: &mut dyn ByteWrite) {
        self.ser(writer);
    }

    fn copy_to_box(&self) -> Box<dyn Replicate> {
        Box::new(self.clone())
    }

    fn equals(&self, other: &dyn Replicate) -> bool {
        other
            .as_any()
            .downcast_ref::<C>()
            .is_some_and(|other| self == other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl dyn Replicate {
    pub fn downcast_ref<C: Component>(&self) -> Option<&C> {
        self.as_any().downcast_ref::<C>()
    }

    pub fn downcast_mut<C: Component>(&mut self) -> Option<&mut C> {
        self.as_any_mut().downcast_mut::<C>()
    }
}

impl Clone for Box<dyn Replicate> {
    fn clone(&self) -> Self {
        self.copy_to_box()
    }
}

impl PartialEq for Box<dyn Replicate> {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other.as_ref())
    }
}

/// Implements [`Serde`] for a plain struct by writing its fields in declaration order.
#[doc(hidden)]
#[macro_export]
macro_rules! __wire_struct {
    ($name:ident { $($field:ident : $field_ty:ty),* }) => {
        impl $crate::Serde for $name {
            #[allow(unused_variables)]
            fn ser(&self, writer: &mut dyn $crate::ByteWrite) {
                $( $crate::Serde::ser(&self.$field, writer); )*
            }

            #[allow(unused_variables)]
            fn de(reader: &mut $crate::ByteReader) -> Result<Self, $crate::SerdeErr> {
                Ok(Self {
                    $( $field: <$field_ty as $crate::Serde>::de(reader)?, )*
                })
            }
        }
    };
}

/// Declares a component struct bound to a protocol id.
///
/// ```
/// entsync_shared::component! {
///     /// Hit points of a tank
///     pub struct Health(1_438_927_221_431) {
///         pub current: f32,
///         pub max: f32,
///     }
/// }
/// ```
#[macro_export]
macro_rules! component {
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

        impl $crate::Component for $name {
            const PROTOCOL_ID: $crate::ProtocolId = $crate::ProtocolId::new($id);
            const NAME: &'static str = stringify!($name);
        }
    };
}
