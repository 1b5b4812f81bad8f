use std::{collections::HashMap, fmt};

use entsync_serde::{ByteReader, ByteWrite, Serde, SerdeErr};

use crate::{
    connection::error::{DecoderError, EncoderError},
    protocol::ProtocolError,
    world::component::replicate::{Component, Replicate},
    ProtocolId,
};

type ReadFn = fn(&mut ByteReader) -> Result<Box<dyn Replicate>, SerdeErr>;

/// Identifies a component type; at most one component of a kind lives on an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentKind(ProtocolId);

impl ComponentKind {
    pub const fn new(protocol_id: ProtocolId) -> Self {
        Self(protocol_id)
    }

    pub const fn protocol_id(&self) -> ProtocolId {
        self.0
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serde for ComponentKind {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        self.0.ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(Self(ProtocolId::de(reader)?))
    }
}

struct ComponentEntry {
    name: &'static str,
    read: ReadFn,
}

fn read_boxed<C: Component>(reader: &mut ByteReader) -> Result<Box<dyn Replicate>, SerdeErr> {
    Ok(Box::new(C::de(reader)?))
}

/// Closed table of component schemas, keyed by protocol id.
pub struct ComponentKinds {
    entries: HashMap<ComponentKind, ComponentEntry>,
}

impl ComponentKinds {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn add_component<C: Component>(&mut self) -> Result<(), ProtocolError> {
        let kind = C::kind();
        if let Some(existing) = self.entries.get(&kind) {
            return Err(ProtocolError::DuplicateProtocolId {
                id: kind.protocol_id(),
                existing: existing.name,
                added: C::NAME,
            });
        }

        self.entries.insert(
            kind,
            ComponentEntry {
                name: C::NAME,
                read: read_boxed::<C>,
            },
        );
        Ok(())
    }

    pub fn contains(&self, kind: &ComponentKind) -> bool {
        self.entries.contains_key(kind)
    }

    pub fn kind_to_name(&self, kind: &ComponentKind) -> Option<&'static str> {
        self.entries.get(kind).map(|entry| entry.name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes the protocol id followed by the component fields.
    pub fn write(
        &self,
        component: &dyn Replicate,
        writer: &mut dyn ByteWrite,
    ) -> Result<(), EncoderError> {
        let kind = self.check_kind(component.kind(), component.name())?;
        kind.ser(writer);
        component.write(writer);
        Ok(())
    }

    pub fn write_kind(
        &self,
        kind: &ComponentKind,
        writer: &mut dyn ByteWrite,
    ) -> Result<(), EncoderError> {
        let kind = self.check_kind(*kind, "<unknown>")?;
        kind.ser(writer);
        Ok(())
    }

    pub fn read(&self, reader: &mut ByteReader) -> Result<Box<dyn Replicate>, DecoderError> {
        let kind = ComponentKind::de(reader)?;
        let Some(entry) = self.entries.get(&kind) else {
            return Err(DecoderError::UnknownComponent {
                id: kind.protocol_id(),
            });
        };
        Ok((entry.read)(reader)?)
    }

    pub fn read_kind(&self, reader: &mut ByteReader) -> Result<ComponentKind, DecoderError> {
        let kind = ComponentKind::de(reader)?;
        if !self.contains(&kind) {
            return Err(DecoderError::UnknownComponent {
                id: kind.protocol_id(),
            });
        }
        Ok(kind)
    }

    fn check_kind(
        &self,
        kind: ComponentKind,
        name: &'static str,
    ) -> Result<ComponentKind, EncoderError> {
        if self.contains(&kind) {
            Ok(kind)
        } else {
            Err(EncoderError::UnregisteredComponent {
                id: kind.protocol_id(),
                name,
            })
        }
    }
}

impl Default for ComponentKinds {
    fn default() -> Self {
        Self::new()
    }
}
