use std::collections::HashMap;

use entsync_serde::{ByteReader, ByteWrite, Serde, SerdeErr};

use crate::{
    connection::error::{DecoderError, EncoderError},
    messages::event::{Event, Message},
    protocol::ProtocolError,
    ProtocolId,
};

type ReadFn = fn(&mut ByteReader) -> Result<Box<dyn Message>, SerdeErr>;

struct EventEntry {
    name: &'static str,
    read: ReadFn,
}

fn read_boxed<E: Event>(reader: &mut ByteReader) -> Result<Box<dyn Message>, SerdeErr> {
    Ok(Box::new(E::de(reader)?))
}

/// Closed table of event schemas, keyed by protocol id.
pub struct EventKinds {
    entries: HashMap<ProtocolId, EventEntry>,
}

impl EventKinds {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn add_event<E: Event>(&mut self) -> Result<(), ProtocolError> {
        if let Some(existing) = self.entries.get(&E::PROTOCOL_ID) {
            return Err(ProtocolError::DuplicateProtocolId {
                id: E::PROTOCOL_ID,
                existing: existing.name,
                added: E::NAME,
            });
        }

        self.entries.insert(
            E::PROTOCOL_ID,
            EventEntry {
                name: E::NAME,
                read: read_boxed::<E>,
            },
        );
        Ok(())
    }

    pub fn contains(&self, id: &ProtocolId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn id_to_name(&self, id: &ProtocolId) -> Option<&'static str> {
        self.entries.get(id).map(|entry| entry.name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn write(
        &self,
        event: &dyn Message,
        writer: &mut dyn ByteWrite,
    ) -> Result<(), EncoderError> {
        let id = event.protocol_id();
        if !self.contains(&id) {
            return Err(EncoderError::UnregisteredEvent {
                id,
                name: event.name(),
            });
        }
        id.ser(writer);
        event.write(writer);
        Ok(())
    }

    pub fn read(&self, reader: &mut ByteReader) -> Result<Box<dyn Message>, DecoderError> {
        let id = ProtocolId::de(reader)?;
        let Some(entry) = self.entries.get(&id) else {
            return Err(DecoderError::UnknownEvent { id });
        };
        Ok((entry.read)(reader)?)
    }
}

impl Default for EventKinds {
    fn default() -> Self {
        Self::new()
    }
}
