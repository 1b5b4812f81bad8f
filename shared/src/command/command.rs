use std::fmt;

use entsync_serde::{ByteReader, ByteWrite, Serde};

use crate::{
    command::command_code::CommandCode,
    connection::error::{DecoderError, EncoderError},
    messages::event::{Event, Message},
    protocol::Protocol,
    world::{
        component::{component_kinds::ComponentKind, replicate::Replicate},
        template::TemplateAccessor,
    },
    EntityId,
};

/// A single wire operation; the unit of replication.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// One-shot notification concerning the target entities
    SendEvent {
        event: Box<dyn Message>,
        entities: Vec<EntityId>,
    },
    /// The receiving connection begins observing `entity`, whose current state is
    /// carried in full
    EntityShare {
        entity: EntityId,
        template: Option<TemplateAccessor>,
        components: Vec<Box<dyn Replicate>>,
    },
    EntityUnshare {
        entity: EntityId,
    },
    ComponentAdd {
        entity: EntityId,
        component: Box<dyn Replicate>,
    },
    ComponentRemove {
        entity: EntityId,
        kind: ComponentKind,
    },
    ComponentChange {
        entity: EntityId,
        component: Box<dyn Replicate>,
    },
    /// Server Unix-epoch milliseconds, always the first command on a connection
    InitTime {
        server_time: i64,
    },
    Close {
        reason: String,
    },
}

impl Command {
    pub fn send_event<E: Event>(event: E, entities: Vec<EntityId>) -> Self {
        Self::SendEvent {
            event: Box::new(event),
            entities,
        }
    }

    pub fn code(&self) -> CommandCode {
        match self {
            Self::SendEvent { .. } => CommandCode::SendEvent,
            Self::EntityShare { .. } => CommandCode::EntityShare,
            Self::EntityUnshare { .. } => CommandCode::EntityUnshare,
            Self::ComponentAdd { .. } => CommandCode::ComponentAdd,
            Self::ComponentRemove { .. } => CommandCode::ComponentRemove,
            Self::ComponentChange { .. } => CommandCode::ComponentChange,
            Self::InitTime { .. } => CommandCode::InitTime,
            Self::Close { .. } => CommandCode::Close,
        }
    }

    /// The single entity this command targets, if any.
    pub fn entity(&self) -> Option<EntityId> {
        match self {
            Self::EntityShare { entity, .. }
            | Self::EntityUnshare { entity }
            | Self::ComponentAdd { entity, .. }
            | Self::ComponentRemove { entity, .. }
            | Self::ComponentChange { entity, .. } => Some(*entity),
            Self::SendEvent { .. } | Self::InitTime { .. } | Self::Close { .. } => None,
        }
    }

    /// Writes the command code followed by the payload.
    pub fn write(
        &self,
        protocol: &Protocol,
        writer: &mut dyn ByteWrite,
    ) -> Result<(), EncoderError> {
        self.code().write(writer);

        match self {
            Self::SendEvent { event, entities } => {
                protocol.event_kinds.write(event.as_ref(), writer)?;
                entities.ser(writer);
            }
            Self::EntityShare {
                entity,
                template,
                components,
            } => {
                entity.ser(writer);
                template.ser(writer);
                (components.len() as u32).ser(writer);
                for component in components {
                    protocol.component_kinds.write(component.as_ref(), writer)?;
                }
            }
            Self::EntityUnshare { entity } => {
                entity.ser(writer);
            }
            Self::ComponentAdd { entity, component }
            | Self::ComponentChange { entity, component } => {
                entity.ser(writer);
                protocol.component_kinds.write(component.as_ref(), writer)?;
            }
            Self::ComponentRemove { entity, kind } => {
                entity.ser(writer);
                protocol.component_kinds.write_kind(kind, writer)?;
            }
            Self::InitTime { server_time } => {
                server_time.ser(writer);
            }
            Self::Close { reason } => {
                reason.ser(writer);
            }
        }

        Ok(())
    }

    /// Reads one command. On failure the cursor is left where the command began.
    pub fn read(reader: &mut ByteReader, protocol: &Protocol) -> Result<Self, DecoderError> {
        let start = reader.position();
        let result = Self::read_inner(reader, protocol);
        if result.is_err() {
            reader.reset_to(start);
        }
        result
    }

    fn read_inner(reader: &mut ByteReader, protocol: &Protocol) -> Result<Self, DecoderError> {
        let code = CommandCode::read(reader)?;

        let command = match code {
            CommandCode::SendEvent => {
                let event = protocol.event_kinds.read(reader)?;
                let entities = Vec::<EntityId>::de(reader)?;
                Self::SendEvent { event, entities }
            }
            CommandCode::EntityShare => {
                let entity = EntityId::de(reader)?;
                let template = Option::<TemplateAccessor>::de(reader)?;
                let count = u32::de(reader)? as usize;
                let mut components = Vec::with_capacity(count.min(reader.remaining()));
                for _ in 0..count {
                    components.push(protocol.component_kinds.read(reader)?);
                }
                Self::EntityShare {
                    entity,
                    template,
                    components,
                }
            }
            CommandCode::EntityUnshare => Self::EntityUnshare {
                entity: EntityId::de(reader)?,
            },
            CommandCode::ComponentAdd => Self::ComponentAdd {
                entity: EntityId::de(reader)?,
                component: protocol.component_kinds.read(reader)?,
            },
            CommandCode::ComponentRemove => Self::ComponentRemove {
                entity: EntityId::de(reader)?,
                kind: protocol.component_kinds.read_kind(reader)?,
            },
            CommandCode::ComponentChange => Self::ComponentChange {
                entity: EntityId::de(reader)?,
                component: protocol.component_kinds.read(reader)?,
            },
            CommandCode::InitTime => Self::InitTime {
                server_time: i64::de(reader)?,
            },
            CommandCode::Close => Self::Close {
                reason: String::de(reader)?,
            },
        };

        Ok(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SendEvent { event, entities } => {
                write!(f, "SendEvent({}, {} targets)", event.name(), entities.len())
            }
            Self::EntityShare {
                entity, components, ..
            } => write!(f, "EntityShare({entity}, {} components)", components.len()),
            Self::EntityUnshare { entity } => write!(f, "EntityUnshare({entity})"),
            Self::ComponentAdd { entity, component } => {
                write!(f, "ComponentAdd({entity}, {})", component.name())
            }
            Self::ComponentRemove { entity, kind } => {
                write!(f, "ComponentRemove({entity}, {kind})")
            }
            Self::ComponentChange { entity, component } => {
                write!(f, "ComponentChange({entity}, {})", component.name())
            }
            Self::InitTime { server_time } => write!(f, "InitTime({server_time})"),
            Self::Close { reason } => write!(f, "Close({reason:?})"),
        }
    }
}
