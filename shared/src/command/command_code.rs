use std::fmt;

use entsync_serde::{ByteReader, ByteWrite, Serde};

use crate::connection::error::DecoderError;

/// The one-byte code every command begins with on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandCode {
    SendEvent = 1,
    EntityShare = 2,
    EntityUnshare = 3,
    ComponentAdd = 4,
    ComponentRemove = 5,
    ComponentChange = 6,
    InitTime = 7,
    Close = 9,
}

impl CommandCode {
    /// Whether a client may send this command to the server.
    pub fn is_client_allowed(&self) -> bool {
        matches!(
            self,
            Self::SendEvent | Self::ComponentAdd | Self::ComponentRemove | Self::ComponentChange
        )
    }

    pub(crate) fn read(reader: &mut ByteReader) -> Result<Self, DecoderError> {
        let code = u8::de(reader)?;
        Self::try_from(code).map_err(|_| DecoderError::UnknownCommandCode { code })
    }

    pub(crate) fn write(&self, writer: &mut dyn ByteWrite) {
        (*self as u8).ser(writer);
    }
}

impl TryFrom<u8> for CommandCode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::SendEvent),
            2 => Ok(Self::EntityShare),
            3 => Ok(Self::EntityUnshare),
            4 => Ok(Self::ComponentAdd),
            5 => Ok(Self::ComponentRemove),
            6 => Ok(Self::ComponentChange),
            7 => Ok(Self::InitTime),
            9 => Ok(Self::Close),
            other => Err(other),
        }
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SendEvent => "SendEvent",
            Self::EntityShare => "EntityShare",
            Self::EntityUnshare => "EntityUnshare",
            Self::ComponentAdd => "ComponentAdd",
            Self::ComponentRemove => "ComponentRemove",
            Self::ComponentChange => "ComponentChange",
            Self::InitTime => "InitTime",
            Self::Close => "Close",
        };
        f.write_str(name)
    }
}
