//! # Entsync Shared
//! Wire vocabulary shared between the entsync server and its clients: protocol
//! ids, components, events, commands and the frame codec.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

#[macro_use]
extern crate cfg_if;

pub use entsync_serde::{
    byte_length, ByteCounter, ByteReader, ByteWrite, ByteWriter, Serde, SerdeErr,
};

mod backends;
mod command;
mod connection;
mod messages;
mod protocol;
mod types;
mod world;

pub use backends::{TimeError, Timestamp};
pub use command::{command::Command, command_code::CommandCode};
pub use connection::{
    compression_config::{CompressionConfig, CompressionMode},
    decoder::Decoder,
    encoder::Encoder,
    error::{ConnectionError, DecoderError, EncoderError},
    frame::{FrameDecoder, FrameEncoder, FrameHeader, MarkerMap, FRAME_HEADER_SIZE, FRAME_MAGIC},
};
pub use messages::{
    builtin::{PingEvent, PongEvent},
    event::{Event, Message},
    event_kinds::EventKinds,
};
pub use protocol::{Protocol, ProtocolError, ProtocolPlugin};
pub use types::{EntityId, ProtocolId};
pub use world::{
    component::{
        component_kinds::{ComponentKind, ComponentKinds},
        replicate::{Component, Replicate},
    },
    template::TemplateAccessor,
};
