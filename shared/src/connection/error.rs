use entsync_serde::SerdeErr;
use thiserror::Error;

use crate::ProtocolId;

/// Errors that can occur while encoding outbound frames
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncoderError {
    /// Failed to create compressor with the specified configuration
    #[error("Failed to create compressor with compression level {level}")]
    CompressorCreationFailed { level: i32 },

    /// Failed to create compressor with dictionary
    #[error("Failed to create compressor with dictionary (compression level {level})")]
    CompressorWithDictionaryFailed { level: i32 },

    /// Compression operation failed
    #[error("Failed to compress payload of {payload_size} bytes")]
    CompressionFailed { payload_size: usize },

    /// Encoded payload is larger than the frame limit
    #[error("Encoded payload of {length} bytes exceeds the {limit} byte frame limit")]
    PayloadTooLarge { length: usize, limit: usize },

    /// Component type was never added to the Protocol
    #[error("Component {name} (protocol id {id}) is not registered with the Protocol. Must call `add_component()` during protocol initialization")]
    UnregisteredComponent { id: ProtocolId, name: &'static str },

    /// Event type was never added to the Protocol
    #[error("Event {name} (protocol id {id}) is not registered with the Protocol. Must call `add_event()` during protocol initialization")]
    UnregisteredEvent { id: ProtocolId, name: &'static str },
}

/// Errors that can occur while decoding inbound frames.
///
/// All of them are fatal for the connection: once a read fails the cursor can
/// no longer be trusted to sit on a command boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecoderError {
    /// A primitive value could not be read
    #[error("Malformed payload: {0}")]
    Serde(#[from] SerdeErr),

    /// Frame did not start with the expected magic bytes
    #[error("Invalid frame magic {found:02x?} (expected [ff, 00])")]
    InvalidMagic { found: [u8; 2] },

    /// Frame header declares a payload larger than allowed
    #[error("Frame payload of {length} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { length: usize, limit: usize },

    /// Command code is not part of the vocabulary
    #[error("Unknown command code {code} received. This may indicate a malformed or malicious frame")]
    UnknownCommandCode { code: u8 },

    /// Component protocol id is not registered
    #[error("Unknown component protocol id {id}")]
    UnknownComponent { id: ProtocolId },

    /// Event protocol id is not registered
    #[error("Unknown event protocol id {id}")]
    UnknownEvent { id: ProtocolId },

    /// Frame is marked compressed but no decompressor is configured
    #[error("Received a compressed frame but compression is not enabled for this direction")]
    CompressionUnsupported,

    /// Failed to create decompressor
    #[error("Failed to create decompressor")]
    DecompressorCreationFailed,

    /// Failed to create decompressor with dictionary
    #[error("Failed to create decompressor with dictionary")]
    DecompressorWithDictionaryFailed,

    /// Decompression operation failed (SECURITY: potentially malicious payload)
    #[error("Failed to decompress payload of {payload_size} bytes (possible malformed or malicious data)")]
    DecompressionFailed { payload_size: usize },
}

/// General connection-level errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// Encoder error
    #[error("Encoder error: {0}")]
    Encoder(#[from] EncoderError),

    /// Decoder error
    #[error("Decoder error: {0}")]
    Decoder(#[from] DecoderError),
}
