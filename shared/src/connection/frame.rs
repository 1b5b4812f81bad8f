use entsync_serde::{ByteReader, ByteWrite, ByteWriter, Serde};

use crate::{
    command::command::Command,
    connection::{
        compression_config::CompressionMode,
        decoder::Decoder,
        encoder::Encoder,
        error::{DecoderError, EncoderError},
    },
    protocol::Protocol,
};

pub const FRAME_MAGIC: [u8; 2] = [0xFF, 0x00];
/// Magic, marker map and payload length
pub const FRAME_HEADER_SIZE: usize = 7;

/// One-byte set of flags describing the payload of a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MarkerMap(u8);

impl MarkerMap {
    const COMPRESSED: u8 = 0b0000_0001;

    pub fn new(compressed: bool) -> Self {
        if compressed {
            Self(Self::COMPRESSED)
        } else {
            Self(0)
        }
    }

    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn is_compressed(&self) -> bool {
        self.0 & Self::COMPRESSED != 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    pub markers: MarkerMap,
    /// Length of the payload as it appears on the wire
    pub payload_length: u32,
}

impl FrameHeader {
    pub fn write(&self, writer: &mut dyn ByteWrite) {
        writer.write_bytes(&FRAME_MAGIC);
        self.markers.bits().ser(writer);
        self.payload_length.ser(writer);
    }

    /// Parses a header, rejecting bad magic and payloads over `max_payload` bytes.
    pub fn read(
        bytes: &[u8; FRAME_HEADER_SIZE],
        max_payload: usize,
    ) -> Result<Self, DecoderError> {
        let mut reader = ByteReader::new(bytes);
        let magic = reader.read_array::<2>()?;
        if magic != FRAME_MAGIC {
            return Err(DecoderError::InvalidMagic { found: magic });
        }

        let markers = MarkerMap::from_bits(u8::de(&mut reader)?);
        let payload_length = u32::de(&mut reader)?;
        if payload_length as usize > max_payload {
            return Err(DecoderError::PayloadTooLarge {
                length: payload_length as usize,
                limit: max_payload,
            });
        }

        Ok(Self {
            markers,
            payload_length,
        })
    }
}

/// Turns outbound commands into frames, compressing payloads when configured.
pub struct FrameEncoder {
    encoder: Encoder,
    max_payload: usize,
}

impl FrameEncoder {
    pub fn try_new(
        compression_mode: Option<CompressionMode>,
        max_payload: usize,
    ) -> Result<Self, EncoderError> {
        Ok(Self {
            encoder: Encoder::try_new(compression_mode)?,
            max_payload,
        })
    }

    pub fn encode(
        &mut self,
        protocol: &Protocol,
        commands: &[Command],
    ) -> Result<Vec<u8>, EncoderError> {
        let mut payload = ByteWriter::new();
        for command in commands {
            command.write(protocol, &mut payload)?;
        }
        if payload.len() > self.max_payload {
            return Err(EncoderError::PayloadTooLarge {
                length: payload.len(),
                limit: self.max_payload,
            });
        }

        let compressed = self.encoder.is_compressing();
        let payload = self.encoder.try_encode(payload.as_slice())?;

        let mut frame = ByteWriter::with_capacity(FRAME_HEADER_SIZE + payload.len());
        FrameHeader {
            markers: MarkerMap::new(compressed),
            payload_length: payload.len() as u32,
        }
        .write(&mut frame);
        frame.write_bytes(payload);
        Ok(frame.to_bytes())
    }
}

/// Turns inbound frames back into commands.
///
/// A frame decodes atomically: either every command in it is returned or the
/// whole frame is rejected.
pub struct FrameDecoder {
    decoder: Decoder,
    max_payload: usize,
}

impl FrameDecoder {
    pub fn try_new(
        compression_mode: Option<CompressionMode>,
        max_payload: usize,
    ) -> Result<Self, DecoderError> {
        Ok(Self {
            decoder: Decoder::try_new(compression_mode)?,
            max_payload,
        })
    }

    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    pub fn read_header(
        &self,
        bytes: &[u8; FRAME_HEADER_SIZE],
    ) -> Result<FrameHeader, DecoderError> {
        FrameHeader::read(bytes, self.max_payload)
    }

    pub fn decode_payload(
        &mut self,
        protocol: &Protocol,
        header: &FrameHeader,
        payload: &[u8],
    ) -> Result<Vec<Command>, DecoderError> {
        let payload = if header.markers.is_compressed() {
            self.decoder.try_decode(payload, self.max_payload)?
        } else {
            payload
        };

        let mut reader = ByteReader::new(payload);
        let mut commands = Vec::new();
        while !reader.is_empty() {
            commands.push(Command::read(&mut reader, protocol)?);
        }
        Ok(commands)
    }

    /// Decodes one complete frame held in memory.
    pub fn decode(
        &mut self,
        protocol: &Protocol,
        frame: &[u8],
    ) -> Result<Vec<Command>, DecoderError> {
        let mut reader = ByteReader::new(frame);
        let header = self.read_header(&reader.read_array::<FRAME_HEADER_SIZE>()?)?;
        let payload = reader.read_bytes(header.payload_length as usize)?;
        self.decode_payload(protocol, &header, payload)
    }
}
