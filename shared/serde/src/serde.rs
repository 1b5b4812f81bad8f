use crate::{byte_reader::ByteReader, byte_writer::ByteCounter, error::SerdeErr, ByteWrite};

/// A type that can be written to and read back from the wire.
///
/// Reads must consume exactly the bytes written by `ser`, since values are
/// laid out back to back with no per-field framing.
pub trait Serde: Sized + Clone + PartialEq {
    /// Writes the value
    fn ser(&self, writer: &mut dyn ByteWrite);

    /// Reads a value, advancing the reader past it
    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr>;
}

/// Number of bytes `value` occupies on the wire.
pub fn byte_length<T: Serde>(value: &T) -> usize {
    let mut counter = ByteCounter::new();
    value.ser(&mut counter);
    counter.count()
}
