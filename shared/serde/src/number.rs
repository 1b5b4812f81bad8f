use crate::{byte_reader::ByteReader, byte_writer::ByteWrite, error::SerdeErr, serde::Serde};

// Fixed-width numbers, big-endian

macro_rules! impl_serde_for_number {
    ($($type:ty),* $(,)?) => {$(
        impl Serde for $type {
            fn ser(&self, writer: &mut dyn ByteWrite) {
                writer.write_bytes(&self.to_be_bytes());
            }

            fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
                let bytes = reader.read_array::<{ std::mem::size_of::<$type>() }>()?;
                Ok(<$type>::from_be_bytes(bytes))
            }
        }
    )*};
}

impl_serde_for_number!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl Serde for bool {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        writer.write_byte(u8::from(*self));
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        match reader.read_byte()? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(SerdeErr::InvalidBool { value }),
        }
    }
}

impl Serde for () {
    fn ser(&self, _: &mut dyn ByteWrite) {}

    fn de(_: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(())
    }
}
