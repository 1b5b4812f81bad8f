use crate::{byte_reader::ByteReader, byte_writer::ByteWrite, error::SerdeErr, serde::Serde};

fn write_length(length: usize, writer: &mut dyn ByteWrite) -> usize {
    let prefix = u32::try_from(length).unwrap_or(u32::MAX);
    prefix.ser(writer);
    prefix as usize
}

impl Serde for String {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        let bytes = self.as_bytes();
        let length = write_length(bytes.len(), writer);
        writer.write_bytes(&bytes[..length]);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let length = u32::de(reader)? as usize;
        let bytes = reader.read_bytes(length)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| SerdeErr::InvalidUtf8 { length })
    }
}

impl<T: Serde> Serde for Vec<T> {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        let count = write_length(self.len(), writer);
        for item in self.iter().take(count) {
            item.ser(writer);
        }
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let count = u32::de(reader)? as usize;
        // a hostile count must not drive the allocation size
        let mut output = Vec::with_capacity(count.min(reader.remaining()));
        for _ in 0..count {
            output.push(T::de(reader)?);
        }
        Ok(output)
    }
}

impl<T: Serde> Serde for Option<T> {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        match self {
            Some(value) => {
                true.ser(writer);
                value.ser(writer);
            }
            None => false.ser(writer),
        }
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        if bool::de(reader)? {
            Ok(Some(T::de(reader)?))
        } else {
            Ok(None)
        }
    }
}

impl<T: Serde> Serde for Box<T> {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        self.as_ref().ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(Box::new(T::de(reader)?))
    }
}
