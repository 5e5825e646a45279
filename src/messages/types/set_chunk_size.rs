use crate::messages::{MessageDeserializationError, MessageSerializationError, RtmpMessage};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use std::io::Cursor;

// The most significant bit must be zero, so a chunk size is a 31 bit value
const MAX_SIZE: u32 = 0x8000_0000 - 1;

pub fn serialize(size: u32) -> Result<Bytes, MessageSerializationError> {
    if size > MAX_SIZE {
        return Err(MessageSerializationError::InvalidChunkSize);
    }

    let mut cursor = Cursor::new(Vec::new());
    cursor.write_u32::<BigEndian>(size)?;
    Ok(Bytes::from(cursor.into_inner()))
}

pub fn deserialize(data: Bytes) -> Result<RtmpMessage, MessageDeserializationError> {
    let mut cursor = Cursor::new(data);
    let size = cursor.read_u32::<BigEndian>()?;
    if size > MAX_SIZE {
        return Err(MessageDeserializationError::InvalidMessageFormat);
    }

    Ok(RtmpMessage::SetChunkSize { size })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_serialize_message() {
        let bytes = serialize(4096).unwrap();
        assert_eq!(&bytes[..], &[0, 0, 16, 0], "Unexpected bytes");
    }

    #[test]
    fn can_deserialize_message() {
        let message = deserialize(Bytes::from(vec![0, 0, 16, 0])).unwrap();
        assert_eq!(message, RtmpMessage::SetChunkSize { size: 4096 });
    }

    #[test]
    fn size_with_high_bit_set_cannot_be_serialized() {
        match serialize(0x8000_0000) {
            Err(MessageSerializationError::InvalidChunkSize) => (),
            x => panic!("Expected InvalidChunkSize, got {:?}", x),
        }
    }

    #[test]
    fn size_with_high_bit_set_cannot_be_deserialized() {
        match deserialize(Bytes::from(vec![128, 0, 0, 0])) {
            Err(MessageDeserializationError::InvalidMessageFormat) => (),
            x => panic!("Expected InvalidMessageFormat, got {:?}", x),
        }
    }
}
