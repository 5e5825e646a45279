use crate::messages::{MessageDeserializationError, MessageSerializationError, RtmpMessage};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use std::io::Cursor;

pub fn serialize(sequence_number: u32) -> Result<Bytes, MessageSerializationError> {
    let mut cursor = Cursor::new(Vec::new());
    cursor.write_u32::<BigEndian>(sequence_number)?;
    Ok(Bytes::from(cursor.into_inner()))
}

pub fn deserialize(data: Bytes) -> Result<RtmpMessage, MessageDeserializationError> {
    let mut cursor = Cursor::new(data);
    let sequence_number = cursor.read_u32::<BigEndian>()?;
    Ok(RtmpMessage::Acknowledgement { sequence_number })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_serialize_message() {
        let bytes = serialize(1000).unwrap();
        assert_eq!(&bytes[..], &[0, 0, 3, 232], "Unexpected bytes");
    }

    #[test]
    fn can_deserialize_message() {
        let message = deserialize(Bytes::from(vec![0, 0, 3, 232])).unwrap();
        assert_eq!(
            message,
            RtmpMessage::Acknowledgement {
                sequence_number: 1000
            }
        );
    }
}
