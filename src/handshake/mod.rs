//! The first thing that happens on an RTMP connection is a handshake.  The
//! client sends a version byte and a 1536 byte packet (its epoch, four zero
//! bytes, and 1528 bytes of random data); the server answers in kind, and
//! each side then proves it saw the other's packet by echoing the epoch and
//! random data back.  Only after both echoes validate may chunk data flow.
//!
//! `Handshake` is the server half of that exchange.  It performs no I/O
//! itself: feed it whatever bytes arrive with [`Handshake::process_bytes`]
//! and send whatever `response_bytes` it hands back.  Bytes that arrive
//! after the final ack (clients routinely pipeline their first chunks) come
//! back out in `remaining_bytes` and must be fed to the chunk deserializer.

mod errors;

pub use self::errors::HandshakeError;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use rand::Rng;
use std::io::{Cursor, Write};

const RANDOM_DATA_SIZE: usize = 1528;
const VERSION_AND_PACKET_SIZE: usize = 1 + 4 + 4 + RANDOM_DATA_SIZE;
const ACK_PACKET_SIZE: usize = 4 + 4 + RANDOM_DATA_SIZE;
const RTMP_VERSION: u8 = 3;
const MAX_VERSION: u8 = 31;

#[derive(Eq, PartialEq, Debug, Copy, Clone)]
enum Stage {
    AwaitingVersionAndPacket,
    AwaitingAck,
    Completed,
}

enum StageOutcome {
    NeedMoreBytes,
    Responded(Vec<u8>),
}

/// The result of processing inbound handshake bytes
#[derive(Eq, PartialEq, Debug)]
pub enum HandshakeProcessResult {
    /// The handshake is still in progress.  Any `response_bytes` must be
    /// sent to the peer before processing further input.
    InProgress { response_bytes: Vec<u8> },

    /// The peer has been fully validated.  `response_bytes` (if any) must
    /// still be sent; `remaining_bytes` are post-handshake bytes the peer
    /// pipelined and belong to the chunk layer.
    Completed {
        response_bytes: Vec<u8>,
        remaining_bytes: Vec<u8>,
    },
}

/// Server side state machine for the RTMP handshake
pub struct Handshake {
    stage: Stage,
    buffer: Vec<u8>,
    my_random: [u8; RANDOM_DATA_SIZE],
    peer_random: [u8; RANDOM_DATA_SIZE],
    peer_epoch: u32,
}

impl Handshake {
    /// Creates a new handshake.  The server speaks only in response to the
    /// client, so no bytes need to be sent until input arrives.
    pub fn new() -> Handshake {
        let mut my_random = [0_u8; RANDOM_DATA_SIZE];
        rand::thread_rng().fill(&mut my_random[..]);

        Handshake {
            stage: Stage::AwaitingVersionAndPacket,
            buffer: Vec::new(),
            my_random,
            peer_random: [0_u8; RANDOM_DATA_SIZE],
            peer_epoch: 0,
        }
    }

    /// The epoch the peer declared in its first packet.  Zero until that
    /// packet has been processed.
    pub fn peer_epoch(&self) -> u32 {
        self.peer_epoch
    }

    /// Processes the passed in bytes against the current handshake stage.
    /// Input is buffered internally, so partial packets are fine.
    pub fn process_bytes(
        &mut self,
        data: &[u8],
    ) -> Result<HandshakeProcessResult, HandshakeError> {
        self.buffer.extend_from_slice(data);

        let mut response_bytes = Vec::new();
        loop {
            let outcome = match self.stage {
                Stage::AwaitingVersionAndPacket => self.process_version_and_packet()?,
                Stage::AwaitingAck => self.process_ack()?,
                Stage::Completed => StageOutcome::NeedMoreBytes,
            };

            match outcome {
                StageOutcome::NeedMoreBytes => break,
                StageOutcome::Responded(mut bytes) => response_bytes.append(&mut bytes),
            }

            if self.stage == Stage::Completed {
                let remaining_bytes = self.buffer.split_off(0);
                return Ok(HandshakeProcessResult::Completed {
                    response_bytes,
                    remaining_bytes,
                });
            }
        }

        Ok(HandshakeProcessResult::InProgress { response_bytes })
    }

    fn process_version_and_packet(&mut self) -> Result<StageOutcome, HandshakeError> {
        if self.buffer.len() < VERSION_AND_PACKET_SIZE {
            return Ok(StageOutcome::NeedMoreBytes);
        }

        let packet: Vec<u8> = self.buffer.drain(..VERSION_AND_PACKET_SIZE).collect();

        let version = packet[0];
        if version < RTMP_VERSION {
            return Err(HandshakeError::UnsupportedVersion { version });
        }

        if version > MAX_VERSION {
            return Err(HandshakeError::BadVersionByte { version });
        }

        let mut cursor = Cursor::new(&packet[1..9]);
        let peer_epoch = cursor.read_u32::<BigEndian>()?;
        let zero_field = cursor.read_u32::<BigEndian>()?;
        if zero_field != 0 {
            return Err(HandshakeError::NonZeroTimeField);
        }

        self.peer_epoch = peer_epoch;
        self.peer_random.copy_from_slice(&packet[9..]);

        // Respond with our version and packet.  Our epoch is always zero,
        // matching the convention most servers use.  The echo of the peer's
        // packet is withheld until its ack validates.
        let mut response = Cursor::new(Vec::with_capacity(VERSION_AND_PACKET_SIZE));
        response.write_u8(RTMP_VERSION)?;
        response.write_u32::<BigEndian>(0)?;
        response.write_u32::<BigEndian>(0)?;
        response.write_all(&self.my_random)?;

        self.stage = Stage::AwaitingAck;
        Ok(StageOutcome::Responded(response.into_inner()))
    }

    fn process_ack(&mut self) -> Result<StageOutcome, HandshakeError> {
        if self.buffer.len() < ACK_PACKET_SIZE {
            return Ok(StageOutcome::NeedMoreBytes);
        }

        let packet: Vec<u8> = self.buffer.drain(..ACK_PACKET_SIZE).collect();

        let mut cursor = Cursor::new(&packet[0..4]);
        let echoed_epoch = cursor.read_u32::<BigEndian>()?;
        if echoed_epoch != 0 {
            return Err(HandshakeError::IncorrectPeerEpoch);
        }

        // Bytes 4..8 are the peer's read time, which we don't care about
        if packet[8..] != self.my_random[..] {
            return Err(HandshakeError::IncorrectRandomData);
        }

        // Only now that the peer has proven it saw our packet do we echo
        // its own epoch and random data back
        let mut response = Cursor::new(Vec::with_capacity(ACK_PACKET_SIZE));
        response.write_u32::<BigEndian>(self.peer_epoch)?;
        response.write_u32::<BigEndian>(0)?;
        response.write_all(&self.peer_random)?;

        self.stage = Stage::Completed;
        Ok(StageOutcome::Responded(response.into_inner()))
    }
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{BigEndian, WriteBytesExt};
    use std::io::{Cursor, Write};

    fn client_packet(version: u8, epoch: u32, zeros: u32, random: &[u8]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        cursor.write_u8(version).unwrap();
        cursor.write_u32::<BigEndian>(epoch).unwrap();
        cursor.write_u32::<BigEndian>(zeros).unwrap();
        cursor.write_all(random).unwrap();
        cursor.into_inner()
    }

    fn client_ack(response: &[u8]) -> Vec<u8> {
        // Echo the server's s1 packet (epoch + random) back at it
        let mut cursor = Cursor::new(Vec::new());
        cursor.write_all(&response[1..5]).unwrap();
        cursor.write_u32::<BigEndian>(999).unwrap();
        cursor.write_all(&response[9..1537]).unwrap();
        cursor.into_inner()
    }

    #[test]
    fn valid_handshake_completes() {
        let client_random = [11_u8; RANDOM_DATA_SIZE];
        let mut handshake = Handshake::new();

        let response = match handshake
            .process_bytes(&client_packet(3, 555, 0, &client_random))
            .unwrap()
        {
            HandshakeProcessResult::InProgress { response_bytes } => response_bytes,
            x => panic!("Expected InProgress, got {:?}", x),
        };

        // Version byte plus our own packet, nothing more
        assert_eq!(response.len(), 1 + 1536, "Unexpected response size");
        assert_eq!(response[0], 3, "Unexpected version byte");
        assert_eq!(&response[5..9], &[0, 0, 0, 0], "Expected zero time field");
        assert_eq!(handshake.peer_epoch(), 555, "Unexpected peer epoch");

        match handshake.process_bytes(&client_ack(&response)).unwrap() {
            HandshakeProcessResult::Completed {
                response_bytes,
                remaining_bytes,
            } => {
                // The echo of the client's packet comes only now
                assert_eq!(response_bytes.len(), 1536, "Unexpected echo size");
                assert_eq!(&response_bytes[0..4], &[0, 0, 2, 43], "Expected echoed epoch");
                assert_eq!(
                    &response_bytes[8..],
                    &client_random[..],
                    "Expected the client's random data echoed back"
                );
                assert!(remaining_bytes.is_empty(), "Expected no leftover bytes");
            }
            x => panic!("Expected Completed, got {:?}", x),
        }
    }

    #[test]
    fn client_echo_is_not_sent_before_the_ack_validates() {
        let client_random = [66_u8; RANDOM_DATA_SIZE];
        let mut handshake = Handshake::new();

        let response = match handshake
            .process_bytes(&client_packet(3, 5, 0, &client_random))
            .unwrap()
        {
            HandshakeProcessResult::InProgress { response_bytes } => response_bytes,
            x => panic!("Expected InProgress, got {:?}", x),
        };

        // An unvalidated peer must see nothing beyond s0 and s1
        assert_eq!(response.len(), 1 + 1536, "Expected s0 and s1 only");
        assert_ne!(
            &response[9..],
            &client_random[..],
            "Response must carry our random data, not an echo of the client's"
        );

        match handshake.process_bytes(&client_ack(&response)).unwrap() {
            HandshakeProcessResult::Completed { response_bytes, .. } => {
                assert_eq!(&response_bytes[0..4], &[0, 0, 0, 5], "Expected echoed epoch");
                assert_eq!(
                    &response_bytes[8..],
                    &client_random[..],
                    "Expected the echo only after the ack"
                );
            }
            x => panic!("Expected Completed, got {:?}", x),
        }
    }

    #[test]
    fn handshake_can_process_partial_input() {
        let client_random = [22_u8; RANDOM_DATA_SIZE];
        let packet = client_packet(3, 0, 0, &client_random);
        let mut handshake = Handshake::new();

        let result = handshake.process_bytes(&packet[0..1000]).unwrap();
        match result {
            HandshakeProcessResult::InProgress { response_bytes } => {
                assert!(response_bytes.is_empty(), "Expected no response yet")
            }
            x => panic!("Expected InProgress, got {:?}", x),
        }

        match handshake.process_bytes(&packet[1000..]).unwrap() {
            HandshakeProcessResult::InProgress { response_bytes } => {
                assert_eq!(response_bytes.len(), 1 + 1536)
            }
            x => panic!("Expected InProgress, got {:?}", x),
        }
    }

    #[test]
    fn bytes_after_ack_are_returned_as_remaining() {
        let client_random = [33_u8; RANDOM_DATA_SIZE];
        let mut handshake = Handshake::new();

        let response = match handshake
            .process_bytes(&client_packet(3, 0, 0, &client_random))
            .unwrap()
        {
            HandshakeProcessResult::InProgress { response_bytes } => response_bytes,
            x => panic!("Expected InProgress, got {:?}", x),
        };

        let mut input = client_ack(&response);
        input.extend_from_slice(&[1, 2, 3, 4]);

        match handshake.process_bytes(&input).unwrap() {
            HandshakeProcessResult::Completed {
                remaining_bytes, ..
            } => assert_eq!(remaining_bytes, vec![1, 2, 3, 4], "Unexpected leftovers"),
            x => panic!("Expected Completed, got {:?}", x),
        }
    }

    #[test]
    fn old_version_is_rejected() {
        let client_random = [0_u8; RANDOM_DATA_SIZE];
        let mut handshake = Handshake::new();

        match handshake.process_bytes(&client_packet(2, 0, 0, &client_random)) {
            Err(HandshakeError::UnsupportedVersion { version: 2 }) => (),
            x => panic!("Expected UnsupportedVersion, got {:?}", x),
        }
    }

    #[test]
    fn version_byte_above_31_is_rejected() {
        // 'G' as in a stray "GET /" hitting the port
        let client_random = [0_u8; RANDOM_DATA_SIZE];
        let mut handshake = Handshake::new();

        match handshake.process_bytes(&client_packet(b'G', 0, 0, &client_random)) {
            Err(HandshakeError::BadVersionByte { version }) => assert_eq!(version, b'G'),
            x => panic!("Expected BadVersionByte, got {:?}", x),
        }
    }

    #[test]
    fn non_zero_time_field_is_rejected() {
        let client_random = [0_u8; RANDOM_DATA_SIZE];
        let mut handshake = Handshake::new();

        match handshake.process_bytes(&client_packet(3, 0, 77, &client_random)) {
            Err(HandshakeError::NonZeroTimeField) => (),
            x => panic!("Expected NonZeroTimeField, got {:?}", x),
        }
    }

    #[test]
    fn bad_epoch_echo_is_rejected() {
        let client_random = [44_u8; RANDOM_DATA_SIZE];
        let mut handshake = Handshake::new();

        let response = match handshake
            .process_bytes(&client_packet(3, 0, 0, &client_random))
            .unwrap()
        {
            HandshakeProcessResult::InProgress { response_bytes } => response_bytes,
            x => panic!("Expected InProgress, got {:?}", x),
        };

        let mut ack = client_ack(&response);
        ack[3] = 9; // flip the echoed epoch

        match handshake.process_bytes(&ack) {
            Err(HandshakeError::IncorrectPeerEpoch) => (),
            x => panic!("Expected IncorrectPeerEpoch, got {:?}", x),
        }
    }

    #[test]
    fn bad_random_echo_is_rejected() {
        let client_random = [55_u8; RANDOM_DATA_SIZE];
        let mut handshake = Handshake::new();

        let response = match handshake
            .process_bytes(&client_packet(3, 0, 0, &client_random))
            .unwrap()
        {
            HandshakeProcessResult::InProgress { response_bytes } => response_bytes,
            x => panic!("Expected InProgress, got {:?}", x),
        };

        let mut ack = client_ack(&response);
        ack[100] = ack[100].wrapping_add(1);

        match handshake.process_bytes(&ack) {
            Err(HandshakeError::IncorrectRandomData) => (),
            x => panic!("Expected IncorrectRandomData, got {:?}", x),
        }
    }
}
