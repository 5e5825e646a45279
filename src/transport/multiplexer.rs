use super::ConnectionError;
use crate::chunk_io::ChunkSerializer;
use crate::messages::{MessagePayload, RtmpMessage, CONTROL_CHUNK_STREAM_ID};
use crate::time::RtmpTimestamp;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};

/// A single serialized write: the chunks of one message, flushed as a
/// unit by the send pump.  The completion channel (when present) fires
/// once the last byte has been handed to the socket.
pub(crate) struct WriteCommand {
    pub bytes: Vec<u8>,
    pub completion: Option<oneshot::Sender<()>>,
}

/// The serialized entry point for everything a connection writes.
///
/// Chunk header compression makes the serializer's per-chunk-stream
/// history order sensitive, so all producers funnel through one mutex:
/// serializing a message and enqueueing its bytes happen atomically, which
/// guarantees the bytes on the wire appear in the same order as the
/// history updates that described them.  The handle is cheap to clone and
/// any number of tasks may send through it concurrently; messages on
/// different chunk streams interleave at whole-message granularity.
#[derive(Clone)]
pub struct Multiplexer {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    serializer: ChunkSerializer,
    write_queue: mpsc::Sender<WriteCommand>,
}

impl Multiplexer {
    pub(crate) fn new(write_queue: mpsc::Sender<WriteCommand>) -> Multiplexer {
        Multiplexer {
            inner: Arc::new(Mutex::new(Inner {
                serializer: ChunkSerializer::new(),
                write_queue,
            })),
        }
    }

    /// Sends a raw message payload on the given chunk stream.  Resolves
    /// once the final chunk of the message has been written to the
    /// transport, providing per-message backpressure.
    pub async fn send(
        &self,
        chunk_stream_id: u32,
        payload: &MessagePayload,
    ) -> Result<(), ConnectionError> {
        let (sender, receiver) = oneshot::channel();

        {
            let mut inner = self.inner.lock().await;
            let packet = inner.serializer.serialize(chunk_stream_id, payload, false)?;
            inner
                .write_queue
                .send(WriteCommand {
                    bytes: packet.bytes,
                    completion: Some(sender),
                })
                .await
                .map_err(|_| ConnectionError::Disconnected)?;
        }

        receiver.await.map_err(|_| ConnectionError::Disconnected)
    }

    /// Announces a new outbound chunk size to the peer and switches the
    /// serializer over to it.
    pub async fn set_chunk_size(&self, size: u32) -> Result<(), ConnectionError> {
        let (sender, receiver) = oneshot::channel();

        {
            let mut inner = self.inner.lock().await;
            let packet = inner
                .serializer
                .set_max_chunk_size(size, RtmpTimestamp::new(0))?;
            inner
                .write_queue
                .send(WriteCommand {
                    bytes: packet.bytes,
                    completion: Some(sender),
                })
                .await
                .map_err(|_| ConnectionError::Disconnected)?;
        }

        receiver.await.map_err(|_| ConnectionError::Disconnected)
    }

    /// Sends a protocol control message without waiting for the write to
    /// land.  Ordering against other sends is still preserved.
    pub(crate) async fn send_control(&self, message: RtmpMessage) -> Result<(), ConnectionError> {
        let payload = message.into_message_payload(RtmpTimestamp::new(0), 0)?;

        let mut inner = self.inner.lock().await;
        let packet = inner
            .serializer
            .serialize(CONTROL_CHUNK_STREAM_ID, &payload, false)?;
        inner
            .write_queue
            .send(WriteCommand {
                bytes: packet.bytes,
                completion: None,
            })
            .await
            .map_err(|_| ConnectionError::Disconnected)
    }
}
