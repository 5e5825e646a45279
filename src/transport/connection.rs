use super::multiplexer::{Multiplexer, WriteCommand};
use super::window::WindowTracker;
use super::ConnectionError;
use crate::chunk_io::ChunkDeserializer;
use crate::handshake::{Handshake, HandshakeProcessResult};
use crate::messages::{MessageDeserializationError, MessagePayload, PayloadCodec, RtmpMessage};
use bytes::BytesMut;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Tunables for a single connection
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// How long each read or write of the handshake may take before the
    /// connection is abandoned
    pub handshake_timeout: Duration,

    /// How many reassembled messages may sit undelivered before the
    /// receive pump stops reading from the transport
    pub inbound_capacity: usize,

    /// How many serialized writes may sit unflushed before senders block
    pub outbound_capacity: usize,

    /// The largest message length the peer may declare
    pub max_message_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            handshake_timeout: Duration::from_secs(5),
            inbound_capacity: 32,
            outbound_capacity: 32,
            max_message_size: 16_777_215,
        }
    }
}

/// What the receive pump delivers for each non-control inbound message
#[derive(Debug)]
pub enum InboundEvent<M> {
    /// A fully reassembled message the codec understood
    Message(M),

    /// A message the codec could not interpret.  The connection stays up;
    /// whether to tolerate or disconnect is session-layer policy.
    UnparseableMessage {
        payload: MessagePayload,
        error: MessageDeserializationError,
    },
}

/// A live RTMP connection: handshake already performed, pumps running.
///
/// Inbound protocol control messages (chunk size changes, aborts,
/// acknowledgements, window management) are applied internally by the
/// receive pump; everything else is parsed by the supplied codec and
/// surfaced through [`recv`](Self::recv).  Outbound messages go through
/// [`send`](Self::send), or through any number of cloned
/// [`Multiplexer`] handles for concurrent producers.
///
/// Dropping the connection cancels both pumps.
pub struct Connection<C: PayloadCodec> {
    codec: C,
    inbound: mpsc::Receiver<MessagePayload>,
    multiplexer: Multiplexer,
    cancellation: CancellationToken,
    peer_epoch: u32,
}

impl<C: PayloadCodec> Connection<C> {
    /// Performs the server side of the handshake over the given stream
    /// and, once the peer is validated, spawns the receive and send pumps.
    ///
    /// Any chunk bytes the peer pipelined behind its handshake ack are fed
    /// straight into the receive pump, so nothing is lost.
    pub async fn accept<S>(
        mut stream: S,
        codec: C,
        config: ConnectionConfig,
    ) -> Result<Connection<C>, ConnectionError>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let mut handshake = Handshake::new();
        let mut buffer = [0_u8; 4096];

        let leftover = loop {
            let bytes_read = timeout(config.handshake_timeout, stream.read(&mut buffer))
                .await
                .map_err(|_| ConnectionError::HandshakeTimeout)??;

            if bytes_read == 0 {
                return Err(ConnectionError::Disconnected);
            }

            match handshake.process_bytes(&buffer[..bytes_read])? {
                HandshakeProcessResult::InProgress { response_bytes } => {
                    if !response_bytes.is_empty() {
                        timeout(config.handshake_timeout, stream.write_all(&response_bytes))
                            .await
                            .map_err(|_| ConnectionError::HandshakeTimeout)??;
                    }
                }

                HandshakeProcessResult::Completed {
                    response_bytes,
                    remaining_bytes,
                } => {
                    if !response_bytes.is_empty() {
                        timeout(config.handshake_timeout, stream.write_all(&response_bytes))
                            .await
                            .map_err(|_| ConnectionError::HandshakeTimeout)??;
                    }

                    break remaining_bytes;
                }
            }
        };

        let peer_epoch = handshake.peer_epoch();
        debug!(peer_epoch, "handshake completed");

        let (reader, writer) = tokio::io::split(stream);
        let (inbound_sender, inbound_receiver) = mpsc::channel(config.inbound_capacity);
        let (write_sender, write_receiver) = mpsc::channel(config.outbound_capacity);
        let cancellation = CancellationToken::new();
        let multiplexer = Multiplexer::new(write_sender);

        let mut deserializer = ChunkDeserializer::new();
        deserializer.set_max_message_size(config.max_message_size);

        let pump = RecvPump {
            reader,
            deserializer,
            window: WindowTracker::new(),
            multiplexer: multiplexer.clone(),
            inbound: inbound_sender,
            cancellation: cancellation.clone(),
        };
        tokio::spawn(pump.run(leftover));
        tokio::spawn(send_pump(writer, write_receiver, cancellation.clone()));

        Ok(Connection {
            codec,
            inbound: inbound_receiver,
            multiplexer,
            cancellation,
            peer_epoch,
        })
    }

    /// Receives the next inbound event.  `None` means the connection has
    /// closed, whether by peer disconnect, protocol violation, or
    /// shutdown.
    pub async fn recv(&mut self) -> Option<InboundEvent<C::Message>> {
        let payload = self.inbound.recv().await?;
        match self.codec.parse(&payload) {
            Ok(message) => Some(InboundEvent::Message(message)),
            Err(error) => Some(InboundEvent::UnparseableMessage { payload, error }),
        }
    }

    /// Serializes and sends a message on the given chunk stream, resolving
    /// once its final chunk has been written to the transport.
    pub async fn send(
        &mut self,
        chunk_stream_id: u32,
        message: C::Message,
    ) -> Result<(), ConnectionError> {
        let payload = self.codec.serialize(message)?;
        self.multiplexer.send(chunk_stream_id, &payload).await
    }

    /// A clonable handle for sending raw payloads from other tasks
    pub fn multiplexer(&self) -> Multiplexer {
        self.multiplexer.clone()
    }

    /// The epoch the peer declared during the handshake
    pub fn peer_epoch(&self) -> u32 {
        self.peer_epoch
    }

    /// Cancels both pumps.  In-flight `send` calls resolve with
    /// `Disconnected`, and `recv` drains to `None`.
    pub fn shutdown(&self) {
        self.cancellation.cancel();
    }
}

impl<C: PayloadCodec> Drop for Connection<C> {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}

struct RecvPump<S> {
    reader: ReadHalf<S>,
    deserializer: ChunkDeserializer,
    window: WindowTracker,
    multiplexer: Multiplexer,
    inbound: mpsc::Sender<MessagePayload>,
    cancellation: CancellationToken,
}

impl<S: AsyncRead> RecvPump<S> {
    async fn run(mut self, leftover: Vec<u8>) {
        match self.pump(leftover).await {
            Ok(()) => debug!("receive pump finished"),
            Err(ConnectionError::Disconnected) => debug!("receive pump stopped: channel closed"),
            Err(error) => error!("receive pump failed: {}", error),
        }

        // Whatever the cause, this connection is done; stop the send pump
        self.cancellation.cancel();
    }

    async fn pump(&mut self, leftover: Vec<u8>) -> Result<(), ConnectionError> {
        // Bytes pipelined behind the handshake ack count toward the
        // acknowledgement window just like bytes read off the transport
        if !leftover.is_empty() {
            if let Some(sequence_number) = self.window.bytes_received(leftover.len() as u32) {
                self.multiplexer
                    .send_control(RtmpMessage::Acknowledgement { sequence_number })
                    .await?;
            }

            self.dispatch(&leftover).await?;
        }

        let mut buffer = BytesMut::with_capacity(4096);
        loop {
            let bytes_read = tokio::select! {
                _ = self.cancellation.cancelled() => return Ok(()),
                result = self.reader.read_buf(&mut buffer) => result?,
            };

            if bytes_read == 0 {
                debug!("peer closed the connection");
                return Ok(());
            }

            if let Some(sequence_number) = self.window.bytes_received(bytes_read as u32) {
                self.multiplexer
                    .send_control(RtmpMessage::Acknowledgement { sequence_number })
                    .await?;
            }

            let bytes = buffer.split();
            self.dispatch(&bytes).await?;
        }
    }

    async fn dispatch(&mut self, bytes: &[u8]) -> Result<(), ConnectionError> {
        let mut input = bytes;
        while let Some(payload) = self.deserializer.get_next_message(input)? {
            input = &[];

            if RtmpMessage::is_protocol_control_type(payload.type_id) {
                self.handle_control_message(&payload).await?;
            } else {
                self.deliver(payload).await?;
            }
        }

        Ok(())
    }

    async fn handle_control_message(
        &mut self,
        payload: &MessagePayload,
    ) -> Result<(), ConnectionError> {
        let message = payload
            .to_rtmp_message()
            .map_err(ConnectionError::MalformedControlMessage)?;

        match message {
            RtmpMessage::SetChunkSize { size } => {
                debug!(size, "peer changed its chunk size");
                self.deserializer.set_max_chunk_size(size as usize)?;
            }

            RtmpMessage::Abort { stream_id } => {
                if self.deserializer.abort_chunk_stream(stream_id) {
                    debug!(stream_id, "discarded partial message after abort");
                }
            }

            RtmpMessage::Acknowledgement { sequence_number } => {
                // Informational; output is not paused awaiting acks
                debug!(sequence_number, "peer acknowledged received bytes");
            }

            RtmpMessage::WindowAcknowledgement { size } => {
                debug!(size, "peer announced its acknowledgement window");
                if let Some(sequence_number) = self.window.set_read_ack_threshold(size) {
                    self.multiplexer
                        .send_control(RtmpMessage::Acknowledgement { sequence_number })
                        .await?;
                }
            }

            RtmpMessage::SetPeerBandwidth { size, limit_type } => {
                if self.window.apply_peer_bandwidth(size, limit_type) {
                    debug!(size, ?limit_type, "honoring peer bandwidth limit");
                    self.window.set_write_ack_threshold(size);
                    self.multiplexer
                        .send_control(RtmpMessage::WindowAcknowledgement { size })
                        .await?;
                } else {
                    debug!(size, ?limit_type, "ignoring peer bandwidth limit");
                }
            }

            RtmpMessage::Unknown { type_id, .. } => {
                warn!(type_id, "protocol control type id with no handler");
            }
        }

        Ok(())
    }

    async fn deliver(&mut self, payload: MessagePayload) -> Result<(), ConnectionError> {
        tokio::select! {
            _ = self.cancellation.cancelled() => Err(ConnectionError::Disconnected),
            result = self.inbound.send(payload) => result.map_err(|_| ConnectionError::Disconnected),
        }
    }
}

async fn send_pump<S: AsyncWrite>(
    mut writer: WriteHalf<S>,
    mut queue: mpsc::Receiver<WriteCommand>,
    cancellation: CancellationToken,
) {
    loop {
        let command = tokio::select! {
            _ = cancellation.cancelled() => break,
            command = queue.recv() => match command {
                Some(command) => command,
                None => break,
            },
        };

        let result = tokio::select! {
            _ = cancellation.cancelled() => break,
            result = writer.write_all(&command.bytes) => result,
        };

        if let Err(error) = result {
            warn!("send pump failed to write: {}", error);
            break;
        }

        if let Some(completion) = command.completion {
            // The sender may have given up waiting, which is fine
            let _ = completion.send(());
        }
    }

    cancellation.cancel();
    debug!("send pump finished");
}
