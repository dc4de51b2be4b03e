use std::io::{ErrorKind, Read, Write};
use std::net::SocketAddr;
use std::time::Duration;

use bytes::BytesMut;
use dictwire_codec::{decode_message, encode_message, Message, HEADER_SIZE};
use dictwire_transport::{ShutdownHandle, TransportError, WireStream};
use tracing::trace;

use crate::config::FrameConfig;
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Exchanges whole messages over one connected stream.
///
/// The stream is exclusively owned. For one thread sending while another
/// receives, split the connection with [`MessageStream::try_clone`]; the
/// clones share one cancellation flag, so a single shutdown unblocks both
/// directions. Neither the send path nor the receive path is internally
/// locked against itself; drive each from at most one thread.
pub struct MessageStream {
    stream: WireStream,
    buf: BytesMut,
    config: FrameConfig,
}

enum Stage {
    Header,
    Payload,
}

impl MessageStream {
    /// Wrap a connected stream with default configuration.
    pub fn new(stream: WireStream) -> Self {
        Self::with_config(stream, FrameConfig::default())
    }

    /// Wrap a connected stream with explicit configuration.
    pub fn with_config(stream: WireStream, config: FrameConfig) -> Self {
        Self {
            stream,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode and send one message (blocking).
    ///
    /// Loops until every byte is accepted by the local stack; success means
    /// the frame is fully queued for transmission, not that the peer has
    /// processed it. Fails with [`FrameError::Cancelled`] when the stream's
    /// cancellation flag is observed mid-write.
    pub fn send(&mut self, msg: &Message) -> Result<()> {
        self.buf.clear();
        encode_message(msg, &mut self.buf)?;
        trace!(bytes = self.buf.len(), entries = msg.len(), "sending frame");

        let mut offset = 0usize;
        while offset < self.buf.len() {
            if self.stream.cancel_requested() {
                return Err(FrameError::Cancelled);
            }
            match self.stream.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(_) if self.stream.cancel_requested() => return Err(FrameError::Cancelled),
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Receive one message using the configured default timeout.
    pub fn recv(&mut self) -> Result<Message> {
        self.recv_timeout(self.config.recv_timeout)
    }

    /// Receive one message, waiting at most `timeout` for readability.
    ///
    /// `None` blocks until a complete frame arrives or the connection
    /// closes. With `Some(t)`, the timeout is re-armed before every
    /// underlying read rather than tracked as one absolute deadline, so a
    /// peer trickling single bytes can stretch the total wait to a multiple
    /// of `t`; what it can never do is stall a read longer than `t`.
    ///
    /// A payload length above the configured maximum is rejected before any
    /// payload byte is read or allocated. Cancellation discards partially
    /// received bytes; a cancelled receive never yields a message.
    pub fn recv_timeout(&mut self, timeout: Option<Duration>) -> Result<Message> {
        let mut header = [0u8; HEADER_SIZE];
        self.read_exact_bounded(&mut header, timeout)
            .map_err(|err| reception_error(err, Stage::Header))?;

        let payload_len = u32::from_be_bytes(header) as usize;
        if payload_len > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload_len,
                max: self.config.max_payload_size,
            });
        }
        trace!(payload_len, "receiving frame");

        let mut frame = vec![0u8; HEADER_SIZE + payload_len];
        frame[..HEADER_SIZE].copy_from_slice(&header);
        self.read_exact_bounded(&mut frame[HEADER_SIZE..], timeout)
            .map_err(|err| reception_error(err, Stage::Payload))?;

        decode_message(&frame).map_err(Into::into)
    }

    /// Read exactly `buf.len()` bytes, waiting up to `timeout` for
    /// readability before each underlying read and observing the
    /// cancellation flag at every iteration boundary.
    fn read_exact_bounded(
        &mut self,
        buf: &mut [u8],
        timeout: Option<Duration>,
    ) -> std::result::Result<(), TransportError> {
        let mut filled = 0usize;
        while filled < buf.len() {
            if self.stream.cancel_requested() {
                return Err(TransportError::Cancelled);
            }
            if let Some(limit) = timeout {
                self.stream.wait_readable(limit)?;
            }
            if self.stream.cancel_requested() {
                return Err(TransportError::Cancelled);
            }
            match self.stream.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(if self.stream.cancel_requested() {
                        TransportError::Cancelled
                    } else {
                        TransportError::Closed
                    });
                }
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(_) if self.stream.cancel_requested() => return Err(TransportError::Cancelled),
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
        Ok(())
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.stream.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Create a handle that can cancel this stream's operations from
    /// another thread.
    pub fn shutdown_handle(&self) -> Result<ShutdownHandle> {
        self.stream.shutdown_handle().map_err(Into::into)
    }

    /// Clone the connection so one thread can send while another receives.
    ///
    /// The clones share the cancellation flag but have independent buffers
    /// and configuration.
    pub fn try_clone(&self) -> Result<Self> {
        let cloned = self.stream.try_clone()?;
        Ok(Self::with_config(cloned, self.config.clone()))
    }

    /// Address of the connected peer.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        self.stream.peer_addr().map_err(Into::into)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &WireStream {
        &self.stream
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut WireStream {
        &mut self.stream
    }

    /// Consume the wrapper and return the inner stream.
    pub fn into_inner(self) -> WireStream {
        self.stream
    }

    /// Update the maximum accepted payload size for subsequent receives.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current stream configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl std::fmt::Debug for MessageStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageStream")
            .field("stream", &self.stream)
            .field("max_payload_size", &self.config.max_payload_size)
            .finish()
    }
}

fn reception_error(err: TransportError, stage: Stage) -> FrameError {
    match err {
        TransportError::TimedOut(t) => FrameError::TimedOut(t),
        TransportError::Cancelled => FrameError::Cancelled,
        TransportError::Closed => FrameError::ConnectionClosed,
        other => match stage {
            Stage::Header => FrameError::HeaderReception(other),
            Stage::Payload => FrameError::PayloadReception(other),
        },
    }
}
