use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};

/// A connected byte stream carrying dictwire frames.
///
/// Wraps a `TcpStream` together with a shared cancellation flag. The flag is
/// observable from every clone of the stream and from any [`ShutdownHandle`]
/// derived from it; flipping it also shuts the socket down both ways so
/// blocked reads and writes unblock deterministically.
pub struct WireStream {
    inner: TcpStream,
    cancel: Arc<AtomicBool>,
}

impl Read for WireStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for WireStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl WireStream {
    /// Wrap an already-connected `TcpStream`.
    pub fn from_std(stream: TcpStream) -> Self {
        Self {
            inner: stream,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Block until the stream is readable, up to `timeout`.
    ///
    /// Returns [`TransportError::TimedOut`] when the wait expires. A stream
    /// that was shut down or closed by the peer reports readable (the next
    /// read returns 0), so cancellation and disconnect both unblock this
    /// wait promptly.
    pub fn wait_readable(&self, timeout: Duration) -> Result<()> {
        loop {
            match poll_readable(&self.inner, timeout) {
                Ok(true) => return Ok(()),
                Ok(false) => return Err(TransportError::TimedOut(timeout)),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    /// Whether cancellation has been requested for this stream.
    pub fn cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Create a handle that can cancel this stream's operations from
    /// another thread.
    pub fn shutdown_handle(&self) -> Result<ShutdownHandle> {
        let stream = self.inner.try_clone()?;
        Ok(ShutdownHandle {
            stream: Arc::new(stream),
            cancel: Arc::clone(&self.cancel),
        })
    }

    /// Clone the stream (new file descriptor, shared cancellation flag).
    ///
    /// Lets one thread send while another receives on the same connection.
    pub fn try_clone(&self) -> Result<Self> {
        let cloned = self.inner.try_clone()?;
        Ok(Self {
            inner: cloned,
            cancel: Arc::clone(&self.cancel),
        })
    }

    /// Address of the connected peer.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        self.inner.peer_addr().map_err(Into::into)
    }

    /// Local address of this end of the connection.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.inner.local_addr().map_err(Into::into)
    }
}

impl std::fmt::Debug for WireStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireStream")
            .field("peer", &self.inner.peer_addr().ok())
            .field("cancelled", &self.cancel_requested())
            .finish()
    }
}

/// Cancels a stream's in-flight and future operations.
///
/// Cheap to clone; every clone targets the same stream. `shutdown` flips the
/// shared flag and shuts the socket down both ways, so a thread blocked in a
/// read, readiness wait, or write observes cancellation instead of hanging.
#[derive(Clone)]
pub struct ShutdownHandle {
    stream: Arc<TcpStream>,
    cancel: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Request cancellation. Idempotent; only the first call touches the
    /// socket.
    pub fn shutdown(&self) {
        if self.cancel.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(err) = self.stream.shutdown(Shutdown::Both) {
            debug!(?err, "socket shutdown after cancel flag set");
        }
    }

    /// Whether cancellation has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ShutdownHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownHandle")
            .field("cancelled", &self.is_shutdown())
            .finish()
    }
}

#[cfg(unix)]
fn poll_readable(stream: &TcpStream, timeout: Duration) -> std::io::Result<bool> {
    use std::os::fd::AsRawFd;

    let mut pollfd = libc::pollfd {
        fd: stream.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };
    let timeout_ms = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;

    // SAFETY: `pollfd` is a valid, writable pollfd for the duration of the
    // call, and `fd` is an open socket descriptor owned by this process.
    let rc = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };
    match rc {
        -1 => Err(std::io::Error::last_os_error()),
        0 => Ok(false),
        _ => Ok(true),
    }
}

#[cfg(windows)]
fn poll_readable(stream: &TcpStream, timeout: Duration) -> std::io::Result<bool> {
    use std::os::windows::io::AsRawSocket;

    use windows_sys::Win32::Networking::WinSock::{WSAPoll, POLLRDNORM, SOCKET_ERROR, WSAPOLLFD};

    let mut pollfd = WSAPOLLFD {
        fd: stream.as_raw_socket() as usize,
        events: POLLRDNORM,
        revents: 0,
    };
    let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as i32;

    // SAFETY: `pollfd` is a valid, writable WSAPOLLFD for the duration of
    // the call, and `fd` is an open socket owned by this process.
    let rc = unsafe { WSAPoll(&mut pollfd, 1, timeout_ms) };
    match rc {
        SOCKET_ERROR => Err(std::io::Error::last_os_error()),
        0 => Ok(false),
        _ => Ok(true),
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::thread;
    use std::time::Instant;

    use super::*;

    fn connected_pair() -> (WireStream, WireStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = thread::spawn(move || TcpStream::connect(addr).unwrap());
        let (server, _peer) = listener.accept().unwrap();
        (
            WireStream::from_std(server),
            WireStream::from_std(client.join().unwrap()),
        )
    }

    #[test]
    fn read_write_roundtrip() {
        let (mut server, mut client) = connected_pair();

        client.write_all(b"ping").unwrap();
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[test]
    fn wait_readable_times_out_on_silent_peer() {
        let (server, _client) = connected_pair();

        let timeout = Duration::from_millis(50);
        let start = Instant::now();
        let err = server.wait_readable(timeout).unwrap_err();
        let elapsed = start.elapsed();

        assert!(matches!(err, TransportError::TimedOut(t) if t == timeout));
        assert!(elapsed >= timeout);
        assert!(elapsed < Duration::from_secs(2));
    }

    #[test]
    fn wait_readable_returns_once_data_arrives() {
        let (server, mut client) = connected_pair();

        client.write_all(b"x").unwrap();
        server.wait_readable(Duration::from_secs(1)).unwrap();
    }

    #[test]
    fn shutdown_sets_flag_on_all_clones() {
        let (server, _client) = connected_pair();
        let clone = server.try_clone().unwrap();
        let handle = server.shutdown_handle().unwrap();

        assert!(!server.cancel_requested());
        handle.shutdown();
        assert!(server.cancel_requested());
        assert!(clone.cancel_requested());
        assert!(handle.is_shutdown());
    }

    #[test]
    fn shutdown_is_idempotent() {
        let (server, _client) = connected_pair();
        let handle = server.shutdown_handle().unwrap();

        handle.shutdown();
        handle.shutdown();
        assert!(handle.is_shutdown());
    }

    #[test]
    fn shutdown_unblocks_pending_read() {
        let (mut server, _client) = connected_pair();
        let handle = server.shutdown_handle().unwrap();

        let reader = thread::spawn(move || {
            let mut buf = [0u8; 1];
            let n = server.read(&mut buf);
            (n, server.cancel_requested())
        });

        thread::sleep(Duration::from_millis(50));
        handle.shutdown();

        let (read_result, cancelled) = reader.join().unwrap();
        assert!(cancelled);
        // A shut-down socket reports EOF or an error; either way the read
        // returned instead of hanging.
        match read_result {
            Ok(n) => assert_eq!(n, 0),
            Err(_) => {}
        }
    }

    #[test]
    fn peer_addr_matches_counterpart_local_addr() {
        let (server, client) = connected_pair();
        assert_eq!(
            server.peer_addr().unwrap(),
            client.local_addr().unwrap()
        );
    }
}
