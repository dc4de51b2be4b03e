use std::fmt::Display;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::WireStream;

/// TCP connection lifecycle: bind/accept on the server side, connect on the
/// client side.
///
/// Accepted and connected streams are independent [`WireStream`]s, each with
/// its own cancellation flag. The listener itself also supports cooperative
/// shutdown so a thread blocked in `accept` can be unblocked.
pub struct TcpTransport {
    listener: Arc<TcpListener>,
    cancel: Arc<AtomicBool>,
    local_addr: SocketAddr,
}

impl TcpTransport {
    /// Bind and listen on a TCP address.
    pub fn bind<A: ToSocketAddrs + Display>(addr: A) -> Result<Self> {
        let listener = TcpListener::bind(&addr).map_err(|e| TransportError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;
        let local_addr = listener.local_addr().map_err(|e| TransportError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;

        info!(%local_addr, "listening on tcp socket");

        Ok(Self {
            listener: Arc::new(listener),
            cancel: Arc::new(AtomicBool::new(false)),
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking).
    ///
    /// Fails with [`TransportError::Cancelled`] when the listener was shut
    /// down while blocked here.
    pub fn accept(&self) -> Result<WireStream> {
        match self.listener.accept() {
            Ok((stream, peer)) => {
                debug!(%peer, "accepted connection");
                Ok(WireStream::from_std(stream))
            }
            Err(_) if self.cancel.load(Ordering::SeqCst) => Err(TransportError::Cancelled),
            Err(err) => Err(TransportError::Accept(err)),
        }
    }

    /// Connect to a listening TCP address (blocking).
    ///
    /// Resolution may yield several addresses; the first that accepts the
    /// connection wins.
    pub fn connect<A: ToSocketAddrs + Display>(addr: A) -> Result<WireStream> {
        let stream = TcpStream::connect(&addr).map_err(|e| TransportError::Connect {
            addr: addr.to_string(),
            source: e,
        })?;
        debug!(addr = %addr, "connected to tcp socket");
        Ok(WireStream::from_std(stream))
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Create a handle that can unblock a pending `accept` from another
    /// thread.
    pub fn shutdown_handle(&self) -> ListenerShutdownHandle {
        ListenerShutdownHandle {
            listener: Arc::clone(&self.listener),
            cancel: Arc::clone(&self.cancel),
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "tcp"
    }
}

/// Cancels a listener's pending and future `accept` calls.
#[derive(Clone)]
pub struct ListenerShutdownHandle {
    listener: Arc<TcpListener>,
    cancel: Arc<AtomicBool>,
}

impl ListenerShutdownHandle {
    /// Request shutdown. Idempotent; only the first call touches the socket.
    pub fn shutdown(&self) {
        if self.cancel.swap(true, Ordering::SeqCst) {
            return;
        }
        shutdown_listener(&self.listener);
    }

    /// Whether shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ListenerShutdownHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerShutdownHandle")
            .field("cancelled", &self.is_shutdown())
            .finish()
    }
}

#[cfg(unix)]
fn shutdown_listener(listener: &TcpListener) {
    use std::os::fd::AsRawFd;

    // SAFETY: the fd is an open listening socket owned by this process;
    // shutdown on it only transitions socket state.
    let _ = unsafe { libc::shutdown(listener.as_raw_fd(), libc::SHUT_RDWR) };
}

#[cfg(windows)]
fn shutdown_listener(listener: &TcpListener) {
    use std::os::windows::io::AsRawSocket;

    use windows_sys::Win32::Networking::WinSock::{shutdown, SD_BOTH};

    // SAFETY: the socket is an open listening socket owned by this process.
    let _ = unsafe { shutdown(listener.as_raw_socket() as usize, SD_BOTH) };
}
