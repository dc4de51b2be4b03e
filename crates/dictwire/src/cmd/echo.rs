use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use dictwire_frame::{FrameError, MessageStream};
use dictwire_transport::{ListenerShutdownHandle, ShutdownHandle, TcpTransport, TransportError};
use tracing::{debug, info};

use crate::cmd::EchoArgs;
use crate::exit::{frame_error, transport_error, CliError, CliResult, SUCCESS};

pub fn run(args: EchoArgs) -> CliResult<i32> {
    let transport = TcpTransport::bind(args.addr.as_str())
        .map_err(|err| transport_error("bind failed", err))?;
    info!(addr = %transport.local_addr(), "echo server listening");

    let running = Arc::new(AtomicBool::new(true));
    let active: Arc<Mutex<Option<ShutdownHandle>>> = Arc::new(Mutex::new(None));
    install_ctrlc_handler(running.clone(), transport.shutdown_handle(), active.clone())?;

    while running.load(Ordering::SeqCst) {
        let stream = match transport.accept() {
            Ok(stream) => stream,
            Err(TransportError::Cancelled) => break,
            Err(err) => return Err(transport_error("accept failed", err)),
        };
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "[unknown]".to_string());
        debug!(%peer, "connection established");

        let mut stream = MessageStream::new(stream);
        if let Ok(mut guard) = active.lock() {
            *guard = stream.shutdown_handle().ok();
        }

        while running.load(Ordering::SeqCst) {
            let msg = match stream.recv() {
                Ok(msg) => msg,
                Err(FrameError::ConnectionClosed) | Err(FrameError::Cancelled) => break,
                Err(err) => return Err(frame_error("receive failed", err)),
            };

            debug!(%peer, entries = msg.len(), "echoing message");
            match stream.send(&msg) {
                Ok(()) => {}
                Err(FrameError::ConnectionClosed) | Err(FrameError::Cancelled) => break,
                Err(err) => return Err(frame_error("send failed", err)),
            }
        }

        if let Ok(mut guard) = active.lock() {
            *guard = None;
        }
    }

    Ok(SUCCESS)
}

fn install_ctrlc_handler(
    running: Arc<AtomicBool>,
    listener: ListenerShutdownHandle,
    active: Arc<Mutex<Option<ShutdownHandle>>>,
) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
        listener.shutdown();
        if let Ok(guard) = active.lock() {
            if let Some(handle) = guard.as_ref() {
                handle.shutdown();
            }
        }
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
