use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use dictwire_frame::{FrameError, MessageStream};
use dictwire_transport::{ListenerShutdownHandle, ShutdownHandle, TcpTransport, TransportError};
use tracing::{debug, info};

use crate::cmd::{parse_duration, ListenArgs};
use crate::exit::{frame_error, transport_error, CliError, CliResult, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let recv_timeout = match &args.recv_timeout {
        Some(raw) => Some(parse_duration(raw)?),
        None => None,
    };

    let transport = TcpTransport::bind(args.addr.as_str())
        .map_err(|err| transport_error("bind failed", err))?;
    info!(addr = %transport.local_addr(), "listening");

    let running = Arc::new(AtomicBool::new(true));
    let active: Arc<Mutex<Option<ShutdownHandle>>> = Arc::new(Mutex::new(None));
    install_ctrlc_handler(running.clone(), transport.shutdown_handle(), active.clone())?;

    let mut printed = 0usize;

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
        set_active(&active, stream.shutdown_handle().ok());

        while running.load(Ordering::SeqCst) {
            let msg = match stream.recv_timeout(recv_timeout) {
                Ok(msg) => msg,
                Err(FrameError::ConnectionClosed) | Err(FrameError::Cancelled) => break,
                Err(err) => return Err(frame_error("receive failed", err)),
            };

            print_message(&msg, &peer, format);
            printed = printed.saturating_add(1);

            if let Some(count) = args.count {
                if printed >= count {
                    return Ok(SUCCESS);
                }
            }
        }

        set_active(&active, None);
    }

    Ok(SUCCESS)
}

fn set_active(slot: &Mutex<Option<ShutdownHandle>>, handle: Option<ShutdownHandle>) {
    if let Ok(mut guard) = slot.lock() {
        *guard = handle;
    }
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
