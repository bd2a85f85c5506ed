use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parmirror_proto::{Message, MessageReader, MessageWriter, WireError};

use crate::cmd::WatchArgs;
use crate::exit::{io_error, wire_error, CliError, CliResult, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub fn run(args: WatchArgs, format: OutputFormat) -> CliResult<i32> {
    let stream =
        TcpStream::connect(&args.addr).map_err(|err| io_error("connect failed", err))?;
    let read_half = stream
        .try_clone()
        .map_err(|err| io_error("connect failed", err))?;
    read_half
        .set_read_timeout(Some(Duration::from_millis(250)))
        .map_err(|err| io_error("connect failed", err))?;

    let mut writer = MessageWriter::new(stream);
    let mut reader = MessageReader::new(read_half);

    // Announce readiness so the host replays its snapshot.
    writer
        .send(&Message::client_ready())
        .map_err(|err| wire_error("handshake failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let msg = match reader.read_message() {
            Ok(msg) => msg,
            Err(WireError::Io(err))
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                continue;
            }
            Err(WireError::ConnectionClosed) => break,
            Err(err) => return Err(wire_error("receive failed", err)),
        };

        if matches!(msg, Message::Unknown { .. }) {
            continue;
        }

        print_message(&msg, format);
        printed = printed.saturating_add(1);

        if let Some(count) = args.count {
            if printed >= count {
                return Ok(SUCCESS);
            }
        }
    }

    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
