use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parmirror_relay::RelayServer;

use crate::cmd::ServeArgs;
use crate::exit::{relay_error, CliError, CliResult, SUCCESS};
use crate::output::OutputFormat;

pub fn run(args: ServeArgs, _format: OutputFormat) -> CliResult<i32> {
    let server = RelayServer::bind(&args.addr).map_err(|err| relay_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    server
        .run(&running)
        .map_err(|err| relay_error("accept failed", err))?;

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
