use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod host;
pub mod send;
pub mod serve;
pub mod version;
pub mod watch;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the relay server.
    Serve(ServeArgs),
    /// Run a demo host mirroring one operation through a relay.
    Host(HostArgs),
    /// Attach as a client and print received messages.
    Watch(WatchArgs),
    /// Inject a parameter_update through the relay.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Host(args) => host::run(args, format),
        Command::Watch(args) => watch::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind, e.g. 127.0.0.1:9473.
    pub addr: String,
}

#[derive(Args, Debug)]
pub struct HostArgs {
    /// Relay address to connect to.
    pub addr: String,
    /// Operation definition file: {"id", "title", "schema", "state"}.
    /// Defaults to a built-in demo operation.
    #[arg(long, value_name = "FILE")]
    pub operation: Option<PathBuf>,
    /// Delay between reconnect attempts (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub retry_delay: String,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Relay address to connect to.
    pub addr: String,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Relay address to connect to.
    pub addr: String,
    /// Operation id the values belong to.
    #[arg(long)]
    pub id: String,
    /// Parameter assignment, name=value. Repeatable. Values parse as
    /// bool, number, comma-separated number tuple, or plain text.
    #[arg(long = "set", value_name = "NAME=VALUE", required = true)]
    pub set: Vec<String>,
    /// Wait for the relayed copy of the update and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}
