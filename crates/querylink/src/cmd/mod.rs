use std::time::Duration;

use clap::{Args, Subcommand};
use querylink_channel::{ChannelConfig, DEFAULT_HOST, DEFAULT_PORT};

use crate::exit::{io_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod repl;
pub mod search;
pub mod status;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Submit one query and print its results.
    Search(SearchArgs),
    /// Read queries from stdin and print events as they arrive.
    Repl(ReplArgs),
    /// Probe the backend and print the connection status.
    Status(StatusArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, backend: &BackendArgs, format: OutputFormat) -> CliResult<i32> {
    if let Command::Version(args) = command {
        return version::run(args);
    }

    let config = backend.config()?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("failed to start runtime", err))?;
    runtime.block_on(dispatch(command, config, format))
}

async fn dispatch(command: Command, config: ChannelConfig, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Search(args) => search::run(args, config, format).await,
        Command::Repl(args) => repl::run(args, config, format).await,
        Command::Status(args) => status::run(args, config, format).await,
        Command::Version(args) => version::run(args),
    }
}

/// Where the backend lives and how to reach it.
#[derive(Args, Debug)]
pub struct BackendArgs {
    /// Backend host.
    #[arg(long, env = "QUERYLINK_HOST", default_value = DEFAULT_HOST, global = true)]
    pub host: String,
    /// Backend port.
    #[arg(long, env = "QUERYLINK_PORT", default_value_t = DEFAULT_PORT, global = true)]
    pub port: u16,
    /// Delay before reconnecting after a failure (e.g. 5s, 500ms).
    #[arg(
        long,
        env = "QUERYLINK_RECONNECT_DELAY",
        default_value = "5s",
        global = true
    )]
    pub reconnect_delay: String,
}

impl BackendArgs {
    pub fn config(&self) -> CliResult<ChannelConfig> {
        Ok(ChannelConfig::default()
            .with_backend(self.host.clone(), self.port)
            .with_reconnect_delay(parse_duration(&self.reconnect_delay)?))
    }
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Query text, sent as one line.
    pub query: String,
    /// Maximum time to wait for results (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug, Default)]
pub struct ReplArgs {}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Connection timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
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
        _ => Ok(Duration::from_secs(value)),
    }
}
