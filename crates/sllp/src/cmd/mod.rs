use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use sllp_client::{ClientConfig, Statistics, TransactionConfig};
use sllp_frame::{Framing, ValueKind};
use sllp_transport::{Endpoint, TransportConfig};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod list;
pub mod read;
pub mod simulate;
pub mod supply;
pub mod version;
pub mod write;

/// Port the simulator listens on unless told otherwise.
pub const DEFAULT_SIMULATOR_ENDPOINT: &str = "127.0.0.1:6791";

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a simulated instrument.
    Simulate(SimulateArgs),
    /// Read a variable or a group.
    Read(ReadArgs),
    /// Write a variable or a group.
    Write(WriteArgs),
    /// List the variables, groups and curves a device exposes.
    List(ListArgs),
    /// Drive a power supply over control frames.
    Supply(SupplyArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Simulate(args) => simulate::run(args, format),
        Command::Read(args) => read::run(args, format),
        Command::Write(args) => write::run(args, format),
        Command::List(args) => list::run(args, format),
        Command::Supply(args) => supply::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// How to reach an instrument and how hard to try.
#[derive(Args, Debug, Clone)]
pub struct ConnectArgs {
    /// Instrument endpoint: host:port or unix:/path.
    pub endpoint: String,
    /// Per-attempt reply timeout (e.g. 100ms, 2s).
    #[arg(long, default_value = "100ms")]
    pub timeout: String,
    /// Attempts per transaction before giving up.
    #[arg(long, default_value_t = 10)]
    pub attempts: u32,
    /// Connection establishment timeout.
    #[arg(long, default_value = "5s")]
    pub connect_timeout: String,
    /// Fail instead of reconnecting once when the link drops.
    #[arg(long)]
    pub no_reconnect: bool,
    /// Print transaction statistics to stderr when done.
    #[arg(long)]
    pub stats: bool,
}

impl ConnectArgs {
    pub fn client_config(&self, framing: Framing) -> CliResult<ClientConfig> {
        if self.attempts == 0 {
            return Err(CliError::usage("--attempts must be at least 1"));
        }
        let mut config = ClientConfig::new(parse_endpoint(&self.endpoint)?, framing);
        config.transaction = TransactionConfig {
            timeout: parse_duration(&self.timeout)?,
            max_attempts: self.attempts,
            reconnect: !self.no_reconnect,
        };
        config.transport = TransportConfig {
            connect_timeout: parse_duration(&self.connect_timeout)?,
            ..TransportConfig::default()
        };
        Ok(config)
    }

    pub fn report(&self, stats: &Statistics) {
        if self.stats {
            eprintln!("{stats}");
        }
    }
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Endpoint to listen on: host:port or unix:/path.
    #[arg(default_value = DEFAULT_SIMULATOR_ENDPOINT)]
    pub endpoint: String,
    /// Which instrument to simulate.
    #[arg(long, value_enum, default_value_t = FramingArg::Variable)]
    pub framing: FramingArg,
    /// JSON device description (variable framing only).
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Readback step per request while slew limiting is on (control framing).
    #[arg(long, default_value_t = 0.5)]
    pub slew_step: f64,
    /// Connections served at once.
    #[arg(long, default_value_t = 16)]
    pub max_connections: usize,
    /// How often idle loops check for shutdown.
    #[arg(long, default_value = "50ms")]
    pub poll_interval: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FramingArg {
    /// FDB text records (power supply).
    Control,
    /// Binary variable frames (register-mapped device).
    Variable,
}

impl From<FramingArg> for Framing {
    fn from(arg: FramingArg) -> Self {
        match arg {
            FramingArg::Control => Framing::Control,
            FramingArg::Variable => Framing::Variable,
        }
    }
}

#[derive(Args, Debug)]
pub struct ReadArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Variable id, or group id with --group.
    pub id: u8,
    /// Read a whole group instead of one variable.
    #[arg(long)]
    pub group: bool,
    /// Interpret the bytes as this numeric kind.
    #[arg(long, value_parser = parse_kind)]
    pub kind: Option<ValueKind>,
}

#[derive(Args, Debug)]
pub struct WriteArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Variable id, or group id with --group.
    pub id: u8,
    /// Value to write: a number, or hex octets with --hex.
    #[arg(allow_negative_numbers = true)]
    pub value: String,
    /// Write a whole group; the value is the concatenated raw members in hex.
    #[arg(long)]
    pub group: bool,
    /// Take the value as raw hex octets.
    #[arg(long, conflicts_with = "kind")]
    pub hex: bool,
    /// Encode the number as this kind instead of the catalog default.
    #[arg(long, value_parser = parse_kind)]
    pub kind: Option<ValueKind>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Args, Debug)]
pub struct SupplyArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    #[command(subcommand)]
    pub action: SupplyAction,
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum SupplyAction {
    /// Read status, setpoint and readback.
    Status,
    /// Switch the output on.
    On,
    /// Switch the output off.
    Off,
    /// Clear latched faults.
    Reset,
    /// Write a new current setpoint.
    Set {
        #[arg(allow_negative_numbers = true)]
        current: f64,
        /// Enable slew limiting before writing the setpoint.
        #[arg(long)]
        slew: bool,
    },
    /// Switch slew-rate limiting.
    Slew {
        #[arg(value_enum)]
        state: Switch,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_endpoint(input: &str) -> CliResult<Endpoint> {
    input
        .parse()
        .map_err(|err| CliError::new(USAGE, format!("{err}")))
}

fn parse_kind(input: &str) -> Result<ValueKind, String> {
    input.parse().map_err(|err| format!("{err}"))
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

    Ok(match unit {
        "ms" => Duration::from_millis(value),
        _ => Duration::from_secs(value),
    })
}
