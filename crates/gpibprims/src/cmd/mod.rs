use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use gpibprims_binding::{Binding, LanGateway, SimulatedBus};
use gpibprims_session::{SessionConfig, SessionManager};

use crate::directory::Directory;
use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod ask;
pub mod clear;
pub mod devices;
pub mod read;
pub mod scan;
pub mod send;
pub mod status;
pub mod version;
pub mod watch;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send a command and print the reply.
    Ask(AskArgs),
    /// Send a command, optionally reading one reply.
    Send(SendArgs),
    /// Read one reply.
    Read(ReadArgs),
    /// Serial-poll the status byte.
    Status(DeviceArgs),
    /// Device clear.
    Clear(DeviceArgs),
    /// Find devices on a controller's bus.
    Scan(ScanArgs),
    /// Repeat a query until interrupted.
    Watch(WatchArgs),
    /// List the device directory.
    Devices,
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, ctx: &Context, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Ask(args) => ask::run(args, ctx, format),
        Command::Send(args) => send::run(args, ctx, format),
        Command::Read(args) => read::run(args, ctx, format),
        Command::Status(args) => status::run(args, ctx, format),
        Command::Clear(args) => clear::run(args, ctx, format),
        Command::Scan(args) => scan::run(args, ctx, format),
        Command::Watch(args) => watch::run(args, ctx, format),
        Command::Devices => devices::run(ctx, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct DeviceArgs {
    /// Bus address or device directory alias.
    pub device: String,
}

#[derive(Args, Debug)]
pub struct AskArgs {
    /// Bus address or device directory alias.
    pub device: String,
    /// Command to send; CRLF is appended.
    pub command: String,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Bus address or device directory alias.
    pub device: String,
    /// Command to send; CRLF is appended.
    pub command: String,
    /// Read one reply after sending.
    #[arg(long)]
    pub read: bool,
    /// Termination character code for --read.
    #[arg(long, default_value_t = b'\n')]
    pub term: u8,
}

#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Bus address or device directory alias.
    pub device: String,
    /// Termination character code.
    #[arg(long, default_value_t = b'\n')]
    pub term: u8,
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Controller bus address (e.g. lan[128.149.22.44]:gpib0).
    pub controller: String,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Bus address or device directory alias.
    pub device: String,
    /// Query to repeat.
    pub command: String,
    /// Pause between queries (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s")]
    pub interval: String,
    /// Stop after N replies.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Global options that shape the session manager.
#[derive(Debug)]
pub struct Settings {
    pub timeout_ms: Option<u32>,
    pub diagnostics: bool,
    pub gateway_port: u16,
    pub devices: Option<PathBuf>,
    pub simulate: bool,
}

/// Everything a subcommand needs: the session manager and the directory.
pub struct Context {
    pub manager: SessionManager<Box<dyn Binding>>,
    pub directory: Directory,
}

impl Context {
    pub fn build(settings: Settings) -> CliResult<Self> {
        let directory = match &settings.devices {
            Some(path) => Directory::load(path)?,
            None => Directory::default(),
        };

        let binding: Box<dyn Binding> = if settings.simulate {
            Box::new(SimulatedBus::auto_attach())
        } else {
            Box::new(LanGateway::with_port(settings.gateway_port))
        };

        let defaults = SessionConfig::default();
        let config = SessionConfig {
            default_timeout_ms: settings.timeout_ms.unwrap_or(defaults.default_timeout_ms),
            diagnostics: settings.diagnostics,
            ..defaults
        };

        Ok(Self {
            manager: SessionManager::with_config(binding, config),
            directory,
        })
    }

    /// Resolve a device argument to a bus address.
    pub fn resolve(&self, device: &str) -> CliResult<String> {
        self.directory.resolve(device)
    }
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

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(simulate: bool) -> Settings {
        Settings {
            timeout_ms: Some(1_500),
            diagnostics: false,
            gateway_port: 1234,
            devices: None,
            simulate,
        }
    }

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn context_selects_binding_and_timeout() {
        let simulated = Context::build(settings(true)).unwrap();
        assert_eq!(simulated.manager.binding().binding_name(), "simulated");
        assert_eq!(simulated.manager.default_timeout(), 1_500);

        let gateway = Context::build(settings(false)).unwrap();
        assert_eq!(gateway.manager.binding().binding_name(), "lan-gateway");
    }

    #[test]
    fn missing_directory_is_a_usage_error() {
        let err = Context::build(Settings {
            devices: Some(PathBuf::from("/nonexistent/gpibprims-devices.json")),
            ..settings(true)
        })
        .err()
        .unwrap();
        assert_eq!(err.code, USAGE);
    }
}
