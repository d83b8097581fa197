mod cmd;
mod directory;
mod exit;
mod logging;
mod output;

use std::path::PathBuf;

use clap::Parser;
use gpibprims_binding::DEFAULT_GATEWAY_PORT;

use crate::cmd::{Command, Context, Settings};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "gpibprims", version, about = "GPIB instrument CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    /// Default I/O timeout for opened devices, in milliseconds.
    #[arg(long, value_name = "MS", env = "GPIBPRIMS_TIMEOUT", global = true)]
    timeout: Option<u32>,

    /// Trace every transaction (send, receive, prompt, status) on stderr.
    #[arg(long, global = true)]
    diags: bool,

    /// TCP port of LAN gateways.
    #[arg(
        long,
        value_name = "PORT",
        env = "GPIBPRIMS_GATEWAY_PORT",
        default_value_t = DEFAULT_GATEWAY_PORT,
        global = true
    )]
    gateway_port: u16,

    /// Device directory (JSON object of alias -> {addr, info}).
    #[arg(long, value_name = "FILE", env = "GPIBPRIMS_DEVICES", global = true)]
    devices: Option<PathBuf>,

    /// Use an in-memory bus whose devices answer *IDN? and *STB?.
    #[arg(long, global = true)]
    simulate: bool,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level, cli.diags);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let settings = Settings {
        timeout_ms: cli.timeout,
        diagnostics: cli.diags,
        gateway_port: cli.gateway_port,
        devices: cli.devices,
        simulate: cli.simulate,
    };
    let result = Context::build(settings).and_then(|ctx| cmd::run(cli.command, &ctx, format));

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "gpibprims",
            "send",
            "lan[158.154.1.110]:19",
            "*IDN?",
            "--read",
            "--term",
            "10",
        ])
        .expect("send args should parse");

        match cli.command {
            Command::Send(args) => {
                assert!(args.read);
                assert_eq!(args.term, 10);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::try_parse_from([
            "gpibprims",
            "status",
            "gpib0,7",
            "--simulate",
            "--timeout",
            "500",
            "--diags",
        ])
        .expect("status args should parse");

        assert!(cli.simulate);
        assert!(cli.diags);
        assert_eq!(cli.timeout, Some(500));
        assert!(matches!(cli.command, Command::Status(_)));
    }

    #[test]
    fn rejects_out_of_range_terminator() {
        let err = Cli::try_parse_from(["gpibprims", "read", "gpib0,7", "--term", "300"])
            .expect_err("terminator must fit in a byte");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_watch_subcommand() {
        let cli = Cli::try_parse_from([
            "gpibprims",
            "watch",
            "synth",
            "FREQ?",
            "--interval",
            "250ms",
            "--count",
            "3",
        ])
        .expect("watch args should parse");
        assert!(matches!(cli.command, Command::Watch(_)));
    }
}
