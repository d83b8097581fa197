use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use gpibprims_session::FoundDevice;
use serde::Serialize;

use crate::directory::Directory;

const SCHEMA_BASE: &str = "https://schemas.3leaps.dev/gpibprims/cli/v1";

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One completed exchange with a device.
#[derive(Serialize)]
pub struct Reply<'a> {
    pub device: &'a str,
    pub address: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<&'a str>,
    pub response: &'a str,
}

#[derive(Serialize)]
struct ReplyOutput<'a> {
    schema_id: String,
    #[serde(flatten)]
    reply: &'a Reply<'a>,
    timestamp: String,
}

pub fn print_reply(reply: &Reply<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ReplyOutput {
                schema_id: format!("{SCHEMA_BASE}/reply.schema.json"),
                reply,
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DEVICE", "ADDRESS", "COMMAND", "RESPONSE"])
                .add_row(vec![
                    reply.device.to_string(),
                    reply.address.to_string(),
                    reply.command.map(escape).unwrap_or_default(),
                    reply.response.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => match reply.command {
            Some(command) => println!(
                "device={} address={} command={} response={}",
                reply.device,
                reply.address,
                escape(command),
                reply.response
            ),
            None => println!(
                "device={} address={} response={}",
                reply.device, reply.address, reply.response
            ),
        },
        OutputFormat::Raw => print_line(reply.response),
    }
}

#[derive(Serialize)]
struct StatusOutput<'a> {
    schema_id: String,
    device: &'a str,
    address: &'a str,
    status_byte: u8,
    service_request: bool,
    timestamp: String,
}

pub fn print_status(device: &str, address: &str, status_byte: u8, format: OutputFormat) {
    // Bit 6 of the status byte is the RQS (service request) bit.
    let service_request = status_byte & 0x40 != 0;
    match format {
        OutputFormat::Json => print_json(&StatusOutput {
            schema_id: format!("{SCHEMA_BASE}/status.schema.json"),
            device,
            address,
            status_byte,
            service_request,
            timestamp: now_unix_seconds(),
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DEVICE", "ADDRESS", "STATUS", "BITS", "RQS"])
                .add_row(vec![
                    device.to_string(),
                    address.to_string(),
                    status_byte.to_string(),
                    format!("{status_byte:08b}"),
                    service_request.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!(
            "device={device} address={address} status={status_byte} bits={status_byte:08b} rqs={service_request}"
        ),
        OutputFormat::Raw => print_line(&status_byte.to_string()),
    }
}

#[derive(Serialize)]
struct AckOutput<'a> {
    schema_id: String,
    device: &'a str,
    address: &'a str,
    result: String,
    timestamp: String,
}

/// Print the acknowledgement string of a command that returns no data.
pub fn print_ack(device: &str, address: &str, ack: &str, format: OutputFormat) {
    let result = escape(ack);
    match format {
        OutputFormat::Json => print_json(&AckOutput {
            schema_id: format!("{SCHEMA_BASE}/ack.schema.json"),
            device,
            address,
            result,
            timestamp: now_unix_seconds(),
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DEVICE", "ADDRESS", "RESULT"])
                .add_row(vec![device.to_string(), address.to_string(), result]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("device={device} address={address} result={result}"),
        OutputFormat::Raw => print_line(&result),
    }
}

#[derive(Serialize)]
struct FoundOutput<'a> {
    primary: u8,
    address: &'a str,
    status_byte: u8,
}

#[derive(Serialize)]
struct ScanOutput<'a> {
    schema_id: String,
    controller: &'a str,
    devices: Vec<FoundOutput<'a>>,
    timestamp: String,
}

pub fn print_scan(controller: &str, found: &[FoundDevice], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&ScanOutput {
            schema_id: format!("{SCHEMA_BASE}/scan.schema.json"),
            controller,
            devices: found
                .iter()
                .map(|device| FoundOutput {
                    primary: device.primary,
                    address: &device.address,
                    status_byte: device.status_byte,
                })
                .collect(),
            timestamp: now_unix_seconds(),
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PRIMARY", "ADDRESS", "STATUS"]);
            for device in found {
                table.add_row(vec![
                    device.primary.to_string(),
                    device.address.clone(),
                    device.status_byte.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for device in found {
                println!(
                    "primary={} address={} status={}",
                    device.primary, device.address, device.status_byte
                );
            }
        }
        OutputFormat::Raw => {
            for device in found {
                print_line(&format!("{} {}", device.primary, device.status_byte));
            }
        }
    }
}

#[derive(Serialize)]
struct DirectoryEntryOutput<'a> {
    alias: &'a str,
    addr: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    info: Option<&'a str>,
}

#[derive(Serialize)]
struct DirectoryOutput<'a> {
    schema_id: String,
    devices: Vec<DirectoryEntryOutput<'a>>,
}

pub fn print_directory(directory: &Directory, format: OutputFormat) {
    let rows: Vec<DirectoryEntryOutput<'_>> = directory
        .entries()
        .map(|(alias, entry)| DirectoryEntryOutput {
            alias,
            addr: &entry.addr,
            info: entry.info.as_deref(),
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&DirectoryOutput {
            schema_id: format!("{SCHEMA_BASE}/devices.schema.json"),
            devices: rows,
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ALIAS", "ADDRESS", "INFO"]);
            for row in rows {
                table.add_row(vec![
                    row.alias.to_string(),
                    row.addr.to_string(),
                    row.info.unwrap_or_default().to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for row in rows {
                match row.info {
                    Some(info) => println!("{}\t{}\t{}", row.alias, row.addr, info),
                    None => println!("{}\t{}", row.alias, row.addr),
                }
            }
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn print_line(text: &str) {
    let mut out = std::io::stdout();
    let _ = writeln!(out, "{text}");
    let _ = out.flush();
}

fn escape(text: &str) -> String {
    text.escape_debug().to_string()
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
