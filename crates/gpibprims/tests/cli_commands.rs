#![cfg(all(unix, feature = "cli"))]

use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Command, Output};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/gpibcli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn gpibprims(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gpibprims"))
        .arg("--log-level")
        .arg("error")
        .args(args)
        .env_remove("GPIBPRIMS_TIMEOUT")
        .env_remove("GPIBPRIMS_DEVICES")
        .env_remove("GPIBPRIMS_GATEWAY_PORT")
        .output()
        .expect("gpibprims should run")
}

fn simulated(args: &[&str]) -> Output {
    let mut all = vec!["--simulate"];
    all.extend_from_slice(args);
    gpibprims(&all)
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn ask_prints_identity_as_json() {
    let output = simulated(&["--format", "json", "ask", "gpib0,7", "*IDN?"]);

    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("reply.schema.json"));
    assert!(out.contains("\"response\":\"gpibprims,SIMULATED,7,"));
    assert!(out.contains("\"command\":\"*IDN?\""));
}

#[test]
fn send_with_read_returns_reply() {
    let output = simulated(&["--format", "raw", "send", "gpib0,9", "*IDN?", "--read"]);

    assert!(output.status.success());
    assert!(stdout(&output).starts_with("gpibprims,SIMULATED,9,"));
}

#[test]
fn send_without_read_acknowledges_framed_command() {
    let output = simulated(&["--format", "raw", "send", "gpib0,9", "*RST"]);

    assert!(output.status.success());
    assert_eq!(stdout(&output).trim_end(), "*RST\\r\\n");
}

#[test]
fn status_prints_status_byte() {
    let output = simulated(&["--format", "raw", "status", "gpib0,5"]);

    assert!(output.status.success());
    assert_eq!(stdout(&output).trim_end(), "0");
}

#[test]
fn clear_acknowledges() {
    let output = simulated(&["--format", "pretty", "clear", "gpib0,5"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("cleared"));
}

#[test]
fn read_with_nothing_queued_times_out() {
    let output = simulated(&["--timeout", "50", "read", "gpib0,7"]);

    assert_eq!(output.status.code(), Some(124));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("receive failed"));
}

#[test]
fn malformed_address_is_a_usage_error() {
    let output = simulated(&["ask", "lan[oops", "*IDN?"]);

    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn scan_finds_devices_but_skips_controller() {
    let output = simulated(&["--format", "raw", "scan", "gpib0,"]);

    assert!(output.status.success());
    let out = stdout(&output);
    let primaries: Vec<&str> = out
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .collect();
    assert_eq!(primaries.len(), 29);
    assert!(primaries.contains(&"19"));
    assert!(!primaries.contains(&"21"));
}

#[test]
fn device_directory_aliases_resolve() {
    let dir = unique_temp_dir("devices");
    let devices = dir.join("devices.json");
    std::fs::write(
        &devices,
        r#"{
            "synth": { "addr": "gpib0,19", "info": "signal generator" },
            "meter": { "addr": "gpib0,11" }
        }"#,
    )
    .expect("directory should be writable");
    let devices = devices.to_string_lossy().into_owned();

    let output = simulated(&["--devices", &devices, "--format", "json", "ask", "synth", "*IDN?"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("\"device\":\"synth\""));
    assert!(out.contains("\"address\":\"gpib0,19\""));
    assert!(out.contains("gpibprims,SIMULATED,19,"));

    let listing = simulated(&["--devices", &devices, "--format", "raw", "devices"]);
    assert!(listing.status.success());
    let out = stdout(&listing);
    assert!(out.contains("meter\tgpib0,11"));
    assert!(out.contains("synth\tgpib0,19\tsignal generator"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn devices_without_directory_is_a_usage_error() {
    let output = simulated(&["devices"]);

    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn watch_stops_after_count() {
    let output = simulated(&[
        "--format", "raw", "watch", "gpib0,3", "*IDN?", "--interval", "10ms", "--count", "2",
    ]);

    assert!(output.status.success());
    let out = stdout(&output);
    assert_eq!(out.lines().count(), 2);
    assert!(out
        .lines()
        .all(|line| line.starts_with("gpibprims,SIMULATED,3,")));
}

#[test]
fn version_reports_package_version() {
    let output = gpibprims(&["version"]);

    assert!(output.status.success());
    assert_eq!(
        stdout(&output).trim_end(),
        format!("gpibprims {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn unreachable_gateway_is_a_transport_error() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
        listener.local_addr().expect("local addr").port()
    };

    let output = gpibprims(&[
        "--gateway-port",
        &port.to_string(),
        "status",
        "lan[127.0.0.1]:gpib0,7",
    ]);

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("status failed"));
}
