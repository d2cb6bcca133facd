use crate::args::Args;
use crate::error::RelayError;

use relay_core::{DEFAULT_ADDRESS, DEFAULT_TOKEN};

use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use tempfile::NamedTempFile;

fn parse(flags: &[&str]) -> Args {
    let argv = std::iter::once("relay").chain(flags.iter().copied());
    Args::try_parse_from(argv).unwrap()
}

#[test]
fn given_no_flags_when_server_config_then_defaults() {
    let config = Args::default().server_config().unwrap();

    assert_eq!(config.address(), DEFAULT_ADDRESS);
    assert_eq!(config.token.as_str(), DEFAULT_TOKEN);
}

#[test]
fn given_flags_when_parsed_then_override_defaults() {
    let args = parse(&[
        "--ip",
        "0.0.0.0",
        "--port",
        "9001",
        "--token",
        "s3cret",
        "--auth-attempt-limit",
        "3",
    ]);

    let config = args.server_config().unwrap();

    assert_eq!(config.address(), "0.0.0.0:9001");
    assert_eq!(config.token.as_str(), "s3cret");
    assert_eq!(config.auth_attempt_limit, 3);
}

/// **VALUE**: Flags win over the config file, which wins over defaults.
///
/// **BUG THIS CATCHES**: Applying the file after the flags, silently
/// discarding what the operator typed.
#[test]
fn given_config_file_and_port_flag_when_merged_then_flag_wins() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(br#"{"port": 8000, "token": "from-file"}"#)
        .unwrap();
    let path = file.path().to_string_lossy().to_string();

    let config = parse(&["--config", path.as_str(), "--port", "8100"])
        .server_config()
        .unwrap();

    assert_eq!(config.port, 8100);
    assert_eq!(config.token.as_str(), "from-file");
}

#[test]
fn given_empty_ip_flag_when_server_config_then_core_error() {
    let args = Args {
        ip: Some(String::new()),
        ..Args::default()
    };

    let result = args.server_config();

    assert!(matches!(result, Err(RelayError::Core { .. })));
}

#[test]
fn given_port_out_of_range_when_parsed_then_rejected() {
    let result = Args::try_parse_from(["relay", "--port", "70000"]);

    assert!(result.is_err());
}

#[test]
fn given_log_dir_flag_when_log_dir_then_used_verbatim() {
    let args = parse(&["--log-dir", "/tmp/relay-logs"]);

    assert_eq!(args.log_dir(), PathBuf::from("/tmp/relay-logs"));
}

#[test]
fn given_token_flag_when_debug_printed_then_hidden() {
    let args = parse(&["--token", "do-not-print"]);

    assert!(!format!("{args:?}").contains("do-not-print"));
}
