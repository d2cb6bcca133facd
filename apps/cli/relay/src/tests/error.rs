use crate::error::RelayError;

use relay_core::error::config::ConfigError;

use common::ErrorLocation;

#[test]
fn given_relay_error_when_displayed_then_kind_message_and_location() {
    let err = RelayError::Console {
        message: String::from("stdin gone"),
        location: ErrorLocation::caller(),
    };

    let text = err.to_string();

    assert!(text.starts_with("Console Error: stdin gone ["));
    assert!(text.contains("error.rs:"));
}

/// **VALUE**: Core failures keep their message when they reach the binary.
///
/// **BUG THIS CATCHES**: A `From` impl that drops the inner message, leaving
/// the operator with "Core Error" and nothing else.
#[test]
fn given_config_error_when_converted_then_core_variant_keeps_reason() {
    let config_error = ConfigError::ValidationError {
        location: ErrorLocation::caller(),
        reason: String::from("ip cannot be empty"),
    };

    let err = RelayError::from(config_error);

    match err {
        RelayError::Core { message, .. } => assert!(message.contains("ip cannot be empty")),
        other => panic!("Expected Core error, got {other:?}"),
    }
}
