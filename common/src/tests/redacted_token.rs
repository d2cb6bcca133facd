// Unit tests for RedactedToken output hygiene

use crate::RedactedToken;

/// **VALUE**: The shared secret must never leak through logging.
///
/// **BUG THIS CATCHES**: Would catch a derived `Debug`/`Display` that prints the value.
#[test]
fn given_token_when_formatted_then_value_is_hidden() {
    let token = RedactedToken::new("hello");

    assert_eq!(format!("{token:?}"), "RedactedToken([REDACTED])");
    assert_eq!(token.to_string(), "[REDACTED TOKEN]");
    assert_eq!(token.as_str(), "hello");
    assert_eq!(token.len(), 5);
}

#[test]
fn given_empty_token_when_displayed_then_reports_empty() {
    let token = RedactedToken::default();

    assert!(token.is_empty());
    assert_eq!(token.to_string(), "[EMPTY TOKEN]");
}

/// **VALUE**: Config files carry the token as a plain JSON string.
#[test]
fn given_json_string_when_deserialized_then_token_is_populated() {
    let token: RedactedToken = serde_json::from_str("\"s3cret\"").unwrap();

    assert_eq!(token.as_str(), "s3cret");
}

/// **BUG THIS CATCHES**: Would catch someone deriving `Serialize`, which would
/// write the secret into any JSON dump of the config.
#[test]
fn given_token_when_serialized_then_fails() {
    let token = RedactedToken::new("hello");

    let result = serde_json::to_string(&token);

    assert!(result.is_err(), "Serializing the token must be refused");
    assert!(result.unwrap_err().to_string().contains("RedactedToken"));
}

#[test]
fn given_command_line_value_when_parsed_then_token_is_populated() {
    let token: RedactedToken = "from-flag".parse().unwrap();

    assert_eq!(token.as_str(), "from-flag");
}
