// Unit tests for the envelope codec.

use crate::envelope::{
    self, INVALID_REQUEST, PARSE_ERROR, WRONG_HASH, decode, digest_hex, encode_error,
    encode_reply, encode_request, hash_match,
};
use crate::error::envelope::EnvelopeError;

use serde_json::{Value, json};

// ============================================
// DECODE
// ============================================

#[test]
fn given_request_line_when_decode_then_fields_are_populated() {
    let request = decode(r#"{"id":"7","method":"authorization","params":["abc"]}"#).unwrap();

    assert_eq!(request.id_str(), Some("7"));
    assert_eq!(request.method(), Some("authorization"));
    assert_eq!(request.param(), "abc");
    assert!(request.result().is_none());
    assert!(request.error.is_none());
}

/// **VALUE**: Only the first string of a list counts as the parameter.
///
/// **BUG THIS CATCHES**: Treating `"params":"abc"` or `[1]` as a parameter
/// would let malformed authorization attempts reach the hash comparison.
#[test]
fn given_non_list_params_when_param_then_empty() {
    let scalar = decode(r#"{"method":"authorization","params":"abc"}"#).unwrap();
    let numeric = decode(r#"{"method":"authorization","params":[1]}"#).unwrap();
    let empty = decode(r#"{"method":"authorization","params":[]}"#).unwrap();

    assert_eq!(scalar.param(), "");
    assert_eq!(numeric.param(), "");
    assert_eq!(empty.param(), "");
}

#[test]
fn given_empty_method_and_result_when_decode_then_treated_as_absent() {
    let request = decode(r#"{"method":"","result":""}"#).unwrap();

    assert!(request.method().is_none());
    assert!(request.result().is_none());
}

#[test]
fn given_numeric_id_when_decode_then_id_is_kept_but_not_a_string() {
    let request = decode(r#"{"id":5,"method":"ping"}"#).unwrap();

    assert_eq!(request.id, Some(json!(5)));
    assert!(request.id_str().is_none());
}

#[test]
fn given_null_line_when_decode_then_empty_envelope() {
    let request = decode("null").unwrap();

    assert!(request.method().is_none());
    assert!(request.id.is_none());
}

#[test]
fn given_invalid_json_when_decode_then_decode_error() {
    let result = decode("{not json");

    assert!(matches!(result, Err(EnvelopeError::Decode { .. })));
}

#[test]
fn given_wrong_field_type_when_decode_then_decode_error() {
    let result = decode(r#"{"result":42}"#);

    assert!(matches!(result, Err(EnvelopeError::Decode { .. })));
}

// ============================================
// ENCODE
// ============================================

#[test]
fn given_reply_without_id_when_encode_then_id_is_omitted() {
    let encoded = encode_reply("authorized", None).unwrap();

    assert_eq!(encoded.text, r#"{"result":"authorized"}"#);
    assert!(!encoded.has_correlation_id);
}

#[test]
fn given_reply_with_id_when_encode_then_id_comes_first() {
    let id = Value::from("1");
    let encoded = encode_reply("upgraded", Some(&id)).unwrap();

    assert_eq!(encoded.text, r#"{"id":"1","result":"upgraded"}"#);
    assert!(encoded.has_correlation_id);
}

/// **VALUE**: A `null` id is the same as no id.
///
/// **BUG THIS CATCHES**: Echoing `"id":null` on success replies, or
/// counting it as a correlation id when deciding whether to reply.
#[test]
fn given_null_id_when_encode_reply_then_treated_as_absent() {
    let encoded = encode_reply("ok", Some(&Value::Null)).unwrap();

    assert_eq!(encoded.text, r#"{"result":"ok"}"#);
    assert!(!encoded.has_correlation_id);
}

#[test]
fn given_error_without_id_when_encode_then_id_is_null() {
    let encoded = encode_error(PARSE_ERROR, "Wrong JSON: oops", None).unwrap();

    assert_eq!(
        encoded.text,
        r#"{"id":null,"error":{"code":-32700,"message":"Wrong JSON: oops"}}"#
    );
}

#[test]
fn given_error_with_id_when_encode_then_id_is_echoed() {
    let id = json!(3);
    let encoded = encode_error(WRONG_HASH, "forbidden: wrong hash", Some(&id)).unwrap();

    let parsed: Value = serde_json::from_str(&encoded.text).unwrap();
    assert_eq!(parsed["id"], json!(3));
    assert_eq!(parsed["error"]["code"], json!(102));
}

#[test]
fn given_request_without_param_when_encode_then_params_omitted() {
    let encoded = encode_request("remote_log", "", None).unwrap();

    assert_eq!(encoded.text, r#"{"method":"remote_log"}"#);
}

#[test]
fn given_request_with_param_when_encode_then_params_is_single_element_list() {
    let id = Value::from("pong");
    let encoded = encode_request("ping", "1.5", Some(&id)).unwrap();

    assert_eq!(
        encoded.text,
        r#"{"id":"pong","method":"ping","params":["1.5"]}"#
    );
}

#[test]
fn given_encoded_error_when_decoded_then_error_object_survives() {
    let encoded = encode_error(INVALID_REQUEST, "nope", None).unwrap();
    let decoded = envelope::decode(&encoded.text).unwrap();

    let error = decoded.error.unwrap();
    assert_eq!(error.code, INVALID_REQUEST);
    assert_eq!(error.message, "nope");
}

/// **VALUE**: Peers that omit half of an error object are still heard.
///
/// **BUG THIS CATCHES**: Requiring both fields turns an inbound error
/// notification into a `-32700` reply.
#[test]
fn given_error_object_without_code_when_decode_then_code_defaults_to_zero() {
    let decoded = decode(r#"{"error":{"message":"boom"}}"#).unwrap();

    let error = decoded.error.unwrap();
    assert_eq!(error.code, 0);
    assert_eq!(error.message, "boom");
}

#[test]
fn given_empty_error_object_when_decode_then_both_fields_default() {
    let decoded = decode(r#"{"error":{}}"#).unwrap();

    let error = decoded.error.unwrap();
    assert_eq!(error.code, 0);
    assert!(error.message.is_empty());
}

// ============================================
// DIGEST
// ============================================

#[test]
fn given_secret_when_digest_hex_then_lowercase_sha512() {
    let digest = digest_hex("hello");

    assert_eq!(digest.len(), 128);
    assert!(digest.starts_with("9b71d224bd62f378"));
    assert!(digest.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
}

#[test]
fn given_uppercase_hex_when_hash_match_then_rejected() {
    let digest = digest_hex("hello");

    assert!(hash_match("hello", &digest));
    assert!(!hash_match("hello", &digest.to_uppercase()));
    assert!(!hash_match("hello", "hello"));
}
