//! Wire envelope codec.
//!
//! Every message on the wire is one JSON object, either a request
//! (`method` + optional `params`), a success reply (`result`) or an error
//! reply (`error`). All three share an optional, opaque correlation `id`.
//!
//! Decoding is permissive: unknown fields are ignored and `params` is only
//! inspected for a leading string. Encoding produces the compact JSON text
//! together with a flag telling the caller whether the message carries a
//! correlation id.

mod digest;

pub use digest::{digest_hex, hash_match};

use crate::error::envelope::EnvelopeError;

use common::ErrorLocation;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Malformed JSON.
pub const PARSE_ERROR: i64 = -32700;
/// Method not valid for the current stage.
pub const INVALID_REQUEST: i64 = -32600;
/// A reply was received before the handshake completed.
pub const AUTHORIZATION_REQUIRED: i64 = 100;
/// The authorization hash did not match.
pub const WRONG_HASH: i64 = 102;

/// Body of an error reply.
///
/// Missing fields decode as zero values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorObject {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// A decoded inbound message.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub error: Option<ErrorObject>,
}

impl Envelope {
    /// The request method, if present and non-empty.
    pub fn method(&self) -> Option<&str> {
        self.method.as_deref().filter(|method| !method.is_empty())
    }

    /// The reply result, if present and non-empty.
    pub fn result(&self) -> Option<&str> {
        self.result.as_deref().filter(|result| !result.is_empty())
    }

    /// The single request parameter.
    ///
    /// Only a list whose first element is a string yields a parameter;
    /// every other shape reads as the empty string.
    pub fn param(&self) -> &str {
        match &self.params {
            Some(Value::Array(items)) => items.first().and_then(Value::as_str).unwrap_or(""),
            _ => "",
        }
    }

    /// The correlation id when it is a string.
    pub fn id_str(&self) -> Option<&str> {
        self.id.as_ref().and_then(Value::as_str)
    }
}

/// Serialized outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub text: String,
    /// False when the message carries no `id` (absent or null).
    pub has_correlation_id: bool,
}

#[derive(Serialize)]
struct RequestWire<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a Value>,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<[&'a str; 1]>,
}

#[derive(Serialize)]
struct ReplyWire<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a Value>,
    result: &'a str,
}

// `id` is always written: `null` tells the peer we could not correlate.
#[derive(Serialize)]
struct ErrorWire<'a> {
    id: Option<&'a Value>,
    error: ErrorObject,
}

/// Decode one line into an [`Envelope`].
///
/// # Errors
///
/// Returns [`EnvelopeError::Decode`] when the line is not a JSON object of
/// the expected shape (e.g. a numeric `result` or a string `error`).
pub fn decode(line: &str) -> Result<Envelope, EnvelopeError> {
    // A bare `null` decodes to an envelope with nothing in it.
    let envelope: Option<Envelope> = serde_json::from_str(line)?;
    Ok(envelope.unwrap_or_default())
}

/// Build a request envelope; `params` is omitted for an empty `param`.
pub fn encode_request(
    method: &str,
    param: &str,
    id: Option<&Value>,
) -> Result<Encoded, EnvelopeError> {
    let id = correlation(id);
    let wire = RequestWire {
        id,
        method,
        params: (!param.is_empty()).then_some([param]),
    };
    serialize(&wire, id.is_some())
}

/// Build a success reply.
pub fn encode_reply(result: &str, id: Option<&Value>) -> Result<Encoded, EnvelopeError> {
    let id = correlation(id);
    serialize(&ReplyWire { id, result }, id.is_some())
}

/// Build an error reply. `id` is carried through, `null` when absent.
pub fn encode_error(
    code: i64,
    message: impl Into<String>,
    id: Option<&Value>,
) -> Result<Encoded, EnvelopeError> {
    let id = correlation(id);
    let wire = ErrorWire {
        id,
        error: ErrorObject {
            code,
            message: message.into(),
        },
    };
    serialize(&wire, id.is_some())
}

fn correlation(id: Option<&Value>) -> Option<&Value> {
    id.filter(|value| !value.is_null())
}

#[track_caller]
fn serialize<T: Serialize>(wire: &T, has_correlation_id: bool) -> Result<Encoded, EnvelopeError> {
    let text = serde_json::to_string(wire).map_err(|e| EnvelopeError::Encode {
        message: e.to_string(),
        location: ErrorLocation::caller(),
    })?;
    Ok(Encoded {
        text,
        has_correlation_id,
    })
}
