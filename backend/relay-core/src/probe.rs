//! Round-trip latency probe.
//!
//! The console sends `{"id":"pong","method":"ping","params":["<now>"]}`;
//! an active peer echoes the parameter back as the `result` of a reply
//! carrying the same id, and the difference to the current clock is the
//! round-trip time.

use crate::envelope::{self, Encoded};
use crate::error::envelope::EnvelopeError;

use std::fmt::{Display, Formatter, Result as FormatResult};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

pub const PING_METHOD: &str = "ping";

/// Correlation id reserved for latency probes.
pub const PONG_ID: &str = "pong";

/// Below this many milliseconds the latency keeps two decimals.
const FINE_GRAINED_BELOW_MS: f64 = 2.0;

/// Wall-clock time in seconds since the Unix epoch.
pub fn now_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or_default()
}

/// Build a ping request stamped with the current time.
pub fn build_ping() -> Result<Encoded, EnvelopeError> {
    build_ping_at(now_seconds())
}

/// Build a ping request stamped with `now` (seconds).
pub fn build_ping_at(now: f64) -> Result<Encoded, EnvelopeError> {
    let id = Value::from(PONG_ID);
    envelope::encode_request(PING_METHOD, &format!("{now:.6}"), Some(&id))
}

/// Measured round-trip time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Latency {
    millis: f64,
}

impl Latency {
    pub fn from_millis(millis: f64) -> Self {
        Self { millis }
    }

    pub fn millis(&self) -> f64 {
        self.millis
    }
}

impl Display for Latency {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        if self.millis < FINE_GRAINED_BELOW_MS {
            write!(formatter, "{:.2}", self.millis)
        } else {
            write!(formatter, "{:.0}", self.millis)
        }
    }
}

/// Interpret an echoed probe.
///
/// Returns `None` unless `id` is `"pong"` and `result` parses back into
/// the timestamp that was sent.
pub fn on_pong_reply(result: &str, id: Option<&Value>, now: f64) -> Option<Latency> {
    if id.and_then(Value::as_str) != Some(PONG_ID) {
        return None;
    }
    let sent: f64 = result.parse().ok()?;
    Some(Latency::from_millis((now - sent) * 1000.0))
}
