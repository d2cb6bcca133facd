//! Shared-secret handling with redacted Debug output.

use crate::{ErrorLocation, RedactError};

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::ser::Error;
use serde::{Deserialize, Deserializer};
use zeroize::Zeroize;

/// The server's plaintext authentication token.
///
/// Never exposes its value through `Debug`, `Display` or serde. The
/// console reads it back explicitly with [`RedactedToken::as_str`].
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RedactedToken {
    inner: String,
}

impl RedactedToken {
    /// Create a new redacted token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            inner: token.into(),
        }
    }

    /// Get the actual token value.
    ///
    /// # Security Note
    /// Only call this for hashing or when the operator asks for it.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Get the token length (safe to log).
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// An empty token disables authentication.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl From<&str> for RedactedToken {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for RedactedToken {
    fn from(token: String) -> Self {
        Self::new(token)
    }
}

// Lets command-line parsers build the token directly.
impl FromStr for RedactedToken {
    type Err = Infallible;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(token))
    }
}

impl fmt::Debug for RedactedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RedactedToken([REDACTED])")
    }
}

impl fmt::Display for RedactedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.inner.is_empty() {
            write!(f, "[EMPTY TOKEN]")
        } else {
            write!(f, "[REDACTED TOKEN]")
        }
    }
}

impl Drop for RedactedToken {
    fn drop(&mut self) {
        self.inner.zeroize();
    }
}

impl<'de> Deserialize<'de> for RedactedToken {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::new)
    }
}

// Prevent accidental serialization
impl serde::Serialize for RedactedToken {
    fn serialize<S>(&self, _serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        Err(S::Error::custom(RedactError::Exposure {
            message: String::from("RedactedToken cannot be serialized - use as_str() explicitly"),
            location: ErrorLocation::caller(),
        }))
    }
}
