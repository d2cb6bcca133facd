use crate::protocol::{AUTHORIZATION_METHOD, UPGRADE_METHOD};

use std::fmt::{Display, Formatter, Result as FormatResult};

/// Handshake progress of one connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Stage {
    #[default]
    Unauthenticated = 0,
    DuplexPending = 1,
    Active = 2,
    /// Entered only by the operator's `remote_log` command. Inbound lines
    /// are reported as remote log output and never dispatched.
    RemoteLog = 3,
}

impl Stage {
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// The one method accepted while the handshake is in progress.
    pub fn expected_method(self) -> Option<&'static str> {
        match self {
            Stage::Unauthenticated => Some(AUTHORIZATION_METHOD),
            Stage::DuplexPending => Some(UPGRADE_METHOD),
            Stage::Active | Stage::RemoteLog => None,
        }
    }

    /// Past the last handshake stage; the engine stops dispatching.
    pub fn is_terminal(self) -> bool {
        self > Stage::Active
    }
}

impl Display for Stage {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        write!(formatter, "{}", self.ordinal())
    }
}
