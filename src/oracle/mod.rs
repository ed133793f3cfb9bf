//! Oracle integration: the wire protocol, the HTTP client, and the
//! valuation materialiser that folds a SAT reply back into the heap.

pub mod client;
pub mod materialize;
pub mod protocol;

use std::fmt;

pub use client::{OracleClient, SERVICE_URL_VAR, TIMEOUT_SECONDS_VAR};
pub use materialize::{apply_valuation, MaterialiseOutcome};
pub use protocol::{OracleReply, OracleRequest, OracleVerdict};

/// Transport- or protocol-level failure talking to the oracle.
#[derive(Debug)]
pub enum OracleError {
    /// Connection, DNS, or timeout failure.
    Transport(String),
    /// Endpoint answered with a non-2xx status.
    Status(u16),
    /// Body was empty or not the expected JSON shape.
    MalformedReply(String),
}

impl fmt::Display for OracleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OracleError::Transport(msg) => write!(f, "oracle transport error: {}", msg),
            OracleError::Status(code) => write!(f, "oracle returned status {}", code),
            OracleError::MalformedReply(msg) => write!(f, "malformed oracle reply: {}", msg),
        }
    }
}

impl std::error::Error for OracleError {}
