//! Error types shared across the crate.
//!
//! A missing key is an ordinary boolean result, never an error. The only
//! engine-side error is an invariant violation reported by the validator,
//! which indicates a defect and is treated as fatal by the test suites.
//! Transport and parse failures belong to the facade.

use std::fmt;
use std::io;

/// A broken red-black invariant, found by a full validation walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantError {
    /// The root is red.
    RedRoot { key: i64 },

    /// A red node has a red child.
    RedRed { key: i64 },

    /// Two paths below a node cross different numbers of black nodes.
    BlackHeightMismatch { key: i64, left: u32, right: u32 },

    /// A key is outside the range its position allows.
    OrderViolation { key: i64 },
}

impl fmt::Display for InvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvariantError::RedRoot { key } => {
                write!(f, "root {} is red", key)
            }
            InvariantError::RedRed { key } => {
                write!(f, "red node {} has a red child", key)
            }
            InvariantError::BlackHeightMismatch { key, left, right } => {
                write!(
                    f,
                    "black height mismatch at {}: left {}, right {}",
                    key, left, right
                )
            }
            InvariantError::OrderViolation { key } => {
                write!(f, "key {} violates search order", key)
            }
        }
    }
}

impl std::error::Error for InvariantError {}

/// Facade-side failure: the listener or a connection went wrong.
#[derive(Debug)]
pub enum ServeError {
    /// Socket setup or stream I/O failed.
    Io(io::Error),

    /// A request was malformed beyond answering with a 4xx.
    Parse(String),
}

impl fmt::Display for ServeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServeError::Io(err) => write!(f, "i/o error: {}", err),
            ServeError::Parse(msg) => write!(f, "parse error: {}", msg),
        }
    }
}

impl std::error::Error for ServeError {}

impl From<io::Error> for ServeError {
    fn from(err: io::Error) -> Self {
        return ServeError::Io(err);
    }
}
