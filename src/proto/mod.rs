//! Simple request-response protocol that uses protocol buffer frames over a byte stream.
mod codec;
mod messages;

pub use codec::{read_frame, write_frame, MAX_FRAME_LEN};
pub use messages::{EchoRequest, EchoResponse, RpcRequest, RpcResponse};

use std::fmt;

/// Name of the only method exposed by the server
pub const ECHO_METHOD: &str = "Echo";

/// Transport error codes carried by `RpcResponse::error_code`
pub mod error_code {
    /// The call succeeded at the transport level
    pub const OK: i32 = 0;
    /// The requested method does not exist
    pub const ENOMETHOD: i32 = 1002;
    /// The request payload could not be decoded
    pub const EREQUEST: i32 = 1003;
    /// The server is stopping and rejects new requests
    pub const ELOGOFF: i32 = 1004;
    /// The server failed to produce a response
    pub const EINTERNAL: i32 = 2001;
}

/// Operation requested by an `EchoRequest`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    /// Store a value under a key
    Write,
    /// Look up the value of a key
    Read,
    /// Remove a key
    Delete,
    /// Replace the value of an existing key
    Modify,
    /// Any code the server does not recognize
    Unknown(i32),
}

impl From<i32> for OpCode {
    fn from(code: i32) -> Self {
        match code {
            1 => Self::Write,
            2 => Self::Read,
            3 => Self::Delete,
            4 => Self::Modify,
            code => Self::Unknown(code),
        }
    }
}

impl From<OpCode> for i32 {
    fn from(op: OpCode) -> Self {
        match op {
            OpCode::Write => 1,
            OpCode::Read => 2,
            OpCode::Delete => 3,
            OpCode::Modify => 4,
            OpCode::Unknown(code) => code,
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Write => write!(f, "WRITE"),
            Self::Read => write!(f, "READ"),
            Self::Delete => write!(f, "DELETE"),
            Self::Modify => write!(f, "MODIFY"),
            Self::Unknown(code) => write!(f, "UNKNOWN({})", code),
        }
    }
}

/// Result of an operation, as reported in `EchoResponse::status`.
///
/// The wire value `0` means that no status was set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The operation was applied
    Ok = 1,
    /// The key does not exist
    NotFound = 2,
    /// The storage failed to apply the operation
    Error = 3,
}

impl Status {
    /// Get the status from its wire value, returns `None` for an unset or unknown status.
    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Ok),
            2 => Some(Self::NotFound),
            3 => Some(Self::Error),
            _ => None,
        }
    }
}

impl From<Status> for i32 {
    fn from(status: Status) -> Self {
        status as i32
    }
}
