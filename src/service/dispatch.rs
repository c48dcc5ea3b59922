use crate::proto::{OpCode, Status};
use crate::KvsEngine;

/// What the dispatcher produced for one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    /// Status of the operation, `None` when the operation is not supported
    pub status: Option<Status>,
    /// Value found by a successful read
    pub value: Option<Vec<u8>>,
}

impl Outcome {
    fn status(status: Status) -> Self {
        Self {
            status: Some(status),
            value: None,
        }
    }

    fn found(value: Vec<u8>) -> Self {
        Self {
            status: Some(Status::Ok),
            value: Some(value),
        }
    }
}

/// Apply one operation to the engine.
///
/// Storage failures are reported as `Status::Error`, operating on a missing key is reported as
/// `Status::NotFound`. An unknown operation code leaves the status unset.
pub fn dispatch<E>(
    engine: &E,
    op: OpCode,
    key: &[u8],
    value: &[u8],
    logger: &slog::Logger,
) -> Outcome
where
    E: KvsEngine + ?Sized,
{
    match op {
        OpCode::Write => match engine.set(key, value) {
            Ok(()) => Outcome::status(Status::Ok),
            Err(err) => {
                error!(logger, "Could not write"; "error" => %err);
                Outcome::status(Status::Error)
            }
        },
        OpCode::Read => match engine.get(key) {
            Ok(Some(value)) => Outcome::found(value),
            Ok(None) => {
                info!(logger, "Key not found");
                Outcome::status(Status::NotFound)
            }
            Err(err) => {
                error!(logger, "Could not read"; "error" => %err);
                Outcome::status(Status::Error)
            }
        },
        OpCode::Delete => match engine.remove(key) {
            Ok(()) => Outcome::status(Status::Ok),
            Err(err) if err.is_key_not_found() => Outcome::status(Status::NotFound),
            Err(err) => {
                error!(logger, "Could not delete"; "error" => %err);
                Outcome::status(Status::Error)
            }
        },
        OpCode::Modify => match engine.replace(key, value) {
            Ok(()) => Outcome::status(Status::Ok),
            Err(err) if err.is_key_not_found() => Outcome::status(Status::NotFound),
            Err(err) => {
                error!(logger, "Could not modify"; "error" => %err);
                Outcome::status(Status::Error)
            }
        },
        OpCode::Unknown(code) => {
            error!(logger, "Unsupported opcode"; "opcode" => code);
            Outcome::default()
        }
    }
}
