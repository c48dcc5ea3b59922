//! Errors for operations on the key-value server

/// Library result
pub type Result<T> = std::result::Result<T, Error>;

/// Library error
#[derive(Debug)]
pub struct Error {
    repr: Repr,
}

#[derive(Debug)]
enum Repr {
    /// Specific error with no additional messages
    Simple(ErrorKind),
    /// Specific error with a message describing the cause
    Custom(ErrorKind, String),

    /// I/O error
    Io(std::io::Error),
    /// Sled error
    Sled(sled::Error),
    /// Prost serialization error
    ProstEncode(prost::EncodeError),
    /// Prost deserialization error
    ProstDecode(prost::DecodeError),
    /// JSON (de)serialization error
    Json(serde_json::Error),
}

impl Error {
    /// Create an error of the given kind with an additional message
    pub fn new<M>(kind: ErrorKind, msg: M) -> Self
    where
        M: Into<String>,
    {
        Self {
            repr: Repr::Custom(kind, msg.into()),
        }
    }

    /// Return the kind of the error if it was not caused by an underlying library
    pub fn kind(&self) -> Option<ErrorKind> {
        match self.repr {
            Repr::Simple(kind) | Repr::Custom(kind, _) => Some(kind),
            _ => None,
        }
    }

    /// Return `true` if the error is caused by operating on a non-existent key
    pub fn is_key_not_found(&self) -> bool {
        self.kind() == Some(ErrorKind::KeyNotFound)
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self {
            repr: Repr::Simple(kind),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self.repr {
            Repr::Io(ref err) => Some(err),
            Repr::Sled(ref err) => Some(err),
            Repr::ProstEncode(ref err) => Some(err),
            Repr::ProstDecode(ref err) => Some(err),
            Repr::Json(ref err) => Some(err),
            _ => None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.repr {
            Repr::Simple(ref kind) => write!(f, "{}", kind.as_str()),
            Repr::Custom(ref kind, ref msg) => write!(f, "{} - {}", kind.as_str(), msg),
            Repr::Io(ref err) => write!(f, "{} (i/o error)", err),
            Repr::Sled(ref err) => write!(f, "{} (sled error)", err),
            Repr::ProstEncode(ref err) => write!(f, "{} (protobuf serialization error)", err),
            Repr::ProstDecode(ref err) => write!(f, "{} (protobuf deserialization error)", err),
            Repr::Json(ref err) => write!(f, "{} (json error)", err),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self {
            repr: Repr::Io(err),
        }
    }
}

impl From<sled::Error> for Error {
    fn from(err: sled::Error) -> Self {
        Self {
            repr: Repr::Sled(err),
        }
    }
}

impl From<prost::EncodeError> for Error {
    fn from(err: prost::EncodeError) -> Self {
        Self {
            repr: Repr::ProstEncode(err),
        }
    }
}

impl From<prost::DecodeError> for Error {
    fn from(err: prost::DecodeError) -> Self {
        Self {
            repr: Repr::ProstDecode(err),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self {
            repr: Repr::Json(err),
        }
    }
}

/// Types of error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation on a non-existent key
    KeyNotFound,
    /// An unexpected message from the network is received
    InvalidNetworkMessage,
    /// A frame whose declared length exceeds the allowed maximum
    FrameTooLarge,
    /// The listen address could not be parsed
    InvalidListenAddr,
    /// Wrong thread pool's name provided when configuring the server
    UnsupportedThreadPool,
    /// The thread pool could not be constructed
    ThreadPoolBuild,
}

impl ErrorKind {
    pub(crate) fn as_str(&self) -> &'static str {
        match *self {
            Self::KeyNotFound => "Key not found",
            Self::InvalidNetworkMessage => "Received an invalid network message",
            Self::FrameTooLarge => "Received a frame that is too large",
            Self::InvalidListenAddr => "Invalid listen address",
            Self::UnsupportedThreadPool => "Unsupported thread pool",
            Self::ThreadPoolBuild => "Could not build thread pool",
        }
    }
}
