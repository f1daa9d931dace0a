use std::fmt;

/// Errors surfaced by the Registry, Codec, and Endpoint. Wraps
/// `tweak_core::Error` for the conversion-related kinds so callers see one
/// error type regardless of which layer produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    ItemNotFound,
    AlreadyPresent,
    TypeMismatch,
    InvalidArgument,
    PeerDisconnected,
    Timeout,
    ConversionTruncated,
    ConversionFailed,
    /// Malformed inbound message. The message is dropped, the peer is kept
    /// alive; carries a short human-readable reason for logging.
    DecodeError(String),
    Transport(TransportError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ItemNotFound => write!(f, "item not found"),
            Error::AlreadyPresent => write!(f, "uri already present"),
            Error::TypeMismatch => write!(f, "type mismatch"),
            Error::InvalidArgument => write!(f, "invalid argument"),
            Error::PeerDisconnected => write!(f, "peer disconnected"),
            Error::Timeout => write!(f, "timeout"),
            Error::ConversionTruncated => write!(f, "conversion truncated"),
            Error::ConversionFailed => write!(f, "conversion failed"),
            Error::DecodeError(reason) => write!(f, "decode error: {}", reason),
            Error::Transport(t) => write!(f, "transport error: {}", t),
        }
    }
}

impl std::error::Error for Error {}

impl From<tweak_core::Error> for Error {
    fn from(e: tweak_core::Error) -> Self {
        match e {
            tweak_core::Error::TypeMismatch => Error::TypeMismatch,
            tweak_core::Error::InvalidArgument => Error::InvalidArgument,
            tweak_core::Error::ConversionTruncated => Error::ConversionTruncated,
            tweak_core::Error::ConversionFailed => Error::ConversionFailed,
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::Transport(e)
    }
}

/// Errors from the Transport collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// `transport_kind` is recognized but this crate carries no concrete
    /// backend for it (`rpmsg`, `serial`).
    Unsupported(String),
    /// The connection is not currently usable.
    Closed,
    /// Any other backend-reported I/O failure, carried as text since the
    /// only concrete backend (`std::net`) has its own `io::Error` which
    /// does not implement `PartialEq`/`Clone`.
    Io(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Unsupported(kind) => write!(f, "unsupported transport kind: {}", kind),
            TransportError::Closed => write!(f, "connection closed"),
            TransportError::Io(msg) => write!(f, "io error: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}
