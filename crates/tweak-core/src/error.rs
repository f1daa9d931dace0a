use std::fmt;

/// Errors surfaced by the data model crate. Higher layers (`tweak-runtime`)
/// define their own `Error` that wraps these plus connection/registry kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// `replace_current`/`set_scalar_T` attempted across incompatible
    /// `ValueType`s, or a typed getter was called on an item of another type.
    TypeMismatch,
    /// A null pointer, empty URI, or otherwise malformed parameter.
    InvalidArgument,
    /// `Value::from_string` produced a value, but had to saturate or round
    /// it to fit the target type.
    ConversionTruncated,
    /// `Value::from_string` could not parse the input at all.
    ConversionFailed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TypeMismatch => write!(f, "type mismatch"),
            Error::InvalidArgument => write!(f, "invalid argument"),
            Error::ConversionTruncated => write!(f, "conversion truncated"),
            Error::ConversionFailed => write!(f, "conversion failed"),
        }
    }
}

impl std::error::Error for Error {}

/// Outcome of `Value::from_string`, distinct from `Error` because a
/// truncated conversion still produces a usable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvResult {
    Success,
    Truncated,
    Failed,
}
