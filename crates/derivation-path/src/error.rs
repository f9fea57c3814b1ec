use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("missing derivation path")]
    Missing,

    #[error("path must not start or end with a '/'")]
    Malformed,

    #[error("absolute path is missing the 'm' marker before the leading '/'")]
    MissingAbsoluteMarker,

    #[error("path must be an absolute derivation starting with 'm/'")]
    NotAbsolute,

    #[error("invalid root path length, must be in the form m/purpose'/coin_type'")]
    InvalidRootLength,

    #[error("root path must contain only hardened values")]
    InvalidRootPath,

    #[error("invalid elem '{0}' in path")]
    InvalidElem(String),

    #[error("elem {value} must be in range [0, {max}]")]
    OutOfRange { value: String, max: u32 },

    #[error("elem {value} must be in hardened range [0, {max}]")]
    OutOfHardenedRange { value: String, max: u32 },
}

pub type Result<T> = std::result::Result<T, Error>;
