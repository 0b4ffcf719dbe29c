//! Error taxonomy
//!
//! Every fatal condition aborts the whole run; no partial or corrupt
//! image is ever emitted. Non-fatal conditions are advisories collected
//! on the [Document](../gerber/struct.Document.html) instead.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration, detected before any document is parsed
    #[error("configuration: {reason}")]
    Config { reason: String },

    /// An aperture code was redefined with a different shape
    #[error("line {line}: aperture D{code} redefined incompatibly")]
    DuplicateAperture { code: u32, line: usize },

    /// A draw or flash command referenced an aperture that was never defined
    #[error("line {line}: undefined aperture D{code}")]
    UndefinedAperture { code: u32, line: usize },

    /// Structurally invalid input; parsing of the owning document stops
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    /// All documents parsed but there is nothing to render
    #[error("no image")]
    EmptyImage,

    /// Raster strip buffer allocation failed
    #[error("cannot allocate {needed} bytes for strip buffer")]
    Resource { needed: usize },

    /// A strip sink refused a write
    #[error("output: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn config<S: Into<String>>(reason: S) -> Self {
        Error::Config { reason: reason.into() }
    }
    pub fn malformed<S: Into<String>>(line: usize, reason: S) -> Self {
        Error::Malformed { line, reason: reason.into() }
    }
}
