// crates/toucan-core/src/error.rs
//
// Error taxonomy shared by every crate in the workspace. Each variant here
// corresponds 1:1 to a kind named in the design's error-handling section —
// adding a new failure mode means adding a variant here, not inventing a
// one-off error type in the crate that first needs it.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to open {path}: {cause}")]
    OpenFailed { path: PathBuf, cause: String },

    #[error("decode failed at time {time}")]
    Decode { time: f64 },

    #[error("archive entry is compressed: {entry}")]
    ArchiveCompressed { entry: String },

    #[error("failed to load plugin {path}: {cause}")]
    PluginLoad { path: PathBuf, cause: String },

    #[error("fatal error in plugin {path}")]
    FatalPlugin { path: PathBuf },

    #[error("type mismatch on property {key}")]
    TypeMismatch { key: String },

    #[error("index {index} out of bounds for property {key} (len {len})")]
    OutOfBounds { key: String, index: usize, len: usize },

    #[error("unsupported format: {extension}")]
    UnsupportedFormat { extension: String },
}

pub type Result<T> = std::result::Result<T, Error>;
