use std::path::PathBuf;

/// Failure signal for a single thumbnail request.
///
/// Every variant is terminal for the request that produced it and is reported
/// to the caller as [`ThumbError::code`] plus the display message.
#[derive(Debug, thiserror::Error)]
pub enum ThumbError {
    #[error("No MIME Type specified.")]
    MissingMimeType,
    #[error("No or invalid size specified.")]
    InvalidSize,
    #[error("No plugin specified.")]
    MissingPlugin,
    #[error("Cannot load ThumbCreator {0}")]
    PluginUnavailable(String),
    #[error("Cannot create thumbnail for {}", .0.display())]
    CreateFailed(PathBuf),
    #[error("Cannot create thumbnail for directory")]
    DirectoryFailed,
    #[error("Failed to create a thumbnail.")]
    EmptyImage,
    #[error("Failed to encode thumbnail: {0}")]
    Encode(#[from] image::ImageError),
}

impl ThumbError {
    /// Protocol error code. The slave protocol only ever reports internal errors.
    pub fn code(&self) -> &'static str {
        "ERR_INTERNAL"
    }
}

pub type Result<T> = std::result::Result<T, ThumbError>;
