//! Thumbnails for files and directories.
//!
//! Files are rendered by a [`creators::ThumbCreator`] picked by name or MIME
//! type. Directories get a folder icon with up to four framed
//! sub-thumbnails of their content, which are cached on disk under
//! `~/.thumbnails/{normal,large}`.

pub mod cache;
pub mod cli;
pub mod config;
pub mod creators;
pub mod debug;
pub mod error;
pub mod frame;
pub mod icons;
pub mod mime;
pub mod protocol;
pub mod raster;
pub mod tiler;

pub use error::ThumbError;
pub use protocol::{Thumbnail, ThumbnailProtocol, ThumbnailRequest};
