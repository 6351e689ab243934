//! File-extension based MIME detection.

use std::path::Path;

pub const DIRECTORY: &str = "inode/directory";
pub const OCTET_STREAM: &str = "application/octet-stream";

fn ext_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Guess the MIME type of a file from its extension.
pub fn for_path(path: &Path) -> &'static str {
    match ext_of(path).as_str() {
        "jpg" | "jpeg" | "jpe" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tiff" | "tif" => "image/tiff",
        "ico" => "image/x-icon",
        "tga" => "image/x-tga",
        "pnm" | "ppm" | "pgm" | "pbm" => "image/x-portable-anymap",
        "svg" => "image/svg+xml",
        "cbz" => "application/x-cbz",
        "cbt" => "application/x-cbt",
        "exe" => "application/x-ms-dos-executable",
        "dll" => "application/x-msdownload",
        "djvu" | "djv" => "image/vnd.djvu",
        "epub" => "application/epub+zip",
        "mp4" | "m4v" => "video/mp4",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "flv" => "video/x-flv",
        "wmv" => "video/x-ms-wmv",
        "3gp" => "video/3gpp",
        "mpg" | "mpeg" | "vob" => "video/mpeg",
        "txt" | "text" => "text/plain",
        "pdf" => "application/pdf",
        _ => OCTET_STREAM,
    }
}

/// Icon name for a MIME type, icon-theme style (`image/png` → `image-png`).
pub fn icon_name(mime: &str) -> String {
    mime.replace('/', "-")
}

/// Generic icon name for the MIME type's media class (`image/png` → `image-x-generic`).
pub fn generic_icon_name(mime: &str) -> String {
    let media = mime.split('/').next().unwrap_or("");
    format!("{}-x-generic", media)
}
