//! Folder and MIME-type icons. Icons come from the configured icon directory
//! when present there; otherwise a plain built-in icon is drawn.

use image::{imageops::FilterType, Rgba, RgbaImage};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::mime;
use crate::raster::fit_size;

/// Largest icon drawn, whatever the request asks for.
pub const MAX_ICON_SIZE: u32 = 256;

fn clamp_size(size: u32) -> u32 {
    size.clamp(1, MAX_ICON_SIZE)
}

pub struct IconLoader {
    icon_dir: Option<PathBuf>,
    icon_size: u32,
    /// MIME type → icon at `icon_size`.
    dict: HashMap<String, RgbaImage>,
}

impl IconLoader {
    pub fn new(icon_dir: Option<PathBuf>, icon_size: u32) -> Self {
        IconLoader {
            icon_dir,
            icon_size: clamp_size(icon_size),
            dict: HashMap::new(),
        }
    }

    pub fn icon_size(&self) -> u32 {
        self.icon_size
    }

    /// Change the overlay icon size; cached icons are dropped when it differs.
    pub fn set_icon_size(&mut self, size: u32) {
        let size = clamp_size(size);
        if size != self.icon_size {
            self.dict.clear();
            self.icon_size = size;
        }
    }

    /// Overlay icon for a MIME type at the current icon size.
    pub fn mime_icon(&mut self, mime_type: &str) -> RgbaImage {
        if let Some(icon) = self.dict.get(mime_type) {
            return icon.clone();
        }
        let size = self.icon_size;
        let icon = self
            .load_named(&mime::icon_name(mime_type), size)
            .or_else(|| self.load_named(&mime::generic_icon_name(mime_type), size))
            .unwrap_or_else(|| document_icon(mime_type, size));
        self.dict.insert(mime_type.to_string(), icon.clone());
        icon
    }

    /// Folder icon, `size` x `size` at most, capped at `MAX_ICON_SIZE`.
    pub fn folder_icon(&self, size: u32) -> RgbaImage {
        let size = clamp_size(size);
        self.load_named(&mime::icon_name(mime::DIRECTORY), size)
            .or_else(|| self.load_named("folder", size))
            .unwrap_or_else(|| folder_icon(size))
    }

    fn load_named(&self, name: &str, size: u32) -> Option<RgbaImage> {
        let dir = self.icon_dir.as_deref()?;
        load_scaled(&dir.join(format!("{}.png", name)), size)
    }
}

fn load_scaled(path: &Path, size: u32) -> Option<RgbaImage> {
    let img = match image::open(path) {
        Ok(img) => img.into_rgba8(),
        Err(e) => {
            if path.exists() {
                log::warn!("icon {}: {}", path.display(), e);
            }
            return None;
        }
    };
    if img.width() == size && img.height() <= size || img.height() == size && img.width() <= size {
        return Some(img);
    }
    let (w, h) = fit_size(img.width(), img.height(), size, size);
    Some(image::imageops::resize(&img, w.max(1), h.max(1), FilterType::Triangle))
}

/// Built-in folder: a tab on the back panel and a front panel below it.
fn folder_icon(size: u32) -> RgbaImage {
    let s = size as f32;
    let back = Rgba([0x1d, 0x99, 0xf3, 255]);
    let front = Rgba([0x3d, 0xae, 0xe9, 255]);
    let mut img = RgbaImage::new(size, size);
    for (x, y, px) in img.enumerate_pixels_mut() {
        let (fx, fy) = (x as f32 + 0.5, y as f32 + 0.5);
        let inside_x = fx >= s * 0.04 && fx <= s * 0.96;
        let tab = inside_x && fx <= s * 0.45 && fy >= s * 0.08 && fy < s * 0.18;
        let body = inside_x && fy >= s * 0.18 && fy <= s * 0.92;
        if body && fy >= s * 0.26 {
            *px = front;
        } else if tab || body {
            *px = back;
        }
    }
    img
}

/// Built-in document icon: a page with a band colored after the media class.
fn document_icon(mime_type: &str, size: u32) -> RgbaImage {
    let s = size as f32;
    let band = match mime_type.split('/').next() {
        Some("image") => Rgba([0x2e, 0xa0, 0x43, 255]),
        Some("video") => Rgba([0xda, 0x44, 0x53, 255]),
        Some("text") => Rgba([0x7f, 0x8c, 0x8d, 255]),
        _ => Rgba([0x93, 0x6a, 0xd0, 255]),
    };
    let mut img = RgbaImage::new(size, size);
    for (x, y, px) in img.enumerate_pixels_mut() {
        let (fx, fy) = (x as f32 + 0.5, y as f32 + 0.5);
        if fx < s * 0.15 || fx > s * 0.85 || fy < s * 0.05 || fy > s * 0.95 {
            continue;
        }
        let edge = fx < s * 0.15 + 1.0 || fx > s * 0.85 - 1.0 || fy < s * 0.05 + 1.0 || fy > s * 0.95 - 1.0;
        *px = if edge {
            Rgba([0x60, 0x60, 0x60, 255])
        } else if fy > s * 0.6 && fy < s * 0.8 {
            band
        } else {
            Rgba([0xfc, 0xfc, 0xfc, 255])
        };
    }
    img
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_icons_have_requested_size() {
        let mut icons = IconLoader::new(None, 32);
        assert_eq!(icons.mime_icon("image/png").dimensions(), (32, 32));
        assert_eq!(icons.folder_icon(96).dimensions(), (96, 96));
    }

    #[test]
    fn size_change_clears_cache() {
        let mut icons = IconLoader::new(None, 16);
        icons.mime_icon("video/mp4");
        icons.set_icon_size(16);
        assert_eq!(icons.dict.len(), 1);
        icons.set_icon_size(24);
        assert!(icons.dict.is_empty());
        assert_eq!(icons.mime_icon("video/mp4").dimensions(), (24, 24));
    }

    #[test]
    fn huge_sizes_are_capped() {
        let mut icons = IconLoader::new(None, u32::MAX);
        assert_eq!(icons.icon_size(), MAX_ICON_SIZE);
        assert_eq!(icons.folder_icon(u32::MAX).dimensions(), (MAX_ICON_SIZE, MAX_ICON_SIZE));
        icons.set_icon_size(i32::MAX as u32);
        assert_eq!(icons.mime_icon("image/png").dimensions(), (MAX_ICON_SIZE, MAX_ICON_SIZE));
        icons.set_icon_size(0);
        assert_eq!(icons.icon_size(), 1);
    }

    #[test]
    fn icon_dir_is_preferred() {
        let dir = tempfile::tempdir().unwrap();
        RgbaImage::from_pixel(64, 64, Rgba([1, 2, 3, 255]))
            .save(dir.path().join("image-png.png"))
            .unwrap();
        RgbaImage::from_pixel(50, 100, Rgba([4, 5, 6, 255]))
            .save(dir.path().join("folder.png"))
            .unwrap();

        let mut icons = IconLoader::new(Some(dir.path().to_path_buf()), 32);
        let icon = icons.mime_icon("image/png");
        assert_eq!(icon.dimensions(), (32, 32));
        assert_eq!(icon.get_pixel(10, 10), &Rgba([1, 2, 3, 255]));

        let folder = icons.folder_icon(64);
        assert_eq!(folder.dimensions(), (32, 64));

        // falls back to the built-in icon for unknown types
        assert_eq!(icons.mime_icon("video/mp4").dimensions(), (32, 32));
    }
}
