//! Request handling: validation, dispatch to a creator or the directory
//! tiler, post-processing and PNG encoding.
//!
//! One [`ThumbnailProtocol`] owns everything that lives across requests (the
//! creator registry, the sub-thumbnail cache, the icon cache and the random
//! source for frame rotation) and serves requests one at a time.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use crate::cache::SubThumbnailCache;
use crate::config::PreviewSettings;
use crate::creators::{Registry, DIRECTORY_PLUGIN};
use crate::error::{Result, ThumbError};
use crate::icons::IconLoader;
use crate::mime;
use crate::raster::{draw_frame_border, draw_image, encode_png, scale_down};
use crate::tiler::{DirectoryTiler, TileLayout};

/// Minimum thumbnail/icon ratio (both axes) for the MIME icon overlay.
const ICON_RATIO: u32 = 4;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailRequest {
    /// Absolute path, `file://` or `thumbnail:` URL.
    pub url: String,
    pub mime_type: String,
    pub width: i32,
    pub height: i32,
    /// 0 = configured default.
    pub icon_size: i32,
    pub icon_alpha: i32,
    /// Creator name; empty when none was requested.
    pub plugin: String,
    /// Page of a directory preview.
    pub sequence: u32,
}

impl ThumbnailRequest {
    /// Local path the request refers to. URL forms are percent-decoded,
    /// plain paths are taken as they are.
    pub fn path(&self) -> PathBuf {
        let encoded = if let Some(rest) = self.url.strip_prefix("file://") {
            rest
        } else if let Some(rest) = self.url.strip_prefix("thumbnail:") {
            rest.strip_prefix("//").unwrap_or(rest)
        } else {
            return PathBuf::from(&self.url);
        };
        match urlencoding::decode(encoded) {
            Ok(p) => PathBuf::from(p.into_owned()),
            Err(_) => PathBuf::from(encoded),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Thumbnail {
    /// Always `application/octet-stream`; the payload is PNG.
    pub mime: &'static str,
    pub data: Vec<u8>,
}

pub struct ThumbnailProtocol {
    settings: PreviewSettings,
    propagation: HashSet<String>,
    registry: Registry,
    cache: SubThumbnailCache,
    icons: IconLoader,
    rng: fastrand::Rng,
}

impl ThumbnailProtocol {
    pub fn new(settings: PreviewSettings) -> Self {
        let registry = Registry::with_builtins(&settings);
        Self::with_parts(settings, registry, fastrand::Rng::new())
    }

    /// Handler over a given registry and random source.
    pub fn with_parts(settings: PreviewSettings, registry: Registry, rng: fastrand::Rng) -> Self {
        let cache = SubThumbnailCache::new(settings.thumbnail_base());
        let icons = IconLoader::new(settings.icon_dir.clone(), settings.default_icon_size);
        ThumbnailProtocol {
            propagation: settings.propagation_set(),
            settings,
            registry,
            cache,
            icons,
            rng,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn cache(&self) -> &SubThumbnailCache {
        &self.cache
    }

    /// Serve one request.
    pub fn get(&mut self, req: &ThumbnailRequest) -> Result<Thumbnail> {
        if req.mime_type.is_empty() {
            return Err(ThumbError::MissingMimeType);
        }
        if req.width < 0 || req.height < 0 {
            return Err(ThumbError::InvalidSize);
        }
        let (width, height) = (req.width as u32, req.height as u32);

        let icon_size = match req.icon_size {
            n if n > 0 => n as u32,
            _ => self.settings.default_icon_size,
        };
        self.icons.set_icon_size(icon_size);

        let path = req.path();
        log::debug!(
            "get {} ({}) {}x{} plugin={:?}",
            path.display(),
            req.mime_type,
            width,
            height,
            req.plugin
        );

        let is_directory_request = req.mime_type == mime::DIRECTORY
            && (req.plugin.is_empty() || req.plugin == DIRECTORY_PLUGIN);

        let img = if is_directory_request {
            let layout = self.thumbnail_for_directory(&path, width, height, req.sequence);
            let img = layout.image.ok_or(ThumbError::DirectoryFailed)?;
            scale_down(img, width, height).ok_or(ThumbError::EmptyImage)?
        } else {
            if req.plugin.is_empty() {
                return Err(ThumbError::MissingPlugin);
            }
            let creator = self
                .registry
                .get(&req.plugin)
                .ok_or_else(|| ThumbError::PluginUnavailable(req.plugin.clone()))?;
            let img = creator.create(&path, width, height).map_err(|e| {
                log::debug!("{}: {:#}", path.display(), e);
                ThumbError::CreateFailed(path.clone())
            })?;
            let mut img = scale_down(img, width, height).ok_or(ThumbError::EmptyImage)?;

            let flags = creator.flags();
            if flags.draw_frame {
                draw_frame_border(&mut img);
            }
            if flags.blend_icon && self.settings.icon_blending {
                self.blend_icon(&mut img, &req.mime_type, req.icon_alpha);
            }
            img
        };

        Ok(Thumbnail {
            mime: mime::OCTET_STREAM,
            data: encode_png(&img)?,
        })
    }

    /// Directory preview with the full layout, for callers that want to
    /// know which files were placed.
    pub fn thumbnail_for_directory(&mut self, dir: &Path, width: u32, height: u32, sequence: u32) -> TileLayout {
        DirectoryTiler {
            registry: &self.registry,
            cache: &mut self.cache,
            icons: &self.icons,
            rng: &mut self.rng,
            max_file_size: self.settings.maximum_size,
            propagation: &self.propagation,
        }
        .thumbnail(dir, width, height, sequence)
    }

    /// MIME icon in the bottom-right corner, when the thumbnail is at least
    /// four times the icon size on both axes.
    fn blend_icon(&mut self, img: &mut RgbaImage, mime_type: &str, icon_alpha: i32) {
        let icon = self.icons.mime_icon(mime_type);
        let (w, h) = img.dimensions();
        let (iw, ih) = icon.dimensions();
        if iw == 0 || ih == 0 || w / iw < ICON_RATIO || h / ih < ICON_RATIO {
            return;
        }
        let x = (w as i64 - iw as i64 - 4).max(0);
        let y = (h as i64 - ih as i64 - 6).max(0);
        let opacity = (icon_alpha as f32 / 255.0).clamp(0.0, 1.0);
        draw_image(img, &icon, x, y, opacity);
    }
}

/// Request loop: one JSON request per line on `input`. Each answer is a JSON
/// header line, followed by `len` raw bytes on success.
pub fn serve<R: BufRead, W: Write>(proto: &mut ThumbnailProtocol, input: R, mut output: W) -> anyhow::Result<()> {
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let result = match serde_json::from_str::<ThumbnailRequest>(&line) {
            Ok(req) => proto.get(&req).map_err(|e| (e.code(), e.to_string())),
            Err(e) => Err(("ERR_INTERNAL", format!("Malformed request: {}", e))),
        };
        match result {
            Ok(thumb) => {
                let header = serde_json::json!({
                    "ok": true,
                    "mime": thumb.mime,
                    "len": thumb.data.len(),
                });
                writeln!(output, "{}", header)?;
                output.write_all(&thumb.data)?;
            }
            Err((code, message)) => {
                log::debug!("request failed: {}", message);
                let header = serde_json::json!({
                    "ok": false,
                    "code": code,
                    "message": message,
                });
                writeln!(output, "{}", header)?;
            }
        }
        output.flush()?;
    }
    Ok(())
}
