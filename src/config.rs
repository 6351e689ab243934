//! Preview settings: the read-only configuration group the thumbnailer
//! consults (propagation directories, size limit, enabled creators, paths).

use anyhow::{Context, Result};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Default limit for files eligible as sub-thumbnails (5 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;
/// Desktop icon size used when a request carries `icon_size == 0`.
pub const DEFAULT_ICON_SIZE: u32 = 48;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewSettings {
    /// Subdirectory names a directory preview may propagate into.
    pub propagation_directories: Vec<String>,
    /// Files larger than this (bytes) are never used as sub-thumbnails.
    pub maximum_size: u64,
    /// Creators allowed for sub-thumbnails. `None` = creators enabled by default.
    pub plugins: Option<Vec<String>>,
    /// Base of the cache; `normal/` and `large/` live below it.
    pub thumbnail_dir: Option<PathBuf>,
    /// Directory with MIME type and folder icons (`image-png.png`, `folder.png`).
    pub icon_dir: Option<PathBuf>,
    pub icon_blending: bool,
    pub default_icon_size: u32,
    pub ffmpeg: String,
    pub ffmpeg_timeout_secs: u64,
    /// Icon extractor for Windows executables.
    pub wrestool: String,
    /// DjVu page renderer.
    pub ddjvu: String,
    /// Time limit for `wrestool` and `ddjvu` runs.
    pub helper_timeout_secs: u64,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        PreviewSettings {
            propagation_directories: vec!["VIDEO_TS".into()],
            maximum_size: DEFAULT_MAX_FILE_SIZE,
            plugins: None,
            thumbnail_dir: None,
            icon_dir: None,
            icon_blending: true,
            default_icon_size: DEFAULT_ICON_SIZE,
            ffmpeg: "ffmpeg".into(),
            ffmpeg_timeout_secs: 30,
            wrestool: "wrestool".into(),
            ddjvu: "ddjvu".into(),
            helper_timeout_secs: 30,
        }
    }
}

impl PreviewSettings {
    /// Load settings from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("no settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let settings: PreviewSettings = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", path.display()))?;
        log::debug!("settings loaded from {}", path.display());
        Ok(settings)
    }

    pub fn propagation_set(&self) -> HashSet<String> {
        self.propagation_directories.iter().cloned().collect()
    }

    /// Cache base: the configured directory or `~/.thumbnails`.
    pub fn thumbnail_base(&self) -> PathBuf {
        if let Some(dir) = &self.thumbnail_dir {
            return dir.clone();
        }
        match BaseDirs::new() {
            Some(dirs) => dirs.home_dir().join(".thumbnails"),
            None => PathBuf::from(".thumbnails"),
        }
    }
}

pub fn default_settings_path() -> PathBuf {
    if let Some(dirs) = ProjectDirs::from("dev", "thumbnailer", "thumbnailer") {
        dirs.config_dir().join("preview.json")
    } else {
        PathBuf::from("preview.json")
    }
}
