//! Sub-thumbnail disk cache.
//!
//! Entries live in `<base>/normal/` (128 px) and `<base>/large/` (256 px).
//! The file name is the hex-encoded file path followed by the file's
//! modification time in seconds, so a modified file simply gets a new entry.
//! Writes go to a temporary file in the same directory and are renamed into
//! place, which keeps other readers of the directory from seeing partial
//! files.

use anyhow::{Context, Result};
use image::{ImageFormat, RgbaImage};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::creators::ThumbCreator;
use crate::raster::scale_down;

pub const THUMB_FORMAT: ImageFormat = ImageFormat::Png;
pub const THUMB_EXT: &str = "png";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeClass {
    /// 128 x 128
    Normal,
    /// 256 x 256
    Large,
}

impl SizeClass {
    pub const ALL: [SizeClass; 2] = [SizeClass::Normal, SizeClass::Large];

    /// Cache class for a box, or `None` when the box is too large to cache.
    pub fn for_box(width: u32, height: u32) -> Option<SizeClass> {
        if width <= 128 && height <= 128 {
            Some(SizeClass::Normal)
        } else if width <= 256 && height <= 256 {
            Some(SizeClass::Large)
        } else {
            None
        }
    }

    pub fn pixels(self) -> u32 {
        match self {
            SizeClass::Normal => 128,
            SizeClass::Large => 256,
        }
    }

    pub fn dir_name(self) -> &'static str {
        match self {
            SizeClass::Normal => "normal",
            SizeClass::Large => "large",
        }
    }
}

#[cfg(unix)]
fn path_bytes(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
fn path_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

#[cfg(unix)]
fn path_from_bytes(bytes: Vec<u8>) -> Option<PathBuf> {
    use std::os::unix::ffi::OsStringExt;
    Some(PathBuf::from(std::ffi::OsString::from_vec(bytes)))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: Vec<u8>) -> Option<PathBuf> {
    String::from_utf8(bytes).ok().map(PathBuf::from)
}

fn mtime_secs(path: &Path) -> std::io::Result<i64> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(match modified.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    })
}

/// Cache key of a file: `hex(path) + mtime`.
pub fn cache_key(path: &Path) -> std::io::Result<String> {
    Ok(format!("{}{}", hex::encode(path_bytes(path)), mtime_secs(path)?))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PruneStats {
    pub kept: usize,
    pub removed: usize,
}

pub struct SubThumbnailCache {
    base: PathBuf,
    dirs_ready: bool,
}

impl SubThumbnailCache {
    pub fn new(base: PathBuf) -> Self {
        SubThumbnailCache {
            base,
            dirs_ready: false,
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn entry_path(&self, class: SizeClass, key: &str) -> PathBuf {
        self.base
            .join(class.dir_name())
            .join(format!("{}.{}", key, THUMB_EXT))
    }

    fn ensure_dirs(&mut self) {
        if self.dirs_ready {
            return;
        }
        for class in SizeClass::ALL {
            let dir = self.base.join(class.dir_name());
            if let Err(e) = create_private_dir(&dir) {
                log::warn!("cache dir {}: {}", dir.display(), e);
            }
        }
        self.dirs_ready = true;
    }

    /// Sub-thumbnail of `path` fitting `width` x `height`.
    ///
    /// Boxes up to 256 px are served from (and stored into) the cache at the
    /// class resolution; larger boxes are rendered directly.
    pub fn get_or_create(
        &mut self,
        path: &Path,
        width: u32,
        height: u32,
        creator: &dyn ThumbCreator,
    ) -> Result<RgbaImage> {
        let Some(class) = SizeClass::for_box(width, height) else {
            return creator.create(path, width, height);
        };

        let key = cache_key(path).with_context(|| format!("stat {}", path.display()))?;
        let entry = self.entry_path(class, &key);
        self.ensure_dirs();

        if let Ok(img) = image::open(&entry) {
            log::debug!("cache hit {} -> {}", path.display(), entry.display());
            return Ok(img.into_rgba8());
        }

        let size = class.pixels();
        let img = creator.create(path, size, size)?;
        let img = scale_down(img, size, size).context("creator returned an empty image")?;
        if let Err(e) = self.store(&entry, &img) {
            log::warn!("cannot cache {}: {:#}", entry.display(), e);
        }
        Ok(img)
    }

    fn store(&self, entry: &Path, img: &RgbaImage) -> Result<()> {
        let dir = entry.parent().context("cache entry without directory")?;
        let mut tmp = tempfile::Builder::new()
            .prefix(".tmp-")
            .suffix(&format!(".{}", THUMB_EXT))
            .tempfile_in(dir)?;
        let mut buf = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buf), THUMB_FORMAT)?;
        tmp.write_all(&buf)?;
        tmp.persist(entry)?;
        log::debug!("cached {}", entry.display());
        Ok(())
    }

    /// Delete entries whose file is gone or has changed since it was cached.
    /// Temporary files of in-flight writes are left alone.
    pub fn prune_orphans(&self) -> Result<PruneStats> {
        let mut stats = PruneStats::default();
        for class in SizeClass::ALL {
            let dir = self.base.join(class.dir_name());
            let entries = match fs::read_dir(&dir) {
                Ok(e) => e,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e).with_context(|| format!("read {}", dir.display())),
            };
            for entry in entries.filter_map(|e| e.ok()) {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some(THUMB_EXT) {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                if stem.starts_with('.') {
                    continue;
                }
                if is_live(stem) {
                    stats.kept += 1;
                    continue;
                }
                match fs::remove_file(&path) {
                    Ok(()) => {
                        log::debug!("pruned {}", path.display());
                        stats.removed += 1;
                    }
                    Err(e) => log::warn!("cannot prune {}: {}", path.display(), e),
                }
            }
        }
        Ok(stats)
    }
}

/// Does some split of `stem` into `hex(path)` + `mtime` name an existing
/// file with that modification time? Hex digits and the decimal suffix
/// overlap, so every even split point is tried.
fn is_live(stem: &str) -> bool {
    (2..stem.len()).step_by(2).any(|split| {
        let (hex_part, secs) = stem.split_at(split);
        let Ok(secs) = secs.parse::<i64>() else {
            return false;
        };
        let Some(path) = hex::decode(hex_part).ok().and_then(path_from_bytes) else {
            return false;
        };
        matches!(mtime_secs(&path), Ok(m) if m == secs)
    })
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)
}
