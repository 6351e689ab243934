//! Directory previews: up to four sub-thumbnails scattered over a folder icon.
//!
//! A scan walks one level of the directory (sorted by name, so a directory
//! that did not change gets the same layout), skipping files that are too
//! large, have no enabled creator or fail to render. Subdirectories are only
//! remembered: when nothing in the directory itself can be shown, the preview
//! of the first allow-listed subdirectory (e.g. `VIDEO_TS`) is used instead.
//!
//! Exactly one placeable file produces a single large tile instead of a
//! mostly empty 2x2 grid.

use image::{imageops::FilterType, RgbaImage};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::cache::SubThumbnailCache;
use crate::creators::Registry;
use crate::frame::draw_picture_frame;
use crate::icons::IconLoader;
use crate::mime;
use crate::raster::fit_size;

/// Entries inspected per directory before giving up.
pub const MAX_DIRECTORY_FILES: usize = 500;
/// Subdirectories remembered as propagation candidates.
pub const MAX_SUBDIRECTORIES: usize = 50;

const TILES: i64 = 2;
const SPACING: i64 = 1;
const VISIBLE_COUNT: usize = (TILES * TILES) as usize;
const MIN_SEGMENT: i64 = 5;

/// Result of tiling one directory.
#[derive(Debug, Default)]
pub struct TileLayout {
    /// `None` when the directory has nothing to preview.
    pub image: Option<RgbaImage>,
    /// Files placed, in placement order (row-major).
    pub placed: Vec<PathBuf>,
    /// True when the single-tile image was returned.
    pub single_tile: bool,
    /// Entries inspected in the directory that produced the layout.
    pub inspected: usize,
}

/// Margins and cell sizes over a folder icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub folder_w: i64,
    pub folder_h: i64,
    pub top: i64,
    pub bottom: i64,
    pub left: i64,
    pub right: i64,
    pub segment_w: i64,
    pub segment_h: i64,
    pub frame_width: u32,
}

impl Geometry {
    pub fn for_folder(folder_w: u32, folder_h: u32) -> Geometry {
        let (fw, fh) = (folder_w as i64, folder_h as i64);
        let top = fh * 30 / 100;
        let bottom = fh / 6;
        let left = fw / 13;
        let right = left;
        Geometry {
            folder_w: fw,
            folder_h: fh,
            top,
            bottom,
            left,
            right,
            segment_w: (fw - left - right + SPACING) / TILES - SPACING,
            segment_h: (fh - top - bottom + SPACING) / TILES - SPACING,
            frame_width: (folder_w as f64 / 85.0).round() as u32,
        }
    }

    /// Too small for a useful preview.
    pub fn too_small(&self) -> bool {
        self.segment_w < MIN_SEGMENT || self.segment_h < MIN_SEGMENT
    }

    fn max_y(&self) -> i64 {
        self.folder_h - self.bottom - self.segment_h
    }

    fn one_tile(&self) -> (u32, u32) {
        (
            (self.folder_w - self.left - self.right) as u32,
            (self.folder_h - self.top - self.bottom) as u32,
        )
    }
}

/// Progress of a scan across passes.
struct Scan {
    x: i64,
    y: i64,
    iterations: usize,
    capped: bool,
    skipped: usize,
    skip_valid: usize,
    placed: Vec<PathBuf>,
    subdirs: Vec<(PathBuf, String)>,
}

pub struct DirectoryTiler<'a> {
    pub registry: &'a Registry,
    pub cache: &'a mut SubThumbnailCache,
    pub icons: &'a IconLoader,
    pub rng: &'a mut fastrand::Rng,
    pub max_file_size: u64,
    pub propagation: &'a HashSet<String>,
}

impl DirectoryTiler<'_> {
    /// Preview of `dir` fitting `width` x `height`. `sequence` selects the
    /// page of placeable files to show (0 = the first four).
    pub fn thumbnail(&mut self, dir: &Path, width: u32, height: u32, sequence: u32) -> TileLayout {
        let folder = self.icons.folder_icon(width.min(height));
        let geo = Geometry::for_folder(folder.width(), folder.height());
        if geo.too_small() {
            log::debug!("{}: segments too small ({}x{})", dir.display(), geo.segment_w, geo.segment_h);
            return TileLayout::default();
        }

        let mut canvas = folder.clone();
        let mut one_tile = folder;
        let mut scan = Scan {
            x: geo.left,
            y: geo.top,
            iterations: 0,
            capped: false,
            skipped: 0,
            skip_valid: sequence as usize * VISIBLE_COUNT,
            placed: Vec::new(),
            subdirs: Vec::new(),
        };

        let mut first_pass = true;
        while scan.skipped <= scan.skip_valid && scan.y <= geo.max_y() && scan.placed.is_empty() {
            if !self.scan_pass(dir, &geo, &mut scan, &mut canvas, &mut one_tile, first_pass) {
                break;
            }
            first_pass = false;

            // round up to full pages
            if scan.skipped != 0 {
                scan.skipped = scan.skipped.div_ceil(VISIBLE_COUNT) * VISIBLE_COUNT;
            }
            if scan.skipped == 0 {
                break;
            }
            // drop whole rounds through the directory still left to skip
            scan.skip_valid -= (scan.skip_valid / scan.skipped) * scan.skipped;
            scan.skipped = 0;
        }

        // A later page that did not fill the grid continues from the start.
        if sequence > 0 && !scan.placed.is_empty() && scan.y <= geo.max_y() && !scan.capped {
            scan.skip_valid = 0;
            scan.skipped = 0;
            self.scan_pass(dir, &geo, &mut scan, &mut canvas, &mut one_tile, false);
        }

        let inspected = scan.iterations.min(MAX_DIRECTORY_FILES);
        match scan.placed.len() {
            0 => {
                for (path, name) in scan.subdirs.iter().take(MAX_SUBDIRECTORIES) {
                    if self.propagation.contains(name) {
                        log::debug!("{}: propagating into {}", dir.display(), name);
                        return self.thumbnail(path, width, height, sequence);
                    }
                }
                log::debug!("{}: nothing to preview", dir.display());
                TileLayout {
                    inspected,
                    ..Default::default()
                }
            }
            1 => TileLayout {
                image: Some(one_tile),
                placed: scan.placed,
                single_tile: true,
                inspected,
            },
            _ => TileLayout {
                image: Some(canvas),
                placed: scan.placed,
                single_tile: false,
                inspected,
            },
        }
    }

    /// One walk over the directory. Returns false when it has no entries.
    fn scan_pass(
        &mut self,
        dir: &Path,
        geo: &Geometry,
        scan: &mut Scan,
        canvas: &mut RgbaImage,
        one_tile: &mut RgbaImage,
        collect_subdirs: bool,
    ) -> bool {
        let entries = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name();
        let mut any = false;

        for entry in entries {
            any = true;
            if scan.y > geo.max_y() {
                break;
            }
            scan.iterations += 1;
            if scan.iterations > MAX_DIRECTORY_FILES {
                log::debug!("{}: stopped after {} entries", dir.display(), MAX_DIRECTORY_FILES);
                scan.skip_valid = 0;
                scan.skipped = 0;
                scan.capped = true;
                break;
            }

            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    log::debug!("{}: {}", dir.display(), e);
                    continue;
                }
            };
            let path = entry.path();

            if entry.file_type().is_dir() {
                if collect_subdirs && scan.subdirs.len() < MAX_SUBDIRECTORIES {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    scan.subdirs.push((path.to_path_buf(), name));
                }
                continue;
            }

            // never show the same thumbnail twice
            if scan.placed.first().is_some_and(|first| first == path) {
                break;
            }

            match entry.metadata() {
                Ok(meta) if meta.len() <= self.max_file_size => {}
                Ok(_) => {
                    log::debug!("{}: too large", path.display());
                    continue;
                }
                Err(_) => continue,
            }

            let (sw, sh) = (geo.segment_w as u32, geo.segment_h as u32);
            let Some(sub) = self.create_sub_thumbnail(path, sw, sh) else {
                continue;
            };

            if scan.skipped < scan.skip_valid {
                scan.skipped += 1;
                continue;
            }

            self.draw_sub_thumbnail(canvas, sub, sw, sh, scan.x, scan.y, geo.frame_width);
            if scan.placed.is_empty() {
                let (ow, oh) = geo.one_tile();
                if let Some(big) = self.create_sub_thumbnail(path, ow, oh) {
                    self.draw_sub_thumbnail(one_tile, big, ow, oh, geo.left, geo.top, geo.frame_width);
                }
            }
            scan.placed.push(path.to_path_buf());

            scan.x += geo.segment_w + SPACING;
            if scan.x > geo.folder_w - geo.right - geo.segment_w {
                scan.x = geo.left;
                scan.y += geo.segment_h + SPACING;
            }
        }
        any
    }

    /// Sub-thumbnail of one file, if an enabled creator can make one.
    fn create_sub_thumbnail(&mut self, path: &Path, width: u32, height: u32) -> Option<RgbaImage> {
        let plugin = self.registry.plugin_for_mime_type(mime::for_path(path))?;
        if !self.registry.is_enabled(plugin) {
            return None;
        }
        let creator = self.registry.get(plugin)?;
        match self.cache.get_or_create(path, width, height, creator.as_ref()) {
            Ok(img) => Some(img),
            Err(e) => {
                log::debug!("no sub-thumbnail for {}: {:#}", path.display(), e);
                None
            }
        }
    }

    /// Frame `sub` centered in the `width` x `height` cell at `(x, y)`.
    #[allow(clippy::too_many_arguments)]
    fn draw_sub_thumbnail(
        &mut self,
        canvas: &mut RgbaImage,
        sub: RgbaImage,
        width: u32,
        height: u32,
        x: i64,
        y: i64,
        frame_width: u32,
    ) {
        // cheap pre-shrink of huge images before the smooth scale
        let sub = if sub.width() > width * 4 || sub.height() > height * 4 {
            let (w, h) = fit_size(sub.width(), sub.height(), width * 4, height * 4);
            image::imageops::resize(&sub, w.max(1), h.max(1), FilterType::Nearest)
        } else {
            sub
        };
        let target = fit_size(sub.width(), sub.height(), width, height);
        let center = (x + width as i64 / 2, y + height as i64 / 2);
        draw_picture_frame(canvas, center, &sub, frame_width, target, self.rng);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::creators::testing::counting_registry;
    use crate::creators::CreatorFlags;
    use image::{Rgb, RgbImage};
    use std::cell::Cell;
    use std::fs;
    use std::rc::Rc;

    struct Fixture {
        root: tempfile::TempDir,
        registry: Registry,
        calls: Rc<Cell<usize>>,
        cache: SubThumbnailCache,
        icons: IconLoader,
        propagation: HashSet<String>,
    }

    impl Fixture {
        fn new() -> Self {
            let root = tempfile::tempdir().unwrap();
            let (registry, calls) = counting_registry(CreatorFlags::default());
            let cache = SubThumbnailCache::new(root.path().join("cache"));
            Fixture {
                root,
                registry,
                calls,
                cache,
                icons: IconLoader::new(None, 48),
                propagation: ["VIDEO_TS".to_string()].into_iter().collect(),
            }
        }

        fn dir(&self, name: &str) -> PathBuf {
            let d = self.root.path().join(name);
            fs::create_dir_all(&d).unwrap();
            d
        }

        fn layout(&mut self, dir: &Path, size: u32, sequence: u32, seed: u64) -> TileLayout {
            let mut rng = fastrand::Rng::with_seed(seed);
            DirectoryTiler {
                registry: &self.registry,
                cache: &mut self.cache,
                icons: &self.icons,
                rng: &mut rng,
                max_file_size: 1024 * 1024,
                propagation: &self.propagation,
            }
            .thumbnail(dir, size, size, sequence)
        }
    }

    fn write_image(path: &Path, w: u32, h: u32) {
        RgbImage::from_pixel(w, h, Rgb([200, 40, 40])).save(path).unwrap();
    }

    fn names(layout: &TileLayout) -> Vec<String> {
        layout
            .placed
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn geometry_for_256() {
        let g = Geometry::for_folder(256, 256);
        assert_eq!((g.top, g.bottom, g.left, g.right), (76, 42, 19, 19));
        assert_eq!((g.segment_w, g.segment_h), (108, 68));
        assert_eq!(g.frame_width, 3);
        assert_eq!(g.one_tile(), (218, 138));
        assert!(!g.too_small());
        assert!(Geometry::for_folder(16, 16).too_small());
    }

    #[test]
    fn four_of_six_fill_the_grid() {
        let mut fx = Fixture::new();
        let dir = fx.dir("photos");
        for n in ["a", "b", "c", "d", "e", "f"] {
            write_image(&dir.join(format!("{}.png", n)), 64, 48);
        }
        let layout = fx.layout(&dir, 256, 0, 1);
        assert_eq!(names(&layout), ["a.png", "b.png", "c.png", "d.png"]);
        assert!(!layout.single_tile);
        assert_eq!(layout.image.unwrap().dimensions(), (256, 256));
    }

    #[test]
    fn same_directory_same_selection() {
        let mut fx = Fixture::new();
        let dir = fx.dir("photos");
        for n in ["z", "m", "b"] {
            write_image(&dir.join(format!("{}.png", n)), 30, 30);
        }
        let first = fx.layout(&dir, 128, 0, 1);
        let second = fx.layout(&dir, 128, 0, 99);
        assert_eq!(first.placed, second.placed);
        assert_eq!(names(&first), ["b.png", "m.png", "z.png"]);
    }

    #[test]
    fn single_file_uses_single_tile() {
        let mut fx = Fixture::new();
        let dir = fx.dir("one");
        write_image(&dir.join("a.jpg"), 200, 200);
        fs::write(dir.join("notes.txt"), b"hello").unwrap();

        let layout = fx.layout(&dir, 256, 0, 5);
        assert_eq!(names(&layout), ["a.jpg"]);
        assert!(layout.single_tile);
        assert_eq!(layout.image.unwrap().dimensions(), (256, 256));
        // segment (normal) and single tile (large) renders
        assert_eq!(fx.calls.get(), 2);
    }

    #[test]
    fn second_request_is_served_from_cache() {
        let mut fx = Fixture::new();
        let dir = fx.dir("photos");
        write_image(&dir.join("a.png"), 50, 50);
        write_image(&dir.join("b.png"), 50, 50);
        fx.layout(&dir, 256, 0, 1);
        let after_first = fx.calls.get();
        fx.layout(&dir, 256, 0, 2);
        assert_eq!(fx.calls.get(), after_first);
    }

    #[test]
    fn large_and_unrenderable_files_are_skipped() {
        let mut fx = Fixture::new();
        let dir = fx.dir("mixed");
        write_image(&dir.join("a.png"), 20, 20);
        fs::write(dir.join("b.png"), b"broken").unwrap();
        fs::write(dir.join("c.png"), vec![0u8; 2 * 1024 * 1024]).unwrap();
        write_image(&dir.join("d.png"), 20, 20);
        fs::write(dir.join("e.txt"), b"text").unwrap();

        let layout = fx.layout(&dir, 128, 0, 1);
        assert_eq!(names(&layout), ["a.png", "d.png"]);
    }

    #[test]
    fn empty_directory_has_no_preview() {
        let mut fx = Fixture::new();
        let dir = fx.dir("empty");
        let layout = fx.layout(&dir, 128, 0, 1);
        assert!(layout.image.is_none());
        assert!(layout.placed.is_empty());
    }

    #[test]
    fn propagates_into_allow_listed_subdirectory() {
        let mut fx = Fixture::new();
        let dvd = fx.dir("movie");
        fs::write(dvd.join("readme.txt"), b"x").unwrap();
        let sub = fx.dir("movie/VIDEO_TS");
        write_image(&sub.join("menu.png"), 40, 30);
        write_image(&sub.join("title.png"), 40, 30);

        let via_parent = fx.layout(&dvd, 128, 0, 4);
        let direct = fx.layout(&sub, 128, 0, 4);
        assert_eq!(via_parent.placed, direct.placed);
        assert_eq!(names(&via_parent), ["menu.png", "title.png"]);
        assert_eq!(via_parent.image, direct.image);
    }

    #[test]
    fn other_subdirectories_are_not_propagated() {
        let mut fx = Fixture::new();
        let parent = fx.dir("parent");
        let sub = fx.dir("parent/holiday");
        write_image(&sub.join("a.png"), 40, 30);
        let layout = fx.layout(&parent, 128, 0, 1);
        assert!(layout.image.is_none());
    }

    #[test]
    fn only_the_first_50_subdirectories_are_considered() {
        let mut fx = Fixture::new();
        let parent = fx.dir("disc");
        // "A.." sorts before "VIDEO_TS"
        for i in 0..MAX_SUBDIRECTORIES {
            fx.dir(&format!("disc/A{:02}", i));
        }
        let sub = fx.dir("disc/VIDEO_TS");
        write_image(&sub.join("menu.png"), 40, 30);

        let layout = fx.layout(&parent, 128, 0, 1);
        assert!(layout.image.is_none());

        fs::remove_dir(parent.join("A00")).unwrap();
        let layout = fx.layout(&parent, 128, 0, 1);
        assert_eq!(names(&layout), ["menu.png"]);
    }

    #[test]
    fn scan_stops_after_500_entries() {
        let mut fx = Fixture::new();
        let dir = fx.dir("many");
        for i in 0..MAX_DIRECTORY_FILES {
            fs::write(dir.join(format!("f{:04}.txt", i)), b"").unwrap();
        }
        // the 501st entry would be placeable
        write_image(&dir.join("z.png"), 10, 10);
        let layout = fx.layout(&dir, 128, 0, 1);
        assert!(layout.image.is_none());
        assert_eq!(layout.inspected, MAX_DIRECTORY_FILES);
        assert_eq!(fx.calls.get(), 0);

        // one entry fewer and the image is reached
        fs::remove_file(dir.join("f0000.txt")).unwrap();
        let layout = fx.layout(&dir, 128, 0, 1);
        assert_eq!(names(&layout), ["z.png"]);
    }

    #[test]
    fn sequence_shows_next_page_and_wraps() {
        let mut fx = Fixture::new();
        let dir = fx.dir("five");
        for n in ["a", "b", "c", "d", "e"] {
            write_image(&dir.join(format!("{}.png", n)), 20, 20);
        }
        let layout = fx.layout(&dir, 256, 1, 1);
        assert_eq!(names(&layout), ["e.png", "a.png", "b.png", "c.png"]);
    }

    #[test]
    fn wrap_never_repeats_the_first_file() {
        let mut fx = Fixture::new();
        let dir = fx.dir("two");
        write_image(&dir.join("a.png"), 20, 20);
        write_image(&dir.join("b.png"), 20, 20);
        // page 1 does not exist: skipping wraps back to page 0
        let layout = fx.layout(&dir, 256, 1, 1);
        assert_eq!(names(&layout), ["a.png", "b.png"]);
    }

    #[test]
    fn sequence_past_the_end_wraps_modulo_pages() {
        let mut fx = Fixture::new();
        let dir = fx.dir("five");
        for n in ["a", "b", "c", "d", "e"] {
            write_image(&dir.join(format!("{}.png", n)), 20, 20);
        }
        // 2 pages exist, page 3 is page 1
        let layout = fx.layout(&dir, 256, 3, 1);
        assert_eq!(names(&layout), ["e.png", "a.png", "b.png", "c.png"]);
    }

    #[test]
    fn tiny_request_has_no_preview() {
        let mut fx = Fixture::new();
        let dir = fx.dir("photos");
        write_image(&dir.join("a.png"), 20, 20);
        let layout = fx.layout(&dir, 16, 0, 1);
        assert!(layout.image.is_none());
        assert_eq!(fx.calls.get(), 0);
    }
}
