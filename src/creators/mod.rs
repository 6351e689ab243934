//! Thumbnail creators and the registry that maps names and MIME types to them.
//!
//! The set of creators is known at compile time. Each one is instantiated
//! lazily on first use and then kept for the lifetime of the registry.

mod comic;
mod djvu;
mod ebook;
mod exe;
mod images;
mod process;
mod video;

pub use self::comic::ComicCreator;
pub use self::djvu::DjvuCreator;
pub use self::ebook::EbookCreator;
pub use self::exe::ExeCreator;
pub use self::images::ImageCreator;
pub use self::video::VideoCreator;

use ::image::RgbaImage;
use std::cell::{OnceCell, RefCell};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::rc::Rc;

use crate::config::PreviewSettings;

/// Name of the pseudo-plugin that selects the directory tiler.
pub const DIRECTORY_PLUGIN: &str = "directorythumbnail";

/// Post-processing a creator asks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreatorFlags {
    /// Draw a 1px "page" border around the result.
    pub draw_frame: bool,
    /// Blend the MIME type icon into the bottom-right corner.
    pub blend_icon: bool,
}

pub trait ThumbCreator {
    /// Render a preview of `path`. `width` x `height` is a hint; the caller
    /// scales the result down when it comes back larger.
    fn create(&self, path: &Path, width: u32, height: u32) -> anyhow::Result<RgbaImage>;

    fn flags(&self) -> CreatorFlags {
        CreatorFlags::default()
    }
}

#[derive(Debug, Clone)]
pub struct CreatorInfo {
    pub name: String,
    /// Exact MIME types, or prefixes ending in `*` (`video/*`).
    pub mime_types: Vec<String>,
    pub enabled_by_default: bool,
}

type Factory = Box<dyn Fn() -> anyhow::Result<Rc<dyn ThumbCreator>>>;

pub struct Registry {
    entries: Vec<(CreatorInfo, Factory)>,
    instances: RefCell<HashMap<String, Rc<dyn ThumbCreator>>>,
    allow_list: Option<Vec<String>>,
    enabled: OnceCell<HashSet<String>>,
}

impl Registry {
    /// Empty registry. `allow_list` is the configured enabled-plugin list;
    /// `None` enables every creator marked enabled-by-default.
    pub fn empty(allow_list: Option<Vec<String>>) -> Self {
        Registry {
            entries: Vec::new(),
            instances: RefCell::new(HashMap::new()),
            allow_list,
            enabled: OnceCell::new(),
        }
    }

    /// Registry with the built-in creators.
    pub fn with_builtins(settings: &PreviewSettings) -> Self {
        let mut reg = Registry::empty(settings.plugins.clone());
        reg.register(
            CreatorInfo {
                name: "imagethumbnail".into(),
                mime_types: ImageCreator::MIME_TYPES.iter().map(|m| m.to_string()).collect(),
                enabled_by_default: true,
            },
            || Ok(Rc::new(ImageCreator)),
        );
        reg.register(
            CreatorInfo {
                name: "comicbookthumbnail".into(),
                mime_types: vec!["application/x-cbz".into(), "application/x-cbt".into()],
                enabled_by_default: true,
            },
            || Ok(Rc::new(ComicCreator)),
        );
        reg.register(
            CreatorInfo {
                name: "ebookthumbnail".into(),
                mime_types: vec!["application/epub+zip".into()],
                enabled_by_default: true,
            },
            || Ok(Rc::new(EbookCreator)),
        );
        let ffmpeg = settings.ffmpeg.clone();
        let timeout = std::time::Duration::from_secs(settings.ffmpeg_timeout_secs);
        reg.register(
            CreatorInfo {
                name: "ffmpegthumbs".into(),
                mime_types: vec!["video/*".into()],
                enabled_by_default: false,
            },
            move || Ok(Rc::new(VideoCreator::locate(&ffmpeg, timeout)?)),
        );
        let helper_timeout = std::time::Duration::from_secs(settings.helper_timeout_secs);
        let wrestool = settings.wrestool.clone();
        reg.register(
            CreatorInfo {
                name: "windowsexethumbnail".into(),
                mime_types: vec![
                    "application/x-ms-dos-executable".into(),
                    "application/x-msdownload".into(),
                ],
                enabled_by_default: false,
            },
            move || Ok(Rc::new(ExeCreator::locate(&wrestool, helper_timeout)?)),
        );
        let ddjvu = settings.ddjvu.clone();
        reg.register(
            CreatorInfo {
                name: "djvuthumbnail".into(),
                mime_types: vec!["image/vnd.djvu".into()],
                enabled_by_default: false,
            },
            move || Ok(Rc::new(DjvuCreator::locate(&ddjvu, helper_timeout)?)),
        );
        reg
    }

    pub fn register<F>(&mut self, info: CreatorInfo, factory: F)
    where
        F: Fn() -> anyhow::Result<Rc<dyn ThumbCreator>> + 'static,
    {
        self.entries.push((info, Box::new(factory)));
    }

    pub fn infos(&self) -> impl Iterator<Item = &CreatorInfo> {
        self.entries.iter().map(|(info, _)| info)
    }

    /// Instance of the named creator, created on first request. A creator
    /// that fails to come up is not remembered and is retried next time.
    pub fn get(&self, name: &str) -> Option<Rc<dyn ThumbCreator>> {
        if let Some(c) = self.instances.borrow().get(name) {
            return Some(c.clone());
        }
        let (_, factory) = self.entries.iter().find(|(info, _)| info.name == name)?;
        match factory() {
            Ok(c) => {
                log::debug!("creator {} loaded", name);
                self.instances
                    .borrow_mut()
                    .insert(name.to_string(), c.clone());
                Some(c)
            }
            Err(e) => {
                log::warn!("cannot load creator {}: {:#}", name, e);
                None
            }
        }
    }

    /// Name of the creator handling `mime_type`: an exact match first, then
    /// the first creator with a matching `prefix*` entry.
    pub fn plugin_for_mime_type(&self, mime_type: &str) -> Option<&str> {
        let exact = self
            .infos()
            .find(|info| info.mime_types.iter().any(|m| m == mime_type));
        if let Some(info) = exact {
            return Some(info.name.as_str());
        }
        self.infos()
            .find(|info| {
                info.mime_types.iter().any(|m| {
                    m.strip_suffix('*')
                        .map(|prefix| mime_type.starts_with(prefix))
                        .unwrap_or(false)
                })
            })
            .map(|info| info.name.as_str())
    }

    /// Creators allowed to render sub-thumbnails. Computed on first use.
    pub fn enabled(&self) -> &HashSet<String> {
        self.enabled.get_or_init(|| match &self.allow_list {
            Some(list) => list.iter().cloned().collect(),
            None => self
                .infos()
                .filter(|info| info.enabled_by_default)
                .map(|info| info.name.clone())
                .collect(),
        })
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled().contains(name)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::Cell;

    /// Creator that decodes images and counts its invocations.
    pub struct CountingCreator {
        pub calls: Rc<Cell<usize>>,
        pub flags: CreatorFlags,
    }

    impl ThumbCreator for CountingCreator {
        fn create(&self, path: &Path, width: u32, height: u32) -> anyhow::Result<RgbaImage> {
            self.calls.set(self.calls.get() + 1);
            ImageCreator.create(path, width, height)
        }

        fn flags(&self) -> CreatorFlags {
            self.flags
        }
    }

    /// Registry with a single counting image creator named `imagethumbnail`.
    pub fn counting_registry(flags: CreatorFlags) -> (Registry, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let mut reg = Registry::empty(None);
        let counter = calls.clone();
        reg.register(
            CreatorInfo {
                name: "imagethumbnail".into(),
                mime_types: vec!["image/*".into()],
                enabled_by_default: true,
            },
            move || {
                Ok(Rc::new(CountingCreator {
                    calls: counter.clone(),
                    flags,
                }))
            },
        );
        (reg, calls)
    }
}
