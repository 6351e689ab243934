//! CLI subcommand implementations.

use anyhow::Context;
use std::io::Write;
use std::path::Path;

use crate::config::PreviewSettings;
use crate::creators::Registry;
use crate::mime;
use crate::protocol::{self, ThumbnailProtocol, ThumbnailRequest};

/// Arguments of `get`, before defaults are filled in.
#[derive(Debug, Clone)]
pub struct GetArgs {
    pub url: String,
    pub mime: Option<String>,
    pub width: i32,
    pub height: i32,
    pub plugin: String,
    pub icon_size: i32,
    pub icon_alpha: i32,
    pub sequence: u32,
}

impl GetArgs {
    /// Request for these arguments. A missing MIME type is guessed from the
    /// path and a missing plugin is looked up by MIME type.
    pub fn to_request(&self, registry: &Registry) -> ThumbnailRequest {
        let mut req = ThumbnailRequest {
            url: self.url.clone(),
            mime_type: self.mime.clone().unwrap_or_default(),
            width: self.width,
            height: self.height,
            icon_size: self.icon_size,
            icon_alpha: self.icon_alpha,
            plugin: self.plugin.clone(),
            sequence: self.sequence,
        };
        if self.mime.is_none() {
            let path = req.path();
            req.mime_type = if path.is_dir() {
                mime::DIRECTORY.to_string()
            } else {
                mime::for_path(&path).to_string()
            };
        }
        if req.plugin.is_empty() && req.mime_type != mime::DIRECTORY {
            if let Some(name) = registry.plugin_for_mime_type(&req.mime_type) {
                req.plugin = name.to_string();
            }
        }
        req
    }
}

pub fn get(settings: PreviewSettings, args: GetArgs, output: Option<&Path>) -> anyhow::Result<()> {
    let mut proto = ThumbnailProtocol::new(settings);
    let req = args.to_request(proto.registry());
    log::debug!("request: {:?}", req);

    let thumb = proto
        .get(&req)
        .map_err(|e| anyhow::anyhow!("{}: {}", e.code(), e))?;

    match output {
        Some(path) => {
            std::fs::write(path, &thumb.data).with_context(|| format!("writing {}", path.display()))?;
            println!("Wrote {} ({} bytes)", path.display(), thumb.data.len());
        }
        None => {
            let mut out = std::io::stdout().lock();
            out.write_all(&thumb.data)?;
            out.flush()?;
        }
    }
    Ok(())
}

pub fn serve(settings: PreviewSettings) -> anyhow::Result<()> {
    let mut proto = ThumbnailProtocol::new(settings);
    let stdin = std::io::stdin().lock();
    let stdout = std::io::stdout().lock();
    protocol::serve(&mut proto, stdin, stdout)
}

pub fn plugins(settings: &PreviewSettings) {
    let registry = Registry::with_builtins(settings);
    for info in registry.infos() {
        let state = if registry.is_enabled(&info.name) { "enabled" } else { "disabled" };
        println!("{:<20} {:<9} {}", info.name, state, info.mime_types.join(", "));
    }
}

pub fn prune(settings: &PreviewSettings) -> anyhow::Result<()> {
    let proto = ThumbnailProtocol::new(settings.clone());
    let base = proto.cache().base().to_path_buf();
    println!("Pruning {}...", base.display());
    let stats = proto.cache().prune_orphans()?;
    println!("  kept {}, removed {}", stats.kept, stats.removed);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(url: &str) -> GetArgs {
        GetArgs {
            url: url.into(),
            mime: None,
            width: 128,
            height: 128,
            plugin: String::new(),
            icon_size: 0,
            icon_alpha: 255,
            sequence: 0,
        }
    }

    #[test]
    fn guesses_mime_and_plugin() {
        let registry = Registry::with_builtins(&PreviewSettings::default());
        let req = args("/photos/cat.JPG").to_request(&registry);
        assert_eq!(req.mime_type, "image/jpeg");
        assert_eq!(req.plugin, "imagethumbnail");

        let req = args("file:///books/story.epub").to_request(&registry);
        assert_eq!(req.plugin, "ebookthumbnail");
    }

    #[test]
    fn directories_get_no_plugin() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::with_builtins(&PreviewSettings::default());
        let req = args(dir.path().to_str().unwrap()).to_request(&registry);
        assert_eq!(req.mime_type, mime::DIRECTORY);
        assert!(req.plugin.is_empty());
    }

    #[test]
    fn explicit_values_are_kept() {
        let registry = Registry::with_builtins(&PreviewSettings::default());
        let mut a = args("/x/y.bin");
        a.mime = Some("application/x-cbz".into());
        a.plugin = "custom".into();
        let req = a.to_request(&registry);
        assert_eq!(req.mime_type, "application/x-cbz");
        assert_eq!(req.plugin, "custom");
    }
}
