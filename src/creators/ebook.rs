use anyhow::{Context, Result};
use image::RgbaImage;
use regex::Regex;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

use super::ThumbCreator;

/// Package documents that may name the cover.
const CONTENT_PATHS: &[&str] = &["content.opf", "OEBPS/content.opf"];
/// Conventional cover locations, tried when no package document names one.
const COVER_PATHS: &[&str] = &[
    "cover.png",
    "cover.jpg",
    "cover.jpeg",
    "cover_image.png",
    "cover_image.jpg",
    "cover_image.jpeg",
];

fn cover_ref() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"id="cover" href="([^\s]+)" media-type="#).expect("valid cover regex")
    })
}

/// EPUB books: the cover image.
pub struct EbookCreator;

impl ThumbCreator for EbookCreator {
    fn create(&self, path: &Path, _width: u32, _height: u32) -> Result<RgbaImage> {
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let mut book = zip::ZipArchive::new(file).context("not a readable epub")?;

        for content in CONTENT_PATHS {
            let Some(opf) = read_entry(&mut book, content) else {
                log::debug!("no {} in {}", content, path.display());
                continue;
            };
            let opf = String::from_utf8_lossy(&opf);
            let Some(href) = cover_ref().captures(&opf).map(|c| c[1].to_string()) else {
                log::debug!("no cover reference in {} of {}", content, path.display());
                continue;
            };
            // hrefs are relative to the package document
            let base = content.rsplit_once('/').map(|(dir, _)| dir);
            let candidates = match base {
                Some(dir) => vec![format!("{}/{}", dir, href), href],
                None => vec![href],
            };
            for name in &candidates {
                if let Some(data) = read_entry(&mut book, name) {
                    return decode(&data);
                }
            }
            log::debug!("cover {:?} missing in {}", candidates, path.display());
        }

        for name in COVER_PATHS {
            if let Some(data) = read_entry(&mut book, name) {
                return decode(&data);
            }
        }
        anyhow::bail!("no cover found in {}", path.display())
    }
}

fn read_entry(book: &mut zip::ZipArchive<File>, name: &str) -> Option<Vec<u8>> {
    let mut entry = book.by_name(name).ok()?;
    let mut data = Vec::new();
    entry.read_to_end(&mut data).ok()?;
    if data.is_empty() {
        return None;
    }
    Some(data)
}

fn decode(data: &[u8]) -> Result<RgbaImage> {
    Ok(image::load_from_memory(data).context("decode cover")?.into_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::creators::comic::tests::{png_bytes, write_zip};

    #[test]
    fn cover_from_package_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.epub");
        let opf = r#"<manifest><item id="cover" href="img/front.png" media-type="image/png"/></manifest>"#;
        write_zip(
            &path,
            &[
                ("mimetype", b"application/epub+zip".to_vec()),
                ("OEBPS/content.opf", opf.as_bytes().to_vec()),
                ("OEBPS/img/front.png", png_bytes(6, 8)),
                ("cover.png", png_bytes(2, 2)),
            ],
        );
        let img = EbookCreator.create(&path, 128, 128).unwrap();
        assert_eq!(img.dimensions(), (6, 8));
    }

    #[test]
    fn conventional_cover_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.epub");
        write_zip(&path, &[("cover.jpeg", Vec::new()), ("cover_image.png", png_bytes(5, 5))]);
        let img = EbookCreator.create(&path, 128, 128).unwrap();
        assert_eq!(img.dimensions(), (5, 5));
    }

    #[test]
    fn no_cover_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.epub");
        write_zip(&path, &[("chapter1.xhtml", b"<html/>".to_vec())]);
        assert!(EbookCreator.create(&path, 128, 128).is_err());
    }
}
