use anyhow::{Context, Result};
use image::RgbaImage;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use super::{CreatorFlags, ThumbCreator};

const PAGE_EXTENSIONS: &[&str] = &[".gif", ".jpg", ".jpeg", ".png"];
const ZIP_MAGIC: &[u8] = b"PK";

/// Comic book archives (`.cbz` zip, `.cbt` tar): the first page image in
/// archive order.
pub struct ComicCreator;

fn is_page(name: &str) -> bool {
    let name = name.to_lowercase();
    PAGE_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

fn first_zip_page(file: File) -> Result<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(file).context("not a readable zip archive")?;
    let cover = (0..archive.len())
        .find(|&i| match archive.by_index(i) {
            Ok(entry) => entry.is_file() && is_page(entry.name()),
            Err(_) => false,
        })
        .context("no image found in the comic book")?;

    let mut entry = archive.by_index(cover)?;
    let mut data = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut data)?;
    Ok((entry.name().to_string(), data))
}

fn first_tar_page(file: File) -> Result<(String, Vec<u8>)> {
    let mut archive = tar::Archive::new(file);
    for entry in archive.entries().context("not a readable tar archive")? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry.path()?.to_string_lossy().into_owned();
        if is_page(&name) {
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut data)?;
            return Ok((name, data));
        }
    }
    anyhow::bail!("no image found in the comic book")
}

impl ThumbCreator for ComicCreator {
    fn create(&self, path: &Path, _width: u32, _height: u32) -> Result<RgbaImage> {
        let mut file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let mut magic = [0u8; 2];
        let is_zip = file.read_exact(&mut magic).is_ok() && magic == ZIP_MAGIC;
        file.seek(SeekFrom::Start(0))?;

        let (name, data) = if is_zip {
            first_zip_page(file)?
        } else {
            first_tar_page(file)?
        };
        let img = image::load_from_memory(&data).with_context(|| format!("decode {}", name))?;
        Ok(img.into_rgba8())
    }

    fn flags(&self) -> CreatorFlags {
        CreatorFlags {
            draw_frame: true,
            blend_icon: false,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use std::io::Write;

    /// Write a zip archive with the given `(name, bytes)` entries.
    pub fn write_zip(path: &Path, entries: &[(&str, Vec<u8>)]) {
        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let opts = zip::write::SimpleFileOptions::default();
        for (name, data) in entries {
            zip.start_file(*name, opts).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    fn write_tar(path: &Path, entries: &[(&str, Vec<u8>)]) {
        let mut builder = tar::Builder::new(std::fs::File::create(path).unwrap());
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, data.as_slice()).unwrap();
        }
        builder.finish().unwrap();
    }

    pub fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        RgbaImage::from_pixel(w, h, Rgba([50, 60, 70, 255]))
            .write_to(&mut std::io::Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn first_page_in_archive_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.cbz");
        write_zip(
            &path,
            &[
                ("ComicInfo.xml", b"<ComicInfo/>".to_vec()),
                ("p02.PNG", png_bytes(9, 4)),
                ("p01.png", png_bytes(3, 3)),
            ],
        );
        let img = ComicCreator.create(&path, 128, 128).unwrap();
        assert_eq!(img.dimensions(), (9, 4));
        assert!(ComicCreator.flags().draw_frame);
    }

    #[test]
    fn archive_without_images_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.cbz");
        write_zip(&path, &[("readme.txt", b"hi".to_vec())]);
        assert!(ComicCreator.create(&path, 128, 128).is_err());
    }

    #[test]
    fn tar_comic_first_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.cbt");
        write_tar(
            &path,
            &[
                ("notes.txt", b"credits".to_vec()),
                ("pages/001.jpg.bak", b"junk".to_vec()),
                ("pages/002.png", png_bytes(5, 7)),
                ("pages/003.png", png_bytes(2, 2)),
            ],
        );
        let img = ComicCreator.create(&path, 128, 128).unwrap();
        assert_eq!(img.dimensions(), (5, 7));
    }

    #[test]
    fn neither_zip_nor_tar_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.cbt");
        std::fs::write(&path, b"plain text, not an archive").unwrap();
        assert!(ComicCreator.create(&path, 128, 128).is_err());
    }
}
