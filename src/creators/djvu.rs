use anyhow::{Context, Result};
use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use super::process::{locate, run_with_timeout, stderr_tail};
use super::{CreatorFlags, ThumbCreator};

/// DjVu documents: the first page rendered by `ddjvu` as PPM on stdout.
pub struct DjvuCreator {
    ddjvu: PathBuf,
    timeout: Duration,
}

impl DjvuCreator {
    pub fn locate(ddjvu: &str, timeout: Duration) -> Result<Self> {
        Ok(DjvuCreator {
            ddjvu: locate(ddjvu)?,
            timeout,
        })
    }
}

fn render_args(width: u32, height: u32) -> Vec<String> {
    vec![
        "-format=ppm".into(),
        "-page=1".into(),
        format!("-size={}x{}", width.max(1), height.max(1)),
        "-aspect=yes".into(),
    ]
}

impl ThumbCreator for DjvuCreator {
    fn create(&self, path: &Path, width: u32, height: u32) -> Result<RgbaImage> {
        let child = Command::new(&self.ddjvu)
            .args(render_args(width, height))
            .arg(path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context("ddjvu failed to start")?;
        let output = run_with_timeout(child, self.timeout)?;
        if !output.status.success() {
            anyhow::bail!("ddjvu error: {}", stderr_tail(&output));
        }
        if output.stdout.is_empty() {
            anyhow::bail!("ddjvu produced empty output");
        }
        Ok(image::load_from_memory(&output.stdout)
            .context("decode ddjvu page")?
            .into_rgba8())
    }

    fn flags(&self) -> CreatorFlags {
        CreatorFlags {
            draw_frame: true,
            blend_icon: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_fitted_into_box() {
        assert_eq!(
            render_args(128, 0),
            ["-format=ppm", "-page=1", "-size=128x1", "-aspect=yes"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn page_from_fake_ddjvu() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("ddjvu");
        // a 2x1 binary PPM
        std::fs::write(&script, "#!/bin/sh\nprintf 'P6\\n2 1\\n255\\n\\377\\000\\000\\000\\377\\000'\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let doc = dir.path().join("paper.djvu");
        std::fs::write(&doc, b"AT&TFORM").unwrap();
        let creator = DjvuCreator::locate(script.to_str().unwrap(), Duration::from_secs(5)).unwrap();
        let img = creator.create(&doc, 64, 64).unwrap();
        assert_eq!(img.dimensions(), (2, 1));
        assert_eq!(img.get_pixel(0, 0), &image::Rgba([255, 0, 0, 255]));
        assert!(creator.flags().draw_frame && creator.flags().blend_icon);
    }

    #[cfg(unix)]
    #[test]
    fn failing_ddjvu_is_an_error() {
        let creator = DjvuCreator::locate("false", Duration::from_secs(5)).unwrap();
        assert!(creator.create(Path::new("/nonexistent.djvu"), 64, 64).is_err());
    }
}
