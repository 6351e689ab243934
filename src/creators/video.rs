use anyhow::{Context, Result};
use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use super::process::{locate, run_with_timeout, stderr_tail};
use super::{CreatorFlags, ThumbCreator};

/// Videos: one keyframe extracted by an external ffmpeg.
pub struct VideoCreator {
    ffmpeg: PathBuf,
    duration_tool: PathBuf,
    timeout: Duration,
}

impl VideoCreator {
    /// Find the ffmpeg binary (a path, or a name looked up on PATH).
    pub fn locate(ffmpeg: &str, timeout: Duration) -> Result<Self> {
        let ffmpeg = locate(ffmpeg)?;
        let duration_tool = ffmpeg.with_file_name(if cfg!(windows) { "ffprobe.exe" } else { "ffprobe" });
        Ok(VideoCreator {
            ffmpeg,
            duration_tool,
            timeout,
        })
    }

    /// Duration in seconds, if the container reports one.
    fn media_duration(&self, path: &Path) -> Option<f64> {
        let child = Command::new(&self.duration_tool)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "format=duration",
                "-of",
                "csv=p=0",
            ])
            .arg(path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .ok()?;
        let out = run_with_timeout(child, self.timeout).ok()?;
        String::from_utf8_lossy(&out.stdout).trim().parse().ok()
    }
}

impl ThumbCreator for VideoCreator {
    /// Seek to ~30% (past intros and black frames), decode a single keyframe
    /// scaled into the requested box, read it back as PNG from stdout.
    fn create(&self, path: &Path, width: u32, height: u32) -> Result<RgbaImage> {
        let duration = self.media_duration(path).unwrap_or(60.0);
        let seek_to = (duration * 0.3).max(1.0).min(duration.max(0.0));
        log::debug!("video thumb: {} dur={:.0}s seek={:.1}s", path.display(), duration, seek_to);

        let child = Command::new(&self.ffmpeg)
            .args(["-ss", &format!("{:.1}", seek_to), "-skip_frame", "nokey", "-i"])
            .arg(path)
            .args([
                "-vframes",
                "1",
                "-vf",
                &format!(
                    "scale={}:{}:force_original_aspect_ratio=decrease",
                    width.max(1),
                    height.max(1)
                ),
                "-c:v",
                "png",
                "-f",
                "image2pipe",
                "-y",
                "pipe:1",
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context("ffmpeg failed to start")?;

        let output = run_with_timeout(child, self.timeout)?;
        if !output.status.success() {
            anyhow::bail!("ffmpeg error: {}", stderr_tail(&output));
        }
        if output.stdout.is_empty() {
            anyhow::bail!("ffmpeg produced empty output");
        }
        Ok(image::load_from_memory(&output.stdout)
            .context("decode ffmpeg frame")?
            .into_rgba8())
    }

    fn flags(&self) -> CreatorFlags {
        CreatorFlags {
            draw_frame: false,
            blend_icon: true,
        }
    }
}
