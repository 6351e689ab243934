use anyhow::{Context, Result};
use image::RgbaImage;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;
use std::time::Duration;

use super::process::{locate, run_with_timeout, stderr_tail};
use super::ThumbCreator;

/// Resource type of icon groups; tried before single icons.
const RT_GROUP_ICON: u32 = 14;
/// Resource type of single icons.
const RT_ICON: u32 = 3;

/// Windows executables: the embedded icon, extracted with `wrestool`.
pub struct ExeCreator {
    wrestool: PathBuf,
    timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct IconResource {
    kind: u32,
    name: String,
}

fn resource_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"--type=(\S+) --name=(.*) --language=(\S*) \[(.*)\]").expect("static regex")
    })
}

/// Icon resources from a `wrestool -l` listing: groups first, then single
/// icons, each in listing order.
fn icon_resources(listing: &str) -> Vec<IconResource> {
    let parsed: Vec<IconResource> = listing
        .lines()
        .filter_map(|line| {
            let caps = resource_line().captures(line)?;
            let kind = caps[1].parse().ok()?;
            let name = caps[2].trim_matches('\'').to_string();
            Some(IconResource { kind, name })
        })
        .collect();
    [RT_GROUP_ICON, RT_ICON]
        .iter()
        .flat_map(|&kind| parsed.iter().filter(move |r| r.kind == kind).cloned())
        .collect()
}

impl ExeCreator {
    pub fn locate(wrestool: &str, timeout: Duration) -> Result<Self> {
        Ok(ExeCreator {
            wrestool: locate(wrestool)?,
            timeout,
        })
    }

    fn run(&self, command: &mut Command) -> Result<std::process::Output> {
        let child = command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context("wrestool failed to start")?;
        run_with_timeout(child, self.timeout)
    }

    fn extract(&self, path: &Path, icon: &IconResource) -> Result<RgbaImage> {
        let out = tempfile::Builder::new().suffix(".ico").tempfile()?;
        let output = self.run(
            Command::new(&self.wrestool)
                .args(["-x", "-t", icon.kind.to_string().as_str(), "-n", icon.name.as_str(), "-o"])
                .arg(out.path())
                .arg(path),
        )?;
        if !output.status.success() {
            anyhow::bail!("wrestool error: {}", stderr_tail(&output));
        }
        let img = image::ImageReader::open(out.path())?
            .with_guessed_format()?
            .decode()
            .with_context(|| format!("decode icon {}", icon.name))?;
        Ok(img.into_rgba8())
    }
}

impl ThumbCreator for ExeCreator {
    fn create(&self, path: &Path, _width: u32, _height: u32) -> Result<RgbaImage> {
        let output = self.run(Command::new(&self.wrestool).arg("-l").arg(path))?;
        if !output.status.success() {
            anyhow::bail!("wrestool error: {}", stderr_tail(&output));
        }
        let icons = icon_resources(&String::from_utf8_lossy(&output.stdout));
        for icon in &icons {
            match self.extract(path, icon) {
                Ok(img) => return Ok(img),
                Err(e) => log::debug!("{}: icon {}: {:#}", path.display(), icon.name, e),
            }
        }
        anyhow::bail!("no usable icon in {}", path.display())
    }
}
