//! External helper programs (ffmpeg, wrestool, ddjvu): lookup and bounded runs.

use anyhow::Result;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output};
use std::time::Duration;
#[cfg(unix)]
use wait_timeout::ChildExt;

/// Resolve a helper: a path must point at a file, a bare name must be on PATH.
pub fn locate(program: &str) -> Result<PathBuf> {
    let path = PathBuf::from(program);
    let found = if path.components().count() > 1 {
        path.is_file()
    } else {
        on_path(&path)
    };
    if !found {
        anyhow::bail!("{} not found", path.display());
    }
    Ok(path)
}

fn on_path(name: &Path) -> bool {
    Command::new("which")
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Run a child to completion, killing it once `timeout` passes.
pub fn run_with_timeout(mut child: Child, timeout: Duration) -> Result<Output> {
    // Drain pipes on threads so a chatty child cannot fill them and stall.
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let out_reader = std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut s) = stdout {
            s.read_to_end(&mut buf).ok();
        }
        buf
    });
    let err_reader = std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut s) = stderr {
            s.read_to_end(&mut buf).ok();
        }
        buf
    });

    #[cfg(not(unix))]
    let wait_result: std::io::Result<Option<std::process::ExitStatus>> = {
        let _ = timeout;
        child.wait().map(Some)
    };
    #[cfg(unix)]
    let wait_result = child.wait_timeout(timeout);

    match wait_result {
        Ok(Some(status)) => Ok(Output {
            status,
            stdout: out_reader.join().unwrap_or_default(),
            stderr: err_reader.join().unwrap_or_default(),
        }),
        Ok(None) => {
            child.kill().ok();
            child.wait().ok();
            anyhow::bail!("timed out after {}s", timeout.as_secs());
        }
        Err(e) => anyhow::bail!("wait failed: {}", e),
    }
}

/// Last line of a failed helper's stderr, for error messages.
pub fn stderr_tail(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr)
        .lines()
        .last()
        .unwrap_or("unknown")
        .to_string()
}
