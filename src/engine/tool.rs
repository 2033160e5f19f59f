//! Locating the external downloader and building its argument list.

use crate::model::{JobRequest, OutputFormat};
use std::{
  ffi::OsString,
  io::{self, PipeWriter},
  process::Stdio,
};
use tokio::process::Command;

/// Output path template, relative to the destination directory.
pub const OUTPUT_TEMPLATE: &str = "%(playlist_index)s - %(title)s.%(ext)s";

/// One way of launching yt-dlp, plus how to check that it works.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCandidate {
  pub program: String,
  /// Inserted before the download arguments (e.g. `-m yt_dlp`).
  pub launch_prefix: Vec<String>,
  pub probe_args: Vec<String>,
  /// Probe passes only if it printed nothing (python prints on import side effects).
  pub probe_requires_silence: bool,
}

impl ToolCandidate {
  pub fn binary(program: &str) -> Self {
    Self {
      program: program.to_string(),
      launch_prefix: Vec::new(),
      probe_args: vec!["--version".to_string()],
      probe_requires_silence: false,
    }
  }

  pub fn python_module(python: &str) -> Self {
    Self {
      program: python.to_string(),
      launch_prefix: vec!["-m".to_string(), "yt_dlp".to_string()],
      probe_args: vec!["-c".to_string(), "import yt_dlp".to_string()],
      probe_requires_silence: true,
    }
  }

  /// A user supplied path: treated as a python interpreter if it looks like one.
  pub fn from_override(program: &str) -> Self {
    let name = std::path::Path::new(program)
      .file_name()
      .and_then(|s| s.to_str())
      .unwrap_or(program);
    if name.starts_with("python") {
      Self::python_module(program)
    } else {
      Self::binary(program)
    }
  }

  pub fn defaults() -> Vec<Self> {
    vec![
      Self::binary("yt-dlp"),
      Self::python_module("/usr/local/bin/python3"),
      Self::python_module("/usr/bin/python3"),
      Self::python_module("python3"),
      Self::python_module("python"),
    ]
  }

  async fn probe(&self) -> bool {
    let out = Command::new(&self.program)
      .args(&self.probe_args)
      .stdin(Stdio::null())
      .output()
      .await;
    match out {
      Ok(out) if out.status.success() => {
        !self.probe_requires_silence || (out.stdout.is_empty() && out.stderr.is_empty())
      }
      Ok(out) => {
        tracing::debug!(program = %self.program, status = %out.status, "tool probe failed");
        false
      }
      Err(e) => {
        tracing::debug!(program = %self.program, error = %e, "tool probe could not run");
        false
      }
    }
  }

  /// Full command for one run. stdout and stderr both write into `output`, so the two
  /// streams reach the reader in the order the child wrote them. stdin is closed.
  pub fn command(&self, req: &JobRequest, output: &PipeWriter) -> io::Result<Command> {
    let mut cmd = Command::new(&self.program);
    cmd
      .args(&self.launch_prefix)
      .args(download_args(req))
      .stdin(Stdio::null())
      .stdout(output.try_clone()?)
      .stderr(output.try_clone()?)
      .kill_on_drop(true);
    Ok(cmd)
  }
}

/// First candidate whose probe succeeds, in order.
pub async fn resolve(candidates: &[ToolCandidate]) -> Option<&ToolCandidate> {
  for c in candidates {
    if c.probe().await {
      tracing::info!(program = %c.program, "using downloader");
      return Some(c);
    }
  }
  None
}

pub fn download_args(req: &JobRequest) -> Vec<OsString> {
  let mut args: Vec<OsString> = match req.format {
    OutputFormat::Audio => ["-f", "bestaudio/best", "-x", "--audio-format", "mp3", "--audio-quality", "192K"]
      .into_iter()
      .map(OsString::from)
      .collect(),
    OutputFormat::Video => [
      "-f",
      "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best",
      "--merge-output-format",
      "mp4",
    ]
    .into_iter()
    .map(OsString::from)
    .collect(),
  };
  args.push("--newline".into());
  args.push("-o".into());
  args.push(req.dest_dir.join(OUTPUT_TEMPLATE).into_os_string());
  args.push("--ignore-errors".into());
  args.push(req.url.clone().into());
  args
}
