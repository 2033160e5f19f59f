use crate::{
  engine::{parser::ProgressParser, tool},
  error::JobError,
  events::{EventHub, JobEvent},
  model::JobRequest,
};
use std::{
  io::{self, BufRead, BufReader, PipeReader},
  process::ExitStatus,
};
use tokio::sync::mpsc;

/// How a run ended. Either way exactly one terminal event was published.
#[derive(Debug)]
pub enum JobOutcome {
  /// The tool ran to completion; `done` was published. `exit` is `None` if waiting failed.
  Completed { exit: Option<ExitStatus> },
  /// The tool never ran; `error` was published.
  Failed(JobError),
}

impl JobOutcome {
  pub fn is_completed(&self) -> bool {
    matches!(self, JobOutcome::Completed { .. })
  }
}

pub async fn run_job(events: &EventHub, candidates: &[tool::ToolCandidate], req: &JobRequest) -> JobOutcome {
  let label = req.format.label();
  let dir = req.dest_dir.display().to_string();

  if let Err(e) = tokio::fs::create_dir_all(&req.dest_dir).await {
    tracing::warn!(dir = %dir, error = %e, "could not create destination dir");
    events.publish(&JobEvent::log(format!("Could not create {dir}: {e}")));
  }

  let Some(candidate) = tool::resolve(candidates).await else {
    return fail(events, JobError::DependencyMissing);
  };

  events.publish(&JobEvent::status(format!("Starting {label} download…")));
  events.publish(&JobEvent::log(format!("▶  yt-dlp [{label}]  →  {dir}")));

  let (reader, writer) = match io::pipe() {
    Ok(pair) => pair,
    Err(e) => return fail(events, JobError::Launch(e)),
  };
  let spawned = candidate.command(req, &writer).and_then(|mut cmd| cmd.spawn());
  // Every write end now belongs to the child; the reader sees EOF once it exits.
  drop(writer);
  let mut child = match spawned {
    Ok(c) => c,
    Err(e) => return fail(events, JobError::Launch(e)),
  };

  // Drain everything before waiting so the child can never block on a full pipe.
  let mut lines = spawn_line_reader(reader);
  let mut parser = ProgressParser::new();
  while let Some(line) = lines.recv().await {
    for evt in parser.feed(&line) {
      events.publish(&evt);
    }
  }

  let exit = match child.wait().await {
    Ok(status) => status,
    Err(e) => {
      tracing::warn!(error = %e, "failed waiting for downloader");
      events.publish(&JobEvent::log(format!("yt-dlp exited: {e}")));
      return finish(events, &dir, None);
    }
  };

  if !exit.success() {
    tracing::warn!(status = %exit, "downloader exited with failure");
    events.publish(&JobEvent::log(format!("yt-dlp exited: {exit}")));
  }

  tracing::info!(
    status = %exit,
    items_done = parser.items_done(),
    items_total = parser.items_total(),
    "download finished"
  );
  finish(events, &dir, Some(exit))
}

/// Reads the merged output on a blocking thread, one line per message. The channel
/// closes once the child and all its descendants have closed the pipe.
fn spawn_line_reader(reader: PipeReader) -> mpsc::Receiver<String> {
  let (tx, rx) = mpsc::channel(256);
  tokio::task::spawn_blocking(move || {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
      buf.clear();
      match reader.read_until(b'\n', &mut buf) {
        Ok(0) => break,
        Ok(_) => {
          if tx.blocking_send(decode_line(&buf)).is_err() {
            break;
          }
        }
        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
        Err(e) => {
          tracing::warn!(error = %e, "failed reading downloader output");
          break;
        }
      }
    }
  });
  rx
}

/// Strips the line terminator and replaces invalid UTF-8 instead of dropping the line.
fn decode_line(raw: &[u8]) -> String {
  let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
  let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
  String::from_utf8_lossy(raw).into_owned()
}

fn fail(events: &EventHub, err: JobError) -> JobOutcome {
  tracing::error!(error = %err, "download could not start");
  events.publish(&JobEvent::error(err.to_string()));
  JobOutcome::Failed(err)
}

fn finish(events: &EventHub, dir: &str, exit: Option<ExitStatus>) -> JobOutcome {
  events.publish(&JobEvent::done(format!("Done! Files saved to: {dir}")));
  JobOutcome::Completed { exit }
}
