use crate::settings::Settings;
use anyhow::Context;
use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// A start request that is rejected before any job state changes.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
  #[error("missing url")]
  MissingUrl,
  #[error("missing destination directory")]
  MissingDirectory,
}

#[derive(Debug, thiserror::Error)]
pub enum StartError {
  #[error(transparent)]
  Invalid(#[from] RequestError),
  #[error("a download is already running")]
  Busy,
}

/// Failures that end a run with a terminal `error` event instead of `done`.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
  #[error("Cannot find yt-dlp. Install via: pip install yt-dlp")]
  DependencyMissing,
  #[error("Failed to start yt-dlp: {0}")]
  Launch(#[source] std::io::Error),
}

impl StartError {
  pub fn status_code(&self) -> StatusCode {
    match self {
      StartError::Invalid(_) => StatusCode::BAD_REQUEST,
      StartError::Busy => StatusCode::CONFLICT,
    }
  }
}

impl IntoResponse for StartError {
  fn into_response(self) -> Response {
    let body = serde_json::json!({ "error": self.to_string() });
    (self.status_code(), Json(body)).into_response()
  }
}

pub fn init_tracing(settings: &Settings) -> anyhow::Result<()> {
  let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,hyper=warn,tower_http=warn"));

  match &settings.log_dir {
    Some(dir) => {
      std::fs::create_dir_all(dir).context("failed to create log dir")?;
      // Rotate daily; one JSON object per line.
      let file_appender = tracing_appender::rolling::daily(dir, "ytdl-relay.jsonl");
      let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
      let _ = LOG_GUARD.set(guard);

      tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(non_blocking)
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
        .context("failed to install tracing subscriber")?;
    }
    None => {
      tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
        .context("failed to install tracing subscriber")?;
    }
  }

  Ok(())
}
