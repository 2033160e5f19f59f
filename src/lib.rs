pub mod app_state;
pub mod engine;
pub mod error;
pub mod events;
pub mod local_api;
pub mod model;
pub mod settings;

use anyhow::Context;
use app_state::AppState;
use settings::Settings;
use std::sync::Arc;

/// Builds the service and serves the local API until the listener fails.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
  let settings = Arc::new(settings);
  let state = AppState::new(settings.clone());
  let app = local_api::router(state);

  let listener = tokio::net::TcpListener::bind(settings.bind_addr)
    .await
    .with_context(|| format!("failed to bind {}", settings.bind_addr))?;
  let addr = listener.local_addr().context("failed to read bound address")?;

  tracing::info!(%addr, keep_alive_secs = settings.keep_alive.as_secs(), "starting local api");
  println!("ytdl-relay running at http://{addr}");

  axum::serve(listener, app).await.context("local api server stopped")?;
  Ok(())
}
