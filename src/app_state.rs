use crate::{engine, events, settings::Settings};
use std::sync::Arc;

/// The one service instance shared by every request handler.
#[derive(Clone)]
pub struct AppState {
  pub settings: Arc<Settings>,
  pub engine: engine::DownloadEngine,
  pub events: events::EventHub,
}

impl AppState {
  pub fn new(settings: Arc<Settings>) -> Self {
    let events = events::EventHub::new(settings.subscriber_buffer);
    let engine = engine::DownloadEngine::new(events.clone(), settings.tool_candidates.clone());
    Self {
      settings,
      engine,
      events,
    }
  }
}
