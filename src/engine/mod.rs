pub mod job;
pub mod parser;
pub mod tool;

use crate::{error::StartError, events::EventHub, model::JobRequest};
use std::sync::Arc;
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::Instrument;
use uuid::Uuid;

pub use job::JobOutcome;
pub use tool::ToolCandidate;

/// Runs at most one download at a time. Cheap to clone; clones share the same slot.
#[derive(Clone)]
pub struct DownloadEngine {
  inner: Arc<EngineInner>,
}

struct EngineInner {
  events: EventHub,
  candidates: Vec<ToolCandidate>,
  // Held by the running job's task for its whole lifetime.
  slot: Arc<Mutex<()>>,
}

pub struct StartedJob {
  pub id: Uuid,
  pub handle: JoinHandle<JobOutcome>,
}

impl DownloadEngine {
  pub fn new(events: EventHub, candidates: Vec<ToolCandidate>) -> Self {
    Self {
      inner: Arc::new(EngineInner {
        events,
        candidates,
        slot: Arc::new(Mutex::new(())),
      }),
    }
  }

  pub fn is_running(&self) -> bool {
    self.inner.slot.try_lock().is_err()
  }

  /// Accepts the job and runs it in the background, or rejects it right away if another
  /// job holds the slot. Never queues.
  pub fn start(&self, req: JobRequest) -> Result<StartedJob, StartError> {
    let guard = self
      .inner
      .slot
      .clone()
      .try_lock_owned()
      .map_err(|_| StartError::Busy)?;

    let id = Uuid::new_v4();
    let span = tracing::info_span!("job", job_id = %id, url = %req.url, format = ?req.format);
    let inner = self.inner.clone();

    let handle = tokio::spawn(
      async move {
        // Released when this future completes or unwinds.
        let _slot = guard;
        tracing::info!(dest_dir = %req.dest_dir.display(), "download started");
        job::run_job(&inner.events, &inner.candidates, &req).await
      }
      .instrument(span),
    );

    Ok(StartedJob { id, handle })
  }
}
