use parking_lot::Mutex;
use std::{
  collections::HashMap,
  sync::{Arc, Weak},
};
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

/// One unit of job progress pushed to observers. Serialized with a `type` tag;
/// `Progress` goes over the wire as `bar` to match what the page expects.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JobEvent {
  Log { msg: String },
  Status { msg: String },
  #[serde(rename = "bar")]
  Progress { pct: u8 },
  Done { msg: String },
  Error { msg: String },
}

impl JobEvent {
  pub fn log(msg: impl Into<String>) -> Self {
    Self::Log { msg: msg.into() }
  }

  pub fn status(msg: impl Into<String>) -> Self {
    Self::Status { msg: msg.into() }
  }

  pub fn progress(pct: u8) -> Self {
    Self::Progress { pct: pct.min(100) }
  }

  pub fn done(msg: impl Into<String>) -> Self {
    Self::Done { msg: msg.into() }
  }

  pub fn error(msg: impl Into<String>) -> Self {
    Self::Error { msg: msg.into() }
  }

  pub fn to_json(&self) -> String {
    serde_json::to_string(self).unwrap_or_else(|_| "{\"type\":\"error\",\"msg\":\"unserializable event\"}".to_string())
  }
}

pub type SubscriberId = Uuid;

/// In-memory fan-out hub. Every subscriber owns a bounded queue; `publish` never waits on
/// a slow observer and drops the event for that observer when its queue is full.
#[derive(Clone)]
pub struct EventHub {
  inner: Arc<HubInner>,
}

struct HubInner {
  capacity: usize,
  subscribers: Mutex<HashMap<SubscriberId, mpsc::Sender<Arc<str>>>>,
}

impl EventHub {
  pub fn new(capacity: usize) -> Self {
    Self {
      inner: Arc::new(HubInner {
        capacity: capacity.max(1),
        subscribers: Mutex::new(HashMap::new()),
      }),
    }
  }

  pub fn subscribe(&self) -> Subscription {
    let (tx, rx) = mpsc::channel(self.inner.capacity);
    let id = Uuid::new_v4();
    self.inner.subscribers.lock().insert(id, tx);
    tracing::debug!(subscriber_id = %id, "subscriber registered");
    Subscription {
      id,
      rx,
      hub: Arc::downgrade(&self.inner),
    }
  }

  /// Removing an unknown id is a no-op.
  pub fn unsubscribe(&self, id: SubscriberId) {
    self.inner.remove(id);
  }

  pub fn publish(&self, event: &JobEvent) {
    let payload: Arc<str> = Arc::from(event.to_json());
    let subs = self.inner.subscribers.lock();
    for (id, tx) in subs.iter() {
      match tx.try_send(payload.clone()) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
          tracing::trace!(subscriber_id = %id, "subscriber queue full; event dropped");
        }
        // Receiver already gone; its Subscription drop will clean up the entry.
        Err(TrySendError::Closed(_)) => {}
      }
    }
  }

  pub fn subscriber_count(&self) -> usize {
    self.inner.subscribers.lock().len()
  }
}

impl HubInner {
  fn remove(&self, id: SubscriberId) {
    if self.subscribers.lock().remove(&id).is_some() {
      tracing::debug!(subscriber_id = %id, "subscriber removed");
    }
  }
}

/// Live registration of one observer. Deregisters itself on drop.
pub struct Subscription {
  id: SubscriberId,
  rx: mpsc::Receiver<Arc<str>>,
  hub: Weak<HubInner>,
}

impl Subscription {
  pub fn id(&self) -> SubscriberId {
    self.id
  }

  /// Next serialized event, or `None` once the hub dropped this subscriber.
  pub async fn recv(&mut self) -> Option<Arc<str>> {
    self.rx.recv().await
  }

  pub fn try_recv(&mut self) -> Option<Arc<str>> {
    self.rx.try_recv().ok()
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    if let Some(hub) = self.hub.upgrade() {
      hub.remove(self.id);
    }
  }
}
