use crate::{
  app_state::AppState,
  error::StartError,
  events::Subscription,
  model::{DownloadRequest, StartResponse, StatusSnapshot},
};
use axum::{
  extract::State,
  http::StatusCode,
  response::{sse::Event, IntoResponse, Response, Sse},
  routing::{get, post},
  Json, Router,
};
use futures_util::{stream, Stream};
use std::{convert::Infallible, time::Duration};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tower_http::cors::CorsLayer;

pub const PING_COMMENT: &str = "ping";

pub fn router(state: AppState) -> Router {
  Router::new()
    .route("/download", post(post_download))
    .route("/progress", get(get_progress))
    .route("/status", get(get_status))
    .layer(CorsLayer::permissive())
    .with_state(state)
}

async fn post_download(State(st): State<AppState>, Json(req): Json<DownloadRequest>) -> Response {
  let job = match req.validate() {
    Ok(job) => job,
    Err(e) => {
      tracing::info!(error = %e, "rejected download request");
      return StartError::from(e).into_response();
    }
  };

  match st.engine.start(job) {
    // The handle is dropped; the job keeps running detached.
    Ok(started) => (StatusCode::ACCEPTED, Json(StartResponse { job_id: started.id })).into_response(),
    Err(e) => {
      tracing::info!(error = %e, "rejected download request");
      e.into_response()
    }
  }
}

async fn get_status(State(st): State<AppState>) -> Json<StatusSnapshot> {
  Json(StatusSnapshot {
    running: st.engine.is_running(),
    subscribers: st.events.subscriber_count(),
  })
}

async fn get_progress(State(st): State<AppState>) -> impl IntoResponse {
  let sub = st.events.subscribe();
  tracing::debug!(subscriber_id = %sub.id(), "progress stream opened");
  Sse::new(event_stream(sub, st.settings.keep_alive))
}

/// Frames for one observer: `data:` frames for events and a comment frame on every
/// keep-alive tick. Ends when the hub drops the subscription. If the client goes away
/// the stream is dropped, and the subscription with it.
pub fn event_stream(sub: Subscription, keep_alive: Duration) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
  let mut ticker = interval_at(Instant::now() + keep_alive, keep_alive);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

  stream::unfold((sub, ticker), |(mut sub, mut ticker): (Subscription, Interval)| async move {
    let id = sub.id();
    let frame = tokio::select! {
      msg = sub.recv() => match msg {
        Some(json) => Event::default().data(&*json),
        None => {
          tracing::debug!(subscriber_id = %id, "progress stream closed by hub");
          return None;
        }
      },
      _ = ticker.tick() => Event::default().comment(PING_COMMENT),
    };
    Some((Ok(frame), (sub, ticker)))
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    engine::ToolCandidate,
    events::{EventHub, JobEvent},
    settings::Settings,
  };
  use futures_util::StreamExt;
  use std::sync::Arc;

  fn state(candidates: Vec<ToolCandidate>) -> AppState {
    let settings = Settings {
      tool_candidates: candidates,
      ..Settings::default()
    };
    AppState::new(Arc::new(settings))
  }

  fn body(url: &str, fmt: &str, dir: &str) -> Json<DownloadRequest> {
    Json(DownloadRequest {
      url: url.to_string(),
      fmt: Some(fmt.to_string()),
      dir: dir.to_string(),
    })
  }

  #[tokio::test]
  async fn empty_fields_are_bad_requests() {
    let st = state(vec![]);
    let resp = post_download(State(st.clone()), body("", "mp4", "/tmp")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let resp = post_download(State(st.clone()), body("https://e.com", "mp4", "")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(!st.engine.is_running());
  }

  #[tokio::test]
  async fn valid_request_is_accepted_and_busy_is_conflict() {
    let st = state(vec![]);
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("out").display().to_string();

    // Hold the slot so the second call is guaranteed to see a running job.
    let first = st
      .engine
      .start(body("https://e.com/a", "mp3", &dir).0.validate().unwrap())
      .unwrap();
    let resp = post_download(State(st.clone()), body("https://e.com/b", "mp3", &dir)).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    first.handle.await.unwrap();

    let resp = post_download(State(st.clone()), body("https://e.com/c", "weird", &dir)).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    // The accepted job runs detached; let it finish before the directory goes away.
    while st.engine.is_running() {
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
  }

  #[tokio::test]
  async fn status_reports_subscribers() {
    let st = state(vec![]);
    let _sub = st.events.subscribe();
    let Json(snap) = get_status(State(st)).await;
    assert!(!snap.running);
    assert_eq!(snap.subscribers, 1);
  }

  #[tokio::test(start_paused = true)]
  async fn stream_forwards_events_and_pings_when_idle() {
    let hub = EventHub::new(8);
    let sub = hub.subscribe();
    let mut frames = Box::pin(event_stream(sub, Duration::from_secs(15)));

    hub.publish(&JobEvent::status("Item 1 of 2"));
    let first = frames.next().await.unwrap().unwrap();
    assert!(format!("{first:?}").contains("Item 1 of 2"));

    // Nothing queued: the paused clock advances to the keep-alive tick.
    let ping = frames.next().await.unwrap().unwrap();
    assert!(format!("{ping:?}").contains(PING_COMMENT));
  }

  #[tokio::test]
  async fn stream_ends_when_unsubscribed_and_drop_deregisters() {
    let hub = EventHub::new(8);
    let sub = hub.subscribe();
    let id = sub.id();
    let mut frames = Box::pin(event_stream(sub, Duration::from_secs(15)));
    hub.unsubscribe(id);
    assert!(frames.next().await.is_none());

    let sub = hub.subscribe();
    let frames = event_stream(sub, Duration::from_secs(15));
    assert_eq!(hub.subscriber_count(), 1);
    drop(frames);
    assert_eq!(hub.subscriber_count(), 0);
  }
}
