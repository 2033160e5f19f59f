use crate::engine::tool::ToolCandidate;
use anyhow::Context;
use std::{net::SocketAddr, path::PathBuf, time::Duration};

pub const ENV_BIND: &str = "YTDL_RELAY_BIND";
pub const ENV_KEEPALIVE_SECS: &str = "YTDL_RELAY_KEEPALIVE_SECS";
pub const ENV_SUBSCRIBER_BUFFER: &str = "YTDL_RELAY_SUBSCRIBER_BUFFER";
pub const ENV_LOG_DIR: &str = "YTDL_RELAY_LOG_DIR";
pub const ENV_TOOL: &str = "YTDL_RELAY_TOOL";

#[derive(Debug, Clone)]
pub struct Settings {
  pub bind_addr: SocketAddr,
  pub keep_alive: Duration,
  pub subscriber_buffer: usize,
  pub log_dir: Option<PathBuf>,
  pub tool_candidates: Vec<ToolCandidate>,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
      keep_alive: Duration::from_secs(15),
      subscriber_buffer: 64,
      log_dir: None,
      tool_candidates: ToolCandidate::defaults(),
    }
  }
}

impl Settings {
  pub fn from_env() -> anyhow::Result<Self> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  /// Builds settings from any key lookup; empty values count as unset.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let mut settings = Self::default();

    if let Some(v) = get(ENV_BIND) {
      settings.bind_addr = v.parse().with_context(|| format!("invalid {ENV_BIND}: {v}"))?;
    }
    if let Some(v) = get(ENV_KEEPALIVE_SECS) {
      let secs: u64 = v
        .parse()
        .with_context(|| format!("invalid {ENV_KEEPALIVE_SECS}: {v}"))?;
      anyhow::ensure!(secs > 0, "{ENV_KEEPALIVE_SECS} must be positive");
      settings.keep_alive = Duration::from_secs(secs);
    }
    if let Some(v) = get(ENV_SUBSCRIBER_BUFFER) {
      let n: usize = v
        .parse()
        .with_context(|| format!("invalid {ENV_SUBSCRIBER_BUFFER}: {v}"))?;
      anyhow::ensure!(n > 0, "{ENV_SUBSCRIBER_BUFFER} must be positive");
      settings.subscriber_buffer = n;
    }
    if let Some(v) = get(ENV_LOG_DIR) {
      settings.log_dir = Some(PathBuf::from(v));
    }
    if let Some(v) = get(ENV_TOOL) {
      settings.tool_candidates.insert(0, ToolCandidate::from_override(&v));
    }

    Ok(settings)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |k: &str| map.get(k).cloned()
  }

  #[test]
  fn defaults_apply_when_nothing_is_set() {
    let s = Settings::from_lookup(lookup(&[])).unwrap();
    assert_eq!(s.bind_addr, SocketAddr::from(([127, 0, 0, 1], 0)));
    assert_eq!(s.keep_alive, Duration::from_secs(15));
    assert_eq!(s.subscriber_buffer, 64);
    assert!(s.log_dir.is_none());
    assert_eq!(s.tool_candidates, ToolCandidate::defaults());
  }

  #[test]
  fn values_are_read_and_tool_override_goes_first() {
    let s = Settings::from_lookup(lookup(&[
      (ENV_BIND, "127.0.0.1:8765"),
      (ENV_KEEPALIVE_SECS, "5"),
      (ENV_SUBSCRIBER_BUFFER, "8"),
      (ENV_LOG_DIR, "/var/log/ytdl"),
      (ENV_TOOL, "/opt/yt-dlp"),
    ]))
    .unwrap();
    assert_eq!(s.bind_addr.port(), 8765);
    assert_eq!(s.keep_alive, Duration::from_secs(5));
    assert_eq!(s.subscriber_buffer, 8);
    assert_eq!(s.log_dir, Some(PathBuf::from("/var/log/ytdl")));
    assert_eq!(s.tool_candidates[0].program, "/opt/yt-dlp");
    assert_eq!(s.tool_candidates.len(), ToolCandidate::defaults().len() + 1);
  }

  #[test]
  fn invalid_values_are_rejected() {
    assert!(Settings::from_lookup(lookup(&[(ENV_BIND, "not-an-addr")])).is_err());
    assert!(Settings::from_lookup(lookup(&[(ENV_KEEPALIVE_SECS, "0")])).is_err());
    assert!(Settings::from_lookup(lookup(&[(ENV_SUBSCRIBER_BUFFER, "lots")])).is_err());
  }

  #[test]
  fn blank_values_count_as_unset() {
    let s = Settings::from_lookup(lookup(&[(ENV_LOG_DIR, "  ")])).unwrap();
    assert!(s.log_dir.is_none());
  }
}
