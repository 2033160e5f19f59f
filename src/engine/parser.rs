//! Turns yt-dlp's line output into [`JobEvent`]s.
//!
//! Classification is an ordered rule table; the first rule that matches a line decides
//! its event. Finished-item counting runs after classification for every line that is
//! not a percentage line.

use crate::events::JobEvent;
use regex::Regex;
use std::sync::LazyLock;

static ITEM_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^\[download\] Downloading item (\d+) of (\d+)").expect("valid regex"));
static PERCENT_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^\s*([0-9]+(?:\.[0-9]+)?)%").expect("valid regex"));

const MILESTONE_PREFIXES: &[&str] = &[
  "[download] Destination:",
  "[ExtractAudio]",
  "[Merger]",
  "[ffmpeg]",
  "ERROR",
  "WARNING",
];

const ALREADY_DOWNLOADED: &str = "has already been downloaded";
const DESTINATION_WRITTEN: &str = "[download] Destination:";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineMatch {
  /// `[download] Downloading item X of Y`
  ItemIndex { index: u32, total: u32 },
  /// A `[download]` line with a `%`. `None` when the number could not be read.
  Percent(Option<f64>),
  Milestone,
}

type Rule = fn(&str) -> Option<LineMatch>;

/// Ordered; first match wins.
pub const RULES: &[(&str, Rule)] = &[
  ("item-index", match_item_index),
  ("percent", match_percent),
  ("milestone", match_milestone),
];

pub fn match_item_index(line: &str) -> Option<LineMatch> {
  let caps = ITEM_RE.captures(line)?;
  let index = caps[1].parse().ok()?;
  let total = caps[2].parse().ok()?;
  Some(LineMatch::ItemIndex { index, total })
}

pub fn match_percent(line: &str) -> Option<LineMatch> {
  let idx = line.find("[download]")?;
  if !line.contains('%') {
    return None;
  }
  let rest = &line[idx + "[download]".len()..];
  let pct = PERCENT_RE
    .captures(rest)
    .and_then(|c| c[1].parse::<f64>().ok())
    .filter(|p| (0.0..=100.0).contains(p));
  Some(LineMatch::Percent(pct))
}

pub fn match_milestone(line: &str) -> Option<LineMatch> {
  MILESTONE_PREFIXES
    .iter()
    .any(|p| line.starts_with(p))
    .then_some(LineMatch::Milestone)
}

pub fn classify(line: &str) -> Option<LineMatch> {
  RULES.iter().find_map(|(_, rule)| rule(line))
}

pub fn is_item_finished(line: &str) -> bool {
  line.contains(ALREADY_DOWNLOADED) || line.starts_with(DESTINATION_WRITTEN)
}

/// Per-run counters. A fresh parser is created for every run.
#[derive(Debug, Default, Clone)]
pub struct ProgressParser {
  items_total: u32,
  items_done: u32,
}

impl ProgressParser {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn items_total(&self) -> u32 {
    self.items_total
  }

  pub fn items_done(&self) -> u32 {
    self.items_done
  }

  /// Events for one output line, in emission order.
  pub fn feed(&mut self, line: &str) -> Vec<JobEvent> {
    let mut out = Vec::new();

    match classify(line) {
      Some(LineMatch::ItemIndex { index, total }) => {
        self.items_total = total;
        out.push(JobEvent::status(format!("Item {index} of {total}")));
      }
      Some(LineMatch::Percent(pct)) => {
        if let Some(p) = pct {
          if let Some(overall) = self.overall_with_partial(p) {
            out.push(JobEvent::progress(overall));
          }
        }
        out.push(JobEvent::status(line.trim()));
        // Too frequent for the log pane, and never a finished marker.
        return out;
      }
      Some(LineMatch::Milestone) => out.push(JobEvent::log(line)),
      None => {}
    }

    if is_item_finished(line) {
      self.items_done += 1;
      if let Some(overall) = self.overall_with_partial(0.0) {
        out.push(JobEvent::progress(overall));
      }
    }

    out
  }

  /// `floor(done/total*100 + p/total)`; `None` while the total is unknown.
  fn overall_with_partial(&self, item_pct: f64) -> Option<u8> {
    if self.items_total == 0 {
      return None;
    }
    let total = f64::from(self.items_total);
    let overall = f64::from(self.items_done) / total * 100.0 + item_pct / total;
    Some(overall.floor().clamp(0.0, 100.0) as u8)
  }
}
