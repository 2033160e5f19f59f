use crate::error::RequestError;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
  Video,
  Audio,
}

impl OutputFormat {
  /// `mp3`/`audio` select audio-only; anything else falls back to video.
  pub fn parse_lenient(raw: Option<&str>) -> Self {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
      Some("mp3") | Some("audio") => OutputFormat::Audio,
      _ => OutputFormat::Video,
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      OutputFormat::Video => "MP4",
      OutputFormat::Audio => "MP3",
    }
  }
}

/// Body of `POST /download` as sent by the page.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct DownloadRequest {
  #[serde(default)]
  pub url: String,
  #[serde(default, alias = "format")]
  pub fmt: Option<String>,
  #[serde(default, alias = "directory")]
  pub dir: String,
}

/// A validated job request. Only constructed through [`DownloadRequest::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
  pub url: String,
  pub format: OutputFormat,
  pub dest_dir: PathBuf,
}

impl DownloadRequest {
  pub fn validate(self) -> Result<JobRequest, RequestError> {
    let url = self.url.trim();
    if url.is_empty() {
      return Err(RequestError::MissingUrl);
    }
    let dir = self.dir.trim();
    if dir.is_empty() {
      return Err(RequestError::MissingDirectory);
    }
    Ok(JobRequest {
      url: url.to_string(),
      format: OutputFormat::parse_lenient(self.fmt.as_deref()),
      dest_dir: PathBuf::from(dir),
    })
  }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StartResponse {
  pub job_id: uuid::Uuid,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StatusSnapshot {
  pub running: bool,
  pub subscribers: usize,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn req(url: &str, fmt: Option<&str>, dir: &str) -> DownloadRequest {
    DownloadRequest {
      url: url.to_string(),
      fmt: fmt.map(str::to_string),
      dir: dir.to_string(),
    }
  }

  #[test]
  fn unknown_or_missing_format_defaults_to_video() {
    assert_eq!(OutputFormat::parse_lenient(None), OutputFormat::Video);
    assert_eq!(OutputFormat::parse_lenient(Some("flac")), OutputFormat::Video);
    assert_eq!(OutputFormat::parse_lenient(Some("mp4")), OutputFormat::Video);
    assert_eq!(OutputFormat::parse_lenient(Some("MP3")), OutputFormat::Audio);
    assert_eq!(OutputFormat::parse_lenient(Some("audio")), OutputFormat::Audio);
  }

  #[test]
  fn empty_url_or_dir_is_rejected() {
    assert!(matches!(req("", None, "/tmp").validate(), Err(RequestError::MissingUrl)));
    assert!(matches!(req("  ", None, "/tmp").validate(), Err(RequestError::MissingUrl)));
    assert!(matches!(
      req("https://example.com/v", None, "").validate(),
      Err(RequestError::MissingDirectory)
    ));
  }

  #[test]
  fn valid_request_is_trimmed() {
    let job = req(" https://example.com/list ", Some("mp3"), " /music ").validate().unwrap();
    assert_eq!(job.url, "https://example.com/list");
    assert_eq!(job.format, OutputFormat::Audio);
    assert_eq!(job.dest_dir, PathBuf::from("/music"));
  }

  #[test]
  fn descriptive_field_names_are_accepted() {
    let r: DownloadRequest =
      serde_json::from_str(r#"{"url":"u","format":"audio","directory":"/d"}"#).unwrap();
    let job = r.validate().unwrap();
    assert_eq!(job.format, OutputFormat::Audio);
    assert_eq!(job.dest_dir, PathBuf::from("/d"));

    let r: DownloadRequest = serde_json::from_str(r#"{"url":"u","fmt":"mp4","dir":"/d"}"#).unwrap();
    assert_eq!(r.validate().unwrap().format, OutputFormat::Video);
  }
}
