use thiserror::Error;

/// A single provider query failed. The orchestration layers skip the
/// offending keyword or country and keep going.
#[derive(Error, Debug)]
pub enum QueryError {
  #[error("Trends request failed: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("Trends rate limit hit (HTTP 429) for {url}")]
  TooManyRequests { url: String },

  #[error("Trends rejected the request to {url}: HTTP {status}")]
  Rejected { status: u16, url: String },

  #[error("Malformed Trends response: {reason}")]
  Malformed { reason: String },

  #[error("Trends response carried no {widget} widget")]
  MissingWidget { widget: String },
}

impl QueryError {
  pub fn too_many_requests(url: impl Into<String>) -> Self {
    Self::TooManyRequests { url: url.into() }
  }

  pub fn rejected(status: u16, url: impl Into<String>) -> Self {
    Self::Rejected { status, url: url.into() }
  }

  pub fn malformed(reason: impl Into<String>) -> Self {
    Self::Malformed { reason: reason.into() }
  }

  pub fn missing_widget(widget: impl Into<String>) -> Self {
    Self::MissingWidget { widget: widget.into() }
  }
}

impl From<serde_json::Error> for QueryError {
  fn from(e: serde_json::Error) -> Self {
    Self::malformed(e.to_string())
  }
}

/// Concatenation or reshaping found nothing to combine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
  #[error("No objects to concatenate ({stage})")]
  NothingToConcatenate { stage: String },
}

impl ShapeError {
  pub fn nothing_to_concatenate(stage: impl Into<String>) -> Self {
    Self::NothingToConcatenate { stage: stage.into() }
  }
}
