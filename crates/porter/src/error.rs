use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
  #[error("Warehouse request failed: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("Warehouse rejected the request to {url}: HTTP {status}: {body}")]
  Rejected { status: u16, url: String, body: String },

  #[error("Load job {job_id} failed: {message}")]
  Job { job_id: String, message: String },

  #[error("Warehouse authentication failed: {message}")]
  Auth { message: String },

  #[error("Table {table} already exists")]
  TableExists { table: String },

  #[error("Invalid destination '{destination}': {reason}")]
  InvalidDestination { destination: String, reason: String },

  #[error("Snowflake query failed ({code}): {message}")]
  Statement { code: String, message: String },

  #[error("Could not encode rows: {0}")]
  Encode(#[from] serde_json::Error),
}

impl SinkError {
  pub fn rejected(status: u16, url: impl Into<String>, body: impl Into<String>) -> Self {
    Self::Rejected { status, url: url.into(), body: body.into() }
  }

  pub fn job(job_id: impl Into<String>, message: impl Into<String>) -> Self {
    Self::Job { job_id: job_id.into(), message: message.into() }
  }

  pub fn auth(message: impl Into<String>) -> Self {
    Self::Auth { message: message.into() }
  }

  pub fn table_exists(table: impl Into<String>) -> Self {
    Self::TableExists { table: table.into() }
  }

  pub fn invalid_destination(destination: impl Into<String>, reason: impl Into<String>) -> Self {
    Self::InvalidDestination { destination: destination.into(), reason: reason.into() }
  }

  pub fn statement(code: impl Into<String>, message: impl Into<String>) -> Self {
    Self::Statement { code: code.into(), message: message.into() }
  }

  /// A statement the warehouse ran and refused, as opposed to a failure to
  /// reach it.
  pub fn is_statement_failure(&self) -> bool {
    matches!(self, SinkError::Statement { .. })
  }
}
