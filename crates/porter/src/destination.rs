use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SinkError;

/// What to do when the destination table already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IfExists {
  Replace,
  Append,
  Fail,
}

impl IfExists {
  /// BigQuery load-job write disposition.
  pub fn write_disposition(&self) -> &'static str {
    match self {
      IfExists::Replace => "WRITE_TRUNCATE",
      IfExists::Append => "WRITE_APPEND",
      IfExists::Fail => "WRITE_EMPTY",
    }
  }
}

impl fmt::Display for IfExists {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      IfExists::Replace => write!(f, "replace"),
      IfExists::Append => write!(f, "append"),
      IfExists::Fail => write!(f, "fail"),
    }
  }
}

impl FromStr for IfExists {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "replace" => Ok(IfExists::Replace),
      "append" => Ok(IfExists::Append),
      "fail" => Ok(IfExists::Fail),
      other => Err(format!("Unsupported if_exists behaviour: {other}. Use replace, append or fail")),
    }
  }
}

/// Fully qualified BigQuery table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
  pub project: String,
  pub dataset: String,
  pub table: String,
}

impl TableRef {
  /// Parse `dataset.table` (in `default_project`) or `project.dataset.table`.
  pub fn parse(default_project: &str, destination: &str) -> Result<Self, SinkError> {
    let parts: Vec<&str> = destination.split('.').collect();
    if parts.iter().any(|p| p.trim().is_empty()) {
      return Err(SinkError::invalid_destination(destination, "empty name segment"));
    }

    match parts.as_slice() {
      [dataset, table] => Ok(Self {
        project: default_project.to_string(),
        dataset: dataset.to_string(),
        table: table.to_string(),
      }),
      [project, dataset, table] => Ok(Self {
        project: project.to_string(),
        dataset: dataset.to_string(),
        table: table.to_string(),
      }),
      _ => Err(SinkError::invalid_destination(
        destination,
        "expected dataset.table or project.dataset.table",
      )),
    }
  }
}

impl fmt::Display for TableRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_if_exists_parsing() {
    assert_eq!("replace".parse::<IfExists>().unwrap(), IfExists::Replace);
    assert_eq!(" Append ".parse::<IfExists>().unwrap(), IfExists::Append);
    assert_eq!("fail".parse::<IfExists>().unwrap(), IfExists::Fail);
    assert!("upsert".parse::<IfExists>().is_err());
  }

  #[test]
  fn test_write_dispositions() {
    assert_eq!(IfExists::Replace.write_disposition(), "WRITE_TRUNCATE");
    assert_eq!(IfExists::Append.write_disposition(), "WRITE_APPEND");
    assert_eq!(IfExists::Fail.write_disposition(), "WRITE_EMPTY");
  }

  #[test]
  fn test_table_ref_forms() {
    let short = TableRef::parse("my_project", "my_dataset.google_trends_top_search").unwrap();
    assert_eq!(short.to_string(), "my_project.my_dataset.google_trends_top_search");

    let full =
      TableRef::parse("my_project", "other_project.my_dataset.google_trends_top_search").unwrap();
    assert_eq!(full.project, "other_project");
    assert_eq!(full.dataset, "my_dataset");
    assert_eq!(full.table, "google_trends_top_search");
  }

  #[test]
  fn test_table_ref_rejects_bad_shapes() {
    assert!(TableRef::parse("p", "just_a_table").is_err());
    assert!(TableRef::parse("p", "a.b.c.d").is_err());
    assert!(TableRef::parse("p", "dataset.").is_err());
  }
}
