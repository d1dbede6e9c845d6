//! Configuration for a trendline run
//!
//! [`Settings`] holds the warehouse side and is read from the environment
//! once at startup. [`RunConfig`] names what to query and can come from a
//! JSON document or from the command line.

use porter::{IfExists, SnowflakeConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_PROJECT_ID: &str = "my_project";
pub const TOP_SEARCH_TABLE: &str = "google_trends_top_search";
pub const INTEREST_OVER_TIME_TABLE: &str = "google_trends_interest_over_time";

pub const DEFAULT_KEYWORD: &str = "Disney+";
pub const DEFAULT_COUNTRY: &str = "AR";
pub const DEFAULT_RUN_TIMEFRAME: &str = "2021-01-01 2021-09-13";

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("Could not read run configuration {path}: {source}")]
  Read { path: PathBuf, source: std::io::Error },

  #[error("Invalid run configuration: {0}")]
  Parse(#[from] serde_json::Error),

  #[error("Run configuration has no '{field}' list")]
  MissingField { field: String },
}

/// A BigQuery destination and what to do when it already exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
  /// `project.dataset.table`
  pub table_name: String,
  pub if_exists: IfExists,
}

#[derive(Debug, Clone)]
pub struct Settings {
  pub project_id: String,
  /// `project.dataset`
  pub dataset_id: String,
  pub top_search: Destination,
  pub interest_over_time: Destination,
  pub bigquery_token: Option<String>,
  pub snowflake: SnowflakeConfig,
  pub snowflake_top_search_table: String,
  pub snowflake_interest_table: String,
}

impl Settings {
  pub fn from_env() -> Self {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  /// Build settings from any key lookup; unset keys take their defaults.
  pub fn from_lookup<F>(lookup: F) -> Self
  where
    F: Fn(&str) -> Option<String>,
  {
    let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

    let project_id = var("PROJECT_ID", DEFAULT_PROJECT_ID);
    let dataset_id = format!("{project_id}.my_dataset");

    Self {
      top_search: Destination {
        table_name: format!("{dataset_id}.{TOP_SEARCH_TABLE}"),
        if_exists: IfExists::Replace,
      },
      interest_over_time: Destination {
        table_name: format!("{dataset_id}.{INTEREST_OVER_TIME_TABLE}"),
        if_exists: IfExists::Append,
      },
      bigquery_token: lookup("GOOGLE_OAUTH_ACCESS_TOKEN").filter(|t| !t.is_empty()),
      snowflake: SnowflakeConfig {
        user: var("SNOWFLAKE_USER", "sample-user"),
        password: var("SNOWFLAKE_PASSWORD", "sample"),
        account: var("SNOWFLAKE_ACCOUNT", "sample-account"),
        warehouse: var("SNOWFLAKE_WAREHOUSE", "sample-wh"),
        database: var("SNOWFLAKE_DATABASE", "sample-db"),
        schema: var("SNOWFLAKE_SCHEMA", "sample-schema"),
      },
      snowflake_top_search_table: var("SNOWFLAKE_TOP_SEARCH_TABLE", TOP_SEARCH_TABLE),
      snowflake_interest_table: var("SNOWFLAKE_INTEREST_TABLE", INTEREST_OVER_TIME_TABLE),
      project_id,
      dataset_id,
    }
  }
}

/// What a run queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
  pub keywords: Vec<String>,
  pub countries: Vec<String>,
  /// Top-search falls back to the last month when unset
  #[serde(default)]
  pub timeframe: Option<String>,
  #[serde(default)]
  pub include_categories: bool,
  /// Category for the interest series
  #[serde(default)]
  pub category: u32,
}

impl Default for RunConfig {
  fn default() -> Self {
    Self {
      keywords: vec![DEFAULT_KEYWORD.to_string()],
      countries: vec![DEFAULT_COUNTRY.to_string()],
      timeframe: Some(DEFAULT_RUN_TIMEFRAME.to_string()),
      include_categories: false,
      category: 0,
    }
  }
}

impl RunConfig {
  pub fn from_json(source: &str) -> Result<Self, ConfigError> {
    Ok(serde_json::from_str(source)?)
  }

  pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
      .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
    Self::from_json(&content)
  }
}

/// The `keywords` list of a JSON run document.
pub fn keywords_from_json(source: &str) -> Result<Vec<String>, ConfigError> {
  string_list(source, "keywords")
}

/// The `countries` list of a JSON run document.
pub fn countries_from_json(source: &str) -> Result<Vec<String>, ConfigError> {
  string_list(source, "countries")
}

fn string_list(source: &str, field: &str) -> Result<Vec<String>, ConfigError> {
  let mut document: Value = serde_json::from_str(source)?;
  let list = document
    .get_mut(field)
    .map(Value::take)
    .ok_or_else(|| ConfigError::MissingField { field: field.to_string() })?;
  Ok(serde_json::from_value(list)?)
}
