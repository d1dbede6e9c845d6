use clap::{Parser, ValueEnum};
use std::fmt;
use std::path::PathBuf;

use crate::config::{
  ConfigError, RunConfig, DEFAULT_COUNTRY, DEFAULT_KEYWORD, DEFAULT_RUN_TIMEFRAME,
};

/// Where the finished tables go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Sink {
  Bigquery,
  Snowflake,
}

impl fmt::Display for Sink {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Sink::Bigquery => write!(f, "bigquery"),
      Sink::Snowflake => write!(f, "snowflake"),
    }
  }
}

#[derive(Parser, Debug)]
#[command(name = "trendline")]
#[command(about = "Load Google Trends top queries and interest over time into a warehouse")]
#[command(version)]
pub struct Cli {
  /// Keywords to query, comma separated
  #[arg(long, env = "TRENDLINE_KEYWORDS", value_delimiter = ',', default_value = DEFAULT_KEYWORD)]
  pub keywords: Vec<String>,

  /// ISO alpha-2 country codes, comma separated
  #[arg(long, env = "TRENDLINE_COUNTRIES", value_delimiter = ',', default_value = DEFAULT_COUNTRY)]
  pub countries: Vec<String>,

  /// Trends timeframe, e.g. "2021-01-01 2021-09-13" or "today 3-m"
  #[arg(long, env = "TRENDLINE_TIMEFRAME", default_value = DEFAULT_RUN_TIMEFRAME)]
  pub timeframe: String,

  /// Category for the interest-over-time series (0 = all)
  #[arg(long, env = "TRENDLINE_CATEGORY", default_value_t = 0)]
  pub category: u32,

  /// Break top queries down by every top-level category
  #[arg(long, env = "TRENDLINE_INCLUDE_CATEGORIES")]
  pub include_categories: bool,

  /// JSON run document; replaces the query flags above
  #[arg(long = "run-config", env = "TRENDLINE_RUN_CONFIG")]
  pub run_config_path: Option<PathBuf>,

  /// Destination warehouse
  #[arg(long, env = "TRENDLINE_SINK", value_enum, default_value_t = Sink::Bigquery)]
  pub sink: Sink,

  /// Enable debug logging
  #[arg(short, long)]
  pub verbose: bool,
}

impl Cli {
  /// The run described by the run document when given, else by the flags.
  pub fn run_config(&self) -> Result<RunConfig, ConfigError> {
    match &self.run_config_path {
      Some(path) => RunConfig::load_from_file(path),
      None => Ok(RunConfig {
        keywords: self.keywords.clone(),
        countries: self.countries.clone(),
        timeframe: Some(self.timeframe.clone()),
        include_categories: self.include_categories,
        category: self.category,
      }),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;
  use tempfile::NamedTempFile;

  #[test]
  fn test_flags_build_run_config() {
    let cli = Cli::try_parse_from([
      "trendline",
      "--keywords",
      "Disney+,Netflix",
      "--countries",
      "AR,BR",
      "--timeframe",
      "today 3-m",
      "--include-categories",
      "--sink",
      "snowflake",
    ])
    .unwrap();

    assert_eq!(cli.sink, Sink::Snowflake);
    let run = cli.run_config().unwrap();
    assert_eq!(run.keywords, vec!["Disney+", "Netflix"]);
    assert_eq!(run.countries, vec!["AR", "BR"]);
    assert_eq!(run.timeframe.as_deref(), Some("today 3-m"));
    assert!(run.include_categories);
  }

  #[test]
  fn test_run_document_wins() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, r#"{{"keywords": ["HBO Max"], "countries": ["CL"]}}"#).unwrap();

    let cli = Cli::try_parse_from([
      "trendline".to_string(),
      "--run-config".to_string(),
      file.path().display().to_string(),
    ])
    .unwrap();

    let run = cli.run_config().unwrap();
    assert_eq!(run.keywords, vec!["HBO Max"]);
    assert_eq!(run.countries, vec!["CL"]);
    assert_eq!(run.timeframe, None);
  }

  #[test]
  fn test_unknown_sink_is_rejected() {
    assert!(Cli::try_parse_from(["trendline", "--sink", "redshift"]).is_err());
  }
}
