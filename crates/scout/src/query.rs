use serde::{Deserialize, Serialize};
use std::fmt;

/// The two query shapes the pipeline issues against the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryKind {
  RelatedQueries,
  InterestOverTime,
}

impl fmt::Display for QueryKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      QueryKind::RelatedQueries => write!(f, "RELATED_QUERIES"),
      QueryKind::InterestOverTime => write!(f, "INTEREST_OVER_TIME"),
    }
  }
}

/// One (keyword, country, category, kind) combination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
  pub keyword: String,
  pub country: String,
  pub timeframe: String,
  pub category: u32,
  pub kind: QueryKind,
}

impl QuerySpec {
  pub fn new(
    keyword: impl Into<String>,
    country: impl Into<String>,
    timeframe: impl Into<String>,
    category: u32,
    kind: QueryKind,
  ) -> Self {
    Self {
      keyword: keyword.into(),
      country: country.into(),
      timeframe: timeframe.into(),
      category,
      kind,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_kind_display_matches_wire_names() {
    assert_eq!(QueryKind::RelatedQueries.to_string(), "RELATED_QUERIES");
    assert_eq!(QueryKind::InterestOverTime.to_string(), "INTEREST_OVER_TIME");
  }

  #[test]
  fn test_kind_serde() {
    let json = serde_json::to_string(&QueryKind::InterestOverTime).unwrap();
    assert_eq!(json, "\"INTEREST_OVER_TIME\"");
    let kind: QueryKind = serde_json::from_str("\"RELATED_QUERIES\"").unwrap();
    assert_eq!(kind, QueryKind::RelatedQueries);
  }
}
