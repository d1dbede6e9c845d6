use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::QueryError;

pub mod google;

pub use google::{GoogleTrends, GoogleTrendsOptions};

/// Payload for one provider round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendsRequest {
  pub keywords: Vec<String>,
  pub timeframe: String,
  pub geo: String,
  pub category: u32,
  /// Search property (`""` for web search, `"youtube"`, `"news"`, ...)
  pub property: String,
}

impl TrendsRequest {
  pub fn single(
    keyword: impl Into<String>,
    geo: impl Into<String>,
    timeframe: impl Into<String>,
    category: u32,
  ) -> Self {
    Self {
      keywords: vec![keyword.into()],
      timeframe: timeframe.into(),
      geo: geo.into(),
      category,
      property: String::new(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedQuery {
  pub query: String,
  pub value: u32,
}

/// Related queries for one keyword. `None` means the provider had no list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RelatedQueries {
  pub keyword: String,
  pub top: Option<Vec<RankedQuery>>,
  pub rising: Option<Vec<RankedQuery>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelinePoint {
  pub timestamp: DateTime<Utc>,
  /// One value per keyword, aligned with [`InterestFrame::keywords`]
  pub values: Vec<u32>,
  pub is_partial: bool,
}

/// Time-indexed interest values. An empty series has no keyword columns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InterestFrame {
  pub keywords: Vec<String>,
  pub points: Vec<TimelinePoint>,
}

impl InterestFrame {
  pub fn is_empty(&self) -> bool {
    self.points.is_empty()
  }
}

/// A node of the provider's category taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryNode {
  pub name: String,
  pub id: u32,
  #[serde(default)]
  pub children: Vec<CategoryNode>,
}

impl CategoryNode {
  /// Ids of the direct children, in taxonomy order.
  pub fn child_ids(&self) -> Vec<u32> {
    self.children.iter().map(|c| c.id).collect()
  }
}

/// Trends data source. [`GoogleTrends`] talks HTTP; tests substitute mocks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrendsProvider: Send + Sync {
  /// Related queries, one entry per keyword in the request
  async fn related_queries(&self, request: &TrendsRequest)
    -> Result<Vec<RelatedQueries>, QueryError>;

  /// Interest over time with one value column per keyword
  async fn interest_over_time(&self, request: &TrendsRequest)
    -> Result<InterestFrame, QueryError>;

  /// Full category taxonomy, rooted at "All categories" (id 0)
  async fn categories(&self) -> Result<CategoryNode, QueryError>;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_category_tree_deserializes() {
    let tree: CategoryNode = serde_json::from_str(
      r#"{
        "name": "All categories",
        "id": 0,
        "children": [
          {"name": "Arts & Entertainment", "id": 3, "children": [{"name": "Movies", "id": 34}]},
          {"name": "Autos & Vehicles", "id": 47}
        ]
      }"#,
    )
    .unwrap();

    assert_eq!(tree.id, 0);
    assert_eq!(tree.child_ids(), vec![3, 47]);
    assert_eq!(tree.children[0].child_ids(), vec![34]);
    assert!(tree.children[1].children.is_empty());
  }

  #[test]
  fn test_single_request() {
    let request = TrendsRequest::single("Disney+", "AR", "today 1-m", 0);
    assert_eq!(request.keywords, vec!["Disney+".to_string()]);
    assert_eq!(request.geo, "AR");
    assert!(request.property.is_empty());
  }
}
