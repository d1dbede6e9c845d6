//! Runs one query kind over a keyword list for a single country and
//! category, keeping whatever succeeded.

use tracing::{error, info, warn};

use crate::client::{QueryResult, TrendsClient};
use crate::error::ShapeError;
use crate::query::{QueryKind, QuerySpec};
use crate::table::{QueryRow, Table, WideInterestTable};

/// Everything needed to consolidate one country/category pair.
#[derive(Debug, Clone, Copy)]
pub struct Consolidation<'a> {
  pub country: &'a str,
  pub timeframe: &'a str,
  pub keywords: &'a [String],
  pub kind: QueryKind,
  pub category: u32,
}

/// Consolidated rows, shaped by the query kind that produced them.
#[derive(Debug, Clone, PartialEq)]
pub enum Consolidated {
  RelatedQueries(Table<QueryRow>),
  InterestOverTime(WideInterestTable),
}

impl Consolidated {
  pub fn kind(&self) -> QueryKind {
    match self {
      Consolidated::RelatedQueries(_) => QueryKind::RelatedQueries,
      Consolidated::InterestOverTime(_) => QueryKind::InterestOverTime,
    }
  }
}

/// Query every keyword in order and concatenate the successes.
///
/// A keyword whose query fails is logged and skipped. When no keyword
/// succeeds the result is a [`ShapeError`], never a panic or an abort.
pub async fn consolidate_requests(
  client: &TrendsClient,
  job: Consolidation<'_>,
) -> Result<Consolidated, ShapeError> {
  let Consolidation { country, timeframe, keywords, category, .. } = job;
  match job.kind {
    QueryKind::RelatedQueries => {
      consolidate_related_queries(client, country, timeframe, keywords, category)
        .await
        .map(Consolidated::RelatedQueries)
    }
    QueryKind::InterestOverTime => {
      consolidate_interest(client, country, timeframe, keywords, category)
        .await
        .map(Consolidated::InterestOverTime)
    }
  }
}

/// Related queries for every keyword, tagged with country and keyword.
pub async fn consolidate_related_queries(
  client: &TrendsClient,
  country: &str,
  timeframe: &str,
  keywords: &[String],
  category: u32,
) -> Result<Table<QueryRow>, ShapeError> {
  let job =
    Consolidation { country, timeframe, keywords, kind: QueryKind::RelatedQueries, category };

  let parts: Vec<Table<QueryRow>> = query_each(client, job)
    .await
    .into_iter()
    .filter_map(|(keyword, result)| match result {
      QueryResult::RelatedQueries(top) => Some(Table::new(
        top
          .into_iter()
          .map(|ranked| QueryRow {
            query: ranked.query,
            score: ranked.value,
            country: country.to_string(),
            search_keyword: keyword.to_string(),
          })
          .collect(),
      )),
      QueryResult::InterestOverTime(_) => None,
    })
    .collect();

  Table::concat(parts, &stage(&job))
    .inspect_err(|e| error!(error = %e, "No keyword produced results"))
}

/// Interest over time for every keyword, as one wide table.
pub async fn consolidate_interest(
  client: &TrendsClient,
  country: &str,
  timeframe: &str,
  keywords: &[String],
  category: u32,
) -> Result<WideInterestTable, ShapeError> {
  let job =
    Consolidation { country, timeframe, keywords, kind: QueryKind::InterestOverTime, category };

  let parts: Vec<WideInterestTable> = query_each(client, job)
    .await
    .into_iter()
    .filter_map(|(keyword, result)| match result {
      QueryResult::InterestOverTime(frame) => {
        let mut table = WideInterestTable::new();
        table.push_frame(frame, country, keyword);
        Some(table)
      }
      QueryResult::RelatedQueries(_) => None,
    })
    .collect();

  WideInterestTable::concat(parts, &stage(&job))
    .inspect_err(|e| error!(error = %e, "No keyword produced results"))
}

/// One query per keyword, in order. Failed keywords are logged and left out.
async fn query_each<'a>(
  client: &TrendsClient,
  job: Consolidation<'a>,
) -> Vec<(&'a str, QueryResult)> {
  let mut results = Vec::with_capacity(job.keywords.len());

  for keyword in job.keywords {
    info!(
      kind = %job.kind,
      keyword = %keyword,
      country = job.country,
      category = job.category,
      "Running Trends request"
    );

    let spec = QuerySpec::new(keyword, job.country, job.timeframe, job.category, job.kind);
    match client.query(&spec).await {
      Ok(result) => results.push((keyword.as_str(), result)),
      Err(e) => {
        warn!(keyword = %keyword, country = job.country, error = %e, "Skipping keyword");
      }
    }
  }

  results
}

fn stage(job: &Consolidation<'_>) -> String {
  format!("{} for {}", job.kind, job.country)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::QueryError;
  use crate::provider::{
    InterestFrame, MockTrendsProvider, RankedQuery, RelatedQueries, TimelinePoint,
  };
  use chrono::{TimeZone, Utc};
  use std::sync::Arc;

  fn keywords(list: &[&str]) -> Vec<String> {
    list.iter().map(|k| k.to_string()).collect()
  }

  fn related_for(keyword: &str) -> Vec<RelatedQueries> {
    vec![RelatedQueries {
      keyword: keyword.to_string(),
      top: Some(vec![
        RankedQuery { query: format!("{} app", keyword.to_lowercase()), value: 100 },
        RankedQuery { query: format!("{} precio", keyword.to_lowercase()), value: 40 },
      ]),
      rising: None,
    }]
  }

  #[tokio::test]
  async fn test_one_failing_keyword_among_three() {
    let mut provider = MockTrendsProvider::new();
    provider.expect_related_queries().times(3).returning(|req| {
      if req.keywords[0] == "HBO Max" {
        Err(QueryError::rejected(400, "https://trends.google.com/trends/api/explore"))
      } else {
        Ok(related_for(&req.keywords[0]))
      }
    });
    let client = TrendsClient::with_provider(Arc::new(provider));

    let kws = keywords(&["Disney+", "HBO Max", "Netflix"]);
    let table = consolidate_related_queries(&client, "AR", "today 1-m", &kws, 0).await.unwrap();

    assert_eq!(table.len(), 4);
    let searched: Vec<&str> = table.rows().iter().map(|r| r.search_keyword.as_str()).collect();
    assert_eq!(searched, vec!["Disney+", "Disney+", "Netflix", "Netflix"]);
    assert!(table.rows().iter().all(|r| r.country == "AR"));
  }

  #[tokio::test]
  async fn test_related_kind_yields_query_table() {
    let mut provider = MockTrendsProvider::new();
    provider.expect_related_queries().times(1).returning(|req| Ok(related_for(&req.keywords[0])));
    provider.expect_interest_over_time().never();
    let client = TrendsClient::with_provider(Arc::new(provider));

    let kws = keywords(&["Disney+"]);
    let job = Consolidation {
      country: "CL",
      timeframe: "today 1-m",
      keywords: &kws,
      kind: QueryKind::RelatedQueries,
      category: 3,
    };
    let consolidated = consolidate_requests(&client, job).await.unwrap();
    assert_eq!(consolidated.kind(), QueryKind::RelatedQueries);

    let Consolidated::RelatedQueries(table) = consolidated else {
      panic!("expected a related queries table");
    };
    assert_eq!(table.len(), 2);
    assert!(table.rows().iter().all(|r| r.country == "CL" && r.search_keyword == "Disney+"));
  }

  #[tokio::test]
  async fn test_all_keywords_failing_is_absent() {
    let mut provider = MockTrendsProvider::new();
    provider
      .expect_related_queries()
      .times(2)
      .returning(|_| Err(QueryError::malformed("truncated body")));
    let client = TrendsClient::with_provider(Arc::new(provider));

    let kws = keywords(&["Disney+", "Netflix"]);
    let err = consolidate_related_queries(&client, "AR", "today 1-m", &kws, 0).await.unwrap_err();
    assert!(matches!(err, ShapeError::NothingToConcatenate { .. }));
  }

  #[tokio::test]
  async fn test_empty_keyword_list_is_absent() {
    let client = TrendsClient::with_provider(Arc::new(MockTrendsProvider::new()));
    let result = consolidate_related_queries(&client, "AR", "today 1-m", &[], 0).await;
    assert!(result.is_err());
  }

  #[tokio::test]
  async fn test_interest_tags_rows_and_unions_columns() {
    let mut provider = MockTrendsProvider::new();
    provider.expect_interest_over_time().times(2).returning(|req| {
      Ok(InterestFrame {
        keywords: req.keywords.clone(),
        points: vec![TimelinePoint {
          timestamp: Utc.with_ymd_and_hms(2021, 1, 3, 0, 0, 0).unwrap(),
          values: vec![if req.keywords[0] == "Disney+" { 80 } else { 60 }],
          is_partial: false,
        }],
      })
    });
    let client = TrendsClient::with_provider(Arc::new(provider));

    let kws = keywords(&["Disney+", "Netflix"]);
    let job = Consolidation {
      country: "MX",
      timeframe: "today 1-m",
      keywords: &kws,
      kind: QueryKind::InterestOverTime,
      category: 0,
    };
    let consolidated = consolidate_requests(&client, job).await.unwrap();
    assert_eq!(consolidated.kind(), QueryKind::InterestOverTime);

    let Consolidated::InterestOverTime(wide) = consolidated else {
      panic!("expected a wide interest table");
    };
    assert_eq!(wide.keyword_columns(), kws.as_slice());
    assert_eq!(wide.rows()[0].search_keyword, "Disney+");
    assert_eq!(wide.rows()[1].search_keyword, "Netflix");
    assert!(wide.rows().iter().all(|r| r.country == "MX"));
  }
}
