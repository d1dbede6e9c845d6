use std::sync::Arc;
use tracing::debug;

use crate::error::QueryError;
use crate::provider::{
  CategoryNode, GoogleTrends, GoogleTrendsOptions, InterestFrame, RankedQuery, TrendsProvider,
  TrendsRequest,
};
use crate::query::{QueryKind, QuerySpec};

/// Result of a single (keyword, country, category, kind) query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResult {
  /// The "top" slice of the related queries
  RelatedQueries(Vec<RankedQuery>),
  InterestOverTime(InterestFrame),
}

/// Issues one provider query per call.
pub struct TrendsClient {
  provider: Arc<dyn TrendsProvider>,
}

impl TrendsClient {
  /// Google Trends with the default timeouts and retry count.
  pub fn new() -> Result<Self, QueryError> {
    Self::with_options(GoogleTrendsOptions::default())
  }

  pub fn with_options(options: GoogleTrendsOptions) -> Result<Self, QueryError> {
    Ok(Self::with_provider(Arc::new(GoogleTrends::new(options)?)))
  }

  /// Use a pre-configured provider as-is.
  pub fn with_provider(provider: Arc<dyn TrendsProvider>) -> Self {
    Self { provider }
  }

  pub async fn query(&self, spec: &QuerySpec) -> Result<QueryResult, QueryError> {
    debug!(
      kind = %spec.kind,
      keyword = %spec.keyword,
      country = %spec.country,
      category = spec.category,
      "Querying Trends"
    );

    let request =
      TrendsRequest::single(&spec.keyword, &spec.country, &spec.timeframe, spec.category);

    match spec.kind {
      QueryKind::RelatedQueries => {
        let related = self.provider.related_queries(&request).await?;
        let top = related.into_iter().next().and_then(|r| r.top).unwrap_or_default();
        Ok(QueryResult::RelatedQueries(top))
      }
      QueryKind::InterestOverTime => {
        let frame = self.provider.interest_over_time(&request).await?;
        Ok(QueryResult::InterestOverTime(frame))
      }
    }
  }

  pub async fn categories(&self) -> Result<CategoryNode, QueryError> {
    self.provider.categories().await
  }
}
