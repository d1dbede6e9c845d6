use chrono::Utc;
use tracing::{error, info, warn};

use super::{pause_after, DEFAULT_TIMEFRAME};
use crate::categories::consolidate_top_queries_by_category;
use crate::client::TrendsClient;
use crate::error::ShapeError;
use crate::table::{Table, TopSearchRow};

/// Top related queries for every country, stamped with the load time.
///
/// Columns come out as
/// `[query, score, country, search_keyword, category_id, date_loaded]`.
pub async fn build_top_search(
  client: &TrendsClient,
  timeframe: Option<&str>,
  countries: &[String],
  keywords: &[String],
  include_categories: bool,
) -> Result<Table<TopSearchRow>, ShapeError> {
  let timeframe = timeframe.unwrap_or(DEFAULT_TIMEFRAME);

  let mut per_country = Vec::with_capacity(countries.len());
  for country in countries {
    let result = consolidate_top_queries_by_category(
      client,
      country,
      timeframe,
      keywords,
      include_categories,
    )
    .await;

    match result {
      Ok(table) => {
        let date_loaded = Utc::now();
        info!(country = %country, rows = table.len(), "Collected top queries");
        per_country.push(table.map(|row| row.loaded_at(date_loaded)));
      }
      Err(e) => warn!(country = %country, error = %e, "No top queries for country"),
    }

    pause_after(country).await;
  }

  Table::concat(per_country, "top search").inspect_err(|e| {
    error!(error = %e, "Top search table is empty");
  })
}
