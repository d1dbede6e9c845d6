use tracing::{error, info, warn};

use crate::client::TrendsClient;
use crate::consolidate::consolidate_related_queries;
use crate::error::ShapeError;
use crate::table::{CategorizedRow, Table};

/// Category id meaning "all categories".
pub const ALL_CATEGORIES: u32 = 0;

/// Top queries for one country, optionally fanned out over every top-level
/// category of the provider taxonomy.
///
/// Categories that produce nothing are skipped. A taxonomy fetch failure
/// leaves the country without results.
pub async fn consolidate_top_queries_by_category(
  client: &TrendsClient,
  country: &str,
  timeframe: &str,
  keywords: &[String],
  include_categories: bool,
) -> Result<Table<CategorizedRow>, ShapeError> {
  let stage = format!("categories for {country}");

  let category_ids = if include_categories {
    info!(country, "Running requests by categories");
    match client.categories().await {
      Ok(tree) => tree.child_ids(),
      Err(e) => {
        error!(country, error = %e, "Could not fetch category taxonomy");
        return Err(ShapeError::nothing_to_concatenate(stage));
      }
    }
  } else {
    vec![ALL_CATEGORIES]
  };

  let mut tables = Vec::with_capacity(category_ids.len());
  for category_id in category_ids {
    match consolidate_related_queries(client, country, timeframe, keywords, category_id).await {
      Ok(table) => tables.push(table.map(|row| row.in_category(category_id))),
      Err(e) => warn!(country, category = category_id, error = %e, "Skipping category"),
    }
  }

  Table::concat(tables, &stage)
}
