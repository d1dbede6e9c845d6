use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::pause_after;
use crate::client::TrendsClient;
use crate::consolidate::consolidate_interest;
use crate::error::ShapeError;
use crate::table::{InterestPoint, InterestRow, Table, WideInterestTable};

/// Interest over time for every country, in long form.
pub async fn build_interest_over_time(
  client: &TrendsClient,
  timeframe: &str,
  countries: &[String],
  category: u32,
  keywords: &[String],
) -> Result<Table<InterestRow>, ShapeError> {
  let mut per_country = Vec::with_capacity(countries.len());
  for country in countries {
    let consolidated =
      consolidate_interest(client, country, timeframe, keywords, category).await.map(|mut wide| {
        wide.stamp_loaded(Utc::now());
        wide
      });

    pause_after(country).await;

    let wide = match consolidated {
      Ok(wide) => wide,
      Err(e) => {
        warn!(country = %country, error = %e, "No interest data for country");
        continue;
      }
    };

    match reshape_interest(&wide, keywords) {
      Ok(long) => {
        info!(country = %country, rows = long.len(), "Collected interest over time");
        per_country.push(long.map(|point| point.in_country(country)));
      }
      Err(e) => warn!(country = %country, error = %e, "Interest data had no keyword columns"),
    }
  }

  Table::concat(per_country, "interest over time").inspect_err(|e| {
    error!(error = %e, "Interest over time table is empty");
  })
}

/// Wide (one column per keyword) to long (`timestamp, score, term`).
///
/// Keywords without a column in `wide` are skipped.
pub fn reshape_interest(
  wide: &WideInterestTable,
  keywords: &[String],
) -> Result<Table<InterestPoint>, ShapeError> {
  let projected: Vec<Table<InterestPoint>> = keywords
    .iter()
    .filter_map(|keyword| {
      let long = wide.project(keyword);
      if long.is_none() {
        debug!(keyword = %keyword, "Keyword has no interest column");
      }
      long
    })
    .collect();

  Table::concat(projected, "interest reshape")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::provider::{InterestFrame, TimelinePoint};
  use chrono::TimeZone;

  fn wide_with(keyword: &str, values: &[u32]) -> WideInterestTable {
    let points = values
      .iter()
      .enumerate()
      .map(|(week, v)| TimelinePoint {
        timestamp: Utc.with_ymd_and_hms(2021, 1, 3 + 7 * week as u32, 0, 0, 0).unwrap(),
        values: vec![*v],
        is_partial: false,
      })
      .collect();
    let mut wide = WideInterestTable::new();
    wide.push_frame(InterestFrame { keywords: vec![keyword.to_string()], points }, "AR", keyword);
    wide
  }

  #[test]
  fn test_reshape_projects_each_present_keyword() {
    let wide = wide_with("Disney+", &[12, 40, 100]);
    let kws = vec!["Disney+".to_string()];

    let long = reshape_interest(&wide, &kws).unwrap();
    assert_eq!(long.columns(), vec!["timestamp", "score", "term"]);
    assert_eq!(long.len(), 3);
    assert!(long.rows().iter().all(|p| p.term == "Disney+"));
  }

  #[test]
  fn test_reshape_skips_absent_keywords() {
    let wide = wide_with("Disney+", &[12, 40]);
    let kws = vec!["HBO Max".to_string(), "Disney+".to_string()];

    let long = reshape_interest(&wide, &kws).unwrap();
    assert_eq!(long.len(), 2);
    assert!(long.rows().iter().all(|p| p.term == "Disney+"));
  }

  #[test]
  fn test_reshape_with_no_matching_column_fails() {
    let wide = wide_with("Disney+", &[12]);
    let kws = vec!["HBO Max".to_string()];
    assert!(reshape_interest(&wide, &kws).is_err());
  }
}
