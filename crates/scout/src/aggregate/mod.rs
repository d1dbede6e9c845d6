//! Per-country loops producing the final tables.
//!
//! Countries are processed strictly one after another with a fixed pause in
//! between; the provider rate-limits aggressively and the pause is what keeps
//! a batch under its limits.

use std::time::Duration;
use tracing::info;

mod interest;
mod top_search;

pub use interest::{build_interest_over_time, reshape_interest};
pub use top_search::build_top_search;

/// Pause after each country.
pub const COUNTRY_PAUSE: Duration = Duration::from_secs(20);

/// Timeframe used when a run does not name one.
pub const DEFAULT_TIMEFRAME: &str = "today 1-m";

async fn pause_after(country: &str) {
  info!(country, seconds = COUNTRY_PAUSE.as_secs(), "Pausing before next country");
  tokio::time::sleep(COUNTRY_PAUSE).await;
}
