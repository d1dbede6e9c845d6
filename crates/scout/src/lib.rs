//! Scout gathers Google Trends data for a set of keywords and countries.
//!
//! The layers, leaf first:
//!
//! - [`provider`]: the HTTP client speaking the Trends widget protocol
//! - [`client`]: one (keyword, country, category, kind) query at a time
//! - [`consolidate`]: a keyword list for one country, failures skipped
//! - [`categories`]: optional fan-out over the category taxonomy
//! - [`aggregate`]: per-country loops producing the final tables

pub mod aggregate;
pub mod categories;
pub mod client;
pub mod consolidate;
pub mod error;
pub mod provider;
pub mod query;
pub mod table;

pub use aggregate::{
  build_interest_over_time, build_top_search, reshape_interest, COUNTRY_PAUSE, DEFAULT_TIMEFRAME,
};
pub use client::{QueryResult, TrendsClient};
pub use error::{QueryError, ShapeError};
pub use query::{QueryKind, QuerySpec};
pub use table::{Column, ColumnType, InterestRow, Record, Table, TopSearchRow};
