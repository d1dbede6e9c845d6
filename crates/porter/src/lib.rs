//! Porter carries finished tables into a warehouse.
//!
//! BigQuery uploads honour an [`IfExists`] policy and propagate every
//! failure. Snowflake uploads write into an existing table and report a
//! failing statement instead of raising it.

pub mod bigquery;
pub mod destination;
pub mod error;
pub mod records;
pub mod sink;
pub mod snowflake;

pub use bigquery::{BigQuery, BigQueryOptions};
pub use destination::{IfExists, TableRef};
pub use error::SinkError;
pub use sink::{upload_table, TableSink, Upload};
pub use snowflake::{upload_to_snowflake, Snowflake, SnowflakeConfig, SnowflakeOptions, WriteSummary};
