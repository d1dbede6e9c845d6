//! Trendline wires the Trends collectors to the warehouse loaders.

pub mod cli;
pub mod config;
pub mod pipeline;

pub use cli::{Cli, Sink};
pub use config::{ConfigError, Destination, RunConfig, Settings};
pub use pipeline::{collect, load_bigquery, load_snowflake, run, Collected};
