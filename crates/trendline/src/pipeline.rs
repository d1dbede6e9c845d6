//! Collect both tables, then load them into the chosen warehouse.

use anyhow::{Context, Result};
use porter::{
  upload_table, upload_to_snowflake, BigQuery, BigQueryOptions, SnowflakeOptions, TableSink,
  WriteSummary,
};
use scout::{
  build_interest_over_time, build_top_search, InterestRow, Table, TopSearchRow, TrendsClient,
  DEFAULT_TIMEFRAME,
};
use tracing::{info, warn};

use crate::cli::Sink;
use crate::config::{RunConfig, Settings};

/// The tables a run produced. A table is absent when nothing was collected
/// for it.
#[derive(Debug, Default)]
pub struct Collected {
  pub top_search: Option<Table<TopSearchRow>>,
  pub interest_over_time: Option<Table<InterestRow>>,
}

pub async fn collect(client: &TrendsClient, run: &RunConfig) -> Collected {
  info!(
    keywords = ?run.keywords,
    countries = ?run.countries,
    timeframe = ?run.timeframe,
    "Collecting top search"
  );
  let top_search = build_top_search(
    client,
    run.timeframe.as_deref(),
    &run.countries,
    &run.keywords,
    run.include_categories,
  )
  .await
  .ok();

  let timeframe = run.timeframe.as_deref().unwrap_or(DEFAULT_TIMEFRAME);
  info!(timeframe, category = run.category, "Collecting interest over time");
  let interest_over_time =
    build_interest_over_time(client, timeframe, &run.countries, run.category, &run.keywords)
      .await
      .ok();

  Collected { top_search, interest_over_time }
}

/// Load into BigQuery (or any sink with the same semantics). Upload failures
/// abort the run.
pub async fn load_bigquery(
  sink: &dyn TableSink,
  settings: &Settings,
  collected: &Collected,
) -> Result<u64> {
  let mut loaded = 0;

  match &collected.top_search {
    Some(table) => {
      let destination = &settings.top_search;
      loaded += upload_table(
        sink,
        table,
        &settings.project_id,
        &destination.table_name,
        destination.if_exists,
      )
      .await
      .with_context(|| format!("Failed to upload top search to {}", destination.table_name))?;
    }
    None => warn!("No top search table to upload"),
  }

  match &collected.interest_over_time {
    Some(table) => {
      let destination = &settings.interest_over_time;
      loaded += upload_table(
        sink,
        table,
        &settings.project_id,
        &destination.table_name,
        destination.if_exists,
      )
      .await
      .with_context(|| {
        format!("Failed to upload interest over time to {}", destination.table_name)
      })?;
    }
    None => warn!("No interest over time table to upload"),
  }

  Ok(loaded)
}

/// Load into Snowflake. A refused statement is reported in the summary;
/// a failed login aborts the run.
pub async fn load_snowflake(
  settings: &Settings,
  collected: &Collected,
  options: SnowflakeOptions,
) -> Result<Vec<WriteSummary>> {
  let mut summaries = Vec::new();

  if let Some(table) = &collected.top_search {
    let summary = upload_to_snowflake(
      table,
      &settings.snowflake_top_search_table,
      &settings.snowflake,
      options.clone(),
    )
    .await
    .context("Failed to connect to Snowflake")?;
    summaries.push(summary);
  } else {
    warn!("No top search table to upload");
  }

  if let Some(table) = &collected.interest_over_time {
    let summary =
      upload_to_snowflake(table, &settings.snowflake_interest_table, &settings.snowflake, options)
        .await
        .context("Failed to connect to Snowflake")?;
    summaries.push(summary);
  } else {
    warn!("No interest over time table to upload");
  }

  Ok(summaries)
}

/// One full batch: collect, then load into `sink`.
pub async fn run(
  client: &TrendsClient,
  config: &RunConfig,
  settings: &Settings,
  sink: Sink,
) -> Result<()> {
  let collected = collect(client, config).await;

  match sink {
    Sink::Bigquery => {
      let bigquery = BigQuery::new(BigQueryOptions {
        access_token: settings.bigquery_token.clone(),
        ..Default::default()
      })?;
      let rows = load_bigquery(&bigquery, settings, &collected).await?;
      info!(rows, "BigQuery load finished");
    }
    Sink::Snowflake => {
      let summaries = load_snowflake(settings, &collected, SnowflakeOptions::default()).await?;
      let failed = summaries.iter().filter(|s| !s.success).count();
      info!(tables = summaries.len(), failed, "Snowflake load finished");
    }
  }

  Ok(())
}
