use async_trait::async_trait;
use scout::{Column, Record, Table};
use serde_json::Value;
use tracing::info;

use crate::destination::{IfExists, TableRef};
use crate::error::SinkError;
use crate::records::encode_rows;

/// A table ready to be written, already encoded in column order.
#[derive(Debug, Clone)]
pub struct Upload<'a> {
  pub destination: &'a TableRef,
  pub columns: &'static [Column],
  pub rows: Vec<Vec<Value>>,
  pub if_exists: IfExists,
}

/// A warehouse honouring replace/append/fail semantics.
#[async_trait]
pub trait TableSink: Send + Sync {
  /// Write the upload and return the number of rows loaded
  async fn load(&self, upload: Upload<'_>) -> Result<u64, SinkError>;
}

/// Upload `table` to `{project_id}.{dataset_table}`. Failures propagate.
pub async fn upload_table<R>(
  sink: &dyn TableSink,
  table: &Table<R>,
  project_id: &str,
  dataset_table: &str,
  if_exists: IfExists,
) -> Result<u64, SinkError>
where
  R: Record + Sync,
{
  let destination = TableRef::parse(project_id, dataset_table)?;
  let rows = encode_rows(table.rows())?;

  info!(destination = %destination, rows = rows.len(), if_exists = %if_exists, "Uploading table");
  let loaded =
    sink.load(Upload { destination: &destination, columns: R::COLUMNS, rows, if_exists }).await?;
  info!(destination = %destination, rows = loaded, "Upload complete");

  Ok(loaded)
}
