//! Row encoding shared by the loaders.

use scout::{Column, ColumnType, Record};
use serde_json::{Map, Value};

use crate::error::SinkError;

/// Encode rows as value lists aligned with `R::COLUMNS`.
pub fn encode_rows<R: Record>(rows: &[R]) -> Result<Vec<Vec<Value>>, SinkError> {
  rows
    .iter()
    .map(|row| {
      let value = serde_json::to_value(row)?;
      let fields = value.as_object();
      Ok(
        R::COLUMNS
          .iter()
          .map(|c| fields.and_then(|f| f.get(c.name)).cloned().unwrap_or(Value::Null))
          .collect(),
      )
    })
    .collect()
}

/// One JSON object per row, keyed by column name.
pub fn to_objects(columns: &[Column], rows: &[Vec<Value>]) -> Vec<Map<String, Value>> {
  rows
    .iter()
    .map(|row| columns.iter().map(|c| c.name.to_string()).zip(row.iter().cloned()).collect())
    .collect()
}

pub fn bigquery_type(kind: ColumnType) -> &'static str {
  match kind {
    ColumnType::Text => "STRING",
    ColumnType::Integer => "INTEGER",
    ColumnType::Timestamp => "TIMESTAMP",
  }
}

/// Snowflake binding type. Timestamps travel as ISO-8601 text and are cast
/// by the target column.
pub fn snowflake_type(kind: ColumnType) -> &'static str {
  match kind {
    ColumnType::Integer => "FIXED",
    ColumnType::Text | ColumnType::Timestamp => "TEXT",
  }
}
