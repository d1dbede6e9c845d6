//! Typed tables flowing from the consolidators to the warehouse loaders.
//!
//! Every row type declares its ordered columns through [`Record`]; loaders
//! derive schemas and bindings from that declaration instead of guessing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ShapeError;
use crate::provider::InterestFrame;

/// Name of the flag column the provider attaches to interest series.
pub const PARTIAL_COLUMN: &str = "isPartial";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
  Text,
  Integer,
  Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
  pub name: &'static str,
  pub kind: ColumnType,
}

const fn column(name: &'static str, kind: ColumnType) -> Column {
  Column { name, kind }
}

/// A row type with a fixed, ordered column layout.
pub trait Record: Serialize {
  const COLUMNS: &'static [Column];

  fn column_names() -> Vec<&'static str> {
    Self::COLUMNS.iter().map(|c| c.name).collect()
  }
}

/// Ordered rows of one record type.
#[derive(Debug, Clone, PartialEq)]
pub struct Table<R> {
  rows: Vec<R>,
}

impl<R> Default for Table<R> {
  fn default() -> Self {
    Self { rows: Vec::new() }
  }
}

impl<R: Record> Table<R> {
  pub fn new(rows: Vec<R>) -> Self {
    Self { rows }
  }

  pub fn columns(&self) -> Vec<&'static str> {
    R::column_names()
  }

  pub fn rows(&self) -> &[R] {
    &self.rows
  }

  pub fn into_rows(self) -> Vec<R> {
    self.rows
  }

  pub fn len(&self) -> usize {
    self.rows.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }

  /// Concatenate parts in order. Zero parts is an error; empty parts are not.
  pub fn concat<I>(parts: I, stage: &str) -> Result<Self, ShapeError>
  where
    I: IntoIterator<Item = Table<R>>,
  {
    let mut parts = parts.into_iter().peekable();
    if parts.peek().is_none() {
      return Err(ShapeError::nothing_to_concatenate(stage));
    }

    let rows = parts.flat_map(|part| part.rows).collect();
    Ok(Self { rows })
  }

  pub fn map<S, F>(self, f: F) -> Table<S>
  where
    S: Record,
    F: FnMut(R) -> S,
  {
    Table { rows: self.rows.into_iter().map(f).collect() }
  }
}

/// A related query tagged with the country and keyword that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRow {
  pub query: String,
  pub score: u32,
  pub country: String,
  pub search_keyword: String,
}

impl Record for QueryRow {
  const COLUMNS: &'static [Column] = &[
    column("query", ColumnType::Text),
    column("score", ColumnType::Integer),
    column("country", ColumnType::Text),
    column("search_keyword", ColumnType::Text),
  ];
}

impl QueryRow {
  pub fn in_category(self, category_id: u32) -> CategorizedRow {
    CategorizedRow {
      query: self.query,
      score: self.score,
      country: self.country,
      search_keyword: self.search_keyword,
      category_id,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorizedRow {
  pub query: String,
  pub score: u32,
  pub country: String,
  pub search_keyword: String,
  pub category_id: u32,
}

impl Record for CategorizedRow {
  const COLUMNS: &'static [Column] = &[
    column("query", ColumnType::Text),
    column("score", ColumnType::Integer),
    column("country", ColumnType::Text),
    column("search_keyword", ColumnType::Text),
    column("category_id", ColumnType::Integer),
  ];
}

impl CategorizedRow {
  pub fn loaded_at(self, date_loaded: DateTime<Utc>) -> TopSearchRow {
    TopSearchRow {
      query: self.query,
      score: self.score,
      country: self.country,
      search_keyword: self.search_keyword,
      category_id: self.category_id,
      date_loaded,
    }
  }
}

/// Final row of the top-search table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopSearchRow {
  pub query: String,
  pub score: u32,
  pub country: String,
  pub search_keyword: String,
  pub category_id: u32,
  pub date_loaded: DateTime<Utc>,
}

impl Record for TopSearchRow {
  const COLUMNS: &'static [Column] = &[
    column("query", ColumnType::Text),
    column("score", ColumnType::Integer),
    column("country", ColumnType::Text),
    column("search_keyword", ColumnType::Text),
    column("category_id", ColumnType::Integer),
    column("date_loaded", ColumnType::Timestamp),
  ];
}

/// One keyword's interest series in long form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestPoint {
  pub timestamp: DateTime<Utc>,
  pub score: u32,
  pub term: String,
}

impl Record for InterestPoint {
  const COLUMNS: &'static [Column] = &[
    column("timestamp", ColumnType::Timestamp),
    column("score", ColumnType::Integer),
    column("term", ColumnType::Text),
  ];
}

impl InterestPoint {
  pub fn in_country(self, country: &str) -> InterestRow {
    InterestRow {
      timestamp: self.timestamp,
      score: self.score,
      term: self.term,
      country_alpha_code_2: country.to_string(),
    }
  }
}

/// Final row of the interest-over-time table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestRow {
  pub timestamp: DateTime<Utc>,
  pub score: u32,
  pub term: String,
  pub country_alpha_code_2: String,
}

impl Record for InterestRow {
  const COLUMNS: &'static [Column] = &[
    column("timestamp", ColumnType::Timestamp),
    column("score", ColumnType::Integer),
    column("term", ColumnType::Text),
    column("country_alpha_code_2", ColumnType::Text),
  ];
}

#[derive(Debug, Clone, PartialEq)]
pub struct WideInterestRow {
  pub timestamp: DateTime<Utc>,
  pub scores: BTreeMap<String, u32>,
  pub is_partial: bool,
  pub country: String,
  pub search_keyword: String,
  pub date_loaded: Option<DateTime<Utc>>,
}

/// Interest series in wide form: one score column per keyword.
///
/// Concatenating frames fetched for different keywords unions their keyword
/// columns; a row only carries scores for the keywords of its own frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WideInterestTable {
  keyword_columns: Vec<String>,
  rows: Vec<WideInterestRow>,
}

impl WideInterestTable {
  pub fn new() -> Self {
    Self::default()
  }

  /// Keyword columns followed by the bookkeeping columns.
  pub fn columns(&self) -> Vec<&str> {
    let mut columns: Vec<&str> = self.keyword_columns.iter().map(String::as_str).collect();
    columns.extend([PARTIAL_COLUMN, "country", "search_keyword"]);
    if self.rows.iter().any(|row| row.date_loaded.is_some()) {
      columns.push("date_loaded");
    }
    columns
  }

  pub fn keyword_columns(&self) -> &[String] {
    &self.keyword_columns
  }

  pub fn has_column(&self, keyword: &str) -> bool {
    self.keyword_columns.iter().any(|c| c == keyword)
  }

  pub fn rows(&self) -> &[WideInterestRow] {
    &self.rows
  }

  pub fn len(&self) -> usize {
    self.rows.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }

  /// Append a provider frame, tagging its rows with the country and keyword.
  pub fn push_frame(&mut self, frame: InterestFrame, country: &str, search_keyword: &str) {
    for keyword in &frame.keywords {
      self.add_column(keyword);
    }

    for point in frame.points {
      let scores = frame.keywords.iter().cloned().zip(point.values).collect();
      self.rows.push(WideInterestRow {
        timestamp: point.timestamp,
        scores,
        is_partial: point.is_partial,
        country: country.to_string(),
        search_keyword: search_keyword.to_string(),
        date_loaded: None,
      });
    }
  }

  pub fn stamp_loaded(&mut self, date_loaded: DateTime<Utc>) {
    for row in &mut self.rows {
      row.date_loaded = Some(date_loaded);
    }
  }

  pub fn concat<I>(parts: I, stage: &str) -> Result<Self, ShapeError>
  where
    I: IntoIterator<Item = WideInterestTable>,
  {
    let mut parts = parts.into_iter().peekable();
    if parts.peek().is_none() {
      return Err(ShapeError::nothing_to_concatenate(stage));
    }

    let mut merged = Self::new();
    for part in parts {
      for keyword in &part.keyword_columns {
        merged.add_column(keyword);
      }
      merged.rows.extend(part.rows);
    }
    Ok(merged)
  }

  /// Project one keyword column into long form, or `None` when the table has
  /// no such column. Rows without a score for the keyword are left out.
  pub fn project(&self, term: &str) -> Option<Table<InterestPoint>> {
    if !self.has_column(term) {
      return None;
    }

    let points = self
      .rows
      .iter()
      .filter_map(|row| {
        row.scores.get(term).map(|score| InterestPoint {
          timestamp: row.timestamp,
          score: *score,
          term: term.to_string(),
        })
      })
      .collect();

    Some(Table::new(points))
  }

  fn add_column(&mut self, keyword: &str) {
    if !self.has_column(keyword) {
      self.keyword_columns.push(keyword.to_string());
    }
  }
}
