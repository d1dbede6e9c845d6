use reqwest::Client;
use scout::{Column, Record, Table};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::error::SinkError;
use crate::records::{encode_rows, snowflake_type};

pub const DEFAULT_CHUNK_SIZE: usize = 16_384;
const CLIENT_APP_ID: &str = "trendline";

/// Connection parameters for a Snowflake account.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct SnowflakeConfig {
  pub user: String,
  pub password: String,
  pub account: String,
  pub warehouse: String,
  pub database: String,
  pub schema: String,
}

impl fmt::Debug for SnowflakeConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SnowflakeConfig")
      .field("user", &self.user)
      .field("password", &"<redacted>")
      .field("account", &self.account)
      .field("warehouse", &self.warehouse)
      .field("database", &self.database)
      .field("schema", &self.schema)
      .finish()
  }
}

#[derive(Debug, Clone)]
pub struct SnowflakeOptions {
  /// Overrides `https://{account}.snowflakecomputing.com`
  pub base_url: Option<String>,
  pub chunk_size: usize,
  pub timeout: Duration,
}

impl Default for SnowflakeOptions {
  fn default() -> Self {
    Self { base_url: None, chunk_size: DEFAULT_CHUNK_SIZE, timeout: Duration::from_secs(60) }
  }
}

/// Outcome of a bulk write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteSummary {
  pub success: bool,
  pub chunks: usize,
  pub rows: u64,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
  #[serde(default)]
  success: bool,
  #[serde(default)]
  code: Option<String>,
  #[serde(default)]
  message: Option<String>,
  data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct LoginData {
  token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct QueryData {
  #[serde(default)]
  stats: Option<QueryStats>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryStats {
  num_rows_inserted: Option<u64>,
}

/// An authenticated Snowflake session.
pub struct Snowflake {
  http: Client,
  base: Url,
  token: String,
  chunk_size: usize,
  sequence: AtomicU64,
}

impl Snowflake {
  /// Log in and open a session in the configured warehouse, database and schema.
  pub async fn connect(
    config: &SnowflakeConfig,
    options: SnowflakeOptions,
  ) -> Result<Self, SinkError> {
    let base = options
      .base_url
      .clone()
      .unwrap_or_else(|| format!("https://{}.snowflakecomputing.com", config.account));
    let base = Url::parse(&base).map_err(|e| SinkError::invalid_destination(&base, e.to_string()))?;
    let http = Client::builder().timeout(options.timeout).build()?;

    let mut url = endpoint(&base, "session/v1/login-request")?;
    url
      .query_pairs_mut()
      .append_pair("warehouse", &config.warehouse)
      .append_pair("databaseName", &config.database)
      .append_pair("schemaName", &config.schema)
      .append_pair("requestId", &Uuid::new_v4().to_string());

    let body = json!({
      "data": {
        "CLIENT_APP_ID": CLIENT_APP_ID,
        "CLIENT_APP_VERSION": env!("CARGO_PKG_VERSION"),
        "ACCOUNT_NAME": config.account,
        "LOGIN_NAME": config.user,
        "PASSWORD": config.password,
      }
    });

    debug!(account = %config.account, user = %config.user, "Logging in to Snowflake");
    let response = http.post(url.clone()).json(&body).send().await?;
    let status = response.status();
    if !status.is_success() {
      return Err(SinkError::rejected(status.as_u16(), url.as_str(), response.text().await?));
    }

    let envelope: Envelope<LoginData> = response.json().await?;
    let token = match (envelope.success, envelope.data.and_then(|d| d.token)) {
      (true, Some(token)) => token,
      _ => {
        return Err(SinkError::auth(
          envelope.message.unwrap_or_else(|| "login rejected".to_string()),
        ))
      }
    };

    info!(account = %config.account, database = %config.database, schema = %config.schema, "Connected to Snowflake");
    Ok(Self { http, base, token, chunk_size: options.chunk_size.max(1), sequence: AtomicU64::new(1) })
  }

  /// Run one statement, returning the number of rows it inserted.
  pub async fn execute(&self, sql: &str, bindings: Option<Value>) -> Result<Option<u64>, SinkError> {
    let mut url = endpoint(&self.base, "queries/v1/query-request")?;
    url.query_pairs_mut().append_pair("requestId", &Uuid::new_v4().to_string());

    let mut body = json!({
      "sqlText": sql,
      "asyncExec": false,
      "sequenceId": self.sequence.fetch_add(1, Ordering::SeqCst),
    });
    if let Some(bindings) = bindings {
      body["bindings"] = bindings;
    }

    let response = self
      .http
      .post(url.clone())
      .header("Authorization", format!("Snowflake Token=\"{}\"", self.token))
      .header("Accept", "application/snowflake")
      .json(&body)
      .send()
      .await?;
    let status = response.status();
    if !status.is_success() {
      return Err(SinkError::rejected(status.as_u16(), url.as_str(), response.text().await?));
    }

    let envelope: Envelope<QueryData> = response.json().await?;
    if !envelope.success {
      return Err(SinkError::statement(
        envelope.code.unwrap_or_default(),
        envelope.message.unwrap_or_default(),
      ));
    }
    Ok(envelope.data.and_then(|d| d.stats).and_then(|s| s.num_rows_inserted))
  }

  /// Insert every row of `table` into an existing table, in chunks, inside
  /// one transaction. Identifiers are upper-cased. Any failure after `BEGIN`
  /// rolls the whole table back.
  pub async fn write_table<R>(
    &self,
    table: &Table<R>,
    table_name: &str,
  ) -> Result<WriteSummary, SinkError>
  where
    R: Record + Sync,
  {
    let rows = encode_rows(table.rows())?;
    let sql = insert_statement(table_name, R::COLUMNS.iter().map(|c| c.name));

    self.execute("BEGIN", None).await?;
    match self.insert_chunks(&sql, R::COLUMNS, &rows).await {
      Ok(summary) => {
        self.execute("COMMIT", None).await?;
        Ok(summary)
      }
      Err(e) => {
        warn!(table = table_name, error = %e, "Rolling back Snowflake write");
        if let Err(rollback) = self.execute("ROLLBACK", None).await {
          warn!(table = table_name, error = %rollback, "Rollback failed");
        }
        Err(e)
      }
    }
  }

  async fn insert_chunks(
    &self,
    sql: &str,
    columns: &[Column],
    rows: &[Vec<Value>],
  ) -> Result<WriteSummary, SinkError> {
    let mut summary = WriteSummary { success: true, ..Default::default() };
    for chunk in rows.chunks(self.chunk_size) {
      let bindings = columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
          let values: Vec<Value> = chunk.iter().map(|row| binding_text(&row[i])).collect();
          ((i + 1).to_string(), json!({ "type": snowflake_type(column.kind), "value": values }))
        })
        .collect::<Map<String, Value>>();

      let inserted = self.execute(sql, Some(Value::Object(bindings))).await?;
      debug!(chunk = summary.chunks + 1, rows = chunk.len(), "Inserted chunk");
      summary.chunks += 1;
      summary.rows += inserted.unwrap_or(chunk.len() as u64);
    }

    Ok(summary)
  }
}

/// Bulk-write `table` into `snowflake_table`. A login failure is an error; a
/// statement the warehouse refuses is logged and reported as unsuccessful,
/// with nothing written.
pub async fn upload_to_snowflake<R>(
  table: &Table<R>,
  snowflake_table: &str,
  config: &SnowflakeConfig,
  options: SnowflakeOptions,
) -> Result<WriteSummary, SinkError>
where
  R: Record + Sync,
{
  let session = Snowflake::connect(config, options).await?;

  match session.write_table(table, snowflake_table).await {
    Ok(summary) => {
      info!(success = summary.success, chunks = summary.chunks, rows = summary.rows, "Query status");
      Ok(summary)
    }
    Err(e) if e.is_statement_failure() => {
      error!(table = snowflake_table, "{e}; nothing was written");
      Ok(WriteSummary::default())
    }
    Err(e) => Err(e),
  }
}

fn endpoint(base: &Url, path: &str) -> Result<Url, SinkError> {
  base.join(path).map_err(|e| SinkError::invalid_destination(base.as_str(), e.to_string()))
}

fn quote_identifier(name: &str) -> String {
  name
    .split('.')
    .map(|part| format!("\"{}\"", part.to_uppercase().replace('"', "\"\"")))
    .collect::<Vec<_>>()
    .join(".")
}

fn insert_statement<'a>(table_name: &str, columns: impl Iterator<Item = &'a str>) -> String {
  let columns: Vec<String> = columns.map(quote_identifier).collect();
  let placeholders = vec!["?"; columns.len()].join(", ");
  format!(
    "INSERT INTO {} ({}) VALUES ({placeholders})",
    quote_identifier(table_name),
    columns.join(", ")
  )
}

// Array bindings travel as text.
fn binding_text(value: &Value) -> Value {
  match value {
    Value::Null => Value::Null,
    Value::String(s) => Value::String(s.clone()),
    other => Value::String(other.to_string()),
  }
}
