use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::destination::{IfExists, TableRef};
use crate::error::SinkError;
use crate::records::{bigquery_type, to_objects};
use crate::sink::{TableSink, Upload};

pub const BIGQUERY_BASE_URL: &str = "https://bigquery.googleapis.com";
const BOUNDARY: &str = "trendline_load_boundary";

#[derive(Debug, Clone)]
pub struct BigQueryOptions {
  /// API root (tests point this at a local server)
  pub base_url: String,
  /// OAuth bearer token with BigQuery scope
  pub access_token: Option<String>,
  /// Dataset location, when the jobs API needs it to find the job
  pub location: Option<String>,
  pub poll_interval: Duration,
  /// Per-request HTTP timeout
  pub timeout: Duration,
  /// How long a load job may stay pending or running before we give up on it
  pub job_timeout: Duration,
}

impl Default for BigQueryOptions {
  fn default() -> Self {
    Self {
      base_url: BIGQUERY_BASE_URL.to_string(),
      access_token: None,
      location: None,
      poll_interval: Duration::from_secs(1),
      timeout: Duration::from_secs(120),
      job_timeout: Duration::from_secs(600),
    }
  }
}

/// BigQuery load jobs over the REST API.
pub struct BigQuery {
  http: Client,
  options: BigQueryOptions,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobResource {
  job_reference: JobReference,
  #[serde(default)]
  status: JobStatus,
  #[serde(default)]
  statistics: Option<JobStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
  job_id: String,
  #[serde(default)]
  location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatus {
  #[serde(default)]
  state: String,
  #[serde(default)]
  error_result: Option<ErrorProto>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
  #[serde(default)]
  reason: String,
  #[serde(default)]
  message: String,
}

#[derive(Debug, Deserialize)]
struct JobStatistics {
  load: Option<LoadStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadStatistics {
  output_rows: Option<String>,
}

impl JobResource {
  fn is_done(&self) -> bool {
    self.status.state == "DONE"
  }

  fn output_rows(&self) -> Option<u64> {
    self.statistics.as_ref()?.load.as_ref()?.output_rows.as_ref()?.parse().ok()
  }
}

impl BigQuery {
  pub fn new(options: BigQueryOptions) -> Result<Self, SinkError> {
    let http = Client::builder().timeout(options.timeout).build()?;
    Ok(Self { http, options })
  }

  fn token(&self) -> Result<&str, SinkError> {
    self
      .options
      .access_token
      .as_deref()
      .filter(|t| !t.is_empty())
      .ok_or_else(|| SinkError::auth("no BigQuery access token configured"))
  }

  fn api_url(&self, path: &str) -> String {
    format!("{}{}", self.options.base_url.trim_end_matches('/'), path)
  }

  async fn table_exists(&self, destination: &TableRef) -> Result<bool, SinkError> {
    let url = self.api_url(&format!(
      "/bigquery/v2/projects/{}/datasets/{}/tables/{}",
      destination.project, destination.dataset, destination.table
    ));
    let response = self.http.get(&url).bearer_auth(self.token()?).send().await?;

    match response.status() {
      StatusCode::NOT_FOUND => Ok(false),
      status if status.is_success() => Ok(true),
      status => Err(SinkError::rejected(status.as_u16(), url, response.text().await?)),
    }
  }

  fn job_configuration(&self, upload: &Upload<'_>) -> Value {
    let fields: Vec<Value> = upload
      .columns
      .iter()
      .map(|c| json!({ "name": c.name, "type": bigquery_type(c.kind), "mode": "NULLABLE" }))
      .collect();

    let mut job_reference = json!({
      "projectId": upload.destination.project,
      "jobId": format!("trendline_{}", Uuid::new_v4().simple()),
    });
    if let Some(location) = &self.options.location {
      job_reference["location"] = json!(location);
    }

    json!({
      "jobReference": job_reference,
      "configuration": {
        "load": {
          "destinationTable": {
            "projectId": upload.destination.project,
            "datasetId": upload.destination.dataset,
            "tableId": upload.destination.table,
          },
          "schema": { "fields": fields },
          "sourceFormat": "NEWLINE_DELIMITED_JSON",
          "writeDisposition": upload.if_exists.write_disposition(),
          "createDisposition": "CREATE_IF_NEEDED",
        }
      }
    })
  }

  async fn insert_job(&self, upload: &Upload<'_>) -> Result<JobResource, SinkError> {
    let metadata = self.job_configuration(upload);

    let mut data = String::new();
    for object in to_objects(upload.columns, &upload.rows) {
      data.push_str(&serde_json::to_string(&object)?);
      data.push('\n');
    }

    let body = format!(
      "--{BOUNDARY}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n\
       --{BOUNDARY}\r\nContent-Type: application/octet-stream\r\n\r\n{data}\r\n\
       --{BOUNDARY}--\r\n"
    );

    let url = self.api_url(&format!(
      "/upload/bigquery/v2/projects/{}/jobs?uploadType=multipart",
      upload.destination.project
    ));
    let response = self
      .http
      .post(&url)
      .bearer_auth(self.token()?)
      .header("Content-Type", format!("multipart/related; boundary={BOUNDARY}"))
      .body(body)
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      return Err(SinkError::rejected(status.as_u16(), url, response.text().await?));
    }
    Ok(response.json().await?)
  }

  async fn get_job(&self, project: &str, reference: &JobReference) -> Result<JobResource, SinkError> {
    let url = self.api_url(&format!("/bigquery/v2/projects/{project}/jobs/{}", reference.job_id));
    let mut request = self.http.get(&url).bearer_auth(self.token()?);
    if let Some(location) = &reference.location {
      request = request.query(&[("location", location)]);
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
      return Err(SinkError::rejected(status.as_u16(), url, response.text().await?));
    }
    Ok(response.json().await?)
  }

  async fn wait_for(&self, project: &str, mut job: JobResource) -> Result<JobResource, SinkError> {
    let deadline = Instant::now() + self.options.job_timeout;
    while !job.is_done() {
      if Instant::now() >= deadline {
        return Err(SinkError::job(
          &job.job_reference.job_id,
          format!(
            "still {} after {}s",
            job.status.state,
            self.options.job_timeout.as_secs_f64()
          ),
        ));
      }
      debug!(job_id = %job.job_reference.job_id, state = %job.status.state, "Waiting for load job");
      tokio::time::sleep(self.options.poll_interval).await;
      job = self.get_job(project, &job.job_reference).await?;
    }

    if let Some(error) = &job.status.error_result {
      return Err(SinkError::job(
        &job.job_reference.job_id,
        format!("{}: {}", error.reason, error.message),
      ));
    }
    Ok(job)
  }
}

#[async_trait]
impl TableSink for BigQuery {
  async fn load(&self, upload: Upload<'_>) -> Result<u64, SinkError> {
    if upload.if_exists == IfExists::Fail && self.table_exists(upload.destination).await? {
      return Err(SinkError::table_exists(upload.destination.to_string()));
    }

    let job = self.insert_job(&upload).await?;
    info!(job_id = %job.job_reference.job_id, destination = %upload.destination, "Load job created");

    let job = self.wait_for(&upload.destination.project, job).await?;
    Ok(job.output_rows().unwrap_or(upload.rows.len() as u64))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sink::upload_table;
  use chrono::{TimeZone, Utc};
  use mockito::{Matcher, Server};
  use scout::{Table, TopSearchRow};

  fn options_for(server: &Server) -> BigQueryOptions {
    BigQueryOptions {
      base_url: server.url(),
      access_token: Some("test-token".to_string()),
      poll_interval: Duration::from_millis(10),
      ..Default::default()
    }
  }

  fn top_search() -> Table<TopSearchRow> {
    Table::new(vec![TopSearchRow {
      query: "disney plus".to_string(),
      score: 100,
      country: "AR".to_string(),
      search_keyword: "Disney+".to_string(),
      category_id: 0,
      date_loaded: Utc.with_ymd_and_hms(2021, 9, 13, 12, 0, 0).unwrap(),
    }])
  }

  #[tokio::test]
  async fn test_replace_runs_truncating_load_job() {
    let mut server = Server::new_async().await;
    let insert = server
      .mock("POST", "/upload/bigquery/v2/projects/my_project/jobs")
      .match_query(Matcher::UrlEncoded("uploadType".into(), "multipart".into()))
      .match_header("authorization", "Bearer test-token")
      .match_header("content-type", Matcher::Regex("multipart/related".into()))
      .match_body(Matcher::AllOf(vec![
        Matcher::Regex("\"writeDisposition\":\"WRITE_TRUNCATE\"".into()),
        Matcher::Regex("\"tableId\":\"google_trends_top_search\"".into()),
        Matcher::Regex("\"search_keyword\":\"Disney\\+\"".into()),
      ]))
      .with_status(200)
      .with_body(
        r#"{"jobReference": {"projectId": "my_project", "jobId": "job_1", "location": "US"},
            "status": {"state": "DONE"},
            "statistics": {"load": {"outputRows": "1"}}}"#,
      )
      .create_async()
      .await;

    let bigquery = BigQuery::new(options_for(&server)).unwrap();
    let loaded = upload_table(
      &bigquery,
      &top_search(),
      "my_project",
      "my_project.my_dataset.google_trends_top_search",
      IfExists::Replace,
    )
    .await
    .unwrap();

    insert.assert_async().await;
    assert_eq!(loaded, 1);
  }

  #[tokio::test]
  async fn test_running_job_is_polled_until_done() {
    let mut server = Server::new_async().await;
    server
      .mock("POST", "/upload/bigquery/v2/projects/my_project/jobs")
      .match_query(Matcher::Any)
      .with_status(200)
      .with_body(r#"{"jobReference": {"jobId": "job_2", "location": "US"}, "status": {"state": "RUNNING"}}"#)
      .create_async()
      .await;
    let poll = server
      .mock("GET", "/bigquery/v2/projects/my_project/jobs/job_2")
      .match_query(Matcher::UrlEncoded("location".into(), "US".into()))
      .with_status(200)
      .with_body(
        r#"{"jobReference": {"jobId": "job_2", "location": "US"},
            "status": {"state": "DONE"},
            "statistics": {"load": {"outputRows": "1"}}}"#,
      )
      .create_async()
      .await;

    let bigquery = BigQuery::new(options_for(&server)).unwrap();
    let loaded =
      upload_table(&bigquery, &top_search(), "my_project", "my_dataset.trends", IfExists::Append)
        .await
        .unwrap();

    poll.assert_async().await;
    assert_eq!(loaded, 1);
  }

  #[tokio::test]
  async fn test_stuck_job_gives_up_after_job_timeout() {
    let mut server = Server::new_async().await;
    server
      .mock("POST", "/upload/bigquery/v2/projects/my_project/jobs")
      .match_query(Matcher::Any)
      .with_status(200)
      .with_body(r#"{"jobReference": {"jobId": "job_4"}, "status": {"state": "PENDING"}}"#)
      .create_async()
      .await;
    let poll = server
      .mock("GET", "/bigquery/v2/projects/my_project/jobs/job_4")
      .with_status(200)
      .with_body(r#"{"jobReference": {"jobId": "job_4"}, "status": {"state": "RUNNING"}}"#)
      .expect_at_least(1)
      .create_async()
      .await;

    let options =
      BigQueryOptions { job_timeout: Duration::from_millis(100), ..options_for(&server) };
    let bigquery = BigQuery::new(options).unwrap();
    let err =
      upload_table(&bigquery, &top_search(), "my_project", "my_dataset.trends", IfExists::Append)
        .await
        .unwrap_err();

    poll.assert_async().await;
    match err {
      SinkError::Job { job_id, message } => {
        assert_eq!(job_id, "job_4");
        assert!(message.starts_with("still RUNNING"));
      }
      other => panic!("Expected Job error, got: {other:?}"),
    }
  }

  #[tokio::test]
  async fn test_job_error_propagates() {
    let mut server = Server::new_async().await;
    server
      .mock("POST", "/upload/bigquery/v2/projects/my_project/jobs")
      .match_query(Matcher::Any)
      .with_status(200)
      .with_body(
        r#"{"jobReference": {"jobId": "job_3"},
            "status": {"state": "DONE", "errorResult": {"reason": "invalid", "message": "bad row"}}}"#,
      )
      .create_async()
      .await;

    let bigquery = BigQuery::new(options_for(&server)).unwrap();
    let err =
      upload_table(&bigquery, &top_search(), "my_project", "my_dataset.trends", IfExists::Append)
        .await
        .unwrap_err();

    match err {
      SinkError::Job { job_id, message } => {
        assert_eq!(job_id, "job_3");
        assert_eq!(message, "invalid: bad row");
      }
      other => panic!("Expected Job error, got: {other:?}"),
    }
  }

  #[tokio::test]
  async fn test_fail_policy_refuses_existing_table() {
    let mut server = Server::new_async().await;
    server
      .mock("GET", "/bigquery/v2/projects/my_project/datasets/my_dataset/tables/trends")
      .with_status(200)
      .with_body(r#"{"id": "my_project:my_dataset.trends"}"#)
      .create_async()
      .await;
    let insert = server
      .mock("POST", "/upload/bigquery/v2/projects/my_project/jobs")
      .match_query(Matcher::Any)
      .expect(0)
      .create_async()
      .await;

    let bigquery = BigQuery::new(options_for(&server)).unwrap();
    let err =
      upload_table(&bigquery, &top_search(), "my_project", "my_dataset.trends", IfExists::Fail)
        .await
        .unwrap_err();

    insert.assert_async().await;
    assert!(matches!(err, SinkError::TableExists { .. }));
  }

  #[tokio::test]
  async fn test_missing_token_is_an_auth_error() {
    let server = Server::new_async().await;
    let options = BigQueryOptions { access_token: None, ..options_for(&server) };
    let bigquery = BigQuery::new(options).unwrap();

    let err =
      upload_table(&bigquery, &top_search(), "my_project", "my_dataset.trends", IfExists::Append)
        .await
        .unwrap_err();
    assert!(matches!(err, SinkError::Auth { .. }));
  }

  #[tokio::test]
  async fn test_http_rejection_propagates() {
    let mut server = Server::new_async().await;
    server
      .mock("POST", "/upload/bigquery/v2/projects/my_project/jobs")
      .match_query(Matcher::Any)
      .with_status(403)
      .with_body(r#"{"error": {"message": "Access Denied"}}"#)
      .create_async()
      .await;

    let bigquery = BigQuery::new(options_for(&server)).unwrap();
    let err =
      upload_table(&bigquery, &top_search(), "my_project", "my_dataset.trends", IfExists::Replace)
        .await
        .unwrap_err();
    assert!(matches!(err, SinkError::Rejected { status: 403, .. }));
  }
}
