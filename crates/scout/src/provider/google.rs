use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{Client, Method, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::{
  CategoryNode, InterestFrame, RankedQuery, RelatedQueries, TimelinePoint, TrendsProvider,
  TrendsRequest,
};
use crate::error::QueryError;

pub const TRENDS_BASE_URL: &str = "https://trends.google.com/trends";
const SESSION_URL: &str = "https://trends.google.com/?geo=US";

const EXPLORE_PATH: &str = "/api/explore";
const MULTILINE_PATH: &str = "/api/widgetdata/multiline";
const RELATED_SEARCHES_PATH: &str = "/api/widgetdata/relatedsearches";
const CATEGORIES_PATH: &str = "/api/explore/pickers/category";

// Junk prefixes guarding the JSON bodies
const EXPLORE_TRIM: usize = 4;
const WIDGET_TRIM: usize = 5;

const RETRY_STATUSES: [u16; 4] = [429, 500, 502, 504];
const USER_AGENT: &str = concat!("trendline/", env!("CARGO_PKG_VERSION"));

/// Connection settings for [`GoogleTrends`]
#[derive(Debug, Clone)]
pub struct GoogleTrendsOptions {
  /// Trends API root (tests point this at a local server)
  pub base_url: String,
  /// Page fetched once to obtain the session cookie; `None` skips it
  pub session_url: Option<String>,
  pub hl: String,
  /// Timezone offset in minutes, as the web UI sends it
  pub tz: i32,
  pub connect_timeout: Duration,
  pub read_timeout: Duration,
  pub retries: u32,
  pub backoff_factor: f64,
}

impl Default for GoogleTrendsOptions {
  fn default() -> Self {
    Self {
      base_url: TRENDS_BASE_URL.to_string(),
      session_url: Some(SESSION_URL.to_string()),
      hl: "en-US".to_string(),
      tz: 360,
      connect_timeout: Duration::from_secs(10),
      read_timeout: Duration::from_secs(25),
      retries: 10,
      backoff_factor: 0.0,
    }
  }
}

pub struct GoogleTrends {
  http: Client,
  options: GoogleTrendsOptions,
  session: OnceCell<()>,
}

impl GoogleTrends {
  pub fn new(options: GoogleTrendsOptions) -> Result<Self, QueryError> {
    let http = Client::builder()
      .cookie_store(true)
      .connect_timeout(options.connect_timeout)
      .read_timeout(options.read_timeout)
      .user_agent(USER_AGENT)
      .build()?;

    Ok(Self { http, options, session: OnceCell::new() })
  }

  pub fn options(&self) -> &GoogleTrendsOptions {
    &self.options
  }

  /// Prime the cookie store. A failure only costs us the cookie.
  async fn ensure_session(&self) {
    self
      .session
      .get_or_init(|| async {
        let Some(url) = &self.options.session_url else {
          return;
        };
        match self.http.get(url).send().await {
          Ok(response) => debug!(status = %response.status(), "Trends session cookie requested"),
          Err(e) => warn!(error = %e, "Could not obtain Trends session cookie"),
        }
      })
      .await;
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.options.base_url.trim_end_matches('/'), path)
  }

  fn backoff(&self, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1) as i32;
    Duration::from_secs_f64(self.options.backoff_factor * 2f64.powi(exponent))
  }

  async fn send(
    &self,
    method: &Method,
    url: &str,
    params: &[(&str, String)],
  ) -> Result<Response, QueryError> {
    let mut attempt = 0;
    loop {
      let result = self.http.request(method.clone(), url).query(params).send().await;

      let retryable = match &result {
        Ok(response) => RETRY_STATUSES.contains(&response.status().as_u16()),
        Err(e) => e.is_connect() || e.is_timeout(),
      };
      if !retryable || attempt >= self.options.retries {
        return result.map_err(QueryError::from);
      }

      attempt += 1;
      debug!(url, attempt, "Retrying Trends request");
      let delay = self.backoff(attempt);
      if !delay.is_zero() {
        tokio::time::sleep(delay).await;
      }
    }
  }

  async fn fetch_json(
    &self,
    method: Method,
    path: &str,
    params: &[(&str, String)],
    trim_chars: usize,
  ) -> Result<Value, QueryError> {
    self.ensure_session().await;

    let url = self.url(path);
    let response = self.send(&method, &url, params).await?;

    let status = response.status();
    if status.as_u16() == 429 {
      return Err(QueryError::too_many_requests(url));
    }
    if !status.is_success() {
      return Err(QueryError::rejected(status.as_u16(), url));
    }

    let text = response.text().await?;
    parse_trimmed(&text, trim_chars)
  }

  /// Exchange the comparison payload for the widget tokens.
  async fn widgets(&self, request: &TrendsRequest) -> Result<Vec<Value>, QueryError> {
    let comparison: Vec<Value> = request
      .keywords
      .iter()
      .map(|kw| json!({ "keyword": kw, "time": request.timeframe, "geo": request.geo }))
      .collect();
    let req = json!({
      "comparisonItem": comparison,
      "category": request.category,
      "property": request.property,
    });

    let params = [
      ("hl", self.options.hl.clone()),
      ("tz", self.options.tz.to_string()),
      ("req", req.to_string()),
    ];
    let body = self.fetch_json(Method::POST, EXPLORE_PATH, &params, EXPLORE_TRIM).await?;

    body["widgets"]
      .as_array()
      .cloned()
      .ok_or_else(|| QueryError::malformed("explore response has no widgets"))
  }

  fn widget_params(&self, widget: &Value) -> Result<Vec<(&'static str, String)>, QueryError> {
    let request = widget
      .get("request")
      .ok_or_else(|| QueryError::malformed("widget has no request"))?;
    let token = widget["token"]
      .as_str()
      .ok_or_else(|| QueryError::malformed("widget has no token"))?;

    Ok(vec![
      ("req", request.to_string()),
      ("token", token.to_string()),
      ("tz", self.options.tz.to_string()),
    ])
  }
}

#[async_trait]
impl TrendsProvider for GoogleTrends {
  async fn related_queries(
    &self,
    request: &TrendsRequest,
  ) -> Result<Vec<RelatedQueries>, QueryError> {
    let widgets = self.widgets(request).await?;
    let related: Vec<&Value> = widgets
      .iter()
      .filter(|w| w["id"].as_str().is_some_and(|id| id.contains("RELATED_QUERIES")))
      .collect();
    if related.is_empty() {
      return Err(QueryError::missing_widget("RELATED_QUERIES"));
    }

    let mut results = Vec::with_capacity(related.len());
    for widget in related {
      let keyword = widget["request"]["restriction"]["complexKeywordsRestriction"]["keyword"][0]
        ["value"]
        .as_str()
        .unwrap_or_default()
        .to_string();

      let params = self.widget_params(widget)?;
      let body =
        self.fetch_json(Method::GET, RELATED_SEARCHES_PATH, &params, WIDGET_TRIM).await?;
      results.push(parse_related(keyword, body)?);
    }

    Ok(results)
  }

  async fn interest_over_time(&self, request: &TrendsRequest) -> Result<InterestFrame, QueryError> {
    let widgets = self.widgets(request).await?;
    let widget = widgets
      .iter()
      .find(|w| w["id"].as_str() == Some("TIMESERIES"))
      .ok_or_else(|| QueryError::missing_widget("TIMESERIES"))?;

    let params = self.widget_params(widget)?;
    let body = self.fetch_json(Method::GET, MULTILINE_PATH, &params, WIDGET_TRIM).await?;
    parse_timeline(&request.keywords, body)
  }

  async fn categories(&self) -> Result<CategoryNode, QueryError> {
    let params = [("hl", self.options.hl.clone())];
    let body = self.fetch_json(Method::GET, CATEGORIES_PATH, &params, WIDGET_TRIM).await?;
    Ok(serde_json::from_value(body)?)
  }
}

fn parse_trimmed(text: &str, trim_chars: usize) -> Result<Value, QueryError> {
  let body = match text.char_indices().nth(trim_chars) {
    Some((offset, _)) => &text[offset..],
    None => return Err(QueryError::malformed("response body shorter than its guard prefix")),
  };
  Ok(serde_json::from_str(body)?)
}

#[derive(Deserialize)]
struct RelatedSearchesBody {
  default: RankedLists,
}

#[derive(Deserialize)]
struct RankedLists {
  #[serde(rename = "rankedList", default)]
  ranked_list: Vec<RankedList>,
}

#[derive(Deserialize)]
struct RankedList {
  #[serde(rename = "rankedKeyword", default)]
  ranked_keyword: Vec<RankedQuery>,
}

fn parse_related(keyword: String, body: Value) -> Result<RelatedQueries, QueryError> {
  let body: RelatedSearchesBody = serde_json::from_value(body)?;
  let mut lists = body.default.ranked_list.into_iter().map(|l| l.ranked_keyword);

  // An empty list has no query/value columns at all
  let top = lists.next().filter(|l| !l.is_empty());
  let rising = lists.next().filter(|l| !l.is_empty());

  Ok(RelatedQueries { keyword, top, rising })
}

#[derive(Deserialize)]
struct MultilineBody {
  default: Timeline,
}

#[derive(Deserialize)]
struct Timeline {
  #[serde(rename = "timelineData", default)]
  timeline_data: Vec<RawPoint>,
}

#[derive(Deserialize)]
struct RawPoint {
  time: String,
  value: Vec<u32>,
  #[serde(rename = "isPartial", default)]
  is_partial: bool,
}

fn parse_timeline(keywords: &[String], body: Value) -> Result<InterestFrame, QueryError> {
  let body: MultilineBody = serde_json::from_value(body)?;
  if body.default.timeline_data.is_empty() {
    return Ok(InterestFrame::default());
  }

  let mut points = Vec::with_capacity(body.default.timeline_data.len());
  for raw in body.default.timeline_data {
    if raw.value.len() != keywords.len() {
      return Err(QueryError::malformed(format!(
        "timeline point carries {} values for {} keywords",
        raw.value.len(),
        keywords.len()
      )));
    }
    let seconds: i64 = raw
      .time
      .parse()
      .map_err(|_| QueryError::malformed(format!("invalid timeline time '{}'", raw.time)))?;
    let timestamp = DateTime::from_timestamp(seconds, 0)
      .ok_or_else(|| QueryError::malformed(format!("timeline time {seconds} out of range")))?;

    points.push(TimelinePoint { timestamp, values: raw.value, is_partial: raw.is_partial });
  }

  Ok(InterestFrame { keywords: keywords.to_vec(), points })
}
