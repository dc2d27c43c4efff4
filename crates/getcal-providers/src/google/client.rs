//! Google Calendar API client.
//!
//! One `events.list` request per run. Recurring events are expanded on the
//! server and results come back sorted by start time.

use getcal_core::{DayWindow, EventRecord, EventStart};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{BoxFuture, EventSource};

use super::tokens::TokenInfo;

const CALENDAR_API: &str = "https://www.googleapis.com/calendar/v3";

/// Largest page size the events.list endpoint accepts.
const MAX_RESULTS: u32 = 2500;

/// Reads events from one calendar with a bearer token.
#[derive(Debug)]
pub struct GoogleCalendarClient {
    http: reqwest::Client,
    access_token: String,
    calendar_id: String,
}

impl GoogleCalendarClient {
    /// Creates a client for `calendar_id` using the given access token.
    pub fn new(
        access_token: impl Into<String>,
        calendar_id: impl Into<String>,
        user_agent: &str,
    ) -> ProviderResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| ProviderError::internal("cannot build HTTP client").with_source(e))?;

        Ok(Self {
            http,
            access_token: access_token.into(),
            calendar_id: calendar_id.into(),
        })
    }

    /// Uses the access token of a stored credential.
    pub fn from_token(
        token: &TokenInfo,
        calendar_id: impl Into<String>,
        user_agent: &str,
    ) -> ProviderResult<Self> {
        Self::new(token.access_token.clone(), calendar_id, user_agent)
    }

    /// Lists the events starting in `window`, in the order the API returns them.
    pub async fn list_day(&self, window: &DayWindow) -> ProviderResult<Vec<EventRecord>> {
        let url = format!(
            "{}/calendars/{}/events",
            CALENDAR_API,
            urlencoding::encode(&self.calendar_id)
        );
        let query = build_query(window);
        debug!(calendar = %self.calendar_id, ?query, "events.list");

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&query)
            .send()
            .await
            .map_err(|e| {
                let what = if e.is_connect() { "cannot connect" } else { "request failed" };
                ProviderError::network(format!("{}: {}", what, e)).with_source(e)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ProviderError::network(format!("cannot read events response: {}", e)).with_source(e)
        })?;

        if !status.is_success() {
            return Err(status_error(status, &body).with_provider("google"));
        }

        let events = parse_event_list(&body)?;
        debug!(count = events.len(), "events received");
        Ok(events)
    }
}

impl EventSource for GoogleCalendarClient {
    fn fetch_day<'a>(
        &'a self,
        window: &'a DayWindow,
    ) -> BoxFuture<'a, ProviderResult<Vec<EventRecord>>> {
        Box::pin(self.list_day(window))
    }
}

/// Query parameters for the day's `events.list` request.
fn build_query(window: &DayWindow) -> Vec<(&'static str, String)> {
    vec![
        ("timeMin", window.time_min()),
        ("timeMax", window.time_max()),
        ("singleEvents", "true".to_string()),
        ("orderBy", "startTime".to_string()),
        ("maxResults", MAX_RESULTS.to_string()),
    ]
}

fn status_error(status: StatusCode, body: &str) -> ProviderError {
    let detail = ApiErrorBody::message(body);
    let build: fn(String) -> ProviderError = match status {
        StatusCode::UNAUTHORIZED => ProviderError::authentication,
        StatusCode::FORBIDDEN => ProviderError::authorization,
        StatusCode::TOO_MANY_REQUESTS => ProviderError::rate_limited,
        _ => ProviderError::server,
    };
    build(format!("HTTP {}: {}", status, detail))
}

/// `{"error": {"code": 403, "message": "..."}}`
#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl ApiErrorBody {
    fn message(body: &str) -> String {
        serde_json::from_str::<Self>(body)
            .map(|parsed| parsed.error.message)
            .unwrap_or_else(|_| body.trim().to_string())
    }
}

/// Decodes an `events.list` body into records, keeping the API's order.
fn parse_event_list(body: &str) -> ProviderResult<Vec<EventRecord>> {
    let list: EventListResponse = serde_json::from_str(body).map_err(|e| {
        ProviderError::invalid_response(format!("events response does not decode: {}", e))
            .with_provider("google")
    })?;

    if list.next_page_token.is_some() {
        warn!(
            max_results = MAX_RESULTS,
            "more events than fit in one page, only the first page is used"
        );
    }

    let records: Vec<EventRecord> = list.items.into_iter().map(ApiEvent::into_record).collect();
    for record in &records {
        debug!(id = record.id.as_deref().unwrap_or("-"), start = ?record.start, "event");
    }
    Ok(records)
}

/// Response from the events.list endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<ApiEvent>,
    next_page_token: Option<String>,
}

/// A single event from the Google Calendar API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEvent {
    id: Option<String>,
    summary: Option<String>,
    #[serde(default)]
    start: ApiEventTime,
    html_link: Option<String>,
}

impl ApiEvent {
    fn into_record(self) -> EventRecord {
        EventRecord {
            id: self.id,
            start: EventStart::from_parts(self.start.date_time, self.start.date),
            summary: self.summary,
            html_link: self.html_link,
        }
    }
}

/// Event time from the API.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    date: Option<String>,
    date_time: Option<String>,
}
