//! Google Calendar v3 REST client.
//!
//! Calls are made with async `reqwest` on a private current-thread runtime
//! so the [`CalendarService`] surface stays blocking.

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::runtime::Runtime;
use url::Url;

use super::service::{CalendarDirectory, CalendarService};
use super::types::{MirroredEventDraft, SourceEvent};
use crate::error::CalendarError;

/// One page of a list response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CalendarListEntry {
    id: String,
    #[serde(default)]
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedEvent {
    id: Option<String>,
}

/// Google Calendar API client.
pub struct GoogleCalendarClient {
    http: Client,
    runtime: Runtime,
    api_base: Url,
    access_token: String,
}

impl GoogleCalendarClient {
    /// Create a client for `api_base` (normally
    /// `https://www.googleapis.com/calendar/v3`) using a bearer token.
    pub fn new(api_base: &str, access_token: impl Into<String>) -> Result<Self, CalendarError> {
        let api_base =
            Url::parse(api_base).map_err(|e| CalendarError::InvalidUrl(format!("{api_base}: {e}")))?;
        if api_base.cannot_be_a_base() {
            return Err(CalendarError::InvalidUrl(api_base.to_string()));
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            http: Client::new(),
            runtime,
            api_base,
            access_token: access_token.into(),
        })
    }

    /// Build `<api_base>/<segments...>` with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, CalendarError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| CalendarError::InvalidUrl(self.api_base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, CalendarError> {
        let request = request.bearer_auth(&self.access_token);
        self.runtime.block_on(execute(request))
    }

    fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, CalendarError> {
        let response = self.send(request)?;
        let body = self.runtime.block_on(response.bytes())?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Follow `nextPageToken` until the listing is exhausted.
    fn get_all_pages<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, CalendarError> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.http.get(url.clone()).query(query);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }
            let page: Page<T> = self.send_json(request)?;
            items.extend(page.items);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(items)
    }
}

async fn execute(request: RequestBuilder) -> Result<Response, CalendarError> {
    let response = request.send().await?;
    check_status(response).await
}

/// Turn a non-2xx response into [`CalendarError::Http`], preferring
/// Google's `error.message` over the raw body.
async fn check_status(response: Response) -> Result<Response, CalendarError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| {
            if body.is_empty() {
                status.canonical_reason().unwrap_or("unknown error").to_string()
            } else {
                body
            }
        });
    Err(CalendarError::Http {
        status: status.as_u16(),
        message,
    })
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl CalendarService for GoogleCalendarClient {
    fn list_calendars(&self) -> Result<CalendarDirectory, CalendarError> {
        let url = self.endpoint(&["users", "me", "calendarList"])?;
        let entries: Vec<CalendarListEntry> = self.get_all_pages(url, &[])?;

        let mut directory = CalendarDirectory::new();
        for entry in entries {
            if let Some(name) = entry.summary {
                directory.insert(&name, entry.id);
            }
        }
        Ok(directory)
    }

    fn list_events(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<SourceEvent>, CalendarError> {
        let url = self.endpoint(&["calendars", calendar_id, "events"])?;
        let query = [
            ("timeMin", rfc3339(time_min)),
            ("timeMax", rfc3339(time_max)),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
        ];
        self.get_all_pages(url, &query)
    }

    fn list_upcoming(
        &self,
        calendar_id: &str,
        from: DateTime<Utc>,
        max_results: usize,
    ) -> Result<Vec<SourceEvent>, CalendarError> {
        let url = self.endpoint(&["calendars", calendar_id, "events"])?;
        let request = self.http.get(url).query(&[
            ("timeMin", rfc3339(from)),
            ("maxResults", max_results.to_string()),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
        ]);
        let page: Page<SourceEvent> = self.send_json(request)?;
        Ok(page.items)
    }

    fn create_event(
        &self,
        calendar_id: &str,
        draft: &MirroredEventDraft,
    ) -> Result<String, CalendarError> {
        let url = self.endpoint(&["calendars", calendar_id, "events"])?;
        let created: CreatedEvent = self.send_json(self.http.post(url).json(draft))?;
        created.id.ok_or(CalendarError::MissingField("id"))
    }

    fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        draft: &MirroredEventDraft,
    ) -> Result<(), CalendarError> {
        let url = self.endpoint(&["calendars", calendar_id, "events", event_id])?;
        self.send(self.http.put(url).json(draft))?;
        Ok(())
    }

    fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), CalendarError> {
        let url = self.endpoint(&["calendars", calendar_id, "events", event_id])?;
        match self.send(self.http.delete(url)) {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }
}
