//! `ScheduleClient` - broadcaster schedule API client implementation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Days, Local};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::instrument;
use url::Url;

use super::api::ScheduleSource;
use super::rate_limiter::RequestPacer;
use super::sitemap::parse_sitemap_slot_ids;
use super::types::{AudienceSample, Slot, Timetable};

/// Default media API base URL.
const DEFAULT_BASE_URL: &str = "https://api.abema.io/v1/";

/// Default slot sitemap URL.
const DEFAULT_SITEMAP_URL: &str = "https://abema.tv/sitemap-slots-0.xml";

/// Number of days requested by a full timetable fetch.
const DEFAULT_TIMETABLE_DAYS: u64 = 7;

/// Maximum number of retries for API requests.
const MAX_RETRIES: u32 = 3;

/// Default delay between retries.
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// `media/slots/{id}` response body.
#[derive(Debug, Deserialize)]
struct SlotResponse {
    slot: Slot,
}

/// `slotAudience` response body.
#[derive(Debug, Deserialize)]
struct AudienceResponse {
    #[serde(default)]
    list: Vec<AudienceSample>,
}

/// Broadcaster schedule API client.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct ScheduleClient {
    /// HTTP client (reqwest, gzip enabled).
    http_client: Client,
    /// Media API base URL (must end with `/`).
    base_url: Url,
    /// Slot sitemap URL.
    sitemap_url: Url,
    /// Bearer token for the media API.
    api_token: Option<String>,
    /// Days covered by a timetable fetch.
    timetable_days: u64,
    /// Delay between retries.
    retry_delay: Duration,
    /// Request pacer.
    pacer: Arc<Mutex<RequestPacer>>,
}

/// Builder for `ScheduleClient`.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct ScheduleClientBuilder {
    base_url: Option<Url>,
    sitemap_url: Option<Url>,
    user_agent: Option<String>,
    api_token: Option<String>,
    min_interval: Option<Duration>,
    retry_delay: Option<Duration>,
    timetable_days: Option<u64>,
}

impl ScheduleClientBuilder {
    /// Creates a new builder.
    const fn new() -> Self {
        Self {
            base_url: None,
            sitemap_url: None,
            user_agent: None,
            api_token: None,
            min_interval: None,
            retry_delay: None,
            timetable_days: None,
        }
    }

    /// Overrides the media API base URL (for wiremock in tests).
    #[must_use]
    pub fn base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Overrides the slot sitemap URL.
    #[must_use]
    pub fn sitemap_url(mut self, url: Url) -> Self {
        self.sitemap_url = Some(url);
        self
    }

    /// Sets the User-Agent (required).
    #[must_use]
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Sets the bearer token sent to the media API.
    #[must_use]
    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Sets the minimum request interval (default: 1s).
    #[must_use]
    pub const fn min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = Some(interval);
        self
    }

    /// Sets the delay between retries (default: 2s).
    #[must_use]
    pub const fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Sets the number of days covered by a timetable fetch (default: 7).
    #[must_use]
    pub const fn timetable_days(mut self, days: u64) -> Self {
        self.timetable_days = Some(days);
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// - `user_agent` is not set.
    /// - A default URL fails to parse.
    /// - `reqwest::Client` build fails.
    pub fn build(self) -> Result<ScheduleClient> {
        let user_agent = self.user_agent.context("user_agent is required")?;

        let base_url = match self.base_url {
            Some(url) => url,
            None => Url::parse(DEFAULT_BASE_URL).context("invalid default base URL")?,
        };
        let sitemap_url = match self.sitemap_url {
            Some(url) => url,
            None => Url::parse(DEFAULT_SITEMAP_URL).context("invalid default sitemap URL")?,
        };

        let http_client = Client::builder()
            .user_agent(&user_agent)
            .gzip(true)
            .build()
            .context("failed to build HTTP client")?;

        Ok(ScheduleClient {
            http_client,
            base_url,
            sitemap_url,
            api_token: self.api_token,
            timetable_days: self.timetable_days.unwrap_or(DEFAULT_TIMETABLE_DAYS).max(1),
            retry_delay: self.retry_delay.unwrap_or(RETRY_DELAY),
            pacer: Arc::new(Mutex::new(RequestPacer::new(
                self.min_interval.unwrap_or(Duration::from_secs(1)),
            ))),
        })
    }
}

impl ScheduleClient {
    /// Creates a new builder.
    #[must_use]
    pub const fn builder() -> ScheduleClientBuilder {
        ScheduleClientBuilder::new()
    }

    /// Resolves a path relative to the media API base URL.
    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("invalid endpoint path: {path}"))
    }

    /// Builds an authenticated GET request for the media API.
    fn api_get(&self, url: Url) -> reqwest::RequestBuilder {
        let req = self.http_client.get(url);
        match self.api_token {
            Some(ref token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Builds a JSON decode error with a preview of the response body.
    fn json_decode_error(command: &str, body: &str) -> String {
        format!(
            "{} JSON decoding failed (len={}): {}",
            command,
            body.len(),
            &body[..body.floor_char_boundary(500)]
        )
    }

    /// Parses a JSON response body.
    fn parse_json<T: DeserializeOwned>(command: &str, body: &str) -> Result<T> {
        let raw_result: std::result::Result<T, _> = serde_json::from_str(body);
        raw_result.with_context(|| Self::json_decode_error(command, body))
    }

    /// Sends a GET request with retry logic.
    ///
    /// Retries up to `MAX_RETRIES` times on transport errors, non-success
    /// statuses and parse failures, pacing every attempt. HTTP 429 honours
    /// the `Retry-After` header.
    async fn request_with_retry<T, F>(
        &self,
        command: &str,
        build_request: impl Fn() -> reqwest::RequestBuilder,
        parse: F,
    ) -> Result<T>
    where
        F: Fn(&str) -> Result<T>,
    {
        let mut last_err = None;

        for attempt in 0..=MAX_RETRIES {
            self.pacer.lock().await.wait().await;

            let response = match build_request().send().await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(%command, attempt, error = %e, "Request failed, will retry");
                    last_err =
                        Some(anyhow::Error::new(e).context(format!("{command} request failed")));
                    tokio::time::sleep(self.retry_delay).await;
                    continue;
                }
            };

            let status = response.status();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                let retry_after = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .map_or(self.retry_delay, Duration::from_secs);

                tracing::warn!(
                    %command,
                    attempt,
                    retry_after_secs = retry_after.as_secs(),
                    "Rate limited, waiting before retry"
                );
                last_err = Some(anyhow::anyhow!("{command} rate limited (HTTP {status})"));
                tokio::time::sleep(retry_after).await;
                continue;
            }

            if !status.is_success() {
                tracing::warn!(%command, attempt, code = status.as_u16(), "Unexpected status, will retry");
                last_err = Some(anyhow::anyhow!("{command} returned HTTP {status}"));
                tokio::time::sleep(self.retry_delay).await;
                continue;
            }

            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!(%command, attempt, error = %e, "Failed to read response body, will retry");
                    last_err = Some(
                        anyhow::Error::new(e).context(format!("failed to read {command} response")),
                    );
                    tokio::time::sleep(self.retry_delay).await;
                    continue;
                }
            };

            tracing::debug!(%command, body_len = body.len(), "Response body received");

            match parse(&body) {
                Ok(result) => return Ok(result),
                Err(e) => {
                    tracing::warn!(%command, attempt, error = %e, "Parse error, will retry");
                    last_err = Some(e);
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{command} failed after retries")))
    }
}

impl ScheduleSource for ScheduleClient {
    #[instrument(skip_all)]
    async fn fetch_timetable(&self) -> Result<Timetable> {
        let url = self.endpoint("media")?;
        let today = Local::now().date_naive();
        let last_day = today
            .checked_add_days(Days::new(self.timetable_days.saturating_sub(1)))
            .context("failed to compute timetable end date")?;
        let date_from = today.format("%Y%m%d").to_string();
        let date_to = last_day.format("%Y%m%d").to_string();

        let timetable: Timetable = self
            .request_with_retry(
                "Timetable",
                || {
                    self.api_get(url.clone())
                        .query(&[("dateFrom", &date_from), ("dateTo", &date_to)])
                },
                |body| Self::parse_json("Timetable", body),
            )
            .await?;

        tracing::info!(
            channels = timetable.channels.len(),
            slots = timetable.slots().count(),
            %date_from,
            %date_to,
            "Timetable fetched"
        );
        Ok(timetable)
    }

    #[instrument(skip(self))]
    async fn fetch_slot(&self, slot_id: &str) -> Result<Slot> {
        let url = self.endpoint(&format!("media/slots/{slot_id}"))?;

        self.request_with_retry(
            "SlotDetail",
            || self.api_get(url.clone()),
            |body| Self::parse_json::<SlotResponse>("SlotDetail", body).map(|r| r.slot),
        )
        .await
    }

    #[instrument(skip_all)]
    async fn fetch_sitemap_ids(&self) -> Result<Vec<String>> {
        self.request_with_retry(
            "Sitemap",
            || self.http_client.get(self.sitemap_url.clone()),
            parse_sitemap_slot_ids,
        )
        .await
    }

    #[instrument(skip_all, fields(slots = slot_ids.len()))]
    async fn fetch_audience(&self, slot_ids: &[String]) -> Result<Vec<AudienceSample>> {
        if slot_ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.endpoint("slotAudience")?;
        let id_list = slot_ids.join(",");

        self.request_with_retry(
            "SlotAudience",
            || {
                self.api_get(url.clone())
                    .query(&[("slotIdList", id_list.as_str())])
            },
            |body| Self::parse_json::<AudienceResponse>("SlotAudience", body).map(|r| r.list),
        )
        .await
    }
}
