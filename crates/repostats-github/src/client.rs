use chrono::{DateTime, NaiveDate, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tokio::time::sleep;

use crate::{Error, Result};
use repostats_core::RepositoryRecord;

/// Tuning knobs for the search client and fetch loop.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Records requested per page; the search API caps this at 100.
    pub per_page: u8,
    /// The search API stops paginating past this many records per query,
    /// which is why the reported total can exceed what we actually fetch.
    pub max_records_per_query: u32,
    /// Attempts per page before the fetch gives up on its range.
    pub query_attempts: u32,
    /// Base delay for exponential backoff between attempts.
    pub retry_backoff: Duration,
    /// Longest we are willing to wait for a rate-limit window to reset.
    /// A reset further away than this is treated as exhausted quota.
    pub max_rate_limit_wait: Duration,
    /// Buffer size of the record channel between fetcher and consumer.
    pub channel_capacity: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            per_page: 100,
            max_records_per_query: 1000,
            query_attempts: 3,
            retry_backoff: Duration::from_secs(2),
            max_rate_limit_wait: Duration::from_secs(630),
            channel_capacity: 256,
        }
    }
}

/// Search qualifiers applied to every repository query.
#[derive(Debug, Clone)]
pub struct QueryFilters {
    /// Minimum repository size in KB, filtering out trivially small repos.
    pub min_size_kb: u32,
    /// Repositories must have strictly more stars than this.
    pub min_stars: u32,
    /// Only repositories created before this date, when set.
    pub created_before: Option<NaiveDate>,
}

impl Default for QueryFilters {
    fn default() -> Self {
        Self {
            min_size_kb: 30_000,
            min_stars: 1,
            created_before: None,
        }
    }
}

impl QueryFilters {
    /// Build the search qualifier string for repositories pushed on `date`.
    pub fn to_query(&self, date: NaiveDate) -> String {
        let mut query = format!(
            "pushed:{} is:public fork:false mirror:false archived:false size:>{} stars:>{}",
            date.format("%Y-%m-%d"),
            self.min_size_kb,
            self.min_stars,
        );
        if let Some(cutoff) = self.created_before {
            query.push_str(&format!(" created:<{}", cutoff.format("%Y-%m-%d")));
        }
        query
    }
}

/// One page of repository search results.
#[derive(Debug)]
pub struct SearchPage {
    /// Total matches the API reports for the query, independent of paging.
    pub total_count: u64,
    pub incomplete_results: bool,
    pub items: Vec<RepositoryRecord>,
}

enum Attempt {
    Ok(SearchPage),
    /// Rate limited; wait this long before trying again.
    Throttled(Duration),
    /// Transient failure worth another attempt.
    Retry(String),
}

/// Repository search client that honors GitHub's rate-limit headers and
/// retries transient failures with exponential backoff.
#[derive(Clone)]
pub struct SearchClient {
    http: reqwest::Client,
    base_url: String,
    config: FetchConfig,
}

impl SearchClient {
    pub fn new(base_url: impl Into<String>, token: &str, config: FetchConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("repostats"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        if !token.is_empty() {
            let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| anyhow::anyhow!("invalid GitHub token: {}", e))?;
            auth.set_sensitive(true);
            headers.insert(AUTHORIZATION, auth);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            config,
        })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch one page of repositories pushed on `date`.
    ///
    /// Transient failures and rate-limit pauses are absorbed here, bounded by
    /// `query_attempts`; only fatal conditions (rejected credential, quota
    /// with no reachable reset) surface as `Error::Fatal`.
    pub async fn search_pushed_on(
        &self,
        date: NaiveDate,
        filters: &QueryFilters,
        page: u32,
    ) -> Result<SearchPage> {
        let attempts = self.config.query_attempts.max(1);

        for attempt in 1..=attempts {
            match self.try_search(date, filters, page).await? {
                Attempt::Ok(result) => return Ok(result),
                Attempt::Throttled(wait) => {
                    if wait > self.config.max_rate_limit_wait {
                        return Err(Error::Fatal(format!(
                            "rate limit reset is {}s away, beyond the {}s wait budget",
                            wait.as_secs(),
                            self.config.max_rate_limit_wait.as_secs(),
                        )));
                    }
                    if attempt == attempts {
                        return Err(Error::Transient(format!(
                            "still rate limited after {} pauses",
                            attempts
                        )));
                    }
                    tracing::warn!(
                        "Rate limit hit for {} page {}, pausing {}s",
                        date,
                        page,
                        wait.as_secs()
                    );
                    sleep(wait).await;
                }
                Attempt::Retry(reason) => {
                    if attempt == attempts {
                        return Err(Error::Transient(reason));
                    }
                    let backoff = self.config.retry_backoff * 2u32.pow(attempt - 1);
                    tracing::warn!(
                        "Search for {} page {} failed ({}), retrying in {:?}",
                        date,
                        page,
                        reason,
                        backoff
                    );
                    sleep(backoff).await;
                }
            }
        }

        Err(Error::Transient("query attempts exhausted".to_string()))
    }

    async fn try_search(
        &self,
        date: NaiveDate,
        filters: &QueryFilters,
        page: u32,
    ) -> Result<Attempt> {
        let url = format!("{}/search/repositories", self.base_url);
        let query = filters.to_query(date);
        let per_page = self.config.per_page.to_string();
        let page_str = page.to_string();

        let response = match self
            .http
            .get(&url)
            .query(&[
                ("q", query.as_str()),
                ("sort", "updated"),
                ("order", "asc"),
                ("per_page", per_page.as_str()),
                ("page", page_str.as_str()),
            ])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Ok(Attempt::Retry(format!("request failed: {}", e))),
        };

        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::Fatal(
                "GitHub rejected the credential (401)".to_string(),
            ));
        }
        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            // Primary and secondary rate limits both land here; without any
            // reset information the request is simply forbidden.
            return match throttle_wait(&response) {
                Some(wait) => Ok(Attempt::Throttled(wait)),
                None => Err(Error::Fatal(format!("request forbidden ({})", status))),
            };
        }
        if status.is_server_error() {
            return Ok(Attempt::Retry(format!("server error ({})", status)));
        }
        if !status.is_success() {
            return Err(Error::Fatal(format!(
                "unexpected response status ({})",
                status
            )));
        }

        // If this response spent the last of the quota window, pause until
        // the advertised reset so the next request does not bounce.
        let quota_wait = remaining_quota_wait(&response);

        let body: SearchResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => return Ok(Attempt::Retry(format!("malformed response body: {}", e))),
        };

        if let Some(wait) = quota_wait {
            if wait > self.config.max_rate_limit_wait {
                return Err(Error::Fatal(format!(
                    "search quota exhausted, reset {}s away",
                    wait.as_secs()
                )));
            }
            tracing::warn!("Search quota spent, pausing {}s until reset", wait.as_secs());
            sleep(wait).await;
        }

        Ok(Attempt::Ok(body.into_page()))
    }
}

fn throttle_wait(response: &Response) -> Option<Duration> {
    if let Some(retry_after) = header_u64(response, "retry-after") {
        return Some(Duration::from_secs(retry_after.max(1)));
    }
    remaining_quota_wait(response)
}

fn remaining_quota_wait(response: &Response) -> Option<Duration> {
    if header_u64(response, "x-ratelimit-remaining")? > 0 {
        return None;
    }
    let reset = header_u64(response, "x-ratelimit-reset")?;
    let now = Utc::now().timestamp().max(0) as u64;
    Some(Duration::from_secs(reset.saturating_sub(now).max(1)))
}

fn header_u64(response: &Response, name: &str) -> Option<u64> {
    response.headers().get(name)?.to_str().ok()?.parse().ok()
}

#[derive(Deserialize)]
struct SearchResponse {
    total_count: u64,
    #[serde(default)]
    incomplete_results: bool,
    #[serde(default)]
    items: Vec<SearchItem>,
}

impl SearchResponse {
    fn into_page(self) -> SearchPage {
        SearchPage {
            total_count: self.total_count,
            incomplete_results: self.incomplete_results,
            items: self.items.into_iter().map(SearchItem::into_record).collect(),
        }
    }
}

#[derive(Deserialize)]
struct SearchItem {
    full_name: String,
    language: Option<String>,
    pushed_at: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    stargazers_count: u32,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl SearchItem {
    fn into_record(self) -> RepositoryRecord {
        RepositoryRecord {
            id: self.full_name,
            primary_language: self.language,
            pushed_at: self.pushed_at.or(self.created_at),
            star_count: self.stargazers_count,
            raw_metadata: self.extra,
        }
    }
}
