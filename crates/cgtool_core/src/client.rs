use std::env;
use std::thread::sleep;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, bail};
use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;

pub const NS_TEMPLATE: i32 = 10;
pub const NS_MODULE: i32 = 828;

const DEFAULT_API_URL: &str = "https://zh.wikipedia.org/w/api.php";
const DEFAULT_USER_AGENT: &str = "cgtool/0.1 (conversion-group sync)";

/// One candidate page from a prefix search, carrying the fields the
/// enumeration filters need.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub title: String,
    pub size: u64,
    pub snippet: String,
}

/// The page-source capability the pipeline depends on: filtered candidate
/// enumeration and raw wikitext fetch. Tests substitute an in-memory fake.
pub trait PageSource {
    fn search(&mut self, query: &str, namespace: i32) -> Result<Vec<SearchHit>>;
    fn page_text(&mut self, title: &str) -> Result<String>;
    fn request_count(&self) -> usize;
}

#[derive(Debug, Clone)]
pub struct MediaWikiClientConfig {
    pub api_url: String,
    pub user_agent: String,
    pub timeout_ms: u64,
    pub rate_limit_ms: u64,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl MediaWikiClientConfig {
    pub fn from_env() -> Self {
        Self {
            api_url: env_value("CGTOOL_API_URL", DEFAULT_API_URL),
            user_agent: env_value("CGTOOL_USER_AGENT", DEFAULT_USER_AGENT),
            timeout_ms: env_value_u64("CGTOOL_HTTP_TIMEOUT_MS", 30_000),
            rate_limit_ms: env_value_u64("CGTOOL_RATE_LIMIT_MS", 300),
            max_retries: env_value_usize("CGTOOL_HTTP_RETRIES", 2),
            retry_delay_ms: env_value_u64("CGTOOL_HTTP_RETRY_DELAY_MS", 500),
        }
    }
}

pub struct MediaWikiClient {
    client: Client,
    config: MediaWikiClientConfig,
    last_request_at: Option<Instant>,
    request_count: usize,
}

impl MediaWikiClient {
    pub fn from_env() -> Result<Self> {
        Self::new(MediaWikiClientConfig::from_env())
    }

    pub fn new(config: MediaWikiClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("failed to build MediaWiki HTTP client")?;
        Ok(Self {
            client,
            config,
            last_request_at: None,
            request_count: 0,
        })
    }

    fn request_json(&mut self, params: &[(&str, String)]) -> Result<Value> {
        let base_url = Url::parse(&self.config.api_url)
            .with_context(|| format!("invalid CGTOOL_API_URL: {}", self.config.api_url))?;

        let mut pairs = Vec::with_capacity(params.len() + 2);
        pairs.push(("format".to_string(), "json".to_string()));
        pairs.push(("formatversion".to_string(), "2".to_string()));
        for (key, value) in params {
            if !value.is_empty() {
                pairs.push(((*key).to_string(), value.clone()));
            }
        }

        for attempt in 0..=self.config.max_retries {
            self.apply_rate_limit();
            let response = self
                .client
                .get(base_url.clone())
                .header("User-Agent", self.config.user_agent.clone())
                .query(&pairs)
                .send();

            match response {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        if attempt < self.config.max_retries && is_retryable_status(status) {
                            self.wait_before_retry(attempt);
                            continue;
                        }
                        bail!("MediaWiki API request failed with HTTP {status}");
                    }

                    let payload: Value = response
                        .json()
                        .context("failed to decode MediaWiki API JSON response")?;
                    if let Some(error) = payload.get("error") {
                        let code = error
                            .get("code")
                            .and_then(Value::as_str)
                            .unwrap_or("unknown_error");
                        let info = error
                            .get("info")
                            .and_then(Value::as_str)
                            .unwrap_or("unknown info");
                        bail!("MediaWiki API error [{code}]: {info}");
                    }
                    return Ok(payload);
                }
                Err(error) => {
                    if attempt < self.config.max_retries && is_retryable_error(&error) {
                        self.wait_before_retry(attempt);
                        continue;
                    }
                    return Err(error).context("failed to call MediaWiki API");
                }
            }
        }

        bail!("MediaWiki API request exhausted retry budget")
    }

    fn apply_rate_limit(&mut self) {
        let delay = Duration::from_millis(self.config.rate_limit_ms);
        if let Some(last) = self.last_request_at {
            let elapsed = last.elapsed();
            if elapsed < delay {
                sleep(delay - elapsed);
            }
        }
        self.last_request_at = Some(Instant::now());
        self.request_count += 1;
    }

    fn wait_before_retry(&self, attempt: usize) {
        let exponent = u32::try_from(attempt).unwrap_or(16);
        let base = self
            .config
            .retry_delay_ms
            .saturating_mul(2u64.saturating_pow(exponent));
        let jitter = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| u64::from(duration.subsec_millis() % 100))
            .unwrap_or(0);
        sleep(Duration::from_millis(base.saturating_add(jitter)));
    }
}

impl PageSource for MediaWikiClient {
    fn search(&mut self, query: &str, namespace: i32) -> Result<Vec<SearchHit>> {
        let mut hits = Vec::new();
        let mut offset: Option<u64> = None;

        loop {
            let mut params = vec![
                ("action", "query".to_string()),
                ("list", "search".to_string()),
                ("srsearch", query.to_string()),
                ("srnamespace", namespace.to_string()),
                ("srprop", "size|snippet".to_string()),
                ("srlimit", "500".to_string()),
            ];
            if let Some(offset) = offset {
                params.push(("sroffset", offset.to_string()));
            }

            let response = self.request_json(&params)?;
            let parsed: QueryResponse =
                serde_json::from_value(response).context("failed to decode search API response")?;
            for item in parsed.query.search {
                hits.push(SearchHit {
                    title: item.title,
                    size: item.size.unwrap_or(0),
                    snippet: strip_search_markup(&item.snippet.unwrap_or_default()),
                });
            }

            offset = parsed.continuation.and_then(|cont| cont.sroffset);
            if offset.is_none() {
                break;
            }
        }

        Ok(hits)
    }

    fn page_text(&mut self, title: &str) -> Result<String> {
        let params = vec![
            ("action", "query".to_string()),
            ("titles", title.to_string()),
            ("prop", "revisions".to_string()),
            ("rvprop", "content".to_string()),
            ("rvslots", "main".to_string()),
        ];
        let response = self.request_json(&params)?;
        let parsed: QueryResponse = serde_json::from_value(response)
            .context("failed to decode page content API response")?;

        let page = parsed
            .query
            .pages
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("no page returned for {title}"))?;
        if page.missing.unwrap_or(false) {
            bail!("page does not exist: {title}");
        }
        let revision = page
            .revisions
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("no revision returned for {title}"))?;
        revision
            .slots
            .and_then(|slots| slots.main)
            .map(|slot| slot.content)
            .ok_or_else(|| anyhow::anyhow!("no main slot content for {title}"))
    }

    fn request_count(&self) -> usize {
        self.request_count
    }
}

// Search snippets arrive with <span class="searchmatch"> highlighting; the
// redirect filters match on plain text.
pub fn strip_search_markup(snippet: &str) -> String {
    let mut output = String::with_capacity(snippet.len());
    let mut in_tag = false;
    for ch in snippet.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            ch if !in_tag => output.push(ch),
            _ => {}
        }
    }
    output
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

fn env_value(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_value_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

fn env_value_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    query: QueryBody,
    #[serde(rename = "continue")]
    continuation: Option<Continuation>,
}

#[derive(Debug, Default, Deserialize)]
struct QueryBody {
    #[serde(default)]
    search: Vec<SearchItem>,
    #[serde(default)]
    pages: Vec<PageItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    title: String,
    size: Option<u64>,
    snippet: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Continuation {
    sroffset: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct PageItem {
    #[allow(dead_code)]
    title: Option<String>,
    missing: Option<bool>,
    #[serde(default)]
    revisions: Vec<Revision>,
}

#[derive(Debug, Deserialize)]
struct Revision {
    slots: Option<Slots>,
}

#[derive(Debug, Deserialize)]
struct Slots {
    main: Option<Slot>,
}

#[derive(Debug, Deserialize)]
struct Slot {
    content: String,
}
