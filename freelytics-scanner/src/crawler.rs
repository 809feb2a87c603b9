use crate::assembler::{Assembler, AssemblyReport};
use crate::error::{Result, ScanError};
use crate::model::PageKind;
use crate::parser::{Selectors, parse_detail, parse_listing};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_USER_AGENT: &str = "FreeLytics/0.2 (https://github.com/freelytics/freelytics)";
pub const DEFAULT_MAX_PAGES: usize = 50;
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub type ProgressCallback = Arc<dyn Fn(PageKind, String) + Send + Sync>;

/// What to search for. Empty lists mean no filter on that dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub base_url: Option<String>,
    pub jobs: Vec<String>,
    pub locations: Vec<String>,
    pub contracts: Vec<String>,
}

impl SearchConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            ..Default::default()
        }
    }

    /// The parsed base url; it must be present and http(s).
    pub fn base_url(&self) -> Result<Url> {
        let raw = self
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ScanError::Config("search.base_url is not set".to_string()))?;

        let url = Url::parse(raw)
            .map_err(|e| ScanError::Config(format!("search.base_url '{}': {}", raw, e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ScanError::Config(format!(
                "search.base_url '{}' must use http or https",
                raw
            )));
        }
        Ok(url)
    }

    /// One listing url per keyword x location x contract combination.
    pub fn start_urls(&self) -> Result<Vec<String>> {
        let base = self.base_url()?;
        let jobs = dimension(&self.jobs);
        let locations = dimension(&self.locations);
        let contracts = dimension(&self.contracts);

        let mut seen = HashSet::new();
        let mut urls = Vec::new();
        for job in &jobs {
            for location in &locations {
                for contract in &contracts {
                    let pairs: Vec<(&str, &String)> = [
                        ("query", job.as_ref()),
                        ("locations", location.as_ref()),
                        ("contracts", contract.as_ref()),
                    ]
                    .into_iter()
                    .filter_map(|(key, value)| value.map(|v| (key, v)))
                    .collect();

                    let mut url = base.clone();
                    // An empty query_pairs_mut() would leave a trailing '?'
                    if !pairs.is_empty() {
                        url.query_pairs_mut().extend_pairs(pairs);
                    }
                    let url = url.to_string();
                    if seen.insert(url.clone()) {
                        urls.push(url);
                    }
                }
            }
        }
        Ok(urls)
    }
}

fn dimension(values: &[String]) -> Vec<Option<String>> {
    let values: Vec<Option<String>> = values
        .iter()
        .map(|v| v.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|v| !v.is_empty())
        .map(Some)
        .collect();
    if values.is_empty() { vec![None] } else { values }
}

/// Counters for one crawl run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlStats {
    pub listing_pages: usize,
    pub listing_failures: usize,
    pub stubs: usize,
    pub skipped_cards: usize,
    pub detail_pages: usize,
    pub detail_failures: usize,
    pub assembly: AssemblyReport,
}

/// Walks listing pages, fetches every job's detail page and feeds both to an [`Assembler`].
pub struct Spider {
    selectors: Arc<Selectors>,
    max_pages: usize,
    workers: usize,
    timeout_secs: u64,
    user_agent: String,
    progress_callback: Option<ProgressCallback>,
}

impl Spider {
    pub fn new() -> Self {
        Self {
            selectors: Arc::new(Selectors::default()),
            max_pages: DEFAULT_MAX_PAGES,
            workers: DEFAULT_WORKERS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            progress_callback: None,
        }
    }

    /// Page limit per start url.
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Maximum number of concurrent detail requests.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_selectors(mut self, selectors: Selectors) -> Self {
        self.selectors = Arc::new(selectors);
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs.max(1);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn build_client(&self) -> Result<Client> {
        let client = Client::builder()
            .user_agent(self.user_agent.as_str())
            .timeout(Duration::from_secs(self.timeout_secs))
            .connect_timeout(Duration::from_secs(self.timeout_secs.div_ceil(2)))
            .pool_max_idle_per_host(self.workers * 2)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(client)
    }

    /// Run one crawl and close the assembler.
    ///
    /// Fails when no listing page could be fetched, or when the sink fails.
    pub async fn crawl(&self, search: &SearchConfig, assembler: Arc<Assembler>) -> Result<CrawlStats> {
        let start_urls = search.start_urls()?;
        let client = self.build_client()?;
        info!(
            "Starting crawl of {} search url(s) with {} workers",
            start_urls.len(),
            self.workers
        );

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut details: JoinSet<Result<bool>> = JoinSet::new();
        let mut visited = HashSet::new();
        let mut requested = HashSet::new();
        let mut stats = CrawlStats::default();
        let mut last_error: Option<ScanError> = None;

        for start_url in start_urls {
            let mut next = Some(start_url);
            let mut pages = 0;

            while let Some(url) = next.take() {
                if pages >= self.max_pages {
                    info!("Page limit of {} reached, stopping pagination", self.max_pages);
                    break;
                }
                if !visited.insert(url.clone()) {
                    debug!("Listing {} already visited", url);
                    break;
                }
                pages += 1;

                if let Some(ref callback) = self.progress_callback {
                    callback(PageKind::Listing, url.clone());
                }

                let body = match fetch_html(&client, &url).await {
                    Ok(body) => body,
                    Err(e) => {
                        warn!("Failed to fetch listing {}: {}", url, e);
                        stats.listing_failures += 1;
                        last_error = Some(e);
                        continue;
                    }
                };

                let page = match parse_listing(&body, &url, &self.selectors) {
                    Ok(page) => page,
                    Err(e) => {
                        warn!("Failed to parse listing {}: {}", url, e);
                        stats.listing_failures += 1;
                        continue;
                    }
                };
                stats.listing_pages += 1;
                stats.stubs += page.stubs.len();
                stats.skipped_cards += page.skipped;

                for stub in page.stubs {
                    let job_url = stub.url.clone();
                    assembler.accept(stub)?;

                    if requested.insert(job_url.clone()) {
                        details.spawn(fetch_detail(
                            client.clone(),
                            job_url,
                            self.selectors.clone(),
                            assembler.clone(),
                            semaphore.clone(),
                            self.progress_callback.clone(),
                        ));
                    }
                }

                next = page.next_page;
            }
        }

        if stats.listing_pages == 0 {
            details.abort_all();
            return Err(match last_error {
                Some(e @ ScanError::HttpError(_)) => e,
                Some(e) => ScanError::ListingUnreachable(e.to_string()),
                None => ScanError::ListingUnreachable("no listing page could be parsed".to_string()),
            });
        }

        while let Some(joined) = details.join_next().await {
            match joined? {
                Ok(true) => stats.detail_pages += 1,
                Ok(false) => stats.detail_failures += 1,
                Err(e) => {
                    details.abort_all();
                    return Err(e);
                }
            }
        }

        stats.assembly = assembler.finish();
        info!(
            "Crawl complete: {} listing pages, {} detail pages, {} records",
            stats.listing_pages, stats.detail_pages, stats.assembly.emitted
        );
        Ok(stats)
    }
}

impl Default for Spider {
    fn default() -> Self {
        Self::new()
    }
}

async fn fetch_html(client: &Client, url: &str) -> Result<String> {
    debug!("Fetching {}", url);
    let response = client.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(ScanError::UnexpectedResponse(format!("{} returned {}", url, status)));
    }

    // Only parse HTML content
    let is_html = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.contains("text/html"))
        .unwrap_or(false);
    if !is_html {
        return Err(ScanError::UnexpectedResponse(format!("{} is not an HTML page", url)));
    }

    Ok(response.text().await?)
}

/// Fetch and merge one detail page. `Ok(false)` means the page was skipped.
async fn fetch_detail(
    client: Client,
    url: String,
    selectors: Arc<Selectors>,
    assembler: Arc<Assembler>,
    semaphore: Arc<Semaphore>,
    progress_callback: Option<ProgressCallback>,
) -> Result<bool> {
    let _permit = semaphore
        .acquire_owned()
        .await
        .map_err(|e| ScanError::Other(format!("Worker pool closed: {}", e)))?;

    if let Some(ref callback) = progress_callback {
        callback(PageKind::Detail, url.clone());
    }

    let body = match fetch_html(&client, &url).await {
        Ok(body) => body,
        Err(e) => {
            warn!("Skipping detail {}: {}", url, e);
            return Ok(false);
        }
    };

    let detail = match parse_detail(&body, &url, &selectors) {
        Ok(Some(detail)) => detail,
        Ok(None) => {
            warn!("Skipping detail {}: no job content found", url);
            return Ok(false);
        }
        Err(e) => {
            warn!("Skipping detail {}: {}", url, e);
            return Ok(false);
        }
    };

    assembler.accept(detail)?;
    Ok(true)
}
