use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use spider_client::shapes::request::{ReturnFormat, ReturnFormatHandling};
use spider_client::{RequestParams, Spider};
use tracing::{debug, warn};

use crate::error::{CrawlError, Result};

/// Source of rendered page HTML.
pub trait PageFetcher: Send + Sync + 'static {
    /// Load `url` and return its HTML once rendering has finished.
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String>> + Send;

    /// Pages currently open (loading or being read).
    fn open_pages(&self) -> usize;
}

/// Counts open pages. Each fetch holds a [`PageLease`] while it runs.
#[derive(Debug, Clone, Default)]
pub struct PageTracker {
    open: Arc<AtomicUsize>,
}

impl PageTracker {
    pub fn open(&self, url: &str) -> PageLease {
        self.open.fetch_add(1, Ordering::SeqCst);
        debug!(url = %url, "Opened page");
        PageLease {
            open: Arc::clone(&self.open),
            url: url.to_string(),
        }
    }

    pub fn count(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

/// Closes its page on drop, whichever way the fetch ends.
#[derive(Debug)]
pub struct PageLease {
    open: Arc<AtomicUsize>,
    url: String,
}

impl Drop for PageLease {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
        debug!(url = %self.url, "Closed page");
    }
}

/// Plain HTTP fetcher. Fine for server-rendered detail pages; the index
/// sidebar is populated client-side and needs [`SpiderFetcher`].
pub struct HttpFetcher {
    client: reqwest::Client,
    pages: PageTracker,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("api_doc_scraper/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CrawlError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            pages: PageTracker::default(),
        })
    }
}

impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let _page = self.pages.open(url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::fetch_status(url, status.as_u16()));
        }

        response.text().await.map_err(|e| request_error(url, e))
    }

    fn open_pages(&self) -> usize {
        self.pages.count()
    }
}

/// Only timeouts are worth retrying; connect and decode failures are not.
fn request_error(url: &str, e: reqwest::Error) -> CrawlError {
    if e.is_timeout() {
        CrawlError::fetch_transient(url, e)
    } else {
        CrawlError::fetch(url, e)
    }
}

/// Rendered fetch through spider.cloud, which runs page scripts before
/// returning the raw HTML.
pub struct SpiderFetcher {
    spider: Spider,
    pages: PageTracker,
}

impl SpiderFetcher {
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("SPIDER_API_KEY").map_err(|_| {
            CrawlError::Config("SPIDER_API_KEY environment variable must be set".into())
        })?;
        let spider = Spider::new(Some(api_key))
            .map_err(|e| CrawlError::Config(format!("failed to create Spider client: {}", e)))?;
        Ok(Self {
            spider,
            pages: PageTracker::default(),
        })
    }
}

impl PageFetcher for SpiderFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let _page = self.pages.open(url);

        let params = RequestParams {
            return_format: Some(ReturnFormatHandling::Single(ReturnFormat::Raw)),
            ..Default::default()
        };

        let response = self
            .spider
            .scrape_url(url, Some(params), "application/json")
            .await
            .map_err(|e| CrawlError::fetch(url, e))?;

        let parsed: serde_json::Value = match response.as_str() {
            Some(s) => serde_json::from_str(s).unwrap_or(response.clone()),
            None => response,
        };

        let first = parsed.as_array().and_then(|arr| arr.first());

        let status = first
            .and_then(|obj| obj.get("status"))
            .and_then(|s| s.as_u64())
            .and_then(|s| u16::try_from(s).ok());
        if let Some(status) = status {
            if !(200..300).contains(&status) {
                return Err(CrawlError::fetch_status(url, status));
            }
        }

        first
            .and_then(|obj| obj.get("content"))
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| CrawlError::fetch(url, "no content in spider response"))
    }

    fn open_pages(&self) -> usize {
        self.pages.count()
    }
}

/// Retries transient failures with exponential backoff. Not used by the
/// pipeline itself; callers opt in.
pub struct Retrying<F> {
    inner: F,
    max_retries: u32,
    base_backoff: Duration,
}

impl<F: PageFetcher> Retrying<F> {
    pub fn new(inner: F, max_retries: u32, base_backoff: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_backoff,
        }
    }
}

impl<F: PageFetcher> PageFetcher for Retrying<F> {
    async fn fetch(&self, url: &str) -> Result<String> {
        let mut attempt = 0;
        loop {
            match self.inner.fetch(url).await {
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let backoff = self.base_backoff * 2u32.pow(attempt);
                    warn!(
                        "Transient failure on {} (attempt {}/{}), backing off {:.1}s: {}",
                        url,
                        attempt + 1,
                        self.max_retries,
                        backoff.as_secs_f64(),
                        e
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    fn open_pages(&self) -> usize {
        self.inner.open_pages()
    }
}

/// In-memory pages for tests.
#[cfg(test)]
pub(crate) mod stub {
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct StaticFetcher {
        pages: HashMap<String, String>,
        delays: HashMap<String, Duration>,
        failing: HashSet<String>,
        tracker: PageTracker,
        pub peak_open: AtomicUsize,
        pub calls: Mutex<Vec<String>>,
    }

    impl StaticFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
            self.pages.insert(url.into(), html.into());
            self
        }

        pub fn fixture(self, url: impl Into<String>, name: &str) -> Self {
            let html = std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap();
            self.page(url, html)
        }

        pub fn delay(mut self, url: impl Into<String>, d: Duration) -> Self {
            self.delays.insert(url.into(), d);
            self
        }

        pub fn failing(mut self, url: impl Into<String>) -> Self {
            self.failing.insert(url.into());
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl PageFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<String> {
            let _page = self.tracker.open(url);
            self.peak_open.fetch_max(self.tracker.count(), Ordering::SeqCst);
            self.calls.lock().unwrap().push(url.to_string());

            if let Some(d) = self.delays.get(url) {
                tokio::time::sleep(*d).await;
            }
            if self.failing.contains(url) {
                return Err(CrawlError::fetch_status(url, 503));
            }
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| CrawlError::fetch_status(url, 404))
        }

        fn open_pages(&self) -> usize {
            self.tracker.count()
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::stub::StaticFetcher;
    use super::*;

    #[test]
    fn lease_releases_on_drop() {
        let tracker = PageTracker::default();
        {
            let _a = tracker.open("a");
            let _b = tracker.open("b");
            assert_eq!(tracker.count(), 2);
        }
        assert_eq!(tracker.count(), 0);
    }

    #[tokio::test]
    async fn failed_fetch_closes_its_page() {
        let f = StaticFetcher::new().failing("https://x/a.html");
        assert!(f.fetch("https://x/a.html").await.is_err());
        assert!(f.fetch("https://x/missing.html").await.is_err());
        assert_eq!(f.open_pages(), 0);
    }

    #[tokio::test]
    async fn retrying_gives_up_after_max_retries() {
        let f = Retrying::new(
            StaticFetcher::new().failing("https://x/a.html"),
            2,
            Duration::from_millis(1),
        );
        let err = f.fetch("https://x/a.html").await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(f.inner.call_count(), 3);
    }

    #[tokio::test]
    async fn retrying_does_not_retry_permanent_errors() {
        let f = Retrying::new(StaticFetcher::new(), 3, Duration::from_millis(1));
        assert!(f.fetch("https://x/missing.html").await.is_err());
        assert_eq!(f.inner.call_count(), 1);
    }

    #[tokio::test]
    async fn retrying_passes_through_success() {
        let f = Retrying::new(
            StaticFetcher::new().page("https://x/a.html", "<p>ok</p>"),
            3,
            Duration::from_millis(1),
        );
        assert_eq!(f.fetch("https://x/a.html").await.unwrap(), "<p>ok</p>");
    }

    /// Minimal HTTP/1.1 server on 127.0.0.1 answering by request path.
    async fn serve() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    let mut read = 0;
                    while !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf[read..]).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => read += n,
                        }
                    }
                    let request = String::from_utf8_lossy(&buf[..read]);
                    let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();

                    let (status, body) = match path.as_str() {
                        "/Mathf.html" => ("200 OK", "<h1>Mathf</h1>"),
                        "/busy.html" => ("503 Service Unavailable", "busy"),
                        "/slow.html" => {
                            tokio::time::sleep(Duration::from_secs(5)).await;
                            ("200 OK", "late")
                        }
                        _ => ("404 Not Found", "missing"),
                    };
                    let response = format!(
                        "HTTP/1.1 {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn http_fetcher_returns_page_body() {
        let base = serve().await;
        let f = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        let html = f.fetch(&format!("{}/Mathf.html", base)).await.unwrap();
        assert_eq!(html, "<h1>Mathf</h1>");
        assert_eq!(f.open_pages(), 0);
    }

    #[tokio::test]
    async fn http_fetcher_rejects_error_status() {
        let base = serve().await;
        let f = HttpFetcher::new(Duration::from_secs(5)).unwrap();

        let url = format!("{}/Unwrapping.GenerateSecondaryUVSet.html", base);
        let err = f.fetch(&url).await.unwrap_err();
        match &err {
            CrawlError::Fetch { url: failed, reason, transient } => {
                assert_eq!(failed, &url);
                assert_eq!(reason, "HTTP 404");
                assert!(!transient);
            }
            other => panic!("expected fetch error, got {:?}", other),
        }

        let err = f.fetch(&format!("{}/busy.html", base)).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(f.open_pages(), 0);
    }

    #[tokio::test]
    async fn http_fetcher_timeout_is_transient() {
        let base = serve().await;
        let f = HttpFetcher::new(Duration::from_millis(200)).unwrap();
        let err = f.fetch(&format!("{}/slow.html", base)).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(f.open_pages(), 0);
    }

    #[tokio::test]
    async fn http_fetcher_connect_failure_is_permanent() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let f = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        let err = f
            .fetch(&format!("http://{}/Iterate.GenerateTimeout.html", addr))
            .await
            .unwrap_err();
        assert!(matches!(err, CrawlError::Fetch { .. }));
        assert!(!err.is_transient());
        assert_eq!(f.open_pages(), 0);
    }
}
