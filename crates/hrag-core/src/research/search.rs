//! Web search and page fetching for the searcher node.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

/// Elements whose text makes up a fetched page.
pub const PAGE_SELECTOR: &str = "p, h1, h2, h3, li, td, article";

const RESULT_LINK_SELECTOR: &str = "a.result__a";
const DEFAULT_MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("search endpoint returned status {0}")]
    Status(u16),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("blocked URL: {0}")]
    Blocked(String),

    #[error("response too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },

    #[error("parse failed: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebPage {
    pub url: String,
    pub title: String,
    pub content: String,
}

pub trait WebSearch: Send + Sync {
    /// Up to `limit` result pages for `query`, fetched and reduced to text.
    ///
    /// Pages that cannot be fetched are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the search itself fails.
    fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<WebPage>, SearchError>> + Send;
}

/// Searches the `DuckDuckGo` HTML endpoint and fetches each result page.
#[derive(Debug, Clone)]
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    endpoint: String,
    max_body_bytes: usize,
    allow_private_hosts: bool,
}

impl DuckDuckGoSearch {
    #[must_use]
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: hrag_llm::http::default_client(timeout),
            endpoint: endpoint.into(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            allow_private_hosts: false,
        }
    }

    /// Permit fetching pages on loopback and private addresses.
    #[must_use]
    pub fn allow_private_hosts(mut self, allow: bool) -> Self {
        self.allow_private_hosts = allow;
        self
    }

    /// Largest response body read from the search endpoint or a result page.
    #[must_use]
    pub fn with_max_body_bytes(mut self, max: usize) -> Self {
        self.max_body_bytes = max;
        self
    }

    /// Read the body incrementally, giving up as soon as it passes the cap.
    async fn fetch_html(&self, url: &str) -> Result<String, SearchError> {
        let mut resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(SearchError::Status(resp.status().as_u16()));
        }
        let max = self.max_body_bytes;
        if let Some(declared) = resp.content_length() {
            let size = usize::try_from(declared).unwrap_or(usize::MAX);
            if size > max {
                return Err(SearchError::TooLarge { size, max });
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = resp.chunk().await? {
            let size = body.len() + chunk.len();
            if size > max {
                return Err(SearchError::TooLarge { size, max });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    async fn fetch_page(&self, url: &str) -> Result<Option<WebPage>, SearchError> {
        validate_url(url, self.allow_private_hosts)?;
        let html = self.fetch_html(url).await?;
        let url = url.to_owned();
        tokio::task::spawn_blocking(move || parse_page(url, &html))
            .await
            .map_err(|e| SearchError::Parse(e.to_string()))?
    }
}

impl WebSearch for DuckDuckGoSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<WebPage>, SearchError> {
        let search_url = Url::parse_with_params(&self.endpoint, &[("q", query)])
            .map_err(|e| SearchError::InvalidUrl(format!("{}: {e}", self.endpoint)))?;
        let html = self.fetch_html(search_url.as_str()).await?;
        let links = tokio::task::spawn_blocking(move || parse_result_links(&html, limit))
            .await
            .map_err(|e| SearchError::Parse(e.to_string()))??;
        tracing::info!(query = %query, results = links.len(), "web search finished");

        let fetched = futures::future::join_all(links.iter().map(|url| self.fetch_page(url))).await;
        let mut pages = Vec::with_capacity(fetched.len());
        for (url, result) in links.iter().zip(fetched) {
            match result {
                Ok(Some(page)) => pages.push(page),
                Ok(None) => tracing::debug!(url = %url, "page has no text content"),
                Err(e) => tracing::warn!(url = %url, "failed to fetch page: {e}"),
            }
        }
        Ok(pages)
    }
}

/// Result URLs in page order, unwrapped from `uddg=` redirect links.
///
/// # Errors
///
/// Returns [`SearchError::Parse`] if the result selector cannot be applied.
pub fn parse_result_links(html: &str, limit: usize) -> Result<Vec<String>, SearchError> {
    let soup = scrape_core::Soup::parse(html);
    let tags = soup
        .find_all(RESULT_LINK_SELECTOR)
        .map_err(|e| SearchError::Parse(format!("invalid selector: {e}")))?;

    let mut urls = Vec::new();
    for tag in tags {
        if urls.len() >= limit {
            break;
        }
        let Some(href) = tag.get("href") else {
            continue;
        };
        if let Some(target) = unwrap_redirect(href) {
            urls.push(target);
        } else if href.starts_with("http") {
            urls.push(href.to_owned());
        }
    }
    Ok(urls)
}

fn unwrap_redirect(href: &str) -> Option<String> {
    if !href.contains("uddg=") {
        return None;
    }
    let base = Url::parse("https://duckduckgo.com/").ok()?;
    let link = base.join(href).ok()?;
    link.query_pairs()
        .find(|(k, _)| k == "uddg")
        .map(|(_, v)| v.into_owned())
}

fn parse_page(url: String, html: &str) -> Result<Option<WebPage>, SearchError> {
    let content = hrag_memory::document::extract_html_text(html, PAGE_SELECTOR)
        .map_err(|e| SearchError::Parse(e.to_string()))?;
    if content.is_empty() {
        return Ok(None);
    }
    let title = hrag_memory::document::extract_html_text(html, "title")
        .map_err(|e| SearchError::Parse(e.to_string()))?
        .lines()
        .next()
        .unwrap_or_default()
        .to_owned();
    Ok(Some(WebPage {
        url,
        title,
        content,
    }))
}

fn validate_url(raw: &str, allow_private: bool) -> Result<(), SearchError> {
    let parsed = Url::parse(raw).map_err(|_| SearchError::InvalidUrl(raw.to_owned()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(SearchError::Blocked(format!(
            "scheme not allowed: {}",
            parsed.scheme()
        )));
    }
    if !allow_private
        && let Some(host) = parsed.host()
        && is_private_host(&host)
    {
        return Err(SearchError::Blocked(format!(
            "private/local host: {}",
            parsed.host_str().unwrap_or_default()
        )));
    }
    Ok(())
}

fn is_private_host(host: &url::Host<&str>) -> bool {
    match host {
        url::Host::Domain(d) => *d == "localhost",
        url::Host::Ipv4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
        }
        url::Host::Ipv6(v6) => {
            let seg = v6.segments();
            v6.is_loopback()
                || v6.is_unspecified()
                || seg[0] & 0xffc0 == 0xfe80
                || seg[0] & 0xfe00 == 0xfc00
                || v6.to_ipv4_mapped().is_some_and(|v4| {
                    v4.is_loopback() || v4.is_private() || v4.is_link_local()
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const RESULTS: &str = r#"<html><body>
        <div class="result"><a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fa%3Fx%3D1&rut=abc">A</a></div>
        <div class="result"><a class="result__a" href="https://example.org/b">B</a></div>
        <div class="result"><a class="result__a" href="/relative">C</a></div>
        <div class="result"><a class="result__a" href="https://example.net/c">D</a></div>
        <a class="other" href="https://ignored.example/">ignored</a>
    </body></html>"#;

    #[test]
    fn result_links_are_unwrapped_and_limited() {
        let links = parse_result_links(RESULTS, 10).unwrap();
        assert_eq!(
            links,
            vec![
                "https://example.com/a?x=1",
                "https://example.org/b",
                "https://example.net/c"
            ]
        );
        assert_eq!(parse_result_links(RESULTS, 2).unwrap().len(), 2);
    }

    #[test]
    fn page_text_and_title_are_extracted() {
        let html = "<html><head><title>Rust 2024</title><script>var x;</script></head>\
                    <body><h1>Edition</h1><p>Let chains are stable.</p></body></html>";
        let page = parse_page("https://e.com".into(), html).unwrap().unwrap();
        assert_eq!(page.title, "Rust 2024");
        assert!(page.content.contains("Edition"));
        assert!(page.content.contains("Let chains are stable."));
        assert!(!page.content.contains("var x"));
    }

    #[test]
    fn empty_page_is_skipped() {
        let page = parse_page("https://e.com".into(), "<html><body></body></html>").unwrap();
        assert!(page.is_none());
    }

    #[test]
    fn private_hosts_are_blocked() {
        assert!(validate_url("http://127.0.0.1/x", false).is_err());
        assert!(validate_url("http://localhost/x", false).is_err());
        assert!(validate_url("http://10.0.0.5/", false).is_err());
        assert!(validate_url("ftp://example.com/", false).is_err());
        assert!(validate_url("https://example.com/", false).is_ok());
        assert!(validate_url("http://127.0.0.1/x", true).is_ok());
    }

    #[tokio::test]
    async fn search_fetches_result_pages() {
        let server = MockServer::start().await;
        let page_url = format!("{}/page", server.uri());
        let results = format!(
            r#"<a class="result__a" href="{page_url}">Page</a>
               <a class="result__a" href="{}/missing">Missing</a>"#,
            server.uri()
        );
        Mock::given(method("GET"))
            .and(path("/html/"))
            .and(query_param("q", "rust async"))
            .respond_with(ResponseTemplate::new(200).set_body_string(results))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<title>Async</title><p>Futures are lazy.</p>"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let search = DuckDuckGoSearch::new(format!("{}/html/", server.uri()), Duration::from_secs(5))
            .allow_private_hosts(true);
        let pages = search.search("rust async", 5).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].url, page_url);
        assert_eq!(pages[0].title, "Async");
        assert_eq!(pages[0].content, "Futures are lazy.");
    }

    #[tokio::test]
    async fn search_endpoint_failure_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let search = DuckDuckGoSearch::new(format!("{}/html/", server.uri()), Duration::from_secs(5));
        let err = search.search("q", 5).await.unwrap_err();
        assert!(matches!(err, SearchError::Status(503)));
    }

    #[tokio::test]
    async fn oversized_response_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/html/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(4096)))
            .mount(&server)
            .await;
        let search = DuckDuckGoSearch::new(format!("{}/html/", server.uri()), Duration::from_secs(5))
            .with_max_body_bytes(1024);
        let err = search.search("q", 5).await.unwrap_err();
        assert!(matches!(err, SearchError::TooLarge { max: 1024, size } if size > 1024));
    }

    #[tokio::test]
    async fn body_at_the_cap_is_accepted() {
        let server = MockServer::start().await;
        let results = r#"<a class="result__a" href="https://example.org/b">B</a>"#;
        Mock::given(method("GET"))
            .and(path("/html/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(results))
            .mount(&server)
            .await;
        let search = DuckDuckGoSearch::new(format!("{}/html/", server.uri()), Duration::from_secs(5))
            .with_max_body_bytes(results.len());
        let html = search
            .fetch_html(&format!("{}/html/", server.uri()))
            .await
            .unwrap();
        assert_eq!(html, results);
    }

    #[tokio::test]
    async fn private_result_pages_are_skipped_by_default() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/html/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                r#"<a class="result__a" href="{}/page">P</a>"#,
                server.uri()
            )))
            .mount(&server)
            .await;
        let search = DuckDuckGoSearch::new(format!("{}/html/", server.uri()), Duration::from_secs(5));
        assert!(search.search("q", 5).await.unwrap().is_empty());
    }
}
