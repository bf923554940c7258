//! Website fetching and regex-based HTML extraction.

use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::ScraperConfig;
use crate::error::{Result, StudioError};
use crate::interfaces::scraper::PageFetcher;
use crate::text::{collapse_whitespace, ranked_keywords, split_list};

const MAX_PARAGRAPHS: usize = 20;
const MAX_PARAGRAPH_CHARS: usize = 500;

static SCRIPT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style|noscript|template)\b[^>]*>.*?</(script|style|noscript|template)\s*>")
        .expect("valid script regex")
});
static COMMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid comment regex"));
static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title\b[^>]*>(.*?)</title\s*>").expect("valid title regex"));
static META_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<meta\b([^>]*)>").expect("valid meta regex"));
static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)([a-z:-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid attribute regex")
});
static HEADING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<h([1-3])\b[^>]*>(.*?)</h[1-3]\s*>").expect("valid heading regex")
});
static PARAGRAPH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<p\b[^>]*>(.*?)</p\s*>").expect("valid paragraph regex"));
static ANCHOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<a\b[^>]*\bhref\s*=").expect("valid anchor regex"));
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag regex"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordCount {
    pub word: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebsiteAnalysis {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub meta_keywords: Vec<String>,
    pub headings: Vec<Heading>,
    pub paragraphs: Vec<String>,
    pub link_count: usize,
    pub keywords: Vec<KeywordCount>,
}

impl WebsiteAnalysis {
    /// Ranked body keywords plus declared meta keywords, lowercased.
    pub fn keyword_set(&self) -> BTreeSet<String> {
        self.keywords
            .iter()
            .map(|keyword| keyword.word.clone())
            .chain(self.meta_keywords.iter().map(|keyword| keyword.to_lowercase()))
            .collect()
    }

    pub fn corpus(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(title) = &self.title {
            parts.push(title);
        }
        if let Some(description) = &self.description {
            parts.push(description);
        }
        parts.extend(self.headings.iter().map(|heading| heading.text.as_str()));
        parts.extend(self.paragraphs.iter().map(String::as_str));
        parts.join("\n")
    }
}

pub fn validate_url(url: &str) -> Result<reqwest::Url> {
    let parsed = reqwest::Url::parse(url.trim())
        .map_err(|e| StudioError::Validation(format!("invalid url `{url}`: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(StudioError::Validation(format!(
                "unsupported url scheme `{other}`; use http or https"
            )))
        }
    }
    if parsed.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(StudioError::Validation(format!("url `{url}` has no host")));
    }
    Ok(parsed)
}

pub fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

/// Tag-stripped, entity-decoded, whitespace-collapsed text of an HTML fragment.
pub fn strip_tags(fragment: &str) -> String {
    let without_tags = TAG_RE.replace_all(fragment, " ");
    collapse_whitespace(&decode_entities(&without_tags))
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].trim_end().to_string(),
        None => text.to_string(),
    }
}

fn meta_content(html: &str, wanted: &str) -> Option<String> {
    for meta in META_RE.captures_iter(html) {
        let attrs = &meta[1];
        let mut key = None;
        let mut content = None;
        for attr in ATTR_RE.captures_iter(attrs) {
            let name = attr[1].to_ascii_lowercase();
            let value = attr
                .get(2)
                .or_else(|| attr.get(3))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            match name.as_str() {
                "name" | "property" => key = Some(value.to_ascii_lowercase()),
                "content" => content = Some(value),
                _ => {}
            }
        }
        if key.as_deref() == Some(wanted) {
            return content
                .map(|value| collapse_whitespace(&decode_entities(&value)))
                .filter(|value| !value.is_empty());
        }
    }
    None
}

/// Extracts structure and keywords from raw HTML. Never fails: missing
/// elements produce empty fields.
pub fn analyze_html(url: &str, html: &str, top_keywords: usize) -> WebsiteAnalysis {
    let cleaned = COMMENT_RE.replace_all(html, " ");
    let cleaned = SCRIPT_RE.replace_all(&cleaned, " ");

    let title = TITLE_RE
        .captures(&cleaned)
        .map(|caps| strip_tags(&caps[1]))
        .filter(|title| !title.is_empty());
    let description = meta_content(&cleaned, "description")
        .or_else(|| meta_content(&cleaned, "og:description"));
    let meta_keywords = meta_content(&cleaned, "keywords")
        .map(|raw| split_list(&raw))
        .unwrap_or_default();

    let headings: Vec<Heading> = HEADING_RE
        .captures_iter(&cleaned)
        .filter_map(|caps| {
            let level = caps[1].parse::<u8>().ok()?;
            let text = strip_tags(&caps[2]);
            (!text.is_empty()).then_some(Heading { level, text })
        })
        .collect();

    let all_paragraphs: Vec<String> = PARAGRAPH_RE
        .captures_iter(&cleaned)
        .map(|caps| strip_tags(&caps[1]))
        .filter(|text| !text.is_empty())
        .collect();

    let link_count = ANCHOR_RE.find_iter(&cleaned).count();

    let mut corpus = String::new();
    for part in title.iter().chain(description.iter()) {
        corpus.push_str(part);
        corpus.push('\n');
    }
    for heading in &headings {
        corpus.push_str(&heading.text);
        corpus.push('\n');
    }
    for paragraph in &all_paragraphs {
        corpus.push_str(paragraph);
        corpus.push('\n');
    }
    let keywords = ranked_keywords(&corpus, top_keywords)
        .into_iter()
        .map(|(word, count)| KeywordCount { word, count })
        .collect();

    WebsiteAnalysis {
        url: url.to_string(),
        title,
        description,
        meta_keywords,
        headings,
        paragraphs: all_paragraphs
            .iter()
            .take(MAX_PARAGRAPHS)
            .map(|paragraph| truncate_chars(paragraph, MAX_PARAGRAPH_CHARS))
            .collect(),
        link_count,
        keywords,
    }
}

/// `reqwest` fetcher with timeout, user agent and retry on transport
/// failures and 5xx responses.
pub struct HttpFetcher {
    client: reqwest::Client,
    max_attempts: u32,
    backoff: Duration,
}

impl HttpFetcher {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| StudioError::Http(e.to_string()))?;
        Ok(Self {
            client,
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_millis(200),
        })
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let mut last_error = None;
        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                tokio::time::sleep(self.backoff * attempt).await;
            }
            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .text()
                            .await
                            .map_err(|e| StudioError::Http(format!("read {url} failed: {e}")));
                    }
                    let err = StudioError::Http(format!("GET {url} returned {status}"));
                    if !status.is_server_error() {
                        return Err(err);
                    }
                    tracing::warn!(url, attempt, %status, "Retrying page fetch");
                    last_error = Some(err);
                }
                Err(err) => {
                    tracing::warn!(url, attempt, "Page fetch transport error: {}", err);
                    last_error = Some(StudioError::Http(format!("GET {url} failed: {err}")));
                }
            }
        }
        Err(last_error.unwrap_or_else(|| StudioError::Http(format!("GET {url} failed"))))
    }
}

pub struct WebsiteAnalyzer {
    fetcher: Arc<dyn PageFetcher>,
    cache: Mutex<LruCache<String, WebsiteAnalysis>>,
    top_keywords: usize,
}

impl WebsiteAnalyzer {
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: &ScraperConfig) -> Self {
        let capacity = NonZeroUsize::new(config.cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            fetcher,
            cache: Mutex::new(LruCache::new(capacity)),
            top_keywords: config.top_keywords.max(1),
        }
    }

    pub fn from_config(config: &ScraperConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(HttpFetcher::new(config)?), config))
    }

    pub async fn analyze(&self, url: &str) -> Result<WebsiteAnalysis> {
        let url = validate_url(url)?.to_string();
        if let Some(cached) = self.cache.lock().await.get(&url).cloned() {
            tracing::debug!(url = %url, "Website analysis cache hit");
            return Ok(cached);
        }

        let html = self.fetcher.fetch(&url).await?;
        let analysis = analyze_html(&url, &html, self.top_keywords);
        tracing::info!(
            url = %url,
            headings = analysis.headings.len(),
            keywords = analysis.keywords.len(),
            "Analyzed website"
        );
        self.cache.lock().await.put(url, analysis.clone());
        Ok(analysis)
    }

    pub async fn invalidate(&self, url: &str) {
        if let Ok(url) = validate_url(url) {
            self.cache.lock().await.pop(url.as_str());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PAGE: &str = r#"<!doctype html>
<html><head>
  <title>Acme &amp; Sons | Safe Banking</title>
  <meta name="description" content="Simple, secure banking for   families.">
  <meta name='keywords' content='Safe, Trusted, family'>
  <style>.hero { color: red; }</style>
  <script>var secure = "not text";</script>
</head><body>
  <!-- <p>hidden comment paragraph</p> -->
  <h1>Banking that keeps you <em>safe</em></h1>
  <h2>Trusted by 10,000 families</h2>
  <h4>ignored level</h4>
  <p class="lead">Open an account in minutes. Safe, simple and <a href="/pricing">guaranteed</a>.</p>
  <p>   </p>
  <p>Our community support team is here every day.</p>
  <a href="/about">About</a>
</body></html>"#;

    struct FixtureFetcher {
        body: String,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PageFetcher for FixtureFetcher {
        async fn fetch(&self, _url: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.body.clone())
        }
    }

    #[test]
    fn extracts_title_meta_headings_and_paragraphs() {
        let analysis = analyze_html("https://acme.test/", PAGE, 10);
        assert_eq!(analysis.title.as_deref(), Some("Acme & Sons | Safe Banking"));
        assert_eq!(
            analysis.description.as_deref(),
            Some("Simple, secure banking for families.")
        );
        assert_eq!(analysis.meta_keywords, vec!["Safe", "Trusted", "family"]);
        assert_eq!(
            analysis.headings,
            vec![
                Heading {
                    level: 1,
                    text: "Banking that keeps you safe".to_string()
                },
                Heading {
                    level: 2,
                    text: "Trusted by 10,000 families".to_string()
                },
            ]
        );
        assert_eq!(analysis.paragraphs.len(), 2);
        assert!(analysis.paragraphs[0].ends_with("Safe, simple and guaranteed ."));
        assert_eq!(analysis.link_count, 2);
    }

    #[test]
    fn scripts_styles_and_comments_do_not_leak_into_keywords() {
        let analysis = analyze_html("https://acme.test/", PAGE, 50);
        let words = analysis.keyword_set();
        assert!(!words.contains("color"));
        assert!(!words.contains("hidden"));
        assert!(!words.contains("var"));
        assert_eq!(analysis.keywords[0].word, "banking");
        assert_eq!(analysis.keywords[1].word, "safe");
        assert_eq!(analysis.keywords[1].count, 3);
        assert!(words.contains("trusted"));
        assert!(words.contains("family"));
    }

    #[test]
    fn empty_document_yields_empty_analysis() {
        let analysis = analyze_html("https://blank.test/", "", 10);
        assert!(analysis.title.is_none());
        assert!(analysis.headings.is_empty());
        assert!(analysis.keywords.is_empty());
        assert!(analysis.corpus().is_empty());
    }

    #[test]
    fn long_paragraphs_are_truncated() {
        let body = format!("<p>{}</p>", "word ".repeat(400));
        let analysis = analyze_html("https://long.test/", &body, 5);
        assert!(analysis.paragraphs[0].chars().count() <= MAX_PARAGRAPH_CHARS);
    }

    #[test]
    fn rejects_non_http_urls() {
        assert!(validate_url("ftp://acme.test").is_err());
        assert!(validate_url("acme.test").is_err());
        assert!(validate_url("https://acme.test/path").is_ok());
    }

    #[tokio::test]
    async fn analyzer_caches_by_url() {
        let fetcher = Arc::new(FixtureFetcher {
            body: PAGE.to_string(),
            calls: AtomicUsize::new(0),
        });
        let analyzer = WebsiteAnalyzer::new(fetcher.clone(), &ScraperConfig::default());
        let first = analyzer.analyze("https://acme.test").await.unwrap();
        let second = analyzer.analyze("https://acme.test/").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        analyzer.invalidate("https://acme.test/").await;
        analyzer.analyze("https://acme.test/").await.unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }
}
