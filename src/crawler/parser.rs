//! HTML link extraction
//!
//! This module turns a fetched HTML page into the list of links to follow.

use crate::crawler::fetcher::Document;
use crate::TaskError;
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::io;
use url::Url;

/// A fetched HTML page
#[derive(Debug, Clone)]
pub struct HtmlDocument {
    url: String,
    html: String,
}

impl HtmlDocument {
    /// Creates a document from its final URL and body
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Document for HtmlDocument {
    async fn extract_links(&self) -> Result<Vec<String>, TaskError> {
        let base_url = Url::parse(&self.url).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("cannot resolve links against {}: {}", self.url, e),
            )
        })?;
        Ok(parse_links(&self.html, &base_url))
    }
}

/// Extracts the links of an HTML page
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links and data URIs
/// - Fragment-only links
/// - Non-HTTP(S) URLs after resolution
///
/// Links are absolute, without fragment, deduplicated, in document order.
///
/// # Example
///
/// ```
/// use url::Url;
/// use wave_crawler::crawler::parse_links;
///
/// let html = r#"<html><body><a href="/page#top">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// assert_eq!(parse_links(html, &base_url), vec!["https://example.com/page"]);
/// ```
pub fn parse_links(html: &str, base_url: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    let mut push = |href: &str| {
        if let Some(absolute_url) = resolve_link(href, base_url) {
            if seen.insert(absolute_url.clone()) {
                links.push(absolute_url);
            }
        }
    };

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }
            if let Some(href) = element.value().attr("href") {
                push(href);
            }
        }
    }

    if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&canonical_selector) {
            if let Some(href) = element.value().attr("href") {
                push(href);
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded.
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    let mut absolute_url = base_url.join(href).ok()?;
    if absolute_url.scheme() != "http" && absolute_url.scheme() != "https" {
        return None;
    }
    absolute_url.set_fragment(None);
    Some(absolute_url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://example.com/page").unwrap()
    }

    #[test]
    fn test_extract_absolute_link() {
        let html = r#"<html><body><a href="https://other.com/page">Link</a></body></html>"#;
        assert_eq!(parse_links(html, &base_url()), vec!["https://other.com/page"]);
    }

    #[test]
    fn test_extract_relative_link() {
        let html = r#"<html><body><a href="/other">Link</a></body></html>"#;
        assert_eq!(parse_links(html, &base_url()), vec!["https://example.com/other"]);
    }

    #[test]
    fn test_extract_relative_path_link() {
        let html = r#"<html><body><a href="other">Link</a></body></html>"#;
        assert_eq!(parse_links(html, &base_url()), vec!["https://example.com/other"]);
    }

    #[test]
    fn test_skip_special_schemes() {
        let html = r#"<html><body>
            <a href="javascript:void(0)">JS</a>
            <a href="mailto:test@example.com">Email</a>
            <a href="tel:+1234567890">Call</a>
            <a href="data:text/html,<h1>Test</h1>">Data</a>
            <a href="ftp://example.com/file">FTP</a>
        </body></html>"#;
        assert!(parse_links(html, &base_url()).is_empty());
    }

    #[test]
    fn test_skip_download_link() {
        let html = r#"<html><body><a href="/file.pdf" download>Download</a></body></html>"#;
        assert!(parse_links(html, &base_url()).is_empty());
    }

    #[test]
    fn test_skip_fragment_only() {
        let html = r##"<html><body><a href="#section">Jump</a></body></html>"##;
        assert!(parse_links(html, &base_url()).is_empty());
    }

    #[test]
    fn test_fragment_stripped_and_deduplicated() {
        let html = r##"<html><body>
            <a href="/a#one">One</a>
            <a href="/a#two">Two</a>
            <a href="/a">Plain</a>
        </body></html>"##;
        assert_eq!(parse_links(html, &base_url()), vec!["https://example.com/a"]);
    }

    #[test]
    fn test_extract_canonical_link() {
        let html = r#"<html><head><link rel="canonical" href="https://example.com/canonical" /></head><body></body></html>"#;
        assert_eq!(
            parse_links(html, &base_url()),
            vec!["https://example.com/canonical"]
        );
    }

    #[test]
    fn test_mixed_valid_and_invalid_links() {
        let html = r#"
            <html>
            <body>
                <a href="/valid">Valid</a>
                <a href="javascript:alert('no')">Invalid</a>
                <a href="mailto:test@example.com">Invalid</a>
                <a href="/another-valid">Valid</a>
            </body>
            </html>
        "#;
        assert_eq!(
            parse_links(html, &base_url()),
            vec!["https://example.com/valid", "https://example.com/another-valid"]
        );
    }

    #[tokio::test]
    async fn test_document_extracts_links() {
        let document = HtmlDocument::new(
            "https://example.com/dir/",
            r#"<a href="child">Child</a><a href="../up">Up</a>"#,
        );
        assert_eq!(document.url(), "https://example.com/dir/");

        let links = document.extract_links().await.unwrap();
        assert_eq!(
            links,
            vec!["https://example.com/dir/child", "https://example.com/up"]
        );
    }

    #[tokio::test]
    async fn test_document_with_bad_base_url_fails_with_io() {
        let document = HtmlDocument::new("not a url", "<a href=\"/x\">x</a>");

        let err = document.extract_links().await.unwrap_err();
        match err {
            TaskError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::InvalidData),
            other => panic!("expected IO error, got {:?}", other),
        }
    }
}
