//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end through the HTTP fetcher.

use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use wave_crawler::config::{load_config, CrawlerConfig, HttpConfig};
use wave_crawler::crawler::{build_http_client, CrawlRequest, Fetcher, HttpFetcher, WebCrawler};
use wave_crawler::{ConfigError, PageError, TaskError};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_http_config() -> HttpConfig {
    HttpConfig {
        user_agent: "TestBot/1.0".to_string(),
        timeout_secs: 5,
    }
}

fn create_crawler(config: &CrawlerConfig) -> WebCrawler {
    let fetcher = HttpFetcher::new(&test_http_config()).expect("Failed to build fetcher");
    WebCrawler::new(Arc::new(fetcher), config).expect("Failed to create crawler")
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(format!("<html><body>{}</body></html>", body))
        .insert_header("content-type", "text/html")
}

/// Mounts a small site:
///
/// ```text
/// /        -> /page1, /page2, /missing (404)
/// /page1   -> /page3, /
/// /page2   -> (nothing)
/// /page3   -> (nothing)
/// ```
async fn mount_site(mock_server: &MockServer, page3_calls: u64) {
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(format!(
            r#"<a href="{0}/page1">Page 1</a>
               <a href="/page2">Page 2</a>
               <a href="missing#top">Missing</a>"#,
            base_url
        )))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page1"))
        .respond_with(html(r#"<a href="/page3">Page 3</a><a href="/">Home</a>"#.to_string()))
        .expect(1)
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page2"))
        .respond_with(html("No links".to_string()))
        .expect(1)
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page3"))
        .respond_with(html("Leaf".to_string()))
        .expect(page3_calls)
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn test_full_crawl_with_failed_page() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_site(&mock_server, 0).await;

    let crawler = create_crawler(&CrawlerConfig::default());
    let result = crawler
        .download(&format!("{}/", base_url), 2)
        .await
        .expect("Crawl failed");

    assert_eq!(
        result.downloaded,
        vec![
            format!("{}/", base_url),
            format!("{}/page1", base_url),
            format!("{}/page2", base_url),
        ]
    );
    assert_eq!(result.errors.len(), 1);
    match &result.errors[&format!("{}/missing", base_url)] {
        PageError::Io(e) => assert!(e.to_string().contains("HTTP 404"), "{}", e),
        other => panic!("Expected IO failure, got {:?}", other),
    }

    // Wiremock verifies that /page3 was never requested when the server drops
}

#[tokio::test]
async fn test_crawl_follows_one_more_level() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_site(&mock_server, 1).await;

    let crawler = create_crawler(&CrawlerConfig::new(4, 2, 1));
    let result = crawler
        .download(&format!("{}/", base_url), 3)
        .await
        .expect("Crawl failed");

    assert_eq!(result.downloaded.len(), 4);
    assert_eq!(result.downloaded[3], format!("{}/page3", base_url));
    assert!(!result
        .downloaded
        .iter()
        .any(|url| result.errors.contains_key(url)));
}

#[tokio::test]
async fn test_allowed_hosts_ignore_other_hosts() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let port = url::Url::parse(&base_url)
        .expect("Failed to parse base URL")
        .port()
        .expect("Mock server has no port");

    // Same server reached under another host name
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(format!(
            r#"<a href="/local">Local</a>
               <a href="http://localhost:{}/elsewhere">Elsewhere</a>"#,
            port
        )))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/local"))
        .respond_with(html("Local page".to_string()))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/elsewhere"))
        .respond_with(html("Should not be fetched".to_string()))
        .expect(0)
        .mount(&mock_server)
        .await;

    let crawler = create_crawler(&CrawlerConfig::default());
    let result = crawler
        .download_with_hosts(&format!("{}/", base_url), 2, ["127.0.0.1"])
        .await
        .expect("Crawl failed");

    assert_eq!(
        result.downloaded,
        vec![format!("{}/", base_url), format!("{}/local", base_url)]
    );
    assert!(result.errors.is_empty());
}

#[tokio::test]
async fn test_links_resolve_against_redirect_target() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/old/index"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new/index"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/new/index"))
        .respond_with(html(r#"<a href="child">Child</a>"#.to_string()))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/new/child"))
        .respond_with(html("Child".to_string()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let crawler = create_crawler(&CrawlerConfig::default());
    let result = crawler
        .download(&format!("{}/old/index", base_url), 2)
        .await
        .expect("Crawl failed");

    assert_eq!(
        result.downloaded,
        vec![
            format!("{}/old/index", base_url),
            format!("{}/new/child", base_url),
        ]
    );
}

#[tokio::test]
async fn test_server_error_is_io_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let client = build_http_client(&test_http_config()).expect("Failed to build client");
    let fetcher = HttpFetcher::with_client(client);
    let outcome = fetcher
        .fetch(&format!("{}/broken", mock_server.uri()))
        .await;

    match outcome {
        Err(TaskError::Io(e)) => {
            assert_eq!(e.kind(), std::io::ErrorKind::Other);
            assert!(e.to_string().contains("HTTP 500"));
        }
        Err(other) => panic!("Expected IO failure, got {:?}", other),
        Ok(_) => panic!("Expected failure for HTTP 500"),
    }
}

#[tokio::test]
async fn test_crawl_with_config_file() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("user-agent", "ConfiguredBot/2.0"))
        .respond_with(html("Hello".to_string()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    write!(
        file,
        r#"
[crawler]
downloaders = 3
extractors = 1
per-host = 1
close-timeout-ms = 50

[http]
user-agent = "ConfiguredBot/2.0"
timeout-secs = 5
"#
    )
    .expect("Failed to write config");
    file.flush().expect("Failed to flush config");

    let config = load_config(file.path()).expect("Failed to load config");
    assert_eq!(
        config.crawler,
        CrawlerConfig {
            close_timeout_ms: 50,
            ..CrawlerConfig::new(3, 1, 1)
        }
    );

    let fetcher = HttpFetcher::new(&config.http).expect("Failed to build fetcher");
    let crawler =
        WebCrawler::new(Arc::new(fetcher), &config.crawler).expect("Failed to create crawler");
    let result = crawler
        .crawl(CrawlRequest::new(format!("{}/", base_url), 1))
        .await
        .expect("Crawl failed");

    assert_eq!(result.downloaded, vec![format!("{}/", base_url)]);
    crawler.close().await;
}

#[test]
fn test_invalid_config_file_rejected() {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    write!(file, "[crawler]\nper-host = 0\n").expect("Failed to write config");
    file.flush().expect("Failed to flush config");

    assert!(matches!(
        load_config(file.path()),
        Err(ConfigError::Validation(_))
    ));
}
