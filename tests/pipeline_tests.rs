//! Pipeline tests against a mock listing server, a scripted browser and a
//! stub analyzer

use async_trait::async_trait;
use chrono::NaiveDate;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use news_capture::{
    resolve_all, Analysis, AnalysisRecord, Analyzer, Config, DelayRange, ListingClient,
    NewsError, OpenAiAnalyzer, Pipeline, Result, SessionFactory, Viewport, ViewportSize,
};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 11, d).unwrap()
}

fn listing_html(items: &[(&str, &str)], pages: &[&str]) -> String {
    let items: String = items
        .iter()
        .map(|(link, date)| {
            format!(
                r#"<div class="article-item"><a href="{}">Title</a><span>Published on {}</span></div>"#,
                link, date
            )
        })
        .collect();
    let nav: String = pages
        .iter()
        .map(|p| format!(r#"<a href="/page/{}">{}</a>"#, p, p))
        .collect();
    format!("<html><body>{}<nav>{}</nav></body></html>", items, nav)
}

fn test_config(server: &MockServer) -> Config {
    Config {
        base_url: server.uri(),
        listing_url: format!("{}/announcements", server.uri()),
        page_url_template: format!("{}/page/{{page}}", server.uri()),
        item_selector: ".article-item".to_string(),
        delay: DelayRange {
            min_secs: 0.0,
            max_secs: 0.0,
        },
        viewport: ViewportSize {
            width: 40,
            height: 30,
        },
        max_scrolls: 5,
        ..Config::default()
    }
}

async fn mount_page(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Two-viewport document; records every URL it is opened on
struct ScriptedBrowser {
    visited: Arc<Mutex<Vec<String>>>,
    closes: Arc<Mutex<usize>>,
    fail_url: Option<String>,
}

impl ScriptedBrowser {
    fn new() -> Self {
        Self {
            visited: Arc::new(Mutex::new(Vec::new())),
            closes: Arc::new(Mutex::new(0)),
            fail_url: None,
        }
    }
}

struct ScriptedTab {
    visited: Arc<Mutex<Vec<String>>>,
    closes: Arc<Mutex<usize>>,
    fail_url: Option<String>,
    height: u32,
}

#[async_trait]
impl SessionFactory for ScriptedBrowser {
    async fn open(&self) -> Result<Box<dyn Viewport>> {
        Ok(Box::new(ScriptedTab {
            visited: Arc::clone(&self.visited),
            closes: Arc::clone(&self.closes),
            fail_url: self.fail_url.clone(),
            height: 0,
        }))
    }
}

#[async_trait]
impl Viewport for ScriptedTab {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        if self.fail_url.as_deref() == Some(url) {
            return Err(NewsError::Browser(format!("net::ERR_CONNECTION_REFUSED {}", url)));
        }
        self.visited.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn set_size(&mut self, size: ViewportSize) -> Result<()> {
        self.height = size.height;
        Ok(())
    }

    async fn capture_viewport(&mut self) -> Result<Vec<u8>> {
        let img = RgbImage::from_pixel(40, self.height, Rgb([200, 200, 200]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        Ok(buf)
    }

    async fn scroll_to(&mut self, _offset: u64) -> Result<()> {
        Ok(())
    }

    async fn page_height(&mut self) -> Result<u64> {
        Ok(u64::from(self.height) * 2)
    }

    async fn close(&mut self) -> Result<()> {
        *self.closes.lock().unwrap() += 1;
        Ok(())
    }
}

struct StubAnalyzer;

#[async_trait]
impl Analyzer for StubAnalyzer {
    async fn analyze(&self, image_base64: &str) -> Result<Analysis> {
        assert!(!image_base64.is_empty());
        Ok(Analysis {
            title: "Announcement".to_string(),
            date: "Nov 20, 2024".to_string(),
            text: "Body text".to_string(),
        })
    }
}

/// Answers once, then reports a provider error
struct FlakyAnalyzer {
    calls: Mutex<usize>,
}

#[async_trait]
impl Analyzer for FlakyAnalyzer {
    async fn analyze(&self, _image_base64: &str) -> Result<Analysis> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            *calls
        };
        if call > 1 {
            return Err(NewsError::MalformedAnalysis("Content is not JSON".to_string()));
        }
        StubAnalyzer.analyze("QUJD").await
    }
}

#[tokio::test]
async fn test_end_to_end_single_day() {
    let server = MockServer::start().await;
    let config = test_config(&server);
    mount_page(
        &server,
        "/page/1",
        listing_html(
            &[("/a", "Nov 20, 2024"), ("/b", "Nov 20, 2024"), ("/c", "Nov 21, 2024")],
            &[],
        ),
    )
    .await;

    let listing = ListingClient::new(reqwest::Client::new(), &config).unwrap();
    let browser = ScriptedBrowser::new();
    let pipeline = Pipeline::new(&config, &listing, &browser, &StubAnalyzer);

    let index = resolve_all(&listing, &config, Some(1)).await.unwrap();
    let filtered = index.filter_by_date_range(day(20), day(20));
    assert_eq!(filtered.date_count(), 1);
    assert_eq!(filtered.get(&day(20)).unwrap(), ["/a", "/b"]);

    let records = pipeline.enrich(&filtered).await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.published_date == "2024-11-20"));
    assert_eq!(records[0].link, format!("{}/a", server.uri()));
    assert_eq!(records[1].link, format!("{}/b", server.uri()));
    assert_eq!(*browser.closes.lock().unwrap(), 2);

    let json = pipeline.run(day(20), day(20), Some(1)).await.unwrap();
    let parsed: Vec<AnalysisRecord> = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, records);
}

#[tokio::test]
async fn test_discovers_page_count_and_merges() {
    let server = MockServer::start().await;
    let config = test_config(&server);
    mount_page(
        &server,
        "/announcements",
        listing_html(&[], &["1", "2", "3", "Next"]),
    )
    .await;
    mount_page(&server, "/page/1", listing_html(&[("/a", "Nov 20, 2024")], &[])).await;
    mount_page(
        &server,
        "/page/2",
        listing_html(&[("/a", "Nov 20, 2024"), ("/b", "Nov 19, 2024")], &[]),
    )
    .await;
    mount_page(&server, "/page/3", listing_html(&[("/c", "Nov 20, 2024")], &[])).await;

    let listing = ListingClient::new(reqwest::Client::new(), &config).unwrap();
    let index = resolve_all(&listing, &config, None).await.unwrap();

    // duplicates across pages are kept, page order preserved
    assert_eq!(index.get(&day(20)).unwrap(), ["/a", "/a", "/c"]);
    assert_eq!(index.get(&day(19)).unwrap(), ["/b"]);
    assert_eq!(index.link_count(), 4);
}

#[tokio::test]
async fn test_no_pagination_is_distinct_error() {
    let server = MockServer::start().await;
    let config = test_config(&server);
    mount_page(
        &server,
        "/announcements",
        listing_html(&[("/a", "Nov 20, 2024")], &[]),
    )
    .await;

    let listing = ListingClient::new(reqwest::Client::new(), &config).unwrap();
    let err = resolve_all(&listing, &config, None).await.unwrap_err();
    assert!(matches!(err, NewsError::NoPagination { .. }));
}

#[tokio::test]
async fn test_transport_error_aborts_resolve() {
    let server = MockServer::start().await;
    let config = test_config(&server);
    mount_page(&server, "/page/1", listing_html(&[("/a", "Nov 20, 2024")], &[])).await;
    Mock::given(method("GET"))
        .and(path("/page/2"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let listing = ListingClient::new(reqwest::Client::new(), &config).unwrap();
    let err = resolve_all(&listing, &config, Some(2)).await.unwrap_err();
    assert!(matches!(err, NewsError::Transport { status: 503, .. }));
}

#[tokio::test]
async fn test_inverted_range_yields_empty_array() {
    let server = MockServer::start().await;
    let config = test_config(&server);
    mount_page(&server, "/page/1", listing_html(&[("/a", "Nov 20, 2024")], &[])).await;

    let listing = ListingClient::new(reqwest::Client::new(), &config).unwrap();
    let browser = ScriptedBrowser::new();
    let pipeline = Pipeline::new(&config, &listing, &browser, &StubAnalyzer);

    let json = pipeline.run(day(21), day(19), Some(1)).await.unwrap();
    assert_eq!(json, "[]");
    assert!(browser.visited.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_capture_failure_aborts_enrichment() {
    let server = MockServer::start().await;
    let config = test_config(&server);
    mount_page(
        &server,
        "/page/1",
        listing_html(&[("/a", "Nov 20, 2024"), ("/b", "Nov 20, 2024")], &[]),
    )
    .await;

    let listing = ListingClient::new(reqwest::Client::new(), &config).unwrap();
    let mut browser = ScriptedBrowser::new();
    browser.fail_url = Some(format!("{}/b", server.uri()));
    let pipeline = Pipeline::new(&config, &listing, &browser, &StubAnalyzer);

    let err = pipeline.run(day(20), day(20), Some(1)).await.unwrap_err();
    assert!(matches!(err, NewsError::Browser(_)));
    // failed session is still released
    assert_eq!(*browser.closes.lock().unwrap(), 2);
}

#[tokio::test]
async fn test_analysis_failure_aborts_run() {
    let server = MockServer::start().await;
    let config = test_config(&server);
    mount_page(
        &server,
        "/page/1",
        listing_html(
            &[("/a", "Nov 20, 2024"), ("/b", "Nov 20, 2024"), ("/c", "Nov 20, 2024")],
            &[],
        ),
    )
    .await;

    let listing = ListingClient::new(reqwest::Client::new(), &config).unwrap();
    let browser = ScriptedBrowser::new();
    let analyzer = FlakyAnalyzer {
        calls: Mutex::new(0),
    };
    let pipeline = Pipeline::new(&config, &listing, &browser, &analyzer);

    let err = pipeline.run(day(20), day(20), Some(1)).await.unwrap_err();
    assert!(matches!(err, NewsError::MalformedAnalysis(_)));
    // stops at the second link, the third is never captured
    assert_eq!(*analyzer.calls.lock().unwrap(), 2);
    assert_eq!(browser.visited.lock().unwrap().len(), 2);
    assert_eq!(*browser.closes.lock().unwrap(), 2);
}

#[tokio::test]
async fn test_openai_analyzer_against_mock_provider() {
    let server = MockServer::start().await;
    let content = r#"{"title":"New listing","date":"Nov 20, 2024","text":"Trading opens"}"#;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        })))
        .mount(&server)
        .await;

    let mut config = Config::default().analysis;
    config.api_base = format!("{}/v1", server.uri());
    let analyzer = OpenAiAnalyzer::new(reqwest::Client::new(), "test-key", config);

    let analysis = analyzer.analyze("QUJD").await.unwrap();
    assert_eq!(analysis.title, "New listing");
    assert_eq!(analysis.text, "Trading opens");
}

#[tokio::test]
async fn test_openai_analyzer_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let mut config = Config::default().analysis;
    config.api_base = format!("{}/v1", server.uri());
    let analyzer = OpenAiAnalyzer::new(reqwest::Client::new(), "test-key", config);

    let err = analyzer.analyze("QUJD").await.unwrap_err();
    assert!(matches!(err, NewsError::Analysis { status: 429, .. }));
}
