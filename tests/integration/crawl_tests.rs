//! Integration tests for the crawler
//!
//! These tests use wiremock to serve small sites and run full crawls over
//! the reqwest transport.

use spinneret::apps::{Indexer, LinkChecker, Webmirror};
use spinneret::config::{parse_config, Config};
use spinneret::crawler::{
    Application, Crawler, ExceptionEvent, LinkOptions, QueueHandle, ResponseEvent, Spider,
    TransportError,
};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LAST_MODIFIED: &str = "Wed, 21 Oct 2015 07:28:00 GMT";

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_raw(body.as_bytes().to_vec(), "text/html")
        .insert_header("last-modified", LAST_MODIFIED)
}

async fn mount(server: &MockServer, route: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Records every event and follows `href` links
#[derive(Default)]
struct Recorder {
    responses: Vec<String>,
    exceptions: Vec<(String, Option<u16>)>,
    timeouts: usize,
}

impl Application for Recorder {
    fn handle_response(&mut self, event: &ResponseEvent, spider: &mut Spider, queue: &mut QueueHandle<'_>) {
        self.responses.push(event.request_url.path().to_string());
        let content_type = event.content_type();
        spider.discover_links(
            queue,
            &event.request_url,
            content_type.as_deref(),
            event.body(),
            &LinkOptions::default(),
        );
    }

    fn handle_exception(&mut self, event: &ExceptionEvent, spider: &Spider) {
        spider.log_exception(event);
        if matches!(event.error, TransportError::Timeout { .. }) {
            self.timeouts += 1;
        }
        self.exceptions
            .push((event.request_url.path().to_string(), event.status()));
    }
}

#[tokio::test]
async fn test_link_checker_reports_broken_links() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount(
        &server,
        "/",
        html(r#"<a href="/page1">Page 1</a> <a href="/page2">Page 2</a>"#),
    )
    .await;
    mount(&server, "/page1", html(r#"<a href="/gone">Gone link</a>"#)).await;
    mount(&server, "/page2", html("<p>Content 2</p>")).await;
    mount(&server, "/gone", ResponseTemplate::new(404)).await;

    let mut crawler = Crawler::from_config(&Config::default(), LinkChecker::new()).unwrap();
    let stats = crawler.crawl(&format!("{}/", base)).await.unwrap();
    assert_eq!(stats.requests, 4);
    assert_eq!(stats.exceptions, 1);

    let checker = crawler.into_app();
    let report = checker.report();
    assert_eq!(report.len(), 1);

    let broken = &report[&format!("{}/page1", base)];
    assert_eq!(broken.len(), 1);
    assert_eq!(broken[0].url.path(), "/gone");
    assert_eq!(broken[0].link_texts, vec!["Gone link"]);
}

#[tokio::test]
async fn test_redirects_are_events() {
    let server = MockServer::start().await;

    mount(&server, "/", html(r#"<a href="/old">Old</a>"#)).await;
    mount(
        &server,
        "/old",
        ResponseTemplate::new(301).insert_header("location", "/new"),
    )
    .await;
    mount(&server, "/new", html("<p>New</p>")).await;

    let mut crawler = Crawler::from_config(&Config::default(), Recorder::default()).unwrap();
    let stats = crawler.crawl(&format!("{}/", server.uri())).await.unwrap();

    assert_eq!(stats.redirects, 1);
    assert_eq!(stats.responses, 2);

    let mut responses = crawler.app().responses.clone();
    responses.sort();
    assert_eq!(responses, vec!["/", "/new"]);
}

#[tokio::test]
async fn test_mirror_is_idempotent() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount(
        &server,
        "/",
        html(r#"<link rel="stylesheet" href="/site.css"><a href="/about">About</a><a href="/old">Old</a><img src="/logo.png">"#),
    )
    .await;
    mount(
        &server,
        "/site.css",
        ResponseTemplate::new(200)
            .set_body_raw(b"body { background: url(img/bg.png) }".to_vec(), "text/css")
            .insert_header("last-modified", LAST_MODIFIED),
    )
    .await;
    mount(
        &server,
        "/img/bg.png",
        ResponseTemplate::new(200).set_body_raw(b"bg".to_vec(), "image/png"),
    )
    .await;
    mount(
        &server,
        "/logo.png",
        ResponseTemplate::new(200).set_body_raw(b"logo".to_vec(), "image/png"),
    )
    .await;
    mount(&server, "/about", html("<p>About</p>")).await;
    mount(
        &server,
        "/old",
        ResponseTemplate::new(301).insert_header("location", "/about"),
    )
    .await;

    let start = format!("{}/", server.uri());
    let config = Config::default();

    let mirror = Webmirror::from_config(dir.path(), &config.mirror).unwrap();
    let mut crawler = Crawler::from_config(&config, mirror).unwrap();
    crawler.crawl(&start).await.unwrap();

    let first = crawler.app().stats();
    assert_eq!(first.written, 5);
    assert_eq!(first.errors, 0);

    let root = crawler.app().store().root().to_path_buf();
    for file in ["index.html", "site.css", "img/bg.png", "logo.png", "about/index.html"] {
        assert!(root.join(file).is_file(), "{}", file);
    }
    #[cfg(unix)]
    assert_eq!(
        std::fs::read_link(root.join("old/index.html")).unwrap(),
        std::path::PathBuf::from("../about/index.html")
    );

    let mirror = Webmirror::from_config(dir.path(), &config.mirror).unwrap();
    let mut crawler = Crawler::from_config(&config, mirror).unwrap();
    crawler.crawl(&start).await.unwrap();

    let second = crawler.app().stats();
    assert_eq!(second.written, 0);
    assert_eq!(second.linked, 0);
    assert_eq!(second.skipped, 5);
    assert_eq!(second.deleted, 0);
}

#[tokio::test]
async fn test_timeout_becomes_exception() {
    let server = MockServer::start().await;

    mount(&server, "/", html(r#"<a href="/slow">Slow</a>"#)).await;
    mount(
        &server,
        "/slow",
        html("<p>late</p>").set_delay(Duration::from_secs(3)),
    )
    .await;

    let config = parse_config("[spider]\ntimeout-secs = 1\n").unwrap();
    let mut crawler = Crawler::from_config(&config, Recorder::default()).unwrap();
    let stats = crawler.crawl(&format!("{}/", server.uri())).await.unwrap();

    assert_eq!(stats.exceptions, 1);
    let app = crawler.app();
    assert_eq!(app.timeouts, 1);
    assert_eq!(app.exceptions, vec![("/slow".to_string(), None)]);
}

#[tokio::test]
async fn test_fetch_filter_from_config() {
    let server = MockServer::start().await;

    mount(
        &server,
        "/",
        html(r#"<a href="/public">Public</a><a href="/private/x">Private</a><a href="/list?sort=asc">Sorted</a>"#),
    )
    .await;
    mount(&server, "/public", html("")).await;
    Mock::given(method("GET"))
        .and(path("/private/x"))
        .respond_with(html(""))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/list"))
        .respond_with(html(""))
        .expect(0)
        .mount(&server)
        .await;

    let config = parse_config(
        r#"
        [fetch-filter]
        reject-paths = ["^/private/"]
        reject-query-params = [{ name = "sort" }]
        "#,
    )
    .unwrap();

    let mut count = 0;
    let mut crawler = Crawler::from_config(
        &config,
        Indexer::new(|_: &ResponseEvent| count += 1),
    )
    .unwrap();
    crawler.crawl(&format!("{}/", server.uri())).await.unwrap();
    drop(crawler);

    assert_eq!(count, 2);
}

#[tokio::test]
async fn test_head_requests() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "text/html"))
        .expect(1)
        .mount(&server)
        .await;

    let config = parse_config("[spider]\nmethod = \"HEAD\"\n").unwrap();
    let mut crawler = Crawler::from_config(&config, Recorder::default()).unwrap();
    let stats = crawler.crawl(&format!("{}/", server.uri())).await.unwrap();

    assert_eq!(stats.responses, 1);
    assert_eq!(crawler.app().responses, vec!["/"]);
}

#[tokio::test]
async fn test_concurrent_crawl_fetches_everything() {
    let server = MockServer::start().await;

    let links: String = (0..12)
        .map(|i| format!(r#"<a href="/p{}">{}</a>"#, i, i))
        .collect();
    mount(&server, "/", html(&links)).await;
    for i in 0..12 {
        mount(
            &server,
            &format!("/p{}", i),
            html("<p>leaf</p>").set_delay(Duration::from_millis(50)),
        )
        .await;
    }

    let config = parse_config("[spider]\nconcurrency = 4\n").unwrap();
    let mut crawler = Crawler::from_config(&config, Recorder::default()).unwrap();
    let stats = crawler.crawl(&format!("{}/", server.uri())).await.unwrap();

    assert_eq!(stats.responses, 13);
    assert!(stats.peak_in_flight <= 4);
    assert!(stats.peak_in_flight > 1);
}
