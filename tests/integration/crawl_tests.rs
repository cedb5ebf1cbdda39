//! End-to-end crawl tests against a mock server

use crate::common::{mount_page, mount_robots, test_config, url};
use fuelog_crawler::crawler::{FetchError, FieldRule, HtmlExtractor, TaskError};
use fuelog_crawler::output::MemorySink;
use fuelog_crawler::{host_key, CrawlController, CrawlError, QueuePolicy};
use scraper::Html;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_depth_limit_stops_at_one_hop() {
    let mock_server = MockServer::start().await;

    mount_page(&mock_server, "/", "Home", &["/a", "/b"], 1).await;
    mount_page(&mock_server, "/a", "Page A", &["/c"], 1).await;
    mount_page(&mock_server, "/b", "Page B", &[], 1).await;
    mount_page(&mock_server, "/c", "Page C", &[], 0).await;

    let config = fuelog_crawler::CrawlConfig {
        max_depth: Some(1),
        ..test_config()
    };
    let controller = CrawlController::new(config).unwrap();
    let mut sink = MemorySink::new();

    let summary = controller
        .run(&[url(&mock_server, "/")], &mut sink)
        .await
        .unwrap();

    assert_eq!(sink.results().len(), 3);
    assert!(sink.is_finished());
    assert_eq!(summary.completed, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.depth_exceeded, 1);
    assert!(!summary.cancelled);

    let home = sink.get(&url(&mock_server, "/")).unwrap();
    assert_eq!(home.depth, 0);
    assert_eq!(home.origin, None);
    assert_eq!(home.status, Some(200));
    assert_eq!(home.attempts, 1);
    assert_eq!(home.fields.get("title").map(String::as_str), Some("Home"));
    assert_eq!(
        home.links,
        vec![url(&mock_server, "/a"), url(&mock_server, "/b")]
    );

    let page_a = sink.get(&url(&mock_server, "/a")).unwrap();
    assert_eq!(page_a.depth, 1);
    assert_eq!(page_a.origin.as_deref(), Some(url(&mock_server, "/").as_str()));

    assert!(sink.get(&url(&mock_server, "/c")).is_none());
}

#[tokio::test]
async fn test_follow_links_disabled_fetches_only_seeds() {
    let mock_server = MockServer::start().await;

    mount_page(&mock_server, "/", "Home", &["/a", "/b"], 1).await;
    mount_page(&mock_server, "/a", "Page A", &[], 0).await;
    mount_page(&mock_server, "/b", "Page B", &[], 0).await;

    let config = fuelog_crawler::CrawlConfig {
        follow_links: false,
        ..test_config()
    };
    let controller = CrawlController::new(config).unwrap();
    let mut sink = MemorySink::new();

    let summary = controller
        .run(&[url(&mock_server, "/")], &mut sink)
        .await
        .unwrap();

    assert_eq!(sink.results().len(), 1);
    assert_eq!(summary.completed, 1);

    // Links are still extracted and reported, just not followed
    assert_eq!(sink.results()[0].links.len(), 2);
}

#[tokio::test]
async fn test_server_error_is_retried_until_attempts_run_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;

    let config = fuelog_crawler::CrawlConfig {
        max_attempts: 3,
        ..test_config()
    };
    let controller = CrawlController::new(config).unwrap();
    let mut sink = MemorySink::new();

    let summary = controller
        .run(&[url(&mock_server, "/")], &mut sink)
        .await
        .unwrap();

    assert_eq!(sink.results().len(), 1);
    let result = &sink.results()[0];
    assert_eq!(result.attempts, 3);
    assert_eq!(result.status, Some(500));
    assert_eq!(
        result.error,
        Some(TaskError::Network(FetchError::HttpStatus(500)))
    );
    assert!(result.links.is_empty());

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.total_attempts, 3);
    assert_eq!(summary.errors.get("http 500"), Some(&1));
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let mock_server = MockServer::start().await;

    mount_page(&mock_server, "/", "Home", &["/missing"], 1).await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let controller = CrawlController::new(test_config()).unwrap();
    let mut sink = MemorySink::new();

    let summary = controller
        .run(&[url(&mock_server, "/")], &mut sink)
        .await
        .unwrap();

    let missing = sink.get(&url(&mock_server, "/missing")).unwrap();
    assert_eq!(missing.attempts, 1);
    assert_eq!(missing.status, Some(404));
    assert_eq!(
        missing.error,
        Some(TaskError::Network(FetchError::HttpStatus(404)))
    );

    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed, 1);
}

#[tokio::test]
async fn test_transient_failure_recovers_on_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/", "Home", &[], 1).await;

    let controller = CrawlController::new(test_config()).unwrap();
    let mut sink = MemorySink::new();

    controller
        .run(&[url(&mock_server, "/")], &mut sink)
        .await
        .unwrap();

    let result = &sink.results()[0];
    assert!(result.is_success());
    assert_eq!(result.attempts, 2);
    assert_eq!(result.status, Some(200));
}

#[tokio::test]
async fn test_robots_disallowed_urls_are_skipped() {
    let mock_server = MockServer::start().await;

    mount_robots(&mock_server, "User-agent: *\nDisallow: /private\n").await;
    mount_page(&mock_server, "/", "Home", &["/private/page", "/public"], 1).await;
    mount_page(&mock_server, "/private/page", "Secret", &[], 0).await;
    mount_page(&mock_server, "/public", "Public", &[], 1).await;

    let controller = CrawlController::new(test_config()).unwrap();
    let mut sink = MemorySink::new();

    let summary = controller
        .run(&[url(&mock_server, "/")], &mut sink)
        .await
        .unwrap();

    assert_eq!(sink.results().len(), 2);
    assert!(sink.get(&url(&mock_server, "/private/page")).is_none());
    assert_eq!(summary.disallowed, 1);
    assert_eq!(summary.completed, 2);
}

#[tokio::test]
async fn test_robots_ignored_when_disabled() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /\n"))
        .expect(0)
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/", "Home", &[], 1).await;

    let config = fuelog_crawler::CrawlConfig {
        respect_robots: false,
        ..test_config()
    };
    let controller = CrawlController::new(config).unwrap();
    let mut sink = MemorySink::new();

    let summary = controller
        .run(&[url(&mock_server, "/")], &mut sink)
        .await
        .unwrap();

    assert_eq!(summary.completed, 1);
    assert_eq!(summary.disallowed, 0);
}

#[tokio::test]
async fn test_each_url_is_fetched_once() {
    let mock_server = MockServer::start().await;

    // A cycle plus a self-link and a fragment variant of an existing page
    mount_page(&mock_server, "/", "Home", &["/a", "/b", "/"], 1).await;
    mount_page(&mock_server, "/a", "Page A", &["/b", "/", "/a#top"], 1).await;
    mount_page(&mock_server, "/b", "Page B", &["/a"], 1).await;

    let controller = CrawlController::new(test_config()).unwrap();
    let mut sink = MemorySink::new();

    let summary = controller
        .run(&[url(&mock_server, "/")], &mut sink)
        .await
        .unwrap();

    assert_eq!(sink.results().len(), 3);
    assert_eq!(summary.completed, 3);
    assert!(summary.duplicates > 0);
}

#[tokio::test]
async fn test_duplicate_seeds_are_fetched_once() {
    let mock_server = MockServer::start().await;

    mount_page(&mock_server, "/", "Home", &[], 1).await;

    let controller = CrawlController::new(test_config()).unwrap();
    let mut sink = MemorySink::new();

    let seeds = [url(&mock_server, "/"), url(&mock_server, "/#intro")];
    let summary = controller.run(&seeds, &mut sink).await.unwrap();

    assert_eq!(sink.results().len(), 1);
    assert_eq!(summary.duplicates, 1);
}

#[tokio::test]
async fn test_same_host_requests_are_spaced() {
    let mock_server = MockServer::start().await;

    mount_page(&mock_server, "/", "Home", &["/a", "/b", "/c"], 1).await;
    mount_page(&mock_server, "/a", "Page A", &[], 1).await;
    mount_page(&mock_server, "/b", "Page B", &[], 1).await;
    mount_page(&mock_server, "/c", "Page C", &[], 1).await;

    let config = fuelog_crawler::CrawlConfig {
        rate_limit: 0.25,
        workers: 4,
        ..test_config()
    };
    let controller = CrawlController::new(config).unwrap();
    let mut sink = MemorySink::new();

    let started = Instant::now();
    controller
        .run(&[url(&mock_server, "/")], &mut sink)
        .await
        .unwrap();
    let elapsed = started.elapsed();

    // robots.txt plus four pages: five admissions, four gaps
    let host = host_key(&Url::parse(&mock_server.uri()).unwrap()).unwrap();
    assert_eq!(controller.scheduler().request_count(&host).await, 5);
    assert!(
        elapsed >= Duration::from_millis(1000),
        "crawl finished too quickly: {:?}",
        elapsed
    );
    assert_eq!(sink.results().len(), 4);
}

#[tokio::test]
async fn test_robots_crawl_delay_slows_host() {
    let mock_server = MockServer::start().await;

    mount_robots(&mock_server, "User-agent: *\nCrawl-delay: 1\n").await;
    mount_page(&mock_server, "/", "Home", &[], 1).await;

    let controller = CrawlController::new(test_config()).unwrap();
    let mut sink = MemorySink::new();

    let started = Instant::now();
    controller
        .run(&[url(&mock_server, "/")], &mut sink)
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_secs(1));
    assert_eq!(sink.results().len(), 1);
}

#[tokio::test]
async fn test_cancellation_stops_waiting_workers() {
    let mock_server = MockServer::start().await;

    mount_page(&mock_server, "/", "Home", &["/a", "/b"], 1).await;
    mount_page(&mock_server, "/a", "Page A", &[], 0).await;
    mount_page(&mock_server, "/b", "Page B", &[], 0).await;

    // A long spacing keeps the children waiting on admission
    let config = fuelog_crawler::CrawlConfig {
        rate_limit: 60.0,
        respect_robots: false,
        ..test_config()
    };
    let cancel = CancellationToken::new();
    let controller = CrawlController::new(config)
        .unwrap()
        .with_cancellation(cancel.clone());
    let mut sink = MemorySink::new();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        cancel.cancel();
    });

    let summary = tokio::time::timeout(
        Duration::from_secs(10),
        controller.run(&[url(&mock_server, "/")], &mut sink),
    )
    .await
    .expect("crawl did not stop after cancellation")
    .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.status(), "cancelled");
    assert_eq!(sink.results().len(), 1);
    assert!(sink.is_finished());
}

#[tokio::test]
async fn test_redirect_records_final_url() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .expect(1)
        .mount(&mock_server)
        .await;
    // The redirect target links back to itself; it must not be fetched twice
    mount_page(&mock_server, "/new", "New Home", &["/new"], 1).await;

    let controller = CrawlController::new(test_config()).unwrap();
    let mut sink = MemorySink::new();

    controller
        .run(&[url(&mock_server, "/old")], &mut sink)
        .await
        .unwrap();

    assert_eq!(sink.results().len(), 1);
    let result = &sink.results()[0];
    assert_eq!(result.url, url(&mock_server, "/old"));
    assert_eq!(result.final_url, Some(url(&mock_server, "/new")));
    assert_eq!(result.status, Some(200));
    assert_eq!(
        result.fields.get("title").map(String::as_str),
        Some("New Home")
    );
}

#[tokio::test]
async fn test_trailing_slash_link_is_fetched_as_written() {
    let mock_server = MockServer::start().await;

    mount_page(&mock_server, "/", "Home", &["/docs/"], 1).await;
    mount_page(&mock_server, "/docs/", "Docs", &[], 1).await;
    mount_page(&mock_server, "/docs", "Wrong", &[], 0).await;

    let controller = CrawlController::new(test_config()).unwrap();
    let mut sink = MemorySink::new();

    controller
        .run(&[url(&mock_server, "/")], &mut sink)
        .await
        .unwrap();

    let docs = sink.get(&url(&mock_server, "/docs/")).unwrap();
    assert!(docs.is_success());
    assert_eq!(docs.status, Some(200));
    assert_eq!(docs.fields.get("title").map(String::as_str), Some("Docs"));
    assert!(sink.get(&url(&mock_server, "/docs")).is_none());
}

#[tokio::test]
async fn test_redirect_onto_visited_page_is_dropped() {
    let mock_server = MockServer::start().await;

    mount_page(&mock_server, "/", "Home", &["/old", "/new"], 1).await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .expect(1)
        .mount(&mock_server)
        .await;
    // Once directly and once through the redirect
    mount_page(&mock_server, "/new", "New", &[], 2).await;

    let controller = CrawlController::new(test_config()).unwrap();
    let mut sink = MemorySink::new();

    let summary = controller
        .run(&[url(&mock_server, "/")], &mut sink)
        .await
        .unwrap();

    assert_eq!(sink.results().len(), 2);
    assert!(sink.get(&url(&mock_server, "/old")).is_none());
    assert!(sink.get(&url(&mock_server, "/new")).unwrap().is_success());
    assert!(summary.duplicates >= 1);
}

#[derive(Debug)]
struct PanickingRule;

impl FieldRule for PanickingRule {
    fn name(&self) -> &str {
        "boom"
    }

    fn extract(&self, _document: &Html) -> Option<String> {
        panic!("field rule blew up");
    }
}

#[tokio::test]
async fn test_worker_panic_fails_run_instead_of_hanging() {
    let mock_server = MockServer::start().await;

    mount_page(&mock_server, "/", "Home", &["/a"], 1).await;
    mount_page(&mock_server, "/a", "Page A", &[], 0).await;

    let controller = CrawlController::new(test_config())
        .unwrap()
        .with_extractor(HtmlExtractor::without_rules().with_rule(PanickingRule));
    let mut sink = MemorySink::new();

    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        controller.run(&[url(&mock_server, "/")], &mut sink),
    )
    .await
    .expect("crawl hung after a worker panic");

    assert!(matches!(outcome, Err(CrawlError::Worker(_))), "got {:?}", outcome);
    assert!(sink.results().is_empty());
}

#[tokio::test]
async fn test_non_html_response_completes_without_links() {
    let mock_server = MockServer::start().await;

    mount_page(&mock_server, "/", "Home", &["/report.pdf"], 1).await;
    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(b"%PDF-1.4 <a href=\"/hidden\">".to_vec(), "application/pdf"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/hidden", "Hidden", &[], 0).await;

    let controller = CrawlController::new(test_config()).unwrap();
    let mut sink = MemorySink::new();

    let summary = controller
        .run(&[url(&mock_server, "/")], &mut sink)
        .await
        .unwrap();

    let pdf = sink.get(&url(&mock_server, "/report.pdf")).unwrap();
    assert!(pdf.is_success());
    assert!(pdf.links.is_empty());
    assert_eq!(
        pdf.fields.get("content_type").map(String::as_str),
        Some("application/pdf")
    );
    assert_eq!(summary.completed, 2);
}

#[tokio::test]
async fn test_empty_html_is_an_extract_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("   ", "text/html"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let controller = CrawlController::new(test_config()).unwrap();
    let mut sink = MemorySink::new();

    let summary = controller
        .run(&[url(&mock_server, "/")], &mut sink)
        .await
        .unwrap();

    let result = &sink.results()[0];
    assert_eq!(result.status, Some(200));
    assert!(matches!(result.error, Some(TaskError::Extract(_))));
    assert_eq!(summary.failed, 1);
}

#[tokio::test]
async fn test_shallowest_first_crawls_every_page() {
    let mock_server = MockServer::start().await;

    mount_page(&mock_server, "/", "Home", &["/a", "/b"], 1).await;
    mount_page(&mock_server, "/a", "Page A", &["/a/1"], 1).await;
    mount_page(&mock_server, "/b", "Page B", &[], 1).await;
    mount_page(&mock_server, "/a/1", "Page A1", &[], 1).await;

    let config = fuelog_crawler::CrawlConfig {
        queue_policy: QueuePolicy::ShallowestFirst,
        workers: 1,
        ..test_config()
    };
    let controller = CrawlController::new(config).unwrap();
    let mut sink = MemorySink::new();

    controller
        .run(&[url(&mock_server, "/")], &mut sink)
        .await
        .unwrap();

    let depths: Vec<u32> = sink.results().iter().map(|r| r.depth).collect();
    assert_eq!(depths, vec![0, 1, 1, 2]);
}

#[tokio::test]
async fn test_invalid_seed_fails_run_without_fetching() {
    let mock_server = MockServer::start().await;

    let controller = CrawlController::new(test_config()).unwrap();
    let mut sink = MemorySink::new();

    let err = controller
        .run(&["not a url".to_string()], &mut sink)
        .await
        .unwrap_err();

    assert!(matches!(err, CrawlError::Config(_)));
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}
