//! HttpFetcher tests: redirects, timeouts, retries, robots.txt

use crate::common::{html_page, test_config, url};
use fuelog_crawler::crawler::{FetchError, FetchScheduler, HttpFetcher};
use fuelog_crawler::CrawlConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher(config: &CrawlConfig) -> HttpFetcher {
    let scheduler = Arc::new(FetchScheduler::new(config.rate_limit_duration()));
    HttpFetcher::new(config, scheduler).unwrap()
}

#[tokio::test]
async fn test_fetch_sends_user_agent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("user-agent", "TestBot/1.0"))
        .respond_with(html_page("Home", &[]))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = fetcher(&test_config());
    let target = Url::parse(&url(&mock_server, "/")).unwrap();
    let report = fetcher.fetch(&target, &CancellationToken::new()).await;

    let page = report.outcome.unwrap();
    assert_eq!(report.attempts, 1);
    assert_eq!(page.status, 200);
    assert!(page.is_html());
    assert!(page
        .content_type
        .as_deref()
        .unwrap()
        .starts_with("text/html"));
    assert!(page.body.contains("<title>Home</title>"));
    assert_eq!(page.final_url, target);
}

#[tokio::test]
async fn test_fetch_follows_redirects() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/end"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/end"))
        .respond_with(html_page("End", &[]))
        .mount(&mock_server)
        .await;

    let fetcher = fetcher(&test_config());
    let target = Url::parse(&url(&mock_server, "/start")).unwrap();
    let report = fetcher.fetch(&target, &CancellationToken::new()).await;

    let page = report.outcome.unwrap();
    assert_eq!(page.final_url.path(), "/end");
}

#[tokio::test]
async fn test_redirect_loop_is_too_many_redirects() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop"))
        .mount(&mock_server)
        .await;

    let config = CrawlConfig {
        max_redirects: 3,
        ..test_config()
    };
    let fetcher = fetcher(&config);
    let target = Url::parse(&url(&mock_server, "/loop")).unwrap();
    let report = fetcher.fetch(&target, &CancellationToken::new()).await;

    assert_eq!(report.outcome.unwrap_err(), FetchError::TooManyRedirects);
    assert_eq!(report.attempts, 1);
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(html_page("Slow", &[]).set_delay(Duration::from_secs(3)))
        .expect(2)
        .mount(&mock_server)
        .await;

    let config = CrawlConfig {
        timeout: 1,
        max_attempts: 2,
        ..test_config()
    };
    let fetcher = fetcher(&config);
    let target = Url::parse(&url(&mock_server, "/slow")).unwrap();
    let report = fetcher.fetch(&target, &CancellationToken::new()).await;

    assert_eq!(report.outcome.unwrap_err(), FetchError::Timeout);
    assert_eq!(report.attempts, 2);
}

#[tokio::test]
async fn test_refused_connection_is_retried() {
    // Bind then release a port so nothing is listening on it
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let config = CrawlConfig {
        max_attempts: 2,
        ..test_config()
    };
    let fetcher = fetcher(&config);
    let target = Url::parse(&format!("http://127.0.0.1:{}/", port)).unwrap();
    let report = fetcher.fetch(&target, &CancellationToken::new()).await;

    let err = report.outcome.unwrap_err();
    assert!(matches!(err, FetchError::ConnectionFailed(_)), "got {:?}", err);
    assert_eq!(report.attempts, 2);
}

#[tokio::test]
async fn test_fetch_cancelled_before_start() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(html_page("Home", &[]))
        .expect(0)
        .mount(&mock_server)
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let fetcher = fetcher(&test_config());
    let target = Url::parse(&url(&mock_server, "/")).unwrap();
    let report = fetcher.fetch(&target, &cancel).await;

    assert_eq!(report.outcome.unwrap_err(), FetchError::Cancelled);
}

#[tokio::test]
async fn test_fetches_share_host_spacing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(html_page("Page", &[]))
        .expect(3)
        .mount(&mock_server)
        .await;

    let config = CrawlConfig {
        rate_limit: 0.2,
        ..test_config()
    };
    let fetcher = fetcher(&config);
    let cancel = CancellationToken::new();

    let started = std::time::Instant::now();
    let one = Url::parse(&url(&mock_server, "/one")).unwrap();
    let two = Url::parse(&url(&mock_server, "/two")).unwrap();
    let three = Url::parse(&url(&mock_server, "/three")).unwrap();
    let (a, b, c) = tokio::join!(
        fetcher.fetch(&one, &cancel),
        fetcher.fetch(&two, &cancel),
        fetcher.fetch(&three, &cancel)
    );

    assert!(a.outcome.is_ok() && b.outcome.is_ok() && c.outcome.is_ok());
    assert!(started.elapsed() >= Duration::from_millis(400));
}

#[tokio::test]
async fn test_robots_rules_are_parsed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("User-agent: *\nDisallow: /admin\nCrawl-delay: 2\n"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = test_config();
    let fetcher = fetcher(&config);
    let page = Url::parse(&url(&mock_server, "/some/page")).unwrap();
    let robots = fetcher
        .fetch_robots(&page, &CancellationToken::new())
        .await;

    assert!(!robots.is_allowed(&url(&mock_server, "/admin/users"), &config.user_agent));
    assert!(robots.is_allowed(&url(&mock_server, "/public"), &config.user_agent));
    assert_eq!(
        robots.crawl_delay(&config.user_agent),
        Some(Duration::from_secs(2))
    );
}

#[tokio::test]
async fn test_missing_robots_allows_everything() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = test_config();
    let fetcher = fetcher(&config);
    let page = Url::parse(&url(&mock_server, "/")).unwrap();
    let robots = fetcher
        .fetch_robots(&page, &CancellationToken::new())
        .await;

    assert!(robots.is_allowed(&url(&mock_server, "/anything"), &config.user_agent));
    assert_eq!(robots.crawl_delay(&config.user_agent), None);
}
