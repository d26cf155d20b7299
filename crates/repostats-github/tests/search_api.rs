use chrono::NaiveDate;
use mockito::{Matcher, Server};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use repostats_core::partition_from;
use repostats_github::{
    Error, FetchConfig, FetchEnd, QueryFilters, RateLimitedFetcher, SearchClient,
};

fn test_config() -> FetchConfig {
    FetchConfig {
        per_page: 2,
        max_records_per_query: 4,
        query_attempts: 3,
        retry_backoff: Duration::from_millis(10),
        max_rate_limit_wait: Duration::from_secs(2),
        channel_capacity: 16,
    }
}

fn repo(name: &str, language: Option<&str>) -> serde_json::Value {
    json!({
        "full_name": name,
        "language": language,
        "pushed_at": "2023-05-29T12:00:00Z",
        "created_at": "2020-01-01T00:00:00Z",
        "stargazers_count": 10
    })
}

fn page_body(total: u64, items: Vec<serde_json::Value>) -> String {
    json!({
        "total_count": total,
        "incomplete_results": false,
        "items": items
    })
    .to_string()
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 5, 29).unwrap()
}

#[tokio::test]
async fn test_search_parses_page() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/search/repositories")
        .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
        .with_status(200)
        .with_body(page_body(
            37,
            vec![repo("a/one", Some("Rust")), repo("b/two", None)],
        ))
        .create_async()
        .await;

    let client = SearchClient::new(server.url(), "token", test_config()).unwrap();
    let page = client
        .search_pushed_on(date(), &QueryFilters::default(), 1)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(page.total_count, 37);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].id, "a/one");
    assert_eq!(page.items[0].primary_language.as_deref(), Some("Rust"));
    assert!(page.items[1].primary_language.is_none());
    assert_eq!(page.items[0].star_count, 10);
}

#[tokio::test]
async fn test_search_retries_malformed_body() {
    let mut server = Server::new_async().await;
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let good = page_body(1, vec![repo("a/one", Some("Rust"))]);
    let mock = server
        .mock("GET", "/search/repositories")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body_from_request(move |_| {
            // Garbage on the first hit, a well-formed page after.
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                b"<html>bad gateway</html>".to_vec()
            } else {
                good.clone().into_bytes()
            }
        })
        .expect(2)
        .create_async()
        .await;

    let client = SearchClient::new(server.url(), "token", test_config()).unwrap();
    let page = client
        .search_pushed_on(date(), &QueryFilters::default(), 1)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(page.items.len(), 1);
}

#[tokio::test]
async fn test_search_gives_up_after_bounded_retries() {
    let mut server = Server::new_async().await;
    let failure = server
        .mock("GET", "/search/repositories")
        .match_query(Matcher::Any)
        .with_status(500)
        .expect(3)
        .create_async()
        .await;

    let client = SearchClient::new(server.url(), "token", test_config()).unwrap();
    let result = client
        .search_pushed_on(date(), &QueryFilters::default(), 1)
        .await;

    failure.assert_async().await;
    assert!(matches!(result, Err(Error::Transient(_))));
}

#[tokio::test]
async fn test_search_unauthorized_is_fatal_and_not_retried() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/search/repositories")
        .match_query(Matcher::Any)
        .with_status(401)
        .expect(1)
        .create_async()
        .await;

    let client = SearchClient::new(server.url(), "bad-token", test_config()).unwrap();
    let result = client
        .search_pushed_on(date(), &QueryFilters::default(), 1)
        .await;

    mock.assert_async().await;
    assert!(matches!(result, Err(Error::Fatal(_))));
}

#[tokio::test]
async fn test_search_persistent_throttle_becomes_transient_error() {
    let mut server = Server::new_async().await;
    let throttled = server
        .mock("GET", "/search/repositories")
        .match_query(Matcher::Any)
        .with_status(403)
        .with_header("retry-after", "1")
        .expect(3)
        .create_async()
        .await;

    let client = SearchClient::new(server.url(), "token", test_config()).unwrap();
    let result = client
        .search_pushed_on(date(), &QueryFilters::default(), 1)
        .await;

    // Each attempt honored the short pause, then the client gave up.
    throttled.assert_async().await;
    assert!(matches!(result, Err(Error::Transient(_))));
}

#[tokio::test]
async fn test_search_spent_quota_pauses_before_returning() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/search/repositories")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("x-ratelimit-remaining", "0")
        .with_header("x-ratelimit-reset", "0")
        .with_body(page_body(1, vec![repo("a/one", Some("Rust"))]))
        .create_async()
        .await;

    let client = SearchClient::new(server.url(), "token", test_config()).unwrap();
    let started = Instant::now();
    let page = client
        .search_pushed_on(date(), &QueryFilters::default(), 1)
        .await
        .unwrap();

    // The page is still delivered, after waiting out the reset.
    assert_eq!(page.total_count, 1);
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn test_search_distant_reset_is_quota_exhaustion() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/search/repositories")
        .match_query(Matcher::Any)
        .with_status(403)
        .with_header("retry-after", "3600")
        .create_async()
        .await;

    let client = SearchClient::new(server.url(), "token", test_config()).unwrap();
    let result = client
        .search_pushed_on(date(), &QueryFilters::default(), 1)
        .await;

    assert!(matches!(result, Err(Error::Fatal(_))));
}

#[tokio::test]
async fn test_fetch_paginates_up_to_cap() {
    let mut server = Server::new_async().await;
    // 5 matches but only 4 retrievable: per_page=2, cap=4.
    let page1 = server
        .mock("GET", "/search/repositories")
        .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
        .with_status(200)
        .with_body(page_body(
            5,
            vec![repo("a/one", Some("Rust")), repo("b/two", Some("Go"))],
        ))
        .create_async()
        .await;
    let page2 = server
        .mock("GET", "/search/repositories")
        .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
        .with_status(200)
        .with_body(page_body(
            5,
            vec![repo("c/three", Some("Rust")), repo("d/four", None)],
        ))
        .create_async()
        .await;

    let client = SearchClient::new(server.url(), "token", test_config()).unwrap();
    let fetcher = RateLimitedFetcher::new(client, QueryFilters::default());
    let assignment = partition_from(date(), 1, 0).unwrap();

    let mut stream = fetcher.fetch(&assignment);
    let mut yielded = Vec::new();
    while let Some(record) = stream.next().await {
        yielded.push(record);
    }
    let outcome = stream.outcome().await;

    page1.assert_async().await;
    page2.assert_async().await;
    assert_eq!(yielded.len(), 4);
    assert_eq!(outcome.records_yielded, 4);
    // The reported population exceeds the sample because of the cap.
    assert_eq!(outcome.population_estimate, 5);
    assert!(matches!(outcome.end, FetchEnd::Completed));
}

#[tokio::test]
async fn test_fetch_empty_day_completes() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/search/repositories")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(page_body(0, vec![]))
        .create_async()
        .await;

    let client = SearchClient::new(server.url(), "token", test_config()).unwrap();
    let fetcher = RateLimitedFetcher::new(client, QueryFilters::default());
    let assignment = partition_from(date(), 1, 0).unwrap();

    let mut stream = fetcher.fetch(&assignment);
    assert!(stream.next().await.is_none());
    let outcome = stream.outcome().await;

    // No matches is a natural completion, not an error.
    assert!(matches!(outcome.end, FetchEnd::Completed));
    assert_eq!(outcome.records_yielded, 0);
    assert_eq!(outcome.population_estimate, 0);
}

#[tokio::test]
async fn test_fetch_truncates_when_first_request_never_succeeds() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/search/repositories")
        .match_query(Matcher::Any)
        .with_status(500)
        .expect(3)
        .create_async()
        .await;

    let client = SearchClient::new(server.url(), "token", test_config()).unwrap();
    let fetcher = RateLimitedFetcher::new(client, QueryFilters::default());
    let assignment = partition_from(date(), 1, 0).unwrap();

    let mut stream = fetcher.fetch(&assignment);
    assert!(stream.next().await.is_none());
    let outcome = stream.outcome().await;

    assert!(matches!(
        outcome.end,
        FetchEnd::Truncated {
            first_request_failed: true
        }
    ));
    assert_eq!(outcome.records_yielded, 0);
}

#[tokio::test]
async fn test_fetch_keeps_yielded_records_on_later_failure() {
    let mut server = Server::new_async().await;
    // Two-day range: day one succeeds, day two never does.
    let anchor = NaiveDate::from_ymd_opt(2023, 5, 29).unwrap();
    let assignment = partition_from(anchor, 2, 0).unwrap();
    let filters = QueryFilters::default();
    let day1_query = filters.to_query(assignment.start_date);
    let day2_query = filters.to_query(assignment.start_date + chrono::Duration::days(1));

    let _mock = server
        .mock("GET", "/search/repositories")
        .match_query(Matcher::UrlEncoded("q".into(), day1_query))
        .with_status(200)
        .with_body(page_body(1, vec![repo("a/one", Some("Rust"))]))
        .create_async()
        .await;
    let _mock = server
        .mock("GET", "/search/repositories")
        .match_query(Matcher::UrlEncoded("q".into(), day2_query))
        .with_status(500)
        .create_async()
        .await;

    let client = SearchClient::new(server.url(), "token", test_config()).unwrap();
    let fetcher = RateLimitedFetcher::new(client, QueryFilters::default());

    let mut stream = fetcher.fetch(&assignment);
    let mut yielded = Vec::new();
    while let Some(record) = stream.next().await {
        yielded.push(record);
    }
    let outcome = stream.outcome().await;

    assert_eq!(yielded.len(), 1);
    assert!(matches!(
        outcome.end,
        FetchEnd::Truncated {
            first_request_failed: false
        }
    ));
}

#[tokio::test]
async fn test_fetch_fatal_error_ends_stream() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/search/repositories")
        .match_query(Matcher::Any)
        .with_status(401)
        .create_async()
        .await;

    let client = SearchClient::new(server.url(), "token", test_config()).unwrap();
    let fetcher = RateLimitedFetcher::new(client, QueryFilters::default());
    let assignment = partition_from(date(), 1, 0).unwrap();

    let mut stream = fetcher.fetch(&assignment);
    assert!(stream.next().await.is_none());
    let outcome = stream.outcome().await;

    assert!(matches!(outcome.end, FetchEnd::Fatal(Error::Fatal(_))));
}
