//! Feed aggregation against live HTTP sources served by wiremock

use hostdeck::feeds::{FeedAggregator, FeedTopic, HttpFeedFetcher};
use std::time::Duration;
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

fn rss(prefix: &str, count: usize) -> String {
    let items: String = (0..count)
        .map(|i| {
            format!(
                "<item><title>{p} {i}</title><link>https://{p}.example/{i}</link><description>About {p}</description></item>",
                p = prefix,
                i = i
            )
        })
        .collect();
    format!("<?xml version=\"1.0\"?><rss version=\"2.0\"><channel>{}</channel></rss>", items)
}

#[tokio::test]
async fn failing_source_leaves_the_others_and_result_is_cached() {
    let server = MockServer::start().await;

    Mock::given(matchers::path("/healthy"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss("healthy", 8)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(matchers::path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HttpFeedFetcher::new(Duration::from_secs(5)).unwrap();
    let aggregator = FeedAggregator::with_defaults(fetcher);
    let topic = FeedTopic::new(
        "cybersecurity",
        vec![format!("{}/broken", server.uri()), format!("{}/healthy", server.uri())],
    );

    let entries = aggregator.fetch(&topic).await;
    assert_eq!(entries.len(), 5);
    assert_eq!(entries[0].title, "healthy 0");
    assert_eq!(entries[0].summary, "About healthy");

    // Within the freshness window neither source is contacted again
    let again = aggregator.fetch(&topic).await;
    assert_eq!(again, entries);
}

#[tokio::test]
async fn expired_result_is_refetched() {
    let server = MockServer::start().await;

    Mock::given(matchers::path("/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss("games", 2)))
        .expect(2)
        .mount(&server)
        .await;

    let fetcher = HttpFeedFetcher::new(Duration::from_secs(5)).unwrap();
    let aggregator = FeedAggregator::new(fetcher, Duration::from_millis(50), 5, 10);
    let topic = FeedTopic::new("gaming", vec![format!("{}/feed", server.uri())]);

    assert_eq!(aggregator.fetch(&topic).await.len(), 2);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(aggregator.fetch(&topic).await.len(), 2);
}
