mod common;

use common::{init_tracing, item, registry, titled, urls, MockSource};
use news_aggregator::{NewsAggregator, NewsQuery, SortField, SortOrder};
use std::time::Duration;

#[tokio::test]
async fn failing_source_is_isolated() {
    init_tracing();

    let a = MockSource::failing("a", "connection reset");
    let b = MockSource::new("b", vec![item("x", "b", Some(1)), item("y", "b", Some(2))]);
    let aggregator = NewsAggregator::new(registry(&[a.clone(), b.clone()]));

    let items = aggregator.fetch_from_sources(&["a", "b"], 10).await;

    assert_eq!(urls(&items), vec!["x", "y"]);
    assert_eq!(a.calls(), 1);
    assert_eq!(b.calls(), 1);
}

#[tokio::test]
async fn results_follow_request_order_not_completion_order() {
    init_tracing();

    let slow = MockSource::new("slow", vec![item("s1", "slow", None), item("s2", "slow", None)])
        .with_delay(Duration::from_millis(80));
    let fast = MockSource::new("fast", vec![item("f1", "fast", None)]);
    let aggregator = NewsAggregator::new(registry(&[slow, fast]));

    let items = aggregator.fetch_from_sources(&["slow", "fast"], 10).await;
    assert_eq!(urls(&items), vec!["s1", "s2", "f1"]);

    let items = aggregator.fetch_from_sources(&["fast", "slow"], 10).await;
    assert_eq!(urls(&items), vec!["f1", "s1", "s2"]);
}

#[tokio::test]
async fn fetches_run_concurrently() {
    init_tracing();

    let delay = Duration::from_millis(150);
    let a = MockSource::new("a", vec![item("a1", "a", None)]).with_delay(delay);
    let b = MockSource::sharing_counters_with("b", vec![item("b1", "b", None)], &a)
        .with_delay(delay);
    let aggregator = NewsAggregator::new(registry(&[a.clone(), b]));

    aggregator.fetch_from_sources(&["a", "b"], 10).await;

    assert_eq!(a.max_in_flight(), 2);
}

#[tokio::test]
async fn panicking_source_is_isolated() {
    init_tracing();

    let bad = MockSource::panicking("bad");
    let good = MockSource::new("good", vec![item("g1", "good", None)]);
    let aggregator = NewsAggregator::new(registry(&[bad, good]));

    let report = aggregator.collect(&["bad", "good"], 5).await;

    assert_eq!(urls(&report.items), vec!["g1"]);
    assert_eq!(report.failed_sources, vec!["bad"]);
    assert!(!report.all_failed());
}

#[tokio::test]
async fn unregistered_ids_are_skipped() {
    init_tracing();

    let a = MockSource::new("a", vec![item("a1", "a", None)]);
    let aggregator = NewsAggregator::new(registry(&[a]));

    let report = aggregator.collect(&["missing", "a"], 5).await;

    assert_eq!(urls(&report.items), vec!["a1"]);
    assert_eq!(report.attempted, 1);
    assert!(report.failed_sources.is_empty());
}

#[tokio::test]
async fn limit_per_source_is_passed_to_each_source() {
    init_tracing();

    let a = MockSource::new("a", (0..10).map(|i| item(&format!("a{}", i), "a", None)).collect());
    let aggregator = NewsAggregator::new(registry(&[a]));

    let items = aggregator.fetch_from_sources(&["a"], 3).await;
    assert_eq!(items.len(), 3);
}

#[tokio::test]
async fn all_failed_report() {
    init_tracing();

    let a = MockSource::failing("a", "timeout");
    let b = MockSource::failing("b", "parse error");
    let aggregator = NewsAggregator::new(registry(&[a, b]));

    let report = aggregator.aggregate(&NewsQuery::new(10), 10).await;

    assert!(report.items.is_empty());
    assert!(report.all_failed());
    assert_eq!(report.failed_sources, vec!["a", "b"]);
}

#[test]
fn dedup_keeps_first_occurrence() {
    let mut first = item("dup", "a", Some(5));
    first.title = "first".to_string();
    let mut second = item("dup", "b", Some(50));
    second.title = "second".to_string();

    let items = vec![item("one", "a", Some(1)), first, second, item("two", "b", Some(2))];
    let merged =
        NewsAggregator::merge_and_sort(items, None, SortField::PublishedAt, SortOrder::Desc);

    let dups: Vec<_> = merged.iter().filter(|i| i.url.ends_with("/dup")).collect();
    assert_eq!(dups.len(), 1);
    assert_eq!(dups[0].title, "first");
    assert_eq!(dups[0].source_id, "a");
    assert_eq!(merged.len(), 3);
}

#[test]
fn published_desc_puts_undated_last() {
    let items = vec![
        item("none1", "a", None),
        item("t3", "a", Some(3)),
        item("none2", "b", None),
        item("t9", "b", Some(9)),
        item("t1", "a", Some(1)),
    ];
    let sorted =
        NewsAggregator::merge_and_sort(items, None, SortField::PublishedAt, SortOrder::Desc);

    assert_eq!(urls(&sorted), vec!["t9", "t3", "t1", "none1", "none2"]);
    let stamps: Vec<_> = sorted.iter().filter_map(|i| i.published_at).collect();
    assert!(stamps.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn published_asc_puts_undated_first() {
    let items = vec![
        item("t3", "a", Some(3)),
        item("none1", "a", None),
        item("t1", "a", Some(1)),
        item("none2", "b", None),
    ];
    let sorted =
        NewsAggregator::merge_and_sort(items, None, SortField::PublishedAt, SortOrder::Asc);

    assert_eq!(urls(&sorted), vec!["none1", "none2", "t1", "t3"]);
}

#[test]
fn source_sort_is_stable() {
    let items = vec![
        item("c1", "nhk", Some(1)),
        item("a1", "google", Some(2)),
        item("c2", "nhk", Some(3)),
        item("b1", "yahoo", Some(4)),
        item("a2", "google", Some(5)),
    ];

    let asc =
        NewsAggregator::merge_and_sort(items.clone(), None, SortField::SourceId, SortOrder::Asc);
    assert_eq!(urls(&asc), vec!["a1", "a2", "c1", "c2", "b1"]);
    assert!(asc.windows(2).all(|w| w[0].source_id <= w[1].source_id));

    let desc = NewsAggregator::merge_and_sort(items, None, SortField::SourceId, SortOrder::Desc);
    assert_eq!(urls(&desc), vec!["b1", "c1", "c2", "a1", "a2"]);
}

#[test]
fn equal_timestamps_keep_input_order() {
    let items = vec![
        item("first", "a", Some(7)),
        item("second", "b", Some(7)),
        item("third", "c", Some(7)),
    ];

    let (field, order) = (SortField::PublishedAt, SortOrder::Desc);
    let desc = NewsAggregator::merge_and_sort(items.clone(), None, field, order);
    assert_eq!(urls(&desc), vec!["first", "second", "third"]);

    let asc = NewsAggregator::merge_and_sort(items, None, SortField::PublishedAt, SortOrder::Asc);
    assert_eq!(urls(&asc), vec!["first", "second", "third"]);
}

#[test]
fn limit_truncates_after_sorting() {
    let items = vec![
        item("old", "a", Some(1)),
        item("new", "a", Some(10)),
        item("mid", "a", Some(5)),
    ];
    let sorted =
        NewsAggregator::merge_and_sort(items, Some(2), SortField::PublishedAt, SortOrder::Desc);
    assert_eq!(urls(&sorted), vec!["new", "mid"]);
}

#[test]
fn keyword_filter_is_case_insensitive() {
    let items = vec![
        titled("Rust 2.0 released", "r1", "a"),
        titled("Weather update", "w1", "a"),
        titled("Why RUSTACEANS love it", "r2", "b"),
    ];

    let filtered = NewsAggregator::filter_by_keyword(items.clone(), Some("rust"));
    assert_eq!(urls(&filtered), vec!["r1", "r2"]);
    assert!(filtered.iter().all(|i| i.title.to_lowercase().contains("rust")));

    assert_eq!(NewsAggregator::filter_by_keyword(items.clone(), Some("")), items);
    assert_eq!(NewsAggregator::filter_by_keyword(items.clone(), None), items);
}

#[tokio::test]
async fn keyword_filter_runs_before_limit() {
    init_tracing();

    let mut newest = titled("Sports results", "s1", "a");
    newest.published_at = Some(common::ts(100));
    let mut match_old = titled("Election day", "e1", "a");
    match_old.published_at = Some(common::ts(1));
    let mut match_new = titled("Election recount", "e2", "a");
    match_new.published_at = Some(common::ts(50));

    let a = MockSource::new("a", vec![newest, match_old, match_new]);
    let aggregator = NewsAggregator::new(registry(&[a]));

    let query = NewsQuery::new(2).with_keyword("ELECTION");
    let items = aggregator.fetch_and_aggregate(&query, 10).await;

    assert_eq!(urls(&items), vec!["e2", "e1"]);
}

#[tokio::test]
async fn two_source_scenario() {
    init_tracing();

    let a = MockSource::new("a", vec![item("u1", "a", Some(10)), item("u2", "a", Some(5))]);
    let b = MockSource::new("b", vec![item("u2", "b", Some(5)), item("u3", "b", Some(8))])
        .with_delay(Duration::from_millis(20));
    let aggregator = NewsAggregator::new(registry(&[a, b]));

    let fetched = aggregator.fetch_from_sources(&["a", "b"], 10).await;
    assert_eq!(urls(&fetched), vec!["u1", "u2", "u2", "u3"]);

    let query = NewsQuery::new(3)
        .with_sources(["a", "b"])
        .sorted_by(SortField::PublishedAt, SortOrder::Desc);
    let items = aggregator.fetch_and_aggregate(&query, 10).await;

    assert_eq!(urls(&items), vec!["u1", "u3", "u2"]);
    assert_eq!(items[2].source_id, "a");
}

#[tokio::test]
async fn requested_ids_are_trimmed_lowercased_and_deduplicated() {
    init_tracing();

    let a = MockSource::new("a", vec![item("a1", "a", Some(1))]);
    let b = MockSource::new("b", vec![item("b1", "b", Some(2))]);
    let aggregator = NewsAggregator::new(registry(&[a.clone(), b.clone()]));

    let query = NewsQuery::new(10).with_sources([" B", "A", "b "]);
    let report = aggregator.aggregate(&query, 10).await;

    assert_eq!(report.attempted, 2);
    assert_eq!(urls(&report.items), vec!["b1", "a1"]);
    assert_eq!(a.calls(), 1);
    assert_eq!(b.calls(), 1);
}

#[tokio::test]
async fn no_sources_means_all_in_registration_order() {
    init_tracing();

    let z = MockSource::new("z", vec![item("z1", "z", None)]);
    let a = MockSource::new("a", vec![item("a1", "a", None)]);
    let aggregator = NewsAggregator::new(registry(&[z.clone(), a.clone()]));

    // Undated items keep fetch order under a desc sort
    let items = aggregator.fetch_and_aggregate(&NewsQuery::new(10), 10).await;

    assert_eq!(urls(&items), vec!["z1", "a1"]);
    assert_eq!(z.calls(), 1);
    assert_eq!(a.calls(), 1);
}
