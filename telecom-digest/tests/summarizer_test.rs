mod common;

use std::time::Duration;

use common::{item, RecordingSleeper, Reply, ScriptedSummarizer};
use telecom_digest::{BatchSummarizer, NewsItem, RetryPolicy, SummarizeError, SummaryMode, SummaryOutcome};

fn five_items() -> Vec<NewsItem> {
    ["1", "2", "3", "4", "5"].into_iter().map(item).collect()
}

fn ids_in_order(entries: &[telecom_digest::ReportEntry]) -> Vec<String> {
    entries.iter().map(|e| e.item.id.clone()).collect()
}

#[tokio::test]
async fn test_one_failing_item_does_not_abort_batch() {
    common::init_tracing();
    let stub = ScriptedSummarizer::new(|_, unit| {
        if unit.contains("Title: Item 3\n") {
            Reply::Fail(SummarizeError::RateLimited { retry_after: None })
        } else {
            Reply::Echo
        }
    });
    let sleeper = RecordingSleeper::new();
    let summarizer = BatchSummarizer::new(stub.clone(), RetryPolicy::constant(3, Duration::from_secs(2)))
        .with_sleeper(sleeper.clone());

    let entries = summarizer.summarize_all(&five_items()).await;

    assert_eq!(ids_in_order(&entries), vec!["1", "2", "3", "4", "5"]);
    assert_eq!(entries.iter().filter(|e| e.outcome.is_summarized()).count(), 4);
    match &entries[2].outcome {
        SummaryOutcome::Failed(marker) => {
            assert_eq!(marker.item_id, "3");
            assert!(marker.reason.contains("retries exhausted"));
        }
        other => panic!("item 3 should have failed, got {:?}", other),
    }
    // 4 successes plus 3 attempts for item 3
    assert_eq!(stub.calls(), 7);
    assert_eq!(sleeper.delays().len(), 2);
}

#[tokio::test]
async fn test_summaries_carry_all_three_languages() {
    let stub = ScriptedSummarizer::echo();
    let summarizer = BatchSummarizer::new(stub, RetryPolicy::constant(1, Duration::ZERO));

    let entries = summarizer.summarize_all(&[item("a")]).await;

    let summary = entries[0].outcome.summary().unwrap();
    assert_eq!(summary.item_id, "a");
    assert_eq!(summary.english, "Item a - Snippet for a");
    assert!(!summary.chinese.is_empty());
    assert!(!summary.swedish.is_empty());
}

#[tokio::test]
async fn test_malformed_output_is_an_item_failure() {
    let stub = ScriptedSummarizer::new(|_, unit| {
        if unit.contains("Title: Item b\n") {
            Reply::Raw("EN: something\nZH: 某事\nSV: något".into())
        } else {
            Reply::Echo
        }
    });
    let summarizer = BatchSummarizer::new(stub.clone(), RetryPolicy::constant(3, Duration::ZERO))
        .with_sleeper(RecordingSleeper::new());

    let entries = summarizer.summarize_all(&[item("a"), item("b"), item("c")]).await;

    assert!(entries[0].outcome.is_summarized());
    assert!(!entries[1].outcome.is_summarized());
    assert!(entries[2].outcome.is_summarized());
    // malformed output is not retried
    assert_eq!(stub.calls(), 3);
}

#[tokio::test]
async fn test_batched_mode_groups_items_into_units() {
    let stub = ScriptedSummarizer::echo();
    let summarizer = BatchSummarizer::new(stub.clone(), RetryPolicy::constant(1, Duration::ZERO))
        .with_mode(SummaryMode::Batched, 2);

    let entries = summarizer.summarize_all(&five_items()).await;

    assert_eq!(stub.calls(), 3);
    assert_eq!(ids_in_order(&entries), vec!["1", "2", "3", "4", "5"]);
    assert!(entries.iter().all(|e| e.outcome.is_summarized()));
    assert_eq!(entries[3].outcome.summary().unwrap().english, "Item 4 - Snippet for 4");

    let units = stub.units();
    assert!(units[0].contains("[1]\nTitle: Item 1") && units[0].contains("[2]\nTitle: Item 2"));
    assert!(units[2].contains("[1]\nTitle: Item 5"));
}

#[tokio::test]
async fn test_batched_reply_missing_an_entry_fails_only_that_item() {
    let stub = ScriptedSummarizer::new(|_, _| {
        Reply::Raw(r#"[{"index":1,"english":"e","chinese":"c","swedish":"s"}]"#.into())
    });
    let summarizer = BatchSummarizer::new(stub, RetryPolicy::constant(1, Duration::ZERO))
        .with_mode(SummaryMode::Batched, 5);

    let entries = summarizer.summarize_all(&[item("a"), item("b")]).await;

    assert!(entries[0].outcome.is_summarized());
    assert!(!entries[1].outcome.is_summarized());
}

#[tokio::test]
async fn test_batched_entry_missing_a_language_fails_only_that_item() {
    let stub = ScriptedSummarizer::new(|_, _| {
        Reply::Raw(
            r#"[
                {"index":1,"english":"e1","chinese":"c1","swedish":"s1"},
                {"index":2,"english":"e2","chinese":"c2"},
                {"index":3,"english":"e3","chinese":"c3","swedish":"s3"}
            ]"#
            .into(),
        )
    });
    let summarizer = BatchSummarizer::new(stub.clone(), RetryPolicy::constant(1, Duration::ZERO))
        .with_mode(SummaryMode::Batched, 5);

    let entries = summarizer.summarize_all(&[item("a"), item("b"), item("c")]).await;

    let flags: Vec<bool> = entries.iter().map(|e| e.outcome.is_summarized()).collect();
    assert_eq!(flags, vec![true, false, true]);
    assert_eq!(entries[2].outcome.summary().unwrap().english, "e3");
    assert_eq!(stub.calls(), 1);
}

#[tokio::test]
async fn test_failed_batch_unit_marks_every_item() {
    let stub = ScriptedSummarizer::new(|_, _| Reply::Fail(SummarizeError::Service("unauthorized".into())));
    let summarizer = BatchSummarizer::new(stub.clone(), RetryPolicy::constant(3, Duration::ZERO))
        .with_mode(SummaryMode::Batched, 5);

    let entries = summarizer.summarize_all(&five_items()).await;

    assert_eq!(stub.calls(), 1);
    assert_eq!(entries.len(), 5);
    assert!(entries.iter().all(|e| !e.outcome.is_summarized()));
}

#[tokio::test]
async fn test_concurrency_preserves_input_order() {
    let stub = ScriptedSummarizer::echo();
    let summarizer = BatchSummarizer::new(stub.clone(), RetryPolicy::constant(1, Duration::ZERO))
        .with_concurrency(4);

    let items: Vec<NewsItem> = (0..12).map(|i| item(&i.to_string())).collect();
    let entries = summarizer.summarize_all(&items).await;

    let expected: Vec<String> = (0..12).map(|i| i.to_string()).collect();
    assert_eq!(ids_in_order(&entries), expected);
    assert_eq!(stub.calls(), 12);
}

#[tokio::test]
async fn test_long_text_is_truncated_deterministically() {
    let stub = ScriptedSummarizer::echo();
    let summarizer = BatchSummarizer::new(stub.clone(), RetryPolicy::constant(1, Duration::ZERO))
        .with_max_item_chars(40);

    let long = NewsItem::new("x", "Long", "https://news.example/x").with_text("word ".repeat(100));
    summarizer.summarize_all(&[long.clone()]).await;
    summarizer.summarize_all(&[long]).await;

    let units = stub.units();
    assert_eq!(units[0], units[1]);
    let snippet = units[0].lines().find(|l| l.starts_with("Snippet: ")).unwrap();
    assert!(snippet.ends_with("..."));
    assert!(snippet.chars().count() <= "Snippet: ".len() + 43);
}

#[tokio::test]
async fn test_empty_input_makes_no_calls() {
    let stub = ScriptedSummarizer::echo();
    let summarizer = BatchSummarizer::new(stub.clone(), RetryPolicy::constant(3, Duration::ZERO));
    assert!(summarizer.summarize_all(&[]).await.is_empty());
    assert_eq!(stub.calls(), 0);
}
