// tests/scoring_flow.rs
//
// Scoring through the dispatcher with a scripted provider: validation
// failures ride the exponential backoff, transport failures exhaust the
// budget, and an empty-but-valid reply completes without touching scores.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use feedrank::queue::{self, Dispatcher, Job, JobKind, Registry, RetryPolicy, ShutdownSignal};
use feedrank::scoring::ingestor::ScoreIngestor;
use feedrank::scoring::limiter::RateLimiter;
use feedrank::scoring::provider::ScriptedProvider;
use feedrank::scoring::{ScoringClient, ScoringRequest};
use feedrank::store::{Article, ArticleStore, MemoryStore};

fn article(title: &str) -> Article {
    Article {
        fingerprint: format!("{:x}", md5::compute(title.as_bytes())),
        title: title.to_string(),
        link: "https://example.test/a".to_string(),
        source: "Example".to_string(),
        source_url: "https://example.test/".to_string(),
        source_image: String::new(),
        description: String::new(),
        image: None,
        author: None,
        publication_date: Utc::now(),
        score: None,
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    provider: Arc<ScriptedProvider>,
    queue: queue::JobQueue,
    shutdown: ShutdownSignal,
}

fn start(policy: RetryPolicy) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let provider = Arc::new(ScriptedProvider::new());
    let limiter = Arc::new(RateLimiter::per_minute(60));

    let (queue, rx) = queue::channel();
    let mut registry = Registry::new();
    registry.register(
        JobKind::ScoreArticle,
        Arc::new(ScoringClient::new(
            provider.clone(),
            limiter,
            queue.clone(),
        )),
        policy,
    );
    registry.register(
        JobKind::ApplyScores,
        Arc::new(ScoreIngestor::new(store.clone())),
        RetryPolicy::fixed(3, Duration::from_secs(30)),
    );

    let shutdown = ShutdownSignal::new();
    Dispatcher::new(registry, queue.clone(), rx, 2, shutdown.clone()).spawn();
    Harness {
        store,
        provider,
        queue,
        shutdown,
    }
}

fn request(article: &Article) -> ScoringRequest {
    ScoringRequest {
        title: article.title.clone(),
        fingerprint: article.fingerprint.clone(),
        rubric_prompt: "Rank the TITLES:\n".to_string(),
    }
}

async fn wait_until(what: &str, check: impl Fn() -> bool) {
    for _ in 0..800 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    panic!("timed out waiting for {what}");
}

#[tokio::test(start_paused = true)]
async fn mismatched_id_rides_the_backoff_then_scores() {
    let harness = start(RetryPolicy::exponential(5, Duration::from_secs(3600)));
    let subject = article("Quake shakes markets");
    harness.store.create_if_absent(&subject).await.expect("seed store");

    harness
        .provider
        .push_reply(r#"{"articles": [{"id": "somebody-else", "score": 10}]}"#);
    harness.provider.push_reply(format!(
        "```json\n{{\"articles\": [{{\"id\": \"{}\", \"score\": 87}}]}}\n```",
        subject.fingerprint
    ));

    harness.queue.enqueue(Job::ScoreArticle {
        request: request(&subject),
    });

    let store = harness.store.clone();
    let fingerprint = subject.fingerprint.clone();
    wait_until("score to land", move || {
        store
            .get(&fingerprint)
            .and_then(|a| a.score)
            .is_some()
    })
    .await;

    assert_eq!(
        harness.store.get(&subject.fingerprint).unwrap().score,
        Some(87)
    );
    let prompts = harness.provider.seen_prompts();
    assert_eq!(prompts.len(), 2, "one rejected reply, one good one");
    assert!(prompts[0].contains("Title: `Quake shakes markets` Hash (\"id\")"));
    harness.shutdown.trigger();
}

#[tokio::test(start_paused = true)]
async fn transport_failures_exhaust_the_retry_budget() {
    let harness = start(RetryPolicy::exponential(2, Duration::from_secs(3600)));
    let subject = article("Story nobody can reach");
    harness.store.create_if_absent(&subject).await.expect("seed store");

    for _ in 0..5 {
        harness.provider.push_failure("connection reset");
    }
    harness.queue.enqueue(Job::ScoreArticle {
        request: request(&subject),
    });

    let provider = harness.provider.clone();
    wait_until("retry budget to burn down", move || {
        provider.seen_prompts().len() == 3
    })
    .await;

    // abandoned for good: nothing else fires afterwards
    tokio::time::sleep(Duration::from_secs(7200)).await;
    assert_eq!(harness.provider.seen_prompts().len(), 3);
    assert_eq!(harness.store.get(&subject.fingerprint).unwrap().score, None);
    harness.shutdown.trigger();
}

#[tokio::test(start_paused = true)]
async fn empty_batch_reply_completes_without_scoring() {
    let harness = start(RetryPolicy::exponential(5, Duration::from_secs(3600)));
    let subject = article("Reply said nothing");
    harness.store.create_if_absent(&subject).await.expect("seed store");

    harness.provider.push_reply("```json\n{}\n```");
    harness.queue.enqueue(Job::ScoreArticle {
        request: request(&subject),
    });

    let provider = harness.provider.clone();
    wait_until("the one scoring call", move || {
        provider.seen_prompts().len() == 1
    })
    .await;

    // a valid-but-empty batch is an answer, not a failure: no retries
    tokio::time::sleep(Duration::from_secs(7200)).await;
    assert_eq!(harness.provider.seen_prompts().len(), 1);
    assert_eq!(harness.store.get(&subject.fingerprint).unwrap().score, None);
    harness.shutdown.trigger();
}
