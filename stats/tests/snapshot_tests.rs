use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};

use stats::{
    Codec, MemorySink, StatQueue, StatsConfig, StatsEvent, StatsEventCache, StoredMetrics,
    TracingSink,
};

fn config(id: &str) -> Arc<StatsConfig> {
    let mut config = StatsConfig::new(id);
    config.queue_length = 10;
    config.ttl = Some(StdDuration::from_secs(3600));
    config.metrics = vec!["*asr".to_string(), "*acd".to_string()];
    Arc::new(config)
}

fn seeded_queue(cache: Arc<StatsEventCache>, codec: Codec) -> StatQueue {
    let queue = StatQueue::new(cache, codec, config("Stats1"), Arc::new(TracingSink))
        .expect("queue should build");
    let now = Utc::now();
    for (idx, secs) in [45i64, 75, 0, 120].into_iter().enumerate() {
        let mut event = StatsEvent::new(format!("ev{idx}")).with_setup_time(now);
        if secs > 0 {
            event = event
                .with_answer_time(now)
                .with_end_time(now + Duration::seconds(secs));
        }
        queue.process_event(event).expect("process");
    }
    queue
}

#[test]
fn restored_queue_reports_identical_values() {
    for codec in [Codec::Json, Codec::Binary] {
        let original = seeded_queue(Arc::new(StatsEventCache::new()), codec);
        let stored = original.stored_metrics().expect("snapshot");
        let bytes = stored.encode(codec).expect("encode");

        let restored = StatQueue::restore(
            Arc::new(StatsEventCache::new()),
            codec,
            config("Stats1"),
            Arc::new(TracingSink),
            StoredMetrics::decode(&bytes, codec).expect("decode"),
        )
        .expect("restore");
        assert!(restored.failed_metrics.is_empty());

        let queue = restored.queue;
        assert_eq!(queue.string_metrics(), original.string_metrics());
        assert_eq!(queue.items(), original.items());
        assert!(!queue.is_dirty());
    }
}

#[test]
fn restored_items_roll_back_exactly() {
    let original = seeded_queue(Arc::new(StatsEventCache::new()), Codec::Json);
    let stored = original.stored_metrics().expect("snapshot");

    let cache = Arc::new(StatsEventCache::new());
    let queue = StatQueue::restore(
        cache.clone(),
        Codec::Json,
        config("Stats1"),
        Arc::new(TracingSink),
        stored,
    )
    .expect("restore")
    .queue;
    assert_eq!(cache.references("ev0", queue.owner()), 1);

    // push everything out of the window
    let later = Utc::now() + Duration::hours(2);
    queue
        .process_event_at(StatsEvent::new("fresh"), later)
        .expect("process");
    assert_eq!(queue.len(), 1);
    let metrics = queue.string_metrics();
    assert_eq!(metrics["*asr"], "0.00000%");
    assert_eq!(metrics["*acd"], "");
    assert_eq!(cache.len(), 1);
}

#[test]
fn corrupt_metric_restarts_from_zero_without_touching_others() {
    let original = seeded_queue(Arc::new(StatsEventCache::new()), Codec::Json);
    let mut stored = original.stored_metrics().expect("snapshot");
    stored
        .metrics
        .insert("*acd".to_string(), b"{broken".to_vec());

    let restored = StatQueue::restore(
        Arc::new(StatsEventCache::new()),
        Codec::Json,
        config("Stats1"),
        Arc::new(MemorySink::new()),
        stored,
    )
    .expect("restore still produces a queue");

    assert_eq!(restored.failed_metrics.len(), 1);
    assert_eq!(restored.failed_metrics[0].metric_id, "*acd");
    let metrics = restored.queue.string_metrics();
    assert_eq!(metrics["*asr"], original.string_metrics()["*asr"]);
    assert_eq!(metrics["*acd"], "");
}

#[test]
fn metric_missing_from_snapshot_starts_at_zero() {
    let original = seeded_queue(Arc::new(StatsEventCache::new()), Codec::Binary);
    let mut stored = original.stored_metrics().expect("snapshot");
    stored.metrics.remove("*asr");

    let queue = StatQueue::restore(
        Arc::new(StatsEventCache::new()),
        Codec::Binary,
        config("Stats1"),
        Arc::new(MemorySink::new()),
        stored,
    )
    .expect("restore")
    .queue;

    let metrics = queue.string_metrics();
    assert_eq!(metrics["*asr"], stats::NOT_AVAILABLE);
    assert_eq!(metrics["*acd"], original.string_metrics()["*acd"]);
}
