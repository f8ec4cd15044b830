use std::sync::Arc;
use std::thread;

use chrono::Utc;

use stats::{Codec, MemorySink, StatQueue, StatsConfig, StatsEvent, StatsEventCache};

fn queue(cache: Arc<StatsEventCache>, id: &str, queue_length: usize) -> Arc<StatQueue> {
    let mut config = StatsConfig::new(id);
    config.queue_length = queue_length;
    config.metrics = vec!["*asr".to_string()];
    Arc::new(
        StatQueue::new(cache, Codec::Json, Arc::new(config), Arc::new(MemorySink::new()))
            .expect("queue"),
    )
}

#[test]
fn parallel_writers_keep_bound_and_exact_counts() {
    let cache = Arc::new(StatsEventCache::new());
    let shared = queue(cache.clone(), "Shared", 50);
    let other = queue(cache.clone(), "Other", 0);

    let mut handles = Vec::new();
    for worker in 0..8 {
        let shared = shared.clone();
        let other = other.clone();
        handles.push(thread::spawn(move || {
            for seq in 0..200 {
                let event = StatsEvent::new(format!("w{worker}-{seq}")).with_answer_time(Utc::now());
                shared.process_event(event.clone()).expect("shared");
                other.process_event(event).expect("other");
                // readers interleave with writers
                let _ = shared.string_metrics();
                assert!(shared.len() <= 50);
            }
        }));
    }
    for handle in handles {
        handle.join().expect("worker panicked");
    }

    assert_eq!(shared.len(), 50);
    assert_eq!(shared.string_metrics()["*asr"], "100.00000%");
    assert_eq!(other.len(), 1600);
    assert_eq!(cache.len(), 1600);

    let snapshot = shared.stored_metrics().expect("snapshot");
    assert_eq!(snapshot.items.len(), 50);
    assert_eq!(snapshot.events.len(), 50);
}
