use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use stats::{
    AcdMetric, AsrMetric, Codec, MemorySink, Metric, StatQueue, StatsConfig, StatsEvent,
    StatsEventCache,
};

#[derive(Debug, Clone)]
struct Step {
    advance_secs: i64,
    answered: bool,
    duration_secs: Option<i64>,
}

fn step() -> impl Strategy<Value = Step> {
    (0i64..20, any::<bool>(), proptest::option::of(0i64..600)).prop_map(
        |(advance_secs, answered, duration_secs)| Step {
            advance_secs,
            answered,
            duration_secs,
        },
    )
}

fn build(queue_length: usize, ttl_secs: u64) -> (Arc<StatsEventCache>, StatQueue, Arc<MemorySink>) {
    let mut config = StatsConfig::new("prop");
    config.queue_length = queue_length;
    config.ttl = Some(StdDuration::from_secs(ttl_secs));
    config.metrics = vec!["*asr".to_string(), "*acd".to_string()];
    let cache = Arc::new(StatsEventCache::with_shards(4));
    let sink = Arc::new(MemorySink::new());
    let queue = StatQueue::new(cache.clone(), Codec::Json, Arc::new(config), sink.clone())
        .expect("queue");
    (cache, queue, sink)
}

fn make_event(idx: usize, step: &Step, at: chrono::DateTime<Utc>) -> StatsEvent {
    let mut event = StatsEvent::new(format!("ev{idx}")).with_setup_time(at);
    if step.answered {
        event = event.with_answer_time(at);
        if let Some(secs) = step.duration_secs {
            event = event.with_end_time(at + Duration::seconds(secs));
        }
    }
    event
}

proptest! {
    #[test]
    fn window_bounds_hold_after_every_call(
        steps in proptest::collection::vec(step(), 1..60),
        queue_length in 0usize..6,
        ttl_secs in 1u64..40,
    ) {
        let (cache, queue, sink) = build(queue_length, ttl_secs);
        let mut now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut live = Vec::new();

        for (idx, step) in steps.iter().enumerate() {
            now += Duration::seconds(step.advance_secs);
            let event = make_event(idx, step, now);
            queue.process_event_at(event.clone(), now).expect("process");

            let items = queue.items();
            if queue_length > 0 {
                prop_assert!(items.len() <= queue_length);
            }
            prop_assert!(items.iter().all(|item| item.expiry_time.is_some_and(|e| e > now)));
            prop_assert!(items.windows(2).all(|w| w[0].expiry_time <= w[1].expiry_time));

            // reference model of the surviving events
            live.push((event, now + Duration::seconds(ttl_secs as i64)));
            live.retain(|(_, expiry)| *expiry > now);
            if queue_length > 0 && live.len() > queue_length {
                let excess = live.len() - queue_length;
                live.drain(..excess);
            }
            let ids = items.iter().map(|item| item.event_id.clone()).collect::<Vec<_>>();
            let expected = live.iter().map(|(ev, _)| ev.id.clone()).collect::<Vec<_>>();
            prop_assert_eq!(ids, expected);

            let mut asr = AsrMetric::new();
            let mut acd = AcdMetric::new();
            for (ev, _) in &live {
                asr.add_event(ev).expect("model add");
                acd.add_event(ev).expect("model add");
            }
            let metrics = queue.string_metrics();
            prop_assert_eq!(metrics["*asr"].clone(), asr.string_value());
            prop_assert_eq!(metrics["*acd"].clone(), acd.string_value());
            let floats = queue.float_metrics();
            prop_assert_eq!(floats["*acd"], acd.float_value());
        }

        prop_assert!(sink.is_empty());
        prop_assert_eq!(cache.len(), queue.len());
    }
}
