//! 单个统计队列。
//!
//! 职责：
//! - 维护按过期时间非递减排列的事件引用窗口；
//! - 在写锁内依次完成 TTL 过期、长度淘汰、追加与指标更新；
//! - 导出/恢复不含原始历史回放的持久化快照。

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use crate::codec::Codec;
use crate::config::StatsConfig;
use crate::constant::StatsError;
use crate::event::StatsEvent;
use crate::event_cache::StatsEventCache;
use crate::metric::{Metric, StatMetric};
use crate::sink::{MetricOp, QueueWarning, Stage, WarningSink};
use crate::snapshot::{QueueItem, StoredMetrics};

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

struct QueueState {
    items: VecDeque<QueueItem>,
    metrics: BTreeMap<String, StatMetric>,
    dirty: bool,
}

/// A metric whose stored accumulator could not be decoded; it restarts from zero.
#[derive(Debug)]
pub struct MetricRestoreError {
    pub metric_id: String,
    pub error: StatsError,
}

pub struct Restored {
    pub queue: StatQueue,
    pub failed_metrics: Vec<MetricRestoreError>,
}

pub struct StatQueue {
    config: Arc<StatsConfig>,
    // cache owner key; unique per instance so a reloaded queue never shares references
    owner: String,
    cache: Arc<StatsEventCache>,
    codec: Codec,
    sink: Arc<dyn WarningSink>,
    state: RwLock<QueueState>,
}

impl StatQueue {
    pub fn new(
        cache: Arc<StatsEventCache>,
        codec: Codec,
        config: Arc<StatsConfig>,
        sink: Arc<dyn WarningSink>,
    ) -> Result<Self, StatsError> {
        config.validate()?;
        let metrics = build_metrics(&config)?;
        let owner = format!("{}#{}", config.id, NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed));
        Ok(Self {
            config,
            owner,
            cache,
            codec,
            sink,
            state: RwLock::new(QueueState {
                items: VecDeque::new(),
                metrics,
                dirty: false,
            }),
        })
    }

    /// Re-seeds a queue from its stored snapshot.
    pub fn restore(
        cache: Arc<StatsEventCache>,
        codec: Codec,
        config: Arc<StatsConfig>,
        sink: Arc<dyn WarningSink>,
        stored: StoredMetrics,
    ) -> Result<Restored, StatsError> {
        let queue = Self::new(cache, codec, config, sink)?;
        let StoredMetrics {
            events,
            items,
            metrics: stored_metrics,
            ..
        } = stored;

        let events = events
            .into_iter()
            .map(|(event_id, event)| (event_id, Arc::new(event)))
            .collect::<BTreeMap<_, _>>();
        for item in &items {
            if let Some(event) = events.get(&item.event_id) {
                queue
                    .cache
                    .cache(&item.event_id, event.clone(), &queue.owner);
            }
        }

        let mut failed_metrics = Vec::new();
        {
            let mut state = queue.write_state();
            state.items = items.into();
            for (metric_id, metric) in state.metrics.iter_mut() {
                let Some(bytes) = stored_metrics.get(metric_id) else {
                    continue;
                };
                if let Err(error) = metric.unmarshal(bytes, codec) {
                    *metric = StatMetric::from_id(metric_id)?;
                    failed_metrics.push(MetricRestoreError {
                        metric_id: metric_id.clone(),
                        error,
                    });
                }
            }
        }

        Ok(Restored {
            queue,
            failed_metrics,
        })
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn config(&self) -> &StatsConfig {
        &self.config
    }

    /// Key under which this instance holds its event cache references.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn process_event(&self, event: StatsEvent) -> Result<(), StatsError> {
        self.process_event_at(event, Utc::now())
    }

    /// Expires, evicts on length, then appends `event`, all under one write lock.
    pub fn process_event_at(&self, event: StatsEvent, now: DateTime<Utc>) -> Result<(), StatsError> {
        if event.id.trim().is_empty() {
            return Err(StatsError::InvalidEvent("missing event ID".to_string()));
        }

        let mut state = self.write_state();
        self.remove_expired(&mut state, now);
        self.remove_on_queue_length(&mut state);
        self.add_event(&mut state, event, now);
        state.dirty = true;
        Ok(())
    }

    pub fn string_metrics(&self) -> BTreeMap<String, String> {
        let state = self.read_state();
        state
            .metrics
            .iter()
            .map(|(metric_id, metric)| (metric_id.clone(), metric.string_value()))
            .collect()
    }

    pub fn float_metrics(&self) -> BTreeMap<String, Option<f64>> {
        let state = self.read_state();
        state
            .metrics
            .iter()
            .map(|(metric_id, metric)| (metric_id.clone(), metric.float_value()))
            .collect()
    }

    pub fn items(&self) -> Vec<QueueItem> {
        self.read_state().items.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read_state().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_dirty(&self) -> bool {
        self.read_state().dirty
    }

    pub fn mark_dirty(&self) {
        self.write_state().dirty = true;
    }

    /// Builds the persistence snapshot from the live items.
    pub fn stored_metrics(&self) -> Result<StoredMetrics, StatsError> {
        let state = self.read_state();
        self.build_snapshot(&state)
    }

    /// Snapshot plus clearing of the dirty flag in one step; `None` when clean.
    pub fn take_dirty_snapshot(&self) -> Result<Option<StoredMetrics>, StatsError> {
        let mut state = self.write_state();
        if !state.dirty {
            return Ok(None);
        }
        let stored = self.build_snapshot(&state)?;
        state.dirty = false;
        Ok(Some(stored))
    }

    fn build_snapshot(&self, state: &QueueState) -> Result<StoredMetrics, StatsError> {
        let mut stored = StoredMetrics {
            queue_id: self.config.id.clone(),
            ..StoredMetrics::default()
        };
        for item in &state.items {
            let Some(event) = self.cache.get_event(&item.event_id) else {
                self.sink.warn(QueueWarning::EventNotCached {
                    queue_id: self.config.id.clone(),
                    event_id: item.event_id.clone(),
                    stage: Stage::Snapshot,
                });
                continue;
            };
            stored
                .events
                .entry(item.event_id.clone())
                .or_insert_with(|| event.as_ref().clone());
            stored.items.push(item.clone());
        }
        for (metric_id, metric) in &state.metrics {
            let bytes = metric
                .marshal(self.codec)
                .map_err(|error| StatsError::MetricSnapshot {
                    metric_id: metric_id.clone(),
                    source: Box::new(error),
                })?;
            stored.metrics.insert(metric_id.clone(), bytes);
        }
        Ok(stored)
    }

    fn remove_expired(&self, state: &mut QueueState, now: DateTime<Utc>) {
        // items are ordered by expiry; the first live (or TTL-less) item ends the scan
        while state.items.front().is_some_and(|item| item.is_expired(now)) {
            if let Some(item) = state.items.pop_front() {
                self.rollback(state, &item);
            }
        }
    }

    fn remove_on_queue_length(&self, state: &mut QueueState) {
        let limit = self.config.queue_length;
        if limit == 0 {
            return;
        }
        while state.items.len() >= limit {
            let Some(item) = state.items.pop_front() else {
                break;
            };
            self.rollback(state, &item);
        }
    }

    fn add_event(&self, state: &mut QueueState, event: StatsEvent, now: DateTime<Utc>) {
        let event = Arc::new(event);
        let expiry_time = self.next_expiry(state, now);
        self.cache.cache(&event.id, event.clone(), &self.owner);
        state
            .items
            .push_back(QueueItem::new(event.id.clone(), expiry_time));

        for (metric_id, metric) in state.metrics.iter_mut() {
            if let Err(error) = metric.add_event(&event) {
                self.sink.warn(QueueWarning::MetricFailed {
                    queue_id: self.config.id.clone(),
                    metric_id: metric_id.clone(),
                    event_id: event.id.clone(),
                    op: MetricOp::Add,
                    reason: error.to_string(),
                });
            }
        }
    }

    fn next_expiry(&self, state: &QueueState, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let ttl = self.config.effective_ttl()?;
        let expiry = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        // a clock step backwards must not break the ordering of the window
        match state.items.back().and_then(|last| last.expiry_time) {
            Some(last) if last > expiry => Some(last),
            _ => Some(expiry),
        }
    }

    fn rollback(&self, state: &mut QueueState, item: &QueueItem) {
        let Some(event) = self.cache.get_event(&item.event_id) else {
            self.sink.warn(QueueWarning::EventNotCached {
                queue_id: self.config.id.clone(),
                event_id: item.event_id.clone(),
                stage: Stage::Eviction,
            });
            return;
        };
        for (metric_id, metric) in state.metrics.iter_mut() {
            if let Err(error) = metric.rem_event(&event) {
                self.sink.warn(QueueWarning::MetricFailed {
                    queue_id: self.config.id.clone(),
                    metric_id: metric_id.clone(),
                    event_id: item.event_id.clone(),
                    op: MetricOp::Remove,
                    reason: error.to_string(),
                });
            }
        }
        self.cache.release(&item.event_id, &self.owner);
    }

    fn read_state(&self) -> RwLockReadGuard<'_, QueueState> {
        self.state.read().expect("stat queue lock poisoned")
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, QueueState> {
        self.state.write().expect("stat queue lock poisoned")
    }
}

impl Drop for StatQueue {
    fn drop(&mut self) {
        self.cache.release_owner(&self.owner);
    }
}

impl std::fmt::Debug for StatQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatQueue")
            .field("id", &self.config.id)
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

fn build_metrics(config: &StatsConfig) -> Result<BTreeMap<String, StatMetric>, StatsError> {
    let mut metrics = BTreeMap::new();
    for metric_id in &config.metrics {
        metrics.insert(metric_id.clone(), StatMetric::from_id(metric_id)?);
    }
    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use super::StatQueue;
    use crate::codec::Codec;
    use crate::config::StatsConfig;
    use crate::event::StatsEvent;
    use crate::event_cache::StatsEventCache;
    use crate::sink::MemorySink;

    #[test]
    fn clock_step_back_keeps_expiry_ordering() {
        let mut config = StatsConfig::new("Stats1");
        config.ttl = Some(std::time::Duration::from_secs(60));
        config.metrics = vec!["*asr".to_string()];
        let queue = StatQueue::new(
            Arc::new(StatsEventCache::with_shards(2)),
            Codec::Json,
            Arc::new(config),
            Arc::new(MemorySink::new()),
        )
        .expect("queue");

        let now = Utc::now();
        queue
            .process_event_at(StatsEvent::new("ev1"), now)
            .expect("process");
        queue
            .process_event_at(StatsEvent::new("ev2"), now - Duration::seconds(30))
            .expect("process");

        let items = queue.items();
        assert_eq!(items.len(), 2);
        assert!(items[0].expiry_time <= items[1].expiry_time);
    }

    #[test]
    fn empty_event_id_is_rejected() {
        let queue = StatQueue::new(
            Arc::new(StatsEventCache::with_shards(2)),
            Codec::Json,
            Arc::new(StatsConfig::new("Stats1")),
            Arc::new(MemorySink::new()),
        )
        .expect("queue");
        assert!(queue.process_event(StatsEvent::new("")).is_err());
        assert!(queue.is_empty());
        assert!(!queue.is_dirty());
    }
}
