//! 进程级事件缓存。
//!
//! 多个队列引用同一事件时只保存一份。按事件 ID 分片，将不同 key 的读写竞争隔离在不同锁上。
//! 每条缓存记录按队列维护引用计数，最后一个引用释放时才删除。

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock};

use crate::constant::Const;
use crate::event::StatsEvent;

#[derive(Debug)]
struct CachedEvent {
    event: Arc<StatsEvent>,
    owners: HashMap<String, usize>,
}

#[derive(Debug)]
pub struct StatsEventCache {
    shards: Vec<RwLock<HashMap<String, CachedEvent>>>,
    shard_count: usize,
}

impl Default for StatsEventCache {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsEventCache {
    pub fn new() -> Self {
        Self::with_shards(default_cache_shards())
    }

    pub fn with_shards(shard_count: usize) -> Self {
        let shard_count = shard_count.max(1);
        let mut shards = Vec::with_capacity(shard_count);
        for _ in 0..shard_count {
            shards.push(RwLock::new(HashMap::new()));
        }
        Self {
            shards,
            shard_count,
        }
    }

    /// 写入（或刷新）事件，并为 `owner` 增加一次引用。
    pub fn cache(&self, event_id: &str, event: Arc<StatsEvent>, owner: &str) {
        let mut guard = self.shards[self.shard_index(event_id)]
            .write()
            .expect("event cache shard lock poisoned");
        let entry = guard
            .entry(event_id.to_string())
            .or_insert_with(|| CachedEvent {
                event: event.clone(),
                owners: HashMap::new(),
            });
        entry.event = event;
        *entry.owners.entry(owner.to_string()).or_default() += 1;
    }

    pub fn get_event(&self, event_id: &str) -> Option<Arc<StatsEvent>> {
        let guard = self.shards[self.shard_index(event_id)]
            .read()
            .expect("event cache shard lock poisoned");
        guard.get(event_id).map(|cached| cached.event.clone())
    }

    /// 释放 `owner` 对事件的一次引用。
    pub fn release(&self, event_id: &str, owner: &str) {
        let mut guard = self.shards[self.shard_index(event_id)]
            .write()
            .expect("event cache shard lock poisoned");
        let Some(entry) = guard.get_mut(event_id) else {
            return;
        };
        if let Some(count) = entry.owners.get_mut(owner) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                entry.owners.remove(owner);
            }
        }
        if entry.owners.is_empty() {
            guard.remove(event_id);
        }
    }

    /// 释放 `owner` 持有的全部引用，返回因此被删除的事件数量。
    pub fn release_owner(&self, owner: &str) -> usize {
        let mut removed = 0usize;
        for shard in &self.shards {
            let mut guard = shard.write().expect("event cache shard lock poisoned");
            guard.retain(|_, entry| {
                entry.owners.remove(owner);
                let keep = !entry.owners.is_empty();
                if !keep {
                    removed += 1;
                }
                keep
            });
        }
        removed
    }

    pub fn references(&self, event_id: &str, owner: &str) -> usize {
        let guard = self.shards[self.shard_index(event_id)]
            .read()
            .expect("event cache shard lock poisoned");
        guard
            .get(event_id)
            .and_then(|cached| cached.owners.get(owner).copied())
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.read().expect("event cache shard lock poisoned").len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn shard_index(&self, key: &str) -> usize {
        hash_key(key) % self.shard_count
    }
}

fn hash_key(text: &str) -> usize {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish() as usize
}

fn default_cache_shards() -> usize {
    let cpu = std::thread::available_parallelism()
        .map(|x| x.get())
        .unwrap_or(8);
    (cpu.saturating_mul(2)).clamp(Const::MIN_CACHE_SHARDS, Const::MAX_CACHE_SHARDS)
}
