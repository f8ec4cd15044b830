//! 统计服务主流程。
//!
//! 注册表只保护集合结构本身；取到 `Arc<StatQueue>` 后立即释放注册表锁，
//! 队列内容由各队列自己的读写锁保护。持久化 IO 不持有任何队列锁。

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use stats::{
	Codec, OK, StatQueue, StatQueues, StatsConfig, StatsError, StatsEvent, StatsEventCache,
	StoredMetrics, TracingSink, WarningSink,
};
use store::{AsyncSnapshotWriter, DataStore, StoreError};
use tracing::{debug, error, info, warn};

use crate::error::ServiceError;

pub struct StatService {
	store: Arc<dyn DataStore>,
	cache: Arc<StatsEventCache>,
	codec: Codec,
	sink: Arc<dyn WarningSink>,
	queues: RwLock<StatQueues>,
}

impl StatService {
	pub fn new(store: Arc<dyn DataStore>, codec: Codec) -> Self {
		Self::with_sink(store, codec, Arc::new(TracingSink))
	}

	pub fn with_sink(store: Arc<dyn DataStore>, codec: Codec, sink: Arc<dyn WarningSink>) -> Self {
		Self {
			store,
			cache: Arc::new(StatsEventCache::new()),
			codec,
			sink,
			queues: RwLock::new(StatQueues::new()),
		}
	}

	pub fn cache(&self) -> &Arc<StatsEventCache> {
		&self.cache
	}

	/// 已加载队列 ID（按权重顺序）；尚未加载任何队列时返回 `NotFound`。
	pub fn queue_ids(&self) -> Result<Vec<String>, ServiceError> {
		let ids = self.queues.read().expect("stat queues lock poisoned").ids();
		if ids.is_empty() {
			return Err(ServiceError::NotFound);
		}
		Ok(ids)
	}

	pub fn string_metrics(&self, queue_id: &str) -> Result<BTreeMap<String, String>, ServiceError> {
		Ok(self.queue(queue_id)?.string_metrics())
	}

	pub fn float_metrics(&self, queue_id: &str) -> Result<BTreeMap<String, Option<f64>>, ServiceError> {
		Ok(self.queue(queue_id)?.float_metrics())
	}

	/// 从存储加载全部配置并恢复快照；已加载的队列保持不动，可重复调用。
	///
	/// 任一配置构建失败时整批放弃，注册表保持调用前的状态。
	pub fn load_queues(&self) -> Result<&'static str, ServiceError> {
		let configs = self.store.stats_configs()?;
		// held for the whole load so a queue id is never built twice
		let mut queues = self.queues.write().expect("stat queues lock poisoned");
		let mut built: Vec<Arc<StatQueue>> = Vec::new();
		for config in configs {
			if queues.contains(&config.id) || built.iter().any(|queue| queue.id() == config.id) {
				continue;
			}
			built.push(self.build_queue(config)?);
		}

		let loaded = built.len();
		for queue in built {
			queues.push(queue);
		}
		queues.sort();
		info!(loaded, total = queues.len(), "stat queues loaded");
		Ok(OK)
	}

	pub fn process_event(&self, queue_id: &str, event: StatsEvent) -> Result<&'static str, ServiceError> {
		self.queue(queue_id)?.process_event(event)?;
		Ok(OK)
	}

	/// 按权重顺序把同一事件送入多个队列，遇到 `Blocker` 队列处理后停止。
	///
	/// 未加载的 ID 被忽略；返回实际处理过的队列 ID。
	pub fn process_event_for_queues(
		&self,
		queue_ids: &[String],
		event: &StatsEvent,
	) -> Result<Vec<String>, ServiceError> {
		let targets = {
			let queues = self.queues.read().expect("stat queues lock poisoned");
			queues
				.iter()
				.filter(|queue| queue_ids.iter().any(|id| id == queue.id()))
				.cloned()
				.collect::<Vec<_>>()
		};
		if targets.is_empty() {
			return Err(ServiceError::NotFound);
		}

		let mut processed = Vec::with_capacity(targets.len());
		for queue in targets {
			queue.process_event(event.clone())?;
			processed.push(queue.id().to_string());
			if queue.config().blocker {
				debug!(queue_id = queue.id(), event_id = %event.id, "blocker queue stops dispatch");
				break;
			}
		}
		Ok(processed)
	}

	/// 从注册表移除队列；队列析构时释放其事件缓存引用。
	pub fn remove_queue(&self, queue_id: &str) -> Result<&'static str, ServiceError> {
		let removed = self
			.queues
			.write()
			.expect("stat queues lock poisoned")
			.remove_by_id(queue_id);
		match removed {
			Some(_) => {
				info!(queue_id, "stat queue removed");
				Ok(OK)
			}
			None => Err(ServiceError::NotFound),
		}
	}

	/// 同步保存全部脏队列（仅 `Store = true`），返回保存数量。
	///
	/// 单个队列失败不影响其余队列；返回遇到的第一个错误。
	pub fn store_queues(&self) -> Result<usize, ServiceError> {
		let mut saved = 0usize;
		let mut first_error = None;
		for queue in self.storable_queues() {
			let Some(stored) = take_snapshot(&queue, &mut first_error) else {
				continue;
			};
			match self.store.set_stored_metrics(&stored) {
				Ok(()) => saved += 1,
				Err(err) => {
					queue.mark_dirty();
					error!(queue_id = queue.id(), error = %err, "snapshot save failed");
					if first_error.is_none() {
						first_error = Some(err.into());
					}
				}
			}
		}
		match first_error {
			Some(err) => Err(err),
			None => Ok(saved),
		}
	}

	/// 与 `store_queues` 相同，但只入队到后台写入器，不在调用线程做 IO。
	///
	/// 写入结果由 `flush_writer` 回收。
	pub fn store_queues_via(&self, writer: &AsyncSnapshotWriter) -> Result<usize, ServiceError> {
		let mut queued = 0usize;
		let mut first_error = None;
		for queue in self.storable_queues() {
			let Some(stored) = take_snapshot(&queue, &mut first_error) else {
				continue;
			};
			if let Err(err) = writer.enqueue(stored) {
				queue.mark_dirty();
				warn!(queue_id = queue.id(), error = %err, "snapshot enqueue failed");
			} else {
				queued += 1;
			}
		}
		match first_error {
			Some(err) => Err(err),
			None => Ok(queued),
		}
	}

	/// 等待后台写入器写完，并把写入失败的队列重新标记为脏，留给下一轮保存。
	pub fn flush_writer(&self, writer: &AsyncSnapshotWriter) -> Result<(), ServiceError> {
		match writer.flush() {
			Err(StoreError::SnapshotsFailed { failures }) => {
				let queues = self.queues.read().expect("stat queues lock poisoned");
				for failure in &failures {
					// a queue removed in the meantime has nothing left to save
					if let Some(queue) = queues.get(&failure.queue_id) {
						queue.mark_dirty();
					}
				}
				warn!(failed = failures.len(), "snapshot saves failed, queues marked for retry");
				Err(StoreError::SnapshotsFailed { failures }.into())
			}
			other => Ok(other?),
		}
	}

	fn storable_queues(&self) -> Vec<Arc<StatQueue>> {
		let queues = self.queues.read().expect("stat queues lock poisoned");
		queues
			.iter()
			.filter(|queue| queue.config().store)
			.cloned()
			.collect()
	}

	fn queue(&self, queue_id: &str) -> Result<Arc<StatQueue>, ServiceError> {
		self.queues
			.read()
			.expect("stat queues lock poisoned")
			.get(queue_id)
			.ok_or(ServiceError::NotFound)
	}

	fn build_queue(&self, config: StatsConfig) -> Result<Arc<StatQueue>, ServiceError> {
		let queue_id = config.id.clone();
		let config = Arc::new(config);
		let stored = match self.store.stored_metrics(&queue_id) {
			Ok(stored) => stored,
			Err(err) => {
				error!(queue_id = %queue_id, error = %err, "stored snapshot unreadable, starting empty");
				None
			}
		};

		let queue = match stored {
			Some(stored) => {
				let restored = StatQueue::restore(
					self.cache.clone(),
					self.codec,
					config,
					self.sink.clone(),
					stored,
				)?;
				for failed in &restored.failed_metrics {
					error!(
						queue_id = %queue_id,
						metric_id = %failed.metric_id,
						error = %failed.error,
						"metric restore failed, restarting from zero"
					);
				}
				restored.queue
			}
			None => StatQueue::new(self.cache.clone(), self.codec, config, self.sink.clone())?,
		};
		Ok(Arc::new(queue))
	}
}

/// Dirty snapshot of `queue`; a build failure leaves the queue dirty and is
/// kept as the first error of the store pass.
fn take_snapshot(queue: &StatQueue, first_error: &mut Option<ServiceError>) -> Option<StoredMetrics> {
	record_snapshot(queue.id(), queue.take_dirty_snapshot(), first_error)
}

fn record_snapshot(
	queue_id: &str,
	result: Result<Option<StoredMetrics>, StatsError>,
	first_error: &mut Option<ServiceError>,
) -> Option<StoredMetrics> {
	match result {
		Ok(stored) => stored,
		Err(err) => {
			error!(queue_id, error = %err, "snapshot build failed");
			if first_error.is_none() {
				*first_error = Some(err.into());
			}
			None
		}
	}
}
