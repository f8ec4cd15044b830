//! 异步快照写入。
//!
//! 后台线程 + 有界队列：调用方非阻塞入队，写盘在后台完成，
//! 队列锁与 IO 不会同时持有。

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use stats::StoredMetrics;
use tracing::{debug, error};

use crate::error::{SnapshotFailure, StoreError};
use crate::protocol::DataStore;

/// `AsyncSnapshotWriter` 初始化配置。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsyncSnapshotWriterConfig {
	/// 后台写线程入队容量（有界队列）。
	pub queue_capacity: usize,
}

impl Default for AsyncSnapshotWriterConfig {
	fn default() -> Self {
		Self { queue_capacity: 1_024 }
	}
}

enum WriterMessage {
	Save(StoredMetrics),
	Flush(Sender<Result<(), StoreError>>),
	Shutdown(Sender<Result<(), StoreError>>),
}

pub struct AsyncSnapshotWriter {
	sender: Sender<WriterMessage>,
	worker: Option<JoinHandle<()>>,
}

impl AsyncSnapshotWriter {
	pub fn spawn(store: Arc<dyn DataStore>, config: AsyncSnapshotWriterConfig) -> Result<Self, StoreError> {
		let queue_capacity = config.queue_capacity.max(1);
		let (tx, rx) = channel::bounded(queue_capacity);

		let worker = thread::Builder::new()
			.name("stats-snapshot-writer".to_string())
			.spawn(move || run_writer_worker(store, rx))
			.map_err(|source| StoreError::io("stats-snapshot-writer", source))?;

		Ok(Self {
			sender: tx,
			worker: Some(worker),
		})
	}

	/// 非阻塞入队一份快照。
	///
	/// 队列已满时返回 `QueueFull`，快照被丢弃，由调用方决定是否重试。
	pub fn enqueue(&self, stored: StoredMetrics) -> Result<(), StoreError> {
		match self.sender.try_send(WriterMessage::Save(stored)) {
			Ok(()) => Ok(()),
			Err(TrySendError::Full(_)) => Err(StoreError::QueueFull),
			Err(TrySendError::Disconnected(_)) => Err(StoreError::Disconnected),
		}
	}

	/// 等待已入队快照全部写完。
	///
	/// 上次 flush 以来写入失败的快照以 `SnapshotsFailed` 返回（含队列 ID），
	/// 由调用方决定重试。
	pub fn flush(&self) -> Result<(), StoreError> {
		let (ack_tx, ack_rx) = channel::bounded(1);
		self.sender
			.send(WriterMessage::Flush(ack_tx))
			.map_err(|_| StoreError::Disconnected)?;
		ack_rx.recv().map_err(|_| StoreError::Disconnected)?
	}

	/// 关闭写入器并等待后台线程退出。
	pub fn close(mut self) -> Result<(), StoreError> {
		self.shutdown_and_join()
	}

	pub fn pending(&self) -> usize {
		self.sender.len()
	}

	fn shutdown_and_join(&mut self) -> Result<(), StoreError> {
		let Some(worker) = self.worker.take() else {
			return Ok(());
		};

		let (ack_tx, ack_rx) = channel::bounded(1);
		let ack_result = match self.sender.send(WriterMessage::Shutdown(ack_tx)) {
			Ok(()) => ack_rx.recv().unwrap_or(Err(StoreError::Disconnected)),
			Err(_) => Ok(()),
		};

		worker.join().map_err(|_| StoreError::WorkerPanicked)?;
		ack_result
	}
}

impl Drop for AsyncSnapshotWriter {
	fn drop(&mut self) {
		if let Err(error) = self.shutdown_and_join() {
			error!(%error, "snapshot writer shutdown failed");
		}
	}
}

fn run_writer_worker(store: Arc<dyn DataStore>, rx: Receiver<WriterMessage>) {
	let mut failures: Vec<SnapshotFailure> = Vec::new();
	while let Ok(message) = rx.recv() {
		match message {
			WriterMessage::Save(stored) => match store.set_stored_metrics(&stored) {
				Ok(()) => debug!(queue_id = %stored.queue_id, "snapshot saved"),
				Err(error) => {
					error!(queue_id = %stored.queue_id, %error, "snapshot save failed");
					failures.push(SnapshotFailure {
						queue_id: stored.queue_id,
						error,
					});
				}
			},
			WriterMessage::Flush(ack_tx) => {
				let _ = ack_tx.send(drain_failures(&mut failures));
			}
			WriterMessage::Shutdown(ack_tx) => {
				let _ = ack_tx.send(drain_failures(&mut failures));
				break;
			}
		}
	}
}

fn drain_failures(failures: &mut Vec<SnapshotFailure>) -> Result<(), StoreError> {
	if failures.is_empty() {
		return Ok(());
	}
	Err(StoreError::SnapshotsFailed {
		failures: std::mem::take(failures),
	})
}
