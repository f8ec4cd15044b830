use std::path::PathBuf;

use stats::StatsError;
use thiserror::Error;

/// One background save that did not reach the store.
#[derive(Debug)]
pub struct SnapshotFailure {
	pub queue_id: String,
	pub error: StoreError,
}

#[derive(Debug, Error)]
pub enum StoreError {
	#[error("io error at {}: {source}", path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error(transparent)]
	Codec(#[from] StatsError),
	#[error("snapshot file for {expected} holds queue {found}")]
	QueueMismatch { expected: String, found: String },
	#[error("{} snapshot save(s) failed: {}", failures.len(), describe_failures(failures))]
	SnapshotsFailed { failures: Vec<SnapshotFailure> },
	#[error("snapshot writer queue is full")]
	QueueFull,
	#[error("snapshot writer is disconnected")]
	Disconnected,
	#[error("snapshot writer worker panicked")]
	WorkerPanicked,
}

impl StoreError {
	pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
		Self::Io {
			path: path.into(),
			source,
		}
	}
}

fn describe_failures(failures: &[SnapshotFailure]) -> String {
	failures
		.iter()
		.map(|failure| format!("{}: {}", failure.queue_id, failure.error))
		.collect::<Vec<_>>()
		.join("; ")
}
