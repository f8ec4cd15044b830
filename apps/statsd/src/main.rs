use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use service::{ServiceError, ServiceSettings, StatService};
use stats::StatsEvent;
use store::{AsyncSnapshotWriter, AsyncSnapshotWriterConfig, DataStore, FileStore};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// One stdin line: an event already routed to its queue.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RoutedEvent {
	#[serde(rename = "QueueID")]
	queue_id: String,
	event: StatsEvent,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
	stats::init_logging();

	let settings = ServiceSettings::from_env();
	info!(
		codec = settings.codec.as_str(),
		data_dir = %settings.data_dir.display(),
		store_interval = ?settings.store_interval,
		writer_capacity = settings.writer_capacity,
		"statsd starting"
	);

	let file_store = Arc::new(FileStore::open(&settings.data_dir, settings.codec)?);
	if let Some(path) = &settings.config_path {
		file_store.import_configs(path)?;
	}
	let store: Arc<dyn DataStore> = file_store;

	let service = Arc::new(StatService::new(store.clone(), settings.codec));
	service.load_queues()?;

	let writer = Arc::new(AsyncSnapshotWriter::spawn(
		store,
		AsyncSnapshotWriterConfig {
			queue_capacity: settings.writer_capacity,
		},
	)?);

	let (shutdown_tx, shutdown_rx) = watch::channel(false);
	let store_task = tokio::spawn(run_periodic_store(
		service.clone(),
		writer.clone(),
		settings.store_interval,
		shutdown_rx,
	));

	let (processed, rejected) = process_stdin(&service).await?;
	info!(processed, rejected, "input drained");

	let _ = shutdown_tx.send(true);
	if let Err(error) = store_task.await {
		error!(%error, "periodic store task failed");
	}

	let final_service = service.clone();
	let final_writer = writer.clone();
	let queued = tokio::task::spawn_blocking(move || -> Result<usize, ServiceError> {
		let queued = final_service.store_queues_via(&final_writer)?;
		final_service.flush_writer(&final_writer)?;
		Ok(queued)
	})
	.await??;
	info!(queued, "final snapshots stored");

	let mut report = BTreeMap::new();
	for queue_id in service.queue_ids().unwrap_or_default() {
		report.insert(queue_id.clone(), service.string_metrics(&queue_id)?);
	}
	println!("{}", serde_json::to_string_pretty(&report)?);
	Ok(())
}

async fn process_stdin(service: &StatService) -> std::io::Result<(u64, u64)> {
	let mut lines = BufReader::new(tokio::io::stdin()).lines();
	let mut processed = 0u64;
	let mut rejected = 0u64;

	while let Some(line) = lines.next_line().await? {
		let line = line.trim();
		if line.is_empty() {
			continue;
		}
		let routed = match serde_json::from_str::<RoutedEvent>(line) {
			Ok(routed) => routed,
			Err(error) => {
				warn!(%error, "malformed input line skipped");
				rejected += 1;
				continue;
			}
		};
		let event_id = routed.event.id.clone();
		match service.process_event(&routed.queue_id, routed.event) {
			Ok(_) => processed += 1,
			Err(error) => {
				warn!(queue_id = %routed.queue_id, event_id = %event_id, %error, "event rejected");
				rejected += 1;
			}
		}
	}
	Ok((processed, rejected))
}

async fn run_periodic_store(
	service: Arc<StatService>,
	writer: Arc<AsyncSnapshotWriter>,
	period: Duration,
	mut shutdown: watch::Receiver<bool>,
) {
	let mut ticker = tokio::time::interval(period);
	// the first tick completes immediately
	ticker.tick().await;

	loop {
		tokio::select! {
			_ = ticker.tick() => {
				let service = service.clone();
				let writer = writer.clone();
				let round = tokio::task::spawn_blocking(move || -> Result<usize, ServiceError> {
					let queued = service.store_queues_via(&writer);
					// failed saves are marked dirty again for the next tick
					let flushed = service.flush_writer(&writer);
					let queued = queued?;
					flushed?;
					Ok(queued)
				});
				match round.await {
					Ok(Ok(0)) => {}
					Ok(Ok(queued)) => debug!(queued, "dirty queues handed to writer"),
					Ok(Err(error)) => error!(%error, "periodic store failed"),
					Err(error) => error!(%error, "periodic store task panicked"),
				}
			}
			changed = shutdown.changed() => {
				if changed.is_err() || *shutdown.borrow() {
					break;
				}
			}
		}
	}
}
