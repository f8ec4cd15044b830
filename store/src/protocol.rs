use stats::{StatsConfig, StoredMetrics};

use crate::error::StoreError;

/// Persistence boundary for queue configs and snapshots.
///
/// Implementations are shared between the service and the background writer,
/// so every method takes `&self`.
pub trait DataStore: Send + Sync {
	fn stats_configs(&self) -> Result<Vec<StatsConfig>, StoreError>;

	/// Inserts or replaces the config with the same ID.
	fn set_stats_config(&self, config: StatsConfig) -> Result<(), StoreError>;

	/// `Ok(None)` when the queue has never been saved.
	fn stored_metrics(&self, queue_id: &str) -> Result<Option<StoredMetrics>, StoreError>;

	fn set_stored_metrics(&self, stored: &StoredMetrics) -> Result<(), StoreError>;

	fn set_stats_configs(&self, configs: Vec<StatsConfig>) -> Result<usize, StoreError> {
		let count = configs.len();
		for config in configs {
			self.set_stats_config(config)?;
		}
		Ok(count)
	}
}
