use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use stats::{Codec, StatsConfig, StoredMetrics};

use crate::error::StoreError;
use crate::protocol::DataStore;

/// In-process store. Snapshots are kept encoded so every save and load goes
/// through the deployment codec.
#[derive(Debug, Default)]
pub struct MemoryStore {
	codec: Codec,
	configs: RwLock<BTreeMap<String, StatsConfig>>,
	snapshots: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
	pub fn new(codec: Codec) -> Self {
		Self {
			codec,
			configs: RwLock::new(BTreeMap::new()),
			snapshots: RwLock::new(HashMap::new()),
		}
	}

	pub fn with_configs(codec: Codec, configs: impl IntoIterator<Item = StatsConfig>) -> Self {
		let store = Self::new(codec);
		{
			let mut guard = store.configs.write().expect("memory store configs lock poisoned");
			for config in configs {
				guard.insert(config.id.clone(), config);
			}
		}
		store
	}

	pub fn codec(&self) -> Codec {
		self.codec
	}

	pub fn snapshot_count(&self) -> usize {
		self.snapshots
			.read()
			.expect("memory store snapshots lock poisoned")
			.len()
	}

	/// Raw encoded snapshot, for inspection.
	pub fn snapshot_bytes(&self, queue_id: &str) -> Option<Vec<u8>> {
		self.snapshots
			.read()
			.expect("memory store snapshots lock poisoned")
			.get(queue_id)
			.cloned()
	}
}

impl DataStore for MemoryStore {
	fn stats_configs(&self) -> Result<Vec<StatsConfig>, StoreError> {
		let guard = self.configs.read().expect("memory store configs lock poisoned");
		Ok(guard.values().cloned().collect())
	}

	fn set_stats_config(&self, config: StatsConfig) -> Result<(), StoreError> {
		config.validate()?;
		self.configs
			.write()
			.expect("memory store configs lock poisoned")
			.insert(config.id.clone(), config);
		Ok(())
	}

	fn stored_metrics(&self, queue_id: &str) -> Result<Option<StoredMetrics>, StoreError> {
		let bytes = {
			let guard = self.snapshots.read().expect("memory store snapshots lock poisoned");
			match guard.get(queue_id) {
				Some(bytes) => bytes.clone(),
				None => return Ok(None),
			}
		};
		Ok(Some(StoredMetrics::decode(&bytes, self.codec)?))
	}

	fn set_stored_metrics(&self, stored: &StoredMetrics) -> Result<(), StoreError> {
		let bytes = stored.encode(self.codec)?;
		self.snapshots
			.write()
			.expect("memory store snapshots lock poisoned")
			.insert(stored.queue_id.clone(), bytes);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use stats::{Codec, QueueItem, StatsConfig, StoredMetrics};

	use super::MemoryStore;
	use crate::protocol::DataStore;

	#[test]
	fn configs_replace_by_id() {
		let store = MemoryStore::new(Codec::Json);
		let mut config = StatsConfig::new("Stats1");
		store.set_stats_config(config.clone()).expect("set");
		config.queue_length = 5;
		store.set_stats_config(config).expect("replace");

		let configs = store.stats_configs().expect("configs");
		assert_eq!(configs.len(), 1);
		assert_eq!(configs[0].queue_length, 5);
	}

	#[test]
	fn invalid_config_is_rejected() {
		let store = MemoryStore::new(Codec::Json);
		let mut config = StatsConfig::new("Stats1");
		config.metrics = vec!["*tcc".to_string()];
		assert!(store.set_stats_config(config).is_err());
		assert!(store.stats_configs().expect("configs").is_empty());
	}

	#[test]
	fn snapshots_are_held_encoded() {
		let store = MemoryStore::new(Codec::Binary);
		assert!(store.stored_metrics("Stats1").expect("load").is_none());

		let stored = StoredMetrics {
			queue_id: "Stats1".to_string(),
			items: vec![QueueItem::new("ev1", None)],
			..StoredMetrics::default()
		};
		store.set_stored_metrics(&stored).expect("save");

		let bytes = store.snapshot_bytes("Stats1").expect("bytes");
		assert_eq!(StoredMetrics::decode(&bytes, Codec::Binary).expect("decode"), stored);
		assert_eq!(store.stored_metrics("Stats1").expect("load"), Some(stored));
		assert_eq!(store.snapshot_count(), 1);
	}
}
