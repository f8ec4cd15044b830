//! 文件存储。
//!
//! 目录布局：
//! - `stats_configs.json`：全部队列配置（按 ID 排序的列表）。
//! - `<hex(queue id)>.snapshot`：单个队列的编码快照；文件名与队列 ID 一一对应。
//!
//! 所有写入先落临时文件再 rename，读方不会看到写了一半的内容。

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use stats::{Codec, StatsConfig, StatsConfigLoader, StoredMetrics};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::protocol::DataStore;

const CONFIGS_FILE: &str = "stats_configs.json";
const SNAPSHOT_EXTENSION: &str = "snapshot";

#[derive(Debug)]
pub struct FileStore {
	dir: PathBuf,
	codec: Codec,
	// serializes read-modify-write of the config file
	configs_lock: Mutex<()>,
}

impl FileStore {
	/// 打开（不存在则创建）存储目录。
	pub fn open(dir: impl AsRef<Path>, codec: Codec) -> Result<Self, StoreError> {
		let dir = dir.as_ref().to_path_buf();
		fs::create_dir_all(&dir).map_err(|source| StoreError::io(&dir, source))?;
		info!(dir = %dir.display(), codec = codec.as_str(), "file store opened");
		Ok(Self {
			dir,
			codec,
			configs_lock: Mutex::new(()),
		})
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	pub fn codec(&self) -> Codec {
		self.codec
	}

	/// 从外部 JSON/YAML 文件合并配置，返回导入数量。
	pub fn import_configs(&self, path: impl AsRef<Path>) -> Result<usize, StoreError> {
		let path = path.as_ref();
		let configs = StatsConfigLoader::load(path)?;
		let count = self.set_stats_configs(configs)?;
		info!(path = %path.display(), count, "stats configs imported");
		Ok(count)
	}

	pub fn snapshot_path(&self, queue_id: &str) -> PathBuf {
		self.dir
			.join(format!("{}.{SNAPSHOT_EXTENSION}", hex::encode(queue_id.as_bytes())))
	}

	fn configs_path(&self) -> PathBuf {
		self.dir.join(CONFIGS_FILE)
	}

	fn read_configs(&self) -> Result<Vec<StatsConfig>, StoreError> {
		let path = self.configs_path();
		if !path.exists() {
			return Ok(Vec::new());
		}
		Ok(StatsConfigLoader::load(&path)?)
	}
}

impl DataStore for FileStore {
	fn stats_configs(&self) -> Result<Vec<StatsConfig>, StoreError> {
		let _guard = self.configs_lock.lock().expect("file store configs lock poisoned");
		self.read_configs()
	}

	fn set_stats_config(&self, config: StatsConfig) -> Result<(), StoreError> {
		config.validate()?;
		let _guard = self.configs_lock.lock().expect("file store configs lock poisoned");

		let mut configs = self.read_configs()?;
		configs.retain(|existing| existing.id != config.id);
		configs.push(config);
		configs.sort_by(|a, b| a.id.cmp(&b.id));

		let bytes = serde_json::to_vec_pretty(&configs).map_err(stats::StatsError::from)?;
		write_atomic(&self.configs_path(), &bytes)
	}

	fn stored_metrics(&self, queue_id: &str) -> Result<Option<StoredMetrics>, StoreError> {
		let path = self.snapshot_path(queue_id);
		let bytes = match fs::read(&path) {
			Ok(bytes) => bytes,
			Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
			Err(source) => return Err(StoreError::io(path, source)),
		};
		let stored = StoredMetrics::decode(&bytes, self.codec)?;
		if stored.queue_id != queue_id {
			return Err(StoreError::QueueMismatch {
				expected: queue_id.to_string(),
				found: stored.queue_id,
			});
		}
		Ok(Some(stored))
	}

	fn set_stored_metrics(&self, stored: &StoredMetrics) -> Result<(), StoreError> {
		let bytes = stored.encode(self.codec)?;
		let path = self.snapshot_path(&stored.queue_id);
		write_atomic(&path, &bytes)?;
		debug!(queue_id = %stored.queue_id, bytes = bytes.len(), "snapshot written");
		Ok(())
	}
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
	let mut tmp = path.as_os_str().to_owned();
	tmp.push(".tmp");
	let tmp = PathBuf::from(tmp);

	fs::write(&tmp, bytes).map_err(|source| StoreError::io(&tmp, source))?;
	fs::rename(&tmp, path).map_err(|source| StoreError::io(path, source))
}
