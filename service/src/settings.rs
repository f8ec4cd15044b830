use std::path::PathBuf;
use std::time::Duration;

use stats::Codec;

const DEFAULT_DATA_DIR: &str = "./data/stats";
const DEFAULT_STORE_INTERVAL_SECS: u64 = 10;
const DEFAULT_WRITER_CAPACITY: usize = 1_024;

/// 进程级配置，全部来自环境变量；非法值回退默认。
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSettings {
	pub codec: Codec,
	pub data_dir: PathBuf,
	pub config_path: Option<PathBuf>,
	pub store_interval: Duration,
	pub writer_capacity: usize,
}

impl Default for ServiceSettings {
	fn default() -> Self {
		Self {
			codec: Codec::Json,
			data_dir: PathBuf::from(DEFAULT_DATA_DIR),
			config_path: None,
			store_interval: Duration::from_secs(DEFAULT_STORE_INTERVAL_SECS),
			writer_capacity: DEFAULT_WRITER_CAPACITY,
		}
	}
}

impl ServiceSettings {
	pub fn from_env() -> Self {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
		let defaults = Self::default();
		Self {
			codec: lookup("STATS_CODEC")
				.and_then(|value| Codec::parse(&value).ok())
				.unwrap_or(defaults.codec),
			data_dir: non_empty(lookup("STATS_DATA_DIR"))
				.map(PathBuf::from)
				.unwrap_or(defaults.data_dir),
			config_path: non_empty(lookup("STATS_CONFIG_PATH")).map(PathBuf::from),
			store_interval: parse_positive::<u64>(lookup("STATS_STORE_INTERVAL_SECS"))
				.map(Duration::from_secs)
				.unwrap_or(defaults.store_interval),
			writer_capacity: parse_positive::<usize>(lookup("STATS_WRITER_CAPACITY"))
				.unwrap_or(defaults.writer_capacity),
		}
	}
}

fn non_empty(value: Option<String>) -> Option<String> {
	value
		.map(|value| value.trim().to_string())
		.filter(|value| !value.is_empty())
}

fn parse_positive<T>(value: Option<String>) -> Option<T>
where
	T: std::str::FromStr + PartialOrd + Default,
{
	value
		.and_then(|value| value.trim().parse::<T>().ok())
		.filter(|value| *value > T::default())
}
