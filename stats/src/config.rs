use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use serde_yaml::Value as YamlValue;

use crate::constant::StatsError;
use crate::metric::StatMetric;

/// Carried for the dispatch layer; the queue never evaluates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RequestFilter {
    #[serde(rename = "Type")]
    pub filter_type: String,
    pub field_name: String,
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActivationInterval {
    #[serde(default)]
    pub activation_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expiry_time: Option<DateTime<Utc>>,
}

/// Configuration of one stat queue. Immutable once a queue is built from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatsConfig {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(default)]
    pub filters: Vec<RequestFilter>,
    #[serde(default)]
    pub activation_interval: Option<ActivationInterval>,
    /// 0 means unbounded.
    #[serde(default)]
    pub queue_length: usize,
    #[serde(rename = "TTL", default, with = "humantime_serde")]
    pub ttl: Option<Duration>,
    #[serde(default)]
    pub metrics: Vec<String>,
    #[serde(default)]
    pub store: bool,
    #[serde(default)]
    pub thresholds: Vec<String>,
    #[serde(default)]
    pub blocker: bool,
    #[serde(default)]
    pub weight: f64,
}

impl StatsConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            filters: Vec::new(),
            activation_interval: None,
            queue_length: 0,
            ttl: None,
            metrics: Vec::new(),
            store: false,
            thresholds: Vec::new(),
            blocker: false,
            weight: 0.0,
        }
    }

    /// TTL applied to new items; a zero TTL counts as none.
    pub fn effective_ttl(&self) -> Option<Duration> {
        self.ttl.filter(|ttl| !ttl.is_zero())
    }

    pub fn validate(&self) -> Result<(), StatsError> {
        if self.id.trim().is_empty() {
            return Err(StatsError::InvalidConfig {
                id: self.id.clone(),
                reason: "empty ID".to_string(),
            });
        }
        for metric_id in &self.metrics {
            StatMetric::from_id(metric_id).map_err(|error| StatsError::InvalidConfig {
                id: self.id.clone(),
                reason: error.to_string(),
            })?;
        }
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ConfigFile {
    List(Vec<StatsConfig>),
    Map(BTreeMap<String, StatsConfig>),
}

impl ConfigFile {
    fn into_configs(self) -> Vec<StatsConfig> {
        match self {
            Self::List(items) => items,
            Self::Map(items) => items.into_values().collect(),
        }
    }
}

pub struct StatsConfigLoader;

impl StatsConfigLoader {
    /// Reads a list (or an ID-keyed map) of configs from a `.json` or `.yaml` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Vec<StatsConfig>, StatsError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;

        let file: ConfigFile = match path.extension().and_then(|x| x.to_str()) {
            Some("json") => {
                let value: JsonValue = serde_json::from_str(&text)?;
                serde_json::from_value(value)?
            }
            Some("yaml") | Some("yml") => {
                let value: YamlValue = serde_yaml::from_str(&text)?;
                serde_yaml::from_value(value)?
            }
            _ => {
                return Err(StatsError::InvalidConfig {
                    id: path.display().to_string(),
                    reason: "unsupported config file format".to_string(),
                });
            }
        };

        let configs = file.into_configs();
        for config in &configs {
            config.validate()?;
        }
        Ok(configs)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{StatsConfig, StatsConfigLoader};

    #[test]
    fn yaml_map_with_human_ttl() {
        let path = std::env::temp_dir().join(format!(
            "stats_config_test_{}_{}.yaml",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        std::fs::write(
            &path,
            "Stats1:\n  ID: Stats1\n  QueueLength: 100\n  TTL: 1h\n  Metrics: ['*asr', '*acd']\n  Store: true\n  Weight: 20\n",
        )
        .expect("write config");

        let configs = StatsConfigLoader::load(&path).expect("load yaml");
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].id, "Stats1");
        assert_eq!(configs[0].ttl, Some(Duration::from_secs(3600)));
        assert_eq!(configs[0].metrics, vec!["*asr", "*acd"]);
        assert!(configs[0].store);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn json_list_rejects_unknown_metric() {
        let path = std::env::temp_dir().join(format!(
            "stats_config_test_{}_{}.json",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        std::fs::write(&path, r#"[{"ID":"Stats2","Metrics":["*asr","*pdd"]}]"#)
            .expect("write config");
        assert!(StatsConfigLoader::load(&path).is_err());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn zero_ttl_means_no_expiry() {
        let mut config = StatsConfig::new("Stats1");
        config.ttl = Some(Duration::ZERO);
        assert!(config.effective_ttl().is_none());
        assert!(StatsConfig::new(" ").validate().is_err());
    }
}
