use thiserror::Error;

pub const META_ASR: &str = "*asr";
pub const META_ACD: &str = "*acd";

/// 比率类指标无数据时的显示值。
pub const NOT_AVAILABLE: &str = "N/A";

/// 调用成功时的回复标记。
pub const OK: &str = "OK";

pub struct Const;

impl Const {
    pub const MIN_CACHE_SHARDS: usize = 8;
    pub const MAX_CACHE_SHARDS: usize = 128;
}

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("unsupported metric: {0}")]
    UnknownMetric(String),
    #[error("invalid stats config {id:?}: {reason}")]
    InvalidConfig { id: String, reason: String },
    #[error("invalid event: {0}")]
    InvalidEvent(String),
    #[error("metric {metric} would drop below zero")]
    MetricUnderflow { metric: &'static str },
    #[error("event {event_id}: end time precedes answer time")]
    NegativeDuration { event_id: String },
    #[error("metric {metric_id} snapshot failed: {source}")]
    MetricSnapshot {
        metric_id: String,
        #[source]
        source: Box<StatsError>,
    },
    #[error("unsupported codec: {0}")]
    UnknownCodec(String),
    #[error("json codec error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("binary codec error: {0}")]
    Binary(#[from] bincode::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
