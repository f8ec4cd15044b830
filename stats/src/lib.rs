pub mod codec;
pub mod config;
pub mod constant;
pub mod event;
pub mod event_cache;
pub mod logging;
pub mod metric;
pub mod queue;
pub mod registry;
pub mod sink;
pub mod snapshot;

pub use codec::Codec;
pub use config::{ActivationInterval, RequestFilter, StatsConfig, StatsConfigLoader};
pub use constant::{META_ACD, META_ASR, NOT_AVAILABLE, OK, StatsError};
pub use event::StatsEvent;
pub use event_cache::StatsEventCache;
pub use logging::init_logging;
pub use metric::{AcdMetric, AsrMetric, Metric, StatMetric};
pub use queue::{MetricRestoreError, Restored, StatQueue};
pub use registry::StatQueues;
pub use sink::{MemorySink, MetricOp, QueueWarning, Stage, TracingSink, WarningSink};
pub use snapshot::{QueueItem, StoredMetrics};
