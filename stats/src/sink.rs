//! 队列告警出口。
//!
//! 队列在构造时注入 `WarningSink`，不直接依赖全局日志。

use std::fmt::{Display, Formatter};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Eviction,
    Snapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricOp {
    Add,
    Remove,
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Eviction => write!(f, "eviction"),
            Self::Snapshot => write!(f, "snapshot"),
        }
    }
}

impl Display for MetricOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Add => write!(f, "add"),
            Self::Remove => write!(f, "remove"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueWarning {
    EventNotCached {
        queue_id: String,
        event_id: String,
        stage: Stage,
    },
    MetricFailed {
        queue_id: String,
        metric_id: String,
        event_id: String,
        op: MetricOp,
        reason: String,
    },
}

pub trait WarningSink: Send + Sync {
    fn warn(&self, warning: QueueWarning);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl WarningSink for TracingSink {
    fn warn(&self, warning: QueueWarning) {
        match warning {
            QueueWarning::EventNotCached {
                queue_id,
                event_id,
                stage,
            } => {
                tracing::warn!(queue_id = %queue_id, event_id = %event_id, stage = %stage, "event not cached");
            }
            QueueWarning::MetricFailed {
                queue_id,
                metric_id,
                event_id,
                op,
                reason,
            } => {
                tracing::warn!(
                    queue_id = %queue_id,
                    metric_id = %metric_id,
                    event_id = %event_id,
                    op = %op,
                    error = %reason,
                    "metric update failed"
                );
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct MemorySink {
    warnings: Mutex<Vec<QueueWarning>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warnings(&self) -> Vec<QueueWarning> {
        self.warnings.lock().expect("memory sink poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.warnings.lock().expect("memory sink poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl WarningSink for MemorySink {
    fn warn(&self, warning: QueueWarning) {
        self.warnings
            .lock()
            .expect("memory sink poisoned")
            .push(warning);
    }
}
