use crate::codec::Codec;
use crate::constant::{META_ACD, META_ASR, StatsError};
use crate::event::StatsEvent;

use super::acd::AcdMetric;
use super::asr::AsrMetric;
use super::core::Metric;

/// The closed set of metrics a queue can be configured with.
#[derive(Debug, Clone, PartialEq)]
pub enum StatMetric {
    Asr(AsrMetric),
    Acd(AcdMetric),
}

impl StatMetric {
    /// Builds a zeroed metric for a configured metric ID.
    pub fn from_id(metric_id: &str) -> Result<Self, StatsError> {
        match metric_id {
            META_ASR => Ok(Self::Asr(AsrMetric::new())),
            META_ACD => Ok(Self::Acd(AcdMetric::new())),
            other => Err(StatsError::UnknownMetric(other.to_string())),
        }
    }

    fn inner(&self) -> &dyn Metric {
        match self {
            Self::Asr(metric) => metric,
            Self::Acd(metric) => metric,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Metric {
        match self {
            Self::Asr(metric) => metric,
            Self::Acd(metric) => metric,
        }
    }
}

impl Metric for StatMetric {
    fn metric_id(&self) -> &'static str {
        self.inner().metric_id()
    }

    fn add_event(&mut self, event: &StatsEvent) -> Result<(), StatsError> {
        self.inner_mut().add_event(event)
    }

    fn rem_event(&mut self, event: &StatsEvent) -> Result<(), StatsError> {
        self.inner_mut().rem_event(event)
    }

    fn string_value(&self) -> String {
        self.inner().string_value()
    }

    fn float_value(&self) -> Option<f64> {
        self.inner().float_value()
    }

    fn marshal(&self, codec: Codec) -> Result<Vec<u8>, StatsError> {
        self.inner().marshal(codec)
    }

    fn unmarshal(&mut self, bytes: &[u8], codec: Codec) -> Result<(), StatsError> {
        self.inner_mut().unmarshal(bytes, codec)
    }
}
