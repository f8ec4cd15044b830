use serde::{Deserialize, Serialize};

use crate::codec::Codec;
use crate::constant::{META_ASR, NOT_AVAILABLE, StatsError};
use crate::event::StatsEvent;

use super::core::Metric;

/// Answer-seizure ratio: answered events over all events seen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsrMetric {
    answered: u64,
    count: u64,
}

impl AsrMetric {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answered(&self) -> u64 {
        self.answered
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    fn ratio(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        Some(self.answered as f64 / self.count as f64 * 100.0)
    }
}

impl Metric for AsrMetric {
    fn metric_id(&self) -> &'static str {
        META_ASR
    }

    fn add_event(&mut self, event: &StatsEvent) -> Result<(), StatsError> {
        if event.is_answered() {
            self.answered += 1;
        }
        self.count += 1;
        Ok(())
    }

    fn rem_event(&mut self, event: &StatsEvent) -> Result<(), StatsError> {
        let answered = if event.is_answered() {
            self.answered.checked_sub(1)
        } else {
            Some(self.answered)
        };
        match (answered, self.count.checked_sub(1)) {
            (Some(answered), Some(count)) if answered <= count => {
                self.answered = answered;
                self.count = count;
                Ok(())
            }
            _ => Err(StatsError::MetricUnderflow { metric: META_ASR }),
        }
    }

    fn string_value(&self) -> String {
        match self.ratio() {
            Some(ratio) => format!("{ratio:.5}%"),
            None => NOT_AVAILABLE.to_string(),
        }
    }

    fn float_value(&self) -> Option<f64> {
        self.ratio()
    }

    fn marshal(&self, codec: Codec) -> Result<Vec<u8>, StatsError> {
        codec.encode(self)
    }

    fn unmarshal(&mut self, bytes: &[u8], codec: Codec) -> Result<(), StatsError> {
        *self = codec.decode(bytes)?;
        Ok(())
    }
}
