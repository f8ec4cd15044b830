use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::Codec;
use crate::constant::{META_ACD, StatsError};
use crate::event::StatsEvent;

use super::core::Metric;

/// Average call duration over answered events that also carry an end time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcdMetric {
    sum: Duration,
    count: u64,
}

impl AcdMetric {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn average(&self) -> Option<Duration> {
        if self.count == 0 {
            return None;
        }
        let nanos = self.sum.as_nanos() / u128::from(self.count);
        Some(Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX)))
    }
}

impl Metric for AcdMetric {
    fn metric_id(&self) -> &'static str {
        META_ACD
    }

    fn add_event(&mut self, event: &StatsEvent) -> Result<(), StatsError> {
        let Some(duration) = event.call_duration() else {
            return Ok(());
        };
        let duration = duration?;
        self.sum = self
            .sum
            .checked_add(duration)
            .ok_or_else(|| StatsError::InvalidEvent(format!("{}: duration overflow", event.id)))?;
        self.count += 1;
        Ok(())
    }

    fn rem_event(&mut self, event: &StatsEvent) -> Result<(), StatsError> {
        let Some(duration) = event.call_duration() else {
            return Ok(());
        };
        let duration = duration?;
        match (self.sum.checked_sub(duration), self.count.checked_sub(1)) {
            (Some(sum), Some(count)) => {
                self.sum = sum;
                self.count = count;
                Ok(())
            }
            _ => Err(StatsError::MetricUnderflow { metric: META_ACD }),
        }
    }

    fn string_value(&self) -> String {
        self.average()
            .map(|avg| humantime::format_duration(avg).to_string())
            .unwrap_or_default()
    }

    fn float_value(&self) -> Option<f64> {
        self.average().map(|avg| avg.as_secs_f64())
    }

    fn marshal(&self, codec: Codec) -> Result<Vec<u8>, StatsError> {
        codec.encode(self)
    }

    fn unmarshal(&mut self, bytes: &[u8], codec: Codec) -> Result<(), StatsError> {
        *self = codec.decode(bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::AcdMetric;
    use crate::event::StatsEvent;
    use crate::metric::Metric;

    fn call(id: &str, secs: i64) -> StatsEvent {
        let answer = Utc.with_ymd_and_hms(2014, 7, 14, 14, 25, 0).unwrap();
        StatsEvent::new(id)
            .with_answer_time(answer)
            .with_end_time(answer + Duration::seconds(secs))
    }

    #[test]
    fn empty_until_a_duration_sample_arrives() {
        let mut acd = AcdMetric::new();
        assert_eq!(acd.string_value(), "");

        acd.add_event(&StatsEvent::new("ev1").with_answer_time(Utc::now()))
            .expect("partial event is a no-op");
        assert_eq!(acd.string_value(), "");
        assert!(acd.float_value().is_none());
    }

    #[test]
    fn averages_and_rolls_back() {
        let mut acd = AcdMetric::new();
        acd.add_event(&call("ev1", 60)).expect("add");
        acd.add_event(&call("ev2", 120)).expect("add");
        assert_eq!(acd.string_value(), "1m 30s");
        assert_eq!(acd.float_value(), Some(90.0));

        acd.rem_event(&call("ev2", 120)).expect("rem");
        assert_eq!(acd.string_value(), "1m");
        acd.rem_event(&call("ev1", 60)).expect("rem");
        assert_eq!(acd, AcdMetric::new());
    }

    #[test]
    fn negative_duration_is_an_error() {
        let mut acd = AcdMetric::new();
        assert!(acd.add_event(&call("ev1", -5)).is_err());
        assert_eq!(acd.count(), 0);
    }
}
