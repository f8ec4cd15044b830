//! 队列持久化快照。
//!
//! 只保存窗口内仍存活的事件、队列条目与各指标累加器，重启后无需回放原始话单。

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::Codec;
use crate::constant::StatsError;
use crate::event::StatsEvent;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueueItem {
    #[serde(rename = "EventID")]
    pub event_id: String,
    #[serde(default)]
    pub expiry_time: Option<DateTime<Utc>>,
}

impl QueueItem {
    pub fn new(event_id: impl Into<String>, expiry_time: Option<DateTime<Utc>>) -> Self {
        Self {
            event_id: event_id.into(),
            expiry_time,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry_time.is_some_and(|expiry| expiry <= now)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StoredMetrics {
    #[serde(rename = "QueueID")]
    pub queue_id: String,
    #[serde(default)]
    pub events: BTreeMap<String, StatsEvent>,
    #[serde(default)]
    pub items: Vec<QueueItem>,
    #[serde(default)]
    pub metrics: BTreeMap<String, Vec<u8>>,
}

impl StoredMetrics {
    pub fn encode(&self, codec: Codec) -> Result<Vec<u8>, StatsError> {
        codec.encode(self)
    }

    pub fn decode(bytes: &[u8], codec: Codec) -> Result<Self, StatsError> {
        codec.decode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::{QueueItem, StoredMetrics};
    use crate::codec::Codec;
    use crate::event::StatsEvent;

    #[test]
    fn expiry_is_inclusive_of_now() {
        let now = Utc::now();
        assert!(QueueItem::new("ev1", Some(now)).is_expired(now));
        assert!(!QueueItem::new("ev1", Some(now + Duration::seconds(1))).is_expired(now));
        assert!(!QueueItem::new("ev1", None).is_expired(now));
    }

    #[test]
    fn binary_snapshot_keeps_events_and_metric_bytes() {
        let mut stored = StoredMetrics {
            queue_id: "Stats1".to_string(),
            ..StoredMetrics::default()
        };
        stored.events.insert(
            "ev1".to_string(),
            StatsEvent::new("ev1")
                .with_answer_time(Utc::now())
                .with_field("Account", "1001"),
        );
        stored
            .items
            .push(QueueItem::new("ev1", Some(Utc::now() + Duration::minutes(5))));
        stored.metrics.insert("*asr".to_string(), vec![1, 2, 3]);

        let bytes = stored.encode(Codec::Binary).expect("encode");
        let decoded = StoredMetrics::decode(&bytes, Codec::Binary).expect("decode");
        assert_eq!(decoded, stored);
    }
}
