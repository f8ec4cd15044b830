use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constant::StatsError;

/// 一条话单/会话事件。
///
/// 入缓存后不可变，队列只持有其 ID。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatsEvent {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(default)]
    pub setup_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub answer_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl StatsEvent {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            setup_time: None,
            answer_time: None,
            end_time: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_setup_time(mut self, at: DateTime<Utc>) -> Self {
        self.setup_time = Some(at);
        self
    }

    pub fn with_answer_time(mut self, at: DateTime<Utc>) -> Self {
        self.answer_time = Some(at);
        self
    }

    pub fn with_end_time(mut self, at: DateTime<Utc>) -> Self {
        self.end_time = Some(at);
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn is_answered(&self) -> bool {
        self.answer_time.is_some()
    }

    /// `end_time - answer_time`; `None` unless both are present.
    pub fn call_duration(&self) -> Option<Result<Duration, StatsError>> {
        let (answer, end) = (self.answer_time?, self.end_time?);
        Some(
            (end - answer)
                .to_std()
                .map_err(|_| StatsError::NegativeDuration {
                    event_id: self.id.clone(),
                }),
        )
    }
}
