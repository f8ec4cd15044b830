//! 序列化策略。
//!
//! 同一部署内统一选用一种：`Json`（可读、便于排查）或 `Binary`（bincode，紧凑）。
//! 指标累加器与队列快照都经由此处编码。

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::constant::StatsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    #[default]
    Json,
    Binary,
}

impl Codec {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Binary => "binary",
        }
    }

    pub fn parse(value: &str) -> Result<Self, StatsError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "binary" | "bincode" => Ok(Self::Binary),
            _ => Err(StatsError::UnknownCodec(value.to_string())),
        }
    }

    pub fn encode<T: Serialize>(self, value: &T) -> Result<Vec<u8>, StatsError> {
        match self {
            Self::Json => Ok(serde_json::to_vec(value)?),
            Self::Binary => Ok(bincode::serialize(value)?),
        }
    }

    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T, StatsError> {
        match self {
            Self::Json => Ok(serde_json::from_slice(bytes)?),
            Self::Binary => Ok(bincode::deserialize(bytes)?),
        }
    }
}
