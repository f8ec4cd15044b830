pub mod acd;
pub mod asr;
pub mod core;
pub mod kind;

pub use acd::AcdMetric;
pub use asr::AsrMetric;
pub use self::core::Metric;
pub use kind::StatMetric;
