use crate::codec::Codec;
use crate::constant::StatsError;
use crate::event::StatsEvent;

/// 可增量维护、可精确回滚的聚合指标。
pub trait Metric: Send + Sync {
    fn metric_id(&self) -> &'static str;
    fn add_event(&mut self, event: &StatsEvent) -> Result<(), StatsError>;
    /// 精确撤销一次先前对同一事件的 `add_event`。
    fn rem_event(&mut self, event: &StatsEvent) -> Result<(), StatsError>;
    fn string_value(&self) -> String;
    fn float_value(&self) -> Option<f64>;
    fn marshal(&self, codec: Codec) -> Result<Vec<u8>, StatsError>;
    /// Leaves the metric untouched when decoding fails.
    fn unmarshal(&mut self, bytes: &[u8], codec: Codec) -> Result<(), StatsError>;
}
