//! 仿真时间
//!
//! 事件时间戳：非负整数纳秒，单调不减。
//! 64 位宽度足以覆盖长时间的仿真。

/// 仿真时刻（纳秒）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct SimTime(pub u64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0);
}
