//! 已调度事件
//!
//! 事件队列中的一个条目：执行时刻、进入队列的序号，以及事件本身。
//! 序号在同一时刻内保持先进先出。

use super::event::Event;
use super::time::SimTime;
use std::cmp::Ordering;

pub struct ScheduledEvent {
    pub(crate) at: SimTime,
    pub(crate) seq: u64,
    pub(crate) ev: Box<dyn Event>,
}

impl ScheduledEvent {
    /// 排序键：先按时刻，再按进入队列的序号。
    fn key(&self) -> (SimTime, u64) {
        (self.at, self.seq)
    }
}

// 标准库的 BinaryHeap 是最大堆，这里把比较反过来，
// 让时刻最早（同一时刻则序号最小）的事件浮到堆顶。
impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ScheduledEvent {}
