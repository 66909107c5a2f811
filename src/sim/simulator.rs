//! 事件队列仿真器
//!
//! 定义事件驱动仿真器，维护当前时间与事件队列。
//! 同一时刻的事件按插入顺序（FIFO）执行；回调在"当前时刻"新调度的事件
//! 会落入下一个批次，在本批次全部执行完后才会被处理。

use super::event::Event;
use super::scheduled_event::ScheduledEvent;
use super::time::SimTime;
use super::world::World;
use std::collections::BinaryHeap;
use tracing::{debug, info, trace};

/// 事件驱动仿真器：维护当前时间与事件队列。
#[derive(Default)]
pub struct Simulator {
    now: SimTime,
    next_seq: u64,
    q: BinaryHeap<ScheduledEvent>,
}

impl Simulator {
    /// 获取当前仿真时间
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// 事件队列是否为空
    pub fn finished(&self) -> bool {
        self.q.is_empty()
    }

    /// 调度事件在指定时间执行。时间不得早于当前时间。
    #[tracing::instrument(skip(self, ev), fields(event_type = std::any::type_name::<E>(), schedule_at = ?at))]
    pub fn schedule<E: Event>(&mut self, at: SimTime, ev: E) {
        assert!(
            at >= self.now,
            "cannot schedule into the past: at={:?}, now={:?}",
            at,
            self.now
        );

        let seq = self.next_seq;
        trace!(now = ?self.now, seq, "调度事件");

        self.next_seq = self.next_seq.wrapping_add(1);
        self.q.push(ScheduledEvent {
            at,
            seq,
            ev: Box::new(ev),
        });

        debug!(queue_size = self.q.len(), "事件已加入队列");
    }

    /// 推进到最早的事件时刻，并执行该时刻的全部事件。
    ///
    /// 取出同一时刻的所有事件作为一个快照批次；批次内按 seq（插入顺序）执行。
    /// 回调在当前时刻新调度的事件不会进入本批次。
    pub fn proceed(&mut self, world: &mut dyn World) {
        assert!(!self.finished(), "proceed called on an empty event queue");

        let at = self.q.peek().expect("queue non-empty").at;
        assert!(at >= self.now, "event time went backwards");

        let mut batch = Vec::new();
        while let Some(top) = self.q.peek() {
            if top.at != at {
                break;
            }
            batch.push(self.q.pop().expect("peek then pop"));
        }

        self.now = at;
        debug!(now = ?self.now, batch_size = batch.len(), "推进到新时刻");

        for item in batch {
            trace!(seq = item.seq, "执行事件");
            item.ev.execute(self, world);
        }
    }

    /// 运行直到事件队列为空或到达 `until`。
    pub fn run_until(&mut self, until: SimTime, world: &mut dyn World) {
        while let Some(top) = self.q.peek() {
            if top.at > until {
                break;
            }
            self.proceed(world);
        }
        self.now = self.now.max(until);
    }

    /// 运行所有事件直到队列为空。
    #[tracing::instrument(skip(self, world))]
    pub fn run(&mut self, world: &mut dyn World) {
        info!("▶️  开始运行仿真");
        debug!(now = ?self.now, queue_size = self.q.len(), "初始状态");

        while !self.finished() {
            self.proceed(world);
        }

        info!(final_time = ?self.now, "✅ 仿真完成");
    }
}
