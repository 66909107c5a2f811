//! 链路类型
//!
//! 定义网络链路及其传输时延计算。链路是一个按方向建模的状态机：
//! 空闲（free）、发送中（busy）、重配置中（busy，等待重配置完成事件）、
//! 排空中（draining，等待重配置，不再接收新数据块）。

use super::chunk::Chunk;
use super::chunk_arrival::ChunkArrival;
use crate::sim::{SimTime, Simulator};
use tracing::{debug, trace};

/// 带宽换算：GB/s -> B/ns。
/// 本实现采用 SI 十进制约定：1 GB/s = 10^9 B / 10^9 ns = 1 B/ns，换算为恒等。
pub(crate) fn bw_gbps_to_bpns(bandwidth_gbps: f64) -> f64 {
    bandwidth_gbps
}

/// 网络链路
#[derive(Debug)]
pub struct Link {
    /// 带宽（GB/s）。0 表示链路存在但当前不可用。
    bandwidth_gbps: f64,
    /// 带宽（B/ns），实际计算使用的缓存值
    bandwidth_bpns: f64,
    /// 链路时延（ns），每次经过链路加一次
    latency_ns: f64,
    /// 是否正在发送（或重配置中）
    busy: bool,
    /// 是否处于排空阶段
    draining: bool,
}

impl Link {
    /// 创建新链路
    pub fn new(bandwidth_gbps: f64, latency_ns: f64) -> Self {
        assert!(bandwidth_gbps >= 0.0, "bandwidth must be nonnegative");
        assert!(latency_ns >= 0.0, "latency must be nonnegative");
        Self {
            bandwidth_gbps,
            bandwidth_bpns: bw_gbps_to_bpns(bandwidth_gbps),
            latency_ns,
            busy: false,
            draining: false,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn set_busy(&mut self) {
        self.busy = true;
    }

    pub fn set_free(&mut self) {
        self.busy = false;
    }

    pub fn is_draining(&self) -> bool {
        self.draining
    }

    pub(crate) fn set_draining(&mut self, draining: bool) {
        self.draining = draining;
    }

    /// 链路带宽（GB/s）
    pub fn bandwidth_gbps(&self) -> f64 {
        self.bandwidth_gbps
    }

    /// 链路时延（ns）
    pub fn latency_ns(&self) -> f64 {
        self.latency_ns
    }

    /// 序列化时延 = 数据块大小 / 链路带宽。
    /// 只在生成事件时间戳时截断为整数纳秒。
    pub fn serialization_delay(&self, size: u64) -> u64 {
        assert!(size > 0);
        (size as f64 / self.bandwidth_bpns) as u64
    }

    /// 通信时延 = 链路时延 + 序列化时延。
    /// 对两项之和整体截断，而不是分项截断。
    pub fn communication_delay(&self, size: u64) -> u64 {
        assert!(size > 0);
        (self.latency_ns + size as f64 / self.bandwidth_bpns) as u64
    }

    /// 通过链路发送一个数据块。
    ///
    /// 前置条件：链路空闲且带宽大于 0。
    /// - 将链路置为 busy；
    /// - 在 `now + 通信时延` 调度数据块到达下一跳的事件；
    /// - 返回 `now + 序列化时延`，由调用方（设备）用自己的上下文调度链路空闲事件。
    ///
    /// 到达时间与链路空闲时间分离：下一跳在吸收传播时延的同时，
    /// 链路可以流水线式地发送下一个数据块。
    pub fn send(&mut self, chunk: Chunk, sim: &mut Simulator) -> SimTime {
        assert!(!self.busy, "link must be free to send");
        assert!(
            self.bandwidth_gbps > 0.0,
            "cannot send on a zero-bandwidth link"
        );

        self.set_busy();

        let size = chunk.size();
        let now = sim.now();
        let arrival_at = SimTime(now.0.saturating_add(self.communication_delay(size)));
        let free_at = SimTime(now.0.saturating_add(self.serialization_delay(size)));

        trace!(
            now = ?now,
            size,
            bandwidth_gbps = self.bandwidth_gbps,
            arrival_at = ?arrival_at,
            free_at = ?free_at,
            "链路开始发送数据块"
        );

        sim.schedule(arrival_at, ChunkArrival { chunk });
        free_at
    }

    /// 重配置链路参数。
    ///
    /// 两个参数都与当前值相同时不做任何改变，立即返回当前时间。
    /// 否则要求链路空闲（排空已完成）；置为 busy，更新参数，
    /// 返回 `now + 重配置耗时` 作为链路重新可用的时刻。
    pub fn reconfigure(
        &mut self,
        bandwidth_gbps: f64,
        latency_ns: f64,
        reconfig_time_ns: f64,
        sim: &mut Simulator,
    ) -> SimTime {
        assert!(bandwidth_gbps >= 0.0);
        assert!(latency_ns >= 0.0);
        assert!(reconfig_time_ns >= 0.0);

        self.set_draining(false);

        if bandwidth_gbps == self.bandwidth_gbps && latency_ns == self.latency_ns {
            return sim.now();
        }

        assert!(!self.busy, "link must be drained before reconfiguration");

        let now = sim.now();
        self.set_busy();

        debug!(
            old_bandwidth_gbps = self.bandwidth_gbps,
            new_bandwidth_gbps = bandwidth_gbps,
            old_latency_ns = self.latency_ns,
            new_latency_ns = latency_ns,
            now = ?now,
            "重配置链路参数"
        );

        self.bandwidth_gbps = bandwidth_gbps;
        self.latency_ns = latency_ns;
        self.bandwidth_bpns = bw_gbps_to_bpns(bandwidth_gbps);

        SimTime(now.0.saturating_add(reconfig_time_ns as u64))
    }
}
