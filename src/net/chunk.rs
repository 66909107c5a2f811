//! 数据块类型
//!
//! 定义传输的基本单位：数据块（chunk）及其路由操作。

use super::id::DeviceId;
use crate::sim::{SimTime, Simulator};
use std::collections::VecDeque;
use std::fmt;

/// 数据块到达目的地时触发的完成回调。只会被调用一次。
pub type ChunkCallback = Box<dyn FnOnce(SimTime, &mut Simulator) + Send>;

/// 数据块：携带大小、剩余路由、拓扑迭代标签与完成回调。
///
/// 路由的结构为 [当前设备, 下一跳, ..., 目的设备]。
/// 例如从设备 5 出发到达目的地 3，路由可能是 [5, 1, 6, 2, 3]。
/// 路由长度为 1 表示已到达目的地。
pub struct Chunk {
    size: u64,
    route: VecDeque<DeviceId>,
    /// 拓扑迭代标签。`None` 表示尚未绑定，由管理器在提交时绑定到当前迭代。
    topology_iteration: Option<u64>,
    callback: Option<ChunkCallback>,
}

impl Chunk {
    /// 创建数据块。路由不能为空，大小必须为正。
    pub fn new(
        size: u64,
        route: Vec<DeviceId>,
        topology_iteration: Option<u64>,
        callback: ChunkCallback,
    ) -> Self {
        assert!(size > 0, "chunk size must be positive");
        assert!(!route.is_empty(), "chunk route must be non-empty");
        Self {
            size,
            route: route.into(),
            topology_iteration,
            callback: Some(callback),
        }
    }

    /// 数据块大小（字节）
    pub fn size(&self) -> u64 {
        self.size
    }

    /// 数据块当前所在的设备
    pub fn current_device(&self) -> DeviceId {
        *self.route.front().expect("route non-empty")
    }

    /// 数据块的下一跳设备。已到达目的地时不可调用。
    pub fn next_device(&self) -> DeviceId {
        assert!(!self.arrived_dest(), "chunk already arrived");
        self.route[1]
    }

    /// 数据块的最终目的设备
    pub fn dest_device(&self) -> DeviceId {
        *self.route.back().expect("route non-empty")
    }

    /// 标记数据块到达下一跳，即从路由中去掉当前设备。
    pub fn mark_arrived_next_device(&mut self) {
        assert!(self.route.len() > 1, "no next device to arrive at");
        self.route.pop_front();
    }

    /// 数据块是否已到达目的地（路由中只剩目的设备）
    pub fn arrived_dest(&self) -> bool {
        self.route.len() == 1
    }

    /// 替换路由并更新拓扑迭代标签。
    pub fn update_route(&mut self, new_route: Vec<DeviceId>, topology_iteration: Option<u64>) {
        assert!(!new_route.is_empty(), "chunk route must be non-empty");
        self.route = new_route.into();
        self.topology_iteration = topology_iteration;
    }

    /// 数据块的拓扑迭代标签
    pub fn topology_iteration(&self) -> Option<u64> {
        self.topology_iteration
    }

    /// 触发完成回调。必须在到达目的地后调用，且只能调用一次。
    pub fn invoke_callback(mut self, now: SimTime, sim: &mut Simulator) {
        assert!(self.arrived_dest(), "callback fires only at the destination");
        let cb = self.callback.take().expect("callback fires exactly once");
        cb(now, sim);
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("size", &self.size)
            .field("route", &self.route)
            .field("topology_iteration", &self.topology_iteration)
            .finish()
    }
}
