//! 网络世界实现
//!
//! 定义网络仿真的世界（World）实现，持有拓扑管理器。

use super::manager::TopologyManager;
use crate::sim::World;
use std::any::Any;

/// 一个默认的网络世界实现：持有 TopologyManager。
pub struct NetWorld {
    pub tm: TopologyManager,
}

impl NetWorld {
    pub fn new(tm: TopologyManager) -> Self {
        Self { tm }
    }
}

impl World for NetWorld {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
