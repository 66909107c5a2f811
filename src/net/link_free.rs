//! 链路空闲事件
//!
//! 链路完成一次序列化发送（或重配置）后触发，驱动对应等待队列继续出队。

use super::id::DeviceId;
use super::net_world::NetWorld;
use crate::sim::{Event, Simulator, World};

/// 事件：`device` 通往 `peer` 的链路变为空闲。
#[derive(Debug)]
pub struct LinkFree {
    pub device: DeviceId,
    pub peer: DeviceId,
}

impl Event for LinkFree {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let LinkFree { device, peer } = *self;
        let w = world
            .as_any_mut()
            .downcast_mut::<NetWorld>()
            .expect("world must be NetWorld");
        w.tm.link_become_free(device, peer, sim);
    }
}
