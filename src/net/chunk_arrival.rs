//! 数据块到达事件
//!
//! 数据块经过一条链路之后，在 `now + 通信时延` 时刻到达下一跳设备。

use super::chunk::Chunk;
use super::net_world::NetWorld;
use crate::sim::{Event, Simulator, World};
use tracing::trace;

/// 事件：数据块到达下一跳设备。
/// 到达目的地则触发完成回调，否则交给当前设备继续转发。
#[derive(Debug)]
pub struct ChunkArrival {
    pub chunk: Chunk,
}

impl Event for ChunkArrival {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let ChunkArrival { chunk } = *self;
        trace!(now = ?sim.now(), chunk = ?chunk, "数据块到达事件执行");

        let w = world
            .as_any_mut()
            .downcast_mut::<NetWorld>()
            .expect("world must be NetWorld");
        w.tm.chunk_arrived(chunk, sim);
    }
}
