//! 事件接口
//!
//! 网络模型中的一切活动（数据块到达下一跳、链路空闲、一组流完成）
//! 都实现这个 trait，由事件队列在指定的仿真时刻触发。

use super::simulator::Simulator;
use super::world::World;

/// 可调度的仿真事件。
///
/// `execute` 以 `self: Box<Self>` 消费事件本身，事件携带的负载
/// （例如在途的数据块）随之转移所有权，每个事件恰好执行一次。
pub trait Event: Send + 'static {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World);
}
