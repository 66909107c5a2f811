//! 仿真世界接口
//!
//! 事件在执行时拿到的共享状态。事件通过 `as_any_mut` 向下转型到
//! 具体实现（网络模型中是持有拓扑管理器的 `NetWorld`）。

use std::any::Any;

/// 仿真世界：事件执行时可变访问的业务状态。
pub trait World: Any {
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
