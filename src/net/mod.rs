//! 可重配置网络模型模块
//!
//! 此模块包含网络模型的核心组件：设备、链路、数据块、拓扑与拓扑管理器。

// 子模块声明
mod id;
mod chunk;
mod link;
mod device;
mod topology;
mod manager;
mod stats;
mod chunk_arrival;
mod link_free;
mod net_world;

// 重新导出公共接口
pub use id::DeviceId;
pub use chunk::{Chunk, ChunkCallback};
pub use link::Link;
pub use device::Device;
pub use topology::Topology;
pub use manager::{ScheduleError, TopologyManager};
pub use stats::Stats;
pub use chunk_arrival::ChunkArrival;
pub use link_free::LinkFree;
pub use net_world::NetWorld;
