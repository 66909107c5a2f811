pub mod net;
pub mod sim;
pub mod trace;

// 导出常用类型，供 bin 文件和集成测试使用
pub use net::{Chunk, ChunkCallback, Device, DeviceId, Link, NetWorld, Stats, Topology, TopologyManager};
pub use sim::{Event, SimTime, Simulator, World};

#[cfg(test)]
mod test;
