//! 拓扑类型
//!
//! 定义设备清单与初始连通性。构造时把所有设备两两相连
//! （带宽 0、时延 0），保证完整的链路矩阵存在：
//! 重配置只需修改链路参数，永远不需要新建边。

use super::chunk::Chunk;
use super::device::Device;
use super::id::DeviceId;
use crate::sim::Simulator;

/// 网络拓扑：设备数组与它们之间的链路。
#[derive(Debug)]
pub struct Topology {
    npus_count: usize,
    devices: Vec<Device>,
}

impl Topology {
    /// 创建拓扑并建立完整链路矩阵（不含自环）。
    pub fn new(npus_count: usize, devices_count: usize) -> Self {
        assert!(npus_count > 0, "npus_count must be positive");
        assert!(
            devices_count >= npus_count,
            "devices_count must cover all NPUs"
        );

        let devices = (0..devices_count).map(|i| Device::new(DeviceId(i))).collect();
        let mut topology = Self {
            npus_count,
            devices,
        };

        for i in 0..devices_count {
            for j in (i + 1)..devices_count {
                topology.connect(DeviceId(i), DeviceId(j), 0.0, 0.0, true);
            }
        }

        topology
    }

    /// NPU 数量（不含交换机）
    pub fn npus_count(&self) -> usize {
        self.npus_count
    }

    /// 设备总数（含交换机）
    pub fn devices_count(&self) -> usize {
        self.devices.len()
    }

    /// 获取指定设备
    pub fn device(&self, id: DeviceId) -> &Device {
        assert!(id.0 < self.devices.len(), "device id out of range");
        &self.devices[id.0]
    }

    pub fn device_mut(&mut self, id: DeviceId) -> &mut Device {
        assert!(id.0 < self.devices.len(), "device id out of range");
        &mut self.devices[id.0]
    }

    /// 连接两个设备
    pub fn connect(
        &mut self,
        src: DeviceId,
        dest: DeviceId,
        bandwidth_gbps: f64,
        latency_ns: f64,
        bidirectional: bool,
    ) {
        assert!(src != dest, "self-loops are excluded");
        self.device_mut(src).connect(dest, bandwidth_gbps, latency_ns);
        if bidirectional {
            self.device_mut(dest).connect(src, bandwidth_gbps, latency_ns);
        }
    }

    /// 把数据块派发给它当前所在的设备处理。
    pub fn send(&mut self, chunk: Chunk, sim: &mut Simulator) {
        let src = chunk.current_device();
        assert!(src.0 < self.devices.len(), "source device out of range");
        self.devices[src.0].send(chunk, sim);
    }
}
