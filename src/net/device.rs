//! 设备类型
//!
//! 定义网络设备（NPU 或交换机）。设备拥有自己的出向链路、
//! 每条链路的等待队列（FIFO）以及按目的地索引的路由表。

use super::chunk::Chunk;
use super::id::DeviceId;
use super::link::Link;
use super::link_free::LinkFree;
use crate::sim::Simulator;
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

/// 网络设备
#[derive(Debug)]
pub struct Device {
    id: DeviceId,
    /// 设备当前所处的拓扑迭代。标签超过该值的数据块会被暂缓发送。
    topology_iteration: u64,
    /// 出向链路：map[邻居设备 id] -> 链路
    links: BTreeMap<DeviceId, Link>,
    /// 每条出向链路的等待队列（FIFO）。队列中的数据块以该邻居为下一跳。
    pending: BTreeMap<DeviceId, VecDeque<Chunk>>,
    /// 路由表：map[目的设备 id] -> 预计算路由（首元素为本设备）
    routes: BTreeMap<DeviceId, Vec<DeviceId>>,
}

impl Device {
    /// 创建新设备
    pub fn new(id: DeviceId) -> Self {
        Self {
            id,
            topology_iteration: 0,
            links: BTreeMap::new(),
            pending: BTreeMap::new(),
            routes: BTreeMap::new(),
        }
    }

    /// 设备标识符
    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// 设备当前的拓扑迭代
    pub fn topology_iteration(&self) -> u64 {
        self.topology_iteration
    }

    /// 是否与指定设备相连
    pub fn connected(&self, peer: DeviceId) -> bool {
        self.links.contains_key(&peer)
    }

    /// 获取通往指定邻居的链路
    pub fn link(&self, peer: DeviceId) -> &Link {
        self.links.get(&peer).expect("link must exist")
    }

    pub(crate) fn link_mut(&mut self, peer: DeviceId) -> &mut Link {
        self.links.get_mut(&peer).expect("link must exist")
    }

    /// 指定邻居等待队列中的数据块数量
    pub fn pending_chunks_count(&self, peer: DeviceId) -> usize {
        self.pending
            .get(&peer)
            .map(VecDeque::len)
            .unwrap_or_default()
    }

    /// 与另一个设备建立连接（创建单向链路与等待队列）
    pub fn connect(&mut self, peer: DeviceId, bandwidth_gbps: f64, latency_ns: f64) {
        assert!(!self.connected(peer), "link already exists");
        self.links.insert(peer, Link::new(bandwidth_gbps, latency_ns));
        self.pending.insert(peer, VecDeque::new());
    }

    /// 断开与指定设备的连接
    pub fn disconnect(&mut self, peer: DeviceId) {
        assert!(self.connected(peer), "no link to disconnect");
        self.links.remove(&peer);
        self.pending.remove(&peer);
    }

    /// 发起一次数据块传输。必须在数据块的当前设备上调用。
    ///
    /// 先按最终目的地把路由重新绑定到本设备的路由表（标签保持不变，
    /// 标签在提交时由管理器绑定，用于暂缓"来自未来拓扑"的数据块），然后：
    /// - 下一跳链路忙、带宽为 0、或数据块标签超过设备迭代 -> 进入等待队列；
    /// - 否则交给链路发送，并在链路序列化完成时刻调度链路空闲事件。
    #[tracing::instrument(skip(self, chunk, sim), fields(device = ?self.id))]
    pub fn send(&mut self, mut chunk: Chunk, sim: &mut Simulator) {
        assert_eq!(
            chunk.current_device(),
            self.id,
            "chunk must be sent from its current device"
        );
        assert!(!chunk.arrived_dest(), "chunk already arrived");

        // 未知目的地退化为 [self, dest] 存根路由：数据块会在零带宽链路上排队。
        let dest = chunk.dest_device();
        let fresh_route = self
            .routes
            .get(&dest)
            .cloned()
            .unwrap_or_else(|| vec![self.id, dest]);
        chunk.update_route(fresh_route, chunk.topology_iteration());

        let next_hop = chunk.next_device();
        assert!(self.connected(next_hop), "next hop must be connected");

        let link = self.links.get_mut(&next_hop).expect("link must exist");
        let gated = chunk
            .topology_iteration()
            .map_or(false, |it| it > self.topology_iteration);

        if link.is_busy() || link.bandwidth_gbps() == 0.0 || gated {
            let queue = self.pending.get_mut(&next_hop).expect("pending queue");
            queue.push_back(chunk);
            debug!(
                next_hop = ?next_hop,
                busy = self.links[&next_hop].is_busy(),
                gated,
                queue_len = self.pending[&next_hop].len(),
                "链路不可用，数据块进入等待队列"
            );
            return;
        }

        let free_at = link.send(chunk, sim);
        sim.schedule(
            free_at,
            LinkFree {
                device: self.id,
                peer: next_hop,
            },
        );
    }

    /// 链路空闲回调：链路完成序列化（或重配置）后调用。
    ///
    /// 将链路置为空闲；若等待队列非空且队首数据块未被迭代标签暂缓，
    /// 则弹出队首交给链路发送并调度下一次链路空闲事件，返回 `false`；
    /// 否则返回 `true` 表示该链路已无可发送的数据块（排空信号由管理器处理）。
    pub fn link_become_free(&mut self, peer: DeviceId, sim: &mut Simulator) -> bool {
        let link = self.links.get_mut(&peer).expect("link must exist");
        link.set_free();
        let bandwidth_gbps = link.bandwidth_gbps();

        let queue = self.pending.get_mut(&peer).expect("pending queue");
        let emittable = match queue.front() {
            None => false,
            Some(front) => {
                let gated = front
                    .topology_iteration()
                    .map_or(false, |it| it > self.topology_iteration);
                !gated && bandwidth_gbps > 0.0
            }
        };

        if !emittable {
            debug!(
                device = ?self.id,
                peer = ?peer,
                queue_len = queue.len(),
                "链路空闲且无可发送数据块"
            );
            return true;
        }

        let chunk = queue.pop_front().expect("queue front checked");
        let link = self.links.get_mut(&peer).expect("link must exist");
        let free_at = link.send(chunk, sim);
        sim.schedule(
            free_at,
            LinkFree {
                device: self.id,
                peer,
            },
        );
        false
    }

    /// 按新拓扑重配置本设备的所有出向链路。
    ///
    /// 推进设备迭代；对每个邻居安装新路由、重配置链路，
    /// 并在链路就绪时刻调度链路空闲事件（由它开始发送等待队列中
    /// 在新拓扑下积累的数据块）。
    pub fn reconfigure(
        &mut self,
        bandwidths_gbps: &[f64],
        routes: Vec<Vec<DeviceId>>,
        latencies_ns: &[f64],
        reconfig_time_ns: f64,
        sim: &mut Simulator,
    ) {
        assert_eq!(bandwidths_gbps.len(), routes.len());
        assert_eq!(latencies_ns.len(), routes.len());

        self.topology_iteration += 1;

        for (target, route) in routes.into_iter().enumerate() {
            let target = DeviceId(target);
            if target == self.id {
                continue;
            }
            self.routes.insert(target, route);
        }

        let peers: Vec<DeviceId> = self.links.keys().copied().collect();
        for peer in peers {
            assert!(bandwidths_gbps[peer.0] >= 0.0);
            assert!(latencies_ns[peer.0] >= 0.0);

            debug!(
                device = ?self.id,
                peer = ?peer,
                pending = self.pending_chunks_count(peer),
                new_bandwidth_gbps = bandwidths_gbps[peer.0],
                "重配置出向链路"
            );

            let link = self.links.get_mut(&peer).expect("link must exist");
            let ready_at = link.reconfigure(
                bandwidths_gbps[peer.0],
                latencies_ns[peer.0],
                reconfig_time_ns,
                sim,
            );
            sim.schedule(
                ready_at,
                LinkFree {
                    device: self.id,
                    peer,
                },
            );
        }
    }
}
