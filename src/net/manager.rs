//! 拓扑管理器
//!
//! 全局重配置的编排者：静默交换协议（排空网络 -> 重新计算路由 ->
//! 原子切换拓扑）、最短路由预计算，以及在途流量的计数。

use super::chunk::Chunk;
use super::device::Device;
use super::id::DeviceId;
use super::stats::Stats;
use super::topology::Topology;
use crate::sim::Simulator;
use std::collections::{BTreeMap, VecDeque};
use thiserror::Error;
use tracing::{debug, info};

/// 预定义电路调度查询失败
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("topology id {0} not found in circuit schedules")]
    UnknownTopoId(i32),
}

/// 拓扑管理器
pub struct TopologyManager {
    npus_count: usize,
    devices_count: usize,
    topology: Topology,
    /// 当前带宽矩阵（GB/s）
    bandwidths: Vec<Vec<f64>>,
    /// 当前时延矩阵（ns）
    latencies: Vec<Vec<f64>>,
    /// 预计算路由矩阵 [src][dest]
    precomputed_routes: Vec<Vec<Vec<DeviceId>>>,
    /// 预定义电路调度：拓扑 id -> 带宽矩阵
    circuit_schedules: BTreeMap<i32, Vec<Vec<f64>>>,
    reconfig_time_ns: f64,
    reconfiguring: bool,
    topology_iteration: u64,
    /// 当前生效的拓扑 id。首次重配置之前为 None。
    cur_topo_id: Option<i32>,
    /// 在途集合通信计数。非零时拒绝重配置请求。
    inflight_collectives: usize,
    /// 排空阶段已静默的链路数
    drained_links: usize,
    pub stats: Stats,
}

impl TopologyManager {
    /// 创建拓扑管理器。初始连通性为全 0 带宽的完整链路矩阵。
    pub fn new(
        npus_count: usize,
        devices_count: usize,
        circuit_schedules: BTreeMap<i32, Vec<Vec<f64>>>,
    ) -> Self {
        assert!(npus_count > 0);
        assert!(devices_count >= npus_count);

        debug!(
            npus_count,
            devices_count,
            schedules = circuit_schedules.len(),
            "创建拓扑管理器"
        );

        Self {
            npus_count,
            devices_count,
            topology: Topology::new(npus_count, devices_count),
            bandwidths: vec![vec![0.0; devices_count]; devices_count],
            latencies: vec![vec![0.0; devices_count]; devices_count],
            precomputed_routes: Vec::new(),
            circuit_schedules,
            reconfig_time_ns: 0.0,
            reconfiguring: false,
            topology_iteration: 0,
            cur_topo_id: None,
            inflight_collectives: 0,
            drained_links: 0,
            stats: Stats::default(),
        }
    }

    pub fn npus_count(&self) -> usize {
        self.npus_count
    }

    pub fn devices_count(&self) -> usize {
        self.devices_count
    }

    /// 获取指定设备
    pub fn device(&self, id: DeviceId) -> &Device {
        self.topology.device(id)
    }

    pub fn is_reconfiguring(&self) -> bool {
        self.reconfiguring
    }

    /// 当前拓扑迭代
    pub fn topology_iteration(&self) -> u64 {
        self.topology_iteration
    }

    /// 在途集合通信计数
    pub fn inflight_collectives(&self) -> usize {
        self.inflight_collectives
    }

    /// 外部驱动在发起一组流时调用
    pub fn collective_started(&mut self) {
        self.inflight_collectives += 1;
    }

    /// 外部驱动在一组流全部完成时调用
    pub fn collective_finished(&mut self) {
        assert!(
            self.inflight_collectives > 0,
            "collective_finished without a started collective"
        );
        self.inflight_collectives -= 1;
    }

    /// 设置默认的重配置耗时（ns）
    pub fn set_reconfig_latency(&mut self, latency_ns: f64) {
        assert!(latency_ns >= 0.0);
        self.reconfig_time_ns = latency_ns;
    }

    /// 请求把整个拓扑重配置为给定的带宽/时延矩阵。
    ///
    /// - 已处于请求的拓扑 -> 幂等，不调度任何事件，返回 true；
    /// - 正在重配置或有在途集合通信 -> 拒绝，返回 false，不改变任何状态；
    /// - 否则保存矩阵、预计算路由、推进拓扑迭代并开始排空网络，返回 true。
    ///   排空完成后（所有链路静默）才会把新参数应用到各设备。
    #[tracing::instrument(skip(self, bandwidths_gbps, latencies_ns, sim))]
    pub fn reconfigure(
        &mut self,
        bandwidths_gbps: Vec<Vec<f64>>,
        latencies_ns: Vec<Vec<f64>>,
        reconfig_time_ns: f64,
        topo_id: i32,
        sim: &mut Simulator,
    ) -> bool {
        if self.cur_topo_id == Some(topo_id) {
            info!(topo_id, "已处于请求的拓扑，忽略重配置请求");
            return true;
        }

        if self.reconfiguring || self.inflight_collectives > 0 {
            info!(
                inflight = self.inflight_collectives,
                reconfiguring = self.reconfiguring,
                "网络尚未静默，拒绝重配置请求"
            );
            return false;
        }

        assert_eq!(bandwidths_gbps.len(), self.devices_count);
        assert_eq!(latencies_ns.len(), self.devices_count);
        for row in &bandwidths_gbps {
            assert_eq!(row.len(), self.devices_count);
        }
        for row in &latencies_ns {
            assert_eq!(row.len(), self.devices_count);
        }

        info!(
            topo_id,
            devices_count = self.devices_count,
            "🔧 开始重配置拓扑"
        );

        self.bandwidths = bandwidths_gbps;
        self.latencies = latencies_ns;
        self.reconfig_time_ns = reconfig_time_ns;

        self.precompute_routes();

        self.reconfiguring = true;
        self.cur_topo_id = Some(topo_id);
        self.topology_iteration += 1;
        self.drain_network(sim);
        true
    }

    /// 按预定义电路调度重配置。未知的拓扑 id 属于配置错误。
    pub fn reconfigure_to(
        &mut self,
        topo_id: i32,
        sim: &mut Simulator,
    ) -> Result<bool, ScheduleError> {
        let bandwidths = self
            .circuit_schedules
            .get(&topo_id)
            .ok_or(ScheduleError::UnknownTopoId(topo_id))?
            .clone();
        Ok(self.reconfigure(
            bandwidths,
            self.latencies.clone(),
            self.reconfig_time_ns,
            topo_id,
            sim,
        ))
    }

    /// 排空网络：把所有链路标记为排空中。
    /// 空闲链路立即计入（不会再有链路空闲事件来通知它们）；
    /// 忙碌链路等待自然的链路空闲事件。
    fn drain_network(&mut self, sim: &mut Simulator) {
        self.drained_links = 0;
        for i in 0..self.devices_count {
            for j in 0..self.devices_count {
                if i == j {
                    continue;
                }
                let idle = {
                    let link = self
                        .topology
                        .device_mut(DeviceId(i))
                        .link_mut(DeviceId(j));
                    link.set_draining(true);
                    !link.is_busy()
                };
                if idle {
                    let link = self
                        .topology
                        .device_mut(DeviceId(i))
                        .link_mut(DeviceId(j));
                    link.set_draining(false);
                    self.link_drained(sim);
                }
            }
        }

        if self.devices_count == 1 {
            // 没有链路需要排空
            self.apply_topology(sim);
        }
    }

    /// 排空计数回调：每条链路在排空阶段只计入一次。
    /// 所有有序设备对的链路都静默后，应用新拓扑。
    fn link_drained(&mut self, sim: &mut Simulator) {
        self.drained_links += 1;
        let total = self.devices_count * (self.devices_count - 1);
        debug!(drained = self.drained_links, total, "链路已静默");
        if self.drained_links < total {
            return;
        }
        self.apply_topology(sim);
    }

    /// 排空完成：把新带宽/时延矩阵与预计算路由下发到每个设备。
    /// 各设备会在 `now + 重配置耗时` 调度链路空闲事件，
    /// 由它们开始发送新拓扑下积累的等待数据块。
    fn apply_topology(&mut self, sim: &mut Simulator) {
        self.drained_links = 0;
        self.reconfiguring = false;

        info!(
            iteration = self.topology_iteration,
            now = ?sim.now(),
            "✅ 网络排空完成，应用新拓扑"
        );

        for i in 0..self.devices_count {
            let bandwidths = self.bandwidths[i].clone();
            let latencies = self.latencies[i].clone();
            let routes = self.precomputed_routes[i].clone();
            self.topology.device_mut(DeviceId(i)).reconfigure(
                &bandwidths,
                routes,
                &latencies,
                self.reconfig_time_ns,
                sim,
            );
        }
    }

    /// 链路空闲事件的入口：驱动设备的等待队列，
    /// 并在排空阶段把静默的链路计入排空计数。
    pub(crate) fn link_become_free(
        &mut self,
        device: DeviceId,
        peer: DeviceId,
        sim: &mut Simulator,
    ) {
        let idle = self
            .topology
            .device_mut(device)
            .link_become_free(peer, sim);
        if !idle {
            return;
        }

        let link = self.topology.device_mut(device).link_mut(peer);
        if link.is_draining() {
            link.set_draining(false);
            self.link_drained(sim);
        }
    }

    /// 数据块到达事件的入口。
    /// 到达目的地则更新统计并触发完成回调，否则交给当前设备继续转发。
    pub(crate) fn chunk_arrived(&mut self, mut chunk: Chunk, sim: &mut Simulator) {
        chunk.mark_arrived_next_device();

        if chunk.arrived_dest() {
            self.stats.delivered_chunks += 1;
            self.stats.delivered_bytes += chunk.size();
            info!(
                now = ?sim.now(),
                dest = ?chunk.current_device(),
                size = chunk.size(),
                "📦 数据块到达目的地"
            );
            chunk.invoke_callback(sim.now(), sim);
            return;
        }

        let current = chunk.current_device();
        self.topology.device_mut(current).send(chunk, sim);
    }

    /// 预计算所有设备对之间的最短路由（BFS，按跳数）。
    ///
    /// 邻接表按邻居 id 升序排序并去重，保证并列最短路径的
    /// 决策是确定的（每层取 id 最小的前驱）。
    /// 不可达的目的地记为存根路由 [src, dest]：
    /// 走存根路由的数据块会在零带宽链路上排队，直到拓扑修复。
    fn precompute_routes(&mut self) {
        let n = self.devices_count;

        let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];
        for i in 0..n {
            for j in 0..n {
                if i != j && self.bandwidths[i][j] > 0.0 {
                    adj[i].push(j);
                }
            }
        }
        for neighbors in &mut adj {
            neighbors.sort_unstable();
            neighbors.dedup();
        }

        let mut routes = vec![vec![Vec::new(); n]; n];
        let mut dist: Vec<usize> = vec![usize::MAX; n];
        let mut parent: Vec<Option<usize>> = vec![None; n];
        let mut queue: VecDeque<usize> = VecDeque::new();

        for s in 0..n {
            dist.fill(usize::MAX);
            parent.fill(None);
            queue.clear();
            dist[s] = 0;
            queue.push_back(s);

            while let Some(u) = queue.pop_front() {
                for &v in &adj[u] {
                    if dist[v] == usize::MAX {
                        dist[v] = dist[u] + 1;
                        parent[v] = Some(u);
                        queue.push_back(v);
                    }
                }
            }

            for t in 0..n {
                routes[s][t] = if s == t {
                    vec![DeviceId(s)]
                } else if parent[t].is_none() {
                    // 不可达：存根路由
                    vec![DeviceId(s), DeviceId(t)]
                } else {
                    let mut path = vec![DeviceId(t)];
                    let mut cur = t;
                    while let Some(p) = parent[cur] {
                        path.push(DeviceId(p));
                        cur = p;
                    }
                    path.reverse();
                    path
                };
            }
        }

        self.precomputed_routes = routes;
    }

    /// 查询预计算的 src -> dest 路由。重配置至少发生一次后可用。
    pub fn precomputed_route(&self, src: DeviceId, dest: DeviceId) -> &[DeviceId] {
        assert!(!self.precomputed_routes.is_empty(), "routes not computed yet");
        &self.precomputed_routes[src.0][dest.0]
    }

    /// 构造 src 到 dest 的种子路由 [src, dest]。
    /// 设备在每一跳会按自己的路由表重新绑定到完整的预计算路径。
    /// 流的端点必须是 NPU。
    pub fn route(&self, src: DeviceId, dest: DeviceId) -> Vec<DeviceId> {
        assert!(src.0 < self.npus_count, "flow source must be an NPU");
        assert!(dest.0 < self.npus_count, "flow destination must be an NPU");
        assert!(src != dest, "flow endpoints must differ");
        vec![src, dest]
    }

    /// 发起一次数据块传输。
    /// 未绑定迭代标签的数据块在此绑定到当前拓扑迭代。
    pub fn send(&mut self, mut chunk: Chunk, sim: &mut Simulator) {
        let src = chunk.current_device();
        assert!(src.0 < self.devices_count, "source device out of range");

        if chunk.topology_iteration().is_none() {
            let dest = chunk.dest_device();
            chunk.update_route(self.route(src, dest), Some(self.topology_iteration));
        }

        debug!(
            src = ?src,
            dest = ?chunk.dest_device(),
            size = chunk.size(),
            iteration = ?chunk.topology_iteration(),
            "提交数据块"
        );

        self.topology.send(chunk, sim);
    }
}
