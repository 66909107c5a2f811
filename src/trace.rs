//! 轨迹文件解析与回放
//!
//! 轨迹文件是面向行的文本格式：先是四个数值头
//! （NPU 数量、拓扑阶段数、默认链路时延、重配置时延），
//! 之后由 `BM`/`BW` 段（带宽矩阵）和 `FLOW` 段（流清单）交替组成。
//! 空行与 `//` 注释行被忽略。

use crate::net::{Chunk, DeviceId, NetWorld};
use crate::sim::{Event, SimTime, Simulator, World};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info, warn};

/// 轨迹文件解析错误
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("line {0}: missing or invalid numeric header (expected npus_count, iters_count, default_latency_ns, reconfig_latency_ns)")]
    BadHeader(usize),
    #[error("npus_count must be positive")]
    BadNpusCount,
    #[error("iters_count must be positive")]
    BadItersCount,
    #[error("line {0}: bandwidth matrix row must contain exactly {1} integers")]
    BadMatrixRow(usize, usize),
    #[error("bandwidth matrix ends after {0} of {1} rows")]
    ShortMatrix(usize, usize),
    #[error("line {0}: malformed flow (expected `src -> dest size`)")]
    BadFlow(usize),
    #[error("line {0}: flow endpoints must be distinct NPUs in [0, {1})")]
    InvalidFlowEndpoint(usize, usize),
    #[error("line {0}: unexpected content outside of a section")]
    UnexpectedLine(usize),
}

/// 一条流：从 src 向 dest 发送 size 字节。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowSpec {
    pub src: usize,
    pub dest: usize,
    pub size: u64,
}

/// 轨迹中的一个段
#[derive(Debug, Clone, PartialEq)]
pub enum TraceSection {
    /// 新的带宽矩阵（GB/s）：触发一次静默重配置
    Bandwidth(Vec<Vec<f64>>),
    /// 一组流：作为一个集合提交
    Flows(Vec<FlowSpec>),
}

/// 解析后的轨迹
#[derive(Debug, Clone, PartialEq)]
pub struct TraceSpec {
    pub npus_count: usize,
    pub iters_count: usize,
    pub default_latency_ns: u64,
    pub reconfig_latency_ns: u64,
    pub sections: Vec<TraceSection>,
}

/// 单个数据块的到达记录
#[derive(Debug, Clone, Serialize)]
pub struct ArrivalRecord {
    pub src: usize,
    pub dest: usize,
    pub size: u64,
    pub arrived_at_ns: u64,
}

/// 回放结果摘要（供 CLI 输出为 JSON）
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub npus_count: usize,
    pub finish_time_ns: u64,
    pub delivered_chunks: u64,
    pub delivered_bytes: u64,
    pub arrivals: Vec<ArrivalRecord>,
}

enum ParserState {
    Neutral,
    Bandwidth(Vec<Vec<f64>>),
    Flows(Vec<FlowSpec>),
}

/// 解析轨迹文件内容。
pub fn parse(input: &str) -> Result<TraceSpec, TraceError> {
    let mut headers: Vec<u64> = Vec::new();
    let mut sections: Vec<TraceSection> = Vec::new();
    let mut state = ParserState::Neutral;
    let mut npus_count = 0usize;

    for (idx, raw_line) in input.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }

        // 前四个非注释数值行是头部
        if headers.len() < 4 {
            let value: u64 = line.parse().map_err(|_| TraceError::BadHeader(line_no))?;
            headers.push(value);
            if headers.len() == 1 {
                npus_count = headers[0] as usize;
                if npus_count == 0 {
                    return Err(TraceError::BadNpusCount);
                }
            }
            continue;
        }

        if line == "BM" || line == "BW" {
            finish_section(&mut state, &mut sections, npus_count)?;
            state = ParserState::Bandwidth(Vec::new());
            continue;
        }
        if line == "FLOW" {
            finish_section(&mut state, &mut sections, npus_count)?;
            state = ParserState::Flows(Vec::new());
            continue;
        }

        match &mut state {
            ParserState::Neutral => return Err(TraceError::UnexpectedLine(line_no)),
            ParserState::Bandwidth(rows) => {
                let row: Vec<f64> = line
                    .split_whitespace()
                    .map(|tok| tok.parse::<i64>().map(|v| v as f64))
                    .collect::<Result<_, _>>()
                    .map_err(|_| TraceError::BadMatrixRow(line_no, npus_count))?;
                if row.len() != npus_count {
                    return Err(TraceError::BadMatrixRow(line_no, npus_count));
                }
                rows.push(row);
                if rows.len() == npus_count {
                    let rows = std::mem::take(rows);
                    sections.push(TraceSection::Bandwidth(rows));
                    state = ParserState::Neutral;
                }
            }
            ParserState::Flows(flows) => {
                let flow = parse_flow_line(line, line_no, npus_count)?;
                flows.push(flow);
            }
        }
    }

    finish_section(&mut state, &mut sections, npus_count)?;

    if headers.len() < 4 {
        return Err(TraceError::BadHeader(input.lines().count() + 1));
    }

    let iters_count = headers[1] as usize;
    if iters_count == 0 {
        return Err(TraceError::BadItersCount);
    }

    let bw_sections = sections
        .iter()
        .filter(|s| matches!(s, TraceSection::Bandwidth(_)))
        .count();
    if bw_sections != iters_count {
        warn!(
            iters_count,
            bw_sections, "轨迹中的拓扑阶段数与头部声明不一致"
        );
    }

    Ok(TraceSpec {
        npus_count,
        iters_count,
        default_latency_ns: headers[2],
        reconfig_latency_ns: headers[3],
        sections,
    })
}

fn finish_section(
    state: &mut ParserState,
    sections: &mut Vec<TraceSection>,
    npus_count: usize,
) -> Result<(), TraceError> {
    match std::mem::replace(state, ParserState::Neutral) {
        ParserState::Neutral => Ok(()),
        ParserState::Bandwidth(rows) => {
            if rows.is_empty() {
                // 空的 BM/BW 段视为尚未开始，直接忽略
                Ok(())
            } else {
                Err(TraceError::ShortMatrix(rows.len(), npus_count))
            }
        }
        ParserState::Flows(flows) => {
            if !flows.is_empty() {
                sections.push(TraceSection::Flows(flows));
            }
            Ok(())
        }
    }
}

fn parse_flow_line(line: &str, line_no: usize, npus_count: usize) -> Result<FlowSpec, TraceError> {
    let normalized = line.replace("->", " ");
    let mut tokens = normalized.split_whitespace();
    let src: usize = tokens
        .next()
        .and_then(|t| t.parse().ok())
        .ok_or(TraceError::BadFlow(line_no))?;
    let dest: usize = tokens
        .next()
        .and_then(|t| t.parse().ok())
        .ok_or(TraceError::BadFlow(line_no))?;
    let size: u64 = tokens
        .next()
        .and_then(|t| t.parse().ok())
        .ok_or(TraceError::BadFlow(line_no))?;
    if tokens.next().is_some() || size == 0 {
        return Err(TraceError::BadFlow(line_no));
    }
    if src >= npus_count || dest >= npus_count || src == dest {
        return Err(TraceError::InvalidFlowEndpoint(line_no, npus_count));
    }
    Ok(FlowSpec { src, dest, size })
}

/// 事件：一组流全部完成，递减管理器的在途计数。
/// 完成回调只能访问事件队列，因此通过一个事件把递减送回管理器。
#[derive(Debug)]
pub struct CollectiveDone;

impl Event for CollectiveDone {
    fn execute(self: Box<Self>, _sim: &mut Simulator, world: &mut dyn World) {
        let w = world
            .as_any_mut()
            .downcast_mut::<NetWorld>()
            .expect("world must be NetWorld");
        w.tm.collective_finished();
    }
}

/// 回放一条轨迹：按段顺序驱动拓扑管理器。
///
/// - 带宽段：先把事件队列驱动到静默（无重配置、无在途流），
///   然后用该矩阵、缓存的时延矩阵与重配置时延发起重配置，
///   拓扑 id 取该段在轨迹中的序号；
/// - 流段：作为一个集合提交，每条流一个数据块，
///   完成回调记录到达时间；集合中最后一个数据块到达时递减在途计数。
///
/// 所有段提交完毕后把事件队列跑空；给定 `until` 时只跑到该时刻，
/// 之后的事件留在队列里。返回所有数据块的到达记录（按到达顺序）。
pub fn replay(
    spec: &TraceSpec,
    sim: &mut Simulator,
    world: &mut NetWorld,
    until: Option<SimTime>,
) -> Vec<ArrivalRecord> {
    let n = spec.npus_count;
    let latency_matrix = vec![vec![spec.default_latency_ns as f64; n]; n];
    let arrivals: Arc<Mutex<Vec<ArrivalRecord>>> = Arc::new(Mutex::new(Vec::new()));
    let mut topo_ordinal: i32 = 0;

    for section in &spec.sections {
        match section {
            TraceSection::Bandwidth(matrix) => {
                drive_until_quiescent(sim, world);
                let accepted = world.tm.reconfigure(
                    matrix.clone(),
                    latency_matrix.clone(),
                    spec.reconfig_latency_ns as f64,
                    topo_ordinal,
                    sim,
                );
                if !accepted {
                    warn!(topo_ordinal, "重配置请求被拒绝，跳过该拓扑阶段");
                }
                topo_ordinal += 1;
            }
            TraceSection::Flows(flows) => {
                if flows.is_empty() {
                    continue;
                }
                world.tm.collective_started();
                let remaining = Arc::new(Mutex::new(flows.len()));
                for flow in flows {
                    debug!(src = flow.src, dest = flow.dest, size = flow.size, "提交流");
                    let route = world.tm.route(DeviceId(flow.src), DeviceId(flow.dest));
                    let log = Arc::clone(&arrivals);
                    let remaining = Arc::clone(&remaining);
                    let (src, dest, size) = (flow.src, flow.dest, flow.size);
                    let chunk = Chunk::new(
                        size,
                        route,
                        None,
                        Box::new(move |now, sim| {
                            log.lock().expect("arrival log lock").push(ArrivalRecord {
                                src,
                                dest,
                                size,
                                arrived_at_ns: now.0,
                            });
                            let mut left = remaining.lock().expect("flow group lock");
                            *left -= 1;
                            if *left == 0 {
                                sim.schedule(now, CollectiveDone);
                            }
                        }),
                    );
                    world.tm.send(chunk, sim);
                }
            }
        }
    }

    match until {
        Some(bound) => sim.run_until(bound, world),
        None => {
            while !sim.finished() {
                sim.proceed(world);
            }
        }
    }

    info!(
        finish_time_ns = sim.now().0,
        delivered = world.tm.stats.delivered_chunks,
        "轨迹回放完成"
    );

    Arc::try_unwrap(arrivals)
        .map(|m| m.into_inner().expect("arrival log lock"))
        .unwrap_or_else(|arc| arc.lock().expect("arrival log lock").clone())
}

/// 把事件队列驱动到静默：既不在重配置，也没有在途的流。
fn drive_until_quiescent(sim: &mut Simulator, world: &mut NetWorld) {
    while !sim.finished()
        && (world.tm.is_reconfiguring() || world.tm.inflight_collectives() > 0)
    {
        sim.proceed(world);
    }
}
