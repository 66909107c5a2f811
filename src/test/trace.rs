use crate::net::{NetWorld, TopologyManager};
use crate::sim::{SimTime, Simulator};
use crate::trace::{self, FlowSpec, TraceError, TraceSection};
use std::collections::BTreeMap;

fn replay_trace_until(
    input: &str,
    until: Option<SimTime>,
) -> (Simulator, NetWorld, Vec<trace::ArrivalRecord>) {
    let spec = trace::parse(input).expect("trace parses");
    let mut sim = Simulator::default();
    let mut tm = TopologyManager::new(spec.npus_count, spec.npus_count, BTreeMap::new());
    tm.set_reconfig_latency(spec.reconfig_latency_ns as f64);
    let mut world = NetWorld::new(tm);
    let arrivals = trace::replay(&spec, &mut sim, &mut world, until);
    (sim, world, arrivals)
}

fn replay_trace(input: &str) -> (Simulator, NetWorld, Vec<trace::ArrivalRecord>) {
    replay_trace_until(input, None)
}

#[test]
fn parse_reads_headers_sections_and_ignores_comments() {
    let input = "\
// minimal two-NPU trace
2
1
10
500

BW
0 100
100 0

FLOW
0 -> 1 1048576
1 -> 0 2048
";
    let spec = trace::parse(input).expect("trace parses");

    assert_eq!(spec.npus_count, 2);
    assert_eq!(spec.iters_count, 1);
    assert_eq!(spec.default_latency_ns, 10);
    assert_eq!(spec.reconfig_latency_ns, 500);
    assert_eq!(spec.sections.len(), 2);
    assert_eq!(
        spec.sections[0],
        TraceSection::Bandwidth(vec![vec![0.0, 100.0], vec![100.0, 0.0]])
    );
    assert_eq!(
        spec.sections[1],
        TraceSection::Flows(vec![
            FlowSpec {
                src: 0,
                dest: 1,
                size: 1_048_576
            },
            FlowSpec {
                src: 1,
                dest: 0,
                size: 2048
            },
        ])
    );
}

#[test]
fn parse_accepts_bm_as_bandwidth_section_header() {
    let input = "2\n1\n0\n0\nBM\n0 1\n1 0\n";
    let spec = trace::parse(input).expect("trace parses");
    assert!(matches!(spec.sections[0], TraceSection::Bandwidth(_)));
}

#[test]
fn parse_rejects_missing_headers() {
    assert!(matches!(
        trace::parse("2\n1\n10\n"),
        Err(TraceError::BadHeader(_))
    ));
}

#[test]
fn parse_rejects_short_bandwidth_matrix() {
    let input = "2\n1\n10\n0\nBW\n0 100\n";
    assert!(matches!(
        trace::parse(input),
        Err(TraceError::ShortMatrix(1, 2))
    ));
}

#[test]
fn parse_rejects_matrix_row_of_wrong_width() {
    let input = "2\n1\n10\n0\nBW\n0 100 7\n100 0\n";
    assert!(matches!(
        trace::parse(input),
        Err(TraceError::BadMatrixRow(6, 2))
    ));
}

#[test]
fn parse_rejects_malformed_flows() {
    let base = "2\n1\n10\n0\nBW\n0 100\n100 0\nFLOW\n";
    assert!(matches!(
        trace::parse(&format!("{base}0 -> 1\n")),
        Err(TraceError::BadFlow(_))
    ));
    assert!(matches!(
        trace::parse(&format!("{base}0 -> 0 128\n")),
        Err(TraceError::InvalidFlowEndpoint(_, 2))
    ));
    assert!(matches!(
        trace::parse(&format!("{base}0 -> 5 128\n")),
        Err(TraceError::InvalidFlowEndpoint(_, 2))
    ));
}

#[test]
fn parse_rejects_content_outside_sections() {
    let input = "2\n1\n10\n0\nhello\n";
    assert!(matches!(
        trace::parse(input),
        Err(TraceError::UnexpectedLine(5))
    ));
}

#[test]
fn replay_runs_a_single_phase_trace_to_completion() {
    let input = "\
2
1
10
0

BW
0 100
100 0

FLOW
0 -> 1 1048576
";
    let (sim, world, arrivals) = replay_trace(input);

    assert_eq!(arrivals.len(), 1);
    assert_eq!(arrivals[0].src, 0);
    assert_eq!(arrivals[0].dest, 1);
    assert_eq!(arrivals[0].arrived_at_ns, 10495);
    assert_eq!(sim.now().0, 10495);
    assert_eq!(world.tm.stats.delivered_chunks, 1);
    assert_eq!(world.tm.inflight_collectives(), 0);
    assert!(!world.tm.is_reconfiguring());
}

#[test]
fn replay_stops_at_the_requested_bound() {
    let input = "\
2
1
10
0

BW
0 100
100 0

FLOW
0 -> 1 1048576
";
    // The only arrival would land at 10495; stopping at 10000 leaves it queued
    let (sim, world, arrivals) = replay_trace_until(input, Some(SimTime(10_000)));

    assert!(arrivals.is_empty());
    assert_eq!(sim.now(), SimTime(10_000));
    assert!(!sim.finished());
    assert_eq!(world.tm.stats.delivered_chunks, 0);
    assert_eq!(world.tm.inflight_collectives(), 1);
}

#[test]
fn replay_waits_for_quiescence_between_topology_phases() {
    let input = "\
2
2
10
0

BW
0 100
100 0

FLOW
0 -> 1 1048576

BW
0 20
20 0

FLOW
0 -> 1 1048576
";
    let (sim, world, arrivals) = replay_trace(input);

    assert_eq!(arrivals.len(), 2);
    // First phase: 100 GB/s, arrival at 10495
    assert_eq!(arrivals[0].arrived_at_ns, 10495);
    // Second phase switches to 20 GB/s once quiescent at 10495:
    // 10495 + floor(10 + 1048576/20) = 10495 + 52438
    assert_eq!(arrivals[1].arrived_at_ns, 62933);
    assert_eq!(sim.now().0, 62933);
    assert_eq!(world.tm.stats.delivered_chunks, 2);
}
