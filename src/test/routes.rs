use crate::net::{DeviceId, NetWorld, TopologyManager};
use crate::sim::Simulator;
use std::collections::BTreeMap;

fn symmetric_matrix(n: usize, edges: &[(usize, usize, f64)]) -> Vec<Vec<f64>> {
    let mut m = vec![vec![0.0; n]; n];
    for &(i, j, bw) in edges {
        m[i][j] = bw;
        m[j][i] = bw;
    }
    m
}

fn manager_with(n: usize, edges: &[(usize, usize, f64)]) -> (Simulator, NetWorld) {
    let mut sim = Simulator::default();
    let tm = TopologyManager::new(n, n, BTreeMap::new());
    let mut world = NetWorld::new(tm);
    let accepted = world.tm.reconfigure(
        symmetric_matrix(n, edges),
        vec![vec![0.0; n]; n],
        0.0,
        0,
        &mut sim,
    );
    assert!(accepted);
    (sim, world)
}

fn ids(route: &[DeviceId]) -> Vec<usize> {
    route.iter().map(|d| d.0).collect()
}

#[test]
fn bfs_prefers_fewest_hops() {
    // Line topology: 0 - 1 - 2 - 3
    let (_sim, world) =
        manager_with(4, &[(0, 1, 100.0), (1, 2, 100.0), (2, 3, 100.0)]);

    assert_eq!(ids(world.tm.precomputed_route(DeviceId(0), DeviceId(3))), [0, 1, 2, 3]);
    assert_eq!(ids(world.tm.precomputed_route(DeviceId(0), DeviceId(1))), [0, 1]);
    assert_eq!(ids(world.tm.precomputed_route(DeviceId(3), DeviceId(1))), [3, 2, 1]);
}

#[test]
fn equal_length_paths_tie_break_by_ascending_neighbor_id() {
    // Diamond: two equal-length paths 0-1-3 and 0-2-3
    let (_sim, world) = manager_with(
        4,
        &[(0, 1, 100.0), (0, 2, 100.0), (1, 3, 100.0), (2, 3, 100.0)],
    );

    assert_eq!(ids(world.tm.precomputed_route(DeviceId(0), DeviceId(3))), [0, 1, 3]);
    assert_eq!(ids(world.tm.precomputed_route(DeviceId(3), DeviceId(0))), [3, 1, 0]);
    // 1 -> 2 also has equal-length paths via 0 and via 3
    assert_eq!(ids(world.tm.precomputed_route(DeviceId(1), DeviceId(2))), [1, 0, 2]);
}

#[test]
fn unreachable_destination_gets_a_stub_route() {
    // Only 0-1 is connected; 2 is isolated
    let (_sim, world) = manager_with(3, &[(0, 1, 100.0)]);

    assert_eq!(ids(world.tm.precomputed_route(DeviceId(0), DeviceId(2))), [0, 2]);
    assert_eq!(ids(world.tm.precomputed_route(DeviceId(2), DeviceId(0))), [2, 0]);
    assert_eq!(ids(world.tm.precomputed_route(DeviceId(0), DeviceId(1))), [0, 1]);
}

#[test]
fn route_to_self_is_the_single_device() {
    let (_sim, world) = manager_with(3, &[(0, 1, 100.0), (1, 2, 100.0)]);
    assert_eq!(ids(world.tm.precomputed_route(DeviceId(1), DeviceId(1))), [1]);
}

#[test]
fn zero_bandwidth_edges_are_not_part_of_the_graph() {
    // The direct 0-2 edge has zero bandwidth, so the shortest path detours via 1
    let n = 3;
    let mut m = symmetric_matrix(n, &[(0, 1, 100.0), (1, 2, 100.0)]);
    m[0][2] = 0.0;
    m[2][0] = 0.0;

    let mut sim = Simulator::default();
    let tm = TopologyManager::new(n, n, BTreeMap::new());
    let mut world = NetWorld::new(tm);
    assert!(world
        .tm
        .reconfigure(m, vec![vec![0.0; n]; n], 0.0, 0, &mut sim));

    assert_eq!(ids(world.tm.precomputed_route(DeviceId(0), DeviceId(2))), [0, 1, 2]);
}

#[test]
fn seed_route_is_source_then_destination() {
    let (_sim, world) = manager_with(3, &[(0, 1, 100.0), (1, 2, 100.0)]);
    assert_eq!(ids(&world.tm.route(DeviceId(0), DeviceId(2))), [0, 2]);
}

#[test]
#[should_panic(expected = "must be an NPU")]
fn flow_endpoints_must_be_npus() {
    // Only the first 2 of 4 devices are NPUs
    let mut sim = Simulator::default();
    let tm = TopologyManager::new(2, 4, BTreeMap::new());
    let mut world = NetWorld::new(tm);
    assert!(world.tm.reconfigure(
        symmetric_matrix(4, &[(0, 1, 100.0)]),
        vec![vec![0.0; 4]; 4],
        0.0,
        0,
        &mut sim,
    ));
    let _ = world.tm.route(DeviceId(0), DeviceId(3));
}
