use crate::net::{Chunk, DeviceId, Link};
use crate::sim::{SimTime, Simulator};

fn one_mb_chunk() -> Chunk {
    Chunk::new(
        1_048_576,
        vec![DeviceId(0), DeviceId(1)],
        Some(0),
        Box::new(|_, _| {}),
    )
}

#[test]
fn delay_arithmetic_truncates_the_sum_not_each_term() {
    // 100 GB/s = 100 B/ns: serializing 1 MB takes 10485.76 ns
    let link = Link::new(100.0, 10.0);
    assert_eq!(link.serialization_delay(1_048_576), 10485);
    assert_eq!(link.communication_delay(1_048_576), 10495);

    // With zero latency the two delays differ only by the pre-truncation fraction
    let link = Link::new(200.0, 0.0);
    assert_eq!(link.serialization_delay(1_048_576), 5242);
    assert_eq!(link.communication_delay(1_048_576), 5242);
}

#[test]
fn send_sets_busy_schedules_arrival_and_returns_serialization_time() {
    let mut sim = Simulator::default();
    let mut link = Link::new(100.0, 10.0);

    assert!(!link.is_busy());
    let free_at = link.send(one_mb_chunk(), &mut sim);

    assert_eq!(free_at, SimTime(10485));
    assert!(link.is_busy());
    // The chunk-arrival event is now queued
    assert!(!sim.finished());
}

#[test]
#[should_panic(expected = "link must be free")]
fn sending_on_a_busy_link_panics() {
    let mut sim = Simulator::default();
    let mut link = Link::new(100.0, 10.0);
    let _ = link.send(one_mb_chunk(), &mut sim);
    let _ = link.send(one_mb_chunk(), &mut sim);
}

#[test]
#[should_panic(expected = "zero-bandwidth link")]
fn sending_on_a_zero_bandwidth_link_panics() {
    let mut sim = Simulator::default();
    let mut link = Link::new(0.0, 10.0);
    let _ = link.send(one_mb_chunk(), &mut sim);
}

#[test]
fn reconfigure_with_unchanged_parameters_is_a_no_op() {
    let mut sim = Simulator::default();
    let mut link = Link::new(100.0, 10.0);

    let ready_at = link.reconfigure(100.0, 10.0, 500.0, &mut sim);

    assert_eq!(ready_at, SimTime::ZERO);
    assert!(!link.is_busy());
    assert_eq!(link.bandwidth_gbps(), 100.0);
}

#[test]
fn reconfigure_installs_new_parameters_and_occupies_the_link() {
    let mut sim = Simulator::default();
    let mut link = Link::new(100.0, 10.0);

    let ready_at = link.reconfigure(20.0, 15.0, 500.0, &mut sim);

    assert_eq!(ready_at, SimTime(500));
    assert!(link.is_busy());
    assert_eq!(link.bandwidth_gbps(), 20.0);
    assert_eq!(link.latency_ns(), 15.0);
    // The new bandwidth is used for delay arithmetic right away
    assert_eq!(link.communication_delay(1_048_576), 52443);
}
