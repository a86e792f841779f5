use loadlab_common::Endpoint;
use loadlab_loadgen::workload::WorkloadProfile;
use rand::{rngs::StdRng, SeedableRng};
use std::collections::BTreeMap;

#[test]
fn test_from_name_roundtrip() {
    for (name, expected) in [
        ("mixed", WorkloadProfile::Mixed),
        ("stress", WorkloadProfile::Stress),
        ("health-only", WorkloadProfile::HealthOnly),
        ("cpu-only", WorkloadProfile::CpuOnly),
    ] {
        let parsed = WorkloadProfile::from_name(name);
        assert_eq!(parsed, Some(expected), "from_name({name:?}) failed");
        assert_eq!(expected.as_name(), name, "as_name() mismatch for {name:?}");
    }
    assert!(WorkloadProfile::from_name("balanced").is_none());
}

#[test]
fn test_mixed_roll_boundaries() {
    // Cumulative: health 0-9, cpu 10-14, json 15-18, slow 19-21, memory 22-23,
    // error 24-25, large 26, stats 27.
    let p = WorkloadProfile::Mixed;
    assert_eq!(p.total_weight(), 28);
    assert_eq!(p.endpoint_for_roll(0), Endpoint::Health);
    assert_eq!(p.endpoint_for_roll(9), Endpoint::Health);
    assert_eq!(p.endpoint_for_roll(10), Endpoint::Cpu);
    assert_eq!(p.endpoint_for_roll(14), Endpoint::Cpu);
    assert_eq!(p.endpoint_for_roll(15), Endpoint::Json);
    assert_eq!(p.endpoint_for_roll(19), Endpoint::Slow);
    assert_eq!(p.endpoint_for_roll(22), Endpoint::Memory);
    assert_eq!(p.endpoint_for_roll(24), Endpoint::Error);
    assert_eq!(p.endpoint_for_roll(25), Endpoint::Error);
    assert_eq!(p.endpoint_for_roll(26), Endpoint::Large);
    assert_eq!(p.endpoint_for_roll(27), Endpoint::Stats);
}

#[test]
fn test_single_endpoint_profiles() {
    assert_eq!(WorkloadProfile::HealthOnly.endpoint_for_roll(0), Endpoint::Health);
    assert_eq!(WorkloadProfile::CpuOnly.endpoint_for_roll(0), Endpoint::Cpu);

    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..100 {
        assert_eq!(WorkloadProfile::HealthOnly.sample(&mut rng), Endpoint::Health);
    }
}

#[test]
fn test_stress_shares_mix_but_thinks_less() {
    assert_eq!(WorkloadProfile::Stress.weights(), WorkloadProfile::Mixed.weights());
    let stress = WorkloadProfile::Stress.think_time_ms();
    let mixed = WorkloadProfile::Mixed.think_time_ms();
    assert!(stress.end() < mixed.end());
}

#[test]
fn test_sample_follows_weights() {
    let mut rng = StdRng::seed_from_u64(2024);
    let mut counts: BTreeMap<Endpoint, u32> = BTreeMap::new();
    let trials = 28_000;
    for _ in 0..trials {
        *counts.entry(WorkloadProfile::Mixed.sample(&mut rng)).or_insert(0) += 1;
    }

    // Expected: health 10000, large 1000. Allow ~5 standard deviations.
    let health = counts[&Endpoint::Health];
    assert!((9_600..=10_400).contains(&health), "health {health}");
    let large = counts[&Endpoint::Large];
    assert!((850..=1_150).contains(&large), "large {large}");
    assert!(!counts.contains_key(&Endpoint::Stream));
    assert!(!counts.contains_key(&Endpoint::Async));
}
