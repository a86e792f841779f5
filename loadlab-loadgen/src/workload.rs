use loadlab_common::Endpoint;
use rand::Rng;
use std::ops::RangeInclusive;

/// `mixed` and `stress` share this endpoint mix (weights sum to 28).
const MIXED_WEIGHTS: &[(Endpoint, u32)] = &[
    (Endpoint::Health, 10),
    (Endpoint::Cpu, 5),
    (Endpoint::Json, 4),
    (Endpoint::Slow, 3),
    (Endpoint::Memory, 2),
    (Endpoint::Error, 2),
    (Endpoint::Large, 1),
    (Endpoint::Stats, 1),
];

const HEALTH_ONLY: &[(Endpoint, u32)] = &[(Endpoint::Health, 1)];
const CPU_ONLY: &[(Endpoint, u32)] = &[(Endpoint::Cpu, 1)];

/// Workload profiles controlling which endpoints a worker hits and how long it pauses
/// between requests when think time is enabled.
///
/// | Profile    | Mix                     | Think time (ms) |
/// |------------|-------------------------|-----------------|
/// | Mixed      | weighted, all endpoints | 500–2000        |
/// | Stress     | weighted, all endpoints | 100–500         |
/// | HealthOnly | /health                 | 100–300         |
/// | CpuOnly    | /cpu                    | 500–1000        |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadProfile {
    Mixed,
    Stress,
    HealthOnly,
    CpuOnly,
}

impl WorkloadProfile {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "mixed" => Some(WorkloadProfile::Mixed),
            "stress" => Some(WorkloadProfile::Stress),
            "health-only" => Some(WorkloadProfile::HealthOnly),
            "cpu-only" => Some(WorkloadProfile::CpuOnly),
            _ => None,
        }
    }

    pub fn as_name(&self) -> &'static str {
        match self {
            WorkloadProfile::Mixed => "mixed",
            WorkloadProfile::Stress => "stress",
            WorkloadProfile::HealthOnly => "health-only",
            WorkloadProfile::CpuOnly => "cpu-only",
        }
    }

    pub fn weights(&self) -> &'static [(Endpoint, u32)] {
        match self {
            WorkloadProfile::Mixed | WorkloadProfile::Stress => MIXED_WEIGHTS,
            WorkloadProfile::HealthOnly => HEALTH_ONLY,
            WorkloadProfile::CpuOnly => CPU_ONLY,
        }
    }

    pub fn total_weight(&self) -> u32 {
        self.weights().iter().map(|(_, w)| w).sum()
    }

    pub fn think_time_ms(&self) -> RangeInclusive<u64> {
        match self {
            WorkloadProfile::Mixed => 500..=2000,
            WorkloadProfile::Stress => 100..=500,
            WorkloadProfile::HealthOnly => 100..=300,
            WorkloadProfile::CpuOnly => 500..=1000,
        }
    }

    /// Draw a random endpoint using `rng`.
    pub fn sample(&self, rng: &mut impl Rng) -> Endpoint {
        let roll = rng.gen_range(0..self.total_weight());
        self.endpoint_for_roll(roll)
    }

    /// Map a roll in `0..total_weight()` to an endpoint by walking the cumulative weights.
    /// Exposed for deterministic testing; out-of-range rolls land on the last entry.
    pub fn endpoint_for_roll(&self, roll: u32) -> Endpoint {
        let weights = self.weights();
        let mut upper = 0;
        for (endpoint, weight) in weights {
            upper += weight;
            if roll < upper {
                return *endpoint;
            }
        }
        weights[weights.len() - 1].0
    }
}
