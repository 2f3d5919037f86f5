//! Test harness: randomized migration simulator and certification runs

pub mod simulator;

pub use simulator::*;

/// Runs the simulator over several seeds
pub struct TestHarness;

impl TestHarness {
    /// One simulator run per seed in `seeds`, each with `instances` instances
    #[must_use]
    pub fn run_certification(seeds: std::ops::Range<u64>, instances: u64) -> CertificationReport {
        let mut total_violations = 0;
        let mut seeds_tested = 0;

        for seed in seeds {
            let report = run_simulator(SimulatorConfig {
                seed,
                instances,
                stop_on_first_violation: false,
                ..SimulatorConfig::default()
            });
            total_violations += report.violations.len();
            seeds_tested += 1;
        }

        CertificationReport {
            passed: total_violations == 0,
            total_violations,
            seeds_tested,
        }
    }
}

/// Report from certification
#[derive(Debug, Clone)]
pub struct CertificationReport {
    /// No seed produced a violation
    pub passed: bool,
    /// Violations across all seeds
    pub total_violations: usize,
    /// Seeds run
    pub seeds_tested: u64,
}
