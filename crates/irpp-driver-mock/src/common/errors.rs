//! Error injection for the simulated laser.
//!
//! Every simulated SDK call first passes through [`ErrorConfig::check_operation`]
//! with its operation name (`"arm"`, `"tune_to"`, `"is_armed"`, ...). Scenarios
//! decide whether that call fails and with which [`DriverErrorKind`].

use super::rng::MockRng;
use irpp_core::error::{DriverError, DriverErrorKind};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Error injection configuration for the simulated laser.
#[derive(Clone, Debug)]
pub struct ErrorConfig {
    /// Per-operation failure rate (0.0 to 1.0), `"*"` for every operation
    failure_rates: Arc<HashMap<&'static str, f64>>,
    scenarios: Arc<Vec<ErrorScenario>>,
    rng: Arc<MockRng>,
    state: Arc<Mutex<ErrorState>>,
}

/// Deterministic failure pattern.
#[derive(Debug, Clone)]
pub enum ErrorScenario {
    /// Fail after N successful calls of one operation
    FailAfterN {
        /// Operation name.
        operation: &'static str,
        /// Successful calls before the first failure.
        count: u32,
    },
    /// Operation never completes in time
    Timeout {
        /// Operation name.
        operation: &'static str,
    },
    /// SDK returns a non-zero code for one operation
    SdkFailure {
        /// Operation name.
        operation: &'static str,
        /// Code quoted in the error message.
        code: u32,
    },
    /// Every call fails with a transport error from the first call on
    CommunicationLoss,
    /// Hardware fault with specific code
    HardwareFault {
        /// Fault code latched by the simulator.
        code: u32,
    },
}

#[derive(Default, Debug)]
struct ErrorState {
    operation_counts: HashMap<&'static str, u32>,
    communication_lost: bool,
    /// 0 = no fault
    hardware_fault_code: u32,
}

impl ErrorConfig {
    /// No injected errors.
    pub fn none() -> Self {
        Self::build(HashMap::new(), Vec::new(), None)
    }

    /// Uniform random failures on every operation.
    pub fn random_failures_seeded(rate: f64, seed: Option<u64>) -> Self {
        let mut rates = HashMap::new();
        rates.insert("*", rate);
        Self::build(rates, Vec::new(), seed)
    }

    /// A single scenario.
    pub fn scenario(scenario: ErrorScenario) -> Self {
        Self::scenarios(vec![scenario])
    }

    /// Scenarios checked in order; the first match fails the call.
    pub fn scenarios(scenarios: Vec<ErrorScenario>) -> Self {
        Self::build(HashMap::new(), scenarios, None)
    }

    fn build(
        rates: HashMap<&'static str, f64>,
        scenarios: Vec<ErrorScenario>,
        seed: Option<u64>,
    ) -> Self {
        Self {
            failure_rates: Arc::new(rates),
            scenarios: Arc::new(scenarios),
            rng: Arc::new(MockRng::new(seed)),
            state: Arc::new(Mutex::new(ErrorState::default())),
        }
    }

    /// Decide whether `operation` fails and build the error it fails with.
    pub fn check_operation(
        &self,
        driver_type: &str,
        operation: &'static str,
    ) -> Result<(), DriverError> {
        let mut state = self.state.lock();

        if state.communication_lost {
            return Err(DriverError::new(
                driver_type,
                DriverErrorKind::Communication,
                "Communication lost",
            ));
        }

        if state.hardware_fault_code != 0 {
            return Err(DriverError::new(
                driver_type,
                DriverErrorKind::Hardware,
                format!("Hardware fault: {}", state.hardware_fault_code),
            ));
        }

        for scenario in self.scenarios.iter() {
            match scenario {
                ErrorScenario::FailAfterN {
                    operation: op,
                    count,
                } if *op == operation => {
                    let current = state.operation_counts.entry(operation).or_insert(0);
                    *current += 1;
                    if *current > *count {
                        return Err(DriverError::new(
                            driver_type,
                            DriverErrorKind::Hardware,
                            format!("Injected failure after {} operations", count),
                        ));
                    }
                }
                ErrorScenario::Timeout { operation: op } if *op == operation => {
                    return Err(DriverError::new(
                        driver_type,
                        DriverErrorKind::Timeout,
                        format!("Operation '{}' timed out", operation),
                    ));
                }
                ErrorScenario::SdkFailure {
                    operation: op,
                    code,
                } if *op == operation => {
                    return Err(DriverError::new(
                        driver_type,
                        DriverErrorKind::Sdk,
                        format!("{} returned error code {}", operation, code),
                    ));
                }
                ErrorScenario::CommunicationLoss => {
                    state.communication_lost = true;
                    return Err(DriverError::new(
                        driver_type,
                        DriverErrorKind::Communication,
                        "Communication lost",
                    ));
                }
                ErrorScenario::HardwareFault { code } => {
                    state.hardware_fault_code = *code;
                    return Err(DriverError::new(
                        driver_type,
                        DriverErrorKind::Hardware,
                        format!("Hardware fault: {}", code),
                    ));
                }
                _ => {}
            }
        }

        let rate = self
            .failure_rates
            .get(operation)
            .or_else(|| self.failure_rates.get("*"))
            .copied()
            .unwrap_or(0.0);

        if self.rng.should_fail(rate) {
            return Err(DriverError::new(
                driver_type,
                DriverErrorKind::Hardware,
                format!("Random failure on operation '{}'", operation),
            ));
        }

        Ok(())
    }

    /// Clear counters and latched faults.
    pub fn reset(&self) {
        *self.state.lock() = ErrorState::default();
    }
}

impl Default for ErrorConfig {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_errors() {
        let config = ErrorConfig::none();
        for _ in 0..100 {
            assert!(config.check_operation("mock", "is_armed").is_ok());
        }
    }

    #[test]
    fn test_random_failures() {
        let config = ErrorConfig::random_failures_seeded(0.5, Some(42));
        let failures = (0..1000)
            .filter(|_| config.check_operation("mock", "is_tuned").is_err())
            .count();
        assert!(failures > 400 && failures < 600, "Got {} failures", failures);
    }

    #[test]
    fn test_fail_after_n_and_reset() {
        let config = ErrorConfig::scenario(ErrorScenario::FailAfterN {
            operation: "stop_scan",
            count: 2,
        });

        assert!(config.check_operation("mock", "stop_scan").is_ok());
        assert!(config.check_operation("mock", "stop_scan").is_ok());
        assert!(config.check_operation("mock", "stop_scan").is_err());
        // other operations are unaffected
        assert!(config.check_operation("mock", "arm").is_ok());

        config.reset();
        assert!(config.check_operation("mock", "stop_scan").is_ok());
    }

    #[test]
    fn test_sdk_failure_kind() {
        let config = ErrorConfig::scenario(ErrorScenario::SdkFailure {
            operation: "tune_to",
            code: 33,
        });
        let err = config.check_operation("mock", "tune_to").unwrap_err();
        assert_eq!(err.kind, DriverErrorKind::Sdk);
        assert!(err.message.contains("33"));
    }

    #[test]
    fn test_timeout_scenario() {
        let config = ErrorConfig::scenario(ErrorScenario::Timeout { operation: "arm" });
        let err = config.check_operation("mock", "arm").unwrap_err();
        assert_eq!(err.kind, DriverErrorKind::Timeout);
        assert!(err.message.contains("timed out"));
    }

    #[test]
    fn test_communication_loss_latches() {
        let config = ErrorConfig::scenario(ErrorScenario::CommunicationLoss);
        let err = config.check_operation("mock", "is_interlocked").unwrap_err();
        assert_eq!(err.kind, DriverErrorKind::Communication);
        assert!(config.check_operation("mock", "disarm").is_err());
    }

    #[test]
    fn test_hardware_fault_latches() {
        let config = ErrorConfig::scenario(ErrorScenario::HardwareFault { code: 0x42 });
        let err = config.check_operation("mock", "arm").unwrap_err();
        assert_eq!(err.kind, DriverErrorKind::Hardware);
        assert!(err.message.contains("66"));
        assert!(config.check_operation("mock", "is_armed").is_err());
    }
}
