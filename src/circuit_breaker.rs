use failsafe::{backoff, failure_policy, Config};
use std::time::Duration;

/// Circuit breaker type for outbound SMS provider calls.
pub type SmsCircuitBreaker =
    failsafe::StateMachine<failure_policy::ConsecutiveFailures<backoff::Exponential>, ()>;

/// Creates a circuit breaker for the SMS provider to prevent a flapping
/// gateway from stalling booking flows.
///
/// # Configuration
///
/// - **Failure threshold**: 3 consecutive failures triggers OPEN state.
/// - **Backoff**: Exponential backoff from 5s to 30s before attempting recovery.
///
/// # States
///
/// - **CLOSED**: Normal operation, requests pass through.
/// - **OPEN**: Too many failures, requests fail fast.
/// - **HALF_OPEN**: Testing if the provider recovered.
pub fn create_sms_circuit_breaker() -> SmsCircuitBreaker {
    let backoff_strategy = backoff::exponential(
        Duration::from_secs(5),  // Initial delay
        Duration::from_secs(30), // Maximum delay
    );

    let failure_policy = failure_policy::consecutive_failures(3, backoff_strategy);

    Config::new().failure_policy(failure_policy).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use failsafe::{CircuitBreaker, Error};

    #[test]
    fn test_circuit_breaker_opens_after_failures() {
        let cb = create_sms_circuit_breaker();

        // Simulate 3 consecutive failures
        for _ in 0..3 {
            let result: Result<(), Error<&str>> = cb.call(|| Err::<(), &str>("simulated error"));
            assert!(result.is_err());
        }

        // Next call should be rejected (circuit is open)
        let result: Result<(), Error<&str>> = cb.call(|| Ok::<(), &str>(()));

        match result {
            Err(Error::Rejected) => {
                // Circuit is open, expected behavior
            }
            _ => panic!("Expected circuit to be open and reject requests"),
        }
    }

    #[test]
    fn test_circuit_breaker_allows_success() {
        let cb = create_sms_circuit_breaker();

        let result: Result<i32, Error<&str>> = cb.call(|| Ok::<i32, &str>(42));

        assert_eq!(result.unwrap(), 42);
    }
}
