//! Retransmission timeout computation.
//!
//! Implements the randomized initial timeout and the backoff rules of
//! RFC 7252 §4.2, plus a linear fallback.

use std::time::Duration;

use rand::Rng;

use super::params::TransmissionParams;

/// Pick the initial timeout of a new exchange using the thread-local RNG.
pub fn initial_timeout(params: &TransmissionParams) -> Duration {
    initial_timeout_with(params, &mut rand::thread_rng())
}

/// Pick the initial timeout of a new exchange.
///
/// Uniform in `[ack_timeout, ack_timeout * ack_random_factor]`. A factor of
/// exactly 1.0 returns `ack_timeout` without touching the RNG.
pub fn initial_timeout_with<R: Rng + ?Sized>(params: &TransmissionParams, rng: &mut R) -> Duration {
    let base = params.ack_timeout();
    let spread = params.ack_random_factor() - 1.0;
    if spread <= 0.0 {
        return base;
    }

    let jitter = base.mul_f64(spread * rng.gen_range(0.0..=1.0));
    base + jitter
}

/// Timeout to arm after a retransmission.
///
/// `attempt` is the retransmission count including the one being scheduled.
/// Exponential backoff doubles `current`; linear backoff returns
/// `initial * (attempt + 1)`.
pub fn next_timeout(
    params: &TransmissionParams,
    initial: Duration,
    current: Duration,
    attempt: u32,
) -> Duration {
    if params.exponential_backoff_enable() {
        current.saturating_mul(2)
    } else {
        initial.saturating_mul(attempt.saturating_add(1))
    }
}
