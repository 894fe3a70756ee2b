//! Transmission parameter defaults from RFC 7252.
//!
//! Section 4.8 of the RFC lists the defaults; section 4.8.2 derives the
//! time values that bound the lifetime of a message exchange.

use std::time::Duration;

// =============================================================================
// TRANSMISSION PARAMETERS (RFC 7252 §4.8)
// =============================================================================

/// Base timeout before the first retransmission.
pub const ACK_TIMEOUT: Duration = Duration::from_secs(2);

/// Upper bound multiplier of the randomized initial timeout.
pub const ACK_RANDOM_FACTOR: f64 = 1.5;

/// Number of retransmissions before an exchange is abandoned.
pub const MAX_RETRANSMIT: u32 = 4;

/// Number of simultaneous outstanding interactions with one peer.
pub const NSTART: u32 = 1;

/// Retransmission timeouts double on every attempt.
pub const EXPONENTIAL_BACKOFF: bool = true;

/// Default path MTU (Ethernet payload minus IPv4 and UDP headers).
pub const DEFAULT_MTU: u16 = 1472;

// =============================================================================
// DERIVED TIME VALUES (RFC 7252 §4.8.2)
// =============================================================================

/// Maximum time a datagram is expected to take from start to arrival.
pub const MAX_LATENCY: Duration = Duration::from_secs(100);

/// Largest `MAX_TRANSMIT_WAIT` a configuration may produce.
///
/// Keeps every timer deadline comfortably inside `Instant` range.
pub const MAX_TRANSMIT_WAIT_LIMIT: Duration = Duration::from_secs(24 * 60 * 60);

// =============================================================================
// LOGGING
// =============================================================================

/// `tracing` target for every event emitted by this crate.
pub const LOG_TARGET: &str = "coap_transmission";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc_defaults() {
        assert_eq!(ACK_TIMEOUT, Duration::from_secs(2));
        assert_eq!(ACK_RANDOM_FACTOR, 1.5);
        assert_eq!(MAX_RETRANSMIT, 4);
        assert_eq!(NSTART, 1);
    }
}
