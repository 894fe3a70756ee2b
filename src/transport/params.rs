//! Validated transmission parameters.
//!
//! [`TransmissionConfig`] is the raw, freely editable form; building it yields
//! an immutable [`TransmissionParams`] or a [`ConfigError`].

use std::time::Duration;

use crate::core::ConfigError;
use crate::core::constants;

/// Unvalidated transmission settings.
///
/// Defaults follow RFC 7252 §4.8.
#[derive(Debug, Clone, PartialEq)]
pub struct TransmissionConfig {
    /// Maximum number of unacknowledged exchanges per connection.
    pub n_start: u32,

    /// Base acknowledgement timeout.
    pub ack_timeout: Duration,

    /// Jitter multiplier for the initial timeout (1.0 disables jitter).
    pub ack_random_factor: f64,

    /// Retransmissions before an exchange fails.
    pub max_retransmit: u32,

    /// Double the timeout on each retransmission instead of growing linearly.
    pub exponential_backoff_enable: bool,

    /// Path MTU; larger payloads must be split before they are sent.
    pub mtu: u16,
}

impl Default for TransmissionConfig {
    fn default() -> Self {
        Self {
            n_start: constants::NSTART,
            ack_timeout: constants::ACK_TIMEOUT,
            ack_random_factor: constants::ACK_RANDOM_FACTOR,
            max_retransmit: constants::MAX_RETRANSMIT,
            exponential_backoff_enable: constants::EXPONENTIAL_BACKOFF,
            mtu: constants::DEFAULT_MTU,
        }
    }
}

impl TransmissionConfig {
    /// Validate the settings.
    pub fn validate(self) -> Result<TransmissionParams, ConfigError> {
        if self.n_start == 0 {
            return Err(ConfigError::ZeroNStart);
        }
        if self.ack_timeout.is_zero() {
            return Err(ConfigError::ZeroAckTimeout);
        }
        if !self.ack_random_factor.is_finite() || self.ack_random_factor < 1.0 {
            return Err(ConfigError::InvalidRandomFactor(self.ack_random_factor));
        }
        if self.mtu == 0 {
            return Err(ConfigError::ZeroMtu);
        }

        let overflow = ConfigError::TransmitWaitOverflow {
            limit: constants::MAX_TRANSMIT_WAIT_LIMIT,
        };
        let max_initial = Duration::try_from_secs_f64(
            self.ack_timeout.as_secs_f64() * self.ack_random_factor,
        )
        .map_err(|_| overflow.clone())?;
        let (_, max_transmit_wait) = schedule_bounds(
            max_initial,
            self.max_retransmit,
            self.exponential_backoff_enable,
        )
        .ok_or_else(|| overflow.clone())?;
        if max_transmit_wait > constants::MAX_TRANSMIT_WAIT_LIMIT {
            return Err(overflow);
        }

        Ok(TransmissionParams {
            config: self,
            max_initial,
        })
    }
}

/// Immutable, validated transmission parameters.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use coap_transmission::TransmissionParams;
///
/// let params = TransmissionParams::builder()
///     .transmission(2, Duration::from_secs(3), 5)
///     .backoff(1.0, true)
///     .mtu(1280)
///     .build()
///     .unwrap();
///
/// assert_eq!(params.n_start(), 2);
/// assert_eq!(params.max_transmit_wait(), Duration::from_secs(189));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TransmissionParams {
    config: TransmissionConfig,
    /// `ack_timeout * ack_random_factor`, the largest initial timeout.
    max_initial: Duration,
}

impl Default for TransmissionParams {
    fn default() -> Self {
        let config = TransmissionConfig::default();
        let max_initial = config.ack_timeout.mul_f64(config.ack_random_factor);
        Self {
            config,
            max_initial,
        }
    }
}

impl TransmissionParams {
    /// Start building parameters from the RFC 7252 defaults.
    pub fn builder() -> TransmissionParamsBuilder {
        TransmissionParamsBuilder::new()
    }

    /// Maximum number of unacknowledged exchanges per connection.
    pub fn n_start(&self) -> u32 {
        self.config.n_start
    }

    /// Base acknowledgement timeout.
    pub fn ack_timeout(&self) -> Duration {
        self.config.ack_timeout
    }

    /// Jitter multiplier for the initial timeout.
    pub fn ack_random_factor(&self) -> f64 {
        self.config.ack_random_factor
    }

    /// Retransmissions before an exchange fails.
    pub fn max_retransmit(&self) -> u32 {
        self.config.max_retransmit
    }

    /// Whether timeouts double on each retransmission.
    pub fn exponential_backoff_enable(&self) -> bool {
        self.config.exponential_backoff_enable
    }

    /// Path MTU.
    pub fn mtu(&self) -> u16 {
        self.config.mtu
    }

    /// Check if a datagram of `len` bytes must be split before sending.
    pub fn requires_blockwise(&self, len: usize) -> bool {
        len > usize::from(self.config.mtu)
    }

    /// Worst-case time from the first transmission to the last retransmission.
    pub fn max_transmit_span(&self) -> Duration {
        self.bounds().0
    }

    /// Worst-case time from the first transmission until the exchange fails.
    pub fn max_transmit_wait(&self) -> Duration {
        self.bounds().1
    }

    /// How long a message ID must stay reserved after a Confirmable send.
    ///
    /// `MAX_TRANSMIT_SPAN + 2 * MAX_LATENCY + PROCESSING_DELAY`, with
    /// `PROCESSING_DELAY` taken as the acknowledgement timeout.
    pub fn exchange_lifetime(&self) -> Duration {
        self.max_transmit_span() + 2 * constants::MAX_LATENCY + self.config.ack_timeout
    }

    /// How long a Non-confirmable message ID must stay reserved.
    pub fn non_lifetime(&self) -> Duration {
        self.max_transmit_span() + constants::MAX_LATENCY
    }

    /// Get the raw settings back.
    pub fn config(&self) -> &TransmissionConfig {
        &self.config
    }

    fn bounds(&self) -> (Duration, Duration) {
        // Checked during validation.
        schedule_bounds(
            self.max_initial,
            self.config.max_retransmit,
            self.config.exponential_backoff_enable,
        )
        .unwrap_or((Duration::MAX, Duration::MAX))
    }
}

impl TryFrom<TransmissionConfig> for TransmissionParams {
    type Error = ConfigError;

    fn try_from(config: TransmissionConfig) -> Result<Self, Self::Error> {
        config.validate()
    }
}

/// Sum the timeouts of a full schedule that starts from `initial`.
///
/// Returns `(span, wait)`: the time until the last retransmission and the
/// time until the exchange gives up.
fn schedule_bounds(
    initial: Duration,
    max_retransmit: u32,
    exponential: bool,
) -> Option<(Duration, Duration)> {
    let mut timeout = initial;
    let mut span = Duration::ZERO;
    for attempt in 1..=max_retransmit {
        span = span.checked_add(timeout)?;
        timeout = if exponential {
            timeout.checked_mul(2)?
        } else {
            initial.checked_mul(attempt.checked_add(1)?)?
        };
    }
    let wait = span.checked_add(timeout)?;
    Some((span, wait))
}

/// Builder for [`TransmissionParams`].
///
/// The grouped setters mirror the usual option groups of CoAP stacks:
/// transmission, backoff and MTU.
#[derive(Debug, Clone, Default)]
pub struct TransmissionParamsBuilder {
    config: TransmissionConfig,
}

impl TransmissionParamsBuilder {
    /// Create a builder with the RFC 7252 defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set NSTART.
    pub fn n_start(mut self, n_start: u32) -> Self {
        self.config.n_start = n_start;
        self
    }

    /// Set the base acknowledgement timeout.
    pub fn ack_timeout(mut self, timeout: Duration) -> Self {
        self.config.ack_timeout = timeout;
        self
    }

    /// Set the acknowledgement random factor.
    pub fn ack_random_factor(mut self, factor: f64) -> Self {
        self.config.ack_random_factor = factor;
        self
    }

    /// Set the retransmission budget.
    pub fn max_retransmit(mut self, max_retransmit: u32) -> Self {
        self.config.max_retransmit = max_retransmit;
        self
    }

    /// Choose exponential (RFC 7252) or linear backoff.
    pub fn exponential_backoff(mut self, enable: bool) -> Self {
        self.config.exponential_backoff_enable = enable;
        self
    }

    /// Set the path MTU.
    pub fn mtu(mut self, mtu: u16) -> Self {
        self.config.mtu = mtu;
        self
    }

    /// Set NSTART, the acknowledgement timeout and the retransmission budget.
    pub fn transmission(self, n_start: u32, ack_timeout: Duration, max_retransmit: u32) -> Self {
        self.n_start(n_start)
            .ack_timeout(ack_timeout)
            .max_retransmit(max_retransmit)
    }

    /// Set the jitter factor and the backoff mode.
    pub fn backoff(self, ack_random_factor: f64, exponential: bool) -> Self {
        self.ack_random_factor(ack_random_factor)
            .exponential_backoff(exponential)
    }

    /// Validate and build the parameters.
    pub fn build(self) -> Result<TransmissionParams, ConfigError> {
        self.config.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_rfc() {
        let params = TransmissionParams::builder().build().unwrap();
        assert_eq!(params.n_start(), 1);
        assert_eq!(params.ack_timeout(), Duration::from_secs(2));
        assert_eq!(params.ack_random_factor(), 1.5);
        assert_eq!(params.max_retransmit(), 4);
        assert!(params.exponential_backoff_enable());
        assert_eq!(params, TransmissionParams::default());
    }

    #[test]
    fn test_rfc_derived_values() {
        // RFC 7252 §4.8.2: 45 s, 93 s and 247 s with the default parameters.
        let params = TransmissionParams::default();
        assert_eq!(params.max_transmit_span(), Duration::from_secs(45));
        assert_eq!(params.max_transmit_wait(), Duration::from_secs(93));
        assert_eq!(params.exchange_lifetime(), Duration::from_secs(247));
        assert_eq!(params.non_lifetime(), Duration::from_secs(145));
    }

    #[test]
    fn test_linear_schedule_bounds() {
        let params = TransmissionParams::builder()
            .transmission(1, Duration::from_secs(2), 3)
            .backoff(1.0, false)
            .build()
            .unwrap();

        // Timeouts 2, 4, 6, 8.
        assert_eq!(params.max_transmit_span(), Duration::from_secs(12));
        assert_eq!(params.max_transmit_wait(), Duration::from_secs(20));
    }

    #[test]
    fn test_zero_retransmit_bounds() {
        let params = TransmissionParams::builder()
            .max_retransmit(0)
            .ack_random_factor(1.0)
            .build()
            .unwrap();
        assert_eq!(params.max_transmit_span(), Duration::ZERO);
        assert_eq!(params.max_transmit_wait(), Duration::from_secs(2));
    }

    #[test]
    fn test_rejects_zero_nstart() {
        let err = TransmissionParams::builder().n_start(0).build().unwrap_err();
        assert_eq!(err, ConfigError::ZeroNStart);
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let err = TransmissionParams::builder()
            .ack_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroAckTimeout);
    }

    #[test]
    fn test_rejects_bad_random_factor() {
        for factor in [0.99, 0.0, -1.5, f64::NAN, f64::INFINITY] {
            let err = TransmissionParams::builder()
                .ack_random_factor(factor)
                .build()
                .unwrap_err();
            assert!(matches!(err, ConfigError::InvalidRandomFactor(_)), "{factor}");
        }
    }

    #[test]
    fn test_rejects_zero_mtu() {
        let err = TransmissionParams::builder().mtu(0).build().unwrap_err();
        assert_eq!(err, ConfigError::ZeroMtu);
    }

    #[test]
    fn test_rejects_unbounded_schedule() {
        let err = TransmissionParams::builder()
            .max_retransmit(64)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::TransmitWaitOverflow { .. }));

        let err = TransmissionParams::builder()
            .ack_timeout(Duration::from_secs(u64::MAX))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::TransmitWaitOverflow { .. }));
    }

    #[test]
    fn test_requires_blockwise() {
        let params = TransmissionParams::builder().mtu(1024).build().unwrap();
        assert!(!params.requires_blockwise(1024));
        assert!(params.requires_blockwise(1025));
    }

    #[test]
    fn test_try_from_config() {
        let config = TransmissionConfig {
            n_start: 4,
            ..TransmissionConfig::default()
        };
        let params = TransmissionParams::try_from(config.clone()).unwrap();
        assert_eq!(params.config(), &config);
    }
}
