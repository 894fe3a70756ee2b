//! Per-exchange retransmission state.
//!
//! [`Exchange`] is a plain state machine: it never sleeps and never sends.
//! The scheduler feeds it timer expirations and peer events and acts on the
//! answers.

use std::time::Duration;

use crate::core::ExchangeId;

use super::params::TransmissionParams;
use super::timing;

/// Lifecycle state of an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    /// Datagram sent, timer running.
    Armed,
    /// Peer answered with an acknowledgement or a reset.
    Completed(Outcome),
    /// Retransmission budget exhausted.
    Failed,
    /// Cancelled locally.
    Cancelled,
}

impl ExchangeState {
    /// Check if no further transition can happen.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExchangeState::Armed)
    }
}

/// How the peer settled a completed exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The peer acknowledged the message.
    Acknowledged,
    /// The peer rejected the message with a reset.
    Reset,
}

/// What the scheduler must do when an exchange's timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// Resend the payload and rearm the timer for the given duration.
    Retransmit(Duration),
    /// Give up: the exchange has moved to [`ExchangeState::Failed`].
    Exhausted,
    /// The exchange already reached a terminal state; do nothing.
    Stale,
}

/// Retransmission state of one Confirmable message.
#[derive(Debug, Clone)]
pub struct Exchange {
    id: ExchangeId,
    payload: Box<[u8]>,
    state: ExchangeState,
    /// Retransmissions performed so far.
    attempt: u32,
    max_retransmit: u32,
    initial_timeout: Duration,
    current_timeout: Duration,
}

impl Exchange {
    /// Create an armed exchange with a freshly randomized timeout.
    pub fn new(id: ExchangeId, payload: impl Into<Box<[u8]>>, params: &TransmissionParams) -> Self {
        Self::with_timeout(id, payload, params, timing::initial_timeout(params))
    }

    /// Create an armed exchange with a given initial timeout.
    pub fn with_timeout(
        id: ExchangeId,
        payload: impl Into<Box<[u8]>>,
        params: &TransmissionParams,
        initial_timeout: Duration,
    ) -> Self {
        Self {
            id,
            payload: payload.into(),
            state: ExchangeState::Armed,
            attempt: 0,
            max_retransmit: params.max_retransmit(),
            initial_timeout,
            current_timeout: initial_timeout,
        }
    }

    /// Exchange identifier.
    pub fn id(&self) -> ExchangeId {
        self.id
    }

    /// Encoded datagram, resent verbatim.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Current state.
    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// Retransmissions performed so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Datagrams handed to the transport so far, initial one included.
    pub fn transmissions(&self) -> u32 {
        self.attempt + 1
    }

    /// Timeout the timer is currently armed with.
    pub fn current_timeout(&self) -> Duration {
        self.current_timeout
    }

    /// Timeout chosen when the exchange was created.
    pub fn initial_timeout(&self) -> Duration {
        self.initial_timeout
    }

    /// Handle a timer expiration.
    pub fn on_timeout(&mut self, params: &TransmissionParams) -> TimerAction {
        if self.state.is_terminal() {
            return TimerAction::Stale;
        }
        if self.attempt >= self.max_retransmit {
            self.state = ExchangeState::Failed;
            return TimerAction::Exhausted;
        }

        self.attempt += 1;
        self.current_timeout = timing::next_timeout(
            params,
            self.initial_timeout,
            self.current_timeout,
            self.attempt,
        );
        TimerAction::Retransmit(self.current_timeout)
    }

    /// Settle the exchange with the peer's answer.
    ///
    /// Returns `false` if it was already terminal.
    pub fn complete(&mut self, outcome: Outcome) -> bool {
        self.settle(ExchangeState::Completed(outcome))
    }

    /// Cancel the exchange.
    ///
    /// Returns `false` if it was already terminal.
    pub fn cancel(&mut self) -> bool {
        self.settle(ExchangeState::Cancelled)
    }

    fn settle(&mut self, state: ExchangeState) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = state;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(max_retransmit: u32, exponential: bool) -> TransmissionParams {
        TransmissionParams::builder()
            .transmission(1, Duration::from_secs(2), max_retransmit)
            .backoff(1.0, exponential)
            .build()
            .unwrap()
    }

    #[test]
    fn test_new_exchange_is_armed() {
        let params = params(2, true);
        let exchange = Exchange::new(ExchangeId::new(1), vec![0x40u8, 0x01], &params);

        assert_eq!(exchange.state(), ExchangeState::Armed);
        assert_eq!(exchange.attempt(), 0);
        assert_eq!(exchange.transmissions(), 1);
        assert_eq!(exchange.current_timeout(), Duration::from_secs(2));
        assert_eq!(exchange.payload(), &[0x40, 0x01]);
    }

    #[test]
    fn test_exhausts_after_max_retransmit() {
        let params = params(2, true);
        let mut exchange = Exchange::new(ExchangeId::new(1), vec![1u8], &params);

        assert_eq!(
            exchange.on_timeout(&params),
            TimerAction::Retransmit(Duration::from_secs(4))
        );
        assert_eq!(
            exchange.on_timeout(&params),
            TimerAction::Retransmit(Duration::from_secs(8))
        );
        assert_eq!(exchange.on_timeout(&params), TimerAction::Exhausted);
        assert_eq!(exchange.state(), ExchangeState::Failed);
        assert_eq!(exchange.attempt(), 2);
        assert_eq!(exchange.transmissions(), 3);

        // Never a third retransmission.
        assert_eq!(exchange.on_timeout(&params), TimerAction::Stale);
        assert_eq!(exchange.attempt(), 2);
    }

    #[test]
    fn test_zero_retransmit_fails_on_first_timeout() {
        let params = params(0, true);
        let mut exchange = Exchange::new(ExchangeId::new(9), vec![1u8], &params);
        assert_eq!(exchange.on_timeout(&params), TimerAction::Exhausted);
        assert_eq!(exchange.transmissions(), 1);
    }

    #[test]
    fn test_exponential_timeouts_double() {
        let params = params(6, true);
        let mut exchange = Exchange::with_timeout(
            ExchangeId::new(1),
            vec![1u8],
            &params,
            Duration::from_millis(2700),
        );

        let mut previous = exchange.current_timeout();
        while let TimerAction::Retransmit(next) = exchange.on_timeout(&params) {
            assert_eq!(next, previous * 2);
            previous = next;
        }
        assert_eq!(exchange.attempt(), 6);
    }

    #[test]
    fn test_linear_timeouts() {
        let params = params(3, false);
        let mut exchange = Exchange::new(ExchangeId::new(1), vec![1u8], &params);

        let mut timeouts = vec![exchange.current_timeout()];
        while let TimerAction::Retransmit(next) = exchange.on_timeout(&params) {
            timeouts.push(next);
        }
        let secs: Vec<_> = timeouts.iter().map(Duration::as_secs).collect();
        assert_eq!(secs, vec![2, 4, 6, 8]);
    }

    #[test]
    fn test_ack_completes_once() {
        let params = params(2, true);
        let mut exchange = Exchange::new(ExchangeId::new(1), vec![1u8], &params);

        assert!(exchange.complete(Outcome::Acknowledged));
        assert_eq!(exchange.state(), ExchangeState::Completed(Outcome::Acknowledged));

        // Duplicate ack, late reset, cancel and timer are all ignored.
        assert!(!exchange.complete(Outcome::Acknowledged));
        assert!(!exchange.complete(Outcome::Reset));
        assert!(!exchange.cancel());
        assert_eq!(exchange.on_timeout(&params), TimerAction::Stale);
        assert_eq!(exchange.state(), ExchangeState::Completed(Outcome::Acknowledged));
    }

    #[test]
    fn test_reset_is_distinct_from_ack() {
        let params = params(2, true);
        let mut exchange = Exchange::new(ExchangeId::new(1), vec![1u8], &params);
        assert!(exchange.complete(Outcome::Reset));
        assert_eq!(exchange.state(), ExchangeState::Completed(Outcome::Reset));
        assert!(exchange.state().is_terminal());
    }

    #[test]
    fn test_failed_exchange_ignores_ack() {
        let params = params(0, true);
        let mut exchange = Exchange::new(ExchangeId::new(1), vec![1u8], &params);
        exchange.on_timeout(&params);

        assert!(!exchange.complete(Outcome::Acknowledged));
        assert_eq!(exchange.state(), ExchangeState::Failed);
    }

    #[test]
    fn test_cancel() {
        let params = params(2, true);
        let mut exchange = Exchange::new(ExchangeId::new(1), vec![1u8], &params);
        assert!(exchange.cancel());
        assert_eq!(exchange.state(), ExchangeState::Cancelled);
        assert_eq!(exchange.on_timeout(&params), TimerAction::Stale);
    }
}
