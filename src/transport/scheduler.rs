//! Per-connection retransmission scheduler.
//!
//! Owns every live [`Exchange`] of one connection. Timer expirations, peer
//! events and cancellation all go through the connection lock, so for any
//! exchange exactly one of "timer fires and resends" and "ack arrives and
//! completes" takes effect; the loser finds the exchange gone and does
//! nothing. Datagrams are handed to the transport while that lock is held,
//! which is why no resend can follow a returned cancellation.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, oneshot};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{self, Instant};

use crate::core::constants::LOG_TARGET;
use crate::core::{ExchangeError, ExchangeId, Transmit, TransportError};

use super::exchange::{Exchange, Outcome, TimerAction};
use super::gate::{CongestionGate, SlotPermit};
use super::params::TransmissionParams;

/// Final result of a Confirmable exchange.
pub type ExchangeResult = Result<Outcome, ExchangeError>;

/// Kind of peer response matched to an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Acknowledgement (or piggybacked response).
    Ack,
    /// Reset.
    Reset,
}

/// Classified inbound datagram, as produced by the decoding layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeEvent {
    /// Exchange the datagram answers.
    pub id: ExchangeId,
    /// What the peer said.
    pub kind: EventKind,
}

impl ExchangeEvent {
    /// Acknowledgement for `id`.
    pub fn ack(id: impl Into<ExchangeId>) -> Self {
        Self {
            id: id.into(),
            kind: EventKind::Ack,
        }
    }

    /// Reset for `id`.
    pub fn reset(id: impl Into<ExchangeId>) -> Self {
        Self {
            id: id.into(),
            kind: EventKind::Reset,
        }
    }
}

/// Retransmission engine for one connection.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use coap_transmission::prelude::*;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let transport = |_datagram: &[u8]| -> TransportResult<()> { Ok(()) };
/// let scheduler = Arc::new(RetransmissionScheduler::new(TransmissionParams::default(), transport));
///
/// let acker = Arc::clone(&scheduler);
/// tokio::spawn(async move {
///     tokio::task::yield_now().await;
///     acker.notify_ack(0x7d34u16);
/// });
///
/// let outcome = scheduler.send(vec![0x40u8, 0x01, 0x7d, 0x34], 0x7d34u16).await;
/// assert_eq!(outcome.unwrap(), Outcome::Acknowledged);
/// # }
/// ```
pub struct RetransmissionScheduler<T: Transmit> {
    shared: Arc<Shared<T>>,
}

impl<T: Transmit> RetransmissionScheduler<T> {
    /// Create a scheduler that sends through `transport`.
    pub fn new(params: TransmissionParams, transport: T) -> Self {
        let gate = CongestionGate::new(params.n_start());
        Self {
            shared: Arc::new(Shared {
                params,
                gate,
                transport,
                connection: Mutex::new(Connection::default()),
            }),
        }
    }

    /// Send a Confirmable datagram and wait until its exchange settles.
    ///
    /// Waits for an NSTART slot first. Resolves to the peer's answer, or to
    /// an [`ExchangeError`] when the budget runs out, the exchange is
    /// cancelled, or the send is refused. Dropping the returned future
    /// cancels the exchange.
    pub async fn send(
        &self,
        payload: impl Into<Box<[u8]>>,
        id: impl Into<ExchangeId>,
    ) -> ExchangeResult {
        let payload = payload.into();
        let id = id.into();

        if self.shared.params.requires_blockwise(payload.len()) {
            return Err(ExchangeError::PayloadTooLarge {
                len: payload.len(),
                mtu: self.shared.params.mtu(),
            });
        }

        let permit = self
            .shared
            .gate
            .acquire()
            .await
            .map_err(|_| ExchangeError::Cancelled(id))?;
        let (serial, outcome) = self.shared.start(id, payload, permit)?;

        let mut guard = CancelOnDrop {
            shared: &self.shared,
            id,
            serial,
            armed: true,
        };
        let result = outcome.await.unwrap_or(Err(ExchangeError::Cancelled(id)));
        guard.armed = false;
        result
    }

    /// Report an acknowledgement for `id`.
    ///
    /// Returns `false` for unknown or already settled exchanges, which are
    /// ignored.
    pub fn notify_ack(&self, id: impl Into<ExchangeId>) -> bool {
        self.shared.complete(id.into(), Outcome::Acknowledged)
    }

    /// Report a reset for `id`.
    ///
    /// Returns `false` for unknown or already settled exchanges, which are
    /// ignored.
    pub fn notify_reset(&self, id: impl Into<ExchangeId>) -> bool {
        self.shared.complete(id.into(), Outcome::Reset)
    }

    /// Apply one event from the inbound feed.
    pub fn handle_event(&self, event: ExchangeEvent) -> bool {
        self.shared.handle_event(event)
    }

    /// Drain an inbound event feed on a background task.
    ///
    /// The task ends when every sender of `events` is dropped.
    pub fn spawn_event_pump(&self, mut events: mpsc::Receiver<ExchangeEvent>) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                shared.handle_event(event);
            }
        })
    }

    /// Cancel one exchange.
    pub fn cancel(&self, id: impl Into<ExchangeId>) -> bool {
        self.shared.cancel(id.into(), None)
    }

    /// Cancel every live exchange and refuse further sends.
    ///
    /// Returns the number of exchanges that were cancelled.
    pub fn cancel_connection(&self) -> usize {
        self.shared.cancel_connection()
    }

    /// Transmission parameters of this connection.
    pub fn params(&self) -> &TransmissionParams {
        &self.shared.params
    }

    /// The transport collaborator.
    pub fn transport(&self) -> &T {
        &self.shared.transport
    }

    /// Number of NSTART slots currently taken.
    pub fn in_flight(&self) -> usize {
        self.shared.gate.in_flight()
    }

    /// Number of exchanges awaiting acknowledgement.
    pub fn live_exchanges(&self) -> usize {
        self.shared.lock().exchanges.len()
    }

    /// Check if the connection has been cancelled.
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }
}

impl<T: Transmit> Drop for RetransmissionScheduler<T> {
    fn drop(&mut self) {
        self.shared.cancel_connection();
    }
}

impl<T: Transmit> fmt::Debug for RetransmissionScheduler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetransmissionScheduler")
            .field("params", &self.shared.params)
            .field("gate", &self.shared.gate)
            .field("live_exchanges", &self.live_exchanges())
            .finish()
    }
}

struct Shared<T> {
    params: TransmissionParams,
    gate: CongestionGate,
    transport: T,
    connection: Mutex<Connection>,
}

#[derive(Default)]
struct Connection {
    exchanges: HashMap<ExchangeId, LiveExchange>,
    /// Distinguishes successive exchanges that reuse an id.
    next_serial: u64,
    closed: bool,
}

struct LiveExchange {
    serial: u64,
    exchange: Exchange,
    permit: SlotPermit,
    outcome: oneshot::Sender<ExchangeResult>,
    timer: AbortHandle,
    /// Error of the most recent transmission, if it failed.
    last_error: Option<TransportError>,
}

impl<T: Transmit> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.connection.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start(
        self: &Arc<Self>,
        id: ExchangeId,
        payload: Box<[u8]>,
        permit: SlotPermit,
    ) -> Result<(u64, oneshot::Receiver<ExchangeResult>), ExchangeError> {
        let mut connection = self.lock();
        if connection.closed {
            self.release_slot(id, permit);
            return Err(ExchangeError::Cancelled(id));
        }
        if connection.exchanges.contains_key(&id) {
            self.release_slot(id, permit);
            return Err(ExchangeError::DuplicateExchange(id));
        }

        let serial = connection.next_serial;
        connection.next_serial += 1;

        let exchange = Exchange::new(id, payload, &self.params);
        let timeout = exchange.current_timeout();
        let last_error = self.transmit(&exchange);
        let timer = self.arm(id, serial, Instant::now() + timeout);
        let (tx, rx) = oneshot::channel();

        tracing::debug!(
            target: LOG_TARGET,
            %id,
            ?timeout,
            len = exchange.payload().len(),
            in_flight = self.gate.in_flight(),
            "exchange started",
        );

        connection.exchanges.insert(
            id,
            LiveExchange {
                serial,
                exchange,
                permit,
                outcome: tx,
                timer,
                last_error,
            },
        );
        Ok((serial, rx))
    }

    fn arm(self: &Arc<Self>, id: ExchangeId, serial: u64, deadline: Instant) -> AbortHandle {
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            let mut deadline = deadline;
            loop {
                time::sleep_until(deadline).await;
                match shared.on_timer(id, serial) {
                    Some(next) => deadline = next,
                    None => break,
                }
            }
        })
        .abort_handle()
    }

    /// Returns the next deadline, or `None` once the timer is done.
    fn on_timer(&self, id: ExchangeId, serial: u64) -> Option<Instant> {
        let mut connection = self.lock();
        let live = connection
            .exchanges
            .get_mut(&id)
            .filter(|live| live.serial == serial)?;

        match live.exchange.on_timeout(&self.params) {
            TimerAction::Retransmit(timeout) => {
                tracing::trace!(
                    target: LOG_TARGET,
                    %id,
                    attempt = live.exchange.attempt(),
                    ?timeout,
                    "retransmitting",
                );
                live.last_error = self.transmit(&live.exchange);
                Some(Instant::now() + timeout)
            }
            TimerAction::Exhausted => {
                let mut live = connection.exchanges.remove(&id)?;
                drop(connection);

                let result = match live.last_error.take() {
                    Some(source) => Err(ExchangeError::Transport { id, source }),
                    None => Err(ExchangeError::RetransmissionExhausted {
                        id,
                        transmissions: live.exchange.transmissions(),
                    }),
                };
                self.finish(live, result);
                None
            }
            TimerAction::Stale => None,
        }
    }

    fn handle_event(&self, event: ExchangeEvent) -> bool {
        match event.kind {
            EventKind::Ack => self.complete(event.id, Outcome::Acknowledged),
            EventKind::Reset => self.complete(event.id, Outcome::Reset),
        }
    }

    fn complete(&self, id: ExchangeId, outcome: Outcome) -> bool {
        let Some(mut live) = self.lock().exchanges.remove(&id) else {
            tracing::trace!(
                target: LOG_TARGET,
                %id,
                ?outcome,
                "ignoring late or duplicate event",
            );
            return false;
        };

        live.exchange.complete(outcome);
        self.finish(live, Ok(outcome));
        true
    }

    /// Cancel `id`, restricted to one incarnation when `serial` is given.
    fn cancel(&self, id: ExchangeId, serial: Option<u64>) -> bool {
        let live = {
            let mut connection = self.lock();
            let matches = connection
                .exchanges
                .get(&id)
                .is_some_and(|live| serial.is_none_or(|serial| live.serial == serial));
            if !matches {
                return false;
            }
            connection.exchanges.remove(&id)
        };

        match live {
            Some(mut live) => {
                live.exchange.cancel();
                self.finish(live, Err(ExchangeError::Cancelled(id)));
                true
            }
            None => false,
        }
    }

    fn cancel_connection(&self) -> usize {
        let drained: Vec<LiveExchange> = {
            let mut connection = self.lock();
            connection.closed = true;
            connection.exchanges.drain().map(|(_, live)| live).collect()
        };
        self.gate.close();

        let count = drained.len();
        for mut live in drained {
            let id = live.exchange.id();
            live.exchange.cancel();
            self.finish(live, Err(ExchangeError::Cancelled(id)));
        }

        tracing::debug!(target: LOG_TARGET, cancelled = count, "connection cancelled");
        count
    }

    /// Tear down a settled exchange: stop its timer, free its slot and
    /// hand the result to the waiting sender.
    fn finish(&self, live: LiveExchange, result: ExchangeResult) {
        let LiveExchange {
            exchange,
            permit,
            outcome: reply,
            timer,
            ..
        } = live;
        let id = exchange.id();

        timer.abort();
        self.release_slot(id, permit);

        match &result {
            Ok(outcome) => tracing::debug!(
                target: LOG_TARGET,
                %id,
                ?outcome,
                transmissions = exchange.transmissions(),
                "exchange completed",
            ),
            Err(error) => tracing::debug!(
                target: LOG_TARGET,
                %id,
                %error,
                transmissions = exchange.transmissions(),
                "exchange ended",
            ),
        }

        // The sender may have stopped waiting.
        let _ = reply.send(result);
    }

    fn release_slot(&self, id: ExchangeId, permit: SlotPermit) {
        if let Err(error) = self.gate.release(permit) {
            tracing::error!(target: LOG_TARGET, %id, %error, "slot released to wrong gate");
        }
    }

    fn transmit(&self, exchange: &Exchange) -> Option<TransportError> {
        match self.transport.transmit(exchange.payload()) {
            Ok(()) => None,
            Err(error) => {
                tracing::warn!(
                    target: LOG_TARGET,
                    id = %exchange.id(),
                    attempt = exchange.attempt(),
                    %error,
                    "transmission failed",
                );
                Some(error)
            }
        }
    }
}

/// Cancels a pending exchange when its `send` future is dropped early.
struct CancelOnDrop<'a, T: Transmit> {
    shared: &'a Shared<T>,
    id: ExchangeId,
    serial: u64,
    armed: bool,
}

impl<T: Transmit> Drop for CancelOnDrop<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            self.shared.cancel(self.id, Some(self.serial));
        }
    }
}
