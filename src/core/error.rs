//! Error types for the retransmission engine.

use std::io;
use std::time::Duration;

use thiserror::Error;

use super::id::ExchangeId;

/// Errors raised while validating transmission parameters.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// NSTART must allow at least one exchange in flight.
    #[error("nstart must be at least 1")]
    ZeroNStart,

    /// The acknowledgement timeout must be positive.
    #[error("ack timeout must be greater than zero")]
    ZeroAckTimeout,

    /// The random factor must be finite and at least 1.0.
    #[error("ack random factor must be a finite value >= 1.0, got {0}")]
    InvalidRandomFactor(f64),

    /// The MTU must be positive.
    #[error("mtu must be greater than zero")]
    ZeroMtu,

    /// The worst-case retransmission schedule is too long to represent.
    #[error("retransmission schedule exceeds {limit:?}")]
    TransmitWaitOverflow {
        /// Largest accepted `MAX_TRANSMIT_WAIT`.
        limit: Duration,
    },
}

/// Errors reported by the datagram transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error from the underlying socket.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// The socket send buffer is full.
    #[error("send would block")]
    WouldBlock,

    /// Only part of the datagram was written.
    #[error("datagram truncated: sent {sent} of {len} bytes")]
    Truncated {
        /// Bytes accepted by the socket.
        sent: usize,
        /// Datagram length.
        len: usize,
    },

    /// The transport has been shut down.
    #[error("transport closed")]
    Closed,
}

impl TransportError {
    /// Check if a later retransmission may succeed where this send failed.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::WouldBlock | TransportError::Truncated { .. } => true,
            TransportError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
            ),
            TransportError::Closed => false,
        }
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors from the NSTART congestion gate.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GateError {
    /// The gate was closed while waiting or before acquiring.
    #[error("congestion gate closed")]
    Closed,

    /// Every slot is taken (non-blocking acquire only).
    #[error("no free slot")]
    NoCapacity,

    /// The permit was issued by a different gate.
    #[error("permit belongs to another gate")]
    ForeignPermit,
}

/// Terminal failures of a Confirmable exchange.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// No acknowledgement after the whole retransmission budget.
    #[error("exchange {id}: no response after {transmissions} transmissions")]
    RetransmissionExhausted {
        /// Exchange identifier.
        id: ExchangeId,
        /// Total datagrams sent, initial one included.
        transmissions: u32,
    },

    /// The budget ran out and the last transmission failed locally.
    #[error("exchange {id}: transport failure: {source}")]
    Transport {
        /// Exchange identifier.
        id: ExchangeId,
        /// Error from the last transmission.
        #[source]
        source: TransportError,
    },

    /// The exchange or its connection was cancelled.
    #[error("exchange {0} cancelled")]
    Cancelled(ExchangeId),

    /// Another exchange with the same id is still awaiting acknowledgement.
    #[error("exchange {0} is already in flight")]
    DuplicateExchange(ExchangeId),

    /// The payload does not fit the path MTU and must be split first.
    #[error("payload of {len} bytes exceeds mtu {mtu}")]
    PayloadTooLarge {
        /// Payload length.
        len: usize,
        /// Configured MTU.
        mtu: u16,
    },
}

impl ExchangeError {
    /// Check if the peer never answered (RFC 7252 exhaustion).
    pub fn is_no_response(&self) -> bool {
        matches!(
            self,
            ExchangeError::RetransmissionExhausted { .. } | ExchangeError::Transport { .. }
        )
    }

    /// Check if the exchange ended by cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExchangeError::Cancelled(_))
    }

    /// Check if the exchange was refused before anything was sent.
    pub fn is_rejected(&self) -> bool {
        matches!(
            self,
            ExchangeError::DuplicateExchange(_) | ExchangeError::PayloadTooLarge { .. }
        )
    }
}
