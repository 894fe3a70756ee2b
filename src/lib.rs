//! # coap-transmission
//!
//! Reliable delivery of CoAP **Confirmable** messages over unreliable
//! datagram transports, following the retransmission model of RFC 7252.
//!
//! A Confirmable message is retransmitted with a growing timeout until the
//! peer acknowledges or resets it, or until the retransmission budget runs
//! out. At most NSTART such exchanges may be unacknowledged on one
//! connection at a time; further sends wait in FIFO order for a free slot.
//!
//! - **Jitter**: the first timeout is drawn from
//!   `[ACK_TIMEOUT, ACK_TIMEOUT * ACK_RANDOM_FACTOR]`
//! - **Backoff**: exponential (RFC 7252) or linear
//! - **Outcomes**: acknowledged, reset, no response, or cancelled
//! - **Transport-agnostic**: datagrams leave through a [`Transmit`]
//!   implementation and answers come back as [`ExchangeEvent`]s
//!
//! ## Feature Flags
//!
//! - `udp` (default): [`UdpTransmitter`](transport::UdpTransmitter) over a
//!   tokio UDP socket
//!
//! ## Modules
//!
//! - [`core`](crate::core): Errors, identifiers, constants and the transport trait
//! - [`transport`]: Parameters, backoff, congestion gate and scheduler
//!
//! ## Example Usage
//!
//! ```rust
//! use std::time::Duration;
//! use coap_transmission::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread", start_paused = true)]
//! # async fn main() -> Result<(), ConfigError> {
//! let params = TransmissionParams::builder()
//!     .transmission(1, Duration::from_secs(2), 2)
//!     .backoff(1.0, true)
//!     .build()?;
//!
//! // Nobody answers: three transmissions at 0 s, 2 s and 6 s, then failure.
//! let (transport, _datagrams) = ChannelTransmitter::new();
//! let scheduler = RetransmissionScheduler::new(params, transport);
//!
//! let err = scheduler.send(b"\x40\x01\x00\x01".to_vec(), 1u16).await.unwrap_err();
//! assert!(err.is_no_response());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// Retransmission engine
pub mod transport;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::*;

    pub use crate::transport::{
        ChannelTransmitter, CongestionGate, EventKind, ExchangeEvent, ExchangeResult,
        ExchangeState, Outcome, RetransmissionScheduler, SlotPermit, TransmissionConfig,
        TransmissionParams, TransmissionParamsBuilder,
    };

    #[cfg(feature = "udp")]
    pub use crate::transport::UdpTransmitter;
}

// Re-export commonly used items at crate root
pub use crate::core::{
    ConfigError, ExchangeError, ExchangeId, GateError, Transmit, TransportError, TransportResult,
};
pub use crate::transport::{
    ExchangeEvent, ExchangeResult, Outcome, RetransmissionScheduler, TransmissionParams,
};
