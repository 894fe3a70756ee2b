//! Retransmission engine.
//!
//! This module implements reliable delivery of Confirmable messages as
//! described in RFC 7252 §4.2 and §4.7. It provides:
//!
//! - **Parameters**: [`TransmissionParams`] with validation and derived
//!   RFC 7252 §4.8.2 time values
//! - **Timeouts**: randomized initial timeout and exponential or linear
//!   backoff in [`timing`]
//! - **Exchange state machine**: [`Exchange`]
//! - **Congestion control**: [`CongestionGate`] enforcing NSTART
//! - **Scheduling**: [`RetransmissionScheduler`], one per connection
//! - **Adapters**: [`UdpTransmitter`] and [`ChannelTransmitter`]
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │    Application (requests, observe)      │
//! ├─────────────────────────────────────────┤
//! │   send(payload, id)        ▲ outcome    │
//! │   CongestionGate ─► RetransmissionSched │  ← This module
//! │   transmit ▼               ▲ ack/reset  │
//! ├─────────────────────────────────────────┤
//! │   Message codec, DTLS, UDP socket       │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Timing
//!
//! | Parameter | Default | Effect |
//! |-----------|---------|--------|
//! | `NSTART` | 1 | Exchanges in flight per connection |
//! | `ACK_TIMEOUT` | 2 s | Base timeout |
//! | `ACK_RANDOM_FACTOR` | 1.5 | Initial timeout in `[2 s, 3 s]` |
//! | `MAX_RETRANSMIT` | 4 | Retransmissions before failure |
//! | `MAX_TRANSMIT_WAIT` | 93 s | Worst case until failure |

mod exchange;
mod gate;
mod params;
mod scheduler;
mod socket;
pub mod timing;

pub use exchange::{Exchange, ExchangeState, Outcome, TimerAction};
pub use gate::{CongestionGate, SlotPermit};
pub use params::{TransmissionConfig, TransmissionParams, TransmissionParamsBuilder};
pub use scheduler::{EventKind, ExchangeEvent, ExchangeResult, RetransmissionScheduler};
pub use socket::ChannelTransmitter;
#[cfg(feature = "udp")]
pub use socket::UdpTransmitter;
