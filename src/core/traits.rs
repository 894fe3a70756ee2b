//! Collaborator interfaces.
//!
//! The engine never touches sockets directly: it is handed a [`Transmit`]
//! capability and is told about incoming acknowledgements by the layer that
//! decodes datagrams.

use std::sync::Arc;

use super::error::TransportResult;

/// Fire-and-forget datagram send.
///
/// Used for the initial transmission and for every retransmission of an
/// exchange. The call is made while the scheduler holds its connection lock,
/// so it must not block and must not call back into the scheduler.
///
/// # Example
///
/// ```
/// use coap_transmission::{Transmit, TransportResult};
///
/// struct Discard;
///
/// impl Transmit for Discard {
///     fn transmit(&self, _datagram: &[u8]) -> TransportResult<()> {
///         Ok(())
///     }
/// }
/// ```
pub trait Transmit: Send + Sync + 'static {
    /// Hand one encoded datagram to the network.
    fn transmit(&self, datagram: &[u8]) -> TransportResult<()>;
}

impl<F> Transmit for F
where
    F: Fn(&[u8]) -> TransportResult<()> + Send + Sync + 'static,
{
    fn transmit(&self, datagram: &[u8]) -> TransportResult<()> {
        self(datagram)
    }
}

impl<T: Transmit + ?Sized> Transmit for Arc<T> {
    fn transmit(&self, datagram: &[u8]) -> TransportResult<()> {
        (**self).transmit(datagram)
    }
}
