//! Exchange correlation keys.

use std::fmt;

/// Correlation key of one Confirmable exchange.
///
/// Usually the CoAP message ID, or a token packed into 64 bits. Must be
/// unique among the exchanges that are live on one connection at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExchangeId(u64);

impl ExchangeId {
    /// Create an exchange ID from a raw value.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl From<u16> for ExchangeId {
    fn from(message_id: u16) -> Self {
        Self(u64::from(message_id))
    }
}

impl From<u32> for ExchangeId {
    fn from(raw: u32) -> Self {
        Self(u64::from(raw))
    }
}

impl From<u64> for ExchangeId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<ExchangeId> for u64 {
    fn from(id: ExchangeId) -> u64 {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_fixed_width_hex() {
        assert_eq!(ExchangeId::new(0xbeef).to_string(), "000000000000beef");
    }

    #[test]
    fn test_message_id_conversion() {
        let id = ExchangeId::from(0x1234u16);
        assert_eq!(id.get(), 0x1234);
        assert_eq!(u64::from(id), 0x1234);
    }
}
