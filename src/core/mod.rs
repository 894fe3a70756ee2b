//! Core types, constants and collaborator traits.
//!
//! Everything here is free of timers and tasks; the [`transport`](crate::transport)
//! module builds the engine on top of it.

pub mod constants;
mod error;
mod id;
mod traits;

pub use error::*;
pub use id::ExchangeId;
pub use traits::*;
