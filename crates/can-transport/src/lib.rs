//! can-transport: CAN frame types and the send side of a bus
//!
//! The physical receive path belongs to the platform driver, which hands every inbound
//! frame to a callback. This crate only models what callers need to transmit: the
//! identifier and frame types, the [`CanBus`] trait and a `mock` backend (on by default)
//! that records transmitted frames so higher layers are testable on any host.

mod types;
pub use types::{CanFrame, CanId, Timestamp, MAX_DATA_LEN, MAX_FD_DATA_LEN};

mod error;
pub use error::{Result, TransportError};

mod traits;
pub use traits::CanBus;

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockBus, SendHook};
