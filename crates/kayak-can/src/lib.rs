//! # Kayak CAN Layer
//!
//! CAN frame type and the bus collaborator used by send jobs.
//!
//! ## Modules
//!
//! - `frame`: classic CAN frame
//! - `bus`: the [`Bus`] trait a send job talks to
//! - `socketcand`: command encoding for a remote socketcand daemon, plus [`SocketcandBus`]
//! - `mock`: recording [`MockBus`] for tests (feature `mock`)

use thiserror::Error;

pub mod bus;
pub mod frame;
pub mod socketcand;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use bus::Bus;
pub use frame::{CanFrame, MAX_DLC, MAX_EXTENDED_ID, MAX_STANDARD_ID};
pub use socketcand::{SocketcandBus, SocketcandCommand};

#[cfg(any(test, feature = "mock"))]
pub use mock::{BusCall, MockBus};

/// CAN layer error type
#[derive(Error, Debug)]
pub enum CanError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No remote connection")]
    NotConnected,
    #[error("Payload too long: {len} bytes (max 8)")]
    PayloadTooLong { len: usize },
    #[error("Remote peer error: {0}")]
    Remote(String),
}

/// Local transmit primitive (write-only side of a CAN interface)
pub trait TxAdapter {
    fn send(&mut self, frame: CanFrame) -> Result<(), CanError>;
}
