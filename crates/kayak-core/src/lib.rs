//! # Kayak Core
//!
//! Periodic CAN frame transmission.
//!
//! A [`SendJob`] repeatedly emits one frame at a fixed interval, either by
//! driving its own timing thread or, when the bus is connected to a socketcand
//! daemon, by registering the frame with the daemon for better timestamp
//! precision. Identifier, payload and interval can be changed while the job runs.
//!
//! ```rust
//! use kayak_core::{JobMode, SendJob};
//! use kayak_can::SocketcandBus;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut job = SendJob::new(0x100, &[0x01, 0x02], 100_000)?;
//! job.start(Arc::new(SocketcandBus::new()))?;
//! assert_eq!(job.mode(), JobMode::LocalActive);
//! job.stop()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
mod error;
pub mod logging;
pub mod mode;
pub mod send_job;

pub use config::{ConfigError, JobSetConfig, SendJobConfig};
pub use error::{Result, SendJobError};
pub use logging::init_logger;
pub use mode::JobMode;
pub use send_job::SendJob;

// Common CAN layer types
pub use kayak_can::{Bus, CanError, CanFrame};

#[cfg(feature = "mock")]
pub use kayak_can::{BusCall, MockBus};
