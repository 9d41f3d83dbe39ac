//! Send job error types

use crate::mode::JobMode;
use kayak_can::CanError;
use thiserror::Error;

/// Send job error type
#[derive(Error, Debug)]
pub enum SendJobError {
    /// `start` called on a job that is already transmitting
    #[error("Send job already active ({mode})")]
    AlreadyActive { mode: JobMode },

    /// The stop sequence did not complete cleanly (local thread terminated abnormally)
    #[error("Stop interrupted: local send thread did not terminate cleanly")]
    CancellationInterrupted,

    /// Remote peer rejected a register/deregister request
    #[error("Remote send job error: {0}")]
    Remote(#[from] CanError),

    /// Interval of zero microseconds
    #[error("Invalid interval: must be greater than 0 µs")]
    InvalidInterval,

    /// Payload exceeds classic CAN length
    #[error("Payload too long: {len} bytes (max 8)")]
    PayloadTooLong { len: usize },

    /// Local send thread could not be spawned
    #[error("Failed to spawn send thread: {0}")]
    Spawn(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SendJobError>;
