//! Bus collaborator
//!
//! A send job never owns a CAN interface. It asks a [`Bus`] to either emit a
//! frame right now, or to have a remote daemon repeat a frame periodically.

use crate::{CanError, CanFrame};
use std::sync::Arc;

/// Operations a send job needs from the bus it runs on
///
/// Implementations are shared between the controlling thread and the local
/// timing thread of a job, hence `Send + Sync` and `&self` receivers.
pub trait Bus: Send + Sync {
    /// Whether periodic transmission should be delegated to a remote peer
    fn has_remote_connection(&self) -> bool;

    /// Transmit one frame immediately
    ///
    /// Fire-and-forget: failures (interface down, buffer full) are handled and
    /// logged by the implementation, never reported to the caller.
    fn send_frame(&self, frame: CanFrame);

    /// Ask the remote peer to start sending `data` under `id` every `interval_us`
    fn add_send_job(&self, id: u32, data: &[u8], interval_us: u64) -> Result<(), CanError>;

    /// Ask the remote peer to stop the periodic transmission registered for `id`
    ///
    /// Removing an id that was never registered must be harmless.
    fn remove_send_job(&self, id: u32) -> Result<(), CanError>;
}

impl<B: Bus + ?Sized> Bus for Arc<B> {
    fn has_remote_connection(&self) -> bool {
        (**self).has_remote_connection()
    }

    fn send_frame(&self, frame: CanFrame) {
        (**self).send_frame(frame)
    }

    fn add_send_job(&self, id: u32, data: &[u8], interval_us: u64) -> Result<(), CanError> {
        (**self).add_send_job(id, data, interval_us)
    }

    fn remove_send_job(&self, id: u32) -> Result<(), CanError> {
        (**self).remove_send_job(id)
    }
}
