//! socketcand remote peer
//!
//! socketcand exposes a SocketCAN interface over TCP. In BCM mode the daemon
//! can repeat a frame on its own timer, which gives far better timestamp
//! precision than a userspace loop on the client side.
//!
//! # Command format (ASCII, one command per `< ... >` block)
//!
//! ```text
//! < add <sec> <usec> <can_id> <can_dlc> [data]* >
//! < delete <can_id> >
//! < send <can_id> <can_dlc> [data]* >
//! ```
//!
//! `can_id` and data bytes are hexadecimal, `can_dlc` is decimal.
//!
//! Establishing the TCP session (and the `< open ... >` handshake) is left to
//! the caller; [`SocketcandBus`] only writes to an already-open stream.

use crate::{Bus, CanError, CanFrame, MAX_DLC, TxAdapter};
use parking_lot::Mutex;
use std::fmt;
use std::io::Write;
use tracing::{debug, trace, warn};

const MICROS_PER_SEC: u64 = 1_000_000;

/// A socketcand BCM command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketcandCommand {
    /// Register (or replace) a cyclic transmission
    Add { interval_us: u64, frame: CanFrame },
    /// Remove the cyclic transmission for an identifier
    Delete { id: u32 },
    /// Transmit a single frame
    Send { frame: CanFrame },
}

impl SocketcandCommand {
    /// Build an `add` command
    ///
    /// # Errors
    ///
    /// [`CanError::PayloadTooLong`] if `data` exceeds 8 bytes.
    pub fn add(id: u32, data: &[u8], interval_us: u64) -> Result<Self, CanError> {
        Ok(Self::Add {
            interval_us,
            frame: CanFrame::try_new(id, data)?,
        })
    }

    pub fn delete(id: u32) -> Self {
        Self::Delete { id }
    }

    pub fn send(frame: CanFrame) -> Self {
        Self::Send { frame }
    }

    /// Encode to the wire text
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

fn write_payload(f: &mut fmt::Formatter<'_>, frame: &CanFrame) -> fmt::Result {
    debug_assert!(frame.len() <= MAX_DLC);
    write!(f, "{:X} {}", frame.id(), frame.len())?;
    for byte in frame.data_slice() {
        write!(f, " {:02X}", byte)?;
    }
    Ok(())
}

impl fmt::Display for SocketcandCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add { interval_us, frame } => {
                let secs = interval_us / MICROS_PER_SEC;
                let usecs = interval_us % MICROS_PER_SEC;
                write!(f, "< add {} {} ", secs, usecs)?;
                write_payload(f, frame)?;
                write!(f, " >")
            },
            Self::Delete { id } => write!(f, "< delete {:X} >", id),
            Self::Send { frame } => {
                write!(f, "< send ")?;
                write_payload(f, frame)?;
                write!(f, " >")
            },
        }
    }
}

/// [`Bus`] backed by an optional socketcand stream and an optional local interface
///
/// - Remote attached: cyclic jobs and single frames go to the daemon
/// - Remote detached: single frames go to the local [`TxAdapter`], cyclic jobs are refused
pub struct SocketcandBus {
    remote: Mutex<Option<Box<dyn Write + Send>>>,
    local: Mutex<Option<Box<dyn TxAdapter + Send>>>,
}

impl SocketcandBus {
    /// Bus with neither a remote stream nor a local interface
    pub fn new() -> Self {
        Self {
            remote: Mutex::new(None),
            local: Mutex::new(None),
        }
    }

    /// Bus transmitting through a local interface until a remote stream is attached
    pub fn with_local(tx: impl TxAdapter + Send + 'static) -> Self {
        Self {
            remote: Mutex::new(None),
            local: Mutex::new(Some(Box::new(tx))),
        }
    }

    /// Attach an already-open socketcand stream
    pub fn attach_remote(&self, stream: impl Write + Send + 'static) {
        debug!("socketcand: remote stream attached");
        *self.remote.lock() = Some(Box::new(stream));
    }

    /// Detach the socketcand stream, returning it to the caller
    pub fn detach_remote(&self) -> Option<Box<dyn Write + Send>> {
        debug!("socketcand: remote stream detached");
        self.remote.lock().take()
    }

    fn write_command(&self, command: &SocketcandCommand) -> Result<(), CanError> {
        let mut remote = self.remote.lock();
        let stream = remote.as_mut().ok_or(CanError::NotConnected)?;
        trace!("socketcand: -> {}", command);
        stream.write_all(command.encode().as_bytes())?;
        stream.flush()?;
        Ok(())
    }
}

impl Default for SocketcandBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for SocketcandBus {
    fn has_remote_connection(&self) -> bool {
        self.remote.lock().is_some()
    }

    fn send_frame(&self, frame: CanFrame) {
        if self.has_remote_connection() {
            if let Err(e) = self.write_command(&SocketcandCommand::send(frame)) {
                warn!("socketcand: failed to send frame {}: {}", frame, e);
            }
            return;
        }

        match self.local.lock().as_mut() {
            Some(tx) => {
                if let Err(e) = tx.send(frame) {
                    warn!("Local interface: failed to send frame {}: {}", frame, e);
                }
            },
            None => warn!("No transmit path, frame {} dropped", frame),
        }
    }

    fn add_send_job(&self, id: u32, data: &[u8], interval_us: u64) -> Result<(), CanError> {
        self.write_command(&SocketcandCommand::add(id, data, interval_us)?)
    }

    fn remove_send_job(&self, id: u32) -> Result<(), CanError> {
        match self.write_command(&SocketcandCommand::delete(id)) {
            // Nothing can be registered on a peer we are not connected to
            Err(CanError::NotConnected) => Ok(()),
            other => other,
        }
    }
}
