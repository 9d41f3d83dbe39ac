//! Mock bus
//!
//! Records every call a send job makes, in order, so tests can assert on the
//! exact register/deregister sequence and on local emissions.

use crate::{Bus, CanError, CanFrame};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// One recorded call on the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusCall {
    SendFrame {
        frame: CanFrame,
        at: Instant,
    },
    AddSendJob {
        id: u32,
        data: Vec<u8>,
        interval_us: u64,
    },
    RemoveSendJob {
        id: u32,
    },
}

/// Recording [`Bus`] test double
pub struct MockBus {
    calls: Mutex<Vec<BusCall>>,
    frame_sent: Condvar,
    remote: AtomicBool,
    fail_add: AtomicBool,
    fail_remove: AtomicBool,
}

impl MockBus {
    /// Bus without remote connection (jobs run their local loop)
    pub fn local() -> Self {
        Self::with_remote(false)
    }

    /// Bus with a remote connection (jobs register with the peer)
    pub fn remote() -> Self {
        Self::with_remote(true)
    }

    fn with_remote(remote: bool) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            frame_sent: Condvar::new(),
            remote: AtomicBool::new(remote),
            fail_add: AtomicBool::new(false),
            fail_remove: AtomicBool::new(false),
        }
    }

    pub fn set_remote_connection(&self, connected: bool) {
        self.remote.store(connected, Ordering::Relaxed);
    }

    /// Make subsequent `add_send_job` calls fail (the call is still recorded)
    pub fn set_fail_add(&self, fail: bool) {
        self.fail_add.store(fail, Ordering::Relaxed);
    }

    /// Make subsequent `remove_send_job` calls fail (the call is still recorded)
    pub fn set_fail_remove(&self, fail: bool) {
        self.fail_remove.store(fail, Ordering::Relaxed);
    }

    /// Snapshot of all recorded calls
    pub fn calls(&self) -> Vec<BusCall> {
        self.calls.lock().clone()
    }

    /// Recorded calls except local frame emissions
    pub fn remote_calls(&self) -> Vec<BusCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| !matches!(call, BusCall::SendFrame { .. }))
            .cloned()
            .collect()
    }

    /// Frames passed to `send_frame`, with the instant they arrived
    pub fn sent_frames(&self) -> Vec<(CanFrame, Instant)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                BusCall::SendFrame { frame, at } => Some((*frame, *at)),
                _ => None,
            })
            .collect()
    }

    pub fn sent_frame_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, BusCall::SendFrame { .. }))
            .count()
    }

    /// Block until at least `count` frames were sent or `timeout` elapsed
    ///
    /// Returns whether the count was reached.
    pub fn wait_for_frames(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut calls = self.calls.lock();
        loop {
            let sent = calls
                .iter()
                .filter(|call| matches!(call, BusCall::SendFrame { .. }))
                .count();
            if sent >= count {
                return true;
            }
            if self.frame_sent.wait_until(&mut calls, deadline).timed_out() {
                return false;
            }
        }
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

impl Bus for MockBus {
    fn has_remote_connection(&self) -> bool {
        self.remote.load(Ordering::Relaxed)
    }

    fn send_frame(&self, frame: CanFrame) {
        self.calls.lock().push(BusCall::SendFrame {
            frame,
            at: Instant::now(),
        });
        self.frame_sent.notify_all();
    }

    fn add_send_job(&self, id: u32, data: &[u8], interval_us: u64) -> Result<(), CanError> {
        self.calls.lock().push(BusCall::AddSendJob {
            id,
            data: data.to_vec(),
            interval_us,
        });
        if self.fail_add.load(Ordering::Relaxed) {
            return Err(CanError::Remote("add_send_job rejected".to_string()));
        }
        Ok(())
    }

    fn remove_send_job(&self, id: u32) -> Result<(), CanError> {
        self.calls.lock().push(BusCall::RemoveSendJob { id });
        if self.fail_remove.load(Ordering::Relaxed) {
            return Err(CanError::Remote("remove_send_job rejected".to_string()));
        }
        Ok(())
    }
}
