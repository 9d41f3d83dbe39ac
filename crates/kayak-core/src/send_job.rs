//! Send job - periodic transmission of a single CAN frame
//!
//! A send job emits one frame every `interval` microseconds, in one of two ways:
//!
//! - **Remote**: the bus has a connection to a socketcand daemon. The frame is
//!   registered with the daemon, which repeats it on its own timer with much
//!   better timestamp precision than a userspace loop.
//! - **Local**: no connection. A dedicated thread builds the frame, hands it to
//!   [`Bus::send_frame`] and sleeps for the interval (fixed delay, not fixed rate).
//!
//! # Live reconfiguration
//!
//! Identifier, payload and interval are published together as one immutable
//! snapshot. The local thread loads a full snapshot each tick, so a change is
//! picked up on the next emission and a frame never mixes old and new values.
//! A remote registration cannot be edited in place: every change removes the
//! old registration and adds the new one.
//!
//! # Cancellation
//!
//! The local thread sleeps on a cancellation channel instead of `thread::sleep`.
//! `stop()` drops the sender, which wakes the thread immediately, then joins it.
//! Once `stop()` returns no further frame is emitted.

use crate::error::{Result, SendJobError};
use crate::mode::JobMode;
use arc_swap::ArcSwap;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use kayak_can::{Bus, CanError, CanFrame};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Immutable parameter snapshot shared with the local thread
#[derive(Debug, Clone, PartialEq, Eq)]
struct JobParams {
    frame: CanFrame,
    interval_us: u64,
}

impl JobParams {
    fn new(id: u32, data: &[u8], interval_us: u64) -> Result<Self> {
        if interval_us == 0 {
            return Err(SendJobError::InvalidInterval);
        }
        let frame = CanFrame::try_new(id, data).map_err(|e| match e {
            CanError::PayloadTooLong { len } => SendJobError::PayloadTooLong { len },
            other => SendJobError::Remote(other),
        })?;
        Ok(Self { frame, interval_us })
    }

    fn interval(&self) -> Duration {
        Duration::from_micros(self.interval_us)
    }
}

/// Local timing thread and its cancellation handle
struct LocalWorker {
    /// Dropping the sender disconnects the channel and wakes the thread
    cancel_tx: Sender<()>,
    handle: JoinHandle<()>,
}

impl LocalWorker {
    fn spawn(
        bus: Arc<dyn Bus>,
        params: Arc<ArcSwap<JobParams>>,
        frames_sent: Arc<AtomicU64>,
    ) -> Result<Self> {
        let (cancel_tx, cancel_rx) = bounded(1);
        let name = format!("kayak-send-{:X}", params.load().frame.id());

        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || Self::send_loop(bus, params, cancel_rx, frames_sent))
            .map_err(SendJobError::Spawn)?;

        Ok(Self { cancel_tx, handle })
    }

    fn send_loop(
        bus: Arc<dyn Bus>,
        params: Arc<ArcSwap<JobParams>>,
        cancel_rx: Receiver<()>,
        frames_sent: Arc<AtomicU64>,
    ) {
        loop {
            // Copy out of the guard; it must not be held across the sleep
            let (frame, interval) = {
                let snapshot = params.load();
                (snapshot.frame, snapshot.interval())
            };

            bus.send_frame(frame);
            frames_sent.fetch_add(1, Ordering::Relaxed);
            trace!("Send job: emitted {}", frame);

            match cancel_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    trace!("Send job: cancellation received, exiting");
                    break;
                },
            }
        }
    }

    /// Signal cancellation and wait for the thread to exit
    fn stop(self) -> Result<()> {
        drop(self.cancel_tx);
        self.handle.join().map_err(|_| SendJobError::CancellationInterrupted)
    }
}

enum JobState {
    Idle,
    Local {
        bus: Arc<dyn Bus>,
        worker: LocalWorker,
    },
    Remote {
        bus: Arc<dyn Bus>,
    },
}

/// Periodic sender of a single CAN frame
///
/// # Example
///
/// ```rust
/// use kayak_core::SendJob;
/// use kayak_can::SocketcandBus;
/// use std::sync::Arc;
///
/// # fn main() -> kayak_core::Result<()> {
/// let bus = Arc::new(SocketcandBus::new());
/// let mut job = SendJob::new(0x100, &[0x01, 0x02], 100_000)?;
///
/// job.start(bus)?;
/// job.set_interval(50_000)?;
/// job.stop()?;
/// # Ok(())
/// # }
/// ```
///
/// Control operations (`start`, `stop`, setters) take `&mut self`, so they are
/// serialized by the borrow checker. Dropping an active job stops it.
pub struct SendJob {
    params: Arc<ArcSwap<JobParams>>,
    state: JobState,
    /// Frames emitted by the local thread (remote emissions are not visible here)
    frames_sent: Arc<AtomicU64>,
}

impl SendJob {
    /// Create an idle job
    ///
    /// # Errors
    ///
    /// - [`SendJobError::InvalidInterval`]: `interval_us` is 0
    /// - [`SendJobError::PayloadTooLong`]: `data` is longer than 8 bytes
    pub fn new(id: u32, data: &[u8], interval_us: u64) -> Result<Self> {
        let params = JobParams::new(id, data, interval_us)?;
        Ok(Self {
            params: Arc::new(ArcSwap::from_pointee(params)),
            state: JobState::Idle,
            frames_sent: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn id(&self) -> u32 {
        self.params.load().frame.id()
    }

    pub fn data(&self) -> Vec<u8> {
        self.params.load().frame.data_slice().to_vec()
    }

    /// Frame the job currently emits (or registers)
    pub fn frame(&self) -> CanFrame {
        self.params.load().frame
    }

    /// Interval in microseconds
    pub fn interval_us(&self) -> u64 {
        self.params.load().interval_us
    }

    pub fn interval(&self) -> Duration {
        self.params.load().interval()
    }

    pub fn mode(&self) -> JobMode {
        match self.state {
            JobState::Idle => JobMode::Idle,
            JobState::Local { .. } => JobMode::LocalActive,
            JobState::Remote { .. } => JobMode::RemoteActive,
        }
    }

    pub fn is_sending(&self) -> bool {
        self.mode().is_active()
    }

    /// Bus the job is running on, if active
    pub fn bus(&self) -> Option<&Arc<dyn Bus>> {
        match &self.state {
            JobState::Idle => None,
            JobState::Local { bus, .. } | JobState::Remote { bus } => Some(bus),
        }
    }

    /// Total frames emitted by local threads of this job
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    /// Start transmitting on `bus`
    ///
    /// Delegates to the remote peer if `bus` has a remote connection, otherwise
    /// spawns the local timing thread.
    ///
    /// # Errors
    ///
    /// - [`SendJobError::AlreadyActive`]: the job was started and not stopped
    /// - [`SendJobError::Remote`]: the peer rejected the registration (job stays idle)
    /// - [`SendJobError::Spawn`]: the local thread could not be created (job stays idle)
    pub fn start(&mut self, bus: Arc<dyn Bus>) -> Result<()> {
        let mode = self.mode();
        if mode.is_active() {
            return Err(SendJobError::AlreadyActive { mode });
        }

        if bus.has_remote_connection() {
            let params = self.params.load_full();
            bus.add_send_job(
                params.frame.id(),
                params.frame.data_slice(),
                params.interval_us,
            )?;
            info!(
                "Send job 0x{:X}: registered with remote peer ({} µs)",
                params.frame.id(),
                params.interval_us
            );
            self.state = JobState::Remote { bus };
        } else {
            let worker =
                LocalWorker::spawn(bus.clone(), self.params.clone(), self.frames_sent.clone())?;
            debug!("Send job 0x{:X}: local send thread started", self.id());
            self.state = JobState::Local { bus, worker };
        }

        Ok(())
    }

    /// Stop transmitting
    ///
    /// No-op on an idle job. In local mode this blocks until the timing thread
    /// has exited; no frame is emitted after it returns.
    ///
    /// # Errors
    ///
    /// - [`SendJobError::CancellationInterrupted`]: the local thread panicked;
    ///   the job is idle but the last tick may not have completed
    /// - [`SendJobError::Remote`]: the peer rejected the deregistration;
    ///   the job stays in remote mode
    pub fn stop(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, JobState::Idle) {
            JobState::Idle => Ok(()),
            JobState::Local { worker, .. } => {
                let result = worker.stop();
                debug!("Send job 0x{:X}: local send thread stopped", self.id());
                result
            },
            JobState::Remote { bus } => {
                let id = self.id();
                if let Err(e) = bus.remove_send_job(id) {
                    self.state = JobState::Remote { bus };
                    return Err(e.into());
                }
                info!("Send job 0x{:X}: removed from remote peer", id);
                Ok(())
            },
        }
    }

    /// Change the identifier
    ///
    /// In remote mode the registration under the *old* identifier is removed
    /// before the new one is added.
    pub fn set_id(&mut self, id: u32) -> Result<()> {
        let current = self.params.load_full();
        let next = JobParams::new(id, current.frame.data_slice(), current.interval_us)?;
        self.reconfigure(next)
    }

    /// Change the payload (0-8 bytes)
    pub fn set_data(&mut self, data: &[u8]) -> Result<()> {
        let current = self.params.load_full();
        let next = JobParams::new(current.frame.id(), data, current.interval_us)?;
        self.reconfigure(next)
    }

    /// Change the interval (microseconds, > 0)
    pub fn set_interval(&mut self, interval_us: u64) -> Result<()> {
        let current = self.params.load_full();
        let next = JobParams::new(current.frame.id(), current.frame.data_slice(), interval_us)?;
        self.reconfigure(next)
    }

    /// Publish `next`; re-register if remote
    ///
    /// Local mode needs no restart: the thread reads the new snapshot on its next tick.
    fn reconfigure(&mut self, next: JobParams) -> Result<()> {
        let previous = self.params.swap(Arc::new(next));

        let bus = match &self.state {
            JobState::Remote { bus } => bus.clone(),
            JobState::Idle | JobState::Local { .. } => return Ok(()),
        };

        if let Err(e) = bus.remove_send_job(previous.frame.id()) {
            // Old registration is still live on the peer
            self.params.store(previous);
            return Err(e.into());
        }

        let current = self.params.load_full();
        if let Err(e) = bus.add_send_job(
            current.frame.id(),
            current.frame.data_slice(),
            current.interval_us,
        ) {
            warn!(
                "Send job 0x{:X}: re-registration failed, job is now idle: {}",
                current.frame.id(),
                e
            );
            self.state = JobState::Idle;
            return Err(e.into());
        }

        info!(
            "Send job 0x{:X}: re-registered with remote peer ({} µs)",
            current.frame.id(),
            current.interval_us
        );
        Ok(())
    }
}

impl fmt::Debug for SendJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params = self.params.load();
        f.debug_struct("SendJob")
            .field("frame", &params.frame)
            .field("interval_us", &params.interval_us)
            .field("mode", &self.mode())
            .finish()
    }
}

impl Drop for SendJob {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Send job 0x{:X}: stop on drop failed: {}", self.id(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kayak_can::{BusCall, MockBus};
    use std::time::Instant;

    #[test]
    fn test_new_validates_input() {
        assert!(matches!(
            SendJob::new(0x100, &[], 0),
            Err(SendJobError::InvalidInterval)
        ));
        assert!(matches!(
            SendJob::new(0x100, &[0; 9], 1000),
            Err(SendJobError::PayloadTooLong { len: 9 })
        ));

        let job = SendJob::new(0x100, &[1, 2], 1000).unwrap();
        assert_eq!(job.id(), 0x100);
        assert_eq!(job.data(), vec![1, 2]);
        assert_eq!(job.interval_us(), 1000);
        assert_eq!(job.interval(), Duration::from_millis(1));
        assert_eq!(job.mode(), JobMode::Idle);
        assert!(job.bus().is_none());
    }

    #[test]
    fn test_setters_while_idle_have_no_side_effect() {
        let bus = Arc::new(MockBus::remote());
        let mut job = SendJob::new(0x100, &[1], 1000).unwrap();

        job.set_id(0x200).unwrap();
        job.set_data(&[3, 4]).unwrap();
        job.set_interval(5000).unwrap();

        assert_eq!(job.frame(), CanFrame::new(0x200, &[3, 4]));
        assert_eq!(job.interval_us(), 5000);
        assert!(bus.calls().is_empty());
    }

    #[test]
    fn test_invalid_setter_leaves_job_unchanged() {
        let bus = Arc::new(MockBus::remote());
        let mut job = SendJob::new(0x100, &[1], 1000).unwrap();
        job.start(bus.clone()).unwrap();
        bus.clear();

        assert!(matches!(
            job.set_interval(0),
            Err(SendJobError::InvalidInterval)
        ));
        assert!(matches!(
            job.set_data(&[0; 10]),
            Err(SendJobError::PayloadTooLong { len: 10 })
        ));
        assert_eq!(job.interval_us(), 1000);
        assert_eq!(job.data(), vec![1]);
        assert!(bus.calls().is_empty());
        assert_eq!(job.mode(), JobMode::RemoteActive);
    }

    #[test]
    fn test_start_twice_fails() {
        let bus = Arc::new(MockBus::remote());
        let mut job = SendJob::new(0x100, &[], 1000).unwrap();
        job.start(bus.clone()).unwrap();

        match job.start(bus.clone()) {
            Err(SendJobError::AlreadyActive { mode }) => assert_eq!(mode, JobMode::RemoteActive),
            other => panic!("Expected AlreadyActive, got {:?}", other),
        }
        // No double registration
        assert_eq!(bus.remote_calls().len(), 1);
    }

    #[test]
    fn test_remote_start_failure_stays_idle() {
        let bus = Arc::new(MockBus::remote());
        bus.set_fail_add(true);
        let mut job = SendJob::new(0x100, &[], 1000).unwrap();

        assert!(matches!(
            job.start(bus.clone()),
            Err(SendJobError::Remote(CanError::Remote(_)))
        ));
        assert_eq!(job.mode(), JobMode::Idle);
    }

    #[test]
    fn test_remote_stop_failure_keeps_remote_mode() {
        let bus = Arc::new(MockBus::remote());
        let mut job = SendJob::new(0x100, &[], 1000).unwrap();
        job.start(bus.clone()).unwrap();

        bus.set_fail_remove(true);
        assert!(job.stop().is_err());
        assert_eq!(job.mode(), JobMode::RemoteActive);

        bus.set_fail_remove(false);
        job.stop().unwrap();
        assert_eq!(job.mode(), JobMode::Idle);
    }

    #[test]
    fn test_remote_reconfigure_remove_failure_restores_params() {
        let bus = Arc::new(MockBus::remote());
        let mut job = SendJob::new(0x100, &[1], 1000).unwrap();
        job.start(bus.clone()).unwrap();

        bus.set_fail_remove(true);
        assert!(job.set_id(0x200).is_err());
        assert_eq!(job.id(), 0x100);
        assert_eq!(job.mode(), JobMode::RemoteActive);
        bus.set_fail_remove(false);
    }

    #[test]
    fn test_remote_reconfigure_add_failure_goes_idle() {
        let bus = Arc::new(MockBus::remote());
        let mut job = SendJob::new(0x100, &[1], 1000).unwrap();
        job.start(bus.clone()).unwrap();
        bus.clear();

        bus.set_fail_add(true);
        assert!(job.set_data(&[9]).is_err());
        assert_eq!(job.mode(), JobMode::Idle);
        assert_eq!(job.data(), vec![9]);
        assert_eq!(
            bus.remote_calls(),
            vec![
                BusCall::RemoveSendJob { id: 0x100 },
                BusCall::AddSendJob {
                    id: 0x100,
                    data: vec![9],
                    interval_us: 1000
                },
            ]
        );

        // Idle now: stop must not touch the peer again
        bus.clear();
        job.stop().unwrap();
        assert!(bus.calls().is_empty());
    }

    #[test]
    fn test_local_stop_is_prompt() {
        let bus = Arc::new(MockBus::local());
        // Very long interval: stop must not wait for the next tick
        let mut job = SendJob::new(0x100, &[], 10_000_000).unwrap();
        job.start(bus.clone()).unwrap();
        assert!(bus.wait_for_frames(1, Duration::from_secs(1)));

        let start = Instant::now();
        job.stop().unwrap();
        assert!(start.elapsed() < Duration::from_millis(500));
        assert_eq!(job.mode(), JobMode::Idle);
    }

    #[test]
    fn test_drop_stops_remote_job() {
        let bus = Arc::new(MockBus::remote());
        {
            let mut job = SendJob::new(0x123, &[], 1000).unwrap();
            job.start(bus.clone()).unwrap();
        }
        assert_eq!(
            bus.remote_calls().last(),
            Some(&BusCall::RemoveSendJob { id: 0x123 })
        );
    }

    #[test]
    fn test_restart_after_stop_spawns_fresh_thread() {
        let bus = Arc::new(MockBus::local());
        let mut job = SendJob::new(0x100, &[], 1_000_000).unwrap();

        job.start(bus.clone()).unwrap();
        assert!(bus.wait_for_frames(1, Duration::from_secs(1)));
        job.stop().unwrap();

        job.start(bus.clone()).unwrap();
        assert!(bus.wait_for_frames(2, Duration::from_secs(1)));
        job.stop().unwrap();
        assert_eq!(job.frames_sent(), 2);
    }

    /// Bus whose local transmit path panics
    struct PanickingBus;

    impl Bus for PanickingBus {
        fn has_remote_connection(&self) -> bool {
            false
        }

        fn send_frame(&self, _frame: CanFrame) {
            panic!("interface gone");
        }

        fn add_send_job(
            &self,
            _id: u32,
            _data: &[u8],
            _interval_us: u64,
        ) -> std::result::Result<(), CanError> {
            Ok(())
        }

        fn remove_send_job(&self, _id: u32) -> std::result::Result<(), CanError> {
            Ok(())
        }
    }

    #[test]
    fn test_stop_after_worker_panic_reports_interrupted() {
        let mut job = SendJob::new(0x100, &[1], 1000).unwrap();
        job.start(Arc::new(PanickingBus)).unwrap();
        assert_eq!(job.mode(), JobMode::LocalActive);

        assert!(matches!(
            job.stop(),
            Err(SendJobError::CancellationInterrupted)
        ));
        assert_eq!(job.mode(), JobMode::Idle);
        assert_eq!(job.frames_sent(), 0);

        // Nothing left to stop
        assert!(job.stop().is_ok());
    }

    #[test]
    fn test_debug_output() {
        let job = SendJob::new(0x100, &[1], 1000).unwrap();
        let dbg = format!("{:?}", job);
        assert!(dbg.contains("SendJob"));
        assert!(dbg.contains("Idle"));
    }
}
