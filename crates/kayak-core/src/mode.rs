//! Send job mode

use std::fmt;

/// Which transmitter, if any, a send job currently drives
///
/// # Modes
///
/// - **Idle**: nothing is transmitting
/// - **LocalActive**: a local timing thread calls `Bus::send_frame` every interval
/// - **RemoteActive**: the frame is registered with the remote peer, which repeats it
///
/// Exactly one mode holds at any time; a job never has both a local thread
/// and a remote registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobMode {
    #[default]
    Idle,
    LocalActive,
    RemoteActive,
}

impl JobMode {
    /// Whether a transmitter (local or remote) is running
    pub fn is_active(self) -> bool {
        self != Self::Idle
    }

    pub fn is_local(self) -> bool {
        self == Self::LocalActive
    }

    pub fn is_remote(self) -> bool {
        self == Self::RemoteActive
    }
}

impl fmt::Display for JobMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::LocalActive => "local",
            Self::RemoteActive => "remote",
        };
        f.write_str(name)
    }
}
