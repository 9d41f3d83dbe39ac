//! Classic CAN 2.0 frame

use crate::CanError;
use std::fmt;

/// Largest identifier representable in an 11-bit standard frame
pub const MAX_STANDARD_ID: u32 = 0x7FF;

/// Largest identifier representable in a 29-bit extended frame
pub const MAX_EXTENDED_ID: u32 = 0x1FFF_FFFF;

/// Maximum payload of a classic CAN frame
pub const MAX_DLC: usize = 8;

/// A classic CAN frame (identifier plus up to 8 data bytes)
///
/// # Design
///
/// - **Copy**: the frame is a self-contained value, so a send job can hand an
///   immutable snapshot to the bus on every tick without allocating
/// - **Fixed 8 bytes**: unused bytes are zero, `len` holds the real DLC
/// - **No CAN FD**: payloads above 8 bytes are rejected by [`CanFrame::try_new`]
///
/// # Example
///
/// ```rust
/// use kayak_can::CanFrame;
///
/// let frame = CanFrame::new(0x123, &[1, 2, 3, 4]);
/// assert_eq!(frame.id(), 0x123);
/// assert_eq!(frame.data_slice(), &[1, 2, 3, 4]);
/// assert!(!frame.is_extended());
///
/// let frame_ext = CanFrame::new(0x1234_5678, &[5, 6]);
/// assert!(frame_ext.is_extended());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CanFrame {
    /// CAN identifier (standard or extended)
    pub id: u32,

    /// Frame data (fixed 8 bytes, unused tail is zero)
    pub data: [u8; 8],

    /// Valid data length (0-8)
    pub len: u8,

    /// Extended frame (29-bit identifier)
    pub is_extended: bool,
}

impl CanFrame {
    /// Create a frame, picking the extended format when `id` does not fit in 11 bits
    ///
    /// Data beyond 8 bytes is truncated; use [`CanFrame::try_new`] to reject it instead.
    pub fn new(id: u32, data: &[u8]) -> Self {
        Self::with_format(id, data, id > MAX_STANDARD_ID)
    }

    /// Create a standard (11-bit) frame
    pub fn new_standard(id: u16, data: &[u8]) -> Self {
        Self::with_format(id as u32, data, false)
    }

    /// Create an extended (29-bit) frame
    pub fn new_extended(id: u32, data: &[u8]) -> Self {
        Self::with_format(id, data, true)
    }

    /// Checked constructor
    ///
    /// # Errors
    ///
    /// [`CanError::PayloadTooLong`] if `data` holds more than 8 bytes.
    pub fn try_new(id: u32, data: &[u8]) -> Result<Self, CanError> {
        if data.len() > MAX_DLC {
            return Err(CanError::PayloadTooLong { len: data.len() });
        }
        Ok(Self::new(id, data))
    }

    fn with_format(id: u32, data: &[u8], is_extended: bool) -> Self {
        let mut fixed_data = [0u8; 8];
        let len = data.len().min(MAX_DLC);
        fixed_data[..len].copy_from_slice(&data[..len]);

        Self {
            id,
            data: fixed_data,
            len: len as u8,
            is_extended,
        }
    }

    /// CAN identifier
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Valid payload bytes only
    pub fn data_slice(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// Data length code
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_extended(&self) -> bool {
        self.is_extended
    }
}

/// candump-style rendering: `123#0102`
impl fmt::Display for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_extended {
            write!(f, "{:08X}#", self.id)?;
        } else {
            write!(f, "{:03X}#", self.id)?;
        }
        for byte in self.data_slice() {
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}
