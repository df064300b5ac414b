//! Transport configuration
//!
//! Every layout constant the two peers must agree on lives in [`Config`].
//! [`Config::reference()`] reproduces the reference board layout; tests and
//! other boards override individual fields with struct-update syntax:
//!
//! ```
//! use shmnet::Config;
//!
//! let config = Config {
//!     ring_capacity: 4,
//!     ..Config::reference()
//! };
//! assert!(config.validate().is_ok());
//! ```

use core::fmt;

use crate::net::ethernet::{EthernetFrame, MacAddress};

/// Physical base of the shared memory region (reference board)
pub const SHARED_MEM_BASE: usize = 0x7000_0000;

/// Total size of the shared memory region (1 MiB)
pub const SHARED_MEM_SIZE: usize = 0x10_0000;

/// Physical base of the mailbox register block (reference board)
pub const MBOX_BASE: usize = 0x201_8000_0000;

/// Size of the mailbox register block
pub const MBOX_SIZE: usize = 0x100;

pub const TX_RING_OFFSET: usize = 0x0_0000;
pub const RX_RING_OFFSET: usize = 0x2_0000;
pub const RING_AREA_SIZE: usize = 0x2_0000;
pub const CONTROL_OFFSET: usize = 0x4_0000;

/// Size of the control area: four 32-bit indices
pub const CONTROL_SIZE: usize = 0x10;

/// Slots per ring
pub const RING_CAPACITY: usize = 64;

/// Byte distance between consecutive slots
pub const SLOT_SPACING: usize = 0x600;

/// Largest frame a slot carries, link header included
pub const MAX_FRAME_SIZE: usize = 1518;

/// Which end of the link this side is
///
/// The host transmits into the TX ring area and receives from the RX ring
/// area. The remote processor runs the same protocol with the areas swapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Remote,
}

/// Static layout and behavior switches for one transport instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Physical base of the shared region (used by the mapping collaborator)
    pub shared_mem_base: usize,
    pub shared_mem_size: usize,
    /// Physical base of the mailbox register block
    pub mailbox_base: usize,
    pub mailbox_size: usize,

    pub tx_ring_offset: usize,
    pub rx_ring_offset: usize,
    /// Size of each ring area; receive bounds checks use this value
    pub ring_area_size: usize,
    pub control_offset: usize,

    pub ring_capacity: usize,
    pub slot_spacing: usize,
    pub max_frame_size: usize,

    /// Source address written into every synthetic link header
    ///
    /// The two peers must use different addresses. `reference()` only
    /// supplies `MacAddress::local(0)`, so the embedder assigns each side its
    /// own, e.g. `MacAddress::local(1)` and `MacAddress::local(2)`.
    pub mac_address: MacAddress,
    pub role: Role,

    /// Re-read the peer's consumer index before reporting `Busy`.
    ///
    /// Off by default: a lost send-threshold interrupt then only delays
    /// retirement until the next one arrives.
    pub poll_tx_completions: bool,
}

impl Config {
    /// Reference board layout, host role, placeholder address `02:00:00:00:00:00`
    ///
    /// Override `mac_address` before attaching; both ends would otherwise
    /// carry the same source address.
    pub const fn reference() -> Self {
        Self {
            shared_mem_base: SHARED_MEM_BASE,
            shared_mem_size: SHARED_MEM_SIZE,
            mailbox_base: MBOX_BASE,
            mailbox_size: MBOX_SIZE,
            tx_ring_offset: TX_RING_OFFSET,
            rx_ring_offset: RX_RING_OFFSET,
            ring_area_size: RING_AREA_SIZE,
            control_offset: CONTROL_OFFSET,
            ring_capacity: RING_CAPACITY,
            slot_spacing: SLOT_SPACING,
            max_frame_size: MAX_FRAME_SIZE,
            mac_address: MacAddress::local(0),
            role: Role::Host,
            poll_tx_completions: false,
        }
    }

    /// Check the layout invariants both peers rely on
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint. A config that passes guarantees
    /// every slot write of an accepted frame stays inside its ring area.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ring_capacity < 2 || self.ring_capacity > 0x1_0000 {
            return Err(ConfigError::CapacityOutOfRange(self.ring_capacity));
        }

        if self.max_frame_size < EthernetFrame::HEADER_SIZE || self.max_frame_size > 0xFFFF {
            return Err(ConfigError::FrameSizeOutOfRange(self.max_frame_size));
        }

        if self.slot_spacing < self.max_frame_size {
            return Err(ConfigError::SlotTooSmall {
                spacing: self.slot_spacing,
                max_frame: self.max_frame_size,
            });
        }

        let ring_bytes = self
            .ring_capacity
            .checked_mul(self.slot_spacing)
            .ok_or(ConfigError::RingExceedsArea)?;
        if ring_bytes > self.ring_area_size {
            return Err(ConfigError::RingExceedsArea);
        }

        if self.control_offset % 4 != 0 {
            return Err(ConfigError::MisalignedControl(self.control_offset));
        }

        let areas = [
            (self.tx_ring_offset, self.ring_area_size),
            (self.rx_ring_offset, self.ring_area_size),
            (self.control_offset, CONTROL_SIZE),
        ];

        for &(offset, size) in &areas {
            match offset.checked_add(size) {
                Some(end) if end <= self.shared_mem_size => {}
                _ => return Err(ConfigError::AreaOutsideRegion { offset, size }),
            }
        }

        for (i, &(a_off, a_size)) in areas.iter().enumerate() {
            for &(b_off, b_size) in &areas[i + 1..] {
                if a_off < b_off + b_size && b_off < a_off + a_size {
                    return Err(ConfigError::AreasOverlap);
                }
            }
        }

        Ok(())
    }

    /// Bytes of shared memory the layout touches
    pub fn required_region_size(&self) -> usize {
        let tx_end = self.tx_ring_offset + self.ring_area_size;
        let rx_end = self.rx_ring_offset + self.ring_area_size;
        let ctrl_end = self.control_offset + CONTROL_SIZE;
        tx_end.max(rx_end).max(ctrl_end)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::reference()
    }
}

/// Rejected configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Ring capacity must be in `[2, 0x10000]` (indices travel as 16 bits)
    CapacityOutOfRange(usize),

    /// Max frame size must hold a link header and fit the 16-bit length field
    FrameSizeOutOfRange(usize),

    /// Slot spacing cannot hold a maximum-size frame
    SlotTooSmall { spacing: usize, max_frame: usize },

    /// `capacity * spacing` does not fit in the ring area
    RingExceedsArea,

    /// Control indices must be 32-bit aligned
    MisalignedControl(usize),

    /// An area extends past the end of the shared region
    AreaOutsideRegion { offset: usize, size: usize },

    /// Two of TX ring, RX ring and control area overlap
    AreasOverlap,

    /// The supplied region is smaller than the layout requires
    RegionTooSmall { required: usize, actual: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityOutOfRange(n) => write!(f, "ring capacity {} out of range", n),
            Self::FrameSizeOutOfRange(n) => write!(f, "max frame size {} out of range", n),
            Self::SlotTooSmall { spacing, max_frame } => write!(
                f,
                "slot spacing {} smaller than max frame size {}",
                spacing, max_frame
            ),
            Self::RingExceedsArea => write!(f, "ring does not fit in its area"),
            Self::MisalignedControl(off) => {
                write!(f, "control area offset 0x{:X} not 4-byte aligned", off)
            }
            Self::AreaOutsideRegion { offset, size } => write!(
                f,
                "area 0x{:X}+0x{:X} extends past shared region",
                offset, size
            ),
            Self::AreasOverlap => write!(f, "shared memory areas overlap"),
            Self::RegionTooSmall { required, actual } => write!(
                f,
                "shared region is 0x{:X} bytes, layout needs 0x{:X}",
                actual, required
            ),
        }
    }
}
