//! Static partition of the shared region
//!
//! ```text
//! 0x00000 ┌──────────────────────┐
//!         │ TX ring area         │  host → remote
//! 0x20000 ├──────────────────────┤
//!         │ RX ring area         │  remote → host
//! 0x40000 ├──────────────────────┤
//!         │ tx_head   (+0x0)     │
//!         │ tx_tail   (+0x4)     │
//!         │ rx_head   (+0x8)     │
//!         │ rx_tail   (+0xC)     │
//!         └──────────────────────┘
//! ```
//!
//! Each index has exactly one writer. The producer of a ring writes its tail,
//! the consumer writes its head. Which of the four fields a side owns depends
//! on its [`Role`].

use crate::config::{Config, Role};

/// One of the four 32-bit indices in the control area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlField {
    TxHead,
    TxTail,
    RxHead,
    RxTail,
}

impl ControlField {
    pub const ALL: [ControlField; 4] = [
        ControlField::TxHead,
        ControlField::TxTail,
        ControlField::RxHead,
        ControlField::RxTail,
    ];

    /// Byte offset inside the control area
    pub const fn offset(self) -> usize {
        match self {
            ControlField::TxHead => 0x0,
            ControlField::TxTail => 0x4,
            ControlField::RxHead => 0x8,
            ControlField::RxTail => 0xC,
        }
    }
}

/// Geometry of one ring inside its area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingLayout {
    /// Offset of the ring area from the region base
    pub area_offset: usize,
    pub area_size: usize,
    pub capacity: usize,
    pub spacing: usize,
    /// Index the producer advances
    pub producer: ControlField,
    /// Index the consumer advances
    pub consumer: ControlField,
}

impl RingLayout {
    /// Offset of slot `index` relative to the ring area
    pub const fn slot_offset(&self, index: usize) -> usize {
        index * self.spacing
    }

    pub const fn next(&self, index: u32) -> u32 {
        ((index as usize + 1) % self.capacity) as u32
    }

    /// Slots from `from` forward to `to`, modulo capacity
    pub const fn distance(&self, from: u32, to: u32) -> usize {
        (to as usize + self.capacity - from as usize) % self.capacity
    }

    /// Region-relative start of `len` bytes at slot `index`, if they stay
    /// inside the ring area
    ///
    /// `offset + len == area_size` is accepted.
    pub fn checked_span(&self, index: usize, len: usize) -> Option<usize> {
        let offset = index.checked_mul(self.spacing)?;
        let end = offset.checked_add(len)?;
        if end > self.area_size {
            return None;
        }
        Some(self.area_offset + offset)
    }
}

/// Both rings plus the control area, resolved for one side of the link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShmemLayout {
    pub tx: RingLayout,
    pub rx: RingLayout,
    pub control_offset: usize,
}

impl ShmemLayout {
    pub fn new(config: &Config) -> Self {
        let ring = |area_offset, producer, consumer| RingLayout {
            area_offset,
            area_size: config.ring_area_size,
            capacity: config.ring_capacity,
            spacing: config.slot_spacing,
            producer,
            consumer,
        };

        let host_to_remote = ring(
            config.tx_ring_offset,
            ControlField::TxTail,
            ControlField::TxHead,
        );
        let remote_to_host = ring(
            config.rx_ring_offset,
            ControlField::RxTail,
            ControlField::RxHead,
        );

        let (tx, rx) = match config.role {
            Role::Host => (host_to_remote, remote_to_host),
            Role::Remote => (remote_to_host, host_to_remote),
        };

        Self {
            tx,
            rx,
            control_offset: config.control_offset,
        }
    }
}
