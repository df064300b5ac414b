//! FIFO Mailbox Driver
//!
//! Register-level driver for the inter-processor mailbox: a pair of 32-bit
//! FIFOs (one per direction) with threshold interrupts.
//!
//! # Register Map
//!
//! ```text
//! 0x00 WRITE   push a word into the send FIFO
//! 0x08 READ    pop a word from the receive FIFO
//! 0x10 STATUS  FIFO levels and threshold flags
//! 0x14 ERROR   sticky error bits (cleared on read)
//! 0x18 SIT     send interrupt threshold
//! 0x1C RIT     receive interrupt threshold
//! 0x20 IS      interrupt status (write 1 to clear)
//! 0x24 IE      interrupt enable
//! 0x28 IP      interrupt pending (IS & IE)
//! 0x2C CTRL    FIFO reset
//! ```
//!
//! The receive-threshold interrupt fires when the receive FIFO level rises
//! above RIT; the send-threshold interrupt fires when the send FIFO level
//! falls to or below SIT.

use bitflags::bitflags;

use crate::drivers::mmio::Bus;

/// Register offsets from the mailbox base
pub mod offsets {
    pub const WRITE: usize = 0x00;
    pub const READ: usize = 0x08;
    pub const STATUS: usize = 0x10;
    pub const ERROR: usize = 0x14;
    pub const SIT: usize = 0x18;
    pub const RIT: usize = 0x1C;
    pub const IS: usize = 0x20;
    pub const IE: usize = 0x24;
    pub const IP: usize = 0x28;
    pub const CTRL: usize = 0x2C;
}

bitflags! {
    /// STATUS register
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u32 {
        /// Receive FIFO is empty
        const EMPTY = 0x01;
        /// Send FIFO is full
        const FULL = 0x02;
        /// Send FIFO level at or below SIT
        const STA = 0x04;
        /// Receive FIFO level above RIT
        const RTA = 0x08;
    }

    /// IS / IE / IP registers
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Interrupt: u32 {
        /// Send threshold active
        const STA = 0x01;
        /// Receive threshold active
        const RTA = 0x02;
        /// Mailbox error
        const ERR = 0x04;
    }

    /// CTRL register
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Control: u32 {
        const RESET_SEND_FIFO = 0x01;
        const RESET_RECV_FIFO = 0x02;
    }

    /// ERROR register
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ErrorFlags: u32 {
        /// Read attempted on an empty receive FIFO
        const FIFO_EMPTY = 0x01;
        /// Write attempted on a full send FIFO
        const FIFO_FULL = 0x02;
    }
}

/// Mailbox register block behind a [`Bus`]
pub struct Mailbox<B: Bus> {
    bus: B,
}

impl<B: Bus> Mailbox<B> {
    pub const fn new(bus: B) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Push one word into the send FIFO
    ///
    /// Does not check for space; callers test [`is_full`](Self::is_full)
    /// first. Writing to a full FIFO sets `ErrorFlags::FIFO_FULL` and the
    /// word is lost.
    pub fn write(&self, value: u32) {
        self.bus.write(offsets::WRITE, value);
    }

    /// Pop one word from the receive FIFO (unchecked)
    pub fn read(&self) -> u32 {
        self.bus.read(offsets::READ)
    }

    /// Pop one word if the receive FIFO has any
    pub fn try_read(&self) -> Option<u32> {
        if self.is_empty() {
            None
        } else {
            Some(self.read())
        }
    }

    /// Pop words until the receive FIFO reports empty
    pub fn drain(&self) -> Drain<'_, B> {
        Drain { mailbox: self }
    }

    pub fn status(&self) -> Status {
        Status::from_bits_retain(self.bus.read(offsets::STATUS))
    }

    pub fn is_empty(&self) -> bool {
        self.status().contains(Status::EMPTY)
    }

    pub fn is_full(&self) -> bool {
        self.status().contains(Status::FULL)
    }

    /// Read and clear the sticky error bits
    pub fn error(&self) -> ErrorFlags {
        ErrorFlags::from_bits_retain(self.bus.read(offsets::ERROR))
    }

    /// Discard the contents of both FIFOs
    pub fn reset_fifos(&self) {
        let ctrl = Control::RESET_SEND_FIFO | Control::RESET_RECV_FIFO;
        self.bus.write(offsets::CTRL, ctrl.bits());
    }

    pub fn enable_interrupts(&self, mask: Interrupt) {
        self.bus.write(offsets::IE, mask.bits());
    }

    pub fn disable_interrupts(&self) {
        self.bus.write(offsets::IE, 0);
    }

    pub fn interrupt_enable(&self) -> Interrupt {
        Interrupt::from_bits_retain(self.bus.read(offsets::IE))
    }

    /// Raw IS register, unknown bits preserved
    pub fn interrupt_status(&self) -> Interrupt {
        Interrupt::from_bits_retain(self.bus.read(offsets::IS))
    }

    pub fn interrupt_pending(&self) -> Interrupt {
        Interrupt::from_bits_retain(self.bus.read(offsets::IP))
    }

    /// Acknowledge the given IS bits (write-1-to-clear)
    pub fn clear_interrupt_status(&self, mask: Interrupt) {
        self.bus.write(offsets::IS, mask.bits());
    }

    pub fn set_receive_threshold(&self, level: u32) {
        self.bus.write(offsets::RIT, level);
    }

    pub fn receive_threshold(&self) -> u32 {
        self.bus.read(offsets::RIT)
    }

    pub fn set_send_threshold(&self, level: u32) {
        self.bus.write(offsets::SIT, level);
    }

    pub fn send_threshold(&self) -> u32 {
        self.bus.read(offsets::SIT)
    }
}

/// Iterator returned by [`Mailbox::drain`]
pub struct Drain<'a, B: Bus> {
    mailbox: &'a Mailbox<B>,
}

impl<B: Bus> Iterator for Drain<'_, B> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        self.mailbox.try_read()
    }
}
