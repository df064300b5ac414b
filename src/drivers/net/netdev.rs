//! Network Device Abstraction
//!
//! Types shared between the shared-memory transport and the network stack
//! sitting above it.
//!
//! ## Boundary
//!
//! The transport is passive. The stack pushes frames down with
//! `ShmemNet::submit()` and receives two kinds of upcall through
//! [`NetStack`]:
//!
//! - `on_received(SkBuff)` for every frame the peer placed in the RX ring
//! - `on_send_complete()` when a retirement frees space after `Busy`
//! - `on_mailbox_error()` when the mailbox latches an error (optional)
//!
//! ## Example Usage
//!
//! ```ignore
//! use shmnet::{NetStack, SkBuff, TxStatus};
//!
//! struct Stack { queue_paused: bool }
//!
//! impl NetStack for Stack {
//!     fn on_received(&mut self, skb: SkBuff) {
//!         // hand skb.data() to the IP layer
//!     }
//!
//!     fn on_send_complete(&mut self) {
//!         self.queue_paused = false;
//!     }
//! }
//!
//! match net.submit(frame) {
//!     TxStatus::Accepted(_) => {}
//!     TxStatus::Busy(frame) => stack.requeue(frame),
//!     TxStatus::Dropped(err) => log::warn!("tx dropped: {}", err),
//! }
//! ```

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use crate::net::skbuff::SkBuff;

/// Errors produced on the transport data path
///
/// None of these are fatal. The offending frame or notification is dropped,
/// counted, and processing continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// Frame plus link header exceeds the slot payload capacity
    Oversize,

    /// TX ring has no free slot (transient backpressure)
    RingFull,

    /// Notification decoded with a zero or oversize length
    MalformedNotification,

    /// Notification points outside the ring area
    BoundsViolation,

    /// No buffer available for a received frame
    AllocationFailure,

    /// Hardware-reported mailbox error bits
    MailboxError(u32),

    /// Transport has not been opened (or was stopped)
    NotOpen,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Oversize => write!(f, "Frame too large for slot"),
            TransportError::RingFull => write!(f, "Transmit ring full"),
            TransportError::MalformedNotification => write!(f, "Malformed mailbox notification"),
            TransportError::BoundsViolation => write!(f, "Notification outside ring area"),
            TransportError::AllocationFailure => write!(f, "Receive buffer allocation failed"),
            TransportError::MailboxError(bits) => write!(f, "Mailbox error: {:#010x}", bits),
            TransportError::NotOpen => write!(f, "Device not open"),
        }
    }
}

/// Outcome of handing a frame to the transport
#[derive(Debug, PartialEq, Eq)]
pub enum TxStatus<P> {
    /// Frame written to the given TX slot; the handle is held until retired
    Accepted(u16),

    /// Ring full: nothing was written and the handle comes back to the caller.
    /// Pause submission until `NetStack::on_send_complete()`.
    Busy(P),

    /// Frame discarded; the handle has been released
    Dropped(TransportError),
}

impl<P> TxStatus<P> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, TxStatus::Accepted(_))
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, TxStatus::Busy(_))
    }

    /// Why the frame was not accepted; `Busy` reports as `RingFull`
    pub fn error(&self) -> Option<TransportError> {
        match self {
            TxStatus::Accepted(_) => None,
            TxStatus::Busy(_) => Some(TransportError::RingFull),
            TxStatus::Dropped(err) => Some(*err),
        }
    }
}

/// Outbound packet ownership handle
///
/// The transport copies [`frame()`](TxPacket::frame) into a slot and keeps
/// the handle in its pending table until the peer consumes the slot, then
/// drops it.
pub trait TxPacket {
    /// Bytes to place after the synthetic link header
    fn frame(&self) -> &[u8];
}

impl TxPacket for [u8] {
    fn frame(&self) -> &[u8] {
        self
    }
}

impl TxPacket for Vec<u8> {
    fn frame(&self) -> &[u8] {
        self
    }
}

impl TxPacket for SkBuff {
    fn frame(&self) -> &[u8] {
        self.data()
    }
}

impl<T: TxPacket + ?Sized> TxPacket for &T {
    fn frame(&self) -> &[u8] {
        (**self).frame()
    }
}

impl<T: TxPacket + ?Sized> TxPacket for Box<T> {
    fn frame(&self) -> &[u8] {
        (**self).frame()
    }
}

impl<T: TxPacket + ?Sized> TxPacket for Arc<T> {
    fn frame(&self) -> &[u8] {
        (**self).frame()
    }
}

/// Upper-layer collaborator receiving transport upcalls
///
/// Callbacks run in interrupt context with the transport lock held.
/// They must not block and must not call back into `submit()`.
pub trait NetStack {
    /// A frame arrived from the peer
    fn on_received(&mut self, skb: SkBuff);

    /// TX ring has room again after a `Busy`
    fn on_send_complete(&mut self);

    /// The mailbox reported `MailboxError(bits)`; the transport takes no action
    fn on_mailbox_error(&mut self, _err: TransportError) {}
}

/// Interface statistics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetStats {
    pub tx_packets: u64,
    pub tx_bytes: u64,
    /// Oversize frames and submissions while down
    pub tx_dropped: u64,
    /// Submissions refused with `Busy`
    pub tx_busy: u64,
    /// Handles released by retirement
    pub tx_completed: u64,
    /// Accepted frames whose notification was skipped (mailbox full)
    pub tx_notify_skipped: u64,

    pub rx_packets: u64,
    pub rx_bytes: u64,
    /// All dropped notifications; the three counters below break it down
    pub rx_dropped: u64,
    pub rx_malformed: u64,
    pub rx_overflow: u64,
    pub rx_alloc_failures: u64,

    pub mailbox_errors: u64,
    /// Peer reported a consumer index outside the ring (ignored)
    pub tx_head_invalid: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec;

    #[test]
    fn display_messages() {
        assert_eq!(TransportError::RingFull.to_string(), "Transmit ring full");
        assert_eq!(
            TransportError::MailboxError(0x2).to_string(),
            "Mailbox error: 0x00000002"
        );
    }

    #[test]
    fn frame_through_smart_pointers() {
        let raw = vec![1u8, 2, 3];
        let boxed: Box<[u8]> = raw.clone().into_boxed_slice();
        let shared: Arc<Vec<u8>> = Arc::new(raw.clone());

        assert_eq!(raw.frame(), &[1, 2, 3]);
        assert_eq!(boxed.frame(), &[1, 2, 3]);
        assert_eq!(shared.frame(), &[1, 2, 3]);
        assert_eq!((&raw[..]).frame(), &[1, 2, 3]);
    }

    #[test]
    fn tx_status_predicates() {
        assert!(TxStatus::<()>::Accepted(3).is_accepted());
        assert!(TxStatus::Busy(()).is_busy());
        assert!(!TxStatus::<()>::Dropped(TransportError::Oversize).is_busy());
    }

    #[test]
    fn tx_status_error() {
        assert_eq!(TxStatus::<()>::Accepted(0).error(), None);
        assert_eq!(TxStatus::Busy(()).error(), Some(TransportError::RingFull));
        assert_eq!(
            TxStatus::<()>::Dropped(TransportError::NotOpen).error(),
            Some(TransportError::NotOpen)
        );
    }
}
