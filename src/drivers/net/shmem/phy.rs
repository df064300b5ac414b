//! smoltcp integration
//!
//! [`ShmemDevice`] exposes a [`ShmemNet`] as a `smoltcp::phy::Device`. The
//! transport writes its own link header on every slot, so the device
//! advertises `Medium::Ip`: smoltcp hands over bare IP packets and receives
//! the payload after the peer's header.
//!
//! Received frames reach the device through a [`Backlog`], the `NetStack`
//! the interrupt path delivers into:
//!
//! ```text
//! mailbox IRQ ─▶ ShmemNet::handle_interrupt(&mut backlog) ─▶ Backlog
//!                                                               │
//! Interface::poll ─▶ Device::receive ◀─────────────────────────┘
//! ```

use alloc::collections::VecDeque;
use alloc::vec;

use log::warn;
use smoltcp::phy::{self, Device, DeviceCapabilities, Medium};
use smoltcp::time::Instant;

use super::dispatch::IrqReturn;
use super::transport::ShmemNet;
use crate::drivers::mmio::Bus;
use crate::drivers::net::netdev::NetStack;
use crate::net::skbuff::SkBuff;

/// Bounded queue of received frames waiting for the stack
pub struct Backlog {
    frames: VecDeque<SkBuff>,
    limit: usize,
    dropped: u64,
    wake: bool,
}

impl Backlog {
    pub fn new(limit: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(limit),
            limit,
            dropped: 0,
            wake: false,
        }
    }

    pub fn pop(&mut self) -> Option<SkBuff> {
        self.frames.pop_front()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames discarded because the backlog was full
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Consume a pending queue-wake notification
    pub fn take_wake(&mut self) -> bool {
        core::mem::take(&mut self.wake)
    }
}

impl NetStack for Backlog {
    fn on_received(&mut self, skb: SkBuff) {
        if self.frames.len() >= self.limit {
            warn!("shmnet: rx backlog full, dropping {} byte frame", skb.len());
            self.dropped += 1;
            return;
        }
        self.frames.push_back(skb);
    }

    fn on_send_complete(&mut self) {
        self.wake = true;
    }
}

/// `smoltcp` device over a shared-memory transport
pub struct ShmemDevice<'n, B: Bus> {
    net: &'n ShmemNet<B, SkBuff>,
    backlog: Backlog,
    tx_dropped: u64,
}

impl<'n, B: Bus> ShmemDevice<'n, B> {
    pub fn new(net: &'n ShmemNet<B, SkBuff>, backlog_limit: usize) -> Self {
        Self {
            net,
            backlog: Backlog::new(backlog_limit),
            tx_dropped: 0,
        }
    }

    /// Run the interrupt handler into this device's backlog
    ///
    /// Call from the mailbox IRQ glue, or periodically when polling.
    pub fn service(&mut self) -> IrqReturn {
        self.net.handle_interrupt(&mut self.backlog)
    }

    pub fn backlog(&self) -> &Backlog {
        &self.backlog
    }

    pub fn backlog_mut(&mut self) -> &mut Backlog {
        &mut self.backlog
    }

    /// Packets smoltcp emitted that the transport refused
    pub fn tx_dropped(&self) -> u64 {
        self.tx_dropped
    }
}

impl<'n, B: Bus> Device for ShmemDevice<'n, B> {
    type RxToken<'a>
        = ShmemRxToken
    where
        Self: 'a;
    type TxToken<'a>
        = ShmemTxToken<'a, B>
    where
        Self: 'a;

    fn receive(&mut self, _timestamp: Instant) -> Option<(Self::RxToken<'_>, Self::TxToken<'_>)> {
        let skb = self.backlog.pop()?;
        let tx = ShmemTxToken {
            net: self.net,
            dropped: &mut self.tx_dropped,
        };
        Some((ShmemRxToken { skb }, tx))
    }

    fn transmit(&mut self, _timestamp: Instant) -> Option<Self::TxToken<'_>> {
        if !self.net.is_open() || self.net.is_queue_stopped() {
            return None;
        }
        Some(ShmemTxToken {
            net: self.net,
            dropped: &mut self.tx_dropped,
        })
    }

    fn capabilities(&self) -> DeviceCapabilities {
        let mut caps = DeviceCapabilities::default();
        caps.medium = Medium::Ip;
        caps.max_transmission_unit = self.net.mtu();
        caps.max_burst_size = Some(1);
        caps
    }
}

pub struct ShmemRxToken {
    skb: SkBuff,
}

impl phy::RxToken for ShmemRxToken {
    fn consume<R, F>(mut self, f: F) -> R
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        f(self.skb.data_mut())
    }
}

pub struct ShmemTxToken<'a, B: Bus> {
    net: &'a ShmemNet<B, SkBuff>,
    dropped: &'a mut u64,
}

impl<'a, B: Bus> phy::TxToken for ShmemTxToken<'a, B> {
    fn consume<R, F>(self, len: usize, f: F) -> R
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        let mut skb = SkBuff::from_vec(vec![0u8; len]);
        let result = f(skb.data_mut());

        // smoltcp has already let go of the packet, so Busy is a drop here
        if let Some(err) = self.net.submit(skb).error() {
            warn!("shmnet: {} byte tx packet dropped: {}", len, err);
            *self.dropped += 1;
        }

        result
    }
}
