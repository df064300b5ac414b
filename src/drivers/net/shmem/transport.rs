//! Transport façade
//!
//! [`ShmemNet`] is the object an embedding kernel owns: it is created at
//! attach time from a mapped mailbox and region, brought up with `open()`,
//! fed frames through `submit()`, and serviced from the mailbox interrupt
//! with `handle_interrupt()`.
//!
//! All ring state sits behind one [`Mutex`](crate::sync::Mutex) that masks
//! local interrupts while held, so a submission can never deadlock against
//! its own completion interrupt.

use core::sync::atomic::{AtomicBool, Ordering};

use log::info;

use super::dispatch::{dispatch, IrqReturn};
use super::engine::RingEngine;
use crate::config::{Config, ConfigError};
use crate::drivers::mailbox::xmbox::Interrupt;
use crate::drivers::mmio::Bus;
use crate::drivers::net::netdev::{NetStack, NetStats, TransportError, TxPacket, TxStatus};
use crate::net::ethernet::{MacAddress, HEADER_LEN};
use crate::net::skbuff::SkBuff;
use crate::shmem::region::SharedMemory;
use crate::sync::Mutex;

pub struct ShmemNet<B: Bus, P = SkBuff> {
    engine: Mutex<RingEngine<B, P>>,
    open: AtomicBool,
    mac: MacAddress,
    mtu: usize,
}

impl<B: Bus, P: TxPacket> ShmemNet<B, P> {
    /// Bind to a mapped mailbox register block and shared region
    ///
    /// The device starts down; nothing is written until `open()`.
    pub fn attach(config: Config, bus: B, shmem: SharedMemory) -> Result<Self, ConfigError> {
        let engine = RingEngine::new(&config, bus, shmem)?;

        info!(
            "shmnet: attached, {:?} role, {} slots, mac {}",
            config.role, config.ring_capacity, config.mac_address
        );

        Ok(Self {
            engine: Mutex::new(engine),
            open: AtomicBool::new(false),
            mac: config.mac_address,
            mtu: config.max_frame_size - HEADER_LEN,
        })
    }

    /// Zero all indices, reset both FIFOs and enable mailbox interrupts
    ///
    /// This also zeroes the two indices the peer owns and flushes its
    /// receive FIFO. Both sides must reopen together, with no traffic in
    /// flight; reopening one end alone desynchronizes the rings.
    pub fn open(&self) {
        let mut engine = self.engine.lock();

        engine.reset();

        let mailbox = engine.mailbox();
        mailbox.reset_fifos();
        mailbox.set_receive_threshold(0);
        mailbox.enable_interrupts(Interrupt::STA | Interrupt::RTA | Interrupt::ERR);

        self.open.store(true, Ordering::Release);
        info!("shmnet: opened");
    }

    /// Mask mailbox interrupts and refuse further submissions
    ///
    /// Pending handles stay queued until the next `open()` releases them.
    pub fn stop(&self) {
        let engine = self.engine.lock();
        engine.mailbox().disable_interrupts();
        self.open.store(false, Ordering::Release);
        info!("shmnet: stopped");
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Hand a frame to the transport
    ///
    /// `Busy` returns the packet; resubmit after `NetStack::on_send_complete()`.
    pub fn submit(&self, packet: P) -> TxStatus<P> {
        let mut engine = self.engine.lock();

        if !self.is_open() {
            engine.note_tx_dropped();
            return TxStatus::Dropped(TransportError::NotOpen);
        }

        engine.tx_enqueue(packet)
    }

    /// Mailbox interrupt entry point
    pub fn handle_interrupt<S: NetStack + ?Sized>(&self, stack: &mut S) -> IrqReturn {
        let mut engine = self.engine.lock();
        dispatch(&mut *engine, stack)
    }

    /// Retire from the control-area index without a send-threshold interrupt
    ///
    /// Returns the number of handles released.
    pub fn poll_completions<S: NetStack + ?Sized>(&self, stack: &mut S) -> usize {
        let mut engine = self.engine.lock();
        let retired = engine.retire_from_peer();
        if retired.wake {
            stack.on_send_complete();
        }
        retired.released
    }

    pub fn stats(&self) -> NetStats {
        self.engine.lock().stats()
    }

    pub fn mac_address(&self) -> MacAddress {
        self.mac
    }

    /// Largest payload `submit()` accepts (slot size minus link header)
    pub fn mtu(&self) -> usize {
        self.mtu
    }

    /// Whether the last submission got `Busy` and no wake has happened since
    pub fn is_queue_stopped(&self) -> bool {
        self.engine.lock().is_queue_stopped()
    }

    /// Run `f` with the engine locked
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut RingEngine<B, P>) -> R) -> R {
        f(&mut *self.engine.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::mailbox::sim::{self, SimMailbox};
    use crate::drivers::mailbox::xmbox::Mailbox;
    use crate::shmem::layout::ControlField;
    use alloc::vec;
    use alloc::vec::Vec;

    struct NullStack;

    impl NetStack for NullStack {
        fn on_received(&mut self, _skb: SkBuff) {}
        fn on_send_complete(&mut self) {}
    }

    fn attach() -> (ShmemNet<SimMailbox, Vec<u8>>, SimMailbox) {
        let config = Config::reference();
        let (local, peer) = sim::pair(64);
        let shmem = SharedMemory::alloc_zeroed(config.required_region_size());
        (ShmemNet::attach(config, local, shmem).unwrap(), peer)
    }

    #[test]
    fn submit_before_open_is_dropped() {
        let (net, _peer) = attach();

        assert_eq!(
            net.submit(vec![0; 10]),
            TxStatus::Dropped(TransportError::NotOpen)
        );
        assert_eq!(net.stats().tx_dropped, 1);
    }

    #[test]
    fn open_configures_mailbox() {
        let (net, peer) = attach();
        Mailbox::new(&peer).write(0xDEAD);

        net.open();

        net.with_engine(|engine| {
            let mailbox = engine.mailbox();
            assert!(mailbox.is_empty());
            assert_eq!(mailbox.receive_threshold(), 0);
            assert_eq!(mailbox.interrupt_enable(), Interrupt::all());
        });
        assert!(net.is_open());
    }

    #[test]
    fn stop_masks_interrupts() {
        let (net, _peer) = attach();
        net.open();
        net.stop();

        assert!(!net.is_open());
        net.with_engine(|engine| assert!(engine.mailbox().interrupt_enable().is_empty()));
        assert!(!net.submit(vec![1]).is_accepted());
    }

    #[test]
    fn open_zeroes_peer_owned_indices() {
        let (net, _peer) = attach();
        let ctrl = net
            .with_engine(|engine| engine.shmem())
            .control_area(Config::reference().control_offset)
            .unwrap();
        ctrl.set(ControlField::TxHead, 5);
        ctrl.set(ControlField::RxTail, 7);

        net.open();

        assert_eq!(ctrl.get(ControlField::TxHead), 0);
        assert_eq!(ctrl.get(ControlField::RxTail), 0);
    }

    #[test]
    fn open_releases_stale_handles() {
        let (net, _peer) = attach();
        net.open();
        assert!(net.submit(vec![0; 64]).is_accepted());
        assert_eq!(net.with_engine(|engine| engine.pending_count()), 1);

        net.stop();
        net.open();

        assert_eq!(net.with_engine(|engine| engine.pending_count()), 0);
        assert_eq!(net.poll_completions(&mut NullStack), 0);
    }
}
