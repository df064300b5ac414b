//! Mailbox interrupt dispatch
//!
//! One status read drives up to three independent actions, always in the
//! same order:
//!
//! 1. `RTA`: drain every queued notification into the stack
//! 2. `STA`: read the peer's TX head, retire, wake the queue if it was stopped
//! 3. `ERR`: read the error register and report it to the stack (no recovery)
//!
//! The status bits are acknowledged last, with exactly the mask that was read,
//! so an event latched while the handler ran stays pending.

use log::trace;

use super::engine::RingEngine;
use crate::drivers::mailbox::xmbox::Interrupt;
use crate::drivers::mmio::Bus;
use crate::drivers::net::netdev::{NetStack, TransportError, TxPacket};

/// Whether an interrupt belonged to this device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqReturn {
    /// Status was zero; let another handler on a shared line look at it
    NotHandled,
    Handled,
}

/// Service one mailbox interrupt
///
/// The caller holds the transport lock for the whole call.
pub fn dispatch<B, P, S>(engine: &mut RingEngine<B, P>, stack: &mut S) -> IrqReturn
where
    B: Bus,
    P: TxPacket,
    S: NetStack + ?Sized,
{
    let status = engine.mailbox().interrupt_status();
    if status.is_empty() {
        return IrqReturn::NotHandled;
    }

    trace!("shmnet: irq status={:#010x}", status.bits());

    if status.contains(Interrupt::RTA) {
        for frame in engine.rx_dequeue() {
            // Drops are already counted and logged by the engine
            if let Ok(skb) = frame {
                stack.on_received(skb);
            }
        }
    }

    if status.contains(Interrupt::STA) && engine.retire_from_peer().wake {
        stack.on_send_complete();
    }

    if status.contains(Interrupt::ERR) {
        let error = engine.take_mailbox_error();
        stack.on_mailbox_error(TransportError::MailboxError(error.bits()));
    }

    engine.mailbox().clear_interrupt_status(status);

    IrqReturn::Handled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::drivers::mailbox::sim::{self, SimMailbox};
    use crate::drivers::mailbox::xmbox::{ErrorFlags, Mailbox};
    use crate::drivers::net::shmem::message::MboxMessage;
    use crate::net::skbuff::SkBuff;
    use crate::shmem::layout::ControlField;
    use crate::shmem::region::SharedMemory;
    use alloc::vec;
    use alloc::vec::Vec;

    #[derive(Default)]
    struct Recorder {
        received: Vec<SkBuff>,
        wakes: usize,
        errors: Vec<TransportError>,
    }

    impl NetStack for Recorder {
        fn on_received(&mut self, skb: SkBuff) {
            self.received.push(skb);
        }

        fn on_send_complete(&mut self) {
            self.wakes += 1;
        }

        fn on_mailbox_error(&mut self, err: TransportError) {
            self.errors.push(err);
        }
    }

    /// Latches a send-threshold event on the local end while frames arrive
    struct LateSta {
        local: SimMailbox,
        received: usize,
    }

    impl NetStack for LateSta {
        fn on_received(&mut self, _skb: SkBuff) {
            self.received += 1;
            self.local.raise(Interrupt::STA);
        }

        fn on_send_complete(&mut self) {}
    }

    fn setup() -> (RingEngine<SimMailbox, Vec<u8>>, SimMailbox, Config) {
        let config = Config {
            ring_capacity: 4,
            ..Config::reference()
        };
        let (local, peer) = sim::pair(8);
        let shmem = SharedMemory::alloc_zeroed(config.required_region_size());
        let engine = RingEngine::new(&config, local, shmem).unwrap();
        (engine, peer, config)
    }

    #[test]
    fn zero_status_is_not_handled() {
        let (mut engine, _peer, _) = setup();
        let mut stack = Recorder::default();

        assert_eq!(dispatch(&mut engine, &mut stack), IrqReturn::NotHandled);
    }

    #[test]
    fn rta_delivers_frames_and_clears_status() {
        let (mut engine, peer, config) = setup();
        let mut stack = Recorder::default();
        let rx_area = config.rx_ring_offset;

        engine.shmem().write_bytes(rx_area, &[0x11; 60]).unwrap();
        Mailbox::new(&peer).write(MboxMessage::new(60, 0).pack());
        assert!(engine.mailbox().interrupt_status().contains(Interrupt::RTA));

        assert_eq!(dispatch(&mut engine, &mut stack), IrqReturn::Handled);

        assert_eq!(stack.received.len(), 1);
        assert_eq!(stack.received[0].as_bytes(), &[0x11; 60][..]);
        assert!(engine.mailbox().interrupt_status().is_empty());
    }

    #[test]
    fn sta_retires_and_wakes_stopped_queue() {
        let (mut engine, _peer, config) = setup();
        let mut stack = Recorder::default();
        for _ in 0..4 {
            engine.tx_enqueue(vec![0; 32]);
        }
        assert!(engine.is_queue_stopped());

        let ctrl = engine.shmem().control_area(config.control_offset).unwrap();
        ctrl.set(ControlField::TxHead, 3);
        engine.mailbox().bus().raise(Interrupt::STA);

        dispatch(&mut engine, &mut stack);

        assert_eq!(stack.wakes, 1);
        assert_eq!(engine.pending_count(), 0);
        assert!(!engine.is_queue_stopped());
    }

    #[test]
    fn err_reads_error_register() {
        let (mut engine, _peer, _) = setup();
        let mut stack = Recorder::default();

        // Pop from an empty FIFO latches FIFO_EMPTY and ERR
        engine.mailbox().read();
        dispatch(&mut engine, &mut stack);

        assert_eq!(engine.stats().mailbox_errors, 1);
        assert!(engine.mailbox().error().is_empty());
        assert_eq!(
            stack.errors,
            [TransportError::MailboxError(ErrorFlags::FIFO_EMPTY.bits())]
        );
    }

    #[test]
    fn event_latched_during_handler_stays_pending() {
        let (mut engine, peer, config) = setup();
        let mut stack = LateSta {
            local: engine.mailbox().bus().clone(),
            received: 0,
        };

        engine.shmem().write_bytes(config.rx_ring_offset, &[0x22; 40]).unwrap();
        Mailbox::new(&peer).write(MboxMessage::new(40, 0).pack());
        assert_eq!(engine.mailbox().interrupt_status(), Interrupt::RTA);

        assert_eq!(dispatch(&mut engine, &mut stack), IrqReturn::Handled);

        assert_eq!(stack.received, 1);
        let status = engine.mailbox().interrupt_status();
        assert!(status.contains(Interrupt::STA));
        assert!(!status.contains(Interrupt::RTA));
    }
}
