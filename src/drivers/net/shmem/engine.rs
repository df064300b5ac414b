//! Ring transport engine
//!
//! Owns one side's view of both rings: local copies of the indices, the
//! pending-transmit table and the statistics.
//!
//! # TX Indices
//!
//! ```text
//!   tx_retire_cursor        tx_head (peer)          tx_tail (ours)
//!          │                    │                        │
//!          ▼                    ▼                        ▼
//!   ┌──────┬──────┬──────┬──────┬──────┬──────┬──────┬──────┐
//!   │ done │ done │ done │ sent │ sent │ sent │ free │ free │
//!   └──────┴──────┴──────┴──────┴──────┴──────┴──────┴──────┘
//!          └─ released by tx_retire ─┘
//! ```
//!
//! The submission path only moves `tx_tail`. The completion path only moves
//! `tx_retire_cursor` and `tx_head`. Fullness is computed from
//! `(tx_tail, tx_head)`, so one slot always stays empty.
//!
//! # Visibility
//!
//! Slot bytes are written (or read) before the index that exposes (or
//! frees) the slot, with a barrier in between. Mailbox words are only hints.

use alloc::vec::Vec;

use log::{debug, trace, warn};

use super::message::MboxMessage;
use crate::config::{Config, ConfigError};
use crate::drivers::mailbox::xmbox::{ErrorFlags, Mailbox};
use crate::drivers::mmio::{rmb, wmb, Bus};
use crate::drivers::net::netdev::{NetStats, TransportError, TxPacket, TxStatus};
use crate::net::ethernet::{EthernetFrame, MacAddress, HEADER_LEN};
use crate::net::skbuff::SkBuff;
use crate::shmem::layout::ShmemLayout;
use crate::shmem::region::{ControlArea, RegionError, SharedMemory};

/// Result of one retirement pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Retired {
    /// Pending handles released
    pub released: usize,
    /// The queue had been stopped and now has room
    pub wake: bool,
}

pub struct RingEngine<B: Bus, P> {
    mailbox: Mailbox<B>,
    shmem: SharedMemory,
    control: ControlArea,
    layout: ShmemLayout,
    mac: MacAddress,
    max_frame: usize,
    poll_tx_completions: bool,

    tx_tail: u32,
    tx_head: u32,
    tx_retire_cursor: u32,
    rx_head: u32,

    /// Outstanding handle per TX slot
    pending: Vec<Option<P>>,
    queue_stopped: bool,
    stats: NetStats,
}

impl<B: Bus, P: TxPacket> RingEngine<B, P> {
    /// Bind an engine to a mailbox and a mapped region
    ///
    /// # Errors
    ///
    /// Any `Config::validate()` failure, or `RegionTooSmall` if `shmem` does
    /// not cover the layout.
    pub fn new(config: &Config, bus: B, shmem: SharedMemory) -> Result<Self, ConfigError> {
        config.validate()?;

        let required = config.required_region_size();
        if shmem.len() < required {
            return Err(ConfigError::RegionTooSmall {
                required,
                actual: shmem.len(),
            });
        }

        let control = shmem
            .control_area(config.control_offset)
            .map_err(|err| match err {
                RegionError::Misaligned(offset) => ConfigError::MisalignedControl(offset),
                RegionError::OutOfBounds { .. } => ConfigError::RegionTooSmall {
                    required,
                    actual: shmem.len(),
                },
            })?;

        let mut pending = Vec::with_capacity(config.ring_capacity);
        pending.resize_with(config.ring_capacity, || None);

        Ok(Self {
            mailbox: Mailbox::new(bus),
            shmem,
            control,
            layout: ShmemLayout::new(config),
            mac: config.mac_address,
            max_frame: config.max_frame_size,
            poll_tx_completions: config.poll_tx_completions,
            tx_tail: 0,
            tx_head: 0,
            tx_retire_cursor: 0,
            rx_head: 0,
            pending,
            queue_stopped: false,
            stats: NetStats::default(),
        })
    }

    /// Zero local and shared indices and release every pending handle
    pub fn reset(&mut self) {
        self.tx_tail = 0;
        self.tx_head = 0;
        self.tx_retire_cursor = 0;
        self.rx_head = 0;
        self.queue_stopped = false;

        for entry in self.pending.iter_mut() {
            entry.take();
        }

        self.control.clear();
    }

    // ========================================================================
    // Transmit
    // ========================================================================

    /// Copy a frame into the next TX slot and notify the peer
    pub fn tx_enqueue(&mut self, packet: P) -> TxStatus<P> {
        let total_len = HEADER_LEN + packet.frame().len();

        if total_len > self.max_frame {
            warn!(
                "shmnet: tx frame too large: {} > {}, dropping",
                total_len, self.max_frame
            );
            self.stats.tx_dropped += 1;
            return TxStatus::Dropped(TransportError::Oversize);
        }

        let tx = self.layout.tx;
        let next_tail = tx.next(self.tx_tail);

        if next_tail == self.tx_head && self.poll_tx_completions {
            let head = self.peer_tx_head();
            self.tx_retire(head);
        }

        if next_tail == self.tx_head {
            self.queue_stopped = true;
            self.stats.tx_busy += 1;
            return TxStatus::Busy(packet);
        }

        let slot = self.tx_tail;
        let offset = tx.area_offset + tx.slot_offset(slot as usize);
        let header = EthernetFrame::synthetic(self.mac, &[]).header();

        let written = self
            .shmem
            .write_bytes(offset, &header)
            .and_then(|()| self.shmem.write_bytes(offset + HEADER_LEN, packet.frame()));
        if let Err(err) = written {
            warn!("shmnet: tx slot {} write failed: {}", slot, err);
            self.stats.tx_dropped += 1;
            return TxStatus::Dropped(TransportError::BoundsViolation);
        }

        self.pending[slot as usize] = Some(packet);

        self.tx_tail = next_tail;
        wmb();
        self.control.set(tx.producer, self.tx_tail);

        if self.mailbox.is_full() {
            debug!("shmnet: mailbox full, slot {} not announced", slot);
            self.stats.tx_notify_skipped += 1;
        } else {
            self.mailbox
                .write(MboxMessage::new(total_len as u16, slot as u16).pack());
        }

        trace!(
            "shmnet: sent {} bytes, slot {}, tx_head {}, tx_tail {}",
            total_len,
            slot,
            self.tx_head,
            self.tx_tail
        );

        self.stats.tx_packets += 1;
        self.stats.tx_bytes += total_len as u64;

        TxStatus::Accepted(slot as u16)
    }

    /// Peer's consumer index for our TX ring, as published in the control area
    pub fn peer_tx_head(&self) -> u32 {
        let head = self.control.get(self.layout.tx.consumer);
        rmb();
        head
    }

    /// Release handles for every slot the peer has consumed up to `new_head`
    ///
    /// Walks at most `capacity` slots. Repeating a call with the same head
    /// does nothing. A head outside the ring, or one that would pass
    /// `tx_tail`, is counted and ignored.
    pub fn tx_retire(&mut self, new_head: u32) -> Retired {
        let tx = self.layout.tx;

        if new_head as usize >= tx.capacity {
            warn!(
                "shmnet: peer tx_head {} outside ring of {}, ignoring",
                new_head, tx.capacity
            );
            self.stats.tx_head_invalid += 1;
            return Retired::default();
        }

        if tx.distance(self.tx_retire_cursor, new_head)
            > tx.distance(self.tx_retire_cursor, self.tx_tail)
        {
            warn!(
                "shmnet: peer tx_head {} ahead of tx_tail {}, ignoring",
                new_head, self.tx_tail
            );
            self.stats.tx_head_invalid += 1;
            return Retired::default();
        }

        let mut released = 0;
        let mut cursor = self.tx_retire_cursor;
        for _ in 0..tx.capacity {
            if cursor == new_head {
                break;
            }
            if self.pending[cursor as usize].take().is_some() {
                released += 1;
            }
            cursor = tx.next(cursor);
        }

        self.tx_retire_cursor = new_head;
        self.tx_head = new_head;
        self.stats.tx_completed += released as u64;

        let wake = self.queue_stopped && tx.next(self.tx_tail) != self.tx_head;
        if wake {
            self.queue_stopped = false;
        }

        if released > 0 {
            trace!("shmnet: retired {} slots, tx_head {}", released, new_head);
        }

        Retired { released, wake }
    }

    /// Retire against the control-area index without waiting for an interrupt
    pub fn retire_from_peer(&mut self) -> Retired {
        let head = self.peer_tx_head();
        self.tx_retire(head)
    }

    // ========================================================================
    // Receive
    // ========================================================================

    /// Drain queued notifications, yielding one result per word
    ///
    /// Stops when the mailbox reports empty. Dropping the iterator early
    /// leaves the remaining words in the FIFO.
    pub fn rx_dequeue(&mut self) -> RxDrain<'_, B, P> {
        RxDrain { engine: self }
    }

    /// Copy out the frame a single notification points at
    pub fn rx_receive(&mut self, msg: MboxMessage) -> Result<SkBuff, TransportError> {
        let rx = self.layout.rx;
        let len = msg.length as usize;

        if len == 0 || len > self.max_frame {
            warn!(
                "shmnet: invalid rx length {} (slot {}), dropping",
                len, msg.index
            );
            self.stats.rx_malformed += 1;
            self.stats.rx_dropped += 1;
            return Err(TransportError::MalformedNotification);
        }

        let Some(offset) = rx.checked_span(msg.index as usize, len) else {
            warn!(
                "shmnet: rx slot {} + {} bytes exceeds ring area, dropping",
                msg.index, len
            );
            self.stats.rx_overflow += 1;
            self.stats.rx_dropped += 1;
            return Err(TransportError::BoundsViolation);
        };

        rmb();
        let shmem = self.shmem;
        let mut copied = Ok(());
        let skb = SkBuff::try_with_len(len, |buf| copied = shmem.read_bytes(offset, buf));

        let mut skb = match (skb, copied) {
            (Ok(skb), Ok(())) => skb,
            (Err(_), _) => {
                warn!("shmnet: no buffer for {} byte rx frame, dropping", len);
                self.stats.rx_alloc_failures += 1;
                self.stats.rx_dropped += 1;
                return Err(TransportError::AllocationFailure);
            }
            (Ok(_), Err(err)) => {
                warn!("shmnet: rx slot {} read failed: {}", msg.index, err);
                self.stats.rx_overflow += 1;
                self.stats.rx_dropped += 1;
                return Err(TransportError::BoundsViolation);
            }
        };

        skb.metadata_mut().slot = Some(msg.index);
        skb.link_header_trans();

        self.rx_head = rx.next(self.rx_head);
        wmb();
        self.control.set(rx.consumer, self.rx_head);

        trace!(
            "shmnet: received {} bytes from slot {}, rx_head {}",
            len,
            msg.index,
            self.rx_head
        );

        self.stats.rx_packets += 1;
        self.stats.rx_bytes += len as u64;

        Ok(skb)
    }

    /// Count a frame refused before reaching the ring
    pub fn note_tx_dropped(&mut self) {
        self.stats.tx_dropped += 1;
    }

    /// Read (and thereby clear) the mailbox error register
    pub fn take_mailbox_error(&mut self) -> ErrorFlags {
        let error = self.mailbox.error();
        warn!("shmnet: mailbox error: {:#010x}", error.bits());
        self.stats.mailbox_errors += 1;
        error
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn mailbox(&self) -> &Mailbox<B> {
        &self.mailbox
    }

    pub fn shmem(&self) -> SharedMemory {
        self.shmem
    }

    pub fn layout(&self) -> &ShmemLayout {
        &self.layout
    }

    pub fn mac_address(&self) -> MacAddress {
        self.mac
    }

    pub fn stats(&self) -> NetStats {
        self.stats
    }

    pub fn tx_tail(&self) -> u32 {
        self.tx_tail
    }

    pub fn tx_head(&self) -> u32 {
        self.tx_head
    }

    pub fn tx_retire_cursor(&self) -> u32 {
        self.tx_retire_cursor
    }

    pub fn rx_head(&self) -> u32 {
        self.rx_head
    }

    /// Slots holding an unretired handle
    pub fn pending_count(&self) -> usize {
        self.pending.iter().filter(|entry| entry.is_some()).count()
    }

    pub fn is_queue_stopped(&self) -> bool {
        self.queue_stopped
    }
}

/// Iterator returned by [`RingEngine::rx_dequeue`]
pub struct RxDrain<'a, B: Bus, P> {
    engine: &'a mut RingEngine<B, P>,
}

impl<B: Bus, P: TxPacket> Iterator for RxDrain<'_, B, P> {
    type Item = Result<SkBuff, TransportError>;

    fn next(&mut self) -> Option<Self::Item> {
        let word = self.engine.mailbox.try_read()?;
        let msg = MboxMessage::unpack(word);
        trace!(
            "shmnet: mbox msg {:#010x} (len={}, idx={})",
            word,
            msg.length,
            msg.index
        );
        Some(self.engine.rx_receive(msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::mailbox::sim::{self, SimMailbox};
    use crate::shmem::layout::ControlField;
    use alloc::vec;

    fn small_config() -> Config {
        Config {
            ring_capacity: 4,
            ..Config::reference()
        }
    }

    fn engine(config: &Config) -> (RingEngine<SimMailbox, Vec<u8>>, Mailbox<SimMailbox>) {
        let (local, peer) = sim::pair(16);
        let shmem = SharedMemory::alloc_zeroed(config.required_region_size());
        let engine = RingEngine::new(config, local, shmem).unwrap();
        (engine, Mailbox::new(peer))
    }

    #[test]
    fn rejects_region_smaller_than_layout() {
        let (local, _peer) = sim::pair(4);
        let shmem = SharedMemory::alloc_zeroed(0x1000);
        let result = RingEngine::<_, Vec<u8>>::new(&Config::reference(), local, shmem);

        assert!(matches!(result, Err(ConfigError::RegionTooSmall { .. })));
    }

    #[test]
    fn enqueue_writes_header_then_payload() {
        let config = small_config();
        let (mut engine, peer) = engine(&config);

        assert_eq!(engine.tx_enqueue(vec![0xAA; 100]), TxStatus::Accepted(0));

        let mut slot = [0u8; 114];
        engine.shmem().read_bytes(0, &mut slot).unwrap();
        assert_eq!(&slot[0..6], &[0xFF; 6]);
        assert_eq!(&slot[6..12], config.mac_address.as_bytes());
        assert_eq!(&slot[12..14], &[0x08, 0x00]);
        assert!(slot[14..].iter().all(|&b| b == 0xAA));

        let ctrl = engine.shmem().control_area(config.control_offset).unwrap();
        assert_eq!(ctrl.get(ControlField::TxTail), 1);
        assert_eq!(peer.read(), MboxMessage::new(114, 0).pack());
        assert_eq!(engine.stats().tx_bytes, 114);
    }

    #[test]
    fn retire_is_idempotent() {
        let (mut engine, _peer) = engine(&small_config());
        engine.tx_enqueue(vec![1; 10]);
        engine.tx_enqueue(vec![2; 10]);

        assert_eq!(engine.tx_retire(2).released, 2);
        assert_eq!(engine.tx_retire(2), Retired::default());
        assert_eq!(engine.pending_count(), 0);
        assert_eq!(engine.stats().tx_completed, 2);
    }

    #[test]
    fn retire_ignores_head_outside_ring() {
        let (mut engine, _peer) = engine(&small_config());
        engine.tx_enqueue(vec![1; 10]);

        assert_eq!(engine.tx_retire(4), Retired::default());
        assert_eq!(engine.pending_count(), 1);
        assert_eq!(engine.stats().tx_head_invalid, 1);
    }

    #[test]
    fn retire_ignores_head_past_tail() {
        let (mut engine, _peer) = engine(&small_config());
        engine.tx_enqueue(vec![1; 10]);

        assert_eq!(engine.tx_retire(2), Retired::default());
        assert_eq!(engine.pending_count(), 1);
        assert_eq!(engine.tx_head(), 0);
        assert_eq!(engine.stats().tx_head_invalid, 1);

        // The ring still has room, and the real head is still honored
        assert!(engine.tx_enqueue(vec![2; 10]).is_accepted());
        assert_eq!(engine.tx_retire(1).released, 1);
    }

    #[test]
    fn wake_only_after_busy() {
        let (mut engine, _peer) = engine(&small_config());
        for _ in 0..3 {
            assert!(engine.tx_enqueue(vec![0; 10]).is_accepted());
        }
        assert!(!engine.tx_retire(1).wake);

        engine.tx_enqueue(vec![0; 10]);
        assert!(engine.tx_enqueue(vec![0; 10]).is_busy());
        assert!(engine.is_queue_stopped());

        let retired = engine.tx_retire(2);
        assert!(retired.wake);
        assert!(!engine.is_queue_stopped());
    }

    #[test]
    fn polling_retires_before_busy() {
        let config = Config {
            poll_tx_completions: true,
            ..small_config()
        };
        let (mut engine, _peer) = engine(&config);
        for _ in 0..3 {
            engine.tx_enqueue(vec![0; 10]);
        }

        let ctrl = engine.shmem().control_area(config.control_offset).unwrap();
        ctrl.set(ControlField::TxHead, 1);

        assert_eq!(engine.tx_enqueue(vec![0; 10]), TxStatus::Accepted(3));
        assert_eq!(engine.stats().tx_busy, 0);
        assert_eq!(engine.stats().tx_completed, 1);
    }

    #[test]
    fn reset_releases_pending_and_zeroes_indices() {
        let config = small_config();
        let (mut engine, _peer) = engine(&config);
        engine.tx_enqueue(vec![0; 10]);
        engine.tx_enqueue(vec![0; 10]);

        engine.reset();

        assert_eq!(engine.pending_count(), 0);
        assert_eq!(engine.tx_tail(), 0);
        let ctrl = engine.shmem().control_area(config.control_offset).unwrap();
        for field in ControlField::ALL {
            assert_eq!(ctrl.get(field), 0);
        }
    }

    #[test]
    fn malformed_notification_leaves_rx_head() {
        let (mut engine, peer) = engine(&small_config());
        peer.write(MboxMessage::new(0, 0).pack());
        peer.write(MboxMessage::new(1519, 1).pack());

        let results: Vec<_> = engine.rx_dequeue().collect();
        assert_eq!(
            results.iter().map(|r| r.as_ref().err().copied()).collect::<Vec<_>>(),
            [
                Some(TransportError::MalformedNotification),
                Some(TransportError::MalformedNotification)
            ]
        );
        assert_eq!(engine.rx_head(), 0);
        assert_eq!(engine.stats().rx_malformed, 2);
        assert_eq!(engine.stats().rx_dropped, 2);
    }
}
