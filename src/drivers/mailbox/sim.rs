//! In-memory mailbox pair
//!
//! [`pair`] returns two register blocks wired back to back: a word written at
//! one end lands in the other end's receive FIFO. Threshold, status, error
//! and FIFO-reset behavior follow the hardware register map in
//! [`xmbox`](super::xmbox), so the transport can run both sides of a link in
//! one process.
//!
//! The FIFO carrying A→B traffic is A's send FIFO and B's receive FIFO.
//! A's send-threshold interrupt therefore fires when B drains it.

use alloc::collections::VecDeque;
use alloc::sync::Arc;

use super::xmbox::{offsets, Control, ErrorFlags, Interrupt, Status};
use crate::drivers::mmio::Bus;

#[derive(Debug, Default)]
struct EndRegs {
    sit: u32,
    rit: u32,
    ie: u32,
    is: u32,
    error: u32,
}

#[derive(Debug)]
struct Link {
    depth: usize,
    /// `fifo[i]` holds words destined to end `i`
    fifo: [VecDeque<u32>; 2],
    regs: [EndRegs; 2],
}

impl Link {
    /// A word landed in `receiver`'s FIFO
    fn after_push(&mut self, receiver: usize) {
        if self.fifo[receiver].len() as u32 > self.regs[receiver].rit {
            self.regs[receiver].is |= Interrupt::RTA.bits();
        }
    }

    /// `receiver` consumed a word; its sender may have drained to SIT
    fn after_pop(&mut self, receiver: usize) {
        let sender = 1 - receiver;
        if self.fifo[receiver].len() as u32 <= self.regs[sender].sit {
            self.regs[sender].is |= Interrupt::STA.bits();
        }
    }

    fn status(&self, end: usize) -> Status {
        let peer = 1 - end;
        let mut status = Status::empty();

        if self.fifo[end].is_empty() {
            status |= Status::EMPTY;
        }
        if self.fifo[peer].len() >= self.depth {
            status |= Status::FULL;
        }
        if self.fifo[peer].len() as u32 <= self.regs[end].sit {
            status |= Status::STA;
        }
        if self.fifo[end].len() as u32 > self.regs[end].rit {
            status |= Status::RTA;
        }
        status
    }
}

/// One end of a simulated mailbox
#[derive(Clone)]
pub struct SimMailbox {
    link: Arc<spin::Mutex<Link>>,
    end: usize,
}

/// Create two connected mailbox ends, each FIFO `depth` words deep
///
/// Thresholds start at `RIT = 0` (interrupt on any word) and `SIT = 0`
/// (interrupt once the send FIFO fully drains), with all interrupts masked.
pub fn pair(depth: usize) -> (SimMailbox, SimMailbox) {
    let link = Arc::new(spin::Mutex::new(Link {
        depth,
        fifo: [VecDeque::with_capacity(depth), VecDeque::with_capacity(depth)],
        regs: [EndRegs::default(), EndRegs::default()],
    }));

    let a = SimMailbox {
        link: Arc::clone(&link),
        end: 0,
    };
    let b = SimMailbox { link, end: 1 };
    (a, b)
}

impl SimMailbox {
    /// Words waiting in this end's receive FIFO
    pub fn pending_words(&self) -> usize {
        self.link.lock().fifo[self.end].len()
    }

    /// Latch interrupt status bits as if the hardware raised them
    pub fn raise(&self, bits: Interrupt) {
        self.link.lock().regs[self.end].is |= bits.bits();
    }

    /// Whether the interrupt line of this end is asserted
    pub fn irq_pending(&self) -> bool {
        let link = self.link.lock();
        let regs = &link.regs[self.end];
        regs.is & regs.ie != 0
    }
}

impl Bus for SimMailbox {
    fn read(&self, offset: usize) -> u32 {
        let mut link = self.link.lock();
        let end = self.end;

        match offset {
            offsets::READ => {
                match link.fifo[end].pop_front() {
                    Some(value) => {
                        link.after_pop(end);
                        value
                    }
                    None => {
                        link.regs[end].error |= ErrorFlags::FIFO_EMPTY.bits();
                        link.regs[end].is |= Interrupt::ERR.bits();
                        0
                    }
                }
            }
            offsets::STATUS => link.status(end).bits(),
            offsets::ERROR => core::mem::take(&mut link.regs[end].error),
            offsets::SIT => link.regs[end].sit,
            offsets::RIT => link.regs[end].rit,
            offsets::IS => link.regs[end].is,
            offsets::IE => link.regs[end].ie,
            offsets::IP => link.regs[end].is & link.regs[end].ie,
            _ => 0,
        }
    }

    fn write(&self, offset: usize, value: u32) {
        let mut link = self.link.lock();
        let end = self.end;
        let peer = 1 - end;

        match offset {
            offsets::WRITE => {
                if link.fifo[peer].len() >= link.depth {
                    link.regs[end].error |= ErrorFlags::FIFO_FULL.bits();
                    link.regs[end].is |= Interrupt::ERR.bits();
                } else {
                    link.fifo[peer].push_back(value);
                    link.after_push(peer);
                }
            }
            offsets::SIT => link.regs[end].sit = value,
            offsets::RIT => link.regs[end].rit = value,
            offsets::IS => link.regs[end].is &= !value,
            offsets::IE => link.regs[end].ie = value,
            offsets::CTRL => {
                let ctrl = Control::from_bits_truncate(value);
                if ctrl.contains(Control::RESET_SEND_FIFO) {
                    link.fifo[peer].clear();
                }
                if ctrl.contains(Control::RESET_RECV_FIFO) {
                    link.fifo[end].clear();
                }
            }
            _ => {}
        }
    }
}
