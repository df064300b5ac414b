//! Virtual Ethernet over shared memory and a hardware mailbox
//!
//! Two processors share one physical memory region and a FIFO mailbox. Each
//! side serializes outbound frames into its TX ring, publishes the new tail in
//! the control area, and pokes the peer with a 32-bit mailbox notification.
//! Inbound notifications drive retrieval of the frames the peer placed in the
//! opposite ring.
//!
//! ```text
//! submit ─▶ RingEngine::tx_enqueue ─▶ TX ring slot ─▶ tx_tail ─▶ mailbox
//!                                                                   │
//! on_send_complete ◀─ tx_retire ◀─ send-threshold IRQ ◀─────────────┘
//!
//! receive-threshold IRQ ─▶ mailbox drain ─▶ rx_dequeue ─▶ on_received
//! ```
//!
//! The crate is `no_std` + `alloc`. Mapping the regions, resolving the
//! interrupt line and registering with a network stack are left to the
//! embedding kernel; see [`drivers::net::shmem::ShmemNet`] for the boundary.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod drivers;
pub mod net;
pub mod shmem;
pub mod sync;

pub use config::{Config, ConfigError, Role};
pub use drivers::net::shmem::{IrqReturn, RingEngine, ShmemNet};
pub use drivers::net::{NetStack, NetStats, TransportError, TxPacket, TxStatus};
pub use net::skbuff::SkBuff;
