//! Device drivers
//!
//! Organized by device class:
//! - `mmio`: register bus and memory barriers
//! - `mailbox`: FIFO mailbox between the two processors
//! - `net`: network device abstractions and the shared-memory transport

pub mod mailbox;
pub mod mmio;
pub mod net;
