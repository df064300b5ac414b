//! Inter-processor mailbox
//!
//! `xmbox` drives the FIFO mailbox register block; `sim` provides a
//! connected pair of in-memory register blocks with the same behavior.

pub mod sim;
pub mod xmbox;

pub use sim::SimMailbox;
pub use xmbox::{Interrupt, Mailbox, Status};
