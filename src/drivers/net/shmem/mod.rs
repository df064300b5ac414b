//! Virtual Ethernet over shared memory
//!
//! - `message`: mailbox notification word
//! - `engine`: ring state and the TX enqueue / retire / RX drain algorithms
//! - `dispatch`: mailbox interrupt decoding
//! - `transport`: locked façade owned by the embedding kernel
//! - `phy`: `smoltcp` device adapter

pub mod dispatch;
pub mod engine;
pub mod message;
pub mod phy;
pub mod transport;

pub use dispatch::{dispatch, IrqReturn};
pub use engine::{Retired, RingEngine, RxDrain};
pub use message::MboxMessage;
pub use phy::{Backlog, ShmemDevice};
pub use transport::ShmemNet;
