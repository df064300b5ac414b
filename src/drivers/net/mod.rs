//! Network device drivers and abstractions

pub mod netdev;
pub mod shmem;

pub use netdev::*;
