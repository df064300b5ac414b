//! Shared memory region: static layout and volatile access

pub mod layout;
pub mod region;

pub use layout::{ControlField, RingLayout, ShmemLayout};
pub use region::{ControlArea, ControlBlock, RegionError, SharedMemory};
