//! Synchronization primitives
//!
//! This module provides the interrupt-safe lock that guards ring state.

pub mod mutex;

pub use mutex::{Mutex, MutexGuard};
