//! Register bus abstraction
//!
//! Drivers talk to their register block through [`Bus`] so the same driver
//! code runs against real MMIO or an in-memory register model in tests.

use volatile::Volatile;

/// 32-bit register access at byte offsets from a device base
pub trait Bus {
    fn read(&self, offset: usize) -> u32;
    fn write(&self, offset: usize, value: u32);
}

impl<B: Bus + ?Sized> Bus for &B {
    fn read(&self, offset: usize) -> u32 {
        (**self).read(offset)
    }

    fn write(&self, offset: usize, value: u32) {
        (**self).write(offset, value)
    }
}

/// Memory-mapped register window
#[derive(Debug, Clone, Copy)]
pub struct Mmio {
    base: usize,
    size: usize,
}

impl Mmio {
    /// # Safety
    ///
    /// `base..base + size` must be a mapped device register block for the
    /// lifetime of this value, with 32-bit accesses permitted at every
    /// aligned offset.
    pub const unsafe fn new(base: usize, size: usize) -> Self {
        Self { base, size }
    }

    pub const fn base(&self) -> usize {
        self.base
    }

    pub const fn size(&self) -> usize {
        self.size
    }

    fn register(&self, offset: usize) -> *mut Volatile<u32> {
        debug_assert!(offset % 4 == 0 && offset + 4 <= self.size);
        (self.base + offset) as *mut Volatile<u32>
    }
}

impl Bus for Mmio {
    fn read(&self, offset: usize) -> u32 {
        // SAFETY: `new()` guarantees the window is mapped; offset is aligned.
        unsafe { (*self.register(offset)).read() }
    }

    fn write(&self, offset: usize, value: u32) {
        wmb();
        // SAFETY: see `read()`.
        unsafe { (*self.register(offset)).write(value) }
    }
}

/// Order prior memory writes before subsequent writes
///
/// Index publication depends on this: a peer that observes the new index
/// must also observe the slot contents written before it.
#[inline]
pub fn wmb() {
    #[cfg(all(target_arch = "aarch64", target_os = "none"))]
    // SAFETY: barrier instruction only.
    unsafe {
        core::arch::asm!("dmb sy", options(nostack));
    }

    #[cfg(not(all(target_arch = "aarch64", target_os = "none")))]
    core::sync::atomic::fence(core::sync::atomic::Ordering::Release);
}

/// Order a prior index read before the slot reads it guards
#[inline]
pub fn rmb() {
    #[cfg(all(target_arch = "aarch64", target_os = "none"))]
    // SAFETY: barrier instruction only.
    unsafe {
        core::arch::asm!("dmb sy", options(nostack));
    }

    #[cfg(not(all(target_arch = "aarch64", target_os = "none")))]
    core::sync::atomic::fence(core::sync::atomic::Ordering::Acquire);
}
