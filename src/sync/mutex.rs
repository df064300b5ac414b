//! Interrupt-safe mutex
//!
//! The transport's ring state is touched from two contexts: the submission
//! path (any thread) and the mailbox interrupt handler. A plain spinlock
//! deadlocks if the interrupt fires on a CPU that already holds it:
//!
//! ```text
//! 1. submit() acquires the lock
//! 2. Mailbox IRQ fires on the same CPU
//! 3. Handler spins on the lock
//! 4. DEADLOCK: submit() never resumes to release it
//! ```
//!
//! [`Mutex::lock`] therefore masks IRQs on the current CPU before spinning
//! and restores the previous mask when the guard drops (the
//! `spin_lock_irqsave()` pattern).
//!
//! On bare-metal AArch64 the mask is the DAIF.I bit. Everywhere else (host
//! builds, simulation) there is no local interrupt to mask: the
//! "interrupt" is just another thread calling the handler, and the spinlock
//! alone gives mutual exclusion.

use core::ops::{Deref, DerefMut};

/// Spinlock that masks local interrupts while held
pub struct Mutex<T> {
    inner: spin::Mutex<T>,
}

impl<T> Mutex<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: spin::Mutex::new(value),
        }
    }

    /// Mask IRQs, then acquire the lock
    ///
    /// Spins if another CPU holds it. The critical section must not block.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        let irq_state = IrqState::disable();
        let guard = self.inner.lock();

        MutexGuard {
            guard,
            _irq_state: irq_state,
        }
    }

    /// Like [`lock`](Self::lock) but gives up instead of spinning
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        let irq_state = IrqState::disable();
        let guard = self.inner.try_lock()?;

        Some(MutexGuard {
            guard,
            _irq_state: irq_state,
        })
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

/// Guard returned by `Mutex::lock()`
///
/// Field order matters: the spinlock guard drops first, then the saved IRQ
/// state is restored.
pub struct MutexGuard<'a, T> {
    guard: spin::MutexGuard<'a, T>,
    _irq_state: IrqState,
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

/// Saved IRQ mask (DAIF register)
#[cfg(all(target_arch = "aarch64", target_os = "none"))]
struct IrqState {
    daif: u64,
}

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
impl IrqState {
    fn disable() -> Self {
        use core::arch::asm;

        let daif: u64;

        // SAFETY: DAIF is accessible at EL1. `msr daifset, #2` sets the IRQ
        // mask bit atomically and the old value is kept for restore.
        unsafe {
            asm!("mrs {}, daif", out(reg) daif, options(nomem, nostack));
            asm!("msr daifset, #2", options(nomem, nostack));
        }

        Self { daif }
    }
}

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
impl Drop for IrqState {
    fn drop(&mut self) {
        use core::arch::asm;

        // SAFETY: restores a value read from DAIF by `disable()`.
        unsafe {
            asm!("msr daif, {}", in(reg) self.daif, options(nomem, nostack));
        }
    }
}

#[cfg(not(all(target_arch = "aarch64", target_os = "none")))]
struct IrqState;

#[cfg(not(all(target_arch = "aarch64", target_os = "none")))]
impl IrqState {
    fn disable() -> Self {
        IrqState
    }
}
