//! Shared memory access
//!
//! The region is written by two processors at once, so nothing here hands out
//! Rust references into it. Frame bytes move with bounds-checked volatile
//! copies; the four control indices are reached through a [`ControlArea`]
//! handle over a `#[repr(C)]` overlay of `Volatile<u32>` cells.

use alloc::vec;
use core::fmt;
use core::mem;
use core::ptr::{self, NonNull};

use volatile::Volatile;

use super::layout::ControlField;

/// Out-of-range access to the shared region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionError {
    /// `offset + len` runs past the end of a region of `size` bytes
    OutOfBounds { offset: usize, len: usize, size: usize },

    /// Control area offset is not 32-bit aligned
    Misaligned(usize),
}

impl fmt::Display for RegionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionError::OutOfBounds { offset, len, size } => write!(
                f,
                "access of {} bytes at {:#x} exceeds region of {:#x} bytes",
                len, offset, size
            ),
            RegionError::Misaligned(offset) => {
                write!(f, "control area offset {:#x} is not 4-byte aligned", offset)
            }
        }
    }
}

/// Mapped shared memory span
#[derive(Debug, Clone, Copy)]
pub struct SharedMemory {
    base: NonNull<u8>,
    len: usize,
}

// SAFETY: all access goes through volatile raw-pointer operations; the
// cross-processor single-writer discipline is upheld by the ring protocol.
unsafe impl Send for SharedMemory {}
unsafe impl Sync for SharedMemory {}

impl SharedMemory {
    /// # Safety
    ///
    /// `base..base + len` must stay mapped, readable and writable for as long
    /// as any copy of the returned value is used. `base` must be 4-byte
    /// aligned.
    pub const unsafe fn from_raw(base: NonNull<u8>, len: usize) -> Self {
        Self { base, len }
    }

    /// Leak a zeroed heap region of `len` bytes
    ///
    /// Used when both ends of the link live in one address space.
    pub fn alloc_zeroed(len: usize) -> Self {
        let words = vec![0u32; len.div_ceil(mem::size_of::<u32>())].leak();
        let base = NonNull::from(&mut words[..]).cast::<u8>();
        // SAFETY: leaked allocation lives forever and is u32-aligned.
        unsafe { Self::from_raw(base, len) }
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub const fn as_ptr(&self) -> *mut u8 {
        self.base.as_ptr()
    }

    fn check(&self, offset: usize, len: usize) -> Result<(), RegionError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(RegionError::OutOfBounds {
                offset,
                len,
                size: self.len,
            }),
        }
    }

    /// Copy `buf.len()` bytes out of the region starting at `offset`
    pub fn read_bytes(&self, offset: usize, buf: &mut [u8]) -> Result<(), RegionError> {
        self.check(offset, buf.len())?;

        let src = self.as_ptr().wrapping_add(offset);
        for (i, byte) in buf.iter_mut().enumerate() {
            // SAFETY: bounds checked above.
            *byte = unsafe { ptr::read_volatile(src.add(i)) };
        }
        Ok(())
    }

    /// Copy `data` into the region starting at `offset`
    pub fn write_bytes(&self, offset: usize, data: &[u8]) -> Result<(), RegionError> {
        self.check(offset, data.len())?;

        let dst = self.as_ptr().wrapping_add(offset);
        for (i, &byte) in data.iter().enumerate() {
            // SAFETY: bounds checked above.
            unsafe { ptr::write_volatile(dst.add(i), byte) };
        }
        Ok(())
    }

    /// Handle to the control indices at `offset`
    pub fn control_area(&self, offset: usize) -> Result<ControlArea, RegionError> {
        let addr = (self.as_ptr() as usize).wrapping_add(offset);
        if addr % mem::align_of::<ControlBlock>() != 0 {
            return Err(RegionError::Misaligned(offset));
        }
        self.check(offset, mem::size_of::<ControlBlock>())?;

        let block = self.as_ptr().wrapping_add(offset).cast::<ControlBlock>();
        Ok(ControlArea {
            // SAFETY: derived from a non-null base plus an in-bounds offset.
            block: unsafe { NonNull::new_unchecked(block) },
        })
    }
}

/// Control area layout, shared bit-for-bit with the peer
#[repr(C)]
pub struct ControlBlock {
    pub tx_head: Volatile<u32>,
    pub tx_tail: Volatile<u32>,
    pub rx_head: Volatile<u32>,
    pub rx_tail: Volatile<u32>,
}

impl ControlBlock {
    fn field(&mut self, field: ControlField) -> &mut Volatile<u32> {
        match field {
            ControlField::TxHead => &mut self.tx_head,
            ControlField::TxTail => &mut self.tx_tail,
            ControlField::RxHead => &mut self.rx_head,
            ControlField::RxTail => &mut self.rx_tail,
        }
    }
}

/// Validated pointer to the [`ControlBlock`] inside a region
#[derive(Debug, Clone, Copy)]
pub struct ControlArea {
    block: NonNull<ControlBlock>,
}

// SAFETY: same reasoning as `SharedMemory`.
unsafe impl Send for ControlArea {}
unsafe impl Sync for ControlArea {}

impl ControlArea {
    pub fn get(&self, field: ControlField) -> u32 {
        // SAFETY: `control_area()` checked bounds and alignment.
        unsafe { (*self.block.as_ptr()).field(field).read() }
    }

    pub fn set(&self, field: ControlField, value: u32) {
        // SAFETY: see `get()`.
        unsafe { (*self.block.as_ptr()).field(field).write(value) }
    }

    /// Zero all four indices
    pub fn clear(&self) {
        for field in ControlField::ALL {
            self.set(field, 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::offset_of;

    #[test]
    fn control_block_matches_wire_layout() {
        assert_eq!(mem::size_of::<ControlBlock>(), 0x10);
        assert_eq!(offset_of!(ControlBlock, tx_head), ControlField::TxHead.offset());
        assert_eq!(offset_of!(ControlBlock, tx_tail), ControlField::TxTail.offset());
        assert_eq!(offset_of!(ControlBlock, rx_head), ControlField::RxHead.offset());
        assert_eq!(offset_of!(ControlBlock, rx_tail), ControlField::RxTail.offset());
    }

    #[test]
    fn control_indices_land_at_fixed_offsets() {
        let shmem = SharedMemory::alloc_zeroed(0x100);
        let ctrl = shmem.control_area(0x40).unwrap();

        ctrl.set(ControlField::RxHead, 0x1234_5678);

        let mut raw = [0u8; 4];
        shmem.read_bytes(0x48, &mut raw).unwrap();
        assert_eq!(u32::from_ne_bytes(raw), 0x1234_5678);
        assert_eq!(ctrl.get(ControlField::RxHead), 0x1234_5678);

        ctrl.clear();
        assert_eq!(ctrl.get(ControlField::RxHead), 0);
    }

    #[test]
    fn byte_copies_are_bounds_checked() {
        let shmem = SharedMemory::alloc_zeroed(16);

        shmem.write_bytes(12, &[1, 2, 3, 4]).unwrap();
        assert_eq!(
            shmem.write_bytes(13, &[1, 2, 3, 4]),
            Err(RegionError::OutOfBounds {
                offset: 13,
                len: 4,
                size: 16
            })
        );

        let mut buf = [0u8; 4];
        shmem.read_bytes(12, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
        assert!(shmem.read_bytes(usize::MAX, &mut buf).is_err());
    }

    #[test]
    fn control_area_rejects_bad_offsets() {
        let shmem = SharedMemory::alloc_zeroed(0x20);

        assert_eq!(shmem.control_area(0x2).err(), Some(RegionError::Misaligned(0x2)));
        assert!(shmem.control_area(0x14).is_err());
        assert!(shmem.control_area(0x10).is_ok());
    }
}
