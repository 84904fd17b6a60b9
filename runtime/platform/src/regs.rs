//! 16-bit register access through mapped windows

use crate::VirtAddr;

/// Register read/write primitives
///
/// Accesses are 16 bits wide at `base + offset`, where `base` was returned
/// by an [`AddressMapper`](crate::AddressMapper).
pub trait RegisterIo {
    fn read_u16(&self, base: VirtAddr, offset: usize) -> u16;

    fn write_u16(&self, base: VirtAddr, offset: usize, value: u16);
}

impl<T: RegisterIo + ?Sized> RegisterIo for &T {
    fn read_u16(&self, base: VirtAddr, offset: usize) -> u16 {
        (**self).read_u16(base, offset)
    }

    fn write_u16(&self, base: VirtAddr, offset: usize, value: u16) {
        (**self).write_u16(base, offset, value)
    }
}

/// Volatile MMIO accesses, optionally byte swapped
///
/// Byte swapping is needed when the host reaches a big-endian bus through a
/// bridge that does not swap in hardware.
#[derive(Debug, Clone, Copy, Default)]
pub struct VolatileIo {
    swapped: bool,
}

impl VolatileIo {
    /// Create an accessor for mappings made by the real address mapper
    ///
    /// # Safety
    /// Every `base` passed to the accessor must be a live mapping of at
    /// least `offset + 2` bytes of device memory.
    pub const unsafe fn new(swapped: bool) -> Self {
        Self { swapped }
    }
}

impl RegisterIo for VolatileIo {
    fn read_u16(&self, base: VirtAddr, offset: usize) -> u16 {
        // SAFETY: guaranteed by the contract of `VolatileIo::new`
        let raw = unsafe { core::ptr::read_volatile(base.as_ptr().add(offset) as *const u16) };
        if self.swapped {
            raw.swap_bytes()
        } else {
            raw
        }
    }

    fn write_u16(&self, base: VirtAddr, offset: usize, value: u16) {
        let raw = if self.swapped { value.swap_bytes() } else { value };
        // SAFETY: guaranteed by the contract of `VolatileIo::new`
        unsafe { core::ptr::write_volatile(base.as_ptr().add(offset) as *mut u16, raw) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volatile_roundtrip_on_ram() {
        let mut backing = [0u16; 2];
        let base = VirtAddr::new(backing.as_mut_ptr() as usize);
        let io = unsafe { VolatileIo::new(false) };

        io.write_u16(base, 2, 0x0f);
        assert_eq!(io.read_u16(base, 2), 0x0f);
        assert_eq!(backing[1], 0x0f);
    }

    #[test]
    fn test_swapped_access() {
        let mut backing = [0u16; 1];
        let base = VirtAddr::new(backing.as_mut_ptr() as usize);
        let io = unsafe { VolatileIo::new(true) };

        io.write_u16(base, 0, 0x0010);
        assert_eq!(backing[0], 0x1000);
        assert_eq!(io.read_u16(base, 0), 0x0010);
    }
}
