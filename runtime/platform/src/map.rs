//! Address mapping and bus address translation

use crate::{AddrSpace, BusType, PhysAddr, Result, VirtAddr};

/// Physical to virtual mapping of register windows
pub trait AddressMapper {
    /// Map `[phys, phys + size)` and return the virtual address of `phys`
    fn map_phys_to_virt(
        &self,
        phys: PhysAddr,
        size: usize,
        space: AddrSpace,
        bus: BusType,
        bus_nbr: u32,
    ) -> Result<VirtAddr>;

    /// Remove a mapping created by [`map_phys_to_virt`](Self::map_phys_to_virt)
    fn unmap_virt(&self, virt: VirtAddr, size: usize, space: AddrSpace) -> Result<()>;
}

impl<T: AddressMapper + ?Sized> AddressMapper for &T {
    fn map_phys_to_virt(
        &self,
        phys: PhysAddr,
        size: usize,
        space: AddrSpace,
        bus: BusType,
        bus_nbr: u32,
    ) -> Result<VirtAddr> {
        (**self).map_phys_to_virt(phys, size, space, bus, bus_nbr)
    }

    fn unmap_virt(&self, virt: VirtAddr, size: usize, space: AddrSpace) -> Result<()> {
        (**self).unmap_virt(virt, size, space)
    }
}

/// Bus address window class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusSpace {
    /// 24-bit addressed window
    A24,
    /// 16-bit addressed window
    A16,
}

/// Maximum data width of accesses through a translated window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataWidth {
    D16,
    D32,
}

/// Opaque handle of a bus window the platform opened for a translation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHandle(pub u64);

/// Result of a bus address translation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusWindow {
    /// Physical (local view) address of the bus address
    pub phys: PhysAddr,
    /// Set when the platform had to open a window that must be released
    pub handle: Option<WindowHandle>,
}

/// Bus address to physical address translation
pub trait BusTranslator {
    /// Translate `size` bytes at bus address `addr` in `space`
    fn bus_to_phys(
        &self,
        bus: BusType,
        addr: u64,
        space: BusSpace,
        width: DataWidth,
        size: usize,
    ) -> Result<BusWindow>;

    /// Close a window returned in [`BusWindow::handle`]
    fn release_window(&self, _handle: WindowHandle) -> Result<()> {
        Ok(())
    }
}

impl<T: BusTranslator + ?Sized> BusTranslator for &T {
    fn bus_to_phys(
        &self,
        bus: BusType,
        addr: u64,
        space: BusSpace,
        width: DataWidth,
        size: usize,
    ) -> Result<BusWindow> {
        (**self).bus_to_phys(bus, addr, space, width, size)
    }

    fn release_window(&self, handle: WindowHandle) -> Result<()> {
        (**self).release_window(handle)
    }
}
