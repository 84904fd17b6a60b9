//! Mock carrier platform for development and testing
//!
//! Implements every trait of `carrier-platform` on top of an in-memory
//! register file. All calls are recorded so tests can assert on the exact
//! sequence of grants, mappings and register writes, and each kind of
//! platform call can be made to fail on demand.
//!
//! Registers are keyed by *physical* address, so their contents survive
//! unmapping and can be inspected after a board handle is gone.

#![no_std]

extern crate alloc;

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::cell::RefCell;

use carrier_platform::{
    AddrSpace, AddressMapper, BusSpace, BusTranslator, BusType, BusWindow, DataWidth, DeviceName,
    ModuleIdReader, ModuleInfo, ModuleKind, PhysAddr, Platform, PlatformError, RegisterIo,
    Resource, ResourceArbiter, Result, VirtAddr, WindowHandle,
};

/// Page size used for virtual address allocation
pub const PAGE_SIZE: usize = 4096;

/// First virtual address handed out by the mock mapper
pub const MOCK_VADDR_BASE: usize = 0x8000_0000;

/// Physical base the mock translates A24 bus addresses to
pub const MOCK_A24_BASE: u64 = 0xE000_0000;

/// Physical base the mock translates A16 bus addresses to
pub const MOCK_A16_BASE: u64 = 0xE100_0000;

/// A recorded platform call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Assign { bus: BusType, bus_nbr: u32, resources: Vec<Resource> },
    Unassign { bus: BusType, bus_nbr: u32, resources: Vec<Resource> },
    Map { phys: PhysAddr, size: usize, bus: BusType, bus_nbr: u32 },
    Unmap { virt: VirtAddr, size: usize },
    Translate { addr: u64, space: BusSpace, width: DataWidth },
    ReleaseWindow(WindowHandle),
    Read { phys: PhysAddr },
    Write { phys: PhysAddr, value: u16 },
    ReadModuleInfo { phys: PhysAddr },
}

impl Call {
    pub fn is_map(&self) -> bool {
        matches!(self, Call::Map { .. })
    }

    pub fn is_unmap(&self) -> bool {
        matches!(self, Call::Unmap { .. })
    }

    pub fn is_register_access(&self) -> bool {
        matches!(self, Call::Read { .. } | Call::Write { .. })
    }
}

#[derive(Debug, Clone, Copy)]
struct Mapping {
    phys: PhysAddr,
    size: usize,
}

#[derive(Debug, Default)]
struct Faults {
    assign: Option<PlatformError>,
    /// Zero-based index of the map call that fails
    map_call: Option<usize>,
    map_phys: Option<PhysAddr>,
    unmap: Option<PlatformError>,
    translate: Option<PlatformError>,
}

#[derive(Debug)]
struct MockState {
    calls: Vec<Call>,
    registers: BTreeMap<u64, u16>,
    mappings: BTreeMap<usize, Mapping>,
    modules: BTreeMap<u64, ModuleInfo>,
    next_vaddr: usize,
    map_calls: usize,
    next_window: u64,
    open_windows: bool,
    stray_writes: usize,
    faults: Faults,
}

/// Recording, failure-injecting platform
#[derive(Debug)]
pub struct MockPlatform {
    state: RefCell<MockState>,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(MockState {
                calls: Vec::new(),
                registers: BTreeMap::new(),
                mappings: BTreeMap::new(),
                modules: BTreeMap::new(),
                next_vaddr: MOCK_VADDR_BASE,
                map_calls: 0,
                next_window: 1,
                open_windows: false,
                stray_writes: 0,
                faults: Faults::default(),
            }),
        }
    }

    /// Make bus translations open a window that has to be released
    pub fn with_bus_windows(self) -> Self {
        self.state.borrow_mut().open_windows = true;
        self
    }

    /// Fail the next resource assignment with `err`
    pub fn fail_assign(&self, err: PlatformError) {
        self.state.borrow_mut().faults.assign = Some(err);
    }

    /// Fail the `n`-th (zero-based) call to `map_phys_to_virt`
    pub fn fail_map_call(&self, n: usize) {
        self.state.borrow_mut().faults.map_call = Some(n);
    }

    /// Fail every mapping request starting at `phys`
    pub fn fail_map_at(&self, phys: PhysAddr) {
        self.state.borrow_mut().faults.map_phys = Some(phys);
    }

    /// Fail every unmap request with `err`
    pub fn fail_unmap(&self, err: PlatformError) {
        self.state.borrow_mut().faults.unmap = Some(err);
    }

    /// Fail every bus translation with `err`
    pub fn fail_translate(&self, err: PlatformError) {
        self.state.borrow_mut().faults.translate = Some(err);
    }

    /// Make the window at `phys` carry an identification header
    pub fn plug_module(&self, phys: PhysAddr, kind: ModuleKind, dev_id: u32, dev_rev: u32, name: &str) {
        let mut dev_name = DeviceName::new();
        // Names longer than the header allows are cut, as real hardware would
        for c in name.chars() {
            if dev_name.push(c).is_err() {
                break;
            }
        }

        self.state.borrow_mut().modules.insert(
            phys.as_u64(),
            ModuleInfo {
                kind,
                dev_id,
                dev_rev,
                name: dev_name,
            },
        );
    }

    /// Preload a register value at a physical address
    pub fn poke(&self, phys: PhysAddr, value: u16) {
        self.state.borrow_mut().registers.insert(phys.as_u64(), value);
    }

    /// Current register value at a physical address
    pub fn register_at(&self, phys: PhysAddr) -> Option<u16> {
        self.state.borrow().registers.get(&phys.as_u64()).copied()
    }

    /// Snapshot of all recorded calls
    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.state.borrow().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn map_count(&self) -> usize {
        self.count(Call::is_map)
    }

    pub fn unmap_count(&self) -> usize {
        self.count(Call::is_unmap)
    }

    pub fn assign_count(&self) -> usize {
        self.count(|c| matches!(c, Call::Assign { .. }))
    }

    pub fn unassign_count(&self) -> usize {
        self.count(|c| matches!(c, Call::Unassign { .. }))
    }

    pub fn register_access_count(&self) -> usize {
        self.count(Call::is_register_access)
    }

    /// Number of mappings that are still live
    pub fn live_mappings(&self) -> usize {
        self.state.borrow().mappings.len()
    }

    /// Virtual address of the live mapping of `phys`, if any
    pub fn mapping_of(&self, phys: PhysAddr) -> Option<VirtAddr> {
        self.state
            .borrow()
            .mappings
            .iter()
            .find(|(_, m)| m.phys == phys)
            .map(|(virt, _)| VirtAddr::new(*virt))
    }

    /// Writes that went to an address with no live mapping
    pub fn stray_writes(&self) -> usize {
        self.state.borrow().stray_writes
    }

    fn record(&self, call: Call) {
        self.state.borrow_mut().calls.push(call);
    }
}

impl MockState {
    /// Physical address behind `base + offset`, if it is mapped
    fn resolve(&self, base: VirtAddr, offset: usize) -> Option<PhysAddr> {
        let addr = base.as_usize() + offset;
        self.mappings
            .range(..=addr)
            .next_back()
            .filter(|(virt, m)| addr < *virt + m.size)
            .map(|(virt, m)| m.phys + (addr - virt) as u64)
    }
}

impl ResourceArbiter for MockPlatform {
    fn assign_resources(&self, bus: BusType, bus_nbr: u32, resources: &[Resource]) -> Result<()> {
        self.record(Call::Assign {
            bus,
            bus_nbr,
            resources: resources.to_vec(),
        });

        match self.state.borrow_mut().faults.assign.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn unassign_resources(&self, bus: BusType, bus_nbr: u32, resources: &[Resource]) -> Result<()> {
        self.record(Call::Unassign {
            bus,
            bus_nbr,
            resources: resources.to_vec(),
        });
        Ok(())
    }
}

impl AddressMapper for MockPlatform {
    fn map_phys_to_virt(
        &self,
        phys: PhysAddr,
        size: usize,
        _space: AddrSpace,
        bus: BusType,
        bus_nbr: u32,
    ) -> Result<VirtAddr> {
        self.record(Call::Map {
            phys,
            size,
            bus,
            bus_nbr,
        });

        let mut state = self.state.borrow_mut();
        let call = state.map_calls;
        state.map_calls += 1;

        if state.faults.map_call == Some(call) || state.faults.map_phys == Some(phys) {
            return Err(PlatformError::MapFailed { addr: phys, size });
        }

        // Keep the offset within the page, like a real page mapper
        let start_offset = phys.as_u64() as usize % PAGE_SIZE;
        let aligned_size = pages_needed(size + start_offset) * PAGE_SIZE;

        let virt = state.next_vaddr + start_offset;
        state.next_vaddr += aligned_size;
        state.mappings.insert(virt, Mapping { phys, size });

        Ok(VirtAddr::new(virt))
    }

    fn unmap_virt(&self, virt: VirtAddr, size: usize, _space: AddrSpace) -> Result<()> {
        self.record(Call::Unmap { virt, size });

        let mut state = self.state.borrow_mut();
        if let Some(err) = state.faults.unmap.clone() {
            return Err(err);
        }

        state
            .mappings
            .remove(&virt.as_usize())
            .map(|_| ())
            .ok_or(PlatformError::NotMapped { addr: virt })
    }
}

impl BusTranslator for MockPlatform {
    fn bus_to_phys(
        &self,
        _bus: BusType,
        addr: u64,
        space: BusSpace,
        width: DataWidth,
        _size: usize,
    ) -> Result<BusWindow> {
        self.record(Call::Translate { addr, space, width });

        let mut state = self.state.borrow_mut();
        if let Some(err) = state.faults.translate.clone() {
            return Err(err);
        }

        let base = match space {
            BusSpace::A24 => MOCK_A24_BASE,
            BusSpace::A16 => MOCK_A16_BASE,
        };

        let handle = if state.open_windows {
            let handle = WindowHandle(state.next_window);
            state.next_window += 1;
            Some(handle)
        } else {
            None
        };

        Ok(BusWindow {
            phys: PhysAddr::new(base + addr),
            handle,
        })
    }

    fn release_window(&self, handle: WindowHandle) -> Result<()> {
        self.record(Call::ReleaseWindow(handle));
        Ok(())
    }
}

impl RegisterIo for MockPlatform {
    fn read_u16(&self, base: VirtAddr, offset: usize) -> u16 {
        let phys = self.state.borrow().resolve(base, offset);
        match phys {
            Some(phys) => {
                self.record(Call::Read { phys });
                self.register_at(phys).unwrap_or(0xffff)
            }
            // Bus error on real hardware; reads float high
            None => 0xffff,
        }
    }

    fn write_u16(&self, base: VirtAddr, offset: usize, value: u16) {
        let phys = self.state.borrow().resolve(base, offset);
        match phys {
            Some(phys) => {
                self.record(Call::Write { phys, value });
                self.poke(phys, value);
            }
            None => self.state.borrow_mut().stray_writes += 1,
        }
    }
}

impl ModuleIdReader for MockPlatform {
    fn read_module_info(&self, window: VirtAddr) -> ModuleInfo {
        let phys = self.state.borrow().resolve(window, 0);
        let Some(phys) = phys else {
            return empty_header();
        };

        self.record(Call::ReadModuleInfo { phys });
        self.state
            .borrow()
            .modules
            .get(&phys.as_u64())
            .cloned()
            .unwrap_or_else(empty_header)
    }
}

impl Platform for MockPlatform {
    fn ident(&self) -> &'static str {
        concat!("MockPlatform ", env!("CARGO_PKG_VERSION"))
    }
}

/// What the header decoder yields for an empty slot (all bits floating)
fn empty_header() -> ModuleInfo {
    ModuleInfo {
        kind: ModuleKind::Unknown,
        dev_id: 0xffff_ffff,
        dev_rev: 0xffff_ffff,
        name: DeviceName::new(),
    }
}

/// Number of pages needed to cover `size` bytes
pub fn pages_needed(size: usize) -> usize {
    (size + PAGE_SIZE - 1) / PAGE_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pages_needed() {
        assert_eq!(pages_needed(4096), 1);
        assert_eq!(pages_needed(4097), 2);
        assert_eq!(pages_needed(4), 1);
    }

    #[test]
    fn test_map_preserves_page_offset() {
        let mock = MockPlatform::new();
        let virt = mock
            .map_phys_to_virt(PhysAddr::new(0xE000_0100), 4, AddrSpace::Mem, BusType::Vme, 0)
            .unwrap();

        assert_eq!(virt.as_usize() % PAGE_SIZE, 0x100);
        assert_eq!(mock.mapping_of(PhysAddr::new(0xE000_0100)), Some(virt));
        assert_eq!(mock.live_mappings(), 1);
    }

    #[test]
    fn test_register_file_is_physical() {
        let mock = MockPlatform::new();
        let phys = PhysAddr::new(0xE000_0300);
        let virt = mock
            .map_phys_to_virt(phys, 4, AddrSpace::Mem, BusType::Vme, 0)
            .unwrap();

        mock.write_u16(virt, 2, 0x0f);
        assert_eq!(mock.read_u16(virt, 2), 0x0f);

        mock.unmap_virt(virt, 4, AddrSpace::Mem).unwrap();
        assert_eq!(mock.register_at(phys + 2), Some(0x0f));

        // No mapping left: write goes nowhere
        mock.write_u16(virt, 2, 0x10);
        assert_eq!(mock.stray_writes(), 1);
        assert_eq!(mock.register_at(phys + 2), Some(0x0f));
    }

    #[test]
    fn test_map_fault_injection() {
        let mock = MockPlatform::new();
        mock.fail_map_call(1);

        assert!(mock
            .map_phys_to_virt(PhysAddr::new(0x1000), 4, AddrSpace::Mem, BusType::Vme, 0)
            .is_ok());
        assert!(matches!(
            mock.map_phys_to_virt(PhysAddr::new(0x2000), 4, AddrSpace::Mem, BusType::Vme, 0),
            Err(PlatformError::MapFailed { .. })
        ));
        assert_eq!(mock.map_count(), 2);
        assert_eq!(mock.live_mappings(), 1);
    }

    #[test]
    fn test_unmap_unknown_address() {
        let mock = MockPlatform::new();
        let result = mock.unmap_virt(VirtAddr::new(0x1234), 4, AddrSpace::Mem);
        assert!(matches!(result, Err(PlatformError::NotMapped { .. })));
    }

    #[test]
    fn test_translation_windows() {
        let mock = MockPlatform::new().with_bus_windows();
        let window = mock
            .bus_to_phys(BusType::Vme, 0x4000, BusSpace::A16, DataWidth::D16, 0x800)
            .unwrap();

        assert_eq!(window.phys, PhysAddr::new(MOCK_A16_BASE + 0x4000));
        assert_eq!(window.handle, Some(WindowHandle(1)));
    }

    #[test]
    fn test_module_header() {
        let mock = MockPlatform::new();
        let phys = PhysAddr::new(0xE000_0000);
        mock.plug_module(phys, ModuleKind::Vendor, 0x5346_0022, 0x0109_1400, "M34");

        let virt = mock
            .map_phys_to_virt(phys, 0x100, AddrSpace::Mem, BusType::Vme, 0)
            .unwrap();
        let info = mock.read_module_info(virt);

        assert_eq!(info.kind, ModuleKind::Vendor);
        assert_eq!(info.dev_id, 0x5346_0022);
        assert_eq!(info.name.as_str(), "M34");
    }
}
