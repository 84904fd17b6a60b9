//! Mapping Table - per-slot control register mappings
//!
//! Entry `i` is `Some` exactly while slot `i`'s control register pair is
//! mapped. A failed [`map_all`](MappingTable::map_all) leaves the slots
//! mapped so far in place, and [`unmap_all`](MappingTable::unmap_all)
//! removes only those.

use alloc::vec::Vec;
use carrier_platform::{AddrSpace, AddressMapper, BusType, PhysAddr, PlatformError, VirtAddr};

use crate::layout::{self, CTRL_REG_SIZE};
use crate::{BoardError, Result};

#[derive(Debug, Default)]
pub struct MappingTable {
    entries: Vec<Option<VirtAddr>>,
}

impl MappingTable {
    /// Table of `slot_count` unmapped entries
    pub fn with_slots(slot_count: u32) -> Result<Self> {
        let mut entries = Vec::new();
        entries
            .try_reserve_exact(slot_count as usize)
            .map_err(|_| BoardError::AllocFailed)?;
        entries.resize(slot_count as usize, None);
        Ok(Self { entries })
    }

    /// Map the control registers of all slots in ascending order
    ///
    /// # Errors
    /// `Mapping` with the first slot that could not be mapped; lower slots
    /// stay mapped.
    pub fn map_all<M: AddressMapper + ?Sized>(
        &mut self,
        mapper: &M,
        base: PhysAddr,
        bus: BusType,
        bus_nbr: u32,
    ) -> Result<()> {
        for (slot, entry) in (0u32..).zip(self.entries.iter_mut()) {
            let phys = layout::ctrl_reg_addr(base, slot);
            let virt = mapper
                .map_phys_to_virt(phys, CTRL_REG_SIZE, AddrSpace::Mem, bus, bus_nbr)
                .map_err(|source| BoardError::Mapping { slot, source })?;
            *entry = Some(virt);
        }
        Ok(())
    }

    /// Unmap every mapped slot, highest first
    ///
    /// Always walks the whole table. Returns the first failure.
    pub fn unmap_all<M: AddressMapper + ?Sized>(
        &mut self,
        mapper: &M,
    ) -> core::result::Result<(), PlatformError> {
        let mut first_err = None;

        for entry in self.entries.iter_mut().rev() {
            let Some(virt) = entry.take() else {
                continue;
            };
            if let Err(e) = mapper.unmap_virt(virt, CTRL_REG_SIZE, AddrSpace::Mem) {
                first_err.get_or_insert(e);
            }
        }

        first_err.map_or(Ok(()), Err)
    }

    /// Virtual address of `slot`'s control registers
    pub fn get(&self, slot: u32) -> Option<VirtAddr> {
        self.entries.get(slot as usize).copied().flatten()
    }

    pub fn is_mapped(&self, slot: u32) -> bool {
        self.get(slot).is_some()
    }

    /// Mapped slots with their virtual addresses
    pub fn iter(&self) -> impl Iterator<Item = (u32, VirtAddr)> + '_ {
        (0u32..)
            .zip(self.entries.iter())
            .filter_map(|(slot, entry)| entry.map(|virt| (slot, virt)))
    }

    pub fn mapped_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carrier_platform_mock::{Call, MockPlatform};

    const BASE: PhysAddr = PhysAddr::new(0x0040_0000);

    #[test]
    fn test_map_unmap_all() {
        let platform = MockPlatform::new();
        let mut table = MappingTable::with_slots(4).unwrap();
        assert_eq!(table.mapped_count(), 0);

        table.map_all(&platform, BASE, BusType::Vme, 0).unwrap();
        assert_eq!(table.mapped_count(), 4);
        assert_eq!(
            platform.mapping_of(layout::ctrl_reg_addr(BASE, 3)),
            table.get(3)
        );

        table.unmap_all(&platform).unwrap();
        assert_eq!(table.mapped_count(), 0);
        assert_eq!(platform.live_mappings(), 0);

        // Nothing left to unmap
        platform.clear_calls();
        table.unmap_all(&platform).unwrap();
        assert!(platform.calls().is_empty());
    }

    #[test]
    fn test_partial_map() {
        let platform = MockPlatform::new();
        platform.fail_map_call(2);

        let mut table = MappingTable::with_slots(4).unwrap();
        let err = table.map_all(&platform, BASE, BusType::Vme, 0).unwrap_err();
        assert!(matches!(err, BoardError::Mapping { slot: 2, .. }));
        assert!(table.is_mapped(0) && table.is_mapped(1));
        assert!(!table.is_mapped(2) && !table.is_mapped(3));

        platform.clear_calls();
        table.unmap_all(&platform).unwrap();
        assert_eq!(platform.unmap_count(), 2);
    }

    #[test]
    fn test_unmap_failure_still_clears() {
        let platform = MockPlatform::new();
        let mut table = MappingTable::with_slots(2).unwrap();
        table.map_all(&platform, BASE, BusType::Vme, 0).unwrap();

        platform.fail_unmap(PlatformError::Os(0x13));
        assert_eq!(table.unmap_all(&platform), Err(PlatformError::Os(0x13)));
        assert_eq!(platform.count(Call::is_unmap), 2);
        assert_eq!(table.mapped_count(), 0);
    }

    #[test]
    fn test_out_of_range_slot() {
        let table = MappingTable::with_slots(1).unwrap();
        assert_eq!(table.get(5), None);
    }
}
