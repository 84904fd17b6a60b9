//! Bus resource assignment
//!
//! Before a board handler may map a physical range it has to reserve it
//! from the bus arbiter. Reservations are made for a whole list of
//! descriptors at once and are either granted completely or not at all.

use crate::{PhysAddr, Result};

/// Bus the board (or a device) sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusType {
    Vme,
    Pci,
    /// M-Module slot on a carrier board
    MModule,
}

/// Address space class of a mapped window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrSpace {
    Mem,
    Io,
}

/// A single resource descriptor handed to the arbiter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Memory-mapped range `[phys, phys + size)`
    Mem { phys: PhysAddr, size: usize },
}

impl Resource {
    pub const fn mem(phys: PhysAddr, size: usize) -> Self {
        Resource::Mem { phys, size }
    }

    /// Physical start address of the resource
    pub const fn phys(&self) -> PhysAddr {
        match *self {
            Resource::Mem { phys, .. } => phys,
        }
    }

    /// Size of the resource in bytes
    pub const fn size(&self) -> usize {
        match *self {
            Resource::Mem { size, .. } => size,
        }
    }
}

/// Atomic reservation of physical address ranges
pub trait ResourceArbiter {
    /// Reserve all `resources` on bus `bus_nbr`
    ///
    /// # Errors
    /// Fails without reserving anything if any resource is unavailable.
    fn assign_resources(&self, bus: BusType, bus_nbr: u32, resources: &[Resource]) -> Result<()>;

    /// Release a reservation made by [`assign_resources`](Self::assign_resources)
    ///
    /// Platforms without release support keep the default, which succeeds.
    fn unassign_resources(&self, _bus: BusType, _bus_nbr: u32, _resources: &[Resource]) -> Result<()> {
        Ok(())
    }
}

impl<T: ResourceArbiter + ?Sized> ResourceArbiter for &T {
    fn assign_resources(&self, bus: BusType, bus_nbr: u32, resources: &[Resource]) -> Result<()> {
        (**self).assign_resources(bus, bus_nbr, resources)
    }

    fn unassign_resources(&self, bus: BusType, bus_nbr: u32, resources: &[Resource]) -> Result<()> {
        (**self).unassign_resources(bus, bus_nbr, resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mem_resource() {
        let res = Resource::mem(PhysAddr::new(0x1100), 4);
        assert_eq!(res.phys(), PhysAddr::new(0x1100));
        assert_eq!(res.size(), 4);
    }
}
