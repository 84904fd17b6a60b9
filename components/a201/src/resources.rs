//! Resource Acquirer - bus resource grant for the control registers
//!
//! One grant covers the control register pair of every slot. It is either
//! held completely or not at all, and is released at most once.

use alloc::vec::Vec;
use carrier_platform::{BusType, PhysAddr, PlatformError, Resource, ResourceArbiter};

use crate::layout;
use crate::{BoardError, Result};

/// Reservation of all slots' control registers
#[derive(Debug)]
pub struct ResourceGrant {
    resources: Vec<Resource>,
    bus: BusType,
    bus_nbr: u32,
    granted: bool,
}

impl ResourceGrant {
    /// Describe the control registers of `slot_count` slots at `base`
    pub fn for_slots(base: PhysAddr, slot_count: u32, bus: BusType, bus_nbr: u32) -> Result<Self> {
        let mut resources = Vec::new();
        resources
            .try_reserve_exact(slot_count as usize)
            .map_err(|_| BoardError::AllocFailed)?;
        resources.extend(layout::ctrl_resources(base, slot_count));

        Ok(Self {
            resources,
            bus,
            bus_nbr,
            granted: false,
        })
    }

    /// Request the grant from the bus arbiter
    pub fn acquire<A: ResourceArbiter + ?Sized>(&mut self, arbiter: &A) -> Result<()> {
        arbiter
            .assign_resources(self.bus, self.bus_nbr, &self.resources)
            .map_err(BoardError::ResourceAssignment)?;
        self.granted = true;
        Ok(())
    }

    /// Give the grant back, if held
    ///
    /// The grant counts as released even if the arbiter reports a failure.
    pub fn release<A: ResourceArbiter + ?Sized>(
        &mut self,
        arbiter: &A,
    ) -> core::result::Result<(), PlatformError> {
        if !core::mem::take(&mut self.granted) {
            return Ok(());
        }
        arbiter.unassign_resources(self.bus, self.bus_nbr, &self.resources)
    }

    pub fn is_granted(&self) -> bool {
        self.granted
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }
}
