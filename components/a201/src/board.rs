//! Board Handle - construction and teardown
//!
//! # Lifecycle
//! `init` acquires, in order: the bus translation window (bus address
//! sources only), the resource grant and the control register mapping of
//! every slot. The per-slot configuration is read after the translation,
//! so a malformed array also releases the window. Each acquisition is
//! recorded in a staging guard as soon as it succeeds; if a later step
//! fails the guard releases what it holds in reverse order, so no partially
//! built handle ever escapes.
//!
//! Teardown releases the same resources in the same reverse order. Every
//! resource is cleared as it is released, which makes teardown idempotent:
//! [`Board::exit`] runs it, and `Drop` running it again is a no-op.

use alloc::boxed::Box;
use alloc::vec::Vec;
use carrier_platform::{BusType, Descriptor, PhysAddr, Platform, VirtAddr, WindowHandle};

use crate::config::{AddressSource, BaseConfig, SlotConfig, SlotTable};
use crate::debug::{DebugCtx, DebugLevel, DebugSink, LogSink};
use crate::info::IdentTable;
use crate::layout::BOARD_SIZE;
use crate::mapping::MappingTable;
use crate::resources::ResourceGrant;
use crate::variant::Variant;
use crate::{BoardError, Result};

/// Construction options that do not come from the descriptor
pub struct BoardOptions {
    /// Destination of this handle's debug output
    pub sink: Box<dyn DebugSink>,
}

impl Default for BoardOptions {
    fn default() -> Self {
        Self {
            sink: Box::new(LogSink),
        }
    }
}

/// Everything the handle acquired and must give back
#[derive(Default)]
struct Resources {
    window: Option<WindowHandle>,
    grant: Option<ResourceGrant>,
    ctrl: MappingTable,
}

impl Resources {
    fn new(slot_count: u32) -> Result<Self> {
        Ok(Self {
            window: None,
            grant: None,
            ctrl: MappingTable::with_slots(slot_count)?,
        })
    }

    /// Release in reverse order of acquisition, logging failures
    fn release<P: Platform + ?Sized>(&mut self, platform: &P, dbg: &DebugCtx) {
        if let Err(e) = self.ctrl.unmap_all(platform) {
            dbg.err(format_args!("*** exit: unmapping control registers failed: {}", e));
        }

        if let Some(grant) = self.grant.as_mut() {
            if let Err(e) = grant.release(platform) {
                dbg.err(format_args!("*** exit: releasing resources failed: {}", e));
            }
        }

        if let Some(handle) = self.window.take() {
            if let Err(e) = platform.release_window(handle) {
                dbg.err(format_args!("*** exit: releasing bus window failed: {}", e));
            }
        }
    }
}

/// Acquisitions of an `init` in progress, released on drop unless committed
struct Staged<'a, P: Platform> {
    platform: &'a P,
    dbg: &'a DebugCtx,
    res: Resources,
}

impl<'a, P: Platform> Staged<'a, P> {
    fn new(platform: &'a P, dbg: &'a DebugCtx, slot_count: u32) -> Result<Self> {
        Ok(Self {
            platform,
            dbg,
            res: Resources::new(slot_count)?,
        })
    }

    /// Physical base of the board window
    fn resolve_base(&mut self, address: AddressSource, bus: BusType) -> Result<PhysAddr> {
        let (addr, space, width) = match address {
            AddressSource::Physical(phys) => return Ok(phys),
            AddressSource::Bus { addr, space, width } => (addr, space, width),
        };

        let window = self
            .platform
            .bus_to_phys(bus, u64::from(addr), space, width, BOARD_SIZE)
            .map_err(|e| {
                self.dbg
                    .err(format_args!("*** init: bus address translation failed: {}", e));
                BoardError::Translation(e)
            })?;

        self.res.window = window.handle;
        Ok(window.phys)
    }

    fn acquire_grant(
        &mut self,
        base: PhysAddr,
        slot_count: u32,
        bus: BusType,
        bus_nbr: u32,
    ) -> Result<()> {
        let mut grant = ResourceGrant::for_slots(base, slot_count, bus, bus_nbr)?;
        grant.acquire(self.platform).inspect_err(|e| {
            self.dbg.err(format_args!("*** init: {}", e));
        })?;
        self.res.grant = Some(grant);
        Ok(())
    }

    fn map_slots(&mut self, base: PhysAddr, bus: BusType, bus_nbr: u32) -> Result<()> {
        let dbg = self.dbg;

        self.res
            .ctrl
            .map_all(self.platform, base, bus, bus_nbr)
            .inspect_err(|e| dbg.err(format_args!("*** init: {}", e)))?;

        for (slot, virt) in self.res.ctrl.iter() {
            dbg.lev2(format_args!("   slot {} mapped to {}", slot, virt));
        }
        Ok(())
    }

    /// Hand the acquisitions over to the board
    fn commit(mut self) -> Resources {
        core::mem::take(&mut self.res)
    }
}

impl<P: Platform> Drop for Staged<'_, P> {
    fn drop(&mut self) {
        // Empty after `commit`
        self.res.release(self.platform, self.dbg);
    }
}

/// One carrier board instance
pub struct Board<P: Platform> {
    platform: P,
    variant: Variant,
    base: PhysAddr,
    bus_nbr: u32,
    pub(crate) slots: Vec<SlotConfig>,
    res: Resources,
    pub(crate) dbg: DebugCtx,
    pub(crate) ident: IdentTable,
}

impl<P: Platform> Board<P> {
    /// Build a handle for a `variant` board configured by `desc`
    ///
    /// # Errors
    /// Any configuration, translation, resource assignment or mapping
    /// error. Everything acquired before the failure has been released
    /// when this returns.
    pub fn init<D: Descriptor + ?Sized>(
        platform: P,
        desc: &mut D,
        variant: Variant,
        options: BoardOptions,
    ) -> Result<Self> {
        let mut dbg = DebugCtx::new(variant.name(), options.sink);

        let cfg = BaseConfig::from_descriptor(desc).inspect_err(|e| {
            dbg.err(format_args!("*** init: {}", e));
        })?;
        dbg.set_level(cfg.debug_level);
        dbg.lev1(format_args!("init"));

        let slot_count = variant.slot_count();
        let bus = variant.bus_type();

        let (base, table, res) = {
            let mut staged = Staged::new(&platform, &dbg, slot_count)?;
            let base = staged.resolve_base(cfg.address, bus)?;
            let table = SlotTable::from_descriptor(&*desc, variant).inspect_err(|e| {
                dbg.err(format_args!("*** init: {}", e));
            })?;
            staged.acquire_grant(base, slot_count, bus, table.bus_nbr)?;
            staged.map_slots(base, bus, table.bus_nbr)?;
            (base, table, staged.commit())
        };

        dbg.lev2(format_args!("   base {} bus {}", base, table.bus_nbr));

        let ident = IdentTable::new(variant.model.ident(), desc.ident(), platform.ident());

        Ok(Self {
            platform,
            variant,
            base,
            bus_nbr: table.bus_nbr,
            slots: table.slots,
            res,
            dbg,
            ident,
        })
    }

    /// Tear the handle down
    pub fn exit(mut self) {
        self.dbg.lev1(format_args!("exit"));
        self.teardown();
    }

    fn teardown(&mut self) {
        self.res.release(&self.platform, &self.dbg);
    }

    /// Board-wide initialization; the carrier has nothing to set up
    pub fn brd_init(&mut self) -> Result<()> {
        self.dbg.lev1(format_args!("brd_init"));
        Ok(())
    }

    /// Board-wide deinitialization; the carrier has nothing to shut down
    pub fn brd_exit(&mut self) -> Result<()> {
        self.dbg.lev1(format_args!("brd_exit"));
        Ok(())
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn slot_count(&self) -> u32 {
        self.variant.slot_count()
    }

    /// Physical base of the board window
    pub fn base(&self) -> PhysAddr {
        self.base
    }

    pub fn bus_nbr(&self) -> u32 {
        self.bus_nbr
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn debug_level(&self) -> DebugLevel {
        self.dbg.level()
    }

    /// Whether the resource grant is held
    pub fn is_granted(&self) -> bool {
        self.res.grant.as_ref().is_some_and(ResourceGrant::is_granted)
    }

    /// Whether `slot`'s control registers are mapped
    pub fn is_mapped(&self, slot: u32) -> bool {
        self.res.ctrl.is_mapped(slot)
    }

    /// Configuration of `slot`, if it exists
    pub fn slot_config(&self, slot: u32) -> Option<&SlotConfig> {
        self.slots.get(slot as usize)
    }

    pub(crate) fn check_slot(&self, slot: u32) -> Result<()> {
        if slot >= self.slot_count() {
            self.dbg.err(format_args!("*** illegal slot {}", slot));
            return Err(BoardError::IllegalSlot {
                slot,
                count: self.slot_count(),
            });
        }
        Ok(())
    }

    /// Virtual address of `slot`'s control register pair
    pub(crate) fn ctrl(&self, slot: u32) -> Result<VirtAddr> {
        self.res.ctrl.get(slot).ok_or(BoardError::NotMapped { slot })
    }

    pub(crate) fn slot(&self, slot: u32) -> Result<&SlotConfig> {
        self.check_slot(slot)?;
        self.slots.get(slot as usize).ok_or(BoardError::IllegalSlot {
            slot,
            count: self.slot_count(),
        })
    }
}

impl<P: Platform> Drop for Board<P> {
    fn drop(&mut self) {
        self.teardown();
    }
}
