//! Board configuration from the descriptor
//!
//! All descriptor access happens here, once, at handle construction. The
//! board-wide part ([`BaseConfig`]) is read before the base address is
//! resolved, the per-slot part ([`SlotTable`]) after it. The rest of the
//! handler only sees the typed results.

use alloc::vec::Vec;
use carrier_platform::{BusSpace, DataWidth, DescResultExt, Descriptor, PhysAddr};

use crate::debug::DebugLevel;
use crate::variant::{HostBridge, Variant, MAX_SLOTS};
use crate::{BoardError, Result};

pub(crate) const DEBUG_LEVEL_DESC: &str = "DEBUG_LEVEL_DESC";
pub(crate) const DEBUG_LEVEL: &str = "DEBUG_LEVEL";
pub(crate) const PHYS_ADDR: &str = "PHYS_ADDR";
pub(crate) const VME_A24_ADDR: &str = "VME_A24_ADDR";
pub(crate) const VME_A16_ADDR: &str = "VME_A16_ADDR";
pub(crate) const VME_DATA_WIDTH: &str = "VME_DATA_WIDTH";
pub(crate) const IRQ_VECTOR: &str = "IRQ_VECTOR";
pub(crate) const IRQ_LEVEL: &str = "IRQ_LEVEL";
pub(crate) const IRQ_PRIORITY: &str = "IRQ_PRIORITY";
pub(crate) const PNP_FORCE_FOUND: &str = "PNP_FORCE_FOUND";
pub(crate) const WIN_BUSNBR: &str = "WIN_BUSNBR";
pub(crate) const WIN_IRQ: &str = "WIN_IRQ";

/// Where the board's register window lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressSource {
    /// Physical address, used as is
    Physical(PhysAddr),
    /// Bus address that has to be translated
    Bus {
        addr: u32,
        space: BusSpace,
        width: DataWidth,
    },
}

/// Per-slot settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlotConfig {
    pub irq_vector: u8,
    pub irq_level: u8,
    pub irq_priority: u8,
    /// Report the slot as occupied without probing
    pub force_found: bool,
    /// Interrupt routed through the PCI-to-VME bridge, zero on native VME
    pub win_irq: u8,
}

/// Board-wide settings, read before anything is acquired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseConfig {
    pub debug_level: DebugLevel,
    pub address: AddressSource,
}

impl BaseConfig {
    /// Read the debug levels and the address source from `desc`
    ///
    /// # Errors
    /// - `NoAddress` if none of the address keys is set
    /// - `IllegalDataWidth` for an unsupported `VME_DATA_WIDTH`
    /// - `Descriptor` for a missing data width or a malformed value
    pub fn from_descriptor<D: Descriptor + ?Sized>(desc: &mut D) -> Result<Self> {
        let desc_level = desc.get_u32(DEBUG_LEVEL_DESC).or_default_on_missing(0)?;
        desc.set_debug_level(desc_level);

        let debug_level =
            DebugLevel::from_bits_retain(desc.get_u32(DEBUG_LEVEL).or_default_on_missing(0)?);

        Ok(Self {
            debug_level,
            address: read_address(desc)?,
        })
    }
}

/// Per-slot settings and the bus number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotTable {
    pub bus_nbr: u32,
    pub slots: Vec<SlotConfig>,
}

impl SlotTable {
    /// Read the per-slot arrays of a `variant` board from `desc`
    ///
    /// # Errors
    /// - `Descriptor` for a missing required key or a malformed value
    /// - `ShortArray` if a per-slot array has fewer than slot-count entries
    pub fn from_descriptor<D: Descriptor + ?Sized>(desc: &D, variant: Variant) -> Result<Self> {
        let count = variant.slot_count() as usize;

        let mut vector = [0u8; MAX_SLOTS];
        let mut level = [0u8; MAX_SLOTS];
        let mut priority = [0u8; MAX_SLOTS];
        let mut force = [0u8; MAX_SLOTS];
        let mut win_irq = [0u8; MAX_SLOTS];

        read_array(desc, IRQ_VECTOR, &mut vector[..count])?;
        read_array(desc, IRQ_LEVEL, &mut level[..count])?;
        read_optional_array(desc, IRQ_PRIORITY, &mut priority[..count])?;
        read_optional_array(desc, PNP_FORCE_FOUND, &mut force[..count])?;

        let bus_nbr = match variant.bridge {
            HostBridge::Vme => 0,
            HostBridge::PciToVme => {
                let bus_nbr = desc.get_u32(WIN_BUSNBR)?;
                read_array(desc, WIN_IRQ, &mut win_irq[..count])?;
                bus_nbr
            }
        };

        let mut slots = Vec::new();
        slots
            .try_reserve_exact(count)
            .map_err(|_| BoardError::AllocFailed)?;
        slots.extend((0..count).map(|i| SlotConfig {
            irq_vector: vector[i],
            irq_level: level[i],
            irq_priority: priority[i],
            force_found: force[i] != 0,
            win_irq: win_irq[i],
        }));

        Ok(Self { bus_nbr, slots })
    }
}

/// Complete board configuration
///
/// [`Board::init`](crate::Board::init) reads the two halves separately,
/// translating the bus address in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardConfig {
    pub debug_level: DebugLevel,
    pub address: AddressSource,
    pub bus_nbr: u32,
    pub slots: Vec<SlotConfig>,
}

impl BoardConfig {
    /// Read the configuration of a `variant` board from `desc`
    ///
    /// # Errors
    /// See [`BaseConfig::from_descriptor`] and [`SlotTable::from_descriptor`].
    pub fn from_descriptor<D: Descriptor + ?Sized>(desc: &mut D, variant: Variant) -> Result<Self> {
        let base = BaseConfig::from_descriptor(desc)?;
        let table = SlotTable::from_descriptor(&*desc, variant)?;

        Ok(Self {
            debug_level: base.debug_level,
            address: base.address,
            bus_nbr: table.bus_nbr,
            slots: table.slots,
        })
    }
}

/// Address source, `PHYS_ADDR` before `VME_A24_ADDR` before `VME_A16_ADDR`
///
/// `VME_DATA_WIDTH` is required as soon as a bus address is set, even if
/// `PHYS_ADDR` takes precedence.
fn read_address<D: Descriptor + ?Sized>(desc: &D) -> Result<AddressSource> {
    let phys = nonzero(desc, PHYS_ADDR)?;
    let a24 = nonzero(desc, VME_A24_ADDR)?;
    let a16 = nonzero(desc, VME_A16_ADDR)?;

    let width = if a24.is_some() || a16.is_some() {
        Some(desc.get_u32(VME_DATA_WIDTH)?)
    } else {
        None
    };

    if let Some(phys) = phys {
        return Ok(AddressSource::Physical(PhysAddr::new(u64::from(phys))));
    }

    let (addr, space) = match (a24, a16) {
        (Some(addr), _) => (addr, BusSpace::A24),
        (None, Some(addr)) => (addr, BusSpace::A16),
        (None, None) => return Err(BoardError::NoAddress),
    };

    let width = match width.unwrap_or_default() {
        1 => DataWidth::D16,
        3 => DataWidth::D32,
        other => return Err(BoardError::IllegalDataWidth(other)),
    };

    Ok(AddressSource::Bus { addr, space, width })
}

fn nonzero<D: Descriptor + ?Sized>(desc: &D, key: &str) -> Result<Option<u32>> {
    Ok(desc.get_u32(key).optional()?.filter(|&value| value != 0))
}

fn read_array<D: Descriptor + ?Sized>(desc: &D, key: &'static str, buf: &mut [u8]) -> Result<()> {
    let len = desc.get_binary(key, buf)?;
    if len < buf.len() {
        return Err(BoardError::ShortArray {
            key,
            len,
            expected: buf.len(),
        });
    }
    Ok(())
}

/// Like [`read_array`], but a missing key leaves `buf` zero-filled
fn read_optional_array<D: Descriptor + ?Sized>(
    desc: &D,
    key: &'static str,
    buf: &mut [u8],
) -> Result<()> {
    match read_array(desc, key, buf) {
        Err(BoardError::Descriptor(e)) if e.is_key_not_found() => {
            buf.fill(0);
            Ok(())
        }
        other => other,
    }
}
