//! Module Detector - slot presence probe
//!
//! The probe maps a slot's module window only for the duration of the
//! call, independently of the control register mappings the board holds.
//! Whatever the outcome, the window is unmapped and the slot interface is
//! cleared before the probe returns.
//!
//! Only modules carrying the vendor magic are reported. Third-party modules
//! cannot be identified safely without a bus timeout interrupt, so their
//! slots are reported empty.

use core::fmt::Write;

use carrier_platform::{AddrSpace, DeviceName, ModuleInfo, ModuleKind, Platform};
use static_assertions::const_assert;

use crate::board::Board;
use crate::iface::{AddrMode, DataMode};
use crate::{BoardError, Result};

/// Maximum length of a slot label
pub const SLOT_STR_MAXSIZE: usize = 40;

const SLOT_PREFIX: &str = "M-Module slot ";

// Longest label: prefix plus the ten digits of u32::MAX
const_assert!(SLOT_PREFIX.len() + 10 <= SLOT_STR_MAXSIZE);

/// Human-readable slot name
pub type SlotLabel = heapless::String<SLOT_STR_MAXSIZE>;

/// Label of `slot`, e.g. `"M-Module slot 2"`
pub fn slot_label(slot: u32) -> SlotLabel {
    let mut label = SlotLabel::new();
    // Cannot overflow, see the assertion above
    let _ = write!(label, "{}{}", SLOT_PREFIX, slot);
    label
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occupancy {
    /// A module is plugged (or the slot is forced found)
    Occupied,
    /// No vendor module found
    Empty,
}

/// Outcome of a slot probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionResult {
    pub occupancy: Occupancy,
    /// `None` when unknown
    pub dev_id: Option<u32>,
    /// `None` when unknown
    pub dev_rev: Option<u32>,
    pub slot_name: SlotLabel,
    /// `None` when unknown
    pub dev_name: Option<DeviceName>,
}

impl DetectionResult {
    /// Occupied slot whose module was not identified
    fn forced(slot_name: SlotLabel) -> Self {
        Self {
            occupancy: Occupancy::Occupied,
            dev_id: None,
            dev_rev: None,
            slot_name,
            dev_name: None,
        }
    }

    fn from_header(slot_name: SlotLabel, info: ModuleInfo) -> Self {
        match info.kind {
            ModuleKind::Vendor => Self {
                occupancy: Occupancy::Occupied,
                dev_id: Some(info.dev_id),
                dev_rev: Some(info.dev_rev),
                slot_name,
                dev_name: Some(info.name),
            },
            ModuleKind::ThirdParty | ModuleKind::Unknown => Self {
                occupancy: Occupancy::Empty,
                dev_id: None,
                dev_rev: None,
                slot_name,
                dev_name: None,
            },
        }
    }

    pub fn is_occupied(&self) -> bool {
        self.occupancy == Occupancy::Occupied
    }
}

impl<P: Platform> Board<P> {
    /// Find out whether a module is plugged into `slot`
    ///
    /// # Errors
    /// `IllegalSlot` before any hardware access. A failure to map the
    /// module window is returned after the slot interface has been cleared.
    /// If the window cannot be unmapped, or the interface cannot be cleared
    /// afterwards, that error is returned instead of the detection result.
    pub fn probe(&mut self, slot: u32) -> Result<DetectionResult> {
        let mut slot_name = SlotLabel::new();
        self.probe_labeled(slot, &mut slot_name)
    }

    /// Like [`probe`](Self::probe), but `slot_name` receives the slot label
    /// before anything else happens, so it is set on every error path too
    pub fn probe_labeled(&mut self, slot: u32, slot_name: &mut SlotLabel) -> Result<DetectionResult> {
        *slot_name = slot_label(slot);
        self.dbg.lev1(format_args!("probe: slot={}", slot));

        let cfg = *self.slot(slot)?;

        if cfg.force_found {
            self.dbg.lev2(format_args!("   slot {} forced found", slot));
            return Ok(DetectionResult::forced(slot_name.clone()));
        }

        let win = self.module_address(slot, AddrMode::A08, DataMode::D16)?;
        self.set_m_iface(slot, AddrMode::A08, DataMode::D16)?;

        let bus = self.variant().bus_type();
        let mapped = self.platform().map_phys_to_virt(
            win.phys,
            win.size,
            AddrSpace::Mem,
            bus,
            self.bus_nbr(),
        );
        let virt = match mapped {
            Ok(virt) => virt,
            Err(source) => {
                self.dbg
                    .err(format_args!("*** probe: mapping module window failed: {}", source));
                // Detection failed already, a clear failure adds nothing
                let _ = self.clr_m_iface(slot);
                return Err(BoardError::Mapping { slot, source });
            }
        };

        let info = self.platform().read_module_info(virt);
        self.dbg.lev2(format_args!(
            "   kind={:?} dev_id={:#010x} dev_rev={:#010x} name={}",
            info.kind, info.dev_id, info.dev_rev, info.name
        ));
        let result = DetectionResult::from_header(slot_name.clone(), info);

        let unmapped = self
            .platform()
            .unmap_virt(virt, win.size, AddrSpace::Mem)
            .map_err(BoardError::Unmapping);
        let cleared = self.clr_m_iface(slot);

        unmapped?;
        cleared?;
        Ok(result)
    }
}
