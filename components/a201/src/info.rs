//! Board and slot introspection
//!
//! Typed request/reply pairs for the board information, configuration
//! information and status queries of the host framework. Apart from
//! [`CfgInfo::Slot`], which runs a probe, every query is a plain read of
//! state resolved at construction.

use core::fmt::Write;

use bitflags::bitflags;
use carrier_platform::{AddrSpace, BusType, Platform};
use static_assertions::const_assert;

use crate::board::Board;
use crate::debug::DebugLevel;
use crate::detect::DetectionResult;
use crate::variant::HostBridge;
use crate::{BoardError, Result};

/// Maximum length of a board name
pub const BRD_NAME_MAXSIZE: usize = 40;

const BRD_NAME_SUFFIX: &str = " board";

// Model names are four characters
const_assert!(4 + BRD_NAME_SUFFIX.len() <= BRD_NAME_MAXSIZE);

/// Board hardware name, e.g. `"A201 board"`
pub type BoardName = heapless::String<BRD_NAME_MAXSIZE>;

/// Optional handler functions the framework may ask about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BbisFunction {
    IrqEnable,
    IrqSrvInit,
    IrqSrvExit,
    SetIrqHandle,
}

impl BbisFunction {
    pub const fn is_supported(self) -> bool {
        matches!(
            self,
            BbisFunction::IrqEnable | BbisFunction::IrqSrvInit | BbisFunction::IrqSrvExit
        )
    }
}

bitflags! {
    /// Interrupt capability of a slot
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IrqCapability: u32 {
        /// Device interrupt
        const DEVIRQ = 0x01;
        /// Exception interrupt
        const EXPIRQ = 0x02;
    }
}

/// Board information request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrdInfo {
    /// Bus the board sits on
    BusType,
    /// Bus type of the devices in `slot`
    DevBusType { slot: u32 },
    /// Whether an optional function is implemented
    Function(BbisFunction),
    NumSlots,
    Interrupts { slot: u32 },
    AddrSpace { slot: u32 },
    BrdName,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrdInfoReply {
    BusType(BusType),
    DevBusType(BusType),
    Function(bool),
    NumSlots(u32),
    Interrupts(IrqCapability),
    AddrSpace(AddrSpace),
    BrdName(BoardName),
}

/// Configuration information request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CfgInfo {
    BusNumber,
    /// Device interrupt parameters of `slot`
    Irq { slot: u32 },
    /// Exception interrupt parameters of `slot`
    Exception { slot: u32 },
    /// Probe `slot`
    Slot { slot: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqMode {
    /// No interrupt
    None,
    Exclusive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqParams {
    pub vector: u32,
    pub level: u32,
    pub mode: IrqMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CfgInfoReply {
    BusNumber(u32),
    Irq(IrqParams),
    Exception(IrqMode),
    Slot(DetectionResult),
}

/// Status codes
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatCode {
    IrqVector = 0x0201,
    IrqLevel = 0x0202,
    IrqPriority = 0x0203,
    /// Module id check; never enabled on this carrier
    IdCheck = 0x0204,
    DebugLevel = 0x0205,
    /// Ident table of the handler and its collaborators
    RevisionIdent = 0x8001,
}

impl TryFrom<u32> for StatCode {
    type Error = BoardError;

    fn try_from(code: u32) -> Result<Self> {
        Ok(match code {
            0x0201 => StatCode::IrqVector,
            0x0202 => StatCode::IrqLevel,
            0x0203 => StatCode::IrqPriority,
            0x0204 => StatCode::IdCheck,
            0x0205 => StatCode::DebugLevel,
            0x8001 => StatCode::RevisionIdent,
            other => return Err(BoardError::UnknownCode(other)),
        })
    }
}

/// Ident strings of the handler, the descriptor and the platform layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentTable {
    entries: [&'static str; 3],
}

impl IdentTable {
    pub const fn new(handler: &'static str, descriptor: &'static str, platform: &'static str) -> Self {
        Self {
            entries: [handler, descriptor, platform],
        }
    }

    pub const fn handler(&self) -> &'static str {
        self.entries[0]
    }

    pub const fn descriptor(&self) -> &'static str {
        self.entries[1]
    }

    pub const fn platform(&self) -> &'static str {
        self.entries[2]
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().copied()
    }
}

/// Status value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatValue<'a> {
    Value(u32),
    Ident(&'a IdentTable),
}

impl<P: Platform> Board<P> {
    /// Answer a board information request
    pub fn brd_info(&self, req: BrdInfo) -> Result<BrdInfoReply> {
        Ok(match req {
            BrdInfo::BusType => BrdInfoReply::BusType(self.variant().bus_type()),
            BrdInfo::DevBusType { slot } => {
                self.check_slot(slot)?;
                BrdInfoReply::DevBusType(BusType::MModule)
            }
            BrdInfo::Function(func) => BrdInfoReply::Function(func.is_supported()),
            BrdInfo::NumSlots => BrdInfoReply::NumSlots(self.slot_count()),
            BrdInfo::Interrupts { slot } => {
                self.check_slot(slot)?;
                BrdInfoReply::Interrupts(IrqCapability::DEVIRQ)
            }
            BrdInfo::AddrSpace { slot } => {
                self.check_slot(slot)?;
                BrdInfoReply::AddrSpace(AddrSpace::Mem)
            }
            BrdInfo::BrdName => BrdInfoReply::BrdName(self.board_name()),
        })
    }

    /// Answer a configuration information request
    ///
    /// `CfgInfo::Slot` probes the slot, see [`Board::probe`].
    pub fn cfg_info(&mut self, req: CfgInfo) -> Result<CfgInfoReply> {
        self.dbg.lev1(format_args!("cfg_info: {:?}", req));

        Ok(match req {
            CfgInfo::BusNumber => CfgInfoReply::BusNumber(self.bus_nbr()),
            CfgInfo::Irq { slot } => {
                let cfg = self.slot(slot)?;
                let (vector, level) = match self.variant().bridge {
                    HostBridge::Vme => (cfg.irq_vector, cfg.irq_level),
                    HostBridge::PciToVme => (cfg.win_irq, cfg.win_irq),
                };
                CfgInfoReply::Irq(IrqParams {
                    vector: u32::from(vector),
                    level: u32::from(level),
                    mode: IrqMode::Exclusive,
                })
            }
            CfgInfo::Exception { slot } => {
                self.check_slot(slot)?;
                CfgInfoReply::Exception(IrqMode::None)
            }
            CfgInfo::Slot { slot } => CfgInfoReply::Slot(self.probe(slot)?),
        })
    }

    /// Read status `code` of `slot`
    pub fn get_stat(&self, slot: u32, code: StatCode) -> Result<StatValue<'_>> {
        self.dbg
            .lev1(format_args!("get_stat: slot={} code={:?}", slot, code));
        let cfg = self.slot(slot)?;

        Ok(match code {
            StatCode::IrqVector => StatValue::Value(u32::from(cfg.irq_vector)),
            StatCode::IrqLevel => StatValue::Value(u32::from(cfg.irq_level)),
            StatCode::IrqPriority => StatValue::Value(u32::from(cfg.irq_priority)),
            StatCode::IdCheck => StatValue::Value(0),
            StatCode::DebugLevel => StatValue::Value(self.debug_level().bits()),
            StatCode::RevisionIdent => StatValue::Ident(&self.ident),
        })
    }

    /// Change status `code` of `slot`; only the debug level is writable
    pub fn set_stat(&mut self, slot: u32, code: StatCode, value: u32) -> Result<()> {
        self.dbg
            .lev1(format_args!("set_stat: slot={} code={:?}", slot, code));
        self.check_slot(slot)?;

        match code {
            StatCode::DebugLevel => {
                self.dbg.set_level(DebugLevel::from_bits_retain(value));
                Ok(())
            }
            other => Err(BoardError::UnknownCode(other as u32)),
        }
    }

    /// Ident strings of the handler and its collaborators
    pub fn ident_table(&self) -> &IdentTable {
        &self.ident
    }

    fn board_name(&self) -> BoardName {
        let mut name = BoardName::new();
        // Cannot overflow, see the assertion above
        let _ = write!(name, "{}{}", self.variant().name(), BRD_NAME_SUFFIX);
        name
    }
}
