//! Module identification header
//!
//! Pluggable modules carry an identification header at the start of their
//! address window. The header format itself belongs to the bus-probe
//! subsystem; board handlers only see the decoded fields.

use crate::VirtAddr;

/// Magic word of modules built by the carrier vendor
pub const VENDOR_MAGIC: u16 = 0x5346;

/// Maximum length of a decoded device name
pub const DEVICE_NAME_MAXSIZE: usize = 40;

/// Decoded device name (e.g. `"M34"`)
pub type DeviceName = heapless::String<DEVICE_NAME_MAXSIZE>;

/// Classification of the module type tag found in the header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// No readable header
    Unknown,
    /// Header carries [`VENDOR_MAGIC`]
    Vendor,
    /// Some other, non-vendor magic
    ThirdParty,
}

impl ModuleKind {
    pub const fn from_magic(magic: u16) -> Self {
        match magic {
            VENDOR_MAGIC => ModuleKind::Vendor,
            0x0000 | 0xffff => ModuleKind::Unknown,
            _ => ModuleKind::ThirdParty,
        }
    }
}

/// Fields decoded from an identification header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub kind: ModuleKind,
    /// `magic << 16 | module id`
    pub dev_id: u32,
    /// `layout revision << 16 | product variant`
    pub dev_rev: u32,
    pub name: DeviceName,
}

/// Header-decode routine
pub trait ModuleIdReader {
    /// Read the identification header of the module window mapped at `window`
    fn read_module_info(&self, window: VirtAddr) -> ModuleInfo;
}

impl<T: ModuleIdReader + ?Sized> ModuleIdReader for &T {
    fn read_module_info(&self, window: VirtAddr) -> ModuleInfo {
        (**self).read_module_info(window)
    }
}
