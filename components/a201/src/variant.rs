//! Board variants
//!
//! The three carriers share one register layout and differ only in the
//! number of populated slots. Independently of the model, the host either
//! sits on the VMEbus itself or reaches it through a PCI-to-VME bridge.

use carrier_platform::BusType;

/// Largest slot count of any supported model
pub const MAX_SLOTS: usize = 4;

/// Carrier board model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardModel {
    /// 6U carrier, four M-Module slots
    A201,
    /// 3U carrier, one slot
    B201,
    /// 3U carrier, two slots
    B202,
}

impl BoardModel {
    pub const fn slot_count(self) -> u32 {
        match self {
            BoardModel::A201 => 4,
            BoardModel::B201 => 1,
            BoardModel::B202 => 2,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            BoardModel::A201 => "A201",
            BoardModel::B201 => "B201",
            BoardModel::B202 => "B202",
        }
    }

    /// Ident string of the handler built for this model
    pub const fn ident(self) -> &'static str {
        match self {
            BoardModel::A201 => concat!("A201 board handler ", env!("CARGO_PKG_VERSION")),
            BoardModel::B201 => concat!("B201 board handler ", env!("CARGO_PKG_VERSION")),
            BoardModel::B202 => concat!("B202 board handler ", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// How the host reaches the VMEbus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostBridge {
    /// Host CPU is a VMEbus master
    #[default]
    Vme,
    /// Host reaches the VMEbus through a PCI bridge with byte-swapped
    /// access; bus number and interrupt routing come from the descriptor
    PciToVme,
}

/// Model plus host bridge, fixed for the lifetime of a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variant {
    pub model: BoardModel,
    pub bridge: HostBridge,
}

impl Variant {
    pub const fn new(model: BoardModel, bridge: HostBridge) -> Self {
        Self { model, bridge }
    }

    pub const fn slot_count(&self) -> u32 {
        self.model.slot_count()
    }

    pub const fn name(&self) -> &'static str {
        self.model.name()
    }

    /// Bus type the board is registered on
    pub const fn bus_type(&self) -> BusType {
        match self.bridge {
            HostBridge::Vme => BusType::Vme,
            HostBridge::PciToVme => BusType::Pci,
        }
    }
}

impl From<BoardModel> for Variant {
    fn from(model: BoardModel) -> Self {
        Self::new(model, HostBridge::Vme)
    }
}
