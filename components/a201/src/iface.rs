//! Slot Interface Controller
//!
//! Per-slot interface set/clear, interrupt routing and the module address
//! query. All register access goes through the control register mapping
//! owned by the board; every argument is validated before the first access.
//!
//! A slot is logically unconfigured until [`Board::set_m_iface`] and again
//! after [`Board::clr_m_iface`]. [`Board::irq_enable`] does not check this
//! state and writes the registers in any case.

use bitflags::bitflags;
use carrier_platform::{PhysAddr, Platform, VirtAddr};

use crate::board::Board;
use crate::layout::{self, Control, A08_WINDOW_SIZE, CTRL_DEFAULT, CTRL_OFFS, VECT_DEFAULT, VECT_OFFS};
use crate::{BoardError, Result};

bitflags! {
    /// Module address modes
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AddrMode: u32 {
        const A08 = 0x01;
        const A24 = 0x02;
        const A32 = 0x04;
    }
}

bitflags! {
    /// Module data modes
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DataMode: u32 {
        const D08 = 0x01;
        const D16 = 0x02;
        const D32 = 0x04;
    }
}

/// Answer of an interrupt service hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqStatus {
    /// Interrupt was not raised by this slot
    No,
    /// Board cannot tell
    Unknown,
}

/// Physical window of a slot's module address space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleWindow {
    pub phys: PhysAddr,
    pub size: usize,
}

impl<P: Platform> Board<P> {
    /// Configure the interface of `slot` for a module using `addr`/`data`
    ///
    /// Resets the slot's control register to its default and its vector
    /// register to the "no vector" value.
    ///
    /// # Errors
    /// `IllegalSlot`, then `IllegalDataMode` unless D08 or D16 is requested,
    /// then `IllegalAddrMode` unless A08 is requested.
    pub fn set_m_iface(&mut self, slot: u32, addr: AddrMode, data: DataMode) -> Result<()> {
        self.dbg.lev1(format_args!("set_m_iface: slot={}", slot));
        self.check_slot(slot)?;

        if !data.intersects(DataMode::D08 | DataMode::D16) {
            self.dbg
                .err(format_args!("*** set_m_iface: data mode {:?} not supported", data));
            return Err(BoardError::IllegalDataMode(data));
        }

        if !addr.contains(AddrMode::A08) {
            self.dbg
                .err(format_args!("*** set_m_iface: addr mode {:?} not supported", addr));
            return Err(BoardError::IllegalAddrMode(addr));
        }

        let ctrl = self.ctrl(slot)?;
        self.reset_slot(ctrl);
        Ok(())
    }

    /// Return the interface of `slot` to its default state
    pub fn clr_m_iface(&mut self, slot: u32) -> Result<()> {
        self.dbg.lev1(format_args!("clr_m_iface: slot={}", slot));
        self.check_slot(slot)?;

        let ctrl = self.ctrl(slot)?;
        self.reset_slot(ctrl);
        Ok(())
    }

    /// Enable or disable interrupt forwarding for `slot`
    ///
    /// Writes the configured vector first, then the control register with
    /// the configured level and, if `enable`, the enable bit.
    pub fn irq_enable(&mut self, slot: u32, enable: bool) -> Result<()> {
        self.dbg
            .lev1(format_args!("irq_enable: slot={} enable={}", slot, enable));
        let cfg = *self.slot(slot)?;
        let ctrl = self.ctrl(slot)?;

        let control = Control::for_level(cfg.irq_level, enable);
        self.dbg.lev2(format_args!(
            "   vector {:#04x} control {:#06x}",
            cfg.irq_vector,
            control.bits()
        ));

        self.write_reg(ctrl, VECT_OFFS, u16::from(cfg.irq_vector));
        self.write_reg(ctrl, CTRL_OFFS, control.bits());
        Ok(())
    }

    /// Interrupt service entry; the carrier has no per-slot pending flag
    pub fn irq_srv_init(&mut self, slot: u32) -> IrqStatus {
        self.dbg.lev1(format_args!("irq_srv_init: slot={}", slot));
        IrqStatus::Unknown
    }

    /// Interrupt service exit
    pub fn irq_srv_exit(&mut self, slot: u32) {
        self.dbg.lev1(format_args!("irq_srv_exit: slot={}", slot));
    }

    /// Exception interrupt enable; the carrier has none
    pub fn exp_enable(&mut self, slot: u32, enable: bool) -> Result<()> {
        self.dbg
            .lev1(format_args!("exp_enable: slot={} enable={}", slot, enable));
        Ok(())
    }

    /// Exception interrupt service; never ours
    pub fn exp_srv(&mut self, slot: u32) -> IrqStatus {
        self.dbg.lev1(format_args!("exp_srv: slot={}", slot));
        IrqStatus::No
    }

    /// Physical window of `slot`'s module address space
    ///
    /// # Errors
    /// `IllegalSlot`, then `IllegalAddrMode` unless the mode is exactly A08,
    /// then `IllegalDataMode` unless the mode is exactly D08 or D16.
    pub fn module_address(&self, slot: u32, addr: AddrMode, data: DataMode) -> Result<ModuleWindow> {
        self.dbg.lev1(format_args!("module_address: slot={}", slot));
        self.check_slot(slot)?;

        if addr != AddrMode::A08 {
            self.dbg
                .err(format_args!("*** module_address: addr mode {:?} not supported", addr));
            return Err(BoardError::IllegalAddrMode(addr));
        }

        if data != DataMode::D08 && data != DataMode::D16 {
            self.dbg
                .err(format_args!("*** module_address: data mode {:?} not supported", data));
            return Err(BoardError::IllegalDataMode(data));
        }

        Ok(ModuleWindow {
            phys: layout::module_window_addr(self.base(), slot),
            size: A08_WINDOW_SIZE,
        })
    }

    /// Interrupts off, no vector
    fn reset_slot(&self, ctrl: VirtAddr) {
        self.write_reg(ctrl, CTRL_OFFS, CTRL_DEFAULT);
        self.write_reg(ctrl, VECT_OFFS, VECT_DEFAULT);
    }

    fn write_reg(&self, ctrl: VirtAddr, offs: usize, value: u16) {
        self.dbg
            .lev3(format_args!("   write {}+{:#x} <- {:#06x}", ctrl, offs, value));
        self.platform().write_u16(ctrl, offs, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BoardModel, BoardOptions};
    use carrier_platform::MapDescriptor;
    use carrier_platform_mock::MockPlatform;

    fn board(platform: &MockPlatform) -> Board<&MockPlatform> {
        let mut desc = MapDescriptor::new()
            .with_u32("PHYS_ADDR", 0x0040_0000)
            .with_binary("IRQ_VECTOR", &[0x40, 0x41])
            .with_binary("IRQ_LEVEL", &[2, 6]);
        Board::init(platform, &mut desc, BoardModel::B202.into(), BoardOptions::default()).unwrap()
    }

    #[test]
    fn test_mode_checks() {
        let platform = MockPlatform::new();
        let mut board = board(&platform);

        assert_eq!(
            board.set_m_iface(0, AddrMode::A08, DataMode::D32),
            Err(BoardError::IllegalDataMode(DataMode::D32))
        );
        assert_eq!(
            board.set_m_iface(0, AddrMode::A24, DataMode::D16),
            Err(BoardError::IllegalAddrMode(AddrMode::A24))
        );
        // Data mode is checked first
        assert_eq!(
            board.set_m_iface(0, AddrMode::A24, DataMode::D32),
            Err(BoardError::IllegalDataMode(DataMode::D32))
        );
        // Combined requests are fine as long as a supported mode is among them
        board
            .set_m_iface(0, AddrMode::A08 | AddrMode::A24, DataMode::D16 | DataMode::D32)
            .unwrap();
    }

    #[test]
    fn test_module_address_modes() {
        let platform = MockPlatform::new();
        let board = board(&platform);

        let win = board.module_address(1, AddrMode::A08, DataMode::D08).unwrap();
        assert_eq!(win.phys, PhysAddr::new(0x0040_0200));
        assert_eq!(win.size, A08_WINDOW_SIZE);

        // Exact modes only
        assert_eq!(
            board.module_address(1, AddrMode::A08 | AddrMode::A24, DataMode::D16),
            Err(BoardError::IllegalAddrMode(AddrMode::A08 | AddrMode::A24))
        );
        assert_eq!(
            board.module_address(1, AddrMode::A08, DataMode::D08 | DataMode::D16),
            Err(BoardError::IllegalDataMode(DataMode::D08 | DataMode::D16))
        );
    }

    #[test]
    fn test_service_hooks() {
        let platform = MockPlatform::new();
        let mut board = board(&platform);
        platform.clear_calls();

        assert_eq!(board.irq_srv_init(0), IrqStatus::Unknown);
        board.irq_srv_exit(0);
        assert_eq!(board.exp_enable(1, true), Ok(()));
        assert_eq!(board.exp_srv(1), IrqStatus::No);
        assert_eq!(platform.register_access_count(), 0);
    }
}
