//! Address Translator - board register layout
//!
//! Every slot occupies a `0x200` byte stride of the board window. The lower
//! half is the module window (A08 address space of the plugged M-Module),
//! the upper half starts with the slot's control/vector register pair.
//!
//! ```text
//! base + i*0x200 + 0x000   module window, 0x100 bytes (A08)
//! base + i*0x200 + 0x100   control register (16 bit)
//! base + i*0x200 + 0x102   vector register  (16 bit)
//! ```

use bitflags::bitflags;
use carrier_platform::{PhysAddr, Resource};

/// Distance between two slots
pub const SLOT_STRIDE: u64 = 0x200;

/// Offset of slot 0's control register from the board base
pub const CTRL_REG_1: u64 = 0x100;

/// Size of a slot's control/vector register pair
pub const CTRL_REG_SIZE: usize = 4;

/// Size of the whole board window on the bus
pub const BOARD_SIZE: usize = 0x800;

/// Size of a slot's A08 module window
pub const A08_WINDOW_SIZE: usize = 0x100;

/// Control register offset within the register pair
pub const CTRL_OFFS: usize = 0x00;

/// Vector register offset within the register pair
pub const VECT_OFFS: usize = 0x02;

/// Control register after reset: interrupt disabled, level 0
pub const CTRL_DEFAULT: u16 = 0x00;

/// Vector register sentinel: no vector assigned
pub const VECT_DEFAULT: u16 = 0x0f;

bitflags! {
    /// Slot control register
    ///
    /// The low bits hold the VMEbus interrupt level the slot requests on.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Control: u16 {
        /// Forward the module's interrupt to the bus
        const IRQ_ENABLE = 0x10;
    }
}

impl Control {
    /// Control value for interrupt `level`, enabled or not
    pub const fn for_level(level: u8, enable: bool) -> Self {
        let control = Self::from_bits_retain(level as u16);
        if enable {
            control.union(Self::IRQ_ENABLE)
        } else {
            control
        }
    }
}

/// Physical address of slot `slot`'s control register pair
pub const fn ctrl_reg_addr(base: PhysAddr, slot: u32) -> PhysAddr {
    base.offset(CTRL_REG_1 + slot as u64 * SLOT_STRIDE)
}

/// Physical address of slot `slot`'s module window
pub const fn module_window_addr(base: PhysAddr, slot: u32) -> PhysAddr {
    base.offset(slot as u64 * SLOT_STRIDE)
}

/// Resource descriptors of the control registers of slots `0..slot_count`
pub fn ctrl_resources(base: PhysAddr, slot_count: u32) -> impl Iterator<Item = Resource> {
    (0..slot_count).map(move |slot| Resource::mem(ctrl_reg_addr(base, slot), CTRL_REG_SIZE))
}
