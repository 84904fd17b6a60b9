//! Carrier Platform - Bus/OS abstraction for carrier board handlers
//!
//! # Purpose
//! A carrier board handler never touches the bus arbiter, the MMU or the
//! descriptor store directly. Everything it needs from the operating system
//! is expressed here as a small set of synchronous traits.
//!
//! # Integration Points
//! - Depends on: nothing (implemented by the host OS layer)
//! - Provides to: board handlers (`carrier-a201`), test mocks
//!
//! # Architecture
//! - [`ResourceArbiter`]: atomic grant/release of physical address ranges
//! - [`AddressMapper`]: physical to virtual mapping of register windows
//! - [`BusTranslator`]: bus-address to physical-address translation
//! - [`RegisterIo`]: 16-bit register access through a mapped address
//! - [`ModuleIdReader`]: decodes a module's identification header
//! - [`Descriptor`]: typed key/value configuration lookup
//!
//! [`Platform`] bundles the hardware-facing traits so handlers can take a
//! single generic parameter.

#![no_std]

#[cfg(test)]
#[macro_use]
extern crate std;

extern crate alloc;

mod addr;
mod desc;
mod map;
mod modid;
mod regs;
mod resource;

pub use addr::{PhysAddr, VirtAddr};
pub use desc::{DescError, DescResultExt, DescValue, Descriptor, MapDescriptor};
pub use map::{AddressMapper, BusSpace, BusTranslator, BusWindow, DataWidth, WindowHandle};
pub use modid::{
    DeviceName, ModuleIdReader, ModuleInfo, ModuleKind, DEVICE_NAME_MAXSIZE, VENDOR_MAGIC,
};
pub use regs::{RegisterIo, VolatileIo};
pub use resource::{AddrSpace, BusType, Resource, ResourceArbiter};

use thiserror::Error;

/// Errors reported by the bus/OS layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("Resource conflict at {addr}")]
    Conflict { addr: PhysAddr },

    #[error("Cannot map {size:#x} bytes at {addr}")]
    MapFailed { addr: PhysAddr, size: usize },

    #[error("Virtual address {addr} is not mapped")]
    NotMapped { addr: VirtAddr },

    #[error("Bus address {addr:#x} not reachable in {space:?}")]
    Untranslatable { addr: u64, space: BusSpace },

    #[error("Illegal bus space {space:?}")]
    IllegalSpace { space: BusSpace },

    #[error("OS error {0:#x}")]
    Os(u32),
}

pub type Result<T> = core::result::Result<T, PlatformError>;

/// Everything a board handler needs from the hardware side
///
/// Shared references implement every trait of the platform, so a handler can
/// either own its platform or borrow one that outlives it.
pub trait Platform:
    ResourceArbiter + AddressMapper + BusTranslator + RegisterIo + ModuleIdReader
{
    /// Identification string of the platform layer
    fn ident(&self) -> &'static str;
}

impl<T: Platform + ?Sized> Platform for &T {
    fn ident(&self) -> &'static str {
        (**self).ident()
    }
}
