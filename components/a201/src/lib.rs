//! A201/B201/B202 Board Handler - M-Module carrier boards on the VMEbus
//!
//! # Purpose
//! Owns one carrier board instance and exposes the per-slot operations a
//! driver framework needs: control-register setup, interrupt routing,
//! module address lookup and module presence detection. Every resource it
//! acquires (bus resource grant, per-slot control register mappings, bus
//! translation windows) is released symmetrically, including when board
//! initialization fails half way.
//!
//! # Integration Points
//! - Depends on: `carrier-platform` (bus/OS abstraction, descriptor lookup)
//! - Provides to: host driver framework
//! - Hardware: A201 (4 slots), B202 (2 slots), B201 (1 slot)
//!
//! # Architecture
//! - [`layout`]: address translator and register constants
//! - [`resources`]: bus resource grant covering all control registers
//! - [`mapping`]: per-slot control register mappings
//! - [`Board`]: handle lifecycle, slot interface, interrupts, detection
//! - [`info`]: typed board/config/stat queries
//!
//! # Testing Strategy
//! - Unit tests: layout, configuration parsing, grant and mapping tables
//! - Integration tests: lifecycle rollback, slot interface, detection
//!   against `carrier-platform-mock`

#![no_std]

#[cfg(test)]
#[macro_use]
extern crate std;

extern crate alloc;

mod board;
mod config;
mod debug;
mod detect;
mod iface;
pub mod info;
pub mod layout;
pub mod mapping;
pub mod resources;
mod variant;

pub use board::{Board, BoardOptions};
pub use config::{AddressSource, BaseConfig, BoardConfig, SlotConfig, SlotTable};
pub use debug::{DebugLevel, DebugSink, LogSink};
pub use detect::{slot_label, DetectionResult, Occupancy, SlotLabel, SLOT_STR_MAXSIZE};
pub use iface::{AddrMode, DataMode, IrqStatus, ModuleWindow};
pub use info::{
    BbisFunction, BoardName, BrdInfo, BrdInfoReply, CfgInfo, CfgInfoReply, IdentTable,
    IrqCapability, IrqMode, IrqParams, StatCode, StatValue, BRD_NAME_MAXSIZE,
};
pub use variant::{BoardModel, HostBridge, Variant, MAX_SLOTS};

use carrier_platform::{DescError, PlatformError};
use thiserror::Error;

/// Error types for board handler operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("Illegal slot {slot} (board has {count} slots)")]
    IllegalSlot { slot: u32, count: u32 },

    #[error("Address mode {0:?} not supported")]
    IllegalAddrMode(AddrMode),

    #[error("Data mode {0:?} not supported")]
    IllegalDataMode(DataMode),

    #[error("Unknown code {0:#06x}")]
    UnknownCode(u32),

    #[error("Descriptor error: {0}")]
    Descriptor(#[from] DescError),

    #[error("No address in descriptor")]
    NoAddress,

    #[error("Descriptor key {key} has {len} entries, {expected} required")]
    ShortArray {
        key: &'static str,
        len: usize,
        expected: usize,
    },

    #[error("Illegal VME_DATA_WIDTH {0}")]
    IllegalDataWidth(u32),

    #[error("Out of memory for board structure")]
    AllocFailed,

    #[error("Resource assignment failed: {0}")]
    ResourceAssignment(#[source] PlatformError),

    #[error("Mapping window of slot {slot} failed: {source}")]
    Mapping { slot: u32, source: PlatformError },

    #[error("Unmapping failed: {0}")]
    Unmapping(#[source] PlatformError),

    #[error("Bus address translation failed: {0}")]
    Translation(#[source] PlatformError),

    #[error("Control register of slot {slot} is not mapped")]
    NotMapped { slot: u32 },
}

pub type Result<T> = core::result::Result<T, BoardError>;
