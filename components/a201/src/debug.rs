//! Per-handle debug output
//!
//! Each board handle carries its own debug level and sink, so messages are
//! always scoped to one board instance. The default sink forwards to the
//! `log` crate.

use alloc::boxed::Box;
use bitflags::bitflags;
use core::fmt;
use log::Level;

bitflags! {
    /// Debug level mask
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DebugLevel: u32 {
        /// Function entry
        const LEV1 = 0x0000_0001;
        /// Details
        const LEV2 = 0x0000_0002;
        /// Register level traces
        const LEV3 = 0x0000_0004;
        /// Error messages
        const ERROR = 0x0000_8000;
    }
}

impl DebugLevel {
    /// Level in effect before the descriptor has been read
    pub const DEFAULT: Self = Self::ERROR;

    /// Everything off
    pub const OFF: Self = Self::empty();
}

/// Destination of a handle's debug messages
pub trait DebugSink {
    fn write(&self, level: Level, board: &str, args: fmt::Arguments<'_>);
}

/// Sink forwarding to the `log` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl DebugSink for LogSink {
    fn write(&self, level: Level, board: &str, args: fmt::Arguments<'_>) {
        log::log!(target: "carrier_a201", level, "{}: {}", board, args);
    }
}

/// Debug state owned by a board handle
pub(crate) struct DebugCtx {
    level: DebugLevel,
    board: &'static str,
    sink: Box<dyn DebugSink>,
}

impl DebugCtx {
    pub(crate) fn new(board: &'static str, sink: Box<dyn DebugSink>) -> Self {
        Self {
            level: DebugLevel::DEFAULT,
            board,
            sink,
        }
    }

    pub(crate) fn level(&self) -> DebugLevel {
        self.level
    }

    pub(crate) fn set_level(&mut self, level: DebugLevel) {
        self.level = level;
    }

    pub(crate) fn lev1(&self, args: fmt::Arguments<'_>) {
        self.emit(DebugLevel::LEV1, Level::Debug, args);
    }

    pub(crate) fn lev2(&self, args: fmt::Arguments<'_>) {
        self.emit(DebugLevel::LEV2, Level::Trace, args);
    }

    pub(crate) fn lev3(&self, args: fmt::Arguments<'_>) {
        self.emit(DebugLevel::LEV3, Level::Trace, args);
    }

    pub(crate) fn err(&self, args: fmt::Arguments<'_>) {
        self.emit(DebugLevel::ERROR, Level::Error, args);
    }

    fn emit(&self, mask: DebugLevel, level: Level, args: fmt::Arguments<'_>) {
        if self.level.intersects(mask) {
            self.sink.write(level, self.board, args);
        }
    }
}
