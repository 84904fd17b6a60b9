//! Descriptor lookup - typed key/value board configuration
//!
//! A descriptor is the per-instance configuration the host framework hands
//! to a board handler. Keys are looked up by name; an absent key is a
//! distinguishable status so callers can fall back to their own default.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use thiserror::Error;

/// Descriptor lookup errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescError {
    #[error("Descriptor key {key} not found")]
    KeyNotFound { key: String },

    #[error("Descriptor key {key} has the wrong type")]
    TypeMismatch { key: String },

    #[error("Descriptor key {key} needs {needed} bytes")]
    BufferTooSmall { key: String, needed: usize },
}

impl DescError {
    pub fn is_key_not_found(&self) -> bool {
        matches!(self, DescError::KeyNotFound { .. })
    }
}

/// Helpers for lookups with a caller-supplied default
pub trait DescResultExt<T> {
    /// Replace a missing key with `default`, keep every other error
    fn or_default_on_missing(self, default: T) -> Result<T, DescError>;

    /// `None` for a missing key, every other error is kept
    fn optional(self) -> Result<Option<T>, DescError>;
}

impl<T> DescResultExt<T> for Result<T, DescError> {
    fn or_default_on_missing(self, default: T) -> Result<T, DescError> {
        self.optional().map(|value| value.unwrap_or(default))
    }

    fn optional(self) -> Result<Option<T>, DescError> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_key_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Typed configuration lookup
pub trait Descriptor {
    /// Look up a 32-bit scalar
    fn get_u32(&self, key: &str) -> Result<u32, DescError>;

    /// Copy a binary value into `buf`, returning the number of bytes stored
    ///
    /// # Errors
    /// `BufferTooSmall` if the stored value is longer than `buf`.
    fn get_binary(&self, key: &str, buf: &mut [u8]) -> Result<usize, DescError>;

    /// Debug level for the descriptor library itself
    fn set_debug_level(&mut self, _level: u32) {}

    /// Identification string of the descriptor library
    fn ident(&self) -> &'static str;
}

/// A stored descriptor value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescValue {
    U32(u32),
    Binary(Vec<u8>),
}

/// In-memory descriptor
#[derive(Debug, Clone, Default)]
pub struct MapDescriptor {
    entries: BTreeMap<String, DescValue>,
    debug_level: u32,
}

impl MapDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_u32(mut self, key: &str, value: u32) -> Self {
        self.insert(key, DescValue::U32(value));
        self
    }

    pub fn with_binary(mut self, key: &str, value: &[u8]) -> Self {
        self.insert(key, DescValue::Binary(value.to_vec()));
        self
    }

    pub fn insert(&mut self, key: &str, value: DescValue) {
        self.entries.insert(key.to_string(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<DescValue> {
        self.entries.remove(key)
    }

    /// Level last set through [`Descriptor::set_debug_level`]
    pub fn debug_level(&self) -> u32 {
        self.debug_level
    }

    fn lookup(&self, key: &str) -> Result<&DescValue, DescError> {
        self.entries.get(key).ok_or_else(|| DescError::KeyNotFound {
            key: key.to_string(),
        })
    }
}

impl Descriptor for MapDescriptor {
    fn get_u32(&self, key: &str) -> Result<u32, DescError> {
        match self.lookup(key)? {
            DescValue::U32(value) => Ok(*value),
            DescValue::Binary(_) => Err(DescError::TypeMismatch { key: key.to_string() }),
        }
    }

    fn get_binary(&self, key: &str, buf: &mut [u8]) -> Result<usize, DescError> {
        let DescValue::Binary(data) = self.lookup(key)? else {
            return Err(DescError::TypeMismatch { key: key.to_string() });
        };

        if data.len() > buf.len() {
            return Err(DescError::BufferTooSmall {
                key: key.to_string(),
                needed: data.len(),
            });
        }

        buf[..data.len()].copy_from_slice(data);
        Ok(data.len())
    }

    fn set_debug_level(&mut self, level: u32) {
        self.debug_level = level;
    }

    fn ident(&self) -> &'static str {
        concat!("MapDescriptor ", env!("CARGO_PKG_VERSION"))
    }
}
