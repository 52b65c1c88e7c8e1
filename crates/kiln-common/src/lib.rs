//! Common utilities for kiln.
//!
//! This crate provides foundational types and utilities used across all kiln crates:
//!
//! - [`BinaryReader`] - Zero-copy binary reading from byte slices
//! - [`JenHash`] - Jenkins one-at-a-time hash used for class, field and enum names
//! - [`hash`] - name hashing and CRC32 continuation folding

mod error;
mod reader;

pub mod hash;

pub use error::{Error, Result};
pub use hash::JenHash;
pub use reader::BinaryReader;

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Re-export memchr for SIMD-accelerated byte searching
pub use memchr;
