//! A safe parser and editor for DirectX shader bytecode containers (`DXBC`).
//!
//! This crate is intended for parsing **untrusted** shader blobs without
//! panicking or reading out of bounds, and for producing edited containers
//! that external consumers accept as authentic.
//!
//! In addition to container parsing, this crate also provides:
//!
//! - Chunk-level editing (insert, replace, strip) that re-serializes the
//!   offset table and re-computes the container digest, so an edited blob is
//!   indistinguishable from a freshly compiled one.
//! - The container integrity digest itself: an MD5 variant with nonstandard
//!   finalization that must match bit-for-bit (see [`hash`]).
//! - A safe parser for D3D10+ signature chunks (`ISGN`/`OSGN`/`PCSG` and
//!   their generational variants), which map shader inputs/outputs to
//!   registers.
//! - A parser for resource definition chunks (`RDEF`), including recursive
//!   constant buffer type layouts.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod container;
mod error;
mod fourcc;
/// Chunk-level container editing (insert/replace/strip + re-hash).
pub mod edit;
/// The nonstandard container integrity digest.
pub mod hash;
/// Parser for resource definition chunks (`RDEF`).
pub mod rdef;
/// Parsers for signature chunks (`ISGN`, `OSGN`, `PCSG`, ...).
pub mod signature;

/// Helpers for building synthetic `DXBC` blobs in tests.
///
/// This module is only available when compiling this crate's own tests, or
/// when the `test-utils` feature is enabled. It is **not** considered part of
/// the stable parsing API.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use crate::container::{DxbcChunk, DxbcFile, DxbcHeader};
pub use crate::error::DxbcError;
pub use crate::fourcc::FourCC;
pub use crate::rdef::{
    parse_rdef_chunk, CBufferVariable, ConstantBuffer, RdefChunk, RdefMember, RdefType,
    ResourceBinding, ResourceDimension, ResourceKind, ResourceRetType, ShaderStage, VarClass,
    VarType, BINDLESS_BIND_COUNT,
};
pub use crate::signature::{
    parse_signature_chunk, ComponentType, SignatureChunk, SignatureElement, SystemValue,
};
