//!
//! progcall-field - Parameter Field Descriptors
//!
//! A called program receives its arguments as untyped addresses. The caller
//! side describes each of them with a `Field`: where the bytes live, how many
//! there are, and how they are encoded. This crate provides:
//!
//! - `FieldType` and `FieldAttr` describing the declared encoding
//! - `Field`, a raw descriptor over caller-owned storage
//! - `codec` routines for display digits, binary, packed decimal and IEEE floats
//! - `convert` routines for the generic decimal move used by edited and text fields
//!
//! Nothing here owns memory. Fields point at storage that belongs to the
//! program that declared it.
//!

pub mod codec;
pub mod convert;
pub mod field;

pub use field::*;
