//! Shared data model for DEX bytecode generation.
//!
//! Key components:
//!
//! - [`Value`] - Tagged operand of a virtual instruction
//! - [`TypeDescriptor`] - Canonical DEX type descriptor string
//! - [`Prototype`] - Method signature with shorty derivation
//! - Index newtypes for interned symbols ([`StringIndex`], [`TypeIndex`], ...)
//!
//! Everything here is a pure, immutable value type. The stateful machinery
//! (interning, method encoding, container assembly) lives in `dexgen_builder`.

pub mod descriptor;
pub mod ids;
pub mod value;

pub use descriptor::{Prototype, TypeDescriptor};
pub use ids::{ClassIndex, LabelId, MethodIndex, ProtoIndex, StringIndex, TypeIndex};
pub use value::Value;
