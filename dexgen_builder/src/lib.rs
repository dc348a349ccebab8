//! Programmatic DEX bytecode generation.
//!
//! Callers describe classes, methods and method bodies as abstract
//! operations; the builder performs register and label allocation,
//! instruction selection, instruction-format packing and forward-branch
//! backpatching, then hands every finished piece to a container writer
//! behind the [`ContainerSink`] trait. Nothing here touches the file
//! system; persisting the produced image is the caller's business.
//!
//! ```
//! use dexgen_builder::{DexBuilder, RecordingSink};
//! use dexgen_core::{Prototype, TypeDescriptor};
//!
//! let mut dex = DexBuilder::new(RecordingSink::default());
//! let mut class = dex.make_class("com.example.Generated");
//! let mut method = class.create_method(
//!     "answer",
//!     Prototype::new(TypeDescriptor::int(), []),
//! );
//! let r0 = method.alloc_register().unwrap();
//! method.build_const4(r0, 7);
//! method.build_return_value(r0, false);
//! method.encode().unwrap();
//! drop(class);
//! let image = dex.into_image();
//! # assert!(image.is_empty()); // RecordingSink produces no image
//! ```
//!
//! Everything is single-threaded and synchronous: one [`DexBuilder`] is the
//! unit of shared mutable state for one build, and sub-builders borrow it
//! for their own construction lifetime only.

pub mod bytecode;
pub mod container;
pub mod dex;
pub mod error;

pub use bytecode::{CodeUnit, Instruction, MethodBuilder, Op, Opcode};
pub use container::{ContainerSink, MethodCode, RecordingSink};
pub use dex::{ClassBuilder, DexBuilder, MethodDecl};
pub use error::{BuilderError, BuilderResult, SymbolKind};
