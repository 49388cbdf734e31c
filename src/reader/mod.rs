//! Field readers for AVM2 operand encodings.
//!
//! This module is the leaf of the decoding pipeline. It knows nothing about opcodes; it only
//! turns bytes at a cursor into typed values.
//!
//! # Key Components
//!
//! - [`io`] - the primitive readers (`read_u30`, `read_s24`, `read_u8`, `read_i8`) and writers
//! - [`FieldKind`] / [`FieldValue`] / [`Field`] - the operand layout sublanguage
//! - [`ConstantRef`] / [`ConstantKind`] - unresolved constant-pool references
//! - [`Parser`] - an advancing cursor over a method body

pub mod io;

mod field;
mod parser;

pub use field::{ConstantKind, ConstantRef, Field, FieldKind, FieldValue};
pub use io::{read_i8, read_s24, read_u30, read_u8};
pub use parser::Parser;
