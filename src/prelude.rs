//! # abcscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and functions.
//! Import it to decode, analyse and print method bodies with a single `use`.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all abcscope operations
pub use crate::Error;

/// The result type used throughout abcscope
pub use crate::Result;

/// Cursor over raw method body bytes
pub use crate::Parser;

// ================================================================================================
// Decoding
// ================================================================================================

pub use crate::assembly::{
    decode, decode_all, decode_from, registry, DecodeFailure, DecodeResult, FlowType,
    Instruction, OpcodeCategory, OpcodeRegistry, OpcodeSpec,
};

// ================================================================================================
// Analysis
// ================================================================================================

pub use crate::assembly::{
    resolve_stack_effect, simulate_stack, StackConfig, StackEffect, StackReport,
};

pub use crate::analysis::{BasicBlock, CfgEdgeKind, ControlFlowGraph};

// ================================================================================================
// Operands and Rendering
// ================================================================================================

pub use crate::reader::{ConstantKind, ConstantRef, FieldValue};

pub use crate::disassembler::{ConstantPool, Disassembler, DisasmOptions, NoConstantPool};
