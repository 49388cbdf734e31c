//! # Key Components
//!
//! - [`OpcodeSpec`] - declarative description of one opcode
//! - [`OpcodeRegistry`] / [`registry`] - byte-indexed table of specifications
//! - [`opcodes`] - AVM2 opcode byte constants
//! - [`Instruction`] - a decoded instruction with operands, span and targets
//! - [`decode`] / [`decode_from`] / [`decode_all`] / [`decode_instruction`] - the decoder
//! - [`resolve_stack_effect`] / [`simulate_stack`] - stack effect resolution and depth analysis
//!
//! The registry is built once and never mutated afterwards, which makes it safe to share
//! between any number of decoding threads.

mod decoder;
mod instruction;
mod instructions;
mod registry;
mod spec;
mod stack;

pub mod opcodes;

pub use decoder::{decode, decode_all, decode_from, decode_instruction, DecodeFailure, DecodeResult};
pub use instruction::{Instruction, SwitchTargets};
pub use registry::{registry, OpcodeRegistry};
pub use spec::{
    FlowType, OpcodeCategory, OpcodeSpec, ParameterFormatter, StackConsume, CASE_OFFSETS,
    DEFAULT_OFFSET, JUMP_OFFSET,
};
pub use stack::{
    resolve_stack_effect, simulate_stack, stack_effects, StackConfig, StackEffect, StackIssue,
    StackReport,
};
