//! Control Flow Graph (CFG) construction.
//!
//! # Key Components
//!
//! - [`ControlFlowGraph`] - Instruction-level successor graph with basic blocks
//! - [`BasicBlock`] - A straight-line run of instructions
//! - [`CfgEdge`] - Edge representation with control flow semantics
//! - [`CfgEdgeKind`] - Classification of edge types
//!
//! # Edge Types
//!
//! - **Fallthrough**: Execution continues with the next instruction
//! - **Unconditional**: Target of a `jump`
//! - **Conditional True/False**: The taken branch and the fallthrough of a conditional branch
//! - **Switch**: One edge per `lookupswitch` case plus the default target
//!
//! Edges are kept as a list, so a conditional branch whose target is the next instruction
//! contributes two edges to the same successor.

mod edge;
mod graph;

pub use edge::{CfgEdge, CfgEdgeKind};
pub use graph::{BasicBlock, ControlFlowGraph};
