//! Control flow analysis for decoded AVM2 method bodies.
//!
//! # Architecture
//!
//! - [`cfg`] - Control flow graph construction, basic blocks and DOT export
//! - [`offsets`] - Bitfield map of instruction start offsets used to validate jump targets
//!
//! # Usage
//!
//! ```rust
//! use abcscope::{analysis::ControlFlowGraph, assembly::{decode, registry}};
//!
//! // ifle +0, returnvoid
//! let instructions = decode(&[0x16, 0x00, 0x00, 0x00, 0x47], registry()).into_result()?;
//! let cfg = ControlFlowGraph::build(&instructions);
//!
//! assert!(cfg.is_valid());
//! assert_eq!(cfg.outgoing(0).count(), 2);
//! assert_eq!(cfg.outgoing(1).count(), 0);
//! # Ok::<(), abcscope::Error>(())
//! ```

pub mod cfg;
pub mod offsets;

pub use cfg::{BasicBlock, CfgEdge, CfgEdgeKind, ControlFlowGraph};
pub use offsets::BoundaryMap;
