// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # abcscope
//!
//! A table-driven decoder and disassembler for AVM2 method bodies, the ActionScript Byte Code
//! (ABC) executed by the ActionScript Virtual Machine 2.
//!
//! Given the raw `code` bytes of one method body, `abcscope` produces an ordered, gapless
//! sequence of typed instructions. Every instruction carries its decoded operands, its exact
//! byte span, its evaluation-stack effect and, for branches, a resolved control-flow target.
//!
//! ## Features
//!
//! - **Declarative opcode table** - every AVM2 opcode is a plain record describing its
//!   operand layout, stack effect, control flow and category
//! - **Byte-exact decoding** - `u30` variable-length integers, 24-bit signed offsets, bytes and
//!   constant-pool references
//! - **Partial results** - a malformed body yields every instruction decoded before the failure
//! - **Control flow** - absolute jump targets, successor edges, basic blocks and DOT export
//! - **Stack analysis** - per-instruction effects and depth simulation over the graph
//! - **Parallel decoding** - the registry is immutable, many bodies decode concurrently
//!
//! ## Quick Start
//!
//! ```rust
//! use abcscope::prelude::*;
//!
//! // getlocal_0, pushscope, returnvoid
//! let code = [0xD0, 0x30, 0x47];
//! let instructions = decode(&code, registry()).into_result()?;
//! assert_eq!(instructions.len(), 3);
//! assert_eq!(instructions[2].mnemonic(), "returnvoid");
//!
//! let cfg = ControlFlowGraph::build(&instructions);
//! assert!(cfg.is_valid());
//! # Ok::<(), abcscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`reader`] - field readers for the primitive operand encodings and the cursor [`Parser`]
//! - [`assembly`] - opcode specifications, the registry, the decoder and stack effects
//! - [`analysis`] - jump target resolution and the control flow graph
//! - [`disassembler`] - textual rendering with a pluggable constant-pool collaborator
//!
//! Constant pools, class/trait metadata and the container format around method bodies are not
//! handled here. Constant references are carried as [`reader::ConstantRef`] values and
//! resolved by the caller at render time through [`disassembler::ConstantPool`].
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, Error>`](Result):
//!
//! ```rust
//! use abcscope::{assembly::{decode, registry}, Error};
//!
//! // ifle with only two of its three offset bytes
//! let result = decode(&[0x16, 0x05, 0x00], registry());
//! assert!(result.instructions.is_empty());
//! assert!(matches!(
//!     result.failure.map(|f| f.error),
//!     Some(Error::TruncatedStream { .. })
//! ));
//! ```
#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use abcscope::prelude::*;
///
/// let instructions = decode(&[0x47], registry()).into_result()?;
/// assert_eq!(instructions[0].flow_type(), FlowType::Return);
/// # Ok::<(), abcscope::Error>(())
/// ```
pub mod prelude;

/// Field readers for the primitive operand encodings of AVM2 bytecode.
///
/// - `u30` - LEB128-style variable-length unsigned integers (1-5 bytes, 30 significant bits)
/// - `s24` - 3-byte little-endian two's complement offsets
/// - `byte` / `ubyte` - single signed and unsigned bytes
/// - `const_ref` - a `u30` constant-pool index tagged with a [`reader::ConstantKind`]
pub mod reader;

/// Opcode specifications, the opcode registry, the instruction decoder and stack effects.
///
/// # Examples
///
/// ```rust
/// use abcscope::assembly::{decode, registry, resolve_stack_effect};
///
/// // callsupervoid property=#3, arg_count=2
/// let instructions = decode(&[0x4E, 0x03, 0x02], registry()).into_result()?;
/// let effect = resolve_stack_effect(&instructions[0])?;
/// assert_eq!((effect.pops, effect.pushes), (3, 0));
/// # Ok::<(), abcscope::Error>(())
/// ```
pub mod assembly;

/// Control flow analysis over decoded instruction sequences.
pub mod analysis;

/// Rendering of decoded instructions into human-readable listings.
pub mod disassembler;

/// Small shared helpers.
pub mod utils;

/// `abcscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `abcscope` Error type
///
/// The main error type for all operations in this crate.
pub use error::Error;

/// Cursor-based byte reader used by the decoder.
///
/// # Example
///
/// ```rust
/// use abcscope::Parser;
///
/// let mut parser = Parser::new(&[0xE5, 0x8E, 0x26]);
/// assert_eq!(parser.read_u30()?, 624_485);
/// assert!(!parser.has_more_data());
/// # Ok::<(), abcscope::Error>(())
/// ```
pub use reader::Parser;
