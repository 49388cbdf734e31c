//! Rendering of decoded instructions into human-readable listings.
//!
//! The disassembler never interprets constant-pool contents. Operands that reference a pool
//! are carried as [`ConstantRef`]s and handed to a caller-supplied [`ConstantPool`] at render
//! time; unresolved references are shown as `kind#index`.
//!
//! # Key Components
//!
//! - [`ConstantPool`] - the collaborator resolving constant references to display text
//! - [`Disassembler`] / [`DisasmOptions`] - listing generation and its layout options
//! - [`render_value`] - rendering of a single operand value
//!
//! # Examples
//!
//! ```rust
//! use abcscope::{
//!     assembly::{decode, registry},
//!     disassembler::{Disassembler, DisasmOptions},
//!     reader::ConstantRef,
//! };
//!
//! let code = [0x4E, 0x03, 0x02, 0x47];
//! let instructions = decode(&code, registry()).into_result()?;
//!
//! let names = |c: ConstantRef| (c.index == 3).then(|| "QName(\"init\")".to_string());
//! let disassembler = Disassembler::new(&names, DisasmOptions::default());
//! let listing = disassembler.listing(&instructions, &code);
//!
//! assert!(listing.contains("callsupervoid"));
//! assert!(listing.contains("QName(\"init\") (2)"));
//! # Ok::<(), abcscope::Error>(())
//! ```

mod formatter;

pub use formatter::{Disassembler, DisasmOptions};

use crate::reader::{ConstantRef, FieldValue};

/// Resolves constant-pool references to display text.
///
/// Implemented for closures `Fn(ConstantRef) -> Option<String>`, which is usually all a caller
/// needs. Returning `None` falls back to the raw `kind#index` form.
pub trait ConstantPool {
    /// Returns the display text for `constant`, if known.
    fn resolve(&self, constant: ConstantRef) -> Option<String>;
}

impl<F> ConstantPool for F
where
    F: Fn(ConstantRef) -> Option<String>,
{
    fn resolve(&self, constant: ConstantRef) -> Option<String> {
        self(constant)
    }
}

/// A [`ConstantPool`] that resolves nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoConstantPool;

impl ConstantPool for NoConstantPool {
    fn resolve(&self, _constant: ConstantRef) -> Option<String> {
        None
    }
}

/// Renders one operand value, resolving constant references through `pool`.
#[must_use]
pub fn render_value(value: &FieldValue, pool: &dyn ConstantPool) -> String {
    match value {
        FieldValue::ConstRef(constant) => pool
            .resolve(*constant)
            .unwrap_or_else(|| constant.to_string()),
        other => other.to_string(),
    }
}
