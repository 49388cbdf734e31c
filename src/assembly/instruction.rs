//! Decoded AVM2 instructions.
//!
//! An [`Instruction`] borrows its [`OpcodeSpec`] from the registry it was decoded with and owns
//! its decoded operand values. Offsets are byte positions within the method body.

use std::fmt;

use crate::{
    assembly::spec::{
        FlowType, OpcodeCategory, OpcodeSpec, CASE_OFFSETS, DEFAULT_OFFSET, JUMP_OFFSET,
    },
    reader::FieldValue,
};

/// The resolved targets of a `lookupswitch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchTargets {
    /// Absolute offset taken when no case matches
    pub default: i64,
    /// Absolute offset of each case, in table order
    pub cases: Vec<i64>,
}

/// A single decoded instruction.
///
/// # Examples
///
/// ```rust
/// use abcscope::assembly::{decode, registry};
///
/// // ifle +5
/// let instructions = decode(&[0x16, 0x05, 0x00, 0x00], registry()).into_result()?;
/// let ifle = &instructions[0];
/// assert_eq!(ifle.mnemonic(), "ifle");
/// assert_eq!(ifle.size, 4);
/// assert_eq!(ifle.jump_target(), Some(9));
/// # Ok::<(), abcscope::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Instruction<'r> {
    /// The specification this instruction was decoded with
    pub spec: &'r OpcodeSpec,
    /// Byte offset of the opcode within the method body
    pub offset: usize,
    /// Total length, the opcode byte plus all operand bytes
    pub size: usize,
    /// Position in the decoded instruction sequence
    pub index: usize,
    /// Decoded operands in layout order
    pub fields: Vec<(&'static str, FieldValue)>,
}

impl Instruction<'_> {
    /// The opcode byte.
    #[must_use]
    pub fn opcode(&self) -> u8 {
        self.spec.opcode
    }

    /// The mnemonic of the opcode.
    #[must_use]
    pub fn mnemonic(&self) -> &'static str {
        self.spec.mnemonic
    }

    /// The category of the opcode.
    #[must_use]
    pub fn category(&self) -> OpcodeCategory {
        self.spec.category
    }

    /// The control flow behaviour of the opcode.
    #[must_use]
    pub fn flow_type(&self) -> FlowType {
        self.spec.flow
    }

    /// Returns `true` for branches that may also fall through.
    #[must_use]
    pub fn is_conditional(&self) -> bool {
        self.spec.is_conditional()
    }

    /// Byte offset one past the last byte of this instruction.
    #[must_use]
    pub fn end(&self) -> usize {
        self.offset + self.size
    }

    /// Returns the decoded value of the named operand.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
    }

    /// Absolute target of a conditional or unconditional branch.
    ///
    /// The target is `end() + jump_offset` and may lie outside of the method body; it is
    /// validated by the control flow graph, not here.
    #[must_use]
    pub fn jump_target(&self) -> Option<i64> {
        match self.flow_type() {
            FlowType::ConditionalBranch | FlowType::UnconditionalBranch => {
                let relative = self.field(JUMP_OFFSET)?.as_i32()?;
                Some(to_i64(self.end()) + i64::from(relative))
            }
            _ => None,
        }
    }

    /// Absolute targets of a `lookupswitch`.
    ///
    /// Unlike other branches, switch offsets are relative to the start of the instruction.
    #[must_use]
    pub fn switch_targets(&self) -> Option<SwitchTargets> {
        if self.flow_type() != FlowType::Switch {
            return None;
        }

        let base = to_i64(self.offset);
        let default = base + i64::from(self.field(DEFAULT_OFFSET)?.as_i32()?);
        let FieldValue::CaseOffsets(offsets) = self.field(CASE_OFFSETS)? else {
            return None;
        };

        Some(SwitchTargets {
            default,
            cases: offsets
                .iter()
                .map(|&offset| base + i64::from(offset))
                .collect(),
        })
    }

    /// All branch targets in operand order; empty for non-branching instructions.
    ///
    /// For `lookupswitch` the default target comes first, followed by the cases.
    #[must_use]
    pub fn branch_targets(&self) -> Vec<i64> {
        if let Some(target) = self.jump_target() {
            return vec![target];
        }

        match self.switch_targets() {
            Some(switch) => std::iter::once(switch.default).chain(switch.cases).collect(),
            None => Vec::new(),
        }
    }
}

/// Offsets are bounded by slice lengths, which always fit.
fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl fmt::Display for Instruction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())?;
        for (i, (_, value)) in self.fields.iter().enumerate() {
            let separator = if i == 0 { " " } else { ", " };
            write!(f, "{separator}{value}")?;
        }
        Ok(())
    }
}
