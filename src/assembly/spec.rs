//! Opcode specifications.
//!
//! An [`OpcodeSpec`] is the declarative description of one AVM2 opcode: its byte, mnemonic,
//! ordered operand layout, stack effect, control flow behaviour and category. Specifications are
//! plain immutable records assembled with a small builder and handed to
//! [`crate::assembly::OpcodeRegistry::register`]; the decoder, the stack resolver, the
//! control-flow resolver and the disassembler are all driven from this data.
//!
//! # Examples
//!
//! ```rust
//! use abcscope::assembly::{FlowType, OpcodeCategory, OpcodeSpec, StackConsume};
//! use abcscope::reader::{ConstantKind, FieldKind};
//!
//! let spec = OpcodeSpec::new(0x4F, "callpropvoid", OpcodeCategory::FunctionInvocation)
//!     .field("property", FieldKind::ConstRef(ConstantKind::Multiname))
//!     .field("arg_count", FieldKind::U30)
//!     .consume_derived("arg_count", 1, 1)
//!     .flow(FlowType::Call);
//!
//! assert_eq!(spec.fields.len(), 2);
//! assert!(matches!(spec.consume, StackConsume::Derived { base: 1, .. }));
//! ```

use std::fmt;

use strum::{Display, EnumCount, EnumIter};

use crate::{
    assembly::Instruction,
    disassembler::ConstantPool,
    reader::{Field, FieldKind},
};

/// Name of the relative offset operand of conditional and unconditional branches.
pub const JUMP_OFFSET: &str = "jump_offset";

/// Name of the default target operand of `lookupswitch`.
pub const DEFAULT_OFFSET: &str = "default_offset";

/// Name of the case table operand of `lookupswitch`.
pub const CASE_OFFSETS: &str = "case_offsets";

/// Custom parameter renderer attached to an opcode.
///
/// Receives the decoded instruction and the constant-pool collaborator and returns the full
/// parameter string shown after the mnemonic.
pub type ParameterFormatter = fn(&Instruction<'_>, &dyn ConstantPool) -> String;

/// How an instruction affects the flow of control.
///
/// # Examples
///
/// ```rust
/// use abcscope::assembly::FlowType;
///
/// assert!(FlowType::ConditionalBranch.falls_through());
/// assert!(!FlowType::Return.falls_through());
/// assert!(FlowType::Switch.is_branch());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumCount)]
#[strum(serialize_all = "snake_case")]
pub enum FlowType {
    /// Normal execution continues to next instruction
    Sequential,
    /// Branches to `jump_offset` or continues with the next instruction
    ConditionalBranch,
    /// Always branches to `jump_offset`
    UnconditionalBranch,
    /// Multi-way branch through a case table with a default target
    Switch,
    /// Invokes a function and continues with the next instruction
    Call,
    /// Returns from the current method
    Return,
    /// Raises an exception
    Throw,
}

impl FlowType {
    /// Returns `true` if execution may continue with the following instruction.
    #[must_use]
    pub fn falls_through(self) -> bool {
        matches!(
            self,
            FlowType::Sequential | FlowType::ConditionalBranch | FlowType::Call
        )
    }

    /// Returns `true` if the instruction carries one or more branch targets.
    #[must_use]
    pub fn is_branch(self) -> bool {
        matches!(
            self,
            FlowType::ConditionalBranch | FlowType::UnconditionalBranch | FlowType::Switch
        )
    }

    /// Returns `true` if the instruction ends a basic block.
    #[must_use]
    pub fn ends_block(self) -> bool {
        self.is_branch() || matches!(self, FlowType::Return | FlowType::Throw)
    }
}

/// Categorization of opcodes by their primary function.
///
/// The category drives the default parameter formatting of the disassembler and lets callers
/// filter instruction streams without matching on individual opcode bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumCount)]
#[strum(serialize_all = "snake_case")]
pub enum OpcodeCategory {
    /// Branches, jumps, switches and labels
    ControlTransfer,
    /// Calls, constructors and returns
    FunctionInvocation,
    /// Debugger support and line information
    Debug,
    /// Throwing and catching
    Exception,
    /// Constant loaders (pushbyte, pushstring, ...)
    PushConstant,
    /// Pure stack shuffling (pop, dup, swap)
    StackManagement,
    /// Scope chain and iteration over objects
    ScopeManagement,
    /// Local register access
    LocalVariable,
    /// Property, slot and object creation operations
    ObjectManipulation,
    /// Value conversions and coercions
    TypeConversion,
    /// Type tests
    TypeCheck,
    /// Arithmetic operations
    Arithmetic,
    /// Bitwise operations
    BitOperation,
    /// Comparisons producing a boolean
    Comparison,
    /// Domain memory loads and stores
    Memory,
    /// Everything else
    Misc,
}

/// The number of values an opcode pops from the evaluation stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackConsume {
    /// A constant number of values
    Fixed(u32),
    /// `base + per_item * value(field)`, where `field` is a decoded `u30` operand
    Derived {
        /// Name of the `u30` operand holding the item count
        field: &'static str,
        /// Values consumed independently of the count (receiver, function, ...)
        base: u32,
        /// Values consumed per counted item
        per_item: u32,
    },
}

/// The immutable description of one opcode.
#[derive(Clone)]
pub struct OpcodeSpec {
    /// The opcode byte
    pub opcode: u8,
    /// Lower-case mnemonic, e.g. `ifle`
    pub mnemonic: &'static str,
    /// Operands in the order they follow the opcode byte
    pub fields: Vec<Field>,
    /// Values popped from the evaluation stack
    pub consume: StackConsume,
    /// Values pushed onto the evaluation stack
    pub produce: u32,
    /// Control flow behaviour
    pub flow: FlowType,
    /// Functional category
    pub category: OpcodeCategory,
    /// Optional custom parameter renderer
    pub formatter: Option<ParameterFormatter>,
}

impl OpcodeSpec {
    /// Starts a specification with no operands, no stack effect and sequential flow.
    #[must_use]
    pub fn new(opcode: u8, mnemonic: &'static str, category: OpcodeCategory) -> Self {
        OpcodeSpec {
            opcode,
            mnemonic,
            fields: Vec::new(),
            consume: StackConsume::Fixed(0),
            produce: 0,
            flow: FlowType::Sequential,
            category,
            formatter: None,
        }
    }

    /// Appends an operand to the layout.
    #[must_use]
    pub fn field(mut self, name: &'static str, kind: FieldKind) -> Self {
        self.fields.push(Field::new(name, kind));
        self
    }

    /// Sets a fixed stack consumption.
    #[must_use]
    pub fn consume(mut self, count: u32) -> Self {
        self.consume = StackConsume::Fixed(count);
        self
    }

    /// Derives the stack consumption from a decoded `u30` operand.
    #[must_use]
    pub fn consume_derived(mut self, field: &'static str, base: u32, per_item: u32) -> Self {
        self.consume = StackConsume::Derived {
            field,
            base,
            per_item,
        };
        self
    }

    /// Sets the number of pushed values.
    #[must_use]
    pub fn produce(mut self, count: u32) -> Self {
        self.produce = count;
        self
    }

    /// Sets the control flow behaviour.
    #[must_use]
    pub fn flow(mut self, flow: FlowType) -> Self {
        self.flow = flow;
        self
    }

    /// Marks the opcode as a conditional branch over a `jump_offset` operand.
    #[must_use]
    pub fn conditional(self) -> Self {
        self.field(JUMP_OFFSET, FieldKind::S24)
            .flow(FlowType::ConditionalBranch)
    }

    /// Attaches a custom parameter renderer.
    #[must_use]
    pub fn formatter(mut self, formatter: ParameterFormatter) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Returns `true` if the opcode branches but may also fall through.
    #[must_use]
    pub fn is_conditional(&self) -> bool {
        self.flow == FlowType::ConditionalBranch
    }

    /// Looks up an operand declaration by name.
    #[must_use]
    pub fn field_kind(&self, name: &str) -> Option<FieldKind> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.kind)
    }
}

impl fmt::Debug for OpcodeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpcodeSpec")
            .field("opcode", &format_args!("0x{:02X}", self.opcode))
            .field("mnemonic", &self.mnemonic)
            .field("fields", &self.fields)
            .field("consume", &self.consume)
            .field("produce", &self.produce)
            .field("flow", &self.flow)
            .field("category", &self.category)
            .field("formatter", &self.formatter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn builder_defaults() {
        let spec = OpcodeSpec::new(0x02, "nop", OpcodeCategory::Debug);
        assert!(spec.fields.is_empty());
        assert_eq!(spec.consume, StackConsume::Fixed(0));
        assert_eq!(spec.produce, 0);
        assert_eq!(spec.flow, FlowType::Sequential);
        assert!(spec.formatter.is_none());
    }

    #[test]
    fn conditional_adds_offset_operand() {
        let spec = OpcodeSpec::new(0x16, "ifle", OpcodeCategory::ControlTransfer)
            .conditional()
            .consume(2);
        assert!(spec.is_conditional());
        assert_eq!(spec.field_kind(JUMP_OFFSET), Some(FieldKind::S24));
        assert_eq!(spec.field_kind("missing"), None);
    }

    #[test]
    fn flow_classification() {
        let terminal: Vec<FlowType> = FlowType::iter().filter(|f| !f.falls_through()).collect();
        assert_eq!(
            terminal,
            vec![
                FlowType::UnconditionalBranch,
                FlowType::Switch,
                FlowType::Return,
                FlowType::Throw
            ]
        );
        assert!(FlowType::Throw.ends_block());
        assert!(!FlowType::Call.ends_block());
    }

    #[test]
    fn category_names() {
        assert_eq!(OpcodeCategory::ControlTransfer.to_string(), "control_transfer");
        assert_eq!(OpcodeCategory::iter().count(), OpcodeCategory::COUNT);
    }

    #[test]
    fn debug_hides_formatter_pointer() {
        let spec = OpcodeSpec::new(0x47, "returnvoid", OpcodeCategory::FunctionInvocation);
        let rendered = format!("{spec:?}");
        assert!(rendered.contains("0x47"));
        assert!(rendered.contains("formatter: false"));
    }
}
