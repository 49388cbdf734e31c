//! The opcode registry.
//!
//! [`OpcodeRegistry`] maps opcode bytes to their [`OpcodeSpec`]. It is filled in a single
//! registration pass and only read afterwards, so one registry can serve any number of
//! concurrent decoders. The process-wide default table is available through [`registry`].

use std::sync::OnceLock;

use crate::{
    assembly::{
        instructions,
        spec::{OpcodeSpec, StackConsume, CASE_OFFSETS, DEFAULT_OFFSET, JUMP_OFFSET},
        FlowType,
    },
    reader::FieldKind,
    Error, Result,
};

static AVM2_REGISTRY: OnceLock<OpcodeRegistry> = OnceLock::new();

/// Returns the process-wide registry holding the complete AVM2 instruction set.
///
/// The table is built on first use.
///
/// # Panics
///
/// Panics if the built-in opcode table is inconsistent, which is a programming error and not
/// a property of any input.
///
/// # Examples
///
/// ```rust
/// use abcscope::assembly::registry;
///
/// let spec = registry().get(0x16).unwrap();
/// assert_eq!(spec.mnemonic, "ifle");
/// assert!(registry().get(0xFF).is_none());
/// ```
pub fn registry() -> &'static OpcodeRegistry {
    AVM2_REGISTRY.get_or_init(|| {
        OpcodeRegistry::avm2()
            .unwrap_or_else(|error| panic!("Built-in AVM2 opcode table is invalid: {error}"))
    })
}

/// Byte-indexed table of opcode specifications.
#[derive(Debug, Clone)]
pub struct OpcodeRegistry {
    specs: Vec<Option<OpcodeSpec>>,
    count: usize,
}

impl Default for OpcodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl OpcodeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        OpcodeRegistry {
            specs: (0..=u8::MAX).map(|_| None).collect(),
            count: 0,
        }
    }

    /// Creates a registry holding every AVM2 opcode.
    ///
    /// # Errors
    /// Returns the first registration error of the built-in table.
    pub fn avm2() -> Result<Self> {
        let mut registry = Self::new();
        instructions::register_all(&mut registry)?;

        log::trace!("Registered {} AVM2 opcodes", registry.len());
        Ok(registry)
    }

    /// Adds a specification.
    ///
    /// The specification is validated before insertion:
    /// - operand names are unique
    /// - a derived stack consumption names a `u30` operand
    /// - branches carry a `jump_offset` of kind `s24`
    /// - switches carry `default_offset` and `case_offsets`
    ///
    /// # Errors
    /// Returns [`crate::Error::DuplicateOpcode`] if the byte is already registered and
    /// [`crate::Error::InvalidSpec`] if validation fails.
    pub fn register(&mut self, spec: OpcodeSpec) -> Result<()> {
        let slot = usize::from(spec.opcode);
        if let Some(existing) = &self.specs[slot] {
            return Err(Error::DuplicateOpcode {
                opcode: spec.opcode,
                existing: existing.mnemonic,
            });
        }

        Self::validate(&spec)?;

        self.specs[slot] = Some(spec);
        self.count += 1;
        Ok(())
    }

    fn validate(spec: &OpcodeSpec) -> Result<()> {
        let invalid = |message: String| Error::InvalidSpec {
            opcode: spec.opcode,
            message,
        };

        for (i, field) in spec.fields.iter().enumerate() {
            if spec.fields[..i].iter().any(|other| other.name == field.name) {
                return Err(invalid(format!("operand '{}' is declared twice", field.name)));
            }
        }

        if let StackConsume::Derived { field, .. } = spec.consume {
            match spec.field_kind(field) {
                Some(FieldKind::U30) => {}
                Some(kind) => {
                    return Err(invalid(format!(
                        "stack consumption derives from '{field}' which is {kind:?}, not U30"
                    )))
                }
                None => {
                    return Err(invalid(format!(
                        "stack consumption derives from missing operand '{field}'"
                    )))
                }
            }
        }

        let required: &[(&str, FieldKind)] = match spec.flow {
            FlowType::ConditionalBranch | FlowType::UnconditionalBranch => {
                &[(JUMP_OFFSET, FieldKind::S24)]
            }
            FlowType::Switch => &[
                (DEFAULT_OFFSET, FieldKind::S24),
                (CASE_OFFSETS, FieldKind::CaseOffsets),
            ],
            _ => &[],
        };
        for &(name, kind) in required {
            if spec.field_kind(name) != Some(kind) {
                return Err(invalid(format!(
                    "{} requires operand '{name}' of kind {kind:?}",
                    spec.flow
                )));
            }
        }

        Ok(())
    }

    /// Returns the specification registered for `opcode`, if any.
    #[must_use]
    pub fn get(&self, opcode: u8) -> Option<&OpcodeSpec> {
        self.specs[usize::from(opcode)].as_ref()
    }

    /// Returns the specification registered for `opcode`, read at byte `offset` of a method
    /// body.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnknownOpcode`] carrying `opcode` and `offset` if nothing is
    /// registered for the byte.
    pub fn lookup(&self, opcode: u8, offset: usize) -> Result<&OpcodeSpec> {
        self.get(opcode)
            .ok_or(Error::UnknownOpcode { opcode, offset })
    }

    /// Finds a specification by mnemonic.
    #[must_use]
    pub fn by_mnemonic(&self, mnemonic: &str) -> Option<&OpcodeSpec> {
        self.iter().find(|spec| spec.mnemonic == mnemonic)
    }

    /// Iterates over all registered specifications in opcode order.
    pub fn iter(&self) -> impl Iterator<Item = &OpcodeSpec> {
        self.specs.iter().flatten()
    }

    /// Returns the number of registered opcodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns `true` if nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}
