//! Operand field layout sublanguage.
//!
//! An opcode's operands are declared as an ordered list of [`Field`]s. Each field names a
//! [`FieldKind`] which selects the primitive reader used to decode it, and decoding yields a
//! [`FieldValue`]. Constant-pool references are decoded into [`ConstantRef`]s which carry the
//! raw index and the [`ConstantKind`] declared by the field; they are never resolved here.

use std::fmt;

use strum::{Display, EnumCount, EnumIter};

use crate::{
    reader::io::{read_i8, read_s24, read_u30, read_u8},
    Error, Result,
};

/// The constant-pool table a [`ConstantRef`] indexes into.
///
/// The kind is not encoded in the bytecode; it is fixed per operand by the opcode layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumCount)]
#[strum(serialize_all = "snake_case")]
pub enum ConstantKind {
    /// Signed integer pool
    Int,
    /// Unsigned integer pool
    #[strum(serialize = "uint")]
    UInt,
    /// Double precision pool
    Double,
    /// String pool
    String,
    /// Namespace pool
    Namespace,
    /// Multiname pool
    Multiname,
    /// Method info table
    Method,
    /// Class info table
    Class,
    /// Exception table of the enclosing method body
    Exception,
}

/// An unresolved reference into one of the ABC constant tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstantRef {
    /// Raw table index as found in the bytecode
    pub index: u32,
    /// The table the index refers to
    pub kind: ConstantKind,
}

impl ConstantRef {
    /// Creates a new constant reference.
    #[must_use]
    pub const fn new(index: u32, kind: ConstantKind) -> Self {
        ConstantRef { index, kind }
    }
}

impl fmt::Display for ConstantRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.index)
    }
}

/// The encoding of a single operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Variable-length unsigned 30-bit integer
    U30,
    /// 3-byte signed integer, used for branch offsets
    S24,
    /// Signed byte
    Byte,
    /// Unsigned byte
    UByte,
    /// `u30` index into the given constant table
    ConstRef(ConstantKind),
    /// `u30` case count `n` followed by `n + 1` `s24` offsets, as used by `lookupswitch`
    CaseOffsets,
}

impl FieldKind {
    /// Decodes one operand of this kind at `pos`.
    ///
    /// Returns the decoded value and the number of bytes consumed.
    ///
    /// # Errors
    /// Propagates the errors of the underlying primitive readers. A case table whose declared
    /// length exceeds the remaining bytes is rejected with [`crate::Error::TruncatedStream`]
    /// before anything is allocated.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use abcscope::reader::{ConstantKind, ConstantRef, FieldKind, FieldValue};
    ///
    /// let kind = FieldKind::ConstRef(ConstantKind::Multiname);
    /// let (value, size) = kind.read(&[0x4E, 0x03, 0x02], 1)?;
    /// assert_eq!(value, FieldValue::ConstRef(ConstantRef::new(3, ConstantKind::Multiname)));
    /// assert_eq!(size, 1);
    /// # Ok::<(), abcscope::Error>(())
    /// ```
    pub fn read(self, data: &[u8], pos: usize) -> Result<(FieldValue, usize)> {
        match self {
            FieldKind::U30 => read_u30(data, pos).map(|(v, n)| (FieldValue::U30(v), n)),
            FieldKind::S24 => read_s24(data, pos).map(|(v, n)| (FieldValue::S24(v), n)),
            FieldKind::Byte => read_i8(data, pos).map(|(v, n)| (FieldValue::Byte(v), n)),
            FieldKind::UByte => read_u8(data, pos).map(|(v, n)| (FieldValue::UByte(v), n)),
            FieldKind::ConstRef(kind) => read_u30(data, pos)
                .map(|(index, n)| (FieldValue::ConstRef(ConstantRef::new(index, kind)), n)),
            FieldKind::CaseOffsets => Self::read_case_offsets(data, pos),
        }
    }

    fn read_case_offsets(data: &[u8], pos: usize) -> Result<(FieldValue, usize)> {
        let (case_count, mut size) = read_u30(data, pos)?;

        let entries = case_count as usize + 1;
        let needed = entries * 3;
        let available = data.len().saturating_sub(pos + size);
        if available < needed {
            return Err(Error::TruncatedStream {
                offset: pos + size,
                needed,
                available,
            });
        }

        let mut offsets = Vec::with_capacity(entries);
        for _ in 0..entries {
            let (offset, width) = read_s24(data, pos + size)?;
            offsets.push(offset);
            size += width;
        }

        Ok((FieldValue::CaseOffsets(offsets), size))
    }
}

/// A decoded operand value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Decoded `u30`
    U30(u32),
    /// Decoded `s24`
    S24(i32),
    /// Decoded signed byte
    Byte(i8),
    /// Decoded unsigned byte
    UByte(u8),
    /// Decoded constant-pool reference
    ConstRef(ConstantRef),
    /// Decoded `lookupswitch` case offsets, relative to the switch instruction
    CaseOffsets(Vec<i32>),
}

impl FieldValue {
    /// Returns the value as an unsigned integer if it is a `u30` or an unsigned byte.
    #[must_use]
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            FieldValue::U30(v) => Some(*v),
            FieldValue::UByte(v) => Some(u32::from(*v)),
            _ => None,
        }
    }

    /// Returns the value as a signed integer for `s24` and signed byte operands.
    #[must_use]
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            FieldValue::S24(v) => Some(*v),
            FieldValue::Byte(v) => Some(i32::from(*v)),
            _ => None,
        }
    }

    /// Returns the carried constant reference, if any.
    #[must_use]
    pub fn as_constant(&self) -> Option<ConstantRef> {
        match self {
            FieldValue::ConstRef(c) => Some(*c),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::U30(v) => write!(f, "{v}"),
            FieldValue::S24(v) => write!(f, "{v}"),
            FieldValue::Byte(v) => write!(f, "{v}"),
            FieldValue::UByte(v) => write!(f, "{v}"),
            FieldValue::ConstRef(c) => write!(f, "{c}"),
            FieldValue::CaseOffsets(offsets) => {
                write!(f, "[")?;
                for (i, offset) in offsets.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{offset}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// One named operand in an opcode's layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Operand name, e.g. `jump_offset` or `arg_count`
    pub name: &'static str,
    /// How the operand is encoded
    pub kind: FieldKind,
}

impl Field {
    /// Creates a new field declaration.
    #[must_use]
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Field { name, kind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn const_ref_carries_kind() {
        let (value, size) = FieldKind::ConstRef(ConstantKind::String)
            .read(&[0x80, 0x01], 0)
            .unwrap();
        assert_eq!(size, 2);
        assert_eq!(
            value.as_constant(),
            Some(ConstantRef::new(128, ConstantKind::String))
        );
        assert_eq!(value.to_string(), "string#128");
    }

    #[test]
    fn case_offsets() {
        // case_count = 1 -> two offsets: default is read separately, these are the cases
        let data = [0x01, 0x0A, 0x00, 0x00, 0xF6, 0xFF, 0xFF];
        let (value, size) = FieldKind::CaseOffsets.read(&data, 0).unwrap();
        assert_eq!(size, 7);
        assert_eq!(value, FieldValue::CaseOffsets(vec![10, -10]));
        assert_eq!(value.to_string(), "[10, -10]");
    }

    #[test]
    fn case_offsets_huge_count_is_truncation() {
        // Declares 2^28 cases with nothing following
        let data = [0x80, 0x80, 0x80, 0x80, 0x01];
        let err = FieldKind::CaseOffsets.read(&data, 0).unwrap_err();
        assert!(matches!(err, Error::TruncatedStream { offset: 5, .. }));
    }

    #[test]
    fn accessors() {
        assert_eq!(FieldValue::U30(7).as_u32(), Some(7));
        assert_eq!(FieldValue::UByte(7).as_u32(), Some(7));
        assert_eq!(FieldValue::S24(-7).as_u32(), None);
        assert_eq!(FieldValue::Byte(-7).as_i32(), Some(-7));
        assert_eq!(FieldValue::U30(7).as_constant(), None);
    }

    #[test]
    fn constant_kinds_render_snake_case() {
        let names: Vec<String> = ConstantKind::iter().map(|k| k.to_string()).collect();
        assert!(names.contains(&"multiname".to_string()));
        assert!(names.contains(&"uint".to_string()));
        assert_eq!(names.len(), ConstantKind::COUNT);
    }
}
