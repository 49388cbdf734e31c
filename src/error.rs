use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// # Error Categories
///
/// ## Decoding Errors
/// - [`Error::UnknownOpcode`] - The byte at the cursor is not a registered opcode
/// - [`Error::TruncatedStream`] - A fixed-width operand runs past the end of the buffer
/// - [`Error::InvalidVarint`] - A `vuint30` operand is malformed or unterminated
/// - [`Error::OutOfBounds`] - A starting cursor lies outside of the buffer
///
/// ## Control Flow Errors
/// - [`Error::JumpTargetOutOfRange`] - A branch does not land on an instruction boundary
///
/// ## Registry Errors
/// - [`Error::DuplicateOpcode`] - Two specifications claim the same opcode byte
/// - [`Error::InvalidSpec`] - A specification is internally inconsistent
///
/// Decoding errors are recoverable per method body: the decoder returns them together with
/// every instruction that was decoded before the failure. Registry errors indicate a bug in an
/// opcode definition and are fatal during initialization.
///
/// # Examples
///
/// ```rust
/// use abcscope::{assembly::{decode, registry}, Error};
///
/// let result = decode(&[0xFF], registry());
/// match result.failure.map(|f| f.error) {
///     Some(Error::UnknownOpcode { opcode, offset }) => {
///         assert_eq!(opcode, 0xFF);
///         assert_eq!(offset, 0);
///     }
///     other => panic!("unexpected {other:?}"),
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The byte at `offset` does not map to any registered opcode.
    #[error("Unknown opcode 0x{opcode:02X} at offset {offset}")]
    UnknownOpcode {
        /// The unregistered opcode byte
        opcode: u8,
        /// Offset of the opcode byte within the method body
        offset: usize,
    },

    /// Not enough bytes remain for a fixed-width operand.
    #[error("Truncated stream at offset {offset}: needed {needed} bytes, {available} available")]
    TruncatedStream {
        /// Offset at which the operand starts
        offset: usize,
        /// Width of the operand in bytes
        needed: usize,
        /// Bytes remaining in the buffer
        available: usize,
    },

    /// A variable-length `u30` is longer than 5 bytes, does not fit in 30 bits, or is
    /// cut off by the end of the buffer.
    #[error("Invalid variable-length integer at offset {offset}")]
    InvalidVarint {
        /// Offset of the first byte of the encoding
        offset: usize,
    },

    /// A branch target does not coincide with the start of a decoded instruction.
    ///
    /// `target` is signed because relative offsets may point before the method body.
    #[error("Jump target {target} of instruction #{index} at {offset} is not an instruction start")]
    JumpTargetOutOfRange {
        /// Index of the branching instruction in the decoded sequence
        index: usize,
        /// Byte offset of the branching instruction
        offset: usize,
        /// The absolute byte offset the branch resolved to
        target: i64,
    },

    /// An opcode byte was registered twice.
    #[error("Opcode 0x{opcode:02X} is already registered as '{existing}'")]
    DuplicateOpcode {
        /// The conflicting opcode byte
        opcode: u8,
        /// Mnemonic of the specification that already owns the byte
        existing: &'static str,
    },

    /// An opcode specification is inconsistent, e.g. its stack consumption is derived from a
    /// field that is not part of its layout.
    #[error("Invalid specification for opcode 0x{opcode:02X}: {message}")]
    InvalidSpec {
        /// The opcode whose specification was rejected
        opcode: u8,
        /// Description of the inconsistency
        message: String,
    },

    /// An out of bound access was attempted, e.g. a starting cursor beyond the buffer.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// The input is damaged in a way not covered by the more specific variants.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },
}

impl Error {
    /// Returns the byte offset in the method body this error refers to, if any.
    #[must_use]
    pub fn offset(&self) -> Option<usize> {
        match self {
            Error::UnknownOpcode { offset, .. }
            | Error::TruncatedStream { offset, .. }
            | Error::InvalidVarint { offset }
            | Error::JumpTargetOutOfRange { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}
