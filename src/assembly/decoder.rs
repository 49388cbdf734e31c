//! AVM2 instruction decoding.
//!
//! This module turns the raw `code` bytes of a method body into an ordered, gapless sequence of
//! [`Instruction`]s. Decoding is entirely table driven: the opcode byte selects an
//! [`crate::assembly::OpcodeSpec`] from the registry, and its operand layout selects the field
//! readers that are applied in declaration order.
//!
//! # Key Components
//!
//! - [`decode_instruction`] - Core single instruction decoder
//! - [`decode`] / [`decode_from`] - Linear decoding of a whole method body
//! - [`decode_all`] - Parallel decoding of many method bodies
//! - [`DecodeResult`] - The decoded instructions plus the failure that stopped decoding, if any
//!
//! # Partial Results
//!
//! Malformed input never aborts the caller. When an opcode is unknown or an operand cannot be
//! read, decoding stops and the instructions decoded so far are returned together with a
//! [`DecodeFailure`]. Callers decide whether a partial listing is useful.
//!
//! # Usage Examples
//!
//! ```rust
//! use abcscope::assembly::{decode, registry};
//!
//! // pushbyte 5, returnvalue, <unknown 0xFF>
//! let result = decode(&[0x24, 0x05, 0x48, 0xFF], registry());
//! assert_eq!(result.instructions.len(), 2);
//! assert!(!result.is_complete());
//! assert_eq!(result.failure.as_ref().map(|f| f.offset), Some(3));
//! assert_eq!(result.bytes_decoded(), 3);
//! ```

use rayon::prelude::*;

use crate::{
    assembly::{Instruction, OpcodeRegistry},
    reader::Parser,
    Error, Result,
};

/// The error that stopped a decode, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeFailure {
    /// Start offset of the instruction that could not be decoded
    pub offset: usize,
    /// The reason; carries the exact byte offset of the failing read
    pub error: Error,
}

/// The outcome of decoding one method body.
#[derive(Debug, Clone)]
pub struct DecodeResult<'r> {
    /// Every instruction decoded before decoding stopped
    pub instructions: Vec<Instruction<'r>>,
    /// Why decoding stopped early, `None` if the whole buffer was consumed
    pub failure: Option<DecodeFailure>,
}

impl<'r> DecodeResult<'r> {
    /// Returns `true` if the whole buffer was decoded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    /// Number of bytes covered by the decoded instructions.
    #[must_use]
    pub fn bytes_decoded(&self) -> usize {
        self.instructions.iter().map(|instr| instr.size).sum()
    }

    /// Converts into a plain [`Result`], discarding partial output on failure.
    ///
    /// # Errors
    /// Returns the error that stopped decoding.
    pub fn into_result(self) -> Result<Vec<Instruction<'r>>> {
        match self.failure {
            Some(failure) => Err(failure.error),
            None => Ok(self.instructions),
        }
    }
}

/// Decodes a single instruction at the current parser position.
///
/// The parser is advanced past the instruction on success and left untouched on failure.
///
/// # Arguments
///
/// * `parser` - A parser positioned at the start of an instruction
/// * `registry` - The opcode table to decode with
/// * `index` - The position of the instruction in its sequence
///
/// # Errors
///
/// - [`crate::Error::UnknownOpcode`] if the opcode byte is not registered
/// - [`crate::Error::TruncatedStream`] / [`crate::Error::InvalidVarint`] if an operand cannot
///   be read
///
/// # Examples
///
/// ```rust
/// use abcscope::{assembly::{decode_instruction, registry}, Parser};
///
/// // callsupervoid property=#3, arg_count=2
/// let mut parser = Parser::new(&[0x4E, 0x03, 0x02]);
/// let instr = decode_instruction(&mut parser, registry(), 0)?;
/// assert_eq!(instr.mnemonic(), "callsupervoid");
/// assert_eq!(instr.size, 3);
/// assert!(!parser.has_more_data());
/// # Ok::<(), abcscope::Error>(())
/// ```
pub fn decode_instruction<'r>(
    parser: &mut Parser<'_>,
    registry: &'r OpcodeRegistry,
    index: usize,
) -> Result<Instruction<'r>> {
    parser.transactional(|parser| {
        let offset = parser.pos();
        let opcode = parser.read_u8()?;
        let spec = registry.lookup(opcode, offset)?;

        let mut fields = Vec::with_capacity(spec.fields.len());
        for field in &spec.fields {
            fields.push((field.name, parser.read_field(field.kind)?));
        }

        Ok(Instruction {
            spec,
            offset,
            size: parser.pos() - offset,
            index,
            fields,
        })
    })
}

/// Decodes a whole method body.
///
/// Equivalent to [`decode_from`] with a starting cursor of `0`.
#[must_use]
pub fn decode<'r>(data: &[u8], registry: &'r OpcodeRegistry) -> DecodeResult<'r> {
    decode_from(data, 0, registry)
}

/// Decodes a method body starting at `start` until the end of `data`.
///
/// Instruction offsets are positions within `data`, not relative to `start`.
///
/// # Examples
///
/// ```rust
/// use abcscope::assembly::{decode_from, registry};
///
/// // garbage, then getlocal_0, returnvalue
/// let result = decode_from(&[0xFF, 0xD0, 0x48], 1, registry());
/// assert!(result.is_complete());
/// assert_eq!(result.instructions[0].offset, 1);
///
/// assert!(!decode_from(&[0x47], 2, registry()).is_complete());
/// ```
#[must_use]
pub fn decode_from<'r>(
    data: &[u8],
    start: usize,
    registry: &'r OpcodeRegistry,
) -> DecodeResult<'r> {
    let mut parser = Parser::new(data);
    let mut instructions = Vec::new();

    if let Err(error) = parser.seek(start) {
        return DecodeResult {
            instructions,
            failure: Some(DecodeFailure {
                offset: start,
                error,
            }),
        };
    }

    while parser.has_more_data() {
        let offset = parser.pos();
        match decode_instruction(&mut parser, registry, instructions.len()) {
            Ok(instruction) => instructions.push(instruction),
            Err(error) => {
                log::debug!(
                    "Decoding stopped at offset {offset} after {} instructions: {error}",
                    instructions.len()
                );
                return DecodeResult {
                    instructions,
                    failure: Some(DecodeFailure { offset, error }),
                };
            }
        }
    }

    DecodeResult {
        instructions,
        failure: None,
    }
}

/// Decodes many method bodies in parallel.
///
/// The registry is only read, so all bodies share it. Results are returned in input order.
///
/// # Examples
///
/// ```rust
/// use abcscope::assembly::{decode_all, registry};
///
/// let bodies: Vec<Vec<u8>> = vec![vec![0x47], vec![0xD0, 0x48], vec![0xFF]];
/// let results = decode_all(&bodies, registry());
/// assert_eq!(results.len(), 3);
/// assert!(results[1].is_complete());
/// assert!(!results[2].is_complete());
/// ```
#[must_use]
pub fn decode_all<'r, B>(bodies: &[B], registry: &'r OpcodeRegistry) -> Vec<DecodeResult<'r>>
where
    B: AsRef<[u8]> + Sync,
{
    bodies
        .par_iter()
        .map(|body| decode(body.as_ref(), registry))
        .collect()
}
