//! Cursor-based byte reader for AVM2 method bodies.
//!
//! [`Parser`] wraps a byte slice and a position and exposes the primitive readers from
//! [`crate::reader::io`] as advancing methods. The decoder uses it to walk a method body one
//! instruction at a time; it is also convenient for callers that need to peek into raw code.
//!
//! # Examples
//!
//! ```rust
//! use abcscope::Parser;
//!
//! // ifle +5
//! let mut parser = Parser::new(&[0x16, 0x05, 0x00, 0x00]);
//! assert_eq!(parser.read_u8()?, 0x16);
//! assert_eq!(parser.read_s24()?, 5);
//! assert_eq!(parser.pos(), 4);
//! # Ok::<(), abcscope::Error>(())
//! ```

use crate::{
    reader::{
        field::{FieldKind, FieldValue},
        io::{read_i8, read_s24, read_u30, read_u8},
    },
    Error, Result,
};

/// A cursor over a method body.
///
/// All reads are bounds-checked and a failed read leaves the position untouched.
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`Parser`] from a byte slice.
    ///
    /// # Arguments
    /// * `data` - The byte slice to read from
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if there is more data available to parse.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Move the current position to the specified index.
    ///
    /// Seeking to `len()` is allowed and leaves the parser exhausted.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if position is beyond the data length.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(Error::OutOfBounds);
        }

        self.position = pos;
        Ok(())
    }

    /// Get the current position of the parser within the data buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Get access to the underlying data buffer.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Peek at the next byte without advancing the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedStream`] if the parser is exhausted.
    pub fn peek_byte(&self) -> Result<u8> {
        read_u8(self.data, self.position).map(|(value, _)| value)
    }

    /// Read an unsigned byte and advance.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedStream`] if the parser is exhausted.
    pub fn read_u8(&mut self) -> Result<u8> {
        let (value, size) = read_u8(self.data, self.position)?;
        self.position += size;
        Ok(value)
    }

    /// Read a signed byte and advance.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedStream`] if the parser is exhausted.
    pub fn read_i8(&mut self) -> Result<i8> {
        let (value, size) = read_i8(self.data, self.position)?;
        self.position += size;
        Ok(value)
    }

    /// Read a 3-byte signed integer and advance.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedStream`] if fewer than 3 bytes remain.
    pub fn read_s24(&mut self) -> Result<i32> {
        let (value, size) = read_s24(self.data, self.position)?;
        self.position += size;
        Ok(value)
    }

    /// Read a variable-length 30-bit unsigned integer and advance.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidVarint`] for malformed or unterminated encodings.
    pub fn read_u30(&mut self) -> Result<u32> {
        let (value, size) = read_u30(self.data, self.position)?;
        self.position += size;
        Ok(value)
    }

    /// Read one operand of the given kind and advance.
    ///
    /// # Errors
    /// Propagates the error of the reader selected by `kind`.
    pub fn read_field(&mut self, kind: FieldKind) -> Result<FieldValue> {
        let (value, size) = kind.read(self.data, self.position)?;
        self.position += size;
        Ok(value)
    }

    /// Execute a closure transactionally, rolling back on failure.
    ///
    /// The position change made by `f` is only kept if it returns `Ok`.
    ///
    /// # Errors
    /// Returns any error produced by the closure `f`.
    pub fn transactional<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let saved_position = self.position;
        let result = f(self);
        if result.is_err() {
            self.position = saved_position;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::ConstantKind;

    #[test]
    fn sequential_reads() {
        let data = [0x4E, 0x03, 0x02, 0xFF, 0x80, 0x01];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_u8().unwrap(), 0x4E);
        assert_eq!(
            parser
                .read_field(FieldKind::ConstRef(ConstantKind::Multiname))
                .unwrap()
                .as_constant()
                .map(|c| c.index),
            Some(3)
        );
        assert_eq!(parser.read_u30().unwrap(), 2);
        assert_eq!(parser.read_i8().unwrap(), -1);
        assert_eq!(parser.read_u30().unwrap(), 128);
        assert!(!parser.has_more_data());
    }

    #[test]
    fn failed_read_keeps_position() {
        let mut parser = Parser::new(&[0x10, 0x01]);
        parser.read_u8().unwrap();

        assert!(parser.read_s24().is_err());
        assert_eq!(parser.pos(), 1);
        assert_eq!(parser.peek_byte().unwrap(), 0x01);
    }

    #[test]
    fn seek_bounds() {
        let mut parser = Parser::new(&[0x00, 0x01]);
        assert!(parser.seek(2).is_ok());
        assert!(!parser.has_more_data());
        assert_eq!(parser.seek(3), Err(Error::OutOfBounds));
    }

    #[test]
    fn transactional_rolls_back() {
        let mut parser = Parser::new(&[0x01, 0x80]);
        let result: Result<(u32, u32)> =
            parser.transactional(|p| Ok((p.read_u30()?, p.read_u30()?)));
        assert!(result.is_err());
        assert_eq!(parser.pos(), 0);
    }

    #[test]
    fn empty() {
        let parser = Parser::new(&[]);
        assert!(parser.is_empty());
        assert_eq!(parser.len(), 0);
        assert!(parser.peek_byte().is_err());
    }
}
