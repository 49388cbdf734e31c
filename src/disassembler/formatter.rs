use std::{
    fmt::Write as _,
    io::{self, Write},
};

use crate::{
    assembly::{DecodeResult, FlowType, Instruction, OpcodeCategory},
    disassembler::{render_value, ConstantPool},
};

/// Display options for disassembly output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisasmOptions {
    /// Prefix every line with the byte offset of the instruction
    pub offsets: bool,
    /// Show the raw instruction bytes
    pub bytes: bool,
    /// Render branch operands as absolute target offsets instead of raw relative values
    pub resolve_targets: bool,
}

impl Default for DisasmOptions {
    fn default() -> Self {
        DisasmOptions {
            offsets: true,
            bytes: false,
            resolve_targets: true,
        }
    }
}

/// Formats decoded AVM2 instructions as text.
///
/// Parameters are rendered in this order of precedence:
/// 1. the custom formatter attached to the opcode specification
/// 2. resolved targets for control transfer instructions
/// 3. the decoded operands in layout order
pub struct Disassembler<'p> {
    pool: &'p dyn ConstantPool,
    opts: DisasmOptions,
}

impl<'p> Disassembler<'p> {
    /// Creates a disassembler resolving constants through `pool`.
    #[must_use]
    pub fn new(pool: &'p dyn ConstantPool, opts: DisasmOptions) -> Self {
        Self { pool, opts }
    }

    /// Returns the active options.
    #[must_use]
    pub fn options(&self) -> DisasmOptions {
        self.opts
    }

    /// Formats the parameter string shown after the mnemonic.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use abcscope::{
    ///     assembly::{decode, registry},
    ///     disassembler::{Disassembler, DisasmOptions, NoConstantPool},
    /// };
    ///
    /// let instructions = decode(&[0x16, 0x05, 0x00, 0x00], registry()).into_result()?;
    /// let disassembler = Disassembler::new(&NoConstantPool, DisasmOptions::default());
    /// assert_eq!(disassembler.format_parameters(&instructions[0]), "0009");
    /// # Ok::<(), abcscope::Error>(())
    /// ```
    #[must_use]
    pub fn format_parameters(&self, instruction: &Instruction<'_>) -> String {
        if let Some(formatter) = instruction.spec.formatter {
            return formatter(instruction, self.pool);
        }

        match instruction.category() {
            OpcodeCategory::ControlTransfer
                if self.opts.resolve_targets && instruction.flow_type().is_branch() =>
            {
                self.format_targets(instruction)
            }
            _ => self.format_fields(instruction),
        }
    }

    fn format_targets(&self, instruction: &Instruction<'_>) -> String {
        if instruction.flow_type() == FlowType::Switch {
            if let Some(switch) = instruction.switch_targets() {
                let cases: Vec<String> = switch.cases.iter().map(|&t| format_target(t)).collect();
                return format!("{} [{}]", format_target(switch.default), cases.join(", "));
            }
        } else if let Some(target) = instruction.jump_target() {
            return format_target(target);
        }

        self.format_fields(instruction)
    }

    fn format_fields(&self, instruction: &Instruction<'_>) -> String {
        instruction
            .fields
            .iter()
            .map(|(_, value)| render_value(value, self.pool))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Formats one listing line without a trailing newline.
    ///
    /// `code` is the method body the instruction was decoded from; it is only read when raw
    /// bytes are requested.
    #[must_use]
    pub fn format_instruction(&self, instruction: &Instruction<'_>, code: &[u8]) -> String {
        let mut line = String::from("    ");

        if self.opts.offsets {
            let _ = write!(line, "{:04X}: ", instruction.offset);
        }

        if self.opts.bytes {
            let bytes = code
                .get(instruction.offset..instruction.end())
                .unwrap_or_default()
                .iter()
                .map(|byte| format!("{byte:02X}"))
                .collect::<Vec<_>>()
                .join(" ");
            let _ = write!(line, "{bytes:<24} ");
        }

        let parameters = self.format_parameters(instruction);
        if parameters.is_empty() {
            line.push_str(instruction.mnemonic());
        } else {
            let _ = write!(line, "{:<16} {parameters}", instruction.mnemonic());
        }

        line
    }

    /// Writes one line per instruction.
    ///
    /// # Errors
    /// Returns any error of the underlying writer.
    pub fn write_listing(
        &self,
        w: &mut dyn Write,
        instructions: &[Instruction<'_>],
        code: &[u8],
    ) -> io::Result<()> {
        for instruction in instructions {
            writeln!(w, "{}", self.format_instruction(instruction, code))?;
        }
        Ok(())
    }

    /// Writes the instructions of a decode result, followed by a comment line describing the
    /// failure that stopped decoding, if any.
    ///
    /// # Errors
    /// Returns any error of the underlying writer.
    pub fn write_result(
        &self,
        w: &mut dyn Write,
        result: &DecodeResult<'_>,
        code: &[u8],
    ) -> io::Result<()> {
        self.write_listing(w, &result.instructions, code)?;
        if let Some(failure) = &result.failure {
            writeln!(
                w,
                "    ; decoding stopped at {:04X}: {}",
                failure.offset, failure.error
            )?;
        }
        Ok(())
    }

    /// Renders a complete listing into a string.
    #[must_use]
    pub fn listing(&self, instructions: &[Instruction<'_>], code: &[u8]) -> String {
        let mut out = Vec::new();
        // Writing into a Vec cannot fail
        let _ = self.write_listing(&mut out, instructions, code);
        String::from_utf8_lossy(&out).into_owned()
    }
}

/// Renders an absolute target; targets before the body keep their sign.
fn format_target(target: i64) -> String {
    if target < 0 {
        format!("-{:04X}", target.unsigned_abs())
    } else {
        format!("{target:04X}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::{decode, registry},
        disassembler::NoConstantPool,
        reader::ConstantRef,
    };

    fn plain() -> Disassembler<'static> {
        Disassembler::new(&NoConstantPool, DisasmOptions::default())
    }

    #[test]
    fn call_style_parameters() {
        let instructions = decode(&[0x4E, 0x03, 0x02, 0x41, 0x01, 0x43, 0x07, 0x00], registry())
            .into_result()
            .unwrap();
        let disassembler = plain();

        assert_eq!(disassembler.format_parameters(&instructions[0]), "multiname#3 (2)");
        assert_eq!(disassembler.format_parameters(&instructions[1]), "(1)");
        assert_eq!(disassembler.format_parameters(&instructions[2]), "7 (0)");
    }

    #[test]
    fn pool_resolution() {
        let pool = |c: ConstantRef| Some(format!("name{}", c.index));
        let disassembler = Disassembler::new(&pool, DisasmOptions::default());
        let instructions = decode(&[0x60, 0x05, 0x2C, 0x01], registry())
            .into_result()
            .unwrap();

        assert_eq!(disassembler.format_parameters(&instructions[0]), "name5");
        assert_eq!(disassembler.format_parameters(&instructions[1]), "name1");
    }

    #[test]
    fn branch_targets() {
        // jump -4, lookupswitch default=0, count=0, case 4
        let code = [0x10, 0xFC, 0xFF, 0xFF, 0x1B, 0x00, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00];
        let instructions = decode(&code, registry()).into_result().unwrap();

        let disassembler = plain();
        assert_eq!(disassembler.format_parameters(&instructions[0]), "0000");
        assert_eq!(disassembler.format_parameters(&instructions[1]), "0004 [0008]");

        let raw = Disassembler::new(
            &NoConstantPool,
            DisasmOptions {
                resolve_targets: false,
                ..DisasmOptions::default()
            },
        );
        assert_eq!(raw.format_parameters(&instructions[0]), "-4");
        assert_eq!(raw.format_parameters(&instructions[1]), "0, [4]");
    }

    #[test]
    fn negative_target() {
        let instructions = decode(&[0x10, 0xF0, 0xFF, 0xFF], registry())
            .into_result()
            .unwrap();
        assert_eq!(plain().format_parameters(&instructions[0]), "-000C");
    }

    #[test]
    fn listing_layout() {
        let code = [0x24, 0x05, 0x48];
        let instructions = decode(&code, registry()).into_result().unwrap();
        let listing = plain().listing(&instructions, &code);

        assert_eq!(
            listing,
            "    0000: pushbyte         5\n    0002: returnvalue\n"
        );
    }

    #[test]
    fn listing_with_bytes() {
        let code = [0x24, 0x05];
        let instructions = decode(&code, registry()).into_result().unwrap();
        let disassembler = Disassembler::new(
            &NoConstantPool,
            DisasmOptions {
                offsets: false,
                bytes: true,
                resolve_targets: true,
            },
        );

        let line = disassembler.format_instruction(&instructions[0], &code);
        assert!(line.starts_with("    24 05 "));
        assert!(line.ends_with("pushbyte         5"));
    }

    #[test]
    fn partial_result() {
        let code = [0x47, 0xFF];
        let result = decode(&code, registry());
        let mut out = Vec::new();
        plain().write_result(&mut out, &result, &code).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("returnvoid"));
        assert!(text.contains("; decoding stopped at 0001: Unknown opcode 0xFF at offset 1"));
    }
}
