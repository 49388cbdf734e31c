//! Evaluation stack effects.
//!
//! [`resolve_stack_effect`] computes how many values one instruction pops and pushes, applying
//! the derivation formula for opcodes whose consumption depends on a decoded argument count.
//! [`simulate_stack`] builds on that to propagate stack depths across a
//! [`crate::analysis::ControlFlowGraph`] and report underflow, overflow and merge points that
//! are reached with different depths.
//!
//! Depth problems are findings about the bytecode, not decode failures, so they are reported in
//! a [`StackReport`] rather than as errors.

use std::collections::VecDeque;

use crate::{
    analysis::ControlFlowGraph,
    assembly::{spec::StackConsume, Instruction},
    reader::FieldValue,
    Error, Result,
};

/// The concrete stack effect of one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StackEffect {
    /// Number of values popped
    pub pops: u32,
    /// Number of values pushed
    pub pushes: u32,
}

impl StackEffect {
    /// Net change of the stack depth.
    #[must_use]
    pub fn net(&self) -> i64 {
        i64::from(self.pushes) - i64::from(self.pops)
    }
}

/// Computes the stack effect of a single instruction.
///
/// # Errors
/// Returns [`crate::Error::InvalidSpec`] if a derived consumption names an operand that the
/// instruction does not carry as a `u30`, and [`crate::Error::Malformed`] if the derived count
/// overflows.
///
/// # Examples
///
/// ```rust
/// use abcscope::assembly::{decode, registry, resolve_stack_effect};
///
/// // call arg_count=3: function, receiver and three arguments
/// let instructions = decode(&[0x41, 0x03], registry()).into_result()?;
/// let effect = resolve_stack_effect(&instructions[0])?;
/// assert_eq!((effect.pops, effect.pushes), (5, 1));
/// assert_eq!(effect.net(), -4);
/// # Ok::<(), abcscope::Error>(())
/// ```
pub fn resolve_stack_effect(instruction: &Instruction<'_>) -> Result<StackEffect> {
    let spec = instruction.spec;
    let pops = match spec.consume {
        StackConsume::Fixed(count) => count,
        StackConsume::Derived {
            field,
            base,
            per_item,
        } => {
            let Some(FieldValue::U30(count)) = instruction.field(field) else {
                return Err(Error::InvalidSpec {
                    opcode: spec.opcode,
                    message: format!("derived stack consumption needs u30 operand '{field}'"),
                });
            };

            per_item
                .checked_mul(*count)
                .and_then(|items| items.checked_add(base))
                .ok_or_else(|| {
                    malformed_error!(
                        "Stack consumption of {} at offset {} overflows",
                        spec.mnemonic,
                        instruction.offset
                    )
                })?
        }
    };

    Ok(StackEffect {
        pops,
        pushes: spec.produce,
    })
}

/// Computes the stack effects of a whole instruction sequence.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if `cfg` was not built from `instructions`, and the first
/// error of [`resolve_stack_effect`] otherwise.
pub fn stack_effects(instructions: &[Instruction<'_>]) -> Result<Vec<StackEffect>> {
    instructions.iter().map(resolve_stack_effect).collect()
}

/// Bounds used by [`simulate_stack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StackConfig {
    /// Depth on entry to the method
    pub initial_depth: u32,
    /// Declared `max_stack` of the method body, if known
    pub max_stack: Option<u32>,
}

/// A problem found while simulating stack depths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackIssue {
    /// The instruction pops more values than are on the stack.
    Underflow {
        /// Index of the instruction
        index: usize,
        /// Depth before the instruction
        depth: u32,
        /// Values the instruction pops
        pops: u32,
    },
    /// The depth after the instruction exceeds the configured maximum.
    Overflow {
        /// Index of the instruction
        index: usize,
        /// Depth after the instruction
        depth: u32,
        /// The configured maximum
        max: u32,
    },
    /// The instruction is reached with different depths along different paths.
    InconsistentDepth {
        /// Index of the instruction reached
        index: usize,
        /// Depth recorded on the first visit
        expected: u32,
        /// Depth arriving on a later path
        found: u32,
    },
}

/// The result of [`simulate_stack`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackReport {
    /// Depth before each instruction; `None` for unreachable instructions
    pub depths: Vec<Option<u32>>,
    /// Highest depth observed after any instruction
    pub max_depth: u32,
    /// Problems found, in visiting order
    pub issues: Vec<StackIssue>,
}

impl StackReport {
    /// Returns `true` if no issues were found.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Propagates stack depths through the control flow graph, starting at the first instruction.
///
/// Each reachable instruction is visited once. An underflowing instruction continues with a
/// depth clamped at zero so that later issues are still found.
///
/// # Errors
/// Returns the first error of [`resolve_stack_effect`].
///
/// # Examples
///
/// ```rust
/// use abcscope::{
///     analysis::ControlFlowGraph,
///     assembly::{decode, registry, simulate_stack, StackConfig},
/// };
///
/// // getlocal_0, pushscope, pushbyte 1, returnvalue
/// let instructions = decode(&[0xD0, 0x30, 0x24, 0x01, 0x48], registry()).into_result()?;
/// let cfg = ControlFlowGraph::build(&instructions);
/// let report = simulate_stack(&instructions, &cfg, StackConfig::default())?;
/// assert!(report.is_clean());
/// assert_eq!(report.max_depth, 1);
/// # Ok::<(), abcscope::Error>(())
/// ```
pub fn simulate_stack(
    instructions: &[Instruction<'_>],
    cfg: &ControlFlowGraph,
    config: StackConfig,
) -> Result<StackReport> {
    if cfg.len() != instructions.len() {
        return Err(malformed_error!(
            "Control flow graph covers {} instructions, the body has {}",
            cfg.len(),
            instructions.len()
        ));
    }

    let effects = stack_effects(instructions)?;
    let mut report = StackReport {
        depths: vec![None; instructions.len()],
        max_depth: config.initial_depth,
        issues: Vec::new(),
    };

    if instructions.is_empty() {
        return Ok(report);
    }

    let mut worklist = VecDeque::from([0_usize]);
    report.depths[0] = Some(config.initial_depth);

    while let Some(index) = worklist.pop_front() {
        let Some(depth) = report.depths[index] else {
            continue;
        };
        let effect = effects[index];

        if depth < effect.pops {
            report.issues.push(StackIssue::Underflow {
                index,
                depth,
                pops: effect.pops,
            });
        }
        let after = depth.saturating_sub(effect.pops).saturating_add(effect.pushes);

        report.max_depth = report.max_depth.max(after);
        if let Some(max) = config.max_stack {
            if after > max {
                report.issues.push(StackIssue::Overflow {
                    index,
                    depth: after,
                    max,
                });
            }
        }

        for successor in cfg.successors(index) {
            match report.depths[successor] {
                None => {
                    report.depths[successor] = Some(after);
                    worklist.push_back(successor);
                }
                Some(expected) if expected != after => {
                    report.issues.push(StackIssue::InconsistentDepth {
                        index: successor,
                        expected,
                        found: after,
                    });
                }
                Some(_) => {}
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::{decode, registry};

    fn simulate(code: &[u8], config: StackConfig) -> StackReport {
        let instructions = decode(code, registry()).into_result().unwrap();
        let cfg = ControlFlowGraph::build(&instructions);
        simulate_stack(&instructions, &cfg, config).unwrap()
    }

    #[test]
    fn derived_effects() {
        // callsupervoid #3 (2), newobject 2, newarray 3, constructsuper 0
        let code = [0x4E, 0x03, 0x02, 0x55, 0x02, 0x56, 0x03, 0x49, 0x00];
        let instructions = decode(&code, registry()).into_result().unwrap();
        let effects = stack_effects(&instructions).unwrap();

        assert_eq!(effects[0], StackEffect { pops: 3, pushes: 0 });
        assert_eq!(effects[1], StackEffect { pops: 4, pushes: 1 });
        assert_eq!(effects[2], StackEffect { pops: 3, pushes: 1 });
        assert_eq!(effects[3], StackEffect { pops: 1, pushes: 0 });
    }

    #[test]
    fn fixed_effects() {
        // dup, swap, ifle +0
        let code = [0x2A, 0x2B, 0x16, 0x00, 0x00, 0x00];
        let instructions = decode(&code, registry()).into_result().unwrap();
        let effects = stack_effects(&instructions).unwrap();
        assert_eq!(effects[0].net(), 1);
        assert_eq!(effects[1].net(), 0);
        assert_eq!(effects[2], StackEffect { pops: 2, pushes: 0 });
    }

    #[test]
    fn missing_derived_operand() {
        let instructions = decode(&[0x41, 0x01], registry()).into_result().unwrap();
        let mut broken = instructions[0].clone();
        broken.fields.clear();
        assert!(matches!(
            resolve_stack_effect(&broken),
            Err(Error::InvalidSpec { opcode: 0x41, .. })
        ));
    }

    #[test]
    fn graph_of_another_body() {
        // nop, returnvoid against the graph of nop, nop, nop, returnvoid
        let short = decode(&[0x02, 0x47], registry()).into_result().unwrap();
        let long = decode(&[0x02, 0x02, 0x02, 0x47], registry())
            .into_result()
            .unwrap();
        let cfg = ControlFlowGraph::build(&long);

        assert!(matches!(
            simulate_stack(&short, &cfg, StackConfig::default()),
            Err(Error::Malformed { .. })
        ));
        assert!(simulate_stack(&long, &cfg, StackConfig::default()).is_ok());
    }

    #[test]
    fn underflow() {
        // pop on an empty stack, returnvoid
        let report = simulate(&[0x29, 0x47], StackConfig::default());
        assert_eq!(
            report.issues,
            vec![StackIssue::Underflow {
                index: 0,
                depth: 0,
                pops: 1
            }]
        );
        assert_eq!(report.depths, vec![Some(0), Some(0)]);
    }

    #[test]
    fn overflow() {
        // pushtrue, pushtrue, pop, pop, returnvoid
        let config = StackConfig {
            initial_depth: 0,
            max_stack: Some(1),
        };
        let report = simulate(&[0x26, 0x26, 0x29, 0x29, 0x47], config);
        assert_eq!(
            report.issues,
            vec![StackIssue::Overflow {
                index: 1,
                depth: 2,
                max: 1
            }]
        );
        assert_eq!(report.max_depth, 2);
    }

    #[test]
    fn inconsistent_merge() {
        // 0: pushtrue
        // 1: iftrue +1     -> 6
        // 5: pushnull
        // 6: returnvoid    reached with depth 0 and 1
        let report = simulate(&[0x26, 0x11, 0x01, 0x00, 0x00, 0x20, 0x47], StackConfig::default());
        assert_eq!(
            report.issues,
            vec![StackIssue::InconsistentDepth {
                index: 3,
                expected: 0,
                found: 1
            }]
        );
    }

    #[test]
    fn loop_is_consistent() {
        // 0: label
        // 1: pushtrue
        // 2: iftrue -6 -> 0
        // 6: returnvoid
        let report = simulate(&[0x09, 0x26, 0x11, 0xFA, 0xFF, 0xFF, 0x47], StackConfig::default());
        assert!(report.is_clean());
        assert_eq!(report.depths, vec![Some(0), Some(0), Some(1), Some(0)]);
    }

    #[test]
    fn unreachable_code_has_no_depth() {
        // returnvoid, nop
        let report = simulate(&[0x47, 0x02], StackConfig::default());
        assert_eq!(report.depths, vec![Some(0), None]);
    }
}
