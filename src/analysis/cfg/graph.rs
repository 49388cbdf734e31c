//! Control Flow Graph implementation.
//!
//! [`ControlFlowGraph::build`] resolves the branch targets of a decoded instruction sequence
//! and connects instructions with [`CfgEdge`]s. Targets that do not land on the start of a
//! decoded instruction are reported per instruction in [`ControlFlowGraph::errors`]; the rest of
//! the graph is still built. On top of the instruction-level edges the graph partitions the
//! sequence into [`BasicBlock`]s and renders itself in Graphviz DOT format.

use std::fmt::Write;

use crate::{
    analysis::{
        cfg::{CfgEdge, CfgEdgeKind},
        BoundaryMap,
    },
    assembly::{FlowType, Instruction},
    utils::escape_dot,
    Error,
};

/// A maximal straight-line run of instructions.
///
/// Only the first instruction of a block is a jump target and only the last one may branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    /// Block identifier, equal to its position in [`ControlFlowGraph::blocks`]
    pub id: usize,
    /// Index of the first instruction
    pub start: usize,
    /// Index one past the last instruction
    pub end: usize,
    /// Byte offset of the first instruction
    pub offset: usize,
    /// Identifiers of the blocks control may continue with
    pub successors: Vec<usize>,
    /// Identifiers of the blocks control may arrive from
    pub predecessors: Vec<usize>,
}

impl BasicBlock {
    /// Number of instructions in the block.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns `true` for a block without instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Index of the last instruction.
    #[must_use]
    pub fn last(&self) -> usize {
        self.end.saturating_sub(1)
    }

    /// Returns `true` if the block contains the instruction index.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        (self.start..self.end).contains(&index)
    }
}

/// Instruction-level control flow graph of one method body.
///
/// # Examples
///
/// ```rust
/// use abcscope::{analysis::{CfgEdgeKind, ControlFlowGraph}, assembly::{decode, registry}};
///
/// // 0: iftrue +1, 4: returnvoid, 5: returnvoid
/// let instructions = decode(&[0x11, 0x01, 0x00, 0x00, 0x47, 0x47], registry()).into_result()?;
/// let cfg = ControlFlowGraph::build(&instructions);
///
/// assert!(cfg.is_valid());
/// assert_eq!(cfg.successors(0).collect::<Vec<_>>(), vec![1, 2]);
/// assert_eq!(cfg.outgoing(0).nth(1).map(|e| e.kind()), Some(CfgEdgeKind::ConditionalTrue));
/// assert_eq!(cfg.blocks().len(), 3);
/// # Ok::<(), abcscope::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ControlFlowGraph {
    edges: Vec<CfgEdge>,
    outgoing: Vec<Vec<usize>>,
    incoming: Vec<Vec<usize>>,
    errors: Vec<Error>,
    labels: Vec<String>,
    offsets: Vec<usize>,
    blocks: Vec<BasicBlock>,
    block_index: Vec<usize>,
}

impl ControlFlowGraph {
    /// Builds the graph for a decoded instruction sequence.
    ///
    /// - sequential and call instructions fall through to the next instruction
    /// - conditional branches fall through and branch to their target
    /// - `jump` branches to its target only
    /// - `lookupswitch` branches to its default target and to every case
    /// - returns and `throw` have no successors
    ///
    /// Falling through past the last instruction produces no edge.
    #[must_use]
    pub fn build(instructions: &[Instruction<'_>]) -> Self {
        let boundaries = BoundaryMap::new(instructions);
        let count = instructions.len();

        let mut cfg = ControlFlowGraph {
            outgoing: vec![Vec::new(); count],
            incoming: vec![Vec::new(); count],
            labels: instructions.iter().map(ToString::to_string).collect(),
            offsets: instructions.iter().map(|instr| instr.offset).collect(),
            ..Self::default()
        };

        for (index, instruction) in instructions.iter().enumerate() {
            let next = (index + 1 < count).then_some(index + 1);

            match instruction.flow_type() {
                FlowType::Sequential | FlowType::Call => {
                    if let Some(next) = next {
                        cfg.add_edge(index, next, CfgEdgeKind::Fallthrough);
                    }
                }
                FlowType::ConditionalBranch => {
                    if let Some(next) = next {
                        cfg.add_edge(index, next, CfgEdgeKind::ConditionalFalse);
                    }
                    if let Some(target) = instruction.jump_target() {
                        cfg.add_target(
                            &boundaries,
                            index,
                            instruction,
                            target,
                            CfgEdgeKind::ConditionalTrue,
                        );
                    }
                }
                FlowType::UnconditionalBranch => {
                    if let Some(target) = instruction.jump_target() {
                        cfg.add_target(
                            &boundaries,
                            index,
                            instruction,
                            target,
                            CfgEdgeKind::Unconditional,
                        );
                    }
                }
                FlowType::Switch => {
                    if let Some(switch) = instruction.switch_targets() {
                        cfg.add_target(
                            &boundaries,
                            index,
                            instruction,
                            switch.default,
                            CfgEdgeKind::Switch { case: None },
                        );
                        for (case, target) in switch.cases.into_iter().enumerate() {
                            cfg.add_target(
                                &boundaries,
                                index,
                                instruction,
                                target,
                                CfgEdgeKind::Switch { case: Some(case) },
                            );
                        }
                    }
                }
                FlowType::Return | FlowType::Throw => {}
            }
        }

        cfg.build_blocks(instructions);
        cfg
    }

    fn add_edge(&mut self, source: usize, target: usize, kind: CfgEdgeKind) {
        let id = self.edges.len();
        self.edges.push(CfgEdge::new(source, target, kind));
        self.outgoing[source].push(id);
        self.incoming[target].push(id);
    }

    fn add_target(
        &mut self,
        boundaries: &BoundaryMap,
        index: usize,
        instruction: &Instruction<'_>,
        target: i64,
        kind: CfgEdgeKind,
    ) {
        match boundaries.index_of(target) {
            Some(target) => self.add_edge(index, target, kind),
            None => {
                log::warn!(
                    "{} at offset {} targets {target}, which is not an instruction start",
                    instruction.mnemonic(),
                    instruction.offset
                );
                self.errors.push(Error::JumpTargetOutOfRange {
                    index,
                    offset: instruction.offset,
                    target,
                });
            }
        }
    }

    fn build_blocks(&mut self, instructions: &[Instruction<'_>]) {
        let count = instructions.len();
        let mut leader = vec![false; count];

        if let Some(first) = leader.first_mut() {
            *first = true;
        }
        for edge in &self.edges {
            if !edge.kind().is_fallthrough() {
                leader[edge.target()] = true;
            }
        }
        for (index, instruction) in instructions.iter().enumerate() {
            if instruction.flow_type().ends_block() && index + 1 < count {
                leader[index + 1] = true;
            }
        }

        self.block_index = vec![0; count];
        for index in 0..count {
            if leader[index] {
                self.blocks.push(BasicBlock {
                    id: self.blocks.len(),
                    start: index,
                    end: index,
                    offset: instructions[index].offset,
                    successors: Vec::new(),
                    predecessors: Vec::new(),
                });
            }
            if let Some(block) = self.blocks.last_mut() {
                block.end = index + 1;
                self.block_index[index] = block.id;
            }
        }

        for edge in &self.edges {
            let source = self.block_index[edge.source()];
            let target = self.block_index[edge.target()];
            if self.blocks[source].last() != edge.source() {
                continue;
            }
            if !self.blocks[source].successors.contains(&target) {
                self.blocks[source].successors.push(target);
                self.blocks[target].predecessors.push(source);
            }
        }
    }

    /// Number of instructions in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outgoing.len()
    }

    /// Returns `true` for a graph over an empty instruction sequence.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outgoing.is_empty()
    }

    /// Returns `true` if every branch target resolved to an instruction start.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// The [`crate::Error::JumpTargetOutOfRange`] errors found while building, one per
    /// unresolved target.
    #[must_use]
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// All edges in construction order.
    #[must_use]
    pub fn edges(&self) -> &[CfgEdge] {
        &self.edges
    }

    /// Outgoing edges of an instruction, fallthrough first.
    pub fn outgoing(&self, index: usize) -> impl Iterator<Item = &CfgEdge> + '_ {
        self.outgoing
            .get(index)
            .into_iter()
            .flatten()
            .map(|&id| &self.edges[id])
    }

    /// Incoming edges of an instruction.
    pub fn incoming(&self, index: usize) -> impl Iterator<Item = &CfgEdge> + '_ {
        self.incoming
            .get(index)
            .into_iter()
            .flatten()
            .map(|&id| &self.edges[id])
    }

    /// Indices of the instructions control may continue with.
    pub fn successors(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.outgoing(index).map(CfgEdge::target)
    }

    /// Indices of the instructions control may arrive from.
    pub fn predecessors(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.incoming(index).map(CfgEdge::source)
    }

    /// The basic blocks in instruction order; block `0` is the entry.
    #[must_use]
    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    /// Returns the block containing an instruction.
    #[must_use]
    pub fn block_of(&self, index: usize) -> Option<&BasicBlock> {
        self.block_index
            .get(index)
            .and_then(|&block| self.blocks.get(block))
    }

    /// Marks every instruction reachable from the entry.
    #[must_use]
    pub fn reachable(&self) -> Vec<bool> {
        let mut seen = vec![false; self.len()];
        let mut stack = Vec::new();
        if !seen.is_empty() {
            seen[0] = true;
            stack.push(0);
        }

        while let Some(index) = stack.pop() {
            for successor in self.successors(index) {
                if !seen[successor] {
                    seen[successor] = true;
                    stack.push(successor);
                }
            }
        }

        seen
    }

    /// Generates a DOT format representation of the block graph.
    ///
    /// Each node lists the instructions of one basic block; the entry block is highlighted and
    /// edges are coloured by kind.
    ///
    /// # Arguments
    ///
    /// * `title` - Optional title for the graph
    ///
    /// # Examples
    ///
    /// ```rust
    /// use abcscope::{analysis::ControlFlowGraph, assembly::{decode, registry}};
    ///
    /// let instructions = decode(&[0x11, 0x00, 0x00, 0x00, 0x47], registry()).into_result()?;
    /// let dot = ControlFlowGraph::build(&instructions).to_dot(Some("main"));
    /// assert!(dot.starts_with("digraph CFG {"));
    /// assert!(dot.contains("label=\"true\""));
    /// # Ok::<(), abcscope::Error>(())
    /// ```
    #[must_use]
    pub fn to_dot(&self, title: Option<&str>) -> String {
        let mut dot = String::new();

        dot.push_str("digraph CFG {\n");
        if let Some(name) = title {
            let _ = writeln!(dot, "    label=\"CFG: {}\";", escape_dot(name));
        }
        dot.push_str("    labelloc=t;\n");
        dot.push_str("    node [shape=box, fontname=\"Courier\", fontsize=10];\n");
        dot.push_str("    edge [fontname=\"Courier\", fontsize=9];\n\n");

        for block in &self.blocks {
            let node_name = format!("B{}_{:04X}", block.id, block.offset);
            let mut label = node_name.clone();
            if block.id == 0 {
                label.push_str(" (entry)");
            }
            label.push_str("\\l");

            for index in block.start..block.end {
                let _ = write!(
                    label,
                    "{:04X}: {}\\l",
                    self.offsets[index],
                    escape_dot(&self.labels[index])
                );
            }

            let style = if block.id == 0 {
                ", style=filled, fillcolor=lightgreen"
            } else if block.successors.is_empty() {
                ", style=filled, fillcolor=lightcoral"
            } else {
                ""
            };

            let _ = writeln!(dot, "    {node_name} [label=\"{label}\"{style}];");
        }

        dot.push('\n');

        for block in &self.blocks {
            let source_name = format!("B{}_{:04X}", block.id, block.offset);

            for edge in self.outgoing(block.last()) {
                let Some(target) = self.block_of(edge.target()) else {
                    continue;
                };
                let target_name = format!("B{}_{:04X}", target.id, target.offset);

                let color = match edge.kind() {
                    CfgEdgeKind::Fallthrough => "gray",
                    CfgEdgeKind::Unconditional => "black",
                    CfgEdgeKind::ConditionalTrue => "green",
                    CfgEdgeKind::ConditionalFalse => "red",
                    CfgEdgeKind::Switch { .. } => "blue",
                };

                let _ = writeln!(
                    dot,
                    "    {source_name} -> {target_name} [label=\"{}\", color={color}];",
                    escape_dot(&edge.kind().label())
                );
            }
        }

        dot.push_str("}\n");
        dot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::{decode, registry};

    fn build(code: &[u8]) -> ControlFlowGraph {
        let instructions = decode(code, registry()).into_result().unwrap();
        ControlFlowGraph::build(&instructions)
    }

    #[test]
    fn conditional_then_terminal() {
        // ifle +0, returnvoid: both edges of the branch reach the return
        let cfg = build(&[0x16, 0x00, 0x00, 0x00, 0x47]);

        assert!(cfg.is_valid());
        let kinds: Vec<CfgEdgeKind> = cfg.outgoing(0).map(CfgEdge::kind).collect();
        assert_eq!(
            kinds,
            vec![CfgEdgeKind::ConditionalFalse, CfgEdgeKind::ConditionalTrue]
        );
        assert_eq!(cfg.successors(0).collect::<Vec<_>>(), vec![1, 1]);
        assert_eq!(cfg.outgoing(1).count(), 0);
        assert_eq!(cfg.predecessors(1).count(), 2);
    }

    #[test]
    fn target_inside_instruction() {
        // ifle -2 lands on its own operand bytes, returnvoid
        let cfg = build(&[0x16, 0xFE, 0xFF, 0xFF, 0x47]);

        assert!(!cfg.is_valid());
        assert_eq!(
            cfg.errors(),
            &[Error::JumpTargetOutOfRange {
                index: 0,
                offset: 0,
                target: 2
            }]
        );
        // the fallthrough edge is still there
        assert_eq!(cfg.successors(0).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn errors_are_per_instruction() {
        // jump +100, jump -8 (to 0), jump -20
        let code = [
            0x10, 0x64, 0x00, 0x00, 0x10, 0xF8, 0xFF, 0xFF, 0x10, 0xEC, 0xFF, 0xFF,
        ];
        let cfg = build(&code);

        let indices: Vec<Option<usize>> = cfg
            .errors()
            .iter()
            .map(|error| match error {
                Error::JumpTargetOutOfRange { index, .. } => Some(*index),
                _ => None,
            })
            .collect();
        assert_eq!(indices, vec![Some(0), Some(2)]);
        assert_eq!(cfg.successors(1).collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn self_jump() {
        // jump -4
        let cfg = build(&[0x10, 0xFC, 0xFF, 0xFF]);
        assert!(cfg.is_valid());
        assert_eq!(cfg.successors(0).collect::<Vec<_>>(), vec![0]);
        assert_eq!(cfg.blocks().len(), 1);
        assert_eq!(cfg.blocks()[0].successors, vec![0]);
    }

    #[test]
    fn lookupswitch_edges() {
        // 0: getlocal_1
        // 1: lookupswitch default=+11, cases [+12, +13]  -> 12, 13, 14
        // 12..=15: returnvoid
        let code = [
            0xD1, 0x1B, 0x0B, 0x00, 0x00, 0x01, 0x0C, 0x00, 0x00, 0x0D, 0x00, 0x00, 0x47, 0x47,
            0x47, 0x47,
        ];
        let cfg = build(&code);

        assert!(cfg.is_valid());
        let edges: Vec<(usize, CfgEdgeKind)> = cfg
            .outgoing(1)
            .map(|edge| (edge.target(), edge.kind()))
            .collect();
        assert_eq!(
            edges,
            vec![
                (2, CfgEdgeKind::Switch { case: None }),
                (3, CfgEdgeKind::Switch { case: Some(0) }),
                (4, CfgEdgeKind::Switch { case: Some(1) }),
            ]
        );
        assert!(!cfg.reachable()[5]);
    }

    #[test]
    fn lookupswitch_case_inside_instruction() {
        // 0:  getlocal_1
        // 1:  lookupswitch default=+11, cases [+12, +13]  -> 12, 13, 14
        // 12: pushbyte 5
        // 14: returnvalue
        let code = [
            0xD1, 0x1B, 0x0B, 0x00, 0x00, 0x01, 0x0C, 0x00, 0x00, 0x0D, 0x00, 0x00, 0x24, 0x05,
            0x48,
        ];
        let cfg = build(&code);

        assert!(!cfg.is_valid());
        assert_eq!(
            cfg.errors(),
            &[Error::JumpTargetOutOfRange {
                index: 1,
                offset: 1,
                target: 13
            }]
        );
        let edges: Vec<(usize, CfgEdgeKind)> = cfg
            .outgoing(1)
            .map(|edge| (edge.target(), edge.kind()))
            .collect();
        assert_eq!(
            edges,
            vec![
                (2, CfgEdgeKind::Switch { case: None }),
                (3, CfgEdgeKind::Switch { case: Some(1) }),
            ]
        );
    }

    #[test]
    fn blocks_and_successors() {
        // 0: pushtrue
        // 1: iftrue +4   -> 9
        // 5: jump +0     -> 9
        // 9: returnvoid
        let code = [0x26, 0x11, 0x04, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x47];
        let cfg = build(&code);
        let blocks = cfg.blocks();

        assert_eq!(blocks.len(), 3);
        assert_eq!((blocks[0].start, blocks[0].end), (0, 2));
        assert_eq!((blocks[1].start, blocks[1].end), (2, 3));
        assert_eq!((blocks[2].start, blocks[2].end, blocks[2].offset), (3, 4, 9));

        assert_eq!(blocks[0].successors, vec![1, 2]);
        assert_eq!(blocks[1].successors, vec![2]);
        assert_eq!(blocks[2].predecessors, vec![0, 1]);
        assert_eq!(cfg.block_of(1).map(|b| b.id), Some(0));
    }

    #[test]
    fn fallthrough_off_the_end() {
        // pushtrue, iftrue -5 (to 0)
        let cfg = build(&[0x26, 0x11, 0xFB, 0xFF, 0xFF]);
        assert!(cfg.is_valid());
        assert_eq!(cfg.successors(1).collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn dot_output() {
        let cfg = build(&[0x26, 0x11, 0x04, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x47]);
        let dot = cfg.to_dot(Some("test<1>"));

        assert!(dot.contains("label=\"CFG: test\\<1\\>\""));
        assert!(dot.contains("B0_0000 (entry)"));
        assert!(dot.contains("0001: iftrue 4\\l"));
        assert!(dot.contains("B0_0000 -> B2_0009 [label=\"true\", color=green];"));
        assert!(dot.contains("B1_0005 -> B2_0009 [label=\"\", color=black];"));
        assert!(dot.ends_with("}\n"));
    }

    #[test]
    fn empty_graph() {
        let cfg = ControlFlowGraph::build(&[]);
        assert!(cfg.is_empty());
        assert!(cfg.is_valid());
        assert!(cfg.blocks().is_empty());
        assert_eq!(cfg.to_dot(None).lines().count(), 7);
    }
}
