//! Control flow edge types for the CFG.
//!
//! Edges connect instruction indices and carry the reason control can move from the source to
//! the target.

use strum::Display;

/// The kind of a control flow edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum CfgEdgeKind {
    /// Execution continues with the next instruction.
    Fallthrough,

    /// Target of an unconditional `jump`.
    Unconditional,

    /// Taken when the branch condition holds.
    ConditionalTrue,

    /// Fallthrough of a conditional branch whose condition does not hold.
    ConditionalFalse,

    /// A `lookupswitch` target. `case` is the position in the case table, `None` for the
    /// default target.
    Switch {
        /// Case table position
        case: Option<usize>,
    },
}

impl CfgEdgeKind {
    /// Returns true if this edge belongs to a conditional branch.
    #[must_use]
    pub const fn is_conditional(&self) -> bool {
        matches!(self, Self::ConditionalTrue | Self::ConditionalFalse)
    }

    /// Returns true if this edge belongs to a switch.
    #[must_use]
    pub const fn is_switch(&self) -> bool {
        matches!(self, Self::Switch { .. })
    }

    /// Returns true if the target is the instruction directly following the source.
    #[must_use]
    pub const fn is_fallthrough(&self) -> bool {
        matches!(self, Self::Fallthrough | Self::ConditionalFalse)
    }

    /// Short label used in DOT output.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Fallthrough | Self::Unconditional => String::new(),
            Self::ConditionalTrue => "true".to_string(),
            Self::ConditionalFalse => "false".to_string(),
            Self::Switch { case } => case.map_or("default".to_string(), |c| format!("case {c}")),
        }
    }
}

/// A directed edge between two instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CfgEdge {
    source: usize,
    target: usize,
    kind: CfgEdgeKind,
}

impl CfgEdge {
    /// Creates a new edge.
    #[must_use]
    pub const fn new(source: usize, target: usize, kind: CfgEdgeKind) -> Self {
        Self {
            source,
            target,
            kind,
        }
    }

    /// Index of the instruction control leaves.
    #[must_use]
    pub const fn source(&self) -> usize {
        self.source
    }

    /// Index of the instruction control reaches.
    #[must_use]
    pub const fn target(&self) -> usize {
        self.target
    }

    /// Why control moves along this edge.
    #[must_use]
    pub const fn kind(&self) -> CfgEdgeKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_kind_classification() {
        assert!(CfgEdgeKind::ConditionalTrue.is_conditional());
        assert!(CfgEdgeKind::ConditionalFalse.is_conditional());
        assert!(!CfgEdgeKind::Unconditional.is_conditional());

        assert!(CfgEdgeKind::ConditionalFalse.is_fallthrough());
        assert!(!CfgEdgeKind::ConditionalTrue.is_fallthrough());

        assert!(CfgEdgeKind::Switch { case: None }.is_switch());
        assert!(!CfgEdgeKind::Fallthrough.is_switch());
    }

    #[test]
    fn test_edge_labels() {
        assert_eq!(CfgEdgeKind::Switch { case: Some(2) }.label(), "case 2");
        assert_eq!(CfgEdgeKind::Switch { case: None }.label(), "default");
        assert_eq!(CfgEdgeKind::Fallthrough.label(), "");
        assert_eq!(CfgEdgeKind::ConditionalTrue.to_string(), "conditional_true");
    }

    #[test]
    fn test_edge_accessors() {
        let edge = CfgEdge::new(1, 4, CfgEdgeKind::Unconditional);
        assert_eq!(edge.source(), 1);
        assert_eq!(edge.target(), 4);
        assert_eq!(edge.kind(), CfgEdgeKind::Unconditional);
    }
}
