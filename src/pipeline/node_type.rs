//! Stage kind enumeration for descriptor-driven construction.
//!
//! Every directive a pipeline descriptor may name is one variant here. Adding a
//! stage means adding a variant and its factory in the registry; the compiler
//! never changes.

use serde::{Deserialize, Serialize};

/// How many children a stage takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arity {
    /// Exactly one `child`
    Single,
    /// A `children` array
    Multi,
}

/// Types of stages that can be named in a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageKind {
    /// Discrete derivative of the child's Y
    #[serde(rename = "diff")]
    Differentiate,
    /// Maps Y through an arithmetic expression
    #[serde(rename = "expr")]
    Expression,
    #[serde(rename = "sum")]
    Sum,
    #[serde(rename = "avg")]
    Average,
}

impl StageKind {
    /// Get all available stage kinds.
    pub fn all() -> &'static [StageKind] {
        &[
            StageKind::Differentiate,
            StageKind::Expression,
            StageKind::Sum,
            StageKind::Average,
        ]
    }

    /// The directive naming this stage in descriptors.
    pub fn directive(&self) -> &'static str {
        match self {
            StageKind::Differentiate => "diff",
            StageKind::Expression => "expr",
            StageKind::Sum => "sum",
            StageKind::Average => "avg",
        }
    }

    /// Look up a stage by directive name (case-insensitive).
    pub fn from_directive(directive: &str) -> Option<StageKind> {
        Self::all()
            .iter()
            .copied()
            .find(|k| k.directive().eq_ignore_ascii_case(directive))
    }

    pub fn arity(&self) -> Arity {
        match self {
            StageKind::Differentiate | StageKind::Expression => Arity::Single,
            StageKind::Sum | StageKind::Average => Arity::Multi,
        }
    }

    /// Get the display name for this stage kind.
    pub fn display_name(&self) -> &'static str {
        match self {
            StageKind::Differentiate => "Differentiate",
            StageKind::Expression => "Expression",
            StageKind::Sum => "Sum",
            StageKind::Average => "Average",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
