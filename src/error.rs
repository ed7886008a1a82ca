use thiserror::Error;

use crate::simulation::StateId;

/// Errors raised by the grid engine, rule construction, search setup and
/// rule text parsing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AutomataError {
    /// A cell coordinate outside the grid.
    #[error("cell ({x}, {y}) is outside the {width}x{height} grid")]
    OutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },

    /// A state id that is not part of the current state set.
    #[error("state id {id} is not valid for {state_count} states")]
    UnknownState { id: usize, state_count: usize },

    /// A rule set that violates its own invariants.
    #[error("invalid rule set for state {id}: {reason}")]
    InvalidRuleSet { id: StateId, reason: String },

    /// A rule set array whose ids do not line up with its positions.
    #[error("inconsistent rule sets: {0}")]
    InconsistentRuleSets(String),

    /// Grids need at least one cell.
    #[error("grid dimensions must be non-zero, got {width}x{height}")]
    EmptyGrid { width: usize, height: usize },

    /// Configuration rejected before any work started.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Rule text that could not produce a usable rule set array.
    #[error("could not parse rule text: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, AutomataError>;
