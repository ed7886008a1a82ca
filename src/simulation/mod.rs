mod factory;
mod grid;
mod rule;
pub mod search;

pub use factory::{InclusionCurve, RuleFactory};
pub use grid::{Grid, Region};
pub use rule::{CountSet, RuleSet, RuleSetBuilder, StateId, BASE_STATE, MAX_COUNT};
pub use search::{
    search, search_with_callback, Deadline, DensitySearch, Immediate, SearchConfig, SearchResult,
    SearchStatus, Sleep, TrialReport, TrialScheduler,
};
