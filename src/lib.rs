//! Multi-state cellular automata driven by exact neighbor-count rules.
//!
//! Every state owns a [`RuleSet`](simulation::RuleSet) mapping, for each
//! possible target state, the neighbor counts that trigger the transition.
//! The [`Grid`](simulation::Grid) keeps a per-state census of every cell's
//! Moore neighborhood up to date incrementally, and the density/activity
//! [search](simulation::search) hunts for rule sets that neither die out nor
//! explode.

pub mod app;
pub mod config;
pub mod error;
pub mod interchange;
pub mod render;
pub mod simulation;

pub use error::{AutomataError, Result};
