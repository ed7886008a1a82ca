//! Random search for rule sets with sustained, bounded activity.
//!
//! Each trial generates a fresh rule set array, seeds a small throwaway grid
//! and runs it for a fixed number of steps. A trial is accepted when its
//! average density over the second half of the run lies inside the target
//! band and the grid is still active at the end. Trials run one at a time;
//! the host gets control back between trials, never inside one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::config::{
    EARLY_REJECT_FACTOR, INCLUSION_PROBABILITY, MAX_STATES, SEARCH_GRID_SIZE, SEARCH_ITERATIONS,
    SEARCH_MAX_DENSITY, SEARCH_MIN_ACTIVITY, SEARCH_MIN_DENSITY, SEARCH_TIME_BUDGET, STATE_COUNT,
    TRIAL_YIELD,
};
use crate::error::{AutomataError, Result};
use crate::simulation::factory::{InclusionCurve, RuleFactory};
use crate::simulation::grid::{Grid, Region};
use crate::simulation::rule::RuleSet;

/// Parameters of a density/activity search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    /// Number of states, including the base state
    pub state_count: usize,
    /// Per-count inclusion probability for generated rules
    pub inclusion_probability: f64,
    pub curve: InclusionCurve,
    /// Accepted average density is strictly between these two
    pub min_density: f64,
    pub max_density: f64,
    /// Final-step activity must be strictly above this
    pub min_activity: f64,
    /// Steps per trial
    pub iterations: usize,
    /// Side of the square trial grid
    pub size: usize,
    /// Wall-clock budget, enforced through [`Deadline`]
    pub time_budget: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            state_count: STATE_COUNT,
            inclusion_probability: INCLUSION_PROBABILITY,
            curve: InclusionCurve::Uniform,
            min_density: SEARCH_MIN_DENSITY,
            max_density: SEARCH_MAX_DENSITY,
            min_activity: SEARCH_MIN_ACTIVITY,
            iterations: SEARCH_ITERATIONS,
            size: SEARCH_GRID_SIZE,
            time_budget: SEARCH_TIME_BUDGET,
        }
    }
}

impl SearchConfig {
    /// Reject configurations that could never run a meaningful trial.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(AutomataError::InvalidConfig(msg));

        if self.state_count < 2 || self.state_count > MAX_STATES {
            return invalid(format!(
                "search needs 2..={} states, got {}",
                MAX_STATES, self.state_count
            ));
        }
        if !self.min_density.is_finite() || !self.max_density.is_finite() {
            return invalid("density bounds must be finite".into());
        }
        if self.min_density >= self.max_density || self.max_density <= 0.0 {
            return invalid(format!(
                "density band ({}, {}) is empty",
                self.min_density, self.max_density
            ));
        }
        if !self.min_activity.is_finite() || self.min_activity >= 1.0 {
            return invalid(format!(
                "minimum activity must be finite and below 1, got {}",
                self.min_activity
            ));
        }
        if self.iterations < 3 {
            return invalid(format!(
                "at least 3 iterations are needed to sample the second half of a trial, got {}",
                self.iterations
            ));
        }
        if self.size < 4 {
            return invalid(format!("trial grid size must be at least 4, got {}", self.size));
        }
        self.factory().map(|_| ())
    }

    pub fn factory(&self) -> Result<RuleFactory> {
        RuleFactory::new(self.inclusion_probability)?.with_curve(self.curve)
    }

    /// Region randomized at the start of each trial
    pub fn seed_region(&self) -> Region {
        Region::centered_square(self.size, self.size, self.size / 4)
    }
}

/// Statistics of one finished trial
#[derive(Debug, Clone, PartialEq)]
pub struct TrialReport {
    /// 1-based trial number
    pub trial: usize,
    /// Average density over the sampled steps; `None` when the trial was cut
    /// short or nothing was sampled
    pub average_density: Option<f64>,
    pub final_activity: f64,
    pub rejected_early: bool,
    pub accepted: bool,
}

/// Outcome of a search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// The accepted rule sets, or the last generated (untested) array when
    /// the search was stopped
    pub rule_sets: Vec<RuleSet>,
    pub success: bool,
    /// Trials actually simulated
    pub trials: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchStatus {
    /// The trial was rejected; poll again for another one
    Continue(TrialReport),
    Finished(SearchResult),
}

/// Step-wise density/activity search. Each [`poll`](Self::poll) runs at most
/// one trial.
pub struct DensitySearch<R> {
    config: SearchConfig,
    factory: RuleFactory,
    region: Region,
    rng: R,
    trials: usize,
}

impl<R: Rng> DensitySearch<R> {
    pub fn new(config: SearchConfig, rng: R) -> Result<Self> {
        config.validate()?;
        let factory = config.factory()?;
        let region = config.seed_region();
        Ok(Self {
            config,
            factory,
            region,
            rng,
            trials: 0,
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn trials(&self) -> usize {
        self.trials
    }

    /// Generate a rule set array and, unless `should_continue` says stop,
    /// run one trial with it.
    pub fn poll<C>(&mut self, should_continue: &mut C) -> Result<SearchStatus>
    where
        C: FnMut() -> bool + ?Sized,
    {
        let rule_sets = self
            .factory
            .random_rule_sets(self.config.state_count, &mut self.rng)?;

        if !should_continue() {
            log::info!("Search stopped after {} trials", self.trials);
            return Ok(SearchStatus::Finished(SearchResult {
                rule_sets,
                success: false,
                trials: self.trials,
            }));
        }

        let (report, rule_sets) = self.run_trial(rule_sets)?;
        if report.accepted {
            log::info!(
                "Trial {} accepted: average density {:.4}, activity {:.4}",
                report.trial,
                report.average_density.unwrap_or_default(),
                report.final_activity
            );
            return Ok(SearchStatus::Finished(SearchResult {
                rule_sets,
                success: true,
                trials: self.trials,
            }));
        }

        log::debug!(
            "Trial {} rejected: average density {:?}, activity {:.4}{}",
            report.trial,
            report.average_density,
            report.final_activity,
            if report.rejected_early { " (cut short)" } else { "" }
        );
        Ok(SearchStatus::Continue(report))
    }

    /// Simulate one trial and hand the rule sets back with its report.
    pub fn run_trial(&mut self, rule_sets: Vec<RuleSet>) -> Result<(TrialReport, Vec<RuleSet>)> {
        self.trials += 1;
        let SearchConfig {
            iterations,
            size,
            min_density,
            max_density,
            min_activity,
            ..
        } = self.config;

        let mut grid = Grid::new(size, size, rule_sets)?.without_render_tracking();
        grid.randomize_region(self.region, &mut self.rng);

        let mut density_sum = 0.0;
        let mut samples = 0usize;
        let mut rejected_early = false;
        for i in 0..iterations {
            grid.step();
            if 2 * i > iterations {
                let density = grid.density();
                if density > EARLY_REJECT_FACTOR * max_density {
                    rejected_early = true;
                    break;
                }
                density_sum += density;
                samples += 1;
            }
        }

        let average_density = (!rejected_early && samples > 0).then(|| density_sum / samples as f64);
        let final_activity = grid.activity();
        let accepted = average_density.is_some_and(|d| d > min_density && d < max_density)
            && final_activity > min_activity;

        let report = TrialReport {
            trial: self.trials,
            average_density,
            final_activity,
            rejected_early,
            accepted,
        };
        Ok((report, grid.into_rule_sets()))
    }
}

/// Host primitive the search hands control to between trials
pub trait TrialScheduler {
    fn yield_now(&mut self);
}

/// Go straight on to the next trial
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

impl TrialScheduler for Immediate {
    fn yield_now(&mut self) {}
}

/// Sleep the current thread between trials
#[derive(Debug, Clone, Copy)]
pub struct Sleep(pub Duration);

impl Default for Sleep {
    fn default() -> Self {
        Self(TRIAL_YIELD)
    }
}

impl TrialScheduler for Sleep {
    fn yield_now(&mut self) {
        std::thread::sleep(self.0);
    }
}

/// Run trials until one is accepted or `should_continue` returns false.
pub fn search<R, C, S>(
    config: SearchConfig,
    rng: R,
    mut should_continue: C,
    scheduler: &mut S,
) -> Result<SearchResult>
where
    R: Rng,
    C: FnMut() -> bool,
    S: TrialScheduler + ?Sized,
{
    let mut search = DensitySearch::new(config, rng)?;
    loop {
        match search.poll(&mut should_continue)? {
            SearchStatus::Finished(result) => return Ok(result),
            SearchStatus::Continue(_) => scheduler.yield_now(),
        }
    }
}

/// [`search`], reporting through `on_result(rule_sets, success)`. The
/// callback runs exactly once unless the configuration is rejected up front.
pub fn search_with_callback<R, C, S, F>(
    config: SearchConfig,
    rng: R,
    should_continue: C,
    scheduler: &mut S,
    on_result: F,
) -> Result<()>
where
    R: Rng,
    C: FnMut() -> bool,
    S: TrialScheduler + ?Sized,
    F: FnOnce(Vec<RuleSet>, bool),
{
    let result = search(config, rng, should_continue, scheduler)?;
    on_result(result.rule_sets, result.success);
    Ok(())
}

/// Stop predicate built from a wall-clock budget and a cancel flag.
#[derive(Debug, Clone)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
    cancel: Arc<AtomicBool>,
    checks: usize,
}

impl Deadline {
    pub fn new(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
            cancel: Arc::new(AtomicBool::new(false)),
            checks: 0,
        }
    }

    /// Flag that stops the search at the next check once set
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn checks(&self) -> usize {
        self.checks
    }

    pub fn should_continue(&mut self) -> bool {
        self.checks += 1;
        if self.cancel.load(Ordering::Relaxed) {
            log::info!("Search cancelled");
            return false;
        }
        if self.started.elapsed() > self.budget {
            log::info!("Search budget of {:?} used up", self.budget);
            return false;
        }
        if self.checks % 1000 == 0 {
            log::debug!("Tested {} rule sets", self.checks);
        }
        true
    }
}
