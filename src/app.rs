use std::time::{Duration, Instant};

use rand::Rng;

use crate::config::{GRID_HEIGHT, GRID_WIDTH, INCLUSION_PROBABILITY, SEED_RADIUS, STATE_COUNT};
use crate::error::{AutomataError, Result};
use crate::interchange::{format_rule_sets, parse_rule_sets};
use crate::render::{ascii_snapshot, Frame, Palette, Rgba};
use crate::simulation::{
    search, Grid, InclusionCurve, Region, RuleFactory, RuleSet, SearchConfig, SearchResult,
    StateId, TrialScheduler,
};

/// Settings for a [`Session`]
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub width: usize,
    pub height: usize,
    pub state_count: usize,
    pub inclusion_probability: f64,
    pub curve: InclusionCurve,
    /// Half side of the centered square filled by [`Session::randomize`]
    pub seed_radius: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            width: GRID_WIDTH,
            height: GRID_HEIGHT,
            state_count: STATE_COUNT,
            inclusion_probability: INCLUSION_PROBABILITY,
            curve: InclusionCurve::Uniform,
            seed_radius: SEED_RADIUS,
        }
    }
}

/// One grid with its rules, palette and frame, driven by a single owner.
pub struct Session<R> {
    grid: Grid,
    palette: Palette,
    frame: Frame,
    factory: RuleFactory,
    seed_radius: usize,
    rng: R,
    rate: RateMeter,
}

impl<R: Rng> Session<R> {
    /// Start with freshly generated random rules and an empty grid.
    pub fn new(config: SessionConfig, mut rng: R) -> Result<Self> {
        let factory = RuleFactory::new(config.inclusion_probability)?.with_curve(config.curve)?;
        let rule_sets = factory.random_rule_sets(config.state_count, &mut rng)?;
        let mut grid = Grid::new(config.width, config.height, rule_sets)?;
        let palette = Palette::for_states(config.state_count);
        let frame = Frame::for_grid(&mut grid, &palette);

        log::info!(
            "Session: {}x{} grid, {} states",
            config.width,
            config.height,
            config.state_count
        );

        Ok(Self {
            grid,
            palette,
            frame,
            factory,
            seed_radius: config.seed_radius,
            rng,
            rate: RateMeter::new(0),
        })
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn set_seed_radius(&mut self, radius: usize) {
        self.seed_radius = radius;
    }

    /// Put every cell back in the base state.
    pub fn clear(&mut self) {
        self.grid.clear();
        self.frame.repaint(&mut self.grid, &self.palette);
    }

    /// Random states in the centered seed square, base state elsewhere.
    pub fn randomize(&mut self) {
        let region = Region::centered_square(self.grid.width(), self.grid.height(), self.seed_radius);
        self.grid.randomize_region(region, &mut self.rng);
        self.frame.repaint(&mut self.grid, &self.palette);
    }

    /// Set one cell, e.g. from a pointer event.
    pub fn paint(&mut self, id: StateId, x: usize, y: usize) -> Result<()> {
        self.grid.set_one_cell(id, x, y)?;
        self.frame.repaint(&mut self.grid, &self.palette);
        Ok(())
    }

    /// Advance one generation. Returns the number of cells that changed.
    pub fn step(&mut self) -> usize {
        let changed = self.grid.step();
        self.frame.repaint(&mut self.grid, &self.palette);

        let generation = self.grid.generation();
        if let Some(rate) = self.rate.sample(generation) {
            log::info!(
                "{:.0} generations/s, generation {}, density {:.4}, activity {:.4}",
                rate,
                generation,
                self.grid.density(),
                self.grid.activity()
            );
        }
        changed
    }

    /// Advance `steps` generations, stopping early once nothing changes.
    /// Returns the number of generations actually run.
    pub fn run(&mut self, steps: u64) -> u64 {
        for done in 0..steps {
            if self.step() == 0 {
                log::info!("Grid settled after {} steps", done + 1);
                return done + 1;
            }
        }
        steps
    }

    /// Fresh random rules without any search, then reseed.
    pub fn randomize_rules(&mut self) -> Result<()> {
        let rule_sets = self
            .factory
            .random_rule_sets(self.grid.state_count(), &mut self.rng)?;
        self.grid.set_rule_sets(rule_sets)?;
        self.clear();
        self.randomize();
        Ok(())
    }

    /// Search for rules and install whatever the search returns, accepted or
    /// not, then reseed. A different state count resizes the palette.
    pub fn search_rules<C, S>(
        &mut self,
        config: SearchConfig,
        should_continue: C,
        scheduler: &mut S,
    ) -> Result<SearchResult>
    where
        C: FnMut() -> bool,
        S: TrialScheduler + ?Sized,
    {
        let result = search(config, &mut self.rng, should_continue, scheduler)?;
        if result.success {
            log::info!("Found rules after {} trials", result.trials);
        } else {
            log::info!("Search stopped after {} trials without a match", result.trials);
        }
        self.install_rules(result.rule_sets.clone())?;
        self.clear();
        self.randomize();
        Ok(result)
    }

    pub fn export_rules(&self) -> String {
        format_rule_sets(self.grid.rule_sets())
    }

    /// Parse rule text and install it. With the same state count the cells
    /// are kept; otherwise the grid starts over empty.
    pub fn import_rules(&mut self, text: &str) -> Result<()> {
        let rule_sets = parse_rule_sets(text)?;
        log::info!("Imported rules for {} states", rule_sets.len());
        self.install_rules(rule_sets)
    }

    /// Recolor one state and redraw the frame.
    pub fn set_color(&mut self, id: StateId, color: Rgba) -> Result<()> {
        if id as usize >= self.grid.state_count() {
            return Err(AutomataError::UnknownState {
                id: id as usize,
                state_count: self.grid.state_count(),
            });
        }
        self.palette.set_color(id, color);
        self.frame.redraw(&mut self.grid, &self.palette);
        Ok(())
    }

    pub fn ascii(&self) -> String {
        ascii_snapshot(&self.grid)
    }

    fn install_rules(&mut self, rule_sets: Vec<RuleSet>) -> Result<()> {
        let state_count = rule_sets.len();
        let resized = state_count != self.grid.state_count();
        self.grid.set_rule_sets(rule_sets)?;
        if resized {
            self.palette = Palette::for_states(state_count);
            self.frame.redraw(&mut self.grid, &self.palette);
        }
        Ok(())
    }
}

/// Generation rate of a session, reported at most once per interval
struct RateMeter {
    last_report: Instant,
    last_generation: u64,
    interval: Duration,
}

impl RateMeter {
    fn new(generation: u64) -> Self {
        Self {
            last_report: Instant::now(),
            last_generation: generation,
            interval: Duration::from_secs(1),
        }
    }

    /// Generations per second since the last report, once the interval has
    /// passed.
    fn sample(&mut self, generation: u64) -> Option<f64> {
        let elapsed = self.last_report.elapsed();
        if elapsed < self.interval {
            return None;
        }
        let advanced = generation.saturating_sub(self.last_generation);
        self.last_report = Instant::now();
        self.last_generation = generation;
        Some(advanced as f64 / elapsed.as_secs_f64().max(1e-9))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::{Immediate, RuleSetBuilder, BASE_STATE};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn small_config() -> SessionConfig {
        SessionConfig {
            width: 12,
            height: 10,
            state_count: 3,
            inclusion_probability: 0.2,
            curve: InclusionCurve::Uniform,
            seed_radius: 3,
        }
    }

    fn session() -> Session<ChaCha8Rng> {
        Session::new(small_config(), ChaCha8Rng::seed_from_u64(11)).unwrap()
    }

    fn stable_text(states: usize) -> String {
        let rule_sets: Vec<RuleSet> = (0..states)
            .map(|id| RuleSet::stable(id as StateId, states).unwrap())
            .collect();
        format_rule_sets(&rule_sets)
    }

    #[test]
    fn test_new_session_is_empty() {
        let session = session();
        assert_eq!(session.grid().state_count(), 3);
        assert_eq!(session.grid().density(), 0.0);
        assert_eq!(session.palette().color_count(), 3);
        assert_eq!((session.frame().width(), session.frame().height()), (12, 10));
    }

    #[test]
    fn test_randomize_stays_inside_seed_square() {
        let mut session = session();
        session.randomize();
        let region = Region::centered_square(12, 10, 3);
        for y in 0..10 {
            for x in 0..12 {
                if !region.contains(x, y) {
                    assert_eq!(session.grid().get(x, y), Some(BASE_STATE));
                }
            }
        }
        assert!(session.grid().density() > 0.0);

        session.clear();
        assert_eq!(session.grid().density(), 0.0);
        assert!(session.ascii().chars().all(|c| c == '.' || c == '\n'));
    }

    #[test]
    fn test_paint_updates_frame() {
        let mut session = session();
        session.paint(2, 4, 5).unwrap();
        assert_eq!(session.grid().get(4, 5), Some(2));
        assert_eq!(session.frame().pixel(4, 5), Some(session.palette().color(2)));
        assert!(matches!(
            session.paint(1, 12, 0),
            Err(AutomataError::OutOfBounds { .. })
        ));
        assert!(matches!(
            session.paint(3, 0, 0),
            Err(AutomataError::UnknownState { .. })
        ));
    }

    #[test]
    fn test_import_same_state_count_keeps_cells() {
        let mut session = session();
        session.paint(1, 2, 2).unwrap();
        session.import_rules(&stable_text(3)).unwrap();
        assert_eq!(session.grid().get(2, 2), Some(1));
        assert_eq!(session.export_rules(), stable_text(3));

        session.run(5);
        assert_eq!(session.grid().get(2, 2), Some(1), "stable rules change nothing");
    }

    #[test]
    fn test_import_new_state_count_resets() {
        let mut session = session();
        session.paint(1, 2, 2).unwrap();
        session.import_rules(&stable_text(5)).unwrap();
        assert_eq!(session.grid().state_count(), 5);
        assert_eq!(session.palette().color_count(), 5);
        assert_eq!(session.grid().get(2, 2), Some(BASE_STATE));
        session.paint(4, 0, 0).unwrap();

        assert!(session.import_rules("garbage").is_err());
        assert_eq!(session.grid().state_count(), 5, "failed import leaves rules alone");
    }

    #[test]
    fn test_run_stops_when_settled() {
        let mut session = session();
        session.import_rules(&stable_text(3)).unwrap();
        session.paint(1, 5, 5).unwrap();
        assert_eq!(session.run(50), 1);
    }

    #[test]
    fn test_stepping_follows_rules() {
        let mut session = session();
        let birth = RuleSetBuilder::new(0, 2).rule(1, 1, [1]).build().unwrap();
        let text = format_rule_sets(&[birth, RuleSet::stable(1, 2).unwrap()]);
        session.import_rules(&text).unwrap();
        assert_eq!(session.grid().state_count(), 2);

        session.paint(1, 5, 5).unwrap();
        session.step();
        assert_eq!(session.grid().get(4, 4), Some(1));
        assert_eq!(session.frame().pixel(4, 4), Some(session.palette().color(1)));
    }

    #[test]
    fn test_search_installs_result() {
        let mut session = session();
        let config = SearchConfig {
            state_count: 4,
            size: 16,
            ..SearchConfig::default()
        };
        let result = session
            .search_rules(config, || false, &mut Immediate)
            .unwrap();
        assert!(!result.success);
        assert_eq!(session.grid().state_count(), 4);
        assert_eq!(session.grid().rule_sets(), result.rule_sets.as_slice());
        assert_eq!(session.palette().color_count(), 4);
    }

    #[test]
    fn test_imported_rules_act_on_current_cells() {
        let mut session = session();
        session.import_rules(&stable_text(3)).unwrap();
        session.paint(1, 5, 5).unwrap();
        session.run(3);

        let birth = RuleSetBuilder::new(0, 3).rule(1, 1, [1]).build().unwrap();
        let text = format_rule_sets(&[
            birth,
            RuleSet::stable(1, 3).unwrap(),
            RuleSet::stable(2, 3).unwrap(),
        ]);
        session.import_rules(&text).unwrap();
        assert_eq!(session.step(), 8);
        assert_eq!(session.frame().pixel(4, 4), Some(session.palette().color(1)));
    }

    #[test]
    fn test_set_color_redraws() {
        let mut session = session();
        session.paint(2, 3, 3).unwrap();
        let red = Rgba::new(255, 0, 0, 255);
        session.set_color(2, red).unwrap();
        assert_eq!(session.palette().color(2), red);
        assert_eq!(session.frame().pixel(3, 3), Some(red));
        assert!(matches!(
            session.set_color(3, red),
            Err(AutomataError::UnknownState { .. })
        ));
    }

    #[test]
    fn test_rate_meter_counts_generations() {
        let mut meter = RateMeter::new(10);
        assert_eq!(meter.sample(20), None, "interval not reached");

        meter.interval = Duration::ZERO;
        let rate = meter.sample(40).unwrap();
        assert!(rate > 0.0);
        assert_eq!(meter.last_generation, 40);
        assert_eq!(meter.sample(40), Some(0.0), "no progress since the last report");
    }

    #[test]
    fn test_randomize_rules_keeps_state_count() {
        let mut session = session();
        let before = session.export_rules();
        session.randomize_rules().unwrap();
        assert_eq!(session.grid().state_count(), 3);
        assert_ne!(session.export_rules(), before);
    }
}
