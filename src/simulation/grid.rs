use rand::Rng;

use crate::config::MAX_STATES;
use crate::error::{AutomataError, Result};
use crate::simulation::rule::{RuleSet, StateId, BASE_STATE};

/// Offsets of the eight Moore neighbors
const NEIGHBOR_OFFSETS: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Inclusive rectangle of cells, `x0..=x1` by `y0..=y1`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl Region {
    /// Square of the given radius around the middle of a `width x height`
    /// grid. On an even extent the far edge is pulled in by one so the square
    /// stays centered; the result is clipped to the grid.
    pub fn centered_square(width: usize, height: usize, radius: usize) -> Self {
        let span = |extent: usize| {
            let middle = extent / 2;
            let mut end = middle + radius;
            if extent % 2 == 0 {
                end = end.saturating_sub(1);
            }
            (middle.saturating_sub(radius), end.min(extent.saturating_sub(1)))
        };
        let (x0, x1) = span(width);
        let (y0, y1) = span(height);
        Self { x0, y0, x1, y1 }
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        (self.x0..=self.x1).contains(&x) && (self.y0..=self.y1).contains(&y)
    }
}

/// Multi-state automaton grid with incrementally maintained neighbor counts.
///
/// For every cell the grid keeps a census: how many of its in-bounds Moore
/// neighbors hold each state id. The census is patched on every mutation, so
/// it always sums to the cell's in-bounds neighbor count (8 inside, 5 on an
/// edge, 3 in a corner). There is no wraparound.
#[derive(Debug, Clone)]
pub struct Grid {
    width: usize,
    height: usize,
    state_count: usize,
    rule_sets: Vec<RuleSet>,
    /// Row-major, `y * width + x`
    states: Vec<StateId>,
    /// Cell-major census, `index * state_count + id`
    counts: Vec<u8>,
    /// Cells whose census changed since the last step
    dirty: Vec<bool>,
    dirty_count: usize,
    /// Cells not in the base state
    active_count: usize,
    /// Per state id, cells to repaint in that state
    pending_repaints: Vec<Vec<(usize, usize)>>,
    track_repaints: bool,
    generation: u64,
    /// Decisions buffer reused across steps
    scratch: Vec<(usize, StateId)>,
}

impl Grid {
    /// Create a grid with every cell in the base state.
    pub fn new(width: usize, height: usize, rule_sets: Vec<RuleSet>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(AutomataError::EmptyGrid { width, height });
        }
        let state_count = check_rule_sets(&rule_sets)?;
        let mut grid = Self {
            width,
            height,
            state_count,
            rule_sets,
            states: Vec::new(),
            counts: Vec::new(),
            dirty: Vec::new(),
            dirty_count: 0,
            active_count: 0,
            pending_repaints: Vec::new(),
            track_repaints: true,
            generation: 0,
            scratch: Vec::new(),
        };
        grid.reset();
        Ok(grid)
    }

    /// Stop recording pending repaints (for grids nobody draws).
    pub fn without_render_tracking(mut self) -> Self {
        self.track_repaints = false;
        self.pending_repaints.iter_mut().for_each(Vec::clear);
        self
    }

    /// Clear all state and compute the base-state census analytically.
    fn reset(&mut self) {
        let cells = self.width * self.height;
        self.states = vec![BASE_STATE; cells];
        self.counts = vec![0; cells * self.state_count];
        for y in 0..self.height {
            for x in 0..self.width {
                let index = y * self.width + x;
                self.counts[index * self.state_count] = self.neighborhood_size(x, y) as u8;
            }
        }
        self.dirty = vec![false; cells];
        self.dirty_count = 0;
        self.active_count = 0;
        self.pending_repaints = vec![Vec::new(); self.state_count];
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn state_count(&self) -> usize {
        self.state_count
    }

    pub fn rule_sets(&self) -> &[RuleSet] {
        &self.rule_sets
    }

    /// Consume the grid, handing back its rule sets
    pub fn into_rule_sets(self) -> Vec<RuleSet> {
        self.rule_sets
    }

    /// Row-major cell states
    pub fn states(&self) -> &[StateId] {
        &self.states
    }

    /// Steps taken since construction
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn in_bounds(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height
    }

    fn index(&self, x: usize, y: usize) -> Result<usize> {
        if !self.in_bounds(x, y) {
            return Err(AutomataError::OutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }
        Ok(y * self.width + x)
    }

    /// State of a cell, `None` outside the grid
    pub fn get(&self, x: usize, y: usize) -> Option<StateId> {
        self.in_bounds(x, y).then(|| self.states[y * self.width + x])
    }

    pub fn state(&self, x: usize, y: usize) -> Result<StateId> {
        Ok(self.states[self.index(x, y)?])
    }

    /// Number of neighbors of `(x, y)` holding `id`
    pub fn neighbor_count(&self, id: StateId, x: usize, y: usize) -> Result<u8> {
        self.check_state(id)?;
        Ok(self.census(x, y)?[id as usize])
    }

    /// Per-state neighbor counts of one cell, indexed by state id
    pub fn census(&self, x: usize, y: usize) -> Result<&[u8]> {
        let index = self.index(x, y)?;
        Ok(self.census_at(index))
    }

    #[inline]
    fn census_at(&self, index: usize) -> &[u8] {
        &self.counts[index * self.state_count..][..self.state_count]
    }

    /// Whether the cell's census changed since the last step
    pub fn is_dirty(&self, x: usize, y: usize) -> Result<bool> {
        Ok(self.dirty[self.index(x, y)?])
    }

    /// Number of in-bounds Moore neighbors of a cell (8, 5 or 3 on grids at
    /// least two cells wide in both directions).
    pub fn neighborhood_size(&self, x: usize, y: usize) -> usize {
        let span = |v: usize, extent: usize| (v + 1).min(extent - 1) + 1 - v.saturating_sub(1);
        span(x, self.width) * span(y, self.height) - 1
    }

    fn check_state(&self, id: StateId) -> Result<()> {
        if id as usize >= self.state_count {
            return Err(AutomataError::UnknownState {
                id: id as usize,
                state_count: self.state_count,
            });
        }
        Ok(())
    }

    /// Set one cell, patching the census of each of its neighbors.
    ///
    /// Every other mutation goes through here, which is what keeps the
    /// census consistent. Setting a cell to the state it already holds does
    /// nothing.
    pub fn set_one_cell(&mut self, id: StateId, x: usize, y: usize) -> Result<()> {
        let index = self.index(x, y)?;
        self.check_state(id)?;
        self.write_cell(index, id);
        Ok(())
    }

    fn write_cell(&mut self, index: usize, id: StateId) {
        let old = self.states[index];
        if old == id {
            return;
        }
        self.states[index] = id;
        match (old == BASE_STATE, id == BASE_STATE) {
            (true, false) => self.active_count += 1,
            (false, true) => self.active_count -= 1,
            _ => {}
        }

        let (x, y) = (index % self.width, index / self.width);
        for (dx, dy) in NEIGHBOR_OFFSETS {
            let (Some(nx), Some(ny)) = (x.checked_add_signed(dx), y.checked_add_signed(dy)) else {
                continue;
            };
            if !self.in_bounds(nx, ny) {
                continue;
            }
            let neighbor = ny * self.width + nx;
            let base = neighbor * self.state_count;
            self.counts[base + old as usize] -= 1;
            self.counts[base + id as usize] += 1;
            if !self.dirty[neighbor] {
                self.dirty[neighbor] = true;
                self.dirty_count += 1;
            }
        }

        if self.track_repaints {
            self.pending_repaints[id as usize].push((x, y));
        }
    }

    /// Replace every cell. `states` is row-major and must cover the grid;
    /// nothing is written unless every id is valid.
    pub fn set_all(&mut self, states: &[StateId]) -> Result<()> {
        if states.len() != self.states.len() {
            return Err(AutomataError::InvalidConfig(format!(
                "expected {} cell states, got {}",
                self.states.len(),
                states.len()
            )));
        }
        if let Some(&bad) = states.iter().find(|&&id| id as usize >= self.state_count) {
            return Err(AutomataError::UnknownState {
                id: bad as usize,
                state_count: self.state_count,
            });
        }
        for (index, &id) in states.iter().enumerate() {
            self.write_cell(index, id);
        }
        Ok(())
    }

    /// Put every cell back in the base state.
    pub fn clear(&mut self) {
        for index in 0..self.states.len() {
            self.write_cell(index, BASE_STATE);
        }
    }

    /// Give every cell inside `region` a uniformly random state and every
    /// cell outside it the base state.
    pub fn randomize_region<R: Rng + ?Sized>(&mut self, region: Region, rng: &mut R) {
        for y in 0..self.height {
            for x in 0..self.width {
                let id = if region.contains(x, y) {
                    rng.gen_range(0..self.state_count) as StateId
                } else {
                    BASE_STATE
                };
                self.write_cell(y * self.width + x, id);
            }
        }
    }

    /// What the cell would become if it were evaluated against the current
    /// census.
    pub fn decide(&self, x: usize, y: usize) -> Result<StateId> {
        let index = self.index(x, y)?;
        let old = self.states[index];
        Ok(self.rule_sets[old as usize].decide(self.census_at(index)))
    }

    /// Advance one synchronous generation. Returns the number of cells that
    /// changed state.
    ///
    /// Only cells whose census changed since the last step are evaluated; a
    /// cell with an unchanged neighborhood cannot change under these rules.
    /// All decisions are taken from the pre-step census before any of them is
    /// applied, so no cell sees another cell's new state within a step.
    pub fn step(&mut self) -> usize {
        let mut decisions = std::mem::take(&mut self.scratch);
        decisions.clear();

        for index in 0..self.states.len() {
            if !self.dirty[index] {
                continue;
            }
            let old = self.states[index];
            let next = self.rule_sets[old as usize].decide(self.census_at(index));
            if next != old {
                decisions.push((index, next));
            }
        }

        self.dirty.fill(false);
        self.dirty_count = 0;
        for &(index, next) in &decisions {
            self.write_cell(index, next);
        }

        let changed = decisions.len();
        self.scratch = decisions;
        self.generation += 1;
        log::trace!(
            "generation {}: {} cells changed, {} dirty",
            self.generation,
            changed,
            self.dirty_count
        );
        changed
    }

    /// Fraction of cells not in the base state
    pub fn density(&self) -> f64 {
        self.active_count as f64 / self.states.len() as f64
    }

    /// Fraction of cells whose census changed in the most recent step (or
    /// mutation since then)
    pub fn activity(&self) -> f64 {
        self.dirty_count as f64 / self.states.len() as f64
    }

    /// Drain the cells waiting to be repainted, grouped by state id.
    pub fn take_pending_repaints(&mut self) -> Vec<Vec<(usize, usize)>> {
        std::mem::replace(&mut self.pending_repaints, vec![Vec::new(); self.state_count])
    }

    /// Swap in a new rule set array. If the number of states changes the grid
    /// is re-initialized to all base cells; otherwise the cells and their
    /// census carry over. Either way every cell is marked dirty, since the
    /// new rules may act on neighborhoods that have not changed.
    pub fn set_rule_sets(&mut self, rule_sets: Vec<RuleSet>) -> Result<()> {
        let state_count = check_rule_sets(&rule_sets)?;
        self.rule_sets = rule_sets;
        if state_count != self.state_count {
            log::debug!(
                "state count changed from {} to {}, resetting grid",
                self.state_count,
                state_count
            );
            self.state_count = state_count;
            self.reset();
        }
        self.dirty.fill(true);
        self.dirty_count = self.dirty.len();
        Ok(())
    }
}

/// Check that `rule_sets[k]` belongs to state `k` of the same state set.
/// Returns the state count.
fn check_rule_sets(rule_sets: &[RuleSet]) -> Result<usize> {
    let state_count = rule_sets.len();
    if state_count == 0 || state_count > MAX_STATES {
        return Err(AutomataError::InconsistentRuleSets(format!(
            "need 1..={} rule sets, got {}",
            MAX_STATES, state_count
        )));
    }
    for (position, rules) in rule_sets.iter().enumerate() {
        if rules.id() as usize != position {
            return Err(AutomataError::InconsistentRuleSets(format!(
                "rule set for state {} stored at position {}",
                rules.id(),
                position
            )));
        }
        if rules.state_count() != state_count {
            return Err(AutomataError::InconsistentRuleSets(format!(
                "rule set for state {} expects {} states, array has {}",
                rules.id(),
                rules.state_count(),
                state_count
            )));
        }
    }
    Ok(state_count)
}
