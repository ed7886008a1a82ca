use std::fmt;

use crate::config::MAX_STATES;
use crate::error::{AutomataError, Result};

/// Identifier of a cell state. 0 is the base (background) state.
pub type StateId = u8;

/// The base/background state.
pub const BASE_STATE: StateId = 0;

/// Largest neighbor count a Moore neighborhood can produce.
pub const MAX_COUNT: u8 = 8;

/// A subset of the neighbor counts {0, ..., 8}.
///
/// Stored as a 9-bit mask; counts above 8 can never be inserted.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CountSet(u16);

impl CountSet {
    pub const EMPTY: Self = Self(0);
    pub const FULL: Self = Self(0x1FF);

    /// Build a set from counts, dropping anything above 8
    pub fn from_counts<I: IntoIterator<Item = u8>>(counts: I) -> Self {
        let mut set = Self::EMPTY;
        for count in counts {
            set.insert(count);
        }
        set
    }

    /// Insert a count. Returns false (and leaves the set alone) if `count > 8`.
    pub fn insert(&mut self, count: u8) -> bool {
        if count > MAX_COUNT {
            return false;
        }
        self.0 |= 1 << count;
        true
    }

    #[inline]
    pub fn contains(self, count: u8) -> bool {
        count <= MAX_COUNT && self.0 & (1 << count) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Counts in ascending order
    pub fn iter(self) -> impl Iterator<Item = u8> {
        (0..=MAX_COUNT).filter(move |&c| self.contains(c))
    }
}

impl fmt::Debug for CountSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<u8> for CountSet {
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        Self::from_counts(iter)
    }
}

/// Transition rule owned by one state.
///
/// `rule(target, neighbor)` holds the counts of `neighbor` among the eight
/// Moore neighbors that permit a transition into `target`. Targets are tried
/// in `preference` order and, within a target, neighbor ids in ascending
/// order; the first match wins.
#[derive(Clone, PartialEq, Eq)]
pub struct RuleSet {
    id: StateId,
    state_count: usize,
    /// Dense `state_count x state_count` table, row = target, column = neighbor
    table: Vec<CountSet>,
    preference: Vec<StateId>,
}

impl RuleSet {
    /// Create a rule set, checking every structural invariant.
    pub fn new(
        id: StateId,
        state_count: usize,
        table: Vec<CountSet>,
        preference: Vec<StateId>,
    ) -> Result<Self> {
        let invalid = |reason: String| AutomataError::InvalidRuleSet { id, reason };

        if state_count == 0 || state_count > MAX_STATES {
            return Err(invalid(format!(
                "state count {} outside 1..={}",
                state_count, MAX_STATES
            )));
        }
        if id as usize >= state_count {
            return Err(invalid(format!("id outside 0..{}", state_count)));
        }
        if table.len() != state_count * state_count {
            return Err(invalid(format!(
                "rule table has {} entries, expected {}",
                table.len(),
                state_count * state_count
            )));
        }
        let self_row = id as usize * state_count;
        if table[self_row..self_row + state_count].iter().any(|set| !set.is_empty()) {
            return Err(invalid("transition into itself must stay empty".into()));
        }

        if preference.len() != state_count - 1 {
            return Err(invalid(format!(
                "preference lists {} targets, expected {}",
                preference.len(),
                state_count - 1
            )));
        }
        let mut seen = vec![false; state_count];
        for &target in &preference {
            if target == id {
                return Err(invalid("preference refers to itself".into()));
            }
            let slot = seen
                .get_mut(target as usize)
                .ok_or_else(|| invalid(format!("preference target {} unknown", target)))?;
            if *slot {
                return Err(invalid(format!("preference repeats target {}", target)));
            }
            *slot = true;
        }

        Ok(Self {
            id,
            state_count,
            table,
            preference,
        })
    }

    /// A rule set with no transitions at all: the state never changes.
    pub fn stable(id: StateId, state_count: usize) -> Result<Self> {
        RuleSetBuilder::new(id, state_count).build()
    }

    pub fn id(&self) -> StateId {
        self.id
    }

    pub fn state_count(&self) -> usize {
        self.state_count
    }

    /// Every id except this rule set's own, ascending
    pub fn other_ids(&self) -> impl Iterator<Item = StateId> + '_ {
        (0..self.state_count)
            .map(|id| id as StateId)
            .filter(move |&id| id != self.id)
    }

    /// Counts of `neighbor` that permit a transition into `target`.
    /// Ids outside the state set have no permitted counts.
    pub fn rule(&self, target: StateId, neighbor: StateId) -> CountSet {
        let (target, neighbor) = (target as usize, neighbor as usize);
        if target >= self.state_count || neighbor >= self.state_count {
            return CountSet::EMPTY;
        }
        self.table[target * self.state_count + neighbor]
    }

    pub fn preference(&self) -> &[StateId] {
        &self.preference
    }

    /// Next state for a cell currently in this state, given its census:
    /// `census[k]` is the number of neighbors in state `k`.
    ///
    /// Pure function of the rule set and the census.
    pub fn decide(&self, census: &[u8]) -> StateId {
        debug_assert_eq!(census.len(), self.state_count);
        for &target in &self.preference {
            let row = &self.table[target as usize * self.state_count..][..self.state_count];
            if row
                .iter()
                .zip(census)
                .any(|(allowed, &count)| allowed.contains(count))
            {
                return target;
            }
        }
        self.id
    }
}

impl fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rules = f.debug_map();
        for &target in &self.preference {
            let row: Vec<CountSet> = (0..self.state_count)
                .map(|neighbor| self.rule(target, neighbor as StateId))
                .collect();
            rules.entry(&target, &row);
        }
        rules.finish()?;
        write!(f, " (state {} of {})", self.id, self.state_count)
    }
}

/// Incremental construction of a [`RuleSet`], used by tests and the text
/// parser. Targets left out of the preference are appended in ascending order.
#[derive(Debug, Clone)]
pub struct RuleSetBuilder {
    id: StateId,
    state_count: usize,
    table: Vec<CountSet>,
    preference: Vec<StateId>,
    error: Option<AutomataError>,
}

impl RuleSetBuilder {
    pub fn new(id: StateId, state_count: usize) -> Self {
        Self {
            id,
            state_count,
            table: vec![CountSet::EMPTY; state_count * state_count],
            preference: Vec::new(),
            error: None,
        }
    }

    /// Replace the permitted counts of `neighbor` for a transition into `target`.
    pub fn rule<I: IntoIterator<Item = u8>>(
        mut self,
        target: StateId,
        neighbor: StateId,
        counts: I,
    ) -> Self {
        self.set_rule(target, neighbor, CountSet::from_counts(counts));
        self
    }

    pub fn set_rule(&mut self, target: StateId, neighbor: StateId, counts: CountSet) {
        let (t, n) = (target as usize, neighbor as usize);
        if t >= self.state_count || n >= self.state_count {
            self.error.get_or_insert(AutomataError::InvalidRuleSet {
                id: self.id,
                reason: format!("rule ({} <- {}) outside the state set", target, neighbor),
            });
            return;
        }
        self.table[t * self.state_count + n] = counts;
    }

    /// Append `target` to the preference order unless it is already there.
    /// Returns false for duplicates.
    pub fn push_preference(&mut self, target: StateId) -> bool {
        if self.preference.contains(&target) {
            return false;
        }
        self.preference.push(target);
        true
    }

    pub fn preference(mut self, preference: Vec<StateId>) -> Self {
        self.preference = preference;
        self
    }

    pub fn build(mut self) -> Result<RuleSet> {
        if let Some(err) = self.error {
            return Err(err);
        }
        for target in 0..self.state_count.min(MAX_STATES) {
            let target = target as StateId;
            if target != self.id && !self.preference.contains(&target) {
                self.preference.push(target);
            }
        }
        RuleSet::new(self.id, self.state_count, self.table, self.preference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_set_rejects_large_counts() {
        let mut set = CountSet::EMPTY;
        assert!(set.insert(8));
        assert!(!set.insert(9));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![8]);
        assert!(!set.contains(9));
        assert_eq!(CountSet::FULL.len(), 9);
        assert_eq!(CountSet::from_counts([3, 1, 3, 12]).iter().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_new_rejects_bad_preference() {
        let table = vec![CountSet::EMPTY; 9];
        assert!(RuleSet::new(1, 3, table.clone(), vec![0, 2]).is_ok());
        assert!(RuleSet::new(1, 3, table.clone(), vec![0, 1]).is_err(), "self reference");
        assert!(RuleSet::new(1, 3, table.clone(), vec![0, 0]).is_err(), "duplicate");
        assert!(RuleSet::new(1, 3, table.clone(), vec![0]).is_err(), "missing target");
        assert!(RuleSet::new(1, 3, table.clone(), vec![0, 5]).is_err(), "unknown target");
        assert!(RuleSet::new(3, 3, table, vec![0, 1]).is_err(), "id out of range");
    }

    #[test]
    fn test_new_rejects_self_transition() {
        let mut table = vec![CountSet::EMPTY; 4];
        table[0] = CountSet::from_counts([2]);
        let err = RuleSet::new(0, 2, table, vec![1]).unwrap_err();
        assert!(matches!(err, AutomataError::InvalidRuleSet { id: 0, .. }));
    }

    #[test]
    fn test_decide_first_match_wins() {
        // Both targets match; preference puts 2 first.
        let rules = RuleSetBuilder::new(0, 3)
            .rule(1, 1, [1])
            .rule(2, 2, [1])
            .preference(vec![2, 1])
            .build()
            .unwrap();
        assert_eq!(rules.decide(&[6, 1, 1]), 2);
        assert_eq!(rules.decide(&[7, 1, 0]), 1);
        assert_eq!(rules.decide(&[8, 0, 0]), 0, "no match keeps the state");
    }

    #[test]
    fn test_decide_counts_zero() {
        let rules = RuleSetBuilder::new(1, 2).rule(0, 1, [0]).build().unwrap();
        assert_eq!(rules.decide(&[8, 0]), 0);
        assert_eq!(rules.decide(&[7, 1]), 1);
    }

    #[test]
    fn test_builder_fills_preference() {
        let rules = RuleSetBuilder::new(2, 4).preference(vec![3]).build().unwrap();
        assert_eq!(rules.preference(), &[3, 0, 1]);
        assert_eq!(rules.other_ids().collect::<Vec<_>>(), vec![0, 1, 3]);
    }

    #[test]
    fn test_builder_reports_out_of_range_rule() {
        let result = RuleSetBuilder::new(0, 2).rule(5, 1, [1]).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_stable_never_changes() {
        let rules = RuleSet::stable(1, 3).unwrap();
        for count in 0..=8 {
            assert_eq!(rules.decide(&[count, 0, 8 - count]), 1);
        }
        assert_eq!(rules.rule(7, 0), CountSet::EMPTY);
    }
}
