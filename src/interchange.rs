//! Line-oriented text form of a rule set array.
//!
//! ```text
//! 0:
//! -> 2
//!     0: ,
//!     1: 3,4,
//!     2: ,
//! -> 1
//!     ...
//! ```
//!
//! One block per state, targets in preference order, one line per neighbor
//! id with the permitted counts. The parser is forgiving: it also takes the
//! bracketed form (`0: [ ... ]`), `=` in place of `:`, unindented neighbor
//! lines and stray whitespace. Unknown ids, counts above 8, duplicate blocks
//! and junk lines are dropped with a warning instead of failing the parse.

use std::collections::BTreeMap;
use std::fmt;

use crate::config::MAX_STATES;
use crate::error::{AutomataError, Result};
use crate::simulation::{CountSet, RuleSet, RuleSetBuilder, StateId};

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: ", self.id())?;
        for &target in self.preference() {
            writeln!(f, "-> {} ", target)?;
            for neighbor in 0..self.state_count() {
                let counts: Vec<String> = self
                    .rule(target, neighbor as StateId)
                    .iter()
                    .map(|c| c.to_string())
                    .collect();
                writeln!(f, "    {}: {},", neighbor, counts.join(","))?;
            }
        }
        Ok(())
    }
}

/// Serialize a rule set array, blocks separated by a blank line.
pub fn format_rule_sets(rule_sets: &[RuleSet]) -> String {
    rule_sets
        .iter()
        .map(|rules| rules.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

struct RawTarget {
    target: usize,
    neighbors: Vec<(usize, CountSet)>,
}

struct RawBlock {
    id: usize,
    targets: Vec<RawTarget>,
}

/// Parse rule text back into a rule set array.
///
/// Fails only when no block survives or the declared state ids are not
/// exactly `0..n`.
pub fn parse_rule_sets(text: &str) -> Result<Vec<RuleSet>> {
    let mut blocks: BTreeMap<usize, RawBlock> = BTreeMap::new();
    for block in scan_blocks(text) {
        if blocks.contains_key(&block.id) {
            log::warn!("Skipping duplicate block for state {}", block.id);
            continue;
        }
        blocks.insert(block.id, block);
    }

    if blocks.is_empty() {
        return Err(AutomataError::Parse("no rule blocks found".into()));
    }
    let state_count = blocks.len();
    if state_count > MAX_STATES {
        return Err(AutomataError::Parse(format!(
            "{} states declared, at most {} supported",
            state_count, MAX_STATES
        )));
    }
    if blocks.keys().enumerate().any(|(position, &id)| position != id) {
        return Err(AutomataError::Parse(format!(
            "state ids must run from 0 without gaps, found {:?}",
            blocks.keys().collect::<Vec<_>>()
        )));
    }

    blocks
        .into_values()
        .map(|block| build_rule_set(block, state_count))
        .collect()
}

fn build_rule_set(block: RawBlock, state_count: usize) -> Result<RuleSet> {
    let mut builder = RuleSetBuilder::new(block.id as StateId, state_count);
    for RawTarget { target, neighbors } in block.targets {
        if target >= state_count || target == block.id {
            log::warn!("State {}: dropping transition into {}", block.id, target);
            continue;
        }
        if !builder.push_preference(target as StateId) {
            log::warn!("State {}: dropping repeated transition into {}", block.id, target);
            continue;
        }
        for (neighbor, counts) in neighbors {
            if neighbor >= state_count {
                log::warn!(
                    "State {} -> {}: dropping counts of unknown state {}",
                    block.id,
                    target,
                    neighbor
                );
                continue;
            }
            builder.set_rule(target as StateId, neighbor as StateId, counts);
        }
    }
    builder.build()
}

/// Split text into raw blocks, dropping whatever cannot be placed.
fn scan_blocks(text: &str) -> Vec<RawBlock> {
    let mut blocks: Vec<RawBlock> = Vec::new();
    let mut block_open = false;
    let mut target_open = false;

    for (number, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("->") {
            target_open = false;
            let target = rest.trim().parse::<usize>().ok();
            match (block_open, target, blocks.last_mut()) {
                (true, Some(target), Some(block)) => {
                    block.targets.push(RawTarget {
                        target,
                        neighbors: Vec::new(),
                    });
                    target_open = true;
                }
                _ => log::warn!("Line {}: ignoring {:?}", number + 1, line),
            }
            continue;
        }

        if is_closing(line) {
            block_open = false;
            target_open = false;
            continue;
        }

        let Some((head, rest)) = line.split_once(|c: char| c == ':' || c == '=') else {
            log::warn!("Line {}: ignoring {:?}", number + 1, line);
            continue;
        };
        let Ok(id) = head.trim().parse::<usize>() else {
            log::warn!("Line {}: ignoring {:?}", number + 1, line);
            continue;
        };

        let rest = rest.trim();
        let opens = rest.starts_with(|c: char| matches!(c, '[' | '(' | '{'));
        let indented = raw.starts_with(char::is_whitespace);
        if opens || (rest.is_empty() && (!indented || !target_open)) {
            blocks.push(RawBlock {
                id,
                targets: Vec::new(),
            });
            block_open = true;
            target_open = false;
            continue;
        }

        let body = rest.trim_end_matches(|c: char| matches!(c, ']' | ')' | '}'));
        let closes = body.len() != rest.len();
        match (target_open, blocks.last_mut().and_then(|b| b.targets.last_mut())) {
            (true, Some(target)) => target.neighbors.push((id, parse_counts(body, number))),
            _ => log::warn!("Line {}: counts outside a transition {:?}", number + 1, line),
        }
        if closes {
            block_open = false;
            target_open = false;
        }
    }
    blocks
}

fn is_closing(line: &str) -> bool {
    !line.is_empty() && line.chars().all(|c| matches!(c, ']' | ')' | '}'))
}

fn parse_counts(body: &str, number: usize) -> CountSet {
    let mut counts = CountSet::EMPTY;
    for token in body
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
    {
        let accepted = token.parse::<u8>().map(|c| counts.insert(c)).unwrap_or(false);
        if !accepted {
            log::warn!("Line {}: dropping neighbor count {:?}", number + 1, token);
        }
    }
    counts
}
