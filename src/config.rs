use std::time::Duration;

/// Interactive grid dimensions (400x225 = 90K cells)
pub const GRID_WIDTH: usize = 400;
pub const GRID_HEIGHT: usize = 225;

/// Number of states, including the base state 0
pub const STATE_COUNT: usize = 4;

/// Largest supported state count (ids must fit in a `u8`)
pub const MAX_STATES: usize = 256;

/// Per-count inclusion probability used when generating rules
pub const INCLUSION_PROBABILITY: f64 = 0.1;

/// Radius of the randomized square seeded into the interactive grid
pub const SEED_RADIUS: usize = 10;

/// Steps the command line driver runs after installing a rule set
pub const DEFAULT_STEPS: u64 = 200;

// ============================================
// Density / Activity Search
// ============================================

/// Lower bound (exclusive) of the accepted average density
pub const SEARCH_MIN_DENSITY: f64 = 0.0;

/// Upper bound (exclusive) of the accepted average density
pub const SEARCH_MAX_DENSITY: f64 = 0.05;

/// Final-step activity must exceed this
pub const SEARCH_MIN_ACTIVITY: f64 = 0.0;

/// Steps simulated per trial; density is sampled over the second half
pub const SEARCH_ITERATIONS: usize = 10;

/// Side length of the square trial grid
pub const SEARCH_GRID_SIZE: usize = 100;

/// Wall-clock budget for one search (3 minutes)
pub const SEARCH_TIME_BUDGET: Duration = Duration::from_secs(180);

/// Pause handed back to the host between trials
pub const TRIAL_YIELD: Duration = Duration::from_millis(5);

/// Density above `EARLY_REJECT_FACTOR * max_density` ends a trial early
pub const EARLY_REJECT_FACTOR: f64 = 2.0;

/// Inclusion weights of the legacy bell-shaped curve, peaking at 4 neighbors.
/// Scaled by the inclusion probability, so 0.5 reproduces the legacy
/// fixed probabilities [0.1, 0.2, 0.3, 0.4, 0.5, 0.4, 0.3, 0.2, 0.1].
pub const BELL_WEIGHTS: [f64; 9] = [0.2, 0.4, 0.6, 0.8, 1.0, 0.8, 0.6, 0.4, 0.2];

// ============================================
// Rendering
// ============================================

/// Background color of the base state (white)
pub const BASE_COLOR: [u8; 4] = [0xFF, 0xFF, 0xFF, 0xFF];

/// Colors cycled through for active states
pub const ACTIVE_COLORS: [[u8; 4]; 8] = [
    [0x00, 0x00, 0x8F, 0xFF],
    [0x00, 0x70, 0xFF, 0xFF],
    [0x20, 0xE0, 0xE0, 0xFF],
    [0x70, 0xFF, 0x8F, 0xFF],
    [0xDF, 0xFF, 0x20, 0xFF],
    [0xFF, 0x90, 0x00, 0xFF],
    [0xFF, 0x20, 0x00, 0xFF],
    [0x80, 0x00, 0x00, 0xFF],
];
