//! Command-line driver: search for rules, simulate, print the result.

use std::time::Duration;

use clap::{Parser, ValueEnum};
use env_logger::Env;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use census_life::app::{Session, SessionConfig};
use census_life::config::{
    DEFAULT_STEPS, GRID_HEIGHT, GRID_WIDTH, INCLUSION_PROBABILITY, SEARCH_GRID_SIZE,
    SEARCH_ITERATIONS, SEARCH_MAX_DENSITY, SEARCH_MIN_ACTIVITY, SEARCH_MIN_DENSITY,
    SEARCH_TIME_BUDGET, SEED_RADIUS, STATE_COUNT,
};
use census_life::simulation::{Deadline, Immediate, InclusionCurve, SearchConfig, Sleep, TrialScheduler};
use census_life::AutomataError;

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Curve {
    /// Every neighbor count equally likely
    Uniform,
    /// Counts near 4 favored
    Bell,
}

impl From<Curve> for InclusionCurve {
    fn from(curve: Curve) -> Self {
        match curve {
            Curve::Uniform => InclusionCurve::Uniform,
            Curve::Bell => InclusionCurve::Bell,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Multi-state neighbor-count automata explorer", long_about = None)]
struct Cli {
    /// Increase verbosity.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Grid width in cells.
    #[arg(long, default_value_t = GRID_WIDTH)]
    width: usize,
    /// Grid height in cells.
    #[arg(long, default_value_t = GRID_HEIGHT)]
    height: usize,
    /// Number of states, including the base state.
    #[arg(short, long, default_value_t = STATE_COUNT)]
    states: usize,
    /// Probability that a neighbor count joins a generated rule.
    #[arg(short, long, default_value_t = INCLUSION_PROBABILITY)]
    probability: f64,
    /// Shape of the inclusion probability over neighbor counts.
    #[arg(long, value_enum, default_value_t = Curve::Uniform)]
    curve: Curve,
    /// Generations to simulate after the rules are chosen.
    #[arg(short = 'n', long, default_value_t = DEFAULT_STEPS)]
    steps: u64,
    /// Seed for reproducible runs; random when omitted.
    #[arg(long)]
    seed: Option<u64>,
    /// Half side of the randomized square in the middle of the grid.
    #[arg(long, default_value_t = SEED_RADIUS)]
    seed_radius: usize,
    /// Skip the search and use plain random rules.
    #[arg(long)]
    no_search: bool,
    /// Search time budget in seconds.
    #[arg(long, default_value_t = SEARCH_TIME_BUDGET.as_secs())]
    budget: u64,
    /// Pause between search trials in milliseconds.
    #[arg(long, default_value_t = 0)]
    trial_pause_ms: u64,
    /// Lower bound of the accepted average density (exclusive).
    #[arg(long, default_value_t = SEARCH_MIN_DENSITY)]
    min_density: f64,
    /// Upper bound of the accepted average density (exclusive).
    #[arg(long, default_value_t = SEARCH_MAX_DENSITY)]
    max_density: f64,
    /// Final activity must exceed this.
    #[arg(long, default_value_t = SEARCH_MIN_ACTIVITY)]
    min_activity: f64,
    /// Steps per search trial.
    #[arg(long, default_value_t = SEARCH_ITERATIONS)]
    iterations: usize,
    /// Side of the square grid used by search trials.
    #[arg(long, default_value_t = SEARCH_GRID_SIZE)]
    trial_size: usize,
    /// Print the final grid as text.
    #[arg(long)]
    print_grid: bool,
}

fn main() {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    if let Err(e) = run(cli) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), AutomataError> {
    let rng = match cli.seed {
        Some(seed) => {
            log::info!("Using seed {}", seed);
            ChaCha8Rng::seed_from_u64(seed)
        }
        None => ChaCha8Rng::from_entropy(),
    };

    let session_config = SessionConfig {
        width: cli.width,
        height: cli.height,
        state_count: cli.states,
        inclusion_probability: cli.probability,
        curve: cli.curve.into(),
        seed_radius: cli.seed_radius,
    };
    let mut session = Session::new(session_config, rng)?;

    if cli.no_search {
        session.randomize_rules()?;
    } else {
        let search_config = SearchConfig {
            state_count: cli.states,
            inclusion_probability: cli.probability,
            curve: cli.curve.into(),
            min_density: cli.min_density,
            max_density: cli.max_density,
            min_activity: cli.min_activity,
            iterations: cli.iterations,
            size: cli.trial_size,
            time_budget: Duration::from_secs(cli.budget),
        };
        let mut deadline = Deadline::new(search_config.time_budget);
        let mut scheduler: Box<dyn TrialScheduler> = if cli.trial_pause_ms == 0 {
            Box::new(Immediate)
        } else {
            Box::new(Sleep(Duration::from_millis(cli.trial_pause_ms)))
        };
        let result = session.search_rules(
            search_config,
            || deadline.should_continue(),
            scheduler.as_mut(),
        )?;
        if !result.success {
            log::warn!("No rules met the search criteria; using the last candidate");
        }
    }

    let ran = session.run(cli.steps);
    log::info!(
        "Ran {} generations: density {:.4}, activity {:.4}",
        ran,
        session.grid().density(),
        session.grid().activity()
    );

    println!("{}", session.export_rules());
    if cli.print_grid {
        print!("{}", session.ascii());
    }
    Ok(())
}
