//! Argument parsing and tracing setup shared by the binaries.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::config::{DEFAULT_WIDTH, SimConfig};
use crate::torus::{DEFAULT_SEED, KernelBackend};

/// Arguments of one worker process.
#[derive(Clone, Debug, Parser)]
#[command(name = "torus-anneal", version, about = "Annealing automaton on a torus, one row strip per worker")]
pub struct WorkerArgs {
    /// Number of rows in the grid.
    #[arg(value_parser = parse_positive)]
    pub lines: usize,

    /// Number of iterations to run.
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    pub iterations: u64,

    /// Number of columns in the grid.
    #[arg(long, default_value_t = DEFAULT_WIDTH, value_parser = parse_positive)]
    pub width: usize,

    /// Seed of the initial configuration.
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Row kernel: scalar or bitsliced.
    #[arg(long, default_value_t = KernelBackend::Bitsliced)]
    pub kernel: KernelBackend,

    /// Print one row of the final grid and its population to stderr.
    #[arg(long, value_name = "ROW")]
    pub dump_row: Option<usize>,
}

impl WorkerArgs {
    pub fn config(&self) -> SimConfig {
        SimConfig::new(self.lines, self.iterations)
            .width(self.width)
            .seed(self.seed)
            .kernel(self.kernel)
    }
}

/// Parse a count that must be at least one.
pub fn parse_positive(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(0) => Err("must be a positive integer".to_string()),
        Ok(n) => Ok(n),
        Err(err) => Err(format!("{raw:?} is not a positive integer: {err}")),
    }
}

/// Install the stderr subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,torus_anneal=info"));
    // A second install (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
