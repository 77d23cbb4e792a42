#[cfg(feature = "mimalloc-global")]
#[global_allocator]
static GLOBAL_ALLOCATOR: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use torus_anneal::cli::{WorkerArgs, init_tracing};
use torus_anneal::config::WorldEnv;
use torus_anneal::torus::{Decomposition, GlobalGrid};
use torus_anneal::transport::{local, tcp};
use torus_anneal::{Error, RunOutcome, run};
use tracing::{error, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

fn execute(args: &WorkerArgs) -> Result<RunOutcome, Error> {
    let config = args.config();
    match WorldEnv::from_env()? {
        Some(world) => {
            // Fail before dialing so every rank rejects a bad split alike.
            config.validate()?;
            Decomposition::new(config.lines, world.size)?;
            let comm = tcp::connect(world.rank, &world.peers, CONNECT_TIMEOUT)?;
            run(&config, comm)
        }
        None => run(&config, local::singleton()),
    }
}

fn dump_row(grid: &GlobalGrid, y: usize) {
    if y >= grid.lines() {
        warn!(row = y, lines = grid.lines(), "--dump-row outside the grid");
        return;
    }
    let row = grid.row(y);
    eprintln!("{}", row.to_bit_string());
    eprintln!("population of row {y}: {}", row.population());
}

fn main() -> ExitCode {
    let args = match WorkerArgs::try_parse() {
        Ok(args) => args,
        Err(err) => {
            // Nowhere left to report a failed write to stderr.
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    init_tracing();

    match execute(&args) {
        Ok(outcome) => {
            if let (Some(grid), Some(y)) = (&outcome.grid, args.dump_row) {
                dump_row(grid, y);
            }
            if let Some(digest) = outcome.digest {
                println!("{digest}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(%err, "run failed");
            ExitCode::FAILURE
        }
    }
}
