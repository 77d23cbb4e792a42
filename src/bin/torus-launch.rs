#[cfg(feature = "mimalloc-global")]
#[global_allocator]
static GLOBAL_ALLOCATOR: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use torus_anneal::cli::{WorkerArgs, init_tracing, parse_positive};
use torus_anneal::launch::{default_worker_program, launch};
use torus_anneal::{Error, run_in_process};
use tracing::error;

/// Start one `torus-anneal` worker per rank on this machine.
#[derive(Debug, Parser)]
#[command(name = "torus-launch", version)]
struct LaunchArgs {
    /// Number of workers.
    #[arg(short = 'n', long = "workers", value_parser = parse_positive)]
    workers: usize,

    /// Run the workers as threads of this process instead.
    #[arg(long)]
    in_process: bool,

    /// Worker binary; defaults to `torus-anneal` next to this executable.
    #[arg(long, value_name = "PATH")]
    program: Option<PathBuf>,

    /// Arguments passed to every worker.
    #[arg(last = true, required = true)]
    worker_args: Vec<OsString>,
}

fn in_process(args: &LaunchArgs) -> Result<ExitCode, Error> {
    let worker = std::iter::once(OsString::from("torus-anneal")).chain(args.worker_args.iter().cloned());
    let worker = match WorkerArgs::try_parse_from(worker) {
        Ok(worker) => worker,
        Err(err) => {
            // Nowhere left to report a failed write to stderr.
            let _ = err.print();
            return Ok(ExitCode::FAILURE);
        }
    };
    let outcome = run_in_process(&worker.config(), args.workers)?;
    if let Some(digest) = outcome.digest {
        println!("{digest}");
    }
    Ok(ExitCode::SUCCESS)
}

fn multi_process(args: &LaunchArgs) -> Result<ExitCode, Error> {
    let program = match &args.program {
        Some(program) => program.clone(),
        None => default_worker_program()?,
    };
    let code = launch(&program, args.workers, &args.worker_args)?;
    Ok(match u8::try_from(code) {
        Ok(code) => ExitCode::from(code),
        Err(_) => ExitCode::FAILURE,
    })
}

fn main() -> ExitCode {
    let args = match LaunchArgs::try_parse() {
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

    let result = if args.in_process {
        in_process(&args)
    } else {
        multi_process(&args)
    };
    match result {
        Ok(code) => code,
        Err(err) => {
            error!(%err, "launch failed");
            ExitCode::FAILURE
        }
    }
}
