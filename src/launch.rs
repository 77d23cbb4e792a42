//! Multi-process launcher: one child per rank, wired through the `TORUS_*`
//! environment.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::config::WorldEnv;
use crate::error::Error;
use crate::torus::COORDINATOR;
use crate::transport::{Rank, tcp};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// The worker binary next to the running executable.
pub fn default_worker_program() -> Result<PathBuf, Error> {
    let exe = env::current_exe().map_err(Error::Spawn)?;
    let dir = exe.parent().unwrap_or_else(|| Path::new("."));
    Ok(dir.join(format!("torus-anneal{}", env::consts::EXE_SUFFIX)))
}

/// Spawn `workers` copies of `program` with `args` and wait for all of them.
///
/// Returns the exit code of the first worker that failed, or 0. When one
/// worker fails the rest are killed. Ports come from
/// [`tcp::reserve_loopback_peers`] and can be taken by another process before
/// a worker binds; that worker then exits 1 like any other failure.
pub fn launch(program: &Path, workers: usize, args: &[OsString]) -> Result<i32, Error> {
    let peers = tcp::reserve_loopback_peers(workers).map_err(Error::Spawn)?;
    info!(workers, program = %program.display(), "launching workers");

    let mut children: Vec<(Rank, Child)> = Vec::with_capacity(workers);
    for rank in 0..workers {
        let mut command = Command::new(program);
        command.args(args).envs(WorldEnv::vars_for(rank, &peers));
        if rank != COORDINATOR {
            command.stdout(Stdio::null());
        }
        match command.spawn() {
            Ok(child) => children.push((rank, child)),
            Err(err) => {
                kill_all(&mut children);
                return Err(Error::Spawn(err));
            }
        }
    }

    wait_all(children)
}

fn wait_all(mut running: Vec<(Rank, Child)>) -> Result<i32, Error> {
    while !running.is_empty() {
        let mut index = 0;
        while index < running.len() {
            let (rank, child) = &mut running[index];
            let rank = *rank;
            match child.try_wait() {
                Ok(Some(status)) => {
                    running.swap_remove(index);
                    let code = exit_code(status);
                    debug!(rank, code, "worker exited");
                    if code != 0 {
                        error!(rank, code, "worker failed, stopping the rest");
                        kill_all(&mut running);
                        return Ok(code);
                    }
                }
                Ok(None) => index += 1,
                Err(err) => {
                    kill_all(&mut running);
                    return Err(Error::Spawn(err));
                }
            }
        }
        if !running.is_empty() {
            thread::sleep(POLL_INTERVAL);
        }
    }
    Ok(0)
}

/// Signal deaths count as failure.
fn exit_code(status: ExitStatus) -> i32 {
    match status.code() {
        Some(code) => code,
        None => 1,
    }
}

fn kill_all(children: &mut Vec<(Rank, Child)>) {
    for (rank, mut child) in children.drain(..) {
        if let Err(err) = child.kill() {
            debug!(rank, %err, "kill failed");
        }
        let _ = child.wait();
    }
}
