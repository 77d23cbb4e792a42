//! Annealing cellular automaton on a torus, split into row strips that
//! exchange ghost rows around a ring of workers.

pub mod cli;
pub mod config;
pub mod digest;
pub mod error;
pub mod launch;
pub mod torus;
pub mod transport;

pub use config::{SimConfig, WorldEnv};
pub use digest::Digest;
pub use error::{Error, Result};
pub use torus::{GlobalGrid, KernelBackend, RunOutcome, run, run_in_process};
