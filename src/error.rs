use std::io;

use thiserror::Error;

use crate::config::ConfigError;
use crate::torus::{AllocError, DecompositionError};
use crate::transport::{CommError, Rank};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("cannot decompose grid: {0}")]
    Decomposition(#[from] DecompositionError),
    #[error(transparent)]
    Alloc(#[from] AllocError),
    #[error("communication failed: {0}")]
    Comm(#[from] CommError),
    #[error("worker {rank} panicked")]
    WorkerPanicked { rank: Rank },
    #[error("failed to spawn worker: {0}")]
    Spawn(#[source] io::Error),
}
