//! Run configuration and the launcher's world description.

use std::net::SocketAddr;

use thiserror::Error;

use crate::torus::{DEFAULT_SEED, KernelBackend};
use crate::transport::Rank;

/// Real columns per row unless overridden.
pub const DEFAULT_WIDTH: usize = 1024;

pub const ENV_RANK: &str = "TORUS_RANK";
pub const ENV_WORLD_SIZE: &str = "TORUS_WORLD_SIZE";
/// Comma-separated listen addresses, indexed by rank.
pub const ENV_PEERS: &str = "TORUS_PEERS";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("grid must have at least one row")]
    NoLines,
    #[error("rows must have at least one column")]
    NoWidth,
    #[error("{var}: {reason}")]
    Env { var: &'static str, reason: String },
}

/// Parameters shared by every worker of a run.
///
/// Use [`SimConfig::new`] for the defaults, then adjust with the builder
/// methods.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimConfig {
    /// Rows of the global grid.
    pub lines: usize,
    /// Iterations to simulate. Zero leaves the initial configuration.
    pub iterations: u64,
    /// Real columns per row (halo columns not included).
    pub width: usize,
    /// Seed of the initial configuration.
    pub seed: u64,
    pub kernel: KernelBackend,
}

impl SimConfig {
    pub fn new(lines: usize, iterations: u64) -> Self {
        Self {
            lines,
            iterations,
            width: DEFAULT_WIDTH,
            seed: DEFAULT_SEED,
            kernel: KernelBackend::default(),
        }
    }

    pub fn width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn kernel(mut self, kernel: KernelBackend) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lines == 0 {
            return Err(ConfigError::NoLines);
        }
        if self.width == 0 {
            return Err(ConfigError::NoWidth);
        }
        Ok(())
    }
}

/// Where this process sits in a multi-process run, as set by `torus-launch`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorldEnv {
    pub rank: Rank,
    pub size: usize,
    pub peers: Vec<SocketAddr>,
}

impl WorldEnv {
    /// `Ok(None)` when none of the variables are set (a world of one).
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<Self>, ConfigError> {
        let rank = lookup(ENV_RANK);
        let size = lookup(ENV_WORLD_SIZE);
        let peers = lookup(ENV_PEERS);
        if rank.is_none() && size.is_none() && peers.is_none() {
            return Ok(None);
        }

        let rank: Rank = parse_var(ENV_RANK, rank)?;
        let size: usize = parse_var(ENV_WORLD_SIZE, size)?;
        let peers = peers
            .ok_or_else(|| missing(ENV_PEERS))?
            .split(',')
            .map(|addr| {
                addr.trim().parse().map_err(|err| ConfigError::Env {
                    var: ENV_PEERS,
                    reason: format!("bad address {addr:?}: {err}"),
                })
            })
            .collect::<Result<Vec<SocketAddr>, _>>()?;

        if size == 0 || peers.len() != size {
            return Err(ConfigError::Env {
                var: ENV_PEERS,
                reason: format!("{} addresses for a world of {size}", peers.len()),
            });
        }
        if rank >= size {
            return Err(ConfigError::Env {
                var: ENV_RANK,
                reason: format!("rank {rank} outside a world of {size}"),
            });
        }
        Ok(Some(Self { rank, size, peers }))
    }

    /// Variables that place a child process at `rank` of this world.
    pub fn vars_for(rank: Rank, peers: &[SocketAddr]) -> [(&'static str, String); 3] {
        let joined = peers.iter().map(SocketAddr::to_string).collect::<Vec<_>>().join(",");
        [
            (ENV_RANK, rank.to_string()),
            (ENV_WORLD_SIZE, peers.len().to_string()),
            (ENV_PEERS, joined),
        ]
    }
}

fn missing(var: &'static str) -> ConfigError {
    ConfigError::Env {
        var,
        reason: "not set".to_string(),
    }
}

fn parse_var(var: &'static str, value: Option<String>) -> Result<usize, ConfigError> {
    let value = value.ok_or_else(|| missing(var))?;
    value.trim().parse().map_err(|err| ConfigError::Env {
        var,
        reason: format!("{value:?} is not a count: {err}"),
    })
}
