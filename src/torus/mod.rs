//! Row-strip decomposition of the annealing torus and the per-rank engine.

mod collector;
mod decomposition;
mod engine;
mod exchange;
mod grid;
pub mod kernel;
mod rng;
mod row;
pub mod rules;
mod strip;

pub use collector::{COORDINATOR, collect};
pub use decomposition::{Assignment, Decomposition, DecompositionError};
pub use engine::{RunOutcome, Worker, run, run_in_process};
pub use exchange::{GhostExchange, RingNeighbors};
pub use grid::GlobalGrid;
pub use kernel::{KernelBackend, UnknownKernel};
pub use rng::{DEFAULT_SEED, LEcuyer};
pub use row::{AllocError, Row, real_column_mask, words_for_width};
pub use strip::{Band, Strip};
