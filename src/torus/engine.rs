use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, info_span, trace};

use crate::config::SimConfig;
use crate::digest::Digest;
use crate::error::Error;
use crate::transport::{CommError, Communicator, Rank, local};

use super::collector::{self, COORDINATOR};
use super::decomposition::{Assignment, Decomposition};
use super::exchange::{GhostExchange, RingNeighbors};
use super::grid::{GlobalGrid, seed_row};
use super::kernel::{KernelBackend, advance_row};
use super::rng::LEcuyer;
use super::row::AllocError;
use super::strip::{Band, Strip};

/// One rank's share of the simulation: its strip and its place on the ring.
pub struct Worker {
    assignment: Assignment,
    neighbors: RingNeighbors,
    strip: Strip,
    kernel: KernelBackend,
    generation: u64,
}

impl Worker {
    /// Allocate the strip for `rank` and draw its slice of the initial
    /// configuration.
    pub fn new(config: &SimConfig, decomposition: &Decomposition, rank: Rank) -> Result<Self, AllocError> {
        let assignment = decomposition.assignment(rank);
        let mut strip = Strip::new(assignment.rows, config.width)?;

        let mut rng = LEcuyer::new(config.seed);
        rng.skip(assignment.offset as u64 * config.width as u64);
        let band = strip.current_mut();
        for y in 1..=assignment.rows {
            seed_row(band.row_mut(y), &mut rng);
        }

        Ok(Self {
            assignment,
            neighbors: RingNeighbors::of(rank, decomposition.workers()),
            strip,
            kernel: config.kernel,
            generation: 0,
        })
    }

    #[inline]
    pub fn assignment(&self) -> Assignment {
        self.assignment
    }

    #[inline]
    pub fn neighbors(&self) -> RingNeighbors {
        self.neighbors
    }

    /// Current band, ghost rows included.
    #[inline]
    pub fn band(&self) -> &Band {
        self.strip.current()
    }

    /// Advance one iteration: wrap, exchange ghosts while computing the
    /// interior, then the boundary rows, then swap buffers.
    pub fn step<C: Communicator>(&mut self, comm: &mut C) -> Result<(), CommError> {
        let kernel = self.kernel;
        let (from, to) = self.strip.bands_mut();
        let last = from.own_rows();

        from.wrap_horizontal();
        let exchange = GhostExchange::start(comm, self.neighbors, from)?;

        // Rows 2..last only read own rows.
        for y in 2..last {
            advance_band_row(kernel, from, to, y);
        }

        exchange.finish(comm, from)?;
        advance_band_row(kernel, from, to, 1);
        if last != 1 {
            advance_band_row(kernel, from, to, last);
        }

        self.strip.swap();
        self.generation += 1;
        trace!(generation = self.generation, "step complete");
        Ok(())
    }

    pub fn step_n<C: Communicator>(&mut self, comm: &mut C, iterations: u64) -> Result<(), CommError> {
        for _ in 0..iterations {
            self.step(comm)?;
        }
        Ok(())
    }

    /// Wrap the final band and gather it at the coordinator.
    pub fn collect<C: Communicator>(
        &mut self,
        comm: &mut C,
        decomposition: &Decomposition,
    ) -> Result<Option<GlobalGrid>, Error> {
        self.strip.current_mut().wrap_horizontal();
        collector::collect(comm, decomposition, self.strip.current())
    }
}

#[inline]
fn advance_band_row(kernel: KernelBackend, from: &Band, to: &mut Band, y: usize) {
    advance_row(kernel, from.row(y - 1), from.row(y), from.row(y + 1), to.row_mut(y));
}

/// What a rank reports once its run is over.
#[derive(Debug)]
pub struct RunOutcome {
    pub rank: Rank,
    pub assignment: Assignment,
    /// Time spent in the iteration loop.
    pub elapsed: Duration,
    /// Assembled grid; coordinator only.
    pub grid: Option<GlobalGrid>,
    /// Digest of `grid`; coordinator only.
    pub digest: Option<Digest>,
}

/// Run one rank of a simulation to completion and finalize `comm`.
///
/// The decomposition is checked before any message is sent, so a bad
/// configuration fails on every rank without touching the network.
pub fn run<C: Communicator>(config: &SimConfig, mut comm: C) -> Result<RunOutcome, Error> {
    config.validate()?;
    let rank = comm.rank();
    let decomposition = Decomposition::new(config.lines, comm.size())?;
    let span = info_span!("worker", rank);
    let _enter = span.enter();

    let mut worker = Worker::new(config, &decomposition, rank)?;
    let assignment = worker.assignment();
    debug!(
        rows = assignment.rows,
        offset = assignment.offset,
        top = worker.neighbors().top,
        bottom = worker.neighbors().bottom,
        "strip assigned"
    );

    let start = Instant::now();
    worker.step_n(&mut comm, config.iterations)?;
    let elapsed = start.elapsed();
    debug!(
        iterations = config.iterations,
        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
        population = worker.band().population(),
        "iterations done"
    );

    let grid = worker.collect(&mut comm, &decomposition)?;
    comm.finalize()?;

    let digest = grid.as_ref().map(GlobalGrid::digest);
    if let (Some(grid), Some(digest)) = (&grid, &digest) {
        info!(
            lines = grid.lines(),
            width = grid.width(),
            workers = decomposition.workers(),
            iterations = config.iterations,
            population = grid.population(),
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            %digest,
            "simulation complete"
        );
    }

    Ok(RunOutcome {
        rank,
        assignment,
        elapsed,
        grid,
        digest,
    })
}

/// Run `workers` ranks on threads of this process over the local backend and
/// return the coordinator's outcome. Fails with the lowest-ranked error.
pub fn run_in_process(config: &SimConfig, workers: usize) -> Result<RunOutcome, Error> {
    if workers == 0 {
        return Err(super::DecompositionError::NoWorkers.into());
    }
    let results: Vec<Result<RunOutcome, Error>> = thread::scope(|scope| {
        let handles: Vec<_> = local::cluster(workers)
            .into_iter()
            .enumerate()
            .map(|(rank, comm)| {
                let handle = thread::Builder::new()
                    .name(format!("torus-worker-{rank}"))
                    .spawn_scoped(scope, move || run(config, comm));
                (rank, handle)
            })
            .collect();
        handles
            .into_iter()
            .map(|(rank, handle)| match handle {
                Ok(handle) => handle.join().unwrap_or(Err(Error::WorkerPanicked { rank })),
                Err(err) => Err(Error::Spawn(err)),
            })
            .collect()
    });

    let mut coordinator = None;
    for result in results {
        let outcome = result?;
        if outcome.rank == COORDINATOR {
            coordinator = Some(outcome);
        }
    }
    coordinator.ok_or(Error::WorkerPanicked { rank: COORDINATOR })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workers_draw_their_slice_of_the_serial_stream() {
        let config = SimConfig::new(7, 0).width(90).seed(5);
        let decomposition = Decomposition::new(7, 3).unwrap();
        let serial = GlobalGrid::seeded(7, 90, 5).unwrap();
        for a in decomposition.assignments() {
            let mut worker = Worker::new(&config, &decomposition, a.rank).unwrap();
            let band = worker.strip.current_mut();
            band.wrap_horizontal();
            for y in 1..=a.rows {
                assert_eq!(band.row(y), serial.row(a.offset + y - 1), "rank {} row {y}", a.rank);
            }
        }
    }

    #[test]
    fn oversized_strip_fails_instead_of_aborting() {
        let config = SimConfig::new(4, 1).width(usize::MAX / 4);
        let decomposition = Decomposition::new(4, 1).unwrap();
        assert!(Worker::new(&config, &decomposition, 0).is_err());

        let err = run(&config, local::singleton()).unwrap_err();
        assert!(matches!(err, Error::Alloc(_)), "{err}");
    }
}
