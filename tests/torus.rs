use rand::RngCore;
use rand::SeedableRng;
use torus_anneal::torus::{DEFAULT_SEED, GlobalGrid};
use torus_anneal::{Error, KernelBackend, SimConfig, run_in_process};

const ANNEAL: [u8; 10] = [0, 0, 0, 0, 1, 0, 1, 1, 1, 1];

/// Plain byte-per-cell torus, stepped with modular indexing.
fn naive_cells(grid: &GlobalGrid) -> Vec<Vec<u8>> {
    (0..grid.lines())
        .map(|y| {
            let row = grid.row(y);
            (1..=grid.width()).map(|x| u8::from(row.get(x))).collect()
        })
        .collect()
}

fn naive_step(cells: &[Vec<u8>]) -> Vec<Vec<u8>> {
    let lines = cells.len();
    let width = cells[0].len();
    let mut next = vec![vec![0u8; width]; lines];
    for y in 0..lines {
        for x in 0..width {
            let mut live = 0usize;
            for dy in [lines - 1, 0, 1] {
                for dx in [width - 1, 0, 1] {
                    live += cells[(y + dy) % lines][(x + dx) % width] as usize;
                }
            }
            next[y][x] = ANNEAL[live];
        }
    }
    next
}

fn naive_digest(cells: &[Vec<u8>]) -> String {
    let mut hasher = blake3::Hasher::new();
    for row in cells {
        let width = row.len();
        hasher.update(&[row[width - 1]]);
        hasher.update(row);
        hasher.update(&[row[0]]);
    }
    hasher.finalize().to_hex().to_string()
}

fn digest_with(config: &SimConfig, workers: usize) -> String {
    run_in_process(config, workers)
        .unwrap_or_else(|err| panic!("run with {workers} workers failed: {err}"))
        .digest
        .expect("coordinator reports a digest")
        .to_hex()
}

#[test]
fn four_lines_one_iteration_matches_naive_torus() {
    let config = SimConfig::new(4, 1);
    let mut cells = naive_cells(&GlobalGrid::seeded(4, config.width, DEFAULT_SEED).unwrap());
    cells = naive_step(&cells);
    assert_eq!(digest_with(&config, 1), naive_digest(&cells));
}

/// Digests of the default configuration (width 1024, seed 424243), fixed so
/// that any change to seeding, the rule or the byte layout shows up.
const FOUR_LINES_ONE_ITERATION: &str = "eadc527097e2e96122f968584a9135b15f4b297b4cc315b6854f1836baa6e14e";
const SIX_LINES_FIVE_ITERATIONS: &str = "4940998594d309167d7454a4e758149b193b1869aa0fa5f0d8cfd55c2e9f5a54";

#[test]
fn default_configuration_digests_are_pinned() {
    assert_eq!(digest_with(&SimConfig::new(4, 1), 1), FOUR_LINES_ONE_ITERATION);
    for workers in 1..=3 {
        assert_eq!(
            digest_with(&SimConfig::new(6, 5), workers),
            SIX_LINES_FIVE_ITERATIONS,
            "workers {workers}"
        );
    }
}

#[test]
fn several_iterations_match_naive_torus_on_odd_width() {
    let config = SimConfig::new(9, 5).width(70).seed(17);
    let mut cells = naive_cells(&GlobalGrid::seeded(9, 70, 17).unwrap());
    for _ in 0..5 {
        cells = naive_step(&cells);
    }
    let expected = naive_digest(&cells);
    for workers in [1, 2, 4] {
        assert_eq!(digest_with(&config, workers), expected, "workers {workers}");
    }
}

#[test]
fn digest_is_independent_of_worker_count() {
    for &(lines, width) in &[(10usize, 64usize), (13, 130), (7, 1)] {
        let config = SimConfig::new(lines, 6).width(width);
        let single = digest_with(&config, 1);
        for workers in 2..=5 {
            if workers > lines {
                continue;
            }
            assert_eq!(
                digest_with(&config, workers),
                single,
                "lines {lines} width {width} workers {workers}"
            );
        }
    }
}

#[test]
fn six_lines_on_one_two_and_three_workers() {
    let config = SimConfig::new(6, 3);
    let one = digest_with(&config, 1);
    assert_eq!(digest_with(&config, 2), one);
    assert_eq!(digest_with(&config, 3), one);
}

#[test]
fn zero_iterations_reports_the_initial_configuration() {
    let config = SimConfig::new(5, 0).width(100);
    let outcome = run_in_process(&config, 2).unwrap();
    let initial = GlobalGrid::seeded(5, 100, DEFAULT_SEED).unwrap();
    assert_eq!(outcome.grid.as_ref(), Some(&initial));
    assert_eq!(outcome.digest, Some(initial.digest()));
}

#[test]
fn more_workers_than_lines_is_fatal() {
    let config = SimConfig::new(2, 1);
    match run_in_process(&config, 4) {
        Err(Error::Decomposition(_)) => {}
        other => panic!("expected a decomposition error, got {other:?}"),
    }
}

#[test]
fn unallocatable_strip_is_an_error() {
    let config = SimConfig::new(4, 1).width(usize::MAX / 4);
    match run_in_process(&config, 2) {
        Err(Error::Alloc(err)) => assert_eq!(err.width, usize::MAX / 4),
        other => panic!("expected an allocation error, got {other:?}"),
    }
}

#[test]
fn zero_workers_is_fatal() {
    assert!(matches!(
        run_in_process(&SimConfig::new(4, 1), 0),
        Err(Error::Decomposition(_))
    ));
}

#[test]
fn kernels_agree_across_seeds() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(0x5EED_1234_ABCD_EF01);
    for _ in 0..4 {
        let seed = rng.next_u64() % 1_000_000;
        let base = SimConfig::new(8, 4).width(200).seed(seed);
        let scalar = digest_with(&base.clone().kernel(KernelBackend::Scalar), 3);
        let bitsliced = digest_with(&base.kernel(KernelBackend::Bitsliced), 3);
        assert_eq!(scalar, bitsliced, "seed {seed}");
    }
}

#[test]
fn seed_changes_the_result() {
    let a = digest_with(&SimConfig::new(6, 2).width(64).seed(1), 2);
    let b = digest_with(&SimConfig::new(6, 2).width(64).seed(2), 2);
    assert_ne!(a, b);
}
