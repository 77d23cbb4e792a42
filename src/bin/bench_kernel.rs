use rand::RngCore;
use rand::SeedableRng;
use std::env;
use std::time::Instant;
use torus_anneal::torus::kernel::advance_row;
use torus_anneal::torus::{KernelBackend, Row};

#[derive(Clone, Debug)]
struct BenchConfig {
    width: usize,
    rows: usize,
    density: f64,
    warmup: u64,
    iters: u64,
    seed: u64,
    json: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            rows: 1024,
            density: 0.5,
            warmup: 3,
            iters: 100,
            seed: 0xA5A5_5EED_7788_1122,
            json: false,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct RunResult {
    total_ms: f64,
    avg_ms: f64,
    population: u64,
}

fn parse_args() -> BenchConfig {
    let mut cfg = BenchConfig::default();
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--width" => {
                if let Some(v) = args.next() {
                    cfg.width = v.parse().expect("--width expects usize");
                }
            }
            "--rows" => {
                if let Some(v) = args.next() {
                    cfg.rows = v.parse().expect("--rows expects usize");
                }
            }
            "--density" => {
                if let Some(v) = args.next() {
                    cfg.density = v.parse().expect("--density expects f64");
                }
            }
            "--warmup" => {
                if let Some(v) = args.next() {
                    cfg.warmup = v.parse().expect("--warmup expects u64");
                }
            }
            "--iters" => {
                if let Some(v) = args.next() {
                    cfg.iters = v.parse().expect("--iters expects u64");
                }
            }
            "--seed" => {
                if let Some(v) = args.next() {
                    cfg.seed = if let Some(hex) = v.strip_prefix("0x") {
                        u64::from_str_radix(hex, 16).expect("--seed hex parse failed")
                    } else {
                        v.parse().expect("--seed expects u64")
                    };
                }
            }
            "--json" => {
                cfg.json = true;
            }
            other => panic!("unknown arg: {other}"),
        }
    }
    assert!(cfg.rows >= 1 && cfg.width >= 1, "--rows and --width must be positive");
    cfg
}

/// A wrapped torus of `rows` rows with one extra ghost row on each side,
/// refreshed from the opposite edge every generation.
fn seed_torus(cfg: &BenchConfig) -> Vec<Row> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(cfg.seed);
    let threshold = (u64::MAX as f64 * cfg.density) as u64;
    let mut rows = Vec::with_capacity(cfg.rows + 2);
    rows.push(Row::new(cfg.width));
    for _ in 0..cfg.rows {
        rows.push(Row::from_fn(cfg.width, |_| rng.next_u64() <= threshold));
    }
    rows.push(Row::new(cfg.width));
    rows
}

fn step(backend: KernelBackend, from: &mut [Row], to: &mut [Row]) {
    let last = from.len() - 2;
    for row in from[1..=last].iter_mut() {
        row.wrap_horizontal();
    }
    from[0] = from[last].clone();
    from[last + 1] = from[1].clone();
    for y in 1..=last {
        advance_row(backend, &from[y - 1], &from[y], &from[y + 1], &mut to[y]);
    }
}

fn run_backend(cfg: &BenchConfig, backend: KernelBackend) -> RunResult {
    let mut current = seed_torus(cfg);
    let mut next = current.clone();

    for _ in 0..cfg.warmup {
        step(backend, &mut current, &mut next);
        std::mem::swap(&mut current, &mut next);
    }

    let start = Instant::now();
    for _ in 0..cfg.iters {
        step(backend, &mut current, &mut next);
        std::mem::swap(&mut current, &mut next);
    }
    let elapsed = start.elapsed();
    let total_ms = elapsed.as_secs_f64() * 1000.0;
    let avg_ms = total_ms / cfg.iters.max(1) as f64;
    let population = current[1..=cfg.rows]
        .iter()
        .map(|row| u64::from(row.population()))
        .sum();

    RunResult {
        total_ms,
        avg_ms,
        population,
    }
}

fn main() {
    let cfg = parse_args();
    let scalar = run_backend(&cfg, KernelBackend::Scalar);
    let bitsliced = run_backend(&cfg, KernelBackend::Bitsliced);
    let speedup = scalar.avg_ms / bitsliced.avg_ms;
    let matched = scalar.population == bitsliced.population;

    if cfg.json {
        println!(
            "{{\"width\":{},\"rows\":{},\"density\":{},\"warmup\":{},\"iters\":{},\"seed\":{},\"scalar\":{{\"total_ms\":{:.6},\"avg_ms\":{:.6},\"population\":{}}},\"bitsliced\":{{\"total_ms\":{:.6},\"avg_ms\":{:.6},\"population\":{}}},\"speedup\":{:.6},\"match\":{}}}",
            cfg.width,
            cfg.rows,
            cfg.density,
            cfg.warmup,
            cfg.iters,
            cfg.seed,
            scalar.total_ms,
            scalar.avg_ms,
            scalar.population,
            bitsliced.total_ms,
            bitsliced.avg_ms,
            bitsliced.population,
            speedup,
            matched,
        );
    } else {
        println!(
            "scalar: total_ms={:.6}, avg_ms={:.6}, population={}",
            scalar.total_ms, scalar.avg_ms, scalar.population
        );
        println!(
            "bitsliced: total_ms={:.6}, avg_ms={:.6}, population={}, speedup={:.3}x",
            bitsliced.total_ms, bitsliced.avg_ms, bitsliced.population, speedup,
        );
        if !matched {
            println!("population MISMATCH between backends");
        }
    }
}
