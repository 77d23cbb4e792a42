use std::time::Instant;
use torus_anneal::{SimConfig, run_in_process};

fn bench_workers(config: &SimConfig, workers: usize) -> (f64, f64, String) {
    let start = Instant::now();
    let outcome = run_in_process(config, workers).expect("in-process run failed");
    let wall_ms = start.elapsed().as_secs_f64() * 1000.0;
    let step_ms = outcome.elapsed.as_secs_f64() * 1000.0;
    let digest = outcome.digest.map(|d| d.to_hex()).unwrap_or_default();
    (wall_ms, step_ms, digest)
}

fn main() {
    let scales: &[(usize, u64)] = &[
        (256, 200),  // small strips, exchange dominated
        (1024, 100),
        (4096, 25),  // compute dominated
    ];
    let workers: &[usize] = &[1, 2, 4, 8];

    println!(
        "{:<12} {:>8} {:>8} {:>12} {:>12} {:>10}  {}",
        "Grid", "Workers", "Iters", "Wall(ms)", "Steps(ms)", "Avg(ms)", "Digest"
    );
    println!("{}", "-".repeat(86));

    for &(lines, iters) in scales {
        let config = SimConfig::new(lines, iters);
        let mut baseline: Option<String> = None;
        for &w in workers {
            let (wall_ms, step_ms, digest) = bench_workers(&config, w);
            let avg_ms = step_ms / iters as f64;
            let marker = match &baseline {
                Some(first) if *first != digest => " MISMATCH",
                _ => "",
            };
            println!(
                "{:<12} {:>8} {:>8} {:>12.1} {:>12.1} {:>10.4}  {}{}",
                format!("{}x{}", lines, config.width),
                w,
                iters,
                wall_ms,
                step_ms,
                avg_ms,
                &digest[..digest.len().min(16)],
                marker
            );
            baseline.get_or_insert(digest);
        }
    }
}
