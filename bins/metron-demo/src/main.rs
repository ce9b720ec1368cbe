//! Simulated hierarchical clustering run that exercises every recording
//! surface: timed milestones, registered workers, iteration metrics,
//! allocation tracking, the printed summary, and the file exports.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use metron_recorder::{Granularity, MilestoneKind, Recorder, RecorderConfig, init, shutdown};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

const WORKERS: usize = 4;
const SEQUENCES: usize = 64;

struct Args {
    config: Option<PathBuf>,
    csv: Option<PathBuf>,
    json: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut parsed = Args {
        config: None,
        csv: None,
        json: None,
    };
    let mut args = std::env::args().skip(1);
    while let Some(flag) = args.next() {
        match flag.as_str() {
            "--config" => parsed.config = Some(next_path(&mut args, "--config")?),
            "--csv" => parsed.csv = Some(next_path(&mut args, "--csv")?),
            "--json" => parsed.json = Some(next_path(&mut args, "--json")?),
            "--help" | "-h" => {
                eprintln!("usage: metron-demo [--config <toml>] [--csv <path>] [--json <path>]");
                std::process::exit(0);
            }
            other => bail!("unknown argument: {other}"),
        }
    }
    Ok(parsed)
}

fn next_path(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<PathBuf> {
    args.next()
        .map(PathBuf::from)
        .with_context(|| format!("{flag} requires a path"))
}

fn main() -> Result<()> {
    let args = parse_args()?;
    let config = match &args.config {
        Some(path) => RecorderConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => RecorderConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(LevelFilter::from_level(config.log_level.tracing_level()).into()),
        )
        .init();

    let recorder = init(config);
    tracing::info!(
        workers = WORKERS,
        sequences = SEQUENCES,
        "starting simulated clustering run"
    );

    run_clustering(&recorder);
    recorder.flush();

    let summary = recorder.summary();
    metron_recorder::write_summary(&mut std::io::stderr().lock(), &summary)?;

    if let Some(path) = &args.csv {
        recorder.export_csv(path)?;
        tracing::info!(path = %path.display(), "wrote CSV export");
    }
    if let Some(path) = &args.json {
        recorder.export_json(path)?;
        tracing::info!(path = %path.display(), "wrote JSON export");
    }

    shutdown();
    Ok(())
}

fn run_clustering(rec: &Recorder) {
    {
        let _init = rec.scope(MilestoneKind::Initialization);
        thread::sleep(Duration::from_millis(2));
    }

    let seeds = load_fasta(rec);
    rec.event_with_context("fasta_loaded", seeds.len() as f64, "demo.fasta");

    distance_matrix(rec, &seeds);
    cluster(rec);
    build_tree(rec);
    align(rec);
}

fn load_fasta(rec: &Recorder) -> Vec<u64> {
    let _scope = rec.scope_labeled(MilestoneKind::FastaLoadStart, "demo.fasta");
    (0..SEQUENCES as u64)
        .map(|i| {
            rec.track_allocation(512);
            i * 131 + 7
        })
        .collect()
}

fn distance_matrix(rec: &Recorder, seeds: &[u64]) {
    rec.start(MilestoneKind::DistanceMatrixStart);
    let chunk = seeds.len().div_ceil(WORKERS);
    thread::scope(|s| {
        for (pool_id, work) in seeds.chunks(chunk).enumerate() {
            s.spawn(move || {
                rec.register_thread_in_pool(pool_id as i32);
                let mut sum = 0.0;
                for &seed in work {
                    rec.start_at(MilestoneKind::DistanceCalculation, Granularity::Fine);
                    sum += pseudo_distance(seed);
                    rec.end_at(MilestoneKind::DistanceCalculation, Granularity::Fine);
                }
                rec.algorithm_step("distance", "chunk_mean", sum / work.len() as f64);
                rec.unregister_thread();
            });
        }
    });
    rec.end_labeled(MilestoneKind::DistanceMatrixStart, "pairwise complete");
}

fn cluster(rec: &Recorder) {
    rec.start(MilestoneKind::ClusteringStart);
    let mut convergence = 1.0;
    let mut iter = 0;
    while convergence > 0.01 {
        rec.start_at(MilestoneKind::ClusterAssignment, Granularity::Fine);
        thread::sleep(Duration::from_millis(1));
        rec.end_at(MilestoneKind::ClusterAssignment, Granularity::Fine);
        convergence *= 0.55;
        iter += 1;
        rec.iteration(iter, convergence);
    }
    rec.end_labeled(MilestoneKind::ClusteringStart, "converged");
}

fn build_tree(rec: &Recorder) {
    let _scope = rec.scope(MilestoneKind::TreeConstructionStart);
    for node in 0..SEQUENCES - 1 {
        rec.start_at(MilestoneKind::TreeNodeCreation, Granularity::Debug);
        rec.track_allocation(96);
        rec.end_at(MilestoneKind::TreeNodeCreation, Granularity::Debug);
        if node.is_multiple_of(16) {
            rec.algorithm_step("upgma", "merge", node as f64);
        }
    }
    rec.track_deallocation(96 * 8);
}

fn align(rec: &Recorder) {
    rec.start(MilestoneKind::AlignmentStart);
    for block in 0..4 {
        let label = format!("block_{block}");
        let _scope = rec.scope_labeled(MilestoneKind::KalignExecution, &label);
        thread::sleep(Duration::from_millis(1));
    }
    rec.end(MilestoneKind::AlignmentStart);
}

fn pseudo_distance(seed: u64) -> f64 {
    let mut h = seed | 1;
    for _ in 0..2_000 {
        h = h
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
    }
    (h % 1000) as f64 / 1000.0
}
