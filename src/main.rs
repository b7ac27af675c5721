//! Segmented LRU benchmark
//!
//! Measures GET and SET throughput of the cache under random keys and
//! prints a JSON report.
//!
//! # Environment Variables
//! - `LRU_MAX_SIZE` / `LRU_MAX_AGE_MS` - cache configuration, see `CacheConfig::from_env`
//! - `BENCH_ROUNDS` - rounds per workload (default: 100)
//! - `BENCH_OPS` - operations per round (default: 100000)

use std::env;
use std::time::Instant;

use anyhow::Context;
use rand::Rng;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use segmented_lru::cache::CacheStats;
use segmented_lru::{CacheConfig, SegmentedCache};

/// Throughput summary for one workload, in operations per millisecond.
#[derive(Debug, Default, Serialize)]
struct Throughput {
    rounds: usize,
    mean: f64,
    stddev: f64,
    min: f64,
    max: f64,
}

impl Throughput {
    fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let rounds = samples.len();
        let mean = samples.iter().sum::<f64>() / rounds as f64;
        let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / rounds as f64;
        Self {
            rounds,
            mean,
            stddev: variance.sqrt(),
            min: samples.iter().copied().fold(f64::INFINITY, f64::min),
            max: samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

#[derive(Debug, Serialize)]
struct Report {
    max_size: usize,
    ops_per_round: usize,
    get: Throughput,
    set: Throughput,
    /// Stats from the last SET round
    set_stats: CacheStats,
}

/// Runs `op` `ops` times per round against a fresh cache from `init`.
fn run<F, I>(rounds: usize, ops: usize, mut init: I, mut op: F) -> anyhow::Result<(Throughput, CacheStats)>
where
    I: FnMut() -> anyhow::Result<SegmentedCache<u64, f64>>,
    F: FnMut(&mut SegmentedCache<u64, f64>),
{
    let mut samples = Vec::with_capacity(rounds);
    let mut stats = CacheStats::new();
    for _ in 0..rounds {
        let mut cache = init()?;
        let start = Instant::now();
        for _ in 0..ops {
            op(&mut cache);
        }
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        samples.push(ops as f64 / elapsed_ms.max(f64::EPSILON));
        stats = cache.stats();
    }
    Ok((Throughput::from_samples(&samples), stats))
}

fn env_or(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "segmented_lru=info,segmented_lru_bench=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CacheConfig::from_env();
    config.validate().context("invalid cache configuration")?;
    let rounds = env_or("BENCH_ROUNDS", 100);
    let ops = env_or("BENCH_OPS", 100_000);
    info!(
        "Benchmark configured: max_size={}, max_age={:?}, rounds={}, ops={}",
        config.max_size, config.max_age, rounds, ops
    );

    let key_space = config.max_size as u64;
    let mut rng = rand::rng();

    // Fill with random keys, then read random keys: a mix of hits and misses
    let (get, _) = run(
        rounds,
        ops,
        || {
            let mut cache = SegmentedCache::with_config(config.clone())?;
            let mut fill_rng = rand::rng();
            for _ in 0..key_space {
                cache.set(fill_rng.random_range(0..key_space), fill_rng.random::<f64>());
            }
            Ok(cache)
        },
        |cache| {
            cache.get(&rng.random_range(0..key_space));
        },
    )?;
    info!("GET: {:.1} ops/ms (stddev {:.1})", get.mean, get.stddev);

    // Write keys from a space 100x the capacity: nearly every write evicts
    let mut rng = rand::rng();
    let wide_space = key_space.saturating_mul(100);
    let (set, set_stats) = run(
        rounds,
        ops,
        || Ok(SegmentedCache::with_config(config.clone())?),
        |cache| {
            cache.set(rng.random_range(0..wide_space), rng.random::<f64>());
        },
    )?;
    info!("SET: {:.1} ops/ms (stddev {:.1})", set.mean, set.stddev);

    let report = Report {
        max_size: config.max_size,
        ops_per_round: ops,
        get,
        set,
        set_stats,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
