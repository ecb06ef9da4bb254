// src/workload.rs
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::{Deserialize, Serialize};

use crate::codec::RasterCodec;
use crate::config::PoolConfig;
use crate::engine::WarpPool;
use crate::stress::{self, StressOp, StressReport, StressSpec};
use crate::types::DatasetKind;

#[derive(Deserialize, Serialize, Debug)]
pub struct WorkloadConfig {
    #[serde(default)]
    pub pool: PoolParams,
    pub targets: Vec<Target>,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct PoolParams {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default)]
    pub default_nanos: u64,
}

impl Default for PoolParams {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            default_nanos: 0,
        }
    }
}

fn default_capacity() -> usize {
    crate::config::DEFAULT_POOL_CAPACITY
}

/// One dataset configuration to hammer.
#[derive(Deserialize, Serialize, Debug)]
pub struct Target {
    pub uri: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default = "default_threads")]
    pub threads: usize,
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    #[serde(default)]
    pub attempts: i32,
    #[serde(default = "default_copies")]
    pub copies: i32,
    #[serde(default)]
    pub nanos: u64,
    /// "noop", "width-height", or "pixels".
    #[serde(default = "default_op")]
    pub op: String,
    /// "source" or "warped".
    #[serde(default = "default_dataset")]
    pub dataset: String,
    #[serde(default)]
    pub src_window: Option<[i32; 4]>,
    #[serde(default)]
    pub dst_window: Option<[i32; 2]>,
    #[serde(default = "default_band")]
    pub band: i32,
}

fn default_threads() -> usize {
    16
}

fn default_iterations() -> usize {
    100
}

fn default_copies() -> i32 {
    -4
}

fn default_op() -> String {
    "width-height".to_string()
}

fn default_dataset() -> String {
    "warped".to_string()
}

fn default_band() -> i32 {
    1
}

impl WorkloadConfig {
    pub fn pool_config(&self) -> PoolConfig {
        let mut config = PoolConfig::new(self.pool.capacity);
        config.default_nanos = self.pool.default_nanos;
        config
    }
}

impl Target {
    pub fn stress_spec(&self) -> Result<StressSpec> {
        let dataset = match self.dataset.as_str() {
            "source" => DatasetKind::Source,
            "warped" => DatasetKind::Warped,
            other => anyhow::bail!("unknown dataset selector: {}", other),
        };
        let op = match self.op.as_str() {
            "noop" => StressOp::Noop,
            "width-height" => StressOp::WidthHeight,
            "pixels" => StressOp::Pixels {
                src_window: self.src_window.unwrap_or([0, 0, 64, 64]),
                dst_window: self.dst_window.unwrap_or([32, 32]),
                band: self.band,
            },
            other => anyhow::bail!("unknown operation: {}", other),
        };
        Ok(StressSpec {
            threads: self.threads,
            iterations: self.iterations,
            attempts: self.attempts,
            copies: self.copies,
            nanos: self.nanos,
            dataset,
            op,
        })
    }
}

pub fn load(path: &Path) -> Result<WorkloadConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading workload config {}", path.display()))?;
    let config: WorkloadConfig =
        serde_json::from_str(&content).context("parsing workload config")?;
    if config.targets.is_empty() {
        anyhow::bail!("workload config names no targets");
    }
    Ok(config)
}

/// Run every target against one shared pool, targets in parallel, and
/// answer the per-target reports in input order.
pub fn run<C: RasterCodec>(
    pool: Arc<WarpPool<C>>,
    config: &WorkloadConfig,
) -> Result<Vec<(String, StressReport)>> {
    let specs = config
        .targets
        .iter()
        .map(|target| Ok((target, target.stress_spec()?)))
        .collect::<Result<Vec<_>>>()?;

    Ok(specs
        .par_iter()
        .map(|(target, spec)| {
            let token = pool.get_token(&target.uri, &target.options);
            // Warm the copies so cold-start soft gets cannot come up empty.
            let _ = pool.noop(token, DatasetKind::Warped, 1, spec.copies.abs().max(1), 0);
            let report = stress::run(Arc::clone(&pool), token, spec.clone());
            (target.uri.clone(), report)
        })
        .collect())
}
