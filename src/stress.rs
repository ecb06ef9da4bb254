use std::panic;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use flume::{Receiver, Sender};

use crate::codec::RasterCodec;
use crate::engine::WarpPool;
use crate::types::{DatasetKind, PixelType, Token};

/// Operation mix for a stress run.
#[derive(Clone, Debug)]
pub enum StressOp {
    /// Lock-and-release only; pure contention measurement.
    Noop,
    WidthHeight,
    Pixels {
        src_window: [i32; 4],
        dst_window: [i32; 2],
        band: i32,
    },
}

#[derive(Clone, Debug)]
pub struct StressSpec {
    pub threads: usize,
    pub iterations: usize,
    pub attempts: i32,
    pub copies: i32,
    pub nanos: u64,
    pub dataset: DatasetKind,
    pub op: StressOp,
}

#[derive(Debug, Default)]
pub struct StressReport {
    pub operations: usize,
    pub successes: usize,
    pub failures: usize,
    pub touched_total: u64,
    pub touched_max: i32,
    pub last_error: i32,
    pub elapsed: Duration,
}

impl StressReport {
    /// Average handles touched per successful call. Above 1.0 means calls
    /// were bouncing between copies, i.e. the pool absorbed contention.
    pub fn reuse_rate(&self) -> f64 {
        if self.successes == 0 {
            0.0
        } else {
            self.touched_total as f64 / self.successes as f64
        }
    }

    pub fn ops_per_second(&self) -> f64 {
        let seconds = self.elapsed.as_secs_f64();
        if seconds == 0.0 {
            0.0
        } else {
            self.operations as f64 / seconds
        }
    }

    fn record(&mut self, code: i32) {
        self.operations += 1;
        if code > 0 {
            self.successes += 1;
            self.touched_total += code as u64;
            self.touched_max = self.touched_max.max(code);
        } else {
            self.failures += 1;
            self.last_error = code;
        }
    }
}

fn execute<C: RasterCodec>(pool: &WarpPool<C>, token: Token, spec: &StressSpec) -> i32 {
    match &spec.op {
        StressOp::Noop => pool.noop(token, spec.dataset, spec.attempts, spec.copies, spec.nanos),
        StressOp::WidthHeight => {
            let (mut width, mut height) = (0, 0);
            pool.get_width_height(
                token,
                spec.dataset,
                spec.attempts,
                spec.copies,
                spec.nanos,
                &mut width,
                &mut height,
            )
        }
        StressOp::Pixels {
            src_window,
            dst_window,
            band,
        } => {
            let mut data =
                vec![0u8; dst_window[0] as usize * dst_window[1] as usize * PixelType::Byte.size()];
            pool.get_data(
                token,
                spec.dataset,
                spec.attempts,
                spec.copies,
                spec.nanos,
                *src_window,
                *dst_window,
                *band,
                PixelType::Byte,
                &mut data,
            )
        }
    }
}

/// Run `threads * iterations` calls against `token` through a worker pool
/// and aggregate the engine's signed returns.
pub fn run<C: RasterCodec>(pool: Arc<WarpPool<C>>, token: Token, spec: StressSpec) -> StressReport {
    let (req_tx, req_rx): (Sender<usize>, Receiver<usize>) = flume::unbounded();
    let (res_tx, res_rx) = flume::unbounded();

    let mut workers: Vec<JoinHandle<()>> = Vec::new();
    for _ in 0..spec.threads {
        let req_rx = req_rx.clone();
        let res_tx = res_tx.clone();
        let pool = Arc::clone(&pool);
        let spec = spec.clone();
        workers.push(thread::spawn(move || {
            for _ in req_rx {
                let code = execute(pool.as_ref(), token, &spec);
                if res_tx.send(code).is_err() {
                    break;
                }
            }
        }));
    }
    drop(req_rx);
    drop(res_tx);

    let start = Instant::now();
    for index in 0..spec.threads * spec.iterations {
        if req_tx.send(index).is_err() {
            break;
        }
    }
    drop(req_tx);

    let mut report = StressReport::default();
    for code in res_rx {
        report.record(code);
    }
    report.elapsed = start.elapsed();

    let mut errors = Vec::new();
    for worker in workers {
        if let Err(e) = worker.join() {
            errors.push(e);
        }
    }
    if let Some(error) = errors.pop() {
        panic::resume_unwind(error);
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::mem::{MemCodec, MemRaster};
    use crate::config::PoolConfig;

    #[test]
    fn stress_aggregates_results() {
        let codec = MemCodec::new().with_raster("geo.tif", MemRaster::test_pattern(32, 32));
        let pool = Arc::new(WarpPool::new(PoolConfig::new(4), codec).unwrap());
        let token = pool.get_token("geo.tif", &[]);
        // Warm the copies so cold-start soft gets cannot come up empty.
        assert!(pool.noop(token, DatasetKind::Warped, 1, 2, 0) > 0);
        let spec = StressSpec {
            threads: 4,
            iterations: 25,
            attempts: 0,
            copies: -2,
            nanos: 0,
            dataset: DatasetKind::Warped,
            op: StressOp::WidthHeight,
        };
        let report = run(Arc::clone(&pool), token, spec);
        assert_eq!(report.operations, 100);
        assert_eq!(report.failures, 0);
        assert!(report.touched_total >= 100);
        assert!(pool.pool().size() <= 4);
    }
}
