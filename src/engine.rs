// src/engine.rs
//! Dispatch engine: the public facade over the token registry and the
//! dataset pool.
//!
//! Every operation shares one driver: resolve the token, fetch copies from
//! the pool, try each copy once under its non-blocking mutex, and retry
//! rounds until one copy answers or the attempt/time budgets run out. The
//! return is a positive count of handles touched on success (callers tune
//! `copies` and `attempts` against it) or a negated error code on failure;
//! never zero on failure.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

use crate::codec::RasterCodec;
use crate::config::PoolConfig;
use crate::dataset::{AttemptOutcome, LockedDataset};
use crate::errors::{codes, PoolError};
use crate::pool::DatasetPool;
use crate::tokens::TokenRegistry;
use crate::types::{DatasetKind, Key, PixelType, Token};

pub struct WarpPool<C: RasterCodec> {
    tokens: TokenRegistry,
    pool: DatasetPool<C>,
    default_nanos: u64,
}

impl<C: RasterCodec> WarpPool<C> {
    /// Initialize the service: codec setup (driver registration, error
    /// handler install), the token registry, and the dataset pool.
    pub fn new(config: PoolConfig, codec: C) -> Result<Self, PoolError> {
        let capacity = NonZeroUsize::new(config.capacity).ok_or(PoolError::InvalidPoolCapacity)?;
        let token_capacity =
            NonZeroUsize::new(config.token_capacity).ok_or(PoolError::InvalidTokenCapacity)?;
        codec.init();
        tracing::info!(
            capacity = capacity.get(),
            token_capacity = token_capacity.get(),
            default_nanos = config.default_nanos,
            "warp pool initialized"
        );
        Ok(Self {
            tokens: TokenRegistry::new(token_capacity),
            pool: DatasetPool::new(Arc::new(codec), capacity.get()),
            default_nanos: config.default_nanos,
        })
    }

    /// Intern `(uri, options)` into a token. The options are opaque here;
    /// they are handed to the codec verbatim at open time.
    pub fn get_token(&self, uri: &str, options: &[String]) -> Token {
        self.tokens.get_token(uri, options)
    }

    /// Current key for `token`, or `None` once the token has been evicted.
    pub fn query_token(&self, token: Token) -> Option<Key> {
        self.tokens.query_token(token)
    }

    pub fn tokens(&self) -> &TokenRegistry {
        &self.tokens
    }

    pub fn pool(&self) -> &DatasetPool<C> {
        &self.pool
    }

    /// The attempt loop shared by every operation.
    ///
    /// `attempts <= 0` means unbounded. `nanos` of 0 falls back to the
    /// configured default budget (itself 0 for unbounded); the budget is
    /// checked between attempts, so a call already inside the codec runs
    /// to completion. Each handle fetched from the pool is decremented
    /// exactly once, and no pool lock is held across a codec call.
    fn dispatch(
        &self,
        token: Token,
        attempts: i32,
        copies: i32,
        nanos: u64,
        mut op: impl FnMut(&LockedDataset<C>) -> AttemptOutcome,
    ) -> i32 {
        let Some(key) = self.tokens.query_token(token) else {
            return -codes::OPEN_FAILED;
        };
        let budget = if nanos > 0 { nanos } else { self.default_nanos };
        let start = Instant::now();
        let mut touched: i32 = 0;
        let mut last = AttemptOutcome::Failed(codes::APP_DEFINED);
        let mut done = false;

        let mut round: i32 = 0;
        while attempts <= 0 || round < attempts {
            if budget > 0 && start.elapsed().as_nanos() > budget as u128 {
                tracing::debug!(
                    token,
                    round,
                    reserved = crate::errors::ATTEMPTS_EXCEEDED,
                    "time budget exhausted"
                );
                return -codes::FILE_IO;
            }
            let handles = self.pool.get(&key, copies);
            if handles.is_empty() {
                return -codes::OPEN_FAILED;
            }
            for handle in &handles {
                if !done {
                    touched = touched.saturating_add(1);
                    match op(handle) {
                        AttemptOutcome::Success => done = true,
                        outcome => last = outcome,
                    }
                }
                handle.dec();
            }
            round += 1;
            if done {
                break;
            }
            std::thread::yield_now();
        }

        if done {
            touched
        } else {
            match last {
                // Out of attempts while every try was contended.
                AttemptOutcome::Locked | AttemptOutcome::Success => -codes::FILE_IO,
                AttemptOutcome::Failed(code) => -code,
            }
        }
    }

    /// Lock-and-release probe; useful for measuring contention.
    pub fn noop(&self, token: Token, _dataset: DatasetKind, attempts: i32, copies: i32, nanos: u64) -> i32 {
        self.dispatch(token, attempts, copies, nanos, |ld| ld.noop())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn get_width_height(
        &self,
        token: Token,
        dataset: DatasetKind,
        attempts: i32,
        copies: i32,
        nanos: u64,
        width: &mut i32,
        height: &mut i32,
    ) -> i32 {
        self.dispatch(token, attempts, copies, nanos, |ld| {
            ld.get_width_height(dataset, width, height)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn get_transform(
        &self,
        token: Token,
        dataset: DatasetKind,
        attempts: i32,
        copies: i32,
        nanos: u64,
        transform: &mut [f64; 6],
    ) -> i32 {
        self.dispatch(token, attempts, copies, nanos, |ld| {
            ld.get_transform(dataset, transform)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn get_band_count(
        &self,
        token: Token,
        dataset: DatasetKind,
        attempts: i32,
        copies: i32,
        nanos: u64,
        count: &mut i32,
    ) -> i32 {
        self.dispatch(token, attempts, copies, nanos, |ld| {
            ld.get_band_count(dataset, count)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn get_band_data_type(
        &self,
        token: Token,
        dataset: DatasetKind,
        attempts: i32,
        copies: i32,
        nanos: u64,
        band: i32,
        data_type: &mut i32,
    ) -> i32 {
        self.dispatch(token, attempts, copies, nanos, |ld| {
            ld.get_band_data_type(dataset, band, data_type)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn get_band_nodata(
        &self,
        token: Token,
        dataset: DatasetKind,
        attempts: i32,
        copies: i32,
        nanos: u64,
        band: i32,
        nodata: &mut f64,
        success: &mut i32,
    ) -> i32 {
        self.dispatch(token, attempts, copies, nanos, |ld| {
            ld.get_band_nodata(dataset, band, nodata, success)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn get_band_max_min(
        &self,
        token: Token,
        dataset: DatasetKind,
        attempts: i32,
        copies: i32,
        nanos: u64,
        band: i32,
        approx_ok: bool,
        minmax: &mut [f64; 2],
        success: &mut i32,
    ) -> i32 {
        self.dispatch(token, attempts, copies, nanos, |ld| {
            ld.get_band_max_min(dataset, band, approx_ok, minmax, success)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn get_offset(
        &self,
        token: Token,
        dataset: DatasetKind,
        attempts: i32,
        copies: i32,
        nanos: u64,
        band: i32,
        offset: &mut f64,
        success: &mut i32,
    ) -> i32 {
        self.dispatch(token, attempts, copies, nanos, |ld| {
            ld.get_offset(dataset, band, offset, success)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn get_scale(
        &self,
        token: Token,
        dataset: DatasetKind,
        attempts: i32,
        copies: i32,
        nanos: u64,
        band: i32,
        scale: &mut f64,
        success: &mut i32,
    ) -> i32 {
        self.dispatch(token, attempts, copies, nanos, |ld| {
            ld.get_scale(dataset, band, scale, success)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn get_color_interpretation(
        &self,
        token: Token,
        dataset: DatasetKind,
        attempts: i32,
        copies: i32,
        nanos: u64,
        band: i32,
        color_interp: &mut i32,
    ) -> i32 {
        self.dispatch(token, attempts, copies, nanos, |ld| {
            ld.get_color_interpretation(dataset, band, color_interp)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn get_block_size(
        &self,
        token: Token,
        dataset: DatasetKind,
        attempts: i32,
        copies: i32,
        nanos: u64,
        band: i32,
        width: &mut i32,
        height: &mut i32,
    ) -> i32 {
        self.dispatch(token, attempts, copies, nanos, |ld| {
            ld.get_block_size(dataset, band, width, height)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn get_histogram(
        &self,
        token: Token,
        dataset: DatasetKind,
        attempts: i32,
        copies: i32,
        nanos: u64,
        band: i32,
        lower: f64,
        upper: f64,
        counts: &mut [u64],
        include_out_of_range: bool,
        approx_ok: bool,
    ) -> i32 {
        self.dispatch(token, attempts, copies, nanos, |ld| {
            ld.get_histogram(
                dataset,
                band,
                lower,
                upper,
                counts,
                include_out_of_range,
                approx_ok,
            )
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn get_overview_widths_heights(
        &self,
        token: Token,
        dataset: DatasetKind,
        attempts: i32,
        copies: i32,
        nanos: u64,
        band: i32,
        overviews: &mut Vec<(i32, i32)>,
        max_len: usize,
    ) -> i32 {
        self.dispatch(token, attempts, copies, nanos, |ld| {
            ld.get_overview_widths_heights(dataset, band, overviews, max_len)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn get_crs_proj4(
        &self,
        token: Token,
        dataset: DatasetKind,
        attempts: i32,
        copies: i32,
        nanos: u64,
        crs: &mut String,
    ) -> i32 {
        self.dispatch(token, attempts, copies, nanos, |ld| {
            ld.get_crs_proj4(dataset, crs)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn get_crs_wkt(
        &self,
        token: Token,
        dataset: DatasetKind,
        attempts: i32,
        copies: i32,
        nanos: u64,
        crs: &mut String,
    ) -> i32 {
        self.dispatch(token, attempts, copies, nanos, |ld| {
            ld.get_crs_wkt(dataset, crs)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn get_metadata_domain_list(
        &self,
        token: Token,
        dataset: DatasetKind,
        attempts: i32,
        copies: i32,
        nanos: u64,
        band: i32,
        domains: &mut Vec<String>,
    ) -> i32 {
        self.dispatch(token, attempts, copies, nanos, |ld| {
            ld.get_metadata_domain_list(dataset, band, domains)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn get_metadata(
        &self,
        token: Token,
        dataset: DatasetKind,
        attempts: i32,
        copies: i32,
        nanos: u64,
        band: i32,
        domain: &str,
        list: &mut Vec<String>,
    ) -> i32 {
        self.dispatch(token, attempts, copies, nanos, |ld| {
            ld.get_metadata(dataset, band, domain, list)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn get_metadata_item(
        &self,
        token: Token,
        dataset: DatasetKind,
        attempts: i32,
        copies: i32,
        nanos: u64,
        band: i32,
        key: &str,
        domain: &str,
        value: &mut String,
    ) -> i32 {
        self.dispatch(token, attempts, copies, nanos, |ld| {
            ld.get_metadata_item(dataset, band, key, domain, value)
        })
    }

    /// Read pixels. `src_window` is `(x, y, width, height)` in the selected
    /// dataset's pixel space; `dst_window` is the shape the read resamples
    /// into; `data` is the caller's output buffer.
    #[allow(clippy::too_many_arguments)]
    pub fn get_data(
        &self,
        token: Token,
        dataset: DatasetKind,
        attempts: i32,
        copies: i32,
        nanos: u64,
        src_window: [i32; 4],
        dst_window: [i32; 2],
        band: i32,
        pixel_type: PixelType,
        data: &mut [u8],
    ) -> i32 {
        self.dispatch(token, attempts, copies, nanos, |ld| {
            ld.get_pixels(dataset, src_window, dst_window, band, pixel_type, data)
        })
    }
}
