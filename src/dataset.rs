// src/dataset.rs
//! Handle wrapper: one `(source, warped)` pair for one key.
//!
//! Every data operation makes a single non-blocking attempt on the dataset
//! mutex; a held mutex answers [`AttemptOutcome::Locked`] so the dispatch
//! engine can move on to another copy. The use counter tracks handles
//! outstanding to callers and is managed by the pool (`inc` on hand-out)
//! and the engine (`dec` after the attempt), never by the operations.

use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::channel::ErrorChannel;
use crate::codec::{RasterCodec, RasterDataset};
use crate::errors::codes;
use crate::types::{DatasetKind, Key, PixelType};

/// Outcome of a single attempt against one handle wrapper.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The call ran to completion and the output was written.
    Success,
    /// The wrapper's mutex was held; try another copy.
    Locked,
    /// The codec failed with this (positive) error code.
    Failed(i32),
}

// Field order matters: the warped product borrows from the source in the
// native library, so it must be dropped (closed) first.
struct DatasetPair<D> {
    warped: D,
    source: D,
}

pub struct LockedDataset<C: RasterCodec> {
    key: Key,
    pair: Mutex<DatasetPair<C::Dataset>>,
    in_use: AtomicU32,
}

impl<C: RasterCodec> LockedDataset<C> {
    /// Open both halves for `key`. The user option vector is extended with
    /// the forced virtual-output suffix before warping. Any failure yields
    /// `None` with the cause already deposited in the error channel; a
    /// wrapper is never partially valid.
    pub fn open(codec: &C, key: Key) -> Option<Self> {
        let source = codec.open(&key.uri)?;
        let mut options = key.options.clone();
        options.push("-of".to_string());
        options.push("VRT".to_string());
        let warped = codec.warp(&source, &options)?;
        Some(Self {
            key,
            pair: Mutex::new(DatasetPair { warped, source }),
            in_use: AtomicU32::new(0),
        })
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Count of handles outstanding to callers.
    pub fn in_use(&self) -> u32 {
        self.in_use.load(Ordering::Acquire)
    }

    pub fn inc(&self) {
        self.in_use.fetch_add(1, Ordering::AcqRel);
    }

    pub fn dec(&self) {
        self.in_use.fetch_sub(1, Ordering::AcqRel);
    }

    /// True when no handles are outstanding and no operation holds the
    /// dataset mutex. Only meaningful under the pool's writer lock, which
    /// excludes new hand-outs while the check and any overwrite happen.
    pub(crate) fn is_idle(&self) -> bool {
        self.in_use() == 0 && !self.pair.is_locked()
    }

    /// Single non-blocking attempt: run `op` on the selected dataset under
    /// the mutex. `op` answers `true` on codec success; on `false` the
    /// per-thread error channel supplies the code. An entry deposited
    /// before this call began is not charged to it.
    fn attempt(
        &self,
        which: DatasetKind,
        op: impl FnOnce(&C::Dataset) -> bool,
    ) -> AttemptOutcome {
        let Some(guard) = self.pair.try_lock() else {
            return AttemptOutcome::Locked;
        };
        let dataset = match which {
            DatasetKind::Source => &guard.source,
            DatasetKind::Warped => &guard.warped,
        };
        let before = ErrorChannel::global().last_timestamp();
        if op(dataset) {
            AttemptOutcome::Success
        } else if ErrorChannel::global().last_timestamp() > before {
            match ErrorChannel::global().take_last() {
                codes::NONE => AttemptOutcome::Failed(codes::OBJECT_NULL),
                code => AttemptOutcome::Failed(code),
            }
        } else {
            AttemptOutcome::Failed(codes::OBJECT_NULL)
        }
    }

    /// Like [`attempt`], for operations whose empty result is legitimate:
    /// a null answer only counts as a failure when the codec deposited a
    /// new error during this call.
    fn attempt_nullable(
        &self,
        which: DatasetKind,
        op: impl FnOnce(&C::Dataset) -> bool,
    ) -> AttemptOutcome {
        let Some(guard) = self.pair.try_lock() else {
            return AttemptOutcome::Locked;
        };
        let dataset = match which {
            DatasetKind::Source => &guard.source,
            DatasetKind::Warped => &guard.warped,
        };
        let before = ErrorChannel::global().last_timestamp();
        if op(dataset) || ErrorChannel::global().last_timestamp() <= before {
            AttemptOutcome::Success
        } else {
            match ErrorChannel::global().take_last() {
                codes::NONE => AttemptOutcome::Failed(codes::OBJECT_NULL),
                code => AttemptOutcome::Failed(code),
            }
        }
    }

    /// Lock and immediately release; used to measure contention.
    pub fn noop(&self) -> AttemptOutcome {
        self.attempt(DatasetKind::Source, |_| true)
    }

    pub fn get_width_height(
        &self,
        which: DatasetKind,
        width: &mut i32,
        height: &mut i32,
    ) -> AttemptOutcome {
        self.attempt(which, |ds| match ds.width_height() {
            Some((w, h)) => {
                *width = w;
                *height = h;
                true
            }
            None => false,
        })
    }

    pub fn get_transform(&self, which: DatasetKind, transform: &mut [f64; 6]) -> AttemptOutcome {
        self.attempt(which, |ds| match ds.geo_transform() {
            Some(t) => {
                *transform = t;
                true
            }
            None => false,
        })
    }

    pub fn get_band_count(&self, which: DatasetKind, count: &mut i32) -> AttemptOutcome {
        self.attempt(which, |ds| match ds.band_count() {
            Some(n) => {
                *count = n;
                true
            }
            None => false,
        })
    }

    pub fn get_band_data_type(
        &self,
        which: DatasetKind,
        band: i32,
        data_type: &mut i32,
    ) -> AttemptOutcome {
        self.attempt(which, |ds| match ds.band_data_type(band) {
            Some(ty) => {
                *data_type = ty.code();
                true
            }
            None => false,
        })
    }

    pub fn get_band_nodata(
        &self,
        which: DatasetKind,
        band: i32,
        nodata: &mut f64,
        success: &mut i32,
    ) -> AttemptOutcome {
        self.attempt(which, |ds| match ds.band_nodata(band) {
            Some((value, has)) => {
                *nodata = value;
                *success = has as i32;
                true
            }
            None => false,
        })
    }

    pub fn get_band_max_min(
        &self,
        which: DatasetKind,
        band: i32,
        approx_ok: bool,
        minmax: &mut [f64; 2],
        success: &mut i32,
    ) -> AttemptOutcome {
        self.attempt(which, |ds| match ds.band_min_max(band, approx_ok) {
            Some((values, exact)) => {
                *minmax = values;
                *success = exact as i32;
                true
            }
            None => false,
        })
    }

    pub fn get_offset(
        &self,
        which: DatasetKind,
        band: i32,
        offset: &mut f64,
        success: &mut i32,
    ) -> AttemptOutcome {
        self.attempt(which, |ds| match ds.offset(band) {
            Some((value, has)) => {
                *offset = value;
                *success = has as i32;
                true
            }
            None => false,
        })
    }

    pub fn get_scale(
        &self,
        which: DatasetKind,
        band: i32,
        scale: &mut f64,
        success: &mut i32,
    ) -> AttemptOutcome {
        self.attempt(which, |ds| match ds.scale(band) {
            Some((value, has)) => {
                *scale = value;
                *success = has as i32;
                true
            }
            None => false,
        })
    }

    pub fn get_color_interpretation(
        &self,
        which: DatasetKind,
        band: i32,
        color_interp: &mut i32,
    ) -> AttemptOutcome {
        self.attempt(which, |ds| match ds.color_interpretation(band) {
            Some(code) => {
                *color_interp = code;
                true
            }
            None => false,
        })
    }

    pub fn get_block_size(
        &self,
        which: DatasetKind,
        band: i32,
        width: &mut i32,
        height: &mut i32,
    ) -> AttemptOutcome {
        self.attempt(which, |ds| match ds.block_size(band) {
            Some((w, h)) => {
                *width = w;
                *height = h;
                true
            }
            None => false,
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn get_histogram(
        &self,
        which: DatasetKind,
        band: i32,
        lower: f64,
        upper: f64,
        counts: &mut [u64],
        include_out_of_range: bool,
        approx_ok: bool,
    ) -> AttemptOutcome {
        self.attempt(which, |ds| {
            ds.histogram(band, lower, upper, counts, include_out_of_range, approx_ok)
        })
    }

    pub fn get_overview_widths_heights(
        &self,
        which: DatasetKind,
        band: i32,
        overviews: &mut Vec<(i32, i32)>,
        max_len: usize,
    ) -> AttemptOutcome {
        self.attempt_nullable(which, |ds| match ds.overviews(band, max_len) {
            Some(sizes) => {
                *overviews = sizes;
                true
            }
            None => {
                overviews.clear();
                false
            }
        })
    }

    pub fn get_crs_proj4(&self, which: DatasetKind, crs: &mut String) -> AttemptOutcome {
        self.attempt(which, |ds| match ds.crs_proj4() {
            Some(value) => {
                *crs = value;
                true
            }
            None => false,
        })
    }

    pub fn get_crs_wkt(&self, which: DatasetKind, crs: &mut String) -> AttemptOutcome {
        self.attempt(which, |ds| match ds.crs_wkt() {
            Some(value) => {
                *crs = value;
                true
            }
            None => false,
        })
    }

    pub fn get_metadata_domain_list(
        &self,
        which: DatasetKind,
        band: i32,
        domains: &mut Vec<String>,
    ) -> AttemptOutcome {
        self.attempt_nullable(which, |ds| match ds.metadata_domain_list(band) {
            Some(list) => {
                *domains = list;
                true
            }
            None => {
                domains.clear();
                false
            }
        })
    }

    pub fn get_metadata(
        &self,
        which: DatasetKind,
        band: i32,
        domain: &str,
        list: &mut Vec<String>,
    ) -> AttemptOutcome {
        self.attempt_nullable(which, |ds| match ds.metadata(band, domain) {
            Some(entries) => {
                *list = entries;
                true
            }
            None => {
                list.clear();
                false
            }
        })
    }

    pub fn get_metadata_item(
        &self,
        which: DatasetKind,
        band: i32,
        key: &str,
        domain: &str,
        value: &mut String,
    ) -> AttemptOutcome {
        self.attempt_nullable(which, |ds| match ds.metadata_item(band, key, domain) {
            Some(item) => {
                *value = item;
                true
            }
            None => {
                value.clear();
                false
            }
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn get_pixels(
        &self,
        which: DatasetKind,
        src_window: [i32; 4],
        dst_window: [i32; 2],
        band: i32,
        pixel_type: PixelType,
        data: &mut [u8],
    ) -> AttemptOutcome {
        self.attempt(which, |ds| {
            ds.read_pixels(src_window, dst_window, band, pixel_type, data)
        })
    }
}
