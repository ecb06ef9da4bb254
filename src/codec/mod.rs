// src/codec/mod.rs
//! Capability seam over the underlying raster library.
//!
//! The pool never talks to a concrete raster backend directly; it opens and
//! queries datasets through these traits. Failures travel C-style: an
//! operation answers `false`/`None` after depositing a code in the
//! process-wide [`ErrorChannel`](crate::channel::ErrorChannel), which is how
//! the native library itself behaves.

use crate::types::PixelType;

pub mod mem;

#[cfg(feature = "gdal")]
pub mod gdal;

/// A raster backend capable of opening sources and producing warped,
/// in-memory virtual products from them.
pub trait RasterCodec: Send + Sync + 'static {
    /// An opened dataset. `Send` but deliberately not `Sync`: individual
    /// handles are not safe for concurrent use and are serialized by the
    /// owning handle wrapper.
    type Dataset: RasterDataset;

    /// One-time process setup (driver registration, error handler install).
    fn init(&self) {}

    /// Open `uri` read-only. `None` means the open failed and a code was
    /// deposited in the error channel.
    fn open(&self, uri: &str) -> Option<Self::Dataset>;

    /// Apply the warp option vector to `source`, producing an in-memory
    /// virtual dataset. The options already carry the forced `-of VRT`
    /// suffix appended by the handle wrapper.
    fn warp(&self, source: &Self::Dataset, options: &[String]) -> Option<Self::Dataset>;
}

/// Read capabilities of one opened dataset.
///
/// Operations that can legitimately produce an empty result (the metadata
/// family) answer `None` for both "nothing there" and "call failed"; the
/// caller disambiguates through the error channel timestamps. The remaining
/// operations treat `None`/`false` as failure.
pub trait RasterDataset: Send + 'static {
    fn width_height(&self) -> Option<(i32, i32)>;

    fn geo_transform(&self) -> Option<[f64; 6]>;

    fn band_count(&self) -> Option<i32>;

    fn band_data_type(&self, band: i32) -> Option<PixelType>;

    /// Nodata value and whether one is actually set (the value defaults to
    /// zero when unset, matching the codec).
    fn band_nodata(&self, band: i32) -> Option<(f64, bool)>;

    /// `[min, max]` plus a flag answering whether the values are exact.
    fn band_min_max(&self, band: i32, approx_ok: bool) -> Option<([f64; 2], bool)>;

    fn offset(&self, band: i32) -> Option<(f64, bool)>;

    fn scale(&self, band: i32) -> Option<(f64, bool)>;

    fn color_interpretation(&self, band: i32) -> Option<i32>;

    fn block_size(&self, band: i32) -> Option<(i32, i32)>;

    /// Fill `counts` with a histogram of the band over `[lower, upper]`.
    fn histogram(
        &self,
        band: i32,
        lower: f64,
        upper: f64,
        counts: &mut [u64],
        include_out_of_range: bool,
        approx_ok: bool,
    ) -> bool;

    /// `(width, height)` of each overview, nearest first, at most `max_len`.
    fn overviews(&self, band: i32, max_len: usize) -> Option<Vec<(i32, i32)>>;

    fn crs_proj4(&self) -> Option<String>;

    fn crs_wkt(&self) -> Option<String>;

    /// Metadata domains of the dataset (`band` 0) or of one band.
    fn metadata_domain_list(&self, band: i32) -> Option<Vec<String>>;

    /// All `KEY=VALUE` entries of one metadata domain.
    fn metadata(&self, band: i32, domain: &str) -> Option<Vec<String>>;

    fn metadata_item(&self, band: i32, key: &str, domain: &str) -> Option<String>;

    /// Read `src_window` (x, y, width, height) resampled to
    /// `dst_window` (width, height) into the caller's byte buffer.
    fn read_pixels(
        &self,
        src_window: [i32; 4],
        dst_window: [i32; 2],
        band: i32,
        pixel_type: PixelType,
        out: &mut [u8],
    ) -> bool;
}
