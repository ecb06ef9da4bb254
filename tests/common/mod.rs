// tests/common/mod.rs
#![allow(dead_code)]

use warp_pool::{MemCodec, MemRaster};

/// Warp options used by most scenarios: resample bilinear into web
/// mercator with a nodata override on the warped product.
pub const WARP_OPTIONS: [&str; 6] = [
    "-r",
    "bilinear",
    "-t_srs",
    "epsg:3857",
    "-dstnodata",
    "107",
];

pub fn opts(options: &[&str]) -> Vec<String> {
    options.iter().map(|s| s.to_string()).collect()
}

/// A codec with the standard 512x512 test-pattern fixture plus a couple of
/// secondary rasters for multi-key tests.
pub fn fixture_codec() -> MemCodec {
    MemCodec::new()
        .with_raster("fixture.tif", MemRaster::test_pattern(512, 512))
        .with_raster("second.tif", MemRaster::test_pattern(256, 256))
        .with_raster("third.tif", MemRaster::test_pattern(128, 128))
}
