// src/codec/mem.rs
//! Synthetic in-memory raster backend.
//!
//! Rasters are registered per URI and opened by cloning. Warping clones the
//! source and applies the recognized subset of warp options. Deterministic
//! by construction, which is what the tests and benches lean on.

use std::collections::{BTreeMap, HashMap};

use crate::channel::ErrorChannel;
use crate::codec::{RasterCodec, RasterDataset};
use crate::errors::{codes, Severity};
use crate::types::PixelType;

/// Gray color interpretation code, matching the codec's numbering.
const COLOR_GRAY_INDEX: i32 = 1;

#[derive(Clone, Debug)]
pub struct MemBand {
    data: Vec<f64>,
    nodata: Option<f64>,
    offset: Option<f64>,
    scale: Option<f64>,
    color_interp: i32,
    data_type: PixelType,
}

/// One registered raster. Doubles as the opened-dataset type: opening is a
/// clone, warping is a clone plus option application.
#[derive(Clone, Debug)]
pub struct MemRaster {
    width: i32,
    height: i32,
    bands: Vec<MemBand>,
    transform: [f64; 6],
    proj4: String,
    wkt: String,
    metadata: BTreeMap<String, Vec<(String, String)>>,
    block_size: (i32, i32),
    overviews: Vec<(i32, i32)>,
}

impl MemRaster {
    /// The standard test pattern: a single byte band where
    /// `value(x, y) = (x % 4 != 0) as u8`, so windowed reads have contents
    /// that can be computed by hand.
    pub fn test_pattern(width: i32, height: i32) -> Self {
        let mut data = Vec::with_capacity((width * height) as usize);
        for _y in 0..height {
            for x in 0..width {
                data.push(if x % 4 != 0 { 1.0 } else { 0.0 });
            }
        }
        let band = MemBand {
            data,
            nodata: None,
            offset: None,
            scale: None,
            color_interp: COLOR_GRAY_INDEX,
            data_type: PixelType::Byte,
        };
        let mut metadata = BTreeMap::new();
        metadata.insert(
            String::new(),
            vec![("AREA_OR_POINT".to_string(), "Area".to_string())],
        );
        metadata.insert(
            "IMAGE_STRUCTURE".to_string(),
            vec![("INTERLEAVE".to_string(), "BAND".to_string())],
        );
        Self {
            width,
            height,
            bands: vec![band],
            transform: [358_485.0, 25.0, 0.0, 4_265_115.0, 0.0, -25.0],
            proj4: "+proj=utm +zone=17 +datum=WGS84 +units=m +no_defs".to_string(),
            wkt: "PROJCS[\"WGS 84 / UTM zone 17N\",GEOGCS[\"WGS 84\"]]".to_string(),
            metadata,
            block_size: (width, 1),
            overviews: vec![(width / 2, height / 2), (width / 4, height / 4)],
        }
    }

    fn band(&self, band: i32) -> Option<&MemBand> {
        if band < 1 || band as usize > self.bands.len() {
            ErrorChannel::global().report(
                Severity::Failure,
                codes::ILLEGAL_ARG,
                &format!("Illegal band #{} requested", band),
            );
            return None;
        }
        self.bands.get(band as usize - 1)
    }

    fn sample(&self, band: &MemBand, x: i32, y: i32) -> f64 {
        band.data[(y * self.width + x) as usize]
    }

    /// Apply the recognized warp options to a clone of `self`.
    fn warped(&self, options: &[String]) -> Option<MemRaster> {
        let mut out = self.clone();
        let mut resample = None;
        let mut iter = options.iter();
        while let Some(opt) = iter.next() {
            match opt.as_str() {
                "-dstnodata" | "-srcnodata" => {
                    let value = take_value(&mut iter, opt)?.parse::<f64>().ok();
                    let Some(value) = value else {
                        return fail_option(opt);
                    };
                    if opt == "-dstnodata" {
                        for band in &mut out.bands {
                            band.nodata = Some(value);
                        }
                    }
                }
                "-t_srs" => {
                    let srs = take_value(&mut iter, opt)?;
                    out.proj4 = format!("+init={} +no_defs", srs.to_lowercase());
                    out.wkt = format!("PROJCS[\"{}\"]", srs);
                }
                "-r" => {
                    resample = Some(take_value(&mut iter, opt)?.to_string());
                }
                "-of" => {
                    // The wrapper forces the virtual output driver; accept it.
                    let _ = take_value(&mut iter, opt)?;
                }
                "-tr" => {
                    let _ = take_value(&mut iter, opt)?;
                    let _ = take_value(&mut iter, opt)?;
                }
                "-tap" | "-overwrite" | "-q" => {}
                other => {
                    return fail_option(other);
                }
            }
        }
        if let Some(resample) = resample {
            out.metadata
                .entry(String::new())
                .or_default()
                .push(("RESAMPLING".to_string(), resample));
        }
        Some(out)
    }
}

fn take_value<'a>(iter: &mut std::slice::Iter<'a, String>, opt: &str) -> Option<&'a String> {
    match iter.next() {
        Some(v) => Some(v),
        None => fail_option(opt),
    }
}

fn fail_option<T>(opt: &str) -> Option<T> {
    ErrorChannel::global().report(
        Severity::Failure,
        codes::ILLEGAL_ARG,
        &format!("Unknown or incomplete warp option '{}'", opt),
    );
    None
}

impl RasterDataset for MemRaster {
    fn width_height(&self) -> Option<(i32, i32)> {
        Some((self.width, self.height))
    }

    fn geo_transform(&self) -> Option<[f64; 6]> {
        Some(self.transform)
    }

    fn band_count(&self) -> Option<i32> {
        Some(self.bands.len() as i32)
    }

    fn band_data_type(&self, band: i32) -> Option<PixelType> {
        self.band(band).map(|b| b.data_type)
    }

    fn band_nodata(&self, band: i32) -> Option<(f64, bool)> {
        self.band(band)
            .map(|b| (b.nodata.unwrap_or(0.0), b.nodata.is_some()))
    }

    fn band_min_max(&self, band: i32, _approx_ok: bool) -> Option<([f64; 2], bool)> {
        let band = self.band(band)?;
        if band.data.is_empty() {
            return Some(([0.0, 0.0], false));
        }
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &v in &band.data {
            min = min.min(v);
            max = max.max(v);
        }
        Some(([min, max], true))
    }

    fn offset(&self, band: i32) -> Option<(f64, bool)> {
        self.band(band)
            .map(|b| (b.offset.unwrap_or(0.0), b.offset.is_some()))
    }

    fn scale(&self, band: i32) -> Option<(f64, bool)> {
        self.band(band)
            .map(|b| (b.scale.unwrap_or(1.0), b.scale.is_some()))
    }

    fn color_interpretation(&self, band: i32) -> Option<i32> {
        self.band(band).map(|b| b.color_interp)
    }

    fn block_size(&self, band: i32) -> Option<(i32, i32)> {
        self.band(band).map(|_| self.block_size)
    }

    fn histogram(
        &self,
        band: i32,
        lower: f64,
        upper: f64,
        counts: &mut [u64],
        include_out_of_range: bool,
        _approx_ok: bool,
    ) -> bool {
        let Some(band) = self.band(band) else {
            return false;
        };
        if counts.is_empty() || upper <= lower {
            ErrorChannel::global().report(
                Severity::Failure,
                codes::ILLEGAL_ARG,
                "Invalid histogram bounds or bucket count",
            );
            return false;
        }
        counts.fill(0);
        let buckets = counts.len() as f64;
        for &v in &band.data {
            let position = (v - lower) / (upper - lower) * buckets;
            let index = if position < 0.0 || position >= buckets {
                if !include_out_of_range {
                    continue;
                }
                position.clamp(0.0, buckets - 1.0) as usize
            } else {
                position as usize
            };
            counts[index] += 1;
        }
        true
    }

    fn overviews(&self, band: i32, max_len: usize) -> Option<Vec<(i32, i32)>> {
        self.band(band)?;
        if self.overviews.is_empty() {
            return None;
        }
        Some(self.overviews.iter().take(max_len).copied().collect())
    }

    fn crs_proj4(&self) -> Option<String> {
        Some(self.proj4.clone())
    }

    fn crs_wkt(&self) -> Option<String> {
        Some(self.wkt.clone())
    }

    fn metadata_domain_list(&self, band: i32) -> Option<Vec<String>> {
        if band == 0 {
            return Some(self.metadata.keys().cloned().collect());
        }
        self.band(band)?;
        // Bands of synthetic rasters carry no metadata of their own.
        None
    }

    fn metadata(&self, band: i32, domain: &str) -> Option<Vec<String>> {
        if band != 0 {
            self.band(band)?;
            return None;
        }
        let entries = self.metadata.get(domain)?;
        Some(
            entries
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect(),
        )
    }

    fn metadata_item(&self, band: i32, key: &str, domain: &str) -> Option<String> {
        if band != 0 {
            self.band(band)?;
            return None;
        }
        self.metadata
            .get(domain)?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    fn read_pixels(
        &self,
        src_window: [i32; 4],
        dst_window: [i32; 2],
        band: i32,
        pixel_type: PixelType,
        out: &mut [u8],
    ) -> bool {
        let Some(band) = self.band(band) else {
            return false;
        };
        let [src_x, src_y, src_w, src_h] = src_window;
        let [dst_w, dst_h] = dst_window;
        if src_w <= 0 || src_h <= 0 || dst_w <= 0 || dst_h <= 0 || pixel_type.size() == 0 {
            ErrorChannel::global().report(
                Severity::Failure,
                codes::ILLEGAL_ARG,
                "Illegal pixel read request",
            );
            return false;
        }
        if src_x < 0
            || src_y < 0
            || src_x.checked_add(src_w).map_or(true, |e| e > self.width)
            || src_y.checked_add(src_h).map_or(true, |e| e > self.height)
        {
            ErrorChannel::global().report(
                Severity::Failure,
                codes::OBJECT_NULL,
                "Access window out of range in RasterIO()",
            );
            return false;
        }
        let needed = dst_w as usize * dst_h as usize * pixel_type.size();
        if out.len() < needed {
            ErrorChannel::global().report(
                Severity::Failure,
                codes::APP_DEFINED,
                "Null or undersized destination buffer",
            );
            return false;
        }

        // Nearest-neighbor resample of the source window into the
        // destination shape, matching the codec's default.
        let size = pixel_type.size();
        for dy in 0..dst_h {
            let sy = src_y + ((dy as f64 + 0.5) * src_h as f64 / dst_h as f64) as i32;
            for dx in 0..dst_w {
                let sx = src_x + ((dx as f64 + 0.5) * src_w as f64 / dst_w as f64) as i32;
                let value = self.sample(band, sx.min(src_x + src_w - 1), sy.min(src_y + src_h - 1));
                let at = (dy as usize * dst_w as usize + dx as usize) * size;
                write_sample(value, pixel_type, &mut out[at..at + size]);
            }
        }
        true
    }
}

fn write_sample(value: f64, pixel_type: PixelType, out: &mut [u8]) {
    match pixel_type {
        PixelType::Unknown => {}
        PixelType::Byte => out[0] = value.round().clamp(0.0, u8::MAX as f64) as u8,
        PixelType::UInt16 => out.copy_from_slice(
            &(value.round().clamp(0.0, u16::MAX as f64) as u16).to_ne_bytes(),
        ),
        PixelType::Int16 => out.copy_from_slice(
            &(value.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16).to_ne_bytes(),
        ),
        PixelType::UInt32 => out.copy_from_slice(
            &(value.round().clamp(0.0, u32::MAX as f64) as u32).to_ne_bytes(),
        ),
        PixelType::Int32 => out.copy_from_slice(
            &(value.round().clamp(i32::MIN as f64, i32::MAX as f64) as i32).to_ne_bytes(),
        ),
        PixelType::Float32 => out.copy_from_slice(&(value as f32).to_ne_bytes()),
        PixelType::Float64 => out.copy_from_slice(&value.to_ne_bytes()),
        PixelType::CInt16 => {
            let real = value.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16;
            out[..2].copy_from_slice(&real.to_ne_bytes());
            out[2..].copy_from_slice(&0i16.to_ne_bytes());
        }
        PixelType::CInt32 => {
            let real = value.round().clamp(i32::MIN as f64, i32::MAX as f64) as i32;
            out[..4].copy_from_slice(&real.to_ne_bytes());
            out[4..].copy_from_slice(&0i32.to_ne_bytes());
        }
        PixelType::CFloat32 => {
            out[..4].copy_from_slice(&(value as f32).to_ne_bytes());
            out[4..].copy_from_slice(&0f32.to_ne_bytes());
        }
        PixelType::CFloat64 => {
            out[..8].copy_from_slice(&value.to_ne_bytes());
            out[8..].copy_from_slice(&0f64.to_ne_bytes());
        }
    }
}

/// Codec over a fixed registry of synthetic rasters.
pub struct MemCodec {
    rasters: HashMap<String, MemRaster, ahash::RandomState>,
}

impl MemCodec {
    pub fn new() -> Self {
        Self {
            rasters: HashMap::default(),
        }
    }

    pub fn with_raster(mut self, uri: &str, raster: MemRaster) -> Self {
        self.rasters.insert(uri.to_string(), raster);
        self
    }
}

impl Default for MemCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl RasterCodec for MemCodec {
    type Dataset = MemRaster;

    fn open(&self, uri: &str) -> Option<MemRaster> {
        match self.rasters.get(uri) {
            Some(raster) => Some(raster.clone()),
            None => {
                ErrorChannel::global().report(
                    Severity::Failure,
                    codes::OPEN_FAILED,
                    &format!("{}: No such file or directory", uri),
                );
                None
            }
        }
    }

    fn warp(&self, source: &MemRaster, options: &[String]) -> Option<MemRaster> {
        source.warped(options)
    }
}
