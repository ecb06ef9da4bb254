// src/codec/gdal.rs
//! GDAL backend, enabled by the `gdal` cargo feature.
//!
//! Opens sources through the safe `gdal` crate and produces the warped
//! virtual product through the warp application API, which the safe crate
//! does not wrap. GDAL's own error callback is routed into the error
//! channel at init, so failures surface exactly like the synthetic
//! backend's.

use std::ffi::CString;
use std::os::raw::{c_char, c_int};
use std::ptr;

use gdal::errors::CplErrType;
use gdal::{Dataset, DriverManager, Metadata};

use crate::channel::ErrorChannel;
use crate::codec::{RasterCodec, RasterDataset};
use crate::errors::Severity;
use crate::types::PixelType;

pub struct GdalCodec;

impl GdalCodec {
    pub fn new() -> Self {
        GdalCodec
    }
}

impl Default for GdalCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn severity(err_type: CplErrType) -> Severity {
    match err_type {
        CplErrType::None => Severity::None,
        CplErrType::Debug => Severity::Debug,
        CplErrType::Warning => Severity::Warning,
        CplErrType::Failure => Severity::Failure,
        CplErrType::Fatal => Severity::Fatal,
    }
}

impl RasterCodec for GdalCodec {
    type Dataset = GdalDataset;

    fn init(&self) {
        DriverManager::register_all();
        gdal::config::set_error_handler(|err_type, err_no, message| {
            ErrorChannel::global().report(severity(err_type), err_no, message.as_ref());
        });
    }

    fn open(&self, uri: &str) -> Option<GdalDataset> {
        // GDAL reports the cause through the error handler on failure.
        Dataset::open(uri).ok().map(|inner| GdalDataset { inner })
    }

    fn warp(&self, source: &GdalDataset, options: &[String]) -> Option<GdalDataset> {
        let storage: Vec<CString> = options
            .iter()
            .map(|opt| CString::new(opt.as_str()))
            .collect::<Result<_, _>>()
            .ok()?;
        let mut argv: Vec<*mut c_char> = storage
            .iter()
            .map(|opt| opt.as_ptr() as *mut c_char)
            .collect();
        argv.push(ptr::null_mut());

        unsafe {
            let app_options = gdal_sys::GDALWarpAppOptionsNew(argv.as_mut_ptr(), ptr::null_mut());
            if app_options.is_null() {
                return None;
            }
            // The destination name is unused for the virtual output driver.
            let dest = CString::default();
            let mut sources = [source.inner.c_dataset()];
            let mut usage_error: c_int = 0;
            let warped = gdal_sys::GDALWarp(
                dest.as_ptr(),
                ptr::null_mut(),
                1,
                sources.as_mut_ptr(),
                app_options,
                &mut usage_error,
            );
            gdal_sys::GDALWarpAppOptionsFree(app_options);
            if warped.is_null() {
                return None;
            }
            Some(GdalDataset {
                inner: Dataset::from_c_dataset(warped),
            })
        }
    }
}

pub struct GdalDataset {
    inner: Dataset,
}

impl GdalDataset {
    fn band_handle(&self, band: i32) -> Option<gdal_sys::GDALRasterBandH> {
        let handle = unsafe { gdal_sys::GDALGetRasterBand(self.inner.c_dataset(), band) };
        if handle.is_null() {
            None
        } else {
            Some(handle)
        }
    }
}

impl RasterDataset for GdalDataset {
    fn width_height(&self) -> Option<(i32, i32)> {
        let (width, height) = self.inner.raster_size();
        Some((width as i32, height as i32))
    }

    fn geo_transform(&self) -> Option<[f64; 6]> {
        self.inner.geo_transform().ok()
    }

    fn band_count(&self) -> Option<i32> {
        Some(self.inner.raster_count() as i32)
    }

    fn band_data_type(&self, band: i32) -> Option<PixelType> {
        let handle = self.band_handle(band)?;
        let code = unsafe { gdal_sys::GDALGetRasterDataType(handle) };
        PixelType::from_code(code as i32)
    }

    fn band_nodata(&self, band: i32) -> Option<(f64, bool)> {
        let band = self.inner.rasterband(band as usize).ok()?;
        let nodata = band.no_data_value();
        Some((nodata.unwrap_or(0.0), nodata.is_some()))
    }

    fn band_min_max(&self, band: i32, approx_ok: bool) -> Option<([f64; 2], bool)> {
        let band = self.inner.rasterband(band as usize).ok()?;
        let minmax = band.compute_raster_min_max(approx_ok).ok()?;
        Some(([minmax.min, minmax.max], true))
    }

    fn offset(&self, band: i32) -> Option<(f64, bool)> {
        let band = self.inner.rasterband(band as usize).ok()?;
        let offset = band.offset();
        Some((offset.unwrap_or(0.0), offset.is_some()))
    }

    fn scale(&self, band: i32) -> Option<(f64, bool)> {
        let band = self.inner.rasterband(band as usize).ok()?;
        let scale = band.scale();
        Some((scale.unwrap_or(1.0), scale.is_some()))
    }

    fn color_interpretation(&self, band: i32) -> Option<i32> {
        let handle = self.band_handle(band)?;
        Some(unsafe { gdal_sys::GDALGetRasterColorInterpretation(handle) } as i32)
    }

    fn block_size(&self, band: i32) -> Option<(i32, i32)> {
        let band = self.inner.rasterband(band as usize).ok()?;
        let (width, height) = band.block_size();
        Some((width as i32, height as i32))
    }

    fn histogram(
        &self,
        band: i32,
        lower: f64,
        upper: f64,
        counts: &mut [u64],
        include_out_of_range: bool,
        approx_ok: bool,
    ) -> bool {
        let Some(handle) = self.band_handle(band) else {
            return false;
        };
        let err = unsafe {
            gdal_sys::GDALGetRasterHistogramEx(
                handle,
                lower,
                upper,
                counts.len() as c_int,
                counts.as_mut_ptr(),
                include_out_of_range as c_int,
                approx_ok as c_int,
                None,
                ptr::null_mut(),
            )
        };
        err == gdal_sys::CPLErr::CE_None
    }

    fn overviews(&self, band: i32, max_len: usize) -> Option<Vec<(i32, i32)>> {
        let handle = self.band_handle(band)?;
        let count = unsafe { gdal_sys::GDALGetOverviewCount(handle) };
        if count <= 0 {
            return None;
        }
        let mut sizes = Vec::new();
        for index in 0..count.min(max_len as c_int) {
            let overview = unsafe { gdal_sys::GDALGetOverview(handle, index) };
            if overview.is_null() {
                return None;
            }
            let width = unsafe { gdal_sys::GDALGetRasterBandXSize(overview) };
            let height = unsafe { gdal_sys::GDALGetRasterBandYSize(overview) };
            sizes.push((width, height));
        }
        Some(sizes)
    }

    fn crs_proj4(&self) -> Option<String> {
        self.inner.spatial_ref().ok()?.to_proj4().ok()
    }

    fn crs_wkt(&self) -> Option<String> {
        let wkt = self.inner.projection();
        if wkt.is_empty() {
            None
        } else {
            Some(wkt)
        }
    }

    fn metadata_domain_list(&self, band: i32) -> Option<Vec<String>> {
        if band == 0 {
            let domains = self.inner.metadata_domains();
            return if domains.is_empty() { None } else { Some(domains) };
        }
        let band = self.inner.rasterband(band as usize).ok()?;
        let domains = band.metadata_domains();
        if domains.is_empty() {
            None
        } else {
            Some(domains)
        }
    }

    fn metadata(&self, band: i32, domain: &str) -> Option<Vec<String>> {
        if band == 0 {
            return self.inner.metadata_domain(domain);
        }
        self.inner
            .rasterband(band as usize)
            .ok()?
            .metadata_domain(domain)
    }

    fn metadata_item(&self, band: i32, key: &str, domain: &str) -> Option<String> {
        if band == 0 {
            return self.inner.metadata_item(key, domain);
        }
        self.inner
            .rasterband(band as usize)
            .ok()?
            .metadata_item(key, domain)
    }

    fn read_pixels(
        &self,
        src_window: [i32; 4],
        dst_window: [i32; 2],
        band: i32,
        pixel_type: PixelType,
        out: &mut [u8],
    ) -> bool {
        let Some(handle) = self.band_handle(band) else {
            return false;
        };
        let needed = dst_window[0] as usize * dst_window[1] as usize * pixel_type.size();
        if pixel_type.size() == 0 || out.len() < needed {
            ErrorChannel::global().report(
                Severity::Failure,
                crate::errors::codes::APP_DEFINED,
                "Null or undersized destination buffer",
            );
            return false;
        }
        let err = unsafe {
            gdal_sys::GDALRasterIO(
                handle,
                gdal_sys::GDALRWFlag::GF_Read,
                src_window[0],
                src_window[1],
                src_window[2],
                src_window[3],
                out.as_mut_ptr() as *mut std::ffi::c_void,
                dst_window[0],
                dst_window[1],
                pixel_type.code() as gdal_sys::GDALDataType::Type,
                0,
                0,
            )
        };
        err == gdal_sys::CPLErr::CE_None
    }
}
