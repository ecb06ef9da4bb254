// src/main.rs
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use warp_pool::cli::{Cli, Commands};
use warp_pool::codec::RasterCodec;
use warp_pool::stress::{StressOp, StressSpec};
use warp_pool::{workload, DatasetKind, MemCodec, MemRaster, PixelType, PoolConfig, WarpPool};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    if cli.synthetic {
        let codec = synthetic_codec(&cli)?;
        return run(&cli, codec);
    }

    #[cfg(feature = "gdal")]
    return run(&cli, warp_pool::GdalCodec::new());
    #[cfg(not(feature = "gdal"))]
    anyhow::bail!("this build has no raster codec; rebuild with --features gdal or pass --synthetic");
}

/// Register a deterministic test-pattern raster for every URI the command
/// will touch.
fn synthetic_codec(cli: &Cli) -> Result<MemCodec> {
    let mut codec = MemCodec::new();
    match &cli.command {
        Commands::Info { uri, .. } | Commands::Stress { uri, .. } => {
            codec = codec.with_raster(uri, MemRaster::test_pattern(512, 512));
        }
        Commands::Workload { config } => {
            let config = workload::load(config)?;
            for target in &config.targets {
                codec = codec.with_raster(&target.uri, MemRaster::test_pattern(512, 512));
            }
        }
    }
    Ok(codec)
}

fn pool_config(cli: &Cli) -> PoolConfig {
    let mut config = PoolConfig::from_env();
    if let Some(capacity) = cli.pool_size {
        config.capacity = capacity;
    }
    config
}

fn run<C: RasterCodec>(cli: &Cli, codec: C) -> Result<()> {
    match &cli.command {
        Commands::Info { uri, warp_options } => {
            let pool = WarpPool::new(pool_config(cli), codec)?;
            info(&pool, uri, warp_options)
        }
        Commands::Stress {
            uri,
            warp_options,
            threads,
            iterations,
            copies,
            attempts,
            nanos,
            op,
        } => {
            let pool = Arc::new(WarpPool::new(pool_config(cli), codec)?);
            let token = pool.get_token(uri, warp_options);
            let warm = pool.noop(token, DatasetKind::Warped, 1, copies.abs().max(1), 0);
            if warm < 0 {
                anyhow::bail!("cannot open {} (code {})", uri, warm);
            }
            let op = match op.as_str() {
                "noop" => StressOp::Noop,
                "width-height" => StressOp::WidthHeight,
                "pixels" => StressOp::Pixels {
                    src_window: [0, 0, 64, 64],
                    dst_window: [32, 32],
                    band: 1,
                },
                other => anyhow::bail!("unknown operation: {}", other),
            };
            let spec = StressSpec {
                threads: *threads,
                iterations: *iterations,
                attempts: *attempts,
                copies: *copies,
                nanos: *nanos,
                dataset: DatasetKind::Warped,
                op,
            };
            let report = warp_pool::stress::run(Arc::clone(&pool), token, spec);
            println!(
                "{} ops in {:.2?} ({:.0} ops/s)",
                report.operations,
                report.elapsed,
                report.ops_per_second()
            );
            println!(
                "successes: {}, failures: {} (last error {})",
                report.successes, report.failures, report.last_error
            );
            println!(
                "handles touched: {} (max {} per call, reuse rate {:.2})",
                report.touched_total,
                report.touched_max,
                report.reuse_rate()
            );
            println!(
                "pool: {} of {} slots occupied",
                pool.pool().size(),
                pool.pool().capacity()
            );
            Ok(())
        }
        Commands::Workload { config } => {
            let config = workload::load(config)?;
            let pool = Arc::new(WarpPool::new(config.pool_config(), codec)?);
            println!("Running {} targets...", config.targets.len());
            let reports = workload::run(Arc::clone(&pool), &config)?;
            for (index, (uri, report)) in reports.iter().enumerate() {
                println!(
                    "[{}/{}] {}: {} ops, {} failures, reuse rate {:.2}",
                    index + 1,
                    reports.len(),
                    uri,
                    report.operations,
                    report.failures,
                    report.reuse_rate()
                );
            }
            Ok(())
        }
    }
}

const INFO_ATTEMPTS: i32 = 8;
const INFO_COPIES: i32 = 1;

fn info<C: RasterCodec>(pool: &WarpPool<C>, uri: &str, warp_options: &[String]) -> Result<()> {
    let token = pool.get_token(uri, warp_options);
    println!("token: {:#018x}", token);

    for dataset in [DatasetKind::Source, DatasetKind::Warped] {
        let label = match dataset {
            DatasetKind::Source => "source",
            DatasetKind::Warped => "warped",
        };
        let (mut width, mut height) = (0, 0);
        let code =
            pool.get_width_height(token, dataset, INFO_ATTEMPTS, INFO_COPIES, 0, &mut width, &mut height);
        if code < 0 {
            anyhow::bail!("cannot read {} dataset (code {})", label, code);
        }
        println!("{}: {} x {}", label, width, height);

        let mut bands = 0;
        if pool.get_band_count(token, dataset, INFO_ATTEMPTS, INFO_COPIES, 0, &mut bands) > 0 {
            println!("{}: {} band(s)", label, bands);
        }

        let mut transform = [0.0; 6];
        if pool.get_transform(token, dataset, INFO_ATTEMPTS, INFO_COPIES, 0, &mut transform) > 0 {
            println!("{}: transform {:?}", label, transform);
        }

        let mut proj4 = String::new();
        if pool.get_crs_proj4(token, dataset, INFO_ATTEMPTS, INFO_COPIES, 0, &mut proj4) > 0 {
            println!("{}: proj4 {}", label, proj4);
        }

        let mut data_type = 0;
        if pool.get_band_data_type(token, dataset, INFO_ATTEMPTS, INFO_COPIES, 0, 1, &mut data_type) > 0
        {
            println!(
                "{}: band 1 type {:?}",
                label,
                PixelType::from_code(data_type)
            );
        }

        let (mut nodata, mut has_nodata) = (0.0, 0);
        if pool.get_band_nodata(
            token,
            dataset,
            INFO_ATTEMPTS,
            INFO_COPIES,
            0,
            1,
            &mut nodata,
            &mut has_nodata,
        ) > 0
        {
            if has_nodata != 0 {
                println!("{}: band 1 nodata {}", label, nodata);
            } else {
                println!("{}: band 1 has no nodata", label);
            }
        }

        let (mut block_width, mut block_height) = (0, 0);
        if pool.get_block_size(
            token,
            dataset,
            INFO_ATTEMPTS,
            INFO_COPIES,
            0,
            1,
            &mut block_width,
            &mut block_height,
        ) > 0
        {
            println!("{}: block size {} x {}", label, block_width, block_height);
        }

        let mut domains = Vec::new();
        if pool.get_metadata_domain_list(
            token,
            dataset,
            INFO_ATTEMPTS,
            INFO_COPIES,
            0,
            0,
            &mut domains,
        ) > 0
            && !domains.is_empty()
        {
            println!("{}: metadata domains {:?}", label, domains);
        }

        let mut overviews = Vec::new();
        if pool.get_overview_widths_heights(
            token,
            dataset,
            INFO_ATTEMPTS,
            INFO_COPIES,
            0,
            1,
            &mut overviews,
            32,
        ) > 0
            && !overviews.is_empty()
        {
            println!("{}: overviews {:?}", label, overviews);
        }
    }

    Ok(())
}
