// src/lib.rs
//! Thread-safe pooled access to warped rasters.
//!
//! The underlying raster library is thread-hostile: opened dataset handles
//! must never be used concurrently, and opening them is expensive. This
//! crate turns that into a safely-sharable service: keys are interned into
//! opaque tokens, a bounded flat LRU pools several open copies of each hot
//! dataset, and a dispatch engine retries contended reads against other
//! copies under attempt and time budgets.

pub mod channel;
pub mod cli;
pub mod codec;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod errors;
pub mod pool;
pub mod stress;
pub mod tokens;
pub mod types;
pub mod workload;

pub use channel::ErrorChannel;
pub use codec::mem::{MemCodec, MemRaster};
pub use codec::{RasterCodec, RasterDataset};
pub use config::PoolConfig;
pub use dataset::{AttemptOutcome, LockedDataset};
pub use engine::WarpPool;
pub use errors::{PoolError, Severity, ATTEMPTS_EXCEEDED};
pub use pool::DatasetPool;
pub use tokens::TokenRegistry;
pub use types::{DatasetKind, Key, PixelType, Token, BAD_TOKEN};

#[cfg(feature = "gdal")]
pub use codec::gdal::GdalCodec;

// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
