// src/types.rs
use std::sync::OnceLock;

/// Opaque handle interning a [`Key`]. Unstable across restarts and across
/// eviction from the token registry.
pub type Token = u64;

/// Reserved token value, never issued by the registry.
pub const BAD_TOKEN: Token = 0;

/// Canonical identity of one logical dataset configuration: a URI plus the
/// warp option vector that will be applied to it. Equality and hashing are
/// positional over the options (order and duplicates are significant).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    pub uri: String,
    pub options: Vec<String>,
}

// Fixed seeds so tags stay comparable for the lifetime of the process.
fn tag_hasher() -> &'static ahash::RandomState {
    static TAG_HASHER: OnceLock<ahash::RandomState> = OnceLock::new();
    TAG_HASHER.get_or_init(|| {
        ahash::RandomState::with_seeds(0x9e37_79b9, 0x7f4a_7c15, 0xf39c_c060, 0x5ced_c834)
    })
}

impl Key {
    pub fn new(uri: &str, options: &[String]) -> Self {
        Self {
            uri: uri.to_string(),
            options: options.to_vec(),
        }
    }

    /// Cached-hash tag used by the dataset pool for cheap slot comparisons.
    /// Tag 0 marks an empty slot, so a real key never hashes to 0.
    pub fn tag(&self) -> u64 {
        match tag_hasher().hash_one(self) {
            0 => 1,
            h => h,
        }
    }
}

/// Selects which half of a handle wrapper an operation reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum DatasetKind {
    /// The raw resource opened from the URI.
    Source = 0,
    /// The reprojected in-memory virtual product.
    Warped = 1,
}

impl DatasetKind {
    pub fn from_index(index: i32) -> Option<Self> {
        match index {
            0 => Some(DatasetKind::Source),
            1 => Some(DatasetKind::Warped),
            _ => None,
        }
    }
}

/// Pixel data types, using the codec's integer codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum PixelType {
    Unknown = 0,
    Byte = 1,
    UInt16 = 2,
    Int16 = 3,
    UInt32 = 4,
    Int32 = 5,
    Float32 = 6,
    Float64 = 7,
    CInt16 = 8,
    CInt32 = 9,
    CFloat32 = 10,
    CFloat64 = 11,
}

impl PixelType {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(PixelType::Unknown),
            1 => Some(PixelType::Byte),
            2 => Some(PixelType::UInt16),
            3 => Some(PixelType::Int16),
            4 => Some(PixelType::UInt32),
            5 => Some(PixelType::Int32),
            6 => Some(PixelType::Float32),
            7 => Some(PixelType::Float64),
            8 => Some(PixelType::CInt16),
            9 => Some(PixelType::CInt32),
            10 => Some(PixelType::CFloat32),
            11 => Some(PixelType::CFloat64),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    /// Size of one sample in bytes. Zero for `Unknown`.
    pub fn size(self) -> usize {
        match self {
            PixelType::Unknown => 0,
            PixelType::Byte => 1,
            PixelType::UInt16 | PixelType::Int16 => 2,
            PixelType::UInt32 | PixelType::Int32 | PixelType::Float32 | PixelType::CInt16 => 4,
            PixelType::Float64 | PixelType::CInt32 | PixelType::CFloat32 => 8,
            PixelType::CFloat64 => 16,
        }
    }
}
