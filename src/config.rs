// src/config.rs
use crate::tokens::DEFAULT_TOKEN_CAPACITY;

/// Default number of pooled handle wrappers. Kept well under common
/// file-descriptor ulimits, since each wrapper holds two open datasets.
pub const DEFAULT_POOL_CAPACITY: usize = 256;

/// Default time budget applied when `POOL_SIGTERM_DUMP` is set.
const SIGTERM_DUMP_NANOS: u64 = 250_000_000;

/// Configuration handed to [`WarpPool::new`](crate::engine::WarpPool::new).
///
/// The registry, pool, and error channel are process-wide services; this is
/// the configuration they receive at init rather than hidden global state.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Maximum number of pooled handle wrappers.
    pub capacity: usize,
    /// Maximum number of live tokens.
    pub token_capacity: usize,
    /// Time budget in nanoseconds applied to calls that pass 0 for theirs.
    /// Zero means unbounded.
    pub default_nanos: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_POOL_CAPACITY,
            token_capacity: DEFAULT_TOKEN_CAPACITY,
            default_nanos: 0,
        }
    }
}

impl PoolConfig {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Apply the environment overrides: `POOL_NUM_DATASETS`,
    /// `POOL_DEFAULT_NANOS`, and `POOL_SIGTERM_DUMP` (which installs a
    /// SIGTERM handler that escalates to SIGSEGV for debug core dumps and
    /// sets a 250 ms default budget). Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(capacity) = env_usize("POOL_NUM_DATASETS") {
            config.capacity = capacity;
        }
        if let Some(nanos) = env_u64("POOL_DEFAULT_NANOS") {
            config.default_nanos = nanos;
        }
        if std::env::var_os("POOL_SIGTERM_DUMP").is_some() {
            if config.default_nanos == 0 {
                config.default_nanos = SIGTERM_DUMP_NANOS;
            }
            #[cfg(unix)]
            install_sigterm_handler();
        }
        config
    }
}

fn env_usize(name: &str) -> Option<usize> {
    let value = std::env::var(name).ok()?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!(name, value, "ignoring unparseable environment override");
            None
        }
    }
}

fn env_u64(name: &str) -> Option<u64> {
    let value = std::env::var(name).ok()?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!(name, value, "ignoring unparseable environment override");
            None
        }
    }
}

#[cfg(unix)]
extern "C" fn escalate_to_segv(signal: libc::c_int) {
    if signal == libc::SIGTERM {
        unsafe {
            libc::raise(libc::SIGSEGV);
        }
    }
}

#[cfg(unix)]
fn install_sigterm_handler() {
    unsafe {
        if libc::signal(libc::SIGTERM, escalate_to_segv as libc::sighandler_t)
            == libc::SIG_ERR
        {
            tracing::warn!("unable to install SIGTERM handler");
        }
    }
}
