// src/channel.rs
//! Per-thread error channel.
//!
//! The codec reports failures through a single process-global callback,
//! possibly on any thread. The channel deposits the last code per reporting
//! thread so the handle wrapper that triggered the call can read it back on
//! the same thread and distinguish "empty result" from "call failed".

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::OnceLock;
use std::thread::ThreadId;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use crate::errors::{codes, error_string, Severity};

/// Milliseconds since the Unix epoch. Zero means "no entry".
pub type Millis = u64;

/// Entries from more threads than this trigger a bulk clear.
const MAX_TRACKED_THREADS: usize = 1 << 20;

const DEFAULT_MAX_ERROR_REPORTS: i32 = 1000;

#[derive(Clone, Copy, Debug)]
struct Entry {
    code: i32,
    timestamp: Millis,
}

/// Concurrent map from reporting thread to its most recent error.
pub struct ErrorChannel {
    entries: Mutex<HashMap<ThreadId, Entry, ahash::RandomState>>,
    reported: AtomicI32,
}

static CHANNEL: OnceLock<ErrorChannel> = OnceLock::new();

impl ErrorChannel {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::default()),
            reported: AtomicI32::new(0),
        }
    }

    /// The process-wide channel. A single instance exists because the codec
    /// offers a single global error callback.
    pub fn global() -> &'static ErrorChannel {
        CHANNEL.get_or_init(ErrorChannel::new)
    }

    /// Deposit an error for the calling thread and emit a bounded report to
    /// stderr. Fatal severity terminates the process.
    pub fn report(&self, severity: Severity, code: i32, message: &str) {
        // Re-read the cap on every error, following the codec's own behavior.
        let max_reports = std::env::var("CPL_MAX_ERROR_REPORTS")
            .ok()
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or(DEFAULT_MAX_ERROR_REPORTS);

        let reported = self.reported.load(Ordering::Relaxed);
        if reported < max_reports {
            let reported = self.reported.fetch_add(1, Ordering::Relaxed) + 1;
            if std::env::var_os("POOL_NONANSI_MESSAGES").is_none() {
                eprintln!(
                    "\x1b[30;1m\x1b[45;1m[{} of {}]\x1b[0m {} {} {} \x1b[0m",
                    reported,
                    max_reports,
                    severity.label_ansi(),
                    error_string(code),
                    message
                );
            } else {
                eprintln!(
                    "[{} of {}] {} {} {} ",
                    reported,
                    max_reports,
                    severity.label(),
                    error_string(code),
                    message
                );
            }
        }

        if severity == Severity::Fatal {
            std::process::exit(-1);
        }

        let entry = Entry {
            code,
            timestamp: now_millis(),
        };
        self.entries.lock().insert(std::thread::current().id(), entry);
    }

    /// Read and clear the calling thread's entry. Returns [`codes::NONE`]
    /// when nothing was deposited since the last read.
    pub fn take_last(&self) -> i32 {
        let mut entries = self.entries.lock();
        let code = entries
            .remove(&std::thread::current().id())
            .map_or(codes::NONE, |e| e.code);
        if entries.len() > MAX_TRACKED_THREADS {
            // Can hold errors from 2^20 distinct threads before possibly
            // losing information.
            entries.clear();
        }
        code
    }

    /// Timestamp of the calling thread's entry, without clearing it. Zero
    /// when no entry exists.
    pub fn last_timestamp(&self) -> Millis {
        self.entries
            .lock()
            .get(&std::thread::current().id())
            .map_or(0, |e| e.timestamp)
    }
}

fn now_millis() -> Millis {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Millis)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_last_reads_and_clears() {
        let channel = ErrorChannel::new();
        assert_eq!(channel.take_last(), codes::NONE);
        channel.report(Severity::Failure, codes::ILLEGAL_ARG, "bad band");
        assert!(channel.last_timestamp() > 0);
        assert_eq!(channel.take_last(), codes::ILLEGAL_ARG);
        assert_eq!(channel.take_last(), codes::NONE);
        assert_eq!(channel.last_timestamp(), 0);
    }

    #[test]
    fn entries_are_per_thread() {
        let channel = ErrorChannel::new();
        channel.report(Severity::Failure, codes::FILE_IO, "io");
        std::thread::scope(|s| {
            s.spawn(|| {
                assert_eq!(channel.take_last(), codes::NONE);
                channel.report(Severity::Failure, codes::OPEN_FAILED, "open");
                assert_eq!(channel.take_last(), codes::OPEN_FAILED);
            });
        });
        assert_eq!(channel.take_last(), codes::FILE_IO);
    }
}
