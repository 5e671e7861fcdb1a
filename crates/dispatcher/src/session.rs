//! Per-batch state

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use contracts::{RtcErrorCode, MAX_RTC_CALLOUTS};
use tokio::time::Instant;

/// Callout quota and duplicate-URL tracking of one batch.
#[derive(Debug, Default)]
pub struct DedupGuard {
    seen: Mutex<HashSet<String>>,
}

impl DedupGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit `url` for dispatch, or say why not.
    ///
    /// Checks run in order under one lock and without suspending:
    /// quota, then `classify` (security), then duplicates. An admitted URL is
    /// marked seen before the lock is released.
    pub fn admit<T>(
        &self,
        url: &str,
        classify: impl FnOnce(&str) -> Result<T, RtcErrorCode>,
    ) -> Result<T, RtcErrorCode> {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);

        if seen.len() >= MAX_RTC_CALLOUTS {
            return Err(RtcErrorCode::MaxCalloutsExceeded);
        }
        let admitted = classify(url)?;
        if seen.contains(url) {
            return Err(RtcErrorCode::DuplicateUrl);
        }
        seen.insert(url.to_string());
        Ok(admitted)
    }

    /// Number of URLs dispatched so far
    pub fn dispatched(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// State of one RTC batch. Created per `execute()` call and dropped with it.
#[derive(Debug)]
pub struct Session {
    started: Instant,
    guard: DedupGuard,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            guard: DedupGuard::new(),
        }
    }

    /// Milliseconds since the batch started
    pub fn elapsed_millis(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    pub fn guard(&self) -> &DedupGuard {
        &self.guard
    }
}
