//! Fill and backtrace counters.
//!
//! Each thread accumulates into its own [`SSEMetrics`] without any
//! synchronization and folds the totals into a shared
//! [`SSEMetricsAggregator`] on exit. This is the only shared-memory
//! reporting hook the aligner core exposes.

use std::sync::Mutex;

/// Counters produced by the DP filler and backtrace. Plain fields; a
/// per-thread instance is never shared.
#[derive(Debug, Default, Clone)]
pub struct SSEMetrics {
    /// DPs tried.
    pub dp: u64,
    /// DPs that saturated in 8-bit mode.
    pub dpsat: u64,
    /// DPs with no solution cell.
    pub dpfail: u64,
    /// DPs with at least one solution cell.
    pub dpsucc: u64,
    /// DP columns filled.
    pub col: u64,
    /// DP cells filled.
    pub cell: u64,
    /// DP inner-loop (stripe) iterations.
    pub inner: u64,
    /// Lazy-F fix-up iterations.
    pub fixup: u64,
    /// Cells examined while gathering solutions.
    pub gathcell: u64,
    /// Solution cells found.
    pub gathsol: u64,
    /// Backtraces attempted.
    pub bt: u64,
    /// Backtraces abandoned.
    pub btfail: u64,
    /// Backtraces reported.
    pub btsucc: u64,
    /// Cells traversed during backtraces.
    pub btcell: u64,
}

impl SSEMetrics {
    pub fn new() -> SSEMetrics {
        SSEMetrics::default()
    }

    /// Zero all counters.
    pub fn reset(&mut self) {
        *self = SSEMetrics::default();
    }

    /// Fold another set of counters into this one.
    pub fn merge_from(&mut self, o: &SSEMetrics) {
        self.dp += o.dp;
        self.dpsat += o.dpsat;
        self.dpfail += o.dpfail;
        self.dpsucc += o.dpsucc;
        self.col += o.col;
        self.cell += o.cell;
        self.inner += o.inner;
        self.fixup += o.fixup;
        self.gathcell += o.gathcell;
        self.gathsol += o.gathsol;
        self.bt += o.bt;
        self.btfail += o.btfail;
        self.btsucc += o.btsucc;
        self.btcell += o.btcell;
    }
}

/// Shared totals that per-thread metrics merge into.
#[derive(Debug, Default)]
pub struct SSEMetricsAggregator {
    tot: Mutex<SSEMetrics>,
}

impl SSEMetricsAggregator {
    pub fn new() -> SSEMetricsAggregator {
        SSEMetricsAggregator::default()
    }

    /// Fold `o` into the shared totals. With `take_lock` the internal
    /// mutex is taken; without it the caller asserts it already serialized
    /// access some other way (contention is a bug in that case).
    pub fn merge(&self, o: &SSEMetrics, take_lock: bool) {
        if take_lock {
            self.tot.lock().unwrap().merge_from(o);
        } else {
            match self.tot.try_lock() {
                Ok(mut tot) => tot.merge_from(o),
                Err(_) => {
                    debug_assert!(false, "unlocked metrics merge raced another merge");
                    self.tot.lock().unwrap().merge_from(o);
                }
            }
        }
    }

    /// Copy of the current totals.
    pub fn snapshot(&self) -> SSEMetrics {
        self.tot.lock().unwrap().clone()
    }
}
