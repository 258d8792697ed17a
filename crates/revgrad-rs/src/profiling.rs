//! Scope-based aggregation of node and driver call timings.
//!
//! Compiled to no-ops unless the `profiler` cargo feature is enabled, so
//! instrumented call sites cost nothing in regular builds.

#[cfg(feature = "profiler")]
use std::collections::HashMap;
#[cfg(feature = "profiler")]
use std::sync::{Mutex, OnceLock};
#[cfg(feature = "profiler")]
use std::time::{Duration, Instant};

#[cfg(feature = "profiler")]
#[derive(Default, Clone, Copy)]
struct Stat {
    calls: u64,
    total_ns: u128,
}

#[cfg(feature = "profiler")]
struct Profiler {
    stats: Mutex<HashMap<&'static str, Stat>>,
}

#[cfg(feature = "profiler")]
impl Profiler {
    fn instance() -> &'static Self {
        static INSTANCE: OnceLock<Profiler> = OnceLock::new();
        INSTANCE.get_or_init(|| Profiler {
            stats: Mutex::new(HashMap::new()),
        })
    }

    fn record(&self, name: &'static str, elapsed: Duration) {
        let mut stats = self.stats.lock().expect("profiler mutex poisoned");
        let entry = stats.entry(name).or_default();
        entry.calls = entry.calls.saturating_add(1);
        entry.total_ns = entry.total_ns.saturating_add(elapsed.as_nanos());
    }
}

/// Row of the aggregated profile: scope name, call count, total milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRow {
    pub name: &'static str,
    pub calls: u64,
    pub total_ms: f64,
}

/// RAII guard recording the elapsed time of one scope on drop.
pub struct ScopeGuard {
    #[cfg(feature = "profiler")]
    name: &'static str,
    #[cfg(feature = "profiler")]
    start: Instant,
}

#[cfg(feature = "profiler")]
impl Drop for ScopeGuard {
    fn drop(&mut self) {
        Profiler::instance().record(self.name, self.start.elapsed());
    }
}

/// Opens a profiling scope around one forward/backward invocation.
#[inline(always)]
pub fn op_scope(name: &'static str) -> ScopeGuard {
    #[cfg(feature = "profiler")]
    {
        ScopeGuard {
            name,
            start: Instant::now(),
        }
    }
    #[cfg(not(feature = "profiler"))]
    {
        let _ = name;
        ScopeGuard {}
    }
}

/// Drains the aggregated profile, sorted by total time descending.
#[cfg(feature = "profiler")]
pub fn take_table() -> Vec<ProfileRow> {
    let mut stats = Profiler::instance()
        .stats
        .lock()
        .expect("profiler mutex poisoned");
    let mut rows = stats
        .drain()
        .map(|(name, stat)| ProfileRow {
            name,
            calls: stat.calls,
            total_ms: stat.total_ns as f64 / 1_000_000.0,
        })
        .collect::<Vec<_>>();
    rows.sort_by(|a, b| {
        b.total_ms
            .partial_cmp(&a.total_ms)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    rows
}

#[cfg(not(feature = "profiler"))]
pub fn take_table() -> Vec<ProfileRow> {
    Vec::new()
}
