//! FFmpeg Thread Budget
//!
//! Divides the machine's cores fairly between concurrently running ffmpeg
//! invocations. Each invocation holds an [`OperationGuard`] for its whole
//! lifetime; the guard's thread count is what gets passed as `-threads`.

use std::sync::{Mutex, OnceLock};

use serde::Serialize;
use tracing::debug;

/// Minimum thread count handed to any ffmpeg operation
pub const MIN_THREADS: usize = 2;

/// Upper bound on the production baseline
const MAX_BASELINE_THREADS: usize = 16;

/// Upper bound on the number of operations that get a scaled share
const MAX_CONCURRENT_CAP: usize = 6;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

static SYSTEM_INFO: OnceLock<SystemInfo> = OnceLock::new();

// =============================================================================
// System Info
// =============================================================================

/// Static hardware facts used for thread budgeting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SystemInfo {
    /// Logical CPU count
    pub cpu_count: usize,
    /// Total physical memory, when the platform exposes it
    pub total_memory_bytes: Option<u64>,
}

impl SystemInfo {
    pub fn new(cpu_count: usize, total_memory_bytes: Option<u64>) -> Self {
        Self {
            cpu_count: cpu_count.max(1),
            total_memory_bytes,
        }
    }

    /// Detects CPU count and memory once per process.
    pub fn detect() -> Self {
        *SYSTEM_INFO.get_or_init(|| {
            let info = Self::new(num_cpus::get(), read_total_memory());
            debug!(
                cpu_count = info.cpu_count,
                total_memory_bytes = ?info.total_memory_bytes,
                "Detected system resources"
            );
            info
        })
    }

    /// Total memory in GiB
    pub fn total_memory_gb(&self) -> Option<f64> {
        self.total_memory_bytes.map(|b| b as f64 / GIB)
    }
}

#[cfg(target_os = "linux")]
fn read_total_memory() -> Option<u64> {
    let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
    parse_meminfo_total(&meminfo)
}

#[cfg(not(target_os = "linux"))]
fn read_total_memory() -> Option<u64> {
    None
}

/// Extracts `MemTotal` (reported in kB) from /proc/meminfo content
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_meminfo_total(content: &str) -> Option<u64> {
    content.lines().find_map(|line| {
        let rest = line.strip_prefix("MemTotal:")?;
        let kb: u64 = rest.split_whitespace().next()?.parse().ok()?;
        Some(kb * 1024)
    })
}

/// True when the `CI` environment variable is set to `true`
pub fn is_ci_environment() -> bool {
    std::env::var("CI")
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

// =============================================================================
// Thread Manager
// =============================================================================

/// Process-wide ffmpeg thread allocator
#[derive(Debug)]
pub struct FFmpegThreadManager {
    system: SystemInfo,
    ci_mode: bool,
    active_operations: Mutex<usize>,
}

impl FFmpegThreadManager {
    pub fn new(system: SystemInfo, ci_mode: bool) -> Self {
        Self {
            system,
            ci_mode,
            active_operations: Mutex::new(0),
        }
    }

    /// Manager for the current machine; CI mode follows the `CI` variable
    /// unless `ci_override` is set.
    pub fn detect(ci_override: Option<bool>) -> Self {
        Self::new(
            SystemInfo::detect(),
            ci_override.unwrap_or_else(is_ci_environment),
        )
    }

    pub fn system(&self) -> SystemInfo {
        self.system
    }

    pub fn is_ci_mode(&self) -> bool {
        self.ci_mode
    }

    /// Registers an ffmpeg operation for the lifetime of the returned guard.
    pub fn enter(&self) -> OperationGuard<'_> {
        let threads = {
            let mut active = self.lock_active();
            *active += 1;
            self.threads_for_others(active.saturating_sub(1))
        };
        debug!(threads, "FFmpeg operation started");
        OperationGuard {
            manager: self,
            threads,
        }
    }

    /// Number of operations currently inside a guard
    pub fn active_operations(&self) -> usize {
        *self.lock_active()
    }

    /// Thread count for a caller that already holds a guard.
    ///
    /// Never fails and never returns fewer than [`MIN_THREADS`].
    pub fn get_threads_for_operation(&self) -> usize {
        let active = self.active_operations();
        self.threads_for_others(active.saturating_sub(1))
    }

    /// Threads for one operation given `others` concurrent operations.
    pub fn threads_for_others(&self, others: usize) -> usize {
        let baseline = self.baseline_threads();
        if others == 0 {
            return baseline;
        }
        if others >= self.max_concurrent_operations() {
            return MIN_THREADS;
        }
        (baseline >> others).max(MIN_THREADS)
    }

    /// Thread count for a lone operation on this machine
    pub fn baseline_threads(&self) -> usize {
        let cpus = self.system.cpu_count;
        let memory_gb = self.system.total_memory_gb();

        if memory_gb.is_some_and(|gb| gb < 4.0) {
            return MIN_THREADS;
        }

        let mut threads = if self.ci_mode {
            match cpus {
                0..=2 => 2,
                4 => 4,
                _ => (cpus / 2).min(4),
            }
        } else {
            ((cpus as f64 * 1.5).round() as usize).min(MAX_BASELINE_THREADS)
        };

        match memory_gb {
            Some(gb) if gb < 8.0 => threads = threads.min(4),
            Some(gb) if gb < 16.0 => threads = threads.min(6),
            _ => {}
        }

        threads.max(MIN_THREADS)
    }

    /// Concurrency level above which every operation gets the minimum
    pub fn max_concurrent_operations(&self) -> usize {
        let cpus = self.system.cpu_count;
        let reserved = ((cpus as f64 * 0.1).round() as usize).max(2);
        let available = cpus.saturating_sub(reserved).max(1);
        (available / self.baseline_threads()).clamp(1, MAX_CONCURRENT_CAP)
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, usize> {
        // A panic while holding the counter lock cannot leave it inconsistent.
        self.active_operations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn leave(&self) {
        let mut active = self.lock_active();
        *active = active.saturating_sub(1);
    }
}

/// Scoped registration of one ffmpeg operation
#[derive(Debug)]
pub struct OperationGuard<'a> {
    manager: &'a FFmpegThreadManager,
    threads: usize,
}

impl OperationGuard<'_> {
    /// Thread count allocated when the operation started
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// `-threads N` arguments for ffmpeg
    pub fn thread_args(&self) -> [String; 2] {
        ["-threads".to_string(), self.threads.to_string()]
    }
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        self.manager.leave();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const GB: u64 = 1024 * 1024 * 1024;

    fn profiles() -> Vec<SystemInfo> {
        let mut out = Vec::new();
        for cpus in [1, 2, 3, 4, 6, 8, 12, 16, 32, 64] {
            for mem in [None, Some(2 * GB), Some(6 * GB), Some(12 * GB), Some(64 * GB)] {
                out.push(SystemInfo::new(cpus, mem));
            }
        }
        out
    }

    // ------------------------------------------------------------------------
    // Baseline
    // ------------------------------------------------------------------------

    #[test]
    fn test_low_memory_forces_minimum() {
        let manager = FFmpegThreadManager::new(SystemInfo::new(32, Some(3 * GB)), false);
        assert_eq!(manager.baseline_threads(), MIN_THREADS);
    }

    #[test]
    fn test_production_baseline() {
        let manager = FFmpegThreadManager::new(SystemInfo::new(8, Some(64 * GB)), false);
        assert_eq!(manager.baseline_threads(), 12);

        let big = FFmpegThreadManager::new(SystemInfo::new(64, Some(64 * GB)), false);
        assert_eq!(big.baseline_threads(), 16);
    }

    #[test]
    fn test_ci_baseline() {
        let two = FFmpegThreadManager::new(SystemInfo::new(2, Some(64 * GB)), true);
        assert_eq!(two.baseline_threads(), 2);

        let four = FFmpegThreadManager::new(SystemInfo::new(4, Some(64 * GB)), true);
        assert_eq!(four.baseline_threads(), 4);

        let many = FFmpegThreadManager::new(SystemInfo::new(16, Some(64 * GB)), true);
        assert_eq!(many.baseline_threads(), 4);
    }

    #[test]
    fn test_memory_caps_baseline() {
        let mid = FFmpegThreadManager::new(SystemInfo::new(16, Some(6 * GB)), false);
        assert_eq!(mid.baseline_threads(), 4);

        let upper = FFmpegThreadManager::new(SystemInfo::new(16, Some(12 * GB)), false);
        assert_eq!(upper.baseline_threads(), 6);
    }

    #[test]
    fn test_ci_never_exceeds_production() {
        for system in profiles() {
            let ci = FFmpegThreadManager::new(system, true);
            let prod = FFmpegThreadManager::new(system, false);
            assert!(
                ci.baseline_threads() <= prod.baseline_threads(),
                "{:?}",
                system
            );
        }
    }

    // ------------------------------------------------------------------------
    // Concurrency scaling
    // ------------------------------------------------------------------------

    #[test]
    fn test_threads_monotonic_and_floored() {
        for system in profiles() {
            for ci in [false, true] {
                let manager = FFmpegThreadManager::new(system, ci);
                let baseline = manager.baseline_threads();
                let mut previous = usize::MAX;
                for others in 0..12 {
                    let threads = manager.threads_for_others(others);
                    assert!(threads >= MIN_THREADS);
                    assert!(threads <= baseline);
                    assert!(threads <= previous, "{:?} others={}", system, others);
                    previous = threads;
                }
            }
        }
    }

    #[test]
    fn test_first_operation_gets_baseline() {
        let manager = FFmpegThreadManager::new(SystemInfo::new(8, Some(64 * GB)), false);
        let guard = manager.enter();
        assert_eq!(guard.threads(), manager.baseline_threads());
        assert_eq!(manager.get_threads_for_operation(), manager.baseline_threads());
    }

    #[test]
    fn test_saturation_returns_minimum() {
        let manager = FFmpegThreadManager::new(SystemInfo::new(32, Some(64 * GB)), false);
        let limit = manager.max_concurrent_operations();
        assert_eq!(manager.threads_for_others(limit), MIN_THREADS);
        assert_eq!(manager.threads_for_others(limit + 5), MIN_THREADS);
    }

    #[test]
    fn test_max_concurrent_bounds() {
        for system in profiles() {
            let manager = FFmpegThreadManager::new(system, false);
            let limit = manager.max_concurrent_operations();
            assert!((1..=MAX_CONCURRENT_CAP).contains(&limit));
        }
    }

    // ------------------------------------------------------------------------
    // Guard lifecycle
    // ------------------------------------------------------------------------

    #[test]
    fn test_guard_tracks_active_operations() {
        let manager = FFmpegThreadManager::new(SystemInfo::new(8, Some(64 * GB)), false);
        assert_eq!(manager.active_operations(), 0);

        let first = manager.enter();
        let second = manager.enter();
        assert_eq!(manager.active_operations(), 2);
        assert!(second.threads() <= first.threads());

        drop(first);
        assert_eq!(manager.active_operations(), 1);
        drop(second);
        assert_eq!(manager.active_operations(), 0);
    }

    #[test]
    fn test_guard_released_on_panic() {
        let manager = FFmpegThreadManager::new(SystemInfo::new(8, None), false);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = manager.enter();
            panic!("encode blew up");
        }));
        assert!(result.is_err());
        assert_eq!(manager.active_operations(), 0);
    }

    #[test]
    fn test_concurrent_guards_balance() {
        let manager = Arc::new(FFmpegThreadManager::new(SystemInfo::new(8, None), false));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = Arc::clone(&manager);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let guard = manager.enter();
                        assert!(guard.threads() >= MIN_THREADS);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(manager.active_operations(), 0);
    }

    #[test]
    fn test_parse_meminfo_total() {
        let content = "MemTotal:       16318136 kB\nMemFree:         1234 kB\n";
        assert_eq!(parse_meminfo_total(content), Some(16318136 * 1024));
        assert_eq!(parse_meminfo_total("MemFree: 1 kB"), None);
    }

    #[test]
    fn test_detect_is_memoized() {
        assert_eq!(SystemInfo::detect(), SystemInfo::detect());
        assert!(SystemInfo::detect().cpu_count >= 1);
    }
}
