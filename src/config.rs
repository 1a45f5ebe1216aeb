//! Runtime configuration.
//!
//! Defaults mirror the classic collector tuning (700/10/10). The recursion
//! limit is sized so guarded repr/compare/hash nesting stays inside a 2 MiB
//! thread stack.

use log::warn;

/// Print collection statistics at `debug` level.
pub const DEBUG_STATS: u32 = 1 << 0;
/// Log every collectable object found.
pub const DEBUG_COLLECTABLE: u32 = 1 << 1;
/// Log every uncollectable object found.
pub const DEBUG_UNCOLLECTABLE: u32 = 1 << 2;
/// Park every unreachable object in the garbage list instead of freeing it.
pub const DEBUG_SAVEALL: u32 = 1 << 5;
pub const DEBUG_LEAK: u32 = DEBUG_COLLECTABLE | DEBUG_UNCOLLECTABLE | DEBUG_SAVEALL;

/// Default nesting limit for guarded operations. Debug builds spend several
/// KiB of stack per nested compare, so they get a much lower limit.
#[cfg(debug_assertions)]
pub const DEFAULT_RECURSION_LIMIT: usize = 100;

#[cfg(not(debug_assertions))]
pub const DEFAULT_RECURSION_LIMIT: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Allocation thresholds for generations 0, 1 and 2.
    pub gc_thresholds: [usize; 3],
    pub gc_enabled: bool,
    pub gc_debug: u32,
    /// Maximum nesting of guarded recursive operations (compare, repr, ...).
    pub recursion_limit: usize,
    /// Number of unraisable reports kept in memory.
    pub unraisable_history: usize,
    /// Inclusive range of pre-allocated integer singletons.
    pub small_int_range: (i64, i64),
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            gc_thresholds: [700, 10, 10],
            gc_enabled: true,
            gc_debug: 0,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            unraisable_history: 64,
            small_int_range: (-5, 256),
        }
    }
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(mut self, thresholds: [usize; 3]) -> Self {
        self.gc_thresholds = thresholds;
        self
    }

    pub fn with_gc_enabled(mut self, enabled: bool) -> Self {
        self.gc_enabled = enabled;
        self
    }

    pub fn with_gc_debug(mut self, flags: u32) -> Self {
        self.gc_debug = flags;
        self
    }

    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    pub fn with_small_int_range(mut self, low: i64, high: i64) -> Self {
        self.small_int_range = (low, high.max(low));
        self
    }

    /// Builds a configuration from the `PYRT_*` environment variables,
    /// starting from the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup("PYRT_GC_THRESHOLDS") {
            match parse_thresholds(&raw) {
                Some(thresholds) => config.gc_thresholds = thresholds,
                None => warn!("ignoring malformed PYRT_GC_THRESHOLDS={raw:?}"),
            }
        }

        if let Some(raw) = lookup("PYRT_GC_DISABLE") {
            config.gc_enabled = matches!(raw.trim(), "" | "0" | "false");
        }

        if let Some(raw) = lookup("PYRT_RECURSION_LIMIT") {
            match raw.trim().parse::<usize>() {
                Ok(limit) if limit > 0 => config.recursion_limit = limit,
                _ => warn!("ignoring malformed PYRT_RECURSION_LIMIT={raw:?}"),
            }
        }

        if let Some(raw) = lookup("PYRT_GC_DEBUG") {
            match raw.trim().parse::<u32>() {
                Ok(flags) => config.gc_debug = flags,
                Err(_) => warn!("ignoring malformed PYRT_GC_DEBUG={raw:?}"),
            }
        }

        config
    }
}

fn parse_thresholds(raw: &str) -> Option<[usize; 3]> {
    let parts: Vec<usize> = raw
        .split(',')
        .map(|part| part.trim().parse::<usize>())
        .collect::<Result<_, _>>()
        .ok()?;
    match parts.as_slice() {
        [a, b, c] => Some([*a, *b, *c]),
        _ => None,
    }
}
