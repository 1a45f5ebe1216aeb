//! C ABI over the process-wide runtime.
//!
//! Every entry point goes through [`crate::global`], so the calls are
//! serialised by the global lock. Failures are reported as `GCReturnCode`
//! values; queries return `-1` (or `0` for flags) when the runtime is not
//! initialised.

use std::ffi::{c_char, c_int};

use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::generation::NUM_GENERATIONS;
use crate::global;
use crate::RuntimeResult;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GCReturnCode {
    Success = 0,
    ErrorAlreadyInitialized = -1,
    ErrorNotInitialized = -2,
    ErrorCollectionInProgress = -3,
    ErrorInvalidGeneration = -4,
    ErrorInternal = -5,
}

impl From<RuntimeError> for GCReturnCode {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::AlreadyInitialized => GCReturnCode::ErrorAlreadyInitialized,
            RuntimeError::NotInitialized => GCReturnCode::ErrorNotInitialized,
            RuntimeError::CollectionInProgress => GCReturnCode::ErrorCollectionInProgress,
            RuntimeError::InvalidGeneration(_) => GCReturnCode::ErrorInvalidGeneration,
            RuntimeError::Internal(_) => GCReturnCode::ErrorInternal,
        }
    }
}

impl<T> From<RuntimeResult<T>> for GCReturnCode {
    fn from(result: RuntimeResult<T>) -> Self {
        match result {
            Ok(_) => GCReturnCode::Success,
            Err(err) => err.into(),
        }
    }
}

fn generation_index(generation: c_int) -> Option<usize> {
    usize::try_from(generation)
        .ok()
        .filter(|&g| g < NUM_GENERATIONS)
}

fn to_c_int(value: usize) -> c_int {
    c_int::try_from(value).unwrap_or(c_int::MAX)
}

/// Initialises logging and the global runtime, configured from the
/// `PYRT_*` environment variables.
#[unsafe(no_mangle)]
pub extern "C" fn py_rt_init() -> GCReturnCode {
    global::init_logging();
    global::init(RuntimeConfig::from_env()).into()
}

#[unsafe(no_mangle)]
pub extern "C" fn py_rt_cleanup() -> GCReturnCode {
    global::teardown().into()
}

#[unsafe(no_mangle)]
pub extern "C" fn py_rt_is_initialized() -> c_int {
    c_int::from(global::is_initialized())
}

#[unsafe(no_mangle)]
pub extern "C" fn py_rt_live_objects() -> c_int {
    global::with_runtime(|rt| to_c_int(rt.live_objects())).unwrap_or(-1)
}

#[unsafe(no_mangle)]
pub extern "C" fn py_gc_enable() -> GCReturnCode {
    global::with_runtime(|rt| rt.gc_enable()).into()
}

#[unsafe(no_mangle)]
pub extern "C" fn py_gc_disable() -> GCReturnCode {
    global::with_runtime(|rt| rt.gc_disable()).into()
}

#[unsafe(no_mangle)]
pub extern "C" fn py_gc_is_enabled() -> c_int {
    global::with_runtime(|rt| c_int::from(rt.gc_is_enabled())).unwrap_or(0)
}

/// Full collection. Returns the number of objects freed, or a negative
/// `GCReturnCode` on failure.
#[unsafe(no_mangle)]
pub extern "C" fn py_gc_collect() -> c_int {
    match global::with_runtime(|rt| rt.gc_collect(None)).and_then(|r| r) {
        Ok(collected) => to_c_int(collected),
        Err(err) => GCReturnCode::from(err) as c_int,
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn py_gc_collect_generation(generation: c_int) -> c_int {
    let Some(generation) = generation_index(generation) else {
        return GCReturnCode::ErrorInvalidGeneration as c_int;
    };
    match global::with_runtime(|rt| rt.gc_collect(Some(generation))).and_then(|r| r) {
        Ok(collected) => to_c_int(collected),
        Err(err) => GCReturnCode::from(err) as c_int,
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn py_gc_get_count(generation: c_int) -> c_int {
    let Some(generation) = generation_index(generation) else {
        return -1;
    };
    global::with_runtime(|rt| to_c_int(rt.gc_count()[generation])).unwrap_or(-1)
}

#[unsafe(no_mangle)]
pub extern "C" fn py_gc_get_threshold(generation: c_int) -> c_int {
    let Some(generation) = generation_index(generation) else {
        return -1;
    };
    global::with_runtime(|rt| to_c_int(rt.gc_get_threshold()[generation])).unwrap_or(-1)
}

#[unsafe(no_mangle)]
pub extern "C" fn py_gc_set_threshold(generation: c_int, threshold: c_int) -> GCReturnCode {
    let (Some(generation), Ok(threshold)) = (generation_index(generation), usize::try_from(threshold))
    else {
        return GCReturnCode::ErrorInvalidGeneration;
    };
    global::with_runtime(|rt| rt.gc_set_threshold(generation, threshold))
        .and_then(|r| r)
        .into()
}

#[unsafe(no_mangle)]
pub extern "C" fn py_gc_set_debug(flags: c_int) -> GCReturnCode {
    let Ok(flags) = u32::try_from(flags) else {
        return GCReturnCode::ErrorInternal;
    };
    global::with_runtime(|rt| rt.gc_set_debug(flags)).into()
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GCStats {
    pub total_tracked: c_int,
    pub generation_counts: [c_int; 3],
    pub collections: [c_int; 3],
    pub collected: [c_int; 3],
    pub uncollectable: c_int,
}

/// Retrieves collector statistics.
///
/// # Safety
///
/// `stats` must be null or a valid pointer to a writable `GCStats`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn py_gc_get_stats(stats: *mut GCStats) -> GCReturnCode {
    if stats.is_null() {
        return GCReturnCode::ErrorInternal;
    }
    let snapshot = match global::with_runtime(|rt| rt.gc_stats()) {
        Ok(snapshot) => snapshot,
        Err(err) => return err.into(),
    };
    let out = GCStats {
        total_tracked: to_c_int(snapshot.total_tracked),
        generation_counts: snapshot.counts.map(to_c_int),
        collections: snapshot.generations.each_ref().map(|g| to_c_int(g.collections)),
        collected: snapshot.generations.each_ref().map(|g| to_c_int(g.collected)),
        uncollectable: to_c_int(snapshot.generations.iter().map(|g| g.uncollectable).sum()),
    };
    // SAFETY: checked non-null above; validity is the caller's contract.
    unsafe {
        *stats = out;
    }
    GCReturnCode::Success
}

#[unsafe(no_mangle)]
pub extern "C" fn py_gc_get_garbage_count() -> c_int {
    global::with_runtime(|rt| to_c_int(rt.gc_garbage().len())).unwrap_or(-1)
}

#[unsafe(no_mangle)]
pub extern "C" fn py_gc_clear_garbage() -> c_int {
    global::with_runtime(|rt| to_c_int(rt.gc_clear_garbage())).unwrap_or(-1)
}

/// Writes a one-line, NUL-terminated summary of the collector state,
/// truncated to fit.
///
/// # Safety
///
/// `buffer` must be null or valid for writes of `buffer_size` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn py_gc_get_state_string(buffer: *mut c_char, buffer_size: usize) -> GCReturnCode {
    if buffer.is_null() || buffer_size == 0 {
        return GCReturnCode::ErrorInternal;
    }
    let (state, code) = match global::with_runtime(|rt| {
        let counts = rt.gc_count();
        format!(
            "GC State: enabled={}, live={}, gen0={}, gen1={}, gen2={}, garbage={}",
            rt.gc_is_enabled(),
            rt.live_objects(),
            counts[0],
            counts[1],
            counts[2],
            rt.gc_garbage().len()
        )
    }) {
        Ok(state) => (state, GCReturnCode::Success),
        Err(err) => ("runtime not initialized".to_string(), err.into()),
    };
    let len = state.len().min(buffer_size - 1);
    // SAFETY: `len + 1 <= buffer_size` and the caller guarantees the buffer.
    unsafe {
        std::ptr::copy_nonoverlapping(state.as_ptr(), buffer.cast::<u8>(), len);
        *buffer.add(len) = 0;
    }
    code
}

#[unsafe(no_mangle)]
pub extern "C" fn py_err_occurred() -> c_int {
    global::with_runtime(|rt| c_int::from(rt.error_occurred())).unwrap_or(0)
}

#[unsafe(no_mangle)]
pub extern "C" fn py_err_clear() -> GCReturnCode {
    global::with_runtime(|rt| rt.clear_error()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_codes_map_runtime_errors() {
        assert_eq!(
            GCReturnCode::from(RuntimeError::InvalidGeneration(7)),
            GCReturnCode::ErrorInvalidGeneration
        );
        assert_eq!(
            GCReturnCode::from(RuntimeResult::<usize>::Ok(3)),
            GCReturnCode::Success
        );
        assert_eq!(GCReturnCode::ErrorNotInitialized as c_int, -2);
    }

    #[test]
    fn test_generation_index_bounds() {
        assert_eq!(generation_index(0), Some(0));
        assert_eq!(generation_index(2), Some(2));
        assert_eq!(generation_index(3), None);
        assert_eq!(generation_index(-1), None);
    }
}
