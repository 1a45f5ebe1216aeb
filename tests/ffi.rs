use std::ffi::{c_char, CStr};

use python_runtime::ffi::*;

// One test: every entry point shares the process-wide runtime.
#[test]
fn test_c_abi_round_trip() {
    assert_eq!(py_rt_is_initialized(), 0);
    assert_eq!(py_gc_enable(), GCReturnCode::ErrorNotInitialized);
    assert_eq!(py_gc_get_count(0), -1);

    assert_eq!(py_rt_init(), GCReturnCode::Success);
    assert_eq!(py_rt_init(), GCReturnCode::ErrorAlreadyInitialized);
    assert_eq!(py_rt_is_initialized(), 1);
    assert!(py_rt_live_objects() > 0);

    assert_eq!(py_gc_disable(), GCReturnCode::Success);
    assert_eq!(py_gc_is_enabled(), 0);
    assert_eq!(py_gc_enable(), GCReturnCode::Success);
    assert_eq!(py_gc_is_enabled(), 1);

    assert_eq!(py_gc_set_threshold(0, 500), GCReturnCode::Success);
    assert_eq!(py_gc_get_threshold(0), 500);
    assert_eq!(py_gc_set_threshold(3, 500), GCReturnCode::ErrorInvalidGeneration);
    assert_eq!(py_gc_get_threshold(5), -1);

    assert_eq!(py_gc_collect(), 0);
    assert_eq!(py_gc_collect_generation(1), 0);
    assert_eq!(py_gc_collect_generation(9), GCReturnCode::ErrorInvalidGeneration as i32);

    let mut stats = GCStats::default();
    assert_eq!(unsafe { py_gc_get_stats(&mut stats) }, GCReturnCode::Success);
    assert_eq!(stats.collections[2], 1);
    assert_eq!(stats.collections[1], 1);
    assert_eq!(unsafe { py_gc_get_stats(std::ptr::null_mut()) }, GCReturnCode::ErrorInternal);

    assert_eq!(py_gc_set_debug(0), GCReturnCode::Success);
    assert_eq!(py_gc_get_garbage_count(), 0);
    assert_eq!(py_err_occurred(), 0);
    assert_eq!(py_err_clear(), GCReturnCode::Success);

    let mut buffer = [0 as c_char; 128];
    let code = unsafe { py_gc_get_state_string(buffer.as_mut_ptr(), buffer.len()) };
    assert_eq!(code, GCReturnCode::Success);
    let state = unsafe { CStr::from_ptr(buffer.as_ptr()) }.to_str().unwrap();
    assert!(state.starts_with("GC State: enabled=true"));

    let mut tiny = [0 as c_char; 4];
    unsafe { py_gc_get_state_string(tiny.as_mut_ptr(), tiny.len()) };
    assert_eq!(unsafe { CStr::from_ptr(tiny.as_ptr()) }.to_bytes(), b"GC ");

    assert_eq!(py_rt_cleanup(), GCReturnCode::Success);
    assert_eq!(py_rt_cleanup(), GCReturnCode::ErrorNotInitialized);
    assert_eq!(py_rt_live_objects(), -1);
}
