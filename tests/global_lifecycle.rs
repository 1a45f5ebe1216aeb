use python_runtime::{global, RuntimeConfig, RuntimeError};

// One test: the global runtime is process state.
#[test]
fn test_global_runtime_lifecycle() {
    global::init_logging();
    global::init_logging();

    assert!(!global::is_initialized());
    assert_eq!(
        global::with_runtime(|rt| rt.live_objects()).unwrap_err(),
        RuntimeError::NotInitialized
    );
    assert_eq!(global::teardown().unwrap_err(), RuntimeError::NotInitialized);

    global::init(RuntimeConfig::default()).unwrap();
    assert_eq!(
        global::init(RuntimeConfig::default()).unwrap_err(),
        RuntimeError::AlreadyInitialized
    );

    let collected = global::with_runtime(|rt| {
        let a = rt.new_list(&[]);
        rt.list_append(a, a).unwrap();
        rt.release(a);
        rt.gc_collect(None).unwrap()
    })
    .unwrap();
    assert_eq!(collected, 1);

    let report = global::teardown().unwrap();
    assert_eq!(report.leaked, 0);
    assert!(!global::is_initialized());

    // A fresh runtime can be brought up again.
    global::init(RuntimeConfig::default().with_gc_enabled(false)).unwrap();
    assert!(!global::with_runtime(|rt| rt.gc_is_enabled()).unwrap());
    global::teardown().unwrap();
}
