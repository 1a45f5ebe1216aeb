//! The process-wide runtime.
//!
//! Embedders that cannot thread a `&mut Runtime` through their own code keep
//! one runtime here. The mutex is the single exclusion mechanism for the
//! object graph: every access goes through [`with_runtime`].

use std::sync::Once;

use log::info;
use parking_lot::Mutex;

use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::runtime::{Runtime, ShutdownReport};
use crate::RuntimeResult;

static RUNTIME: Mutex<Option<Runtime>> = parking_lot::const_mutex(None);
static LOGGER: Once = Once::new();

/// Installs `env_logger` once; later calls are no-ops, as is a logger
/// installed by the host first.
pub fn init_logging() {
    LOGGER.call_once(|| {
        let _ = env_logger::Builder::from_default_env().try_init();
    });
}

pub fn init(config: RuntimeConfig) -> RuntimeResult<()> {
    let mut slot = RUNTIME.lock();
    if slot.is_some() {
        return Err(RuntimeError::AlreadyInitialized);
    }
    *slot = Some(Runtime::new(config));
    Ok(())
}

pub fn is_initialized() -> bool {
    RUNTIME.lock().is_some()
}

/// Runs `f` with exclusive access to the global runtime.
pub fn with_runtime<R>(f: impl FnOnce(&mut Runtime) -> R) -> RuntimeResult<R> {
    let mut slot = RUNTIME.lock();
    let rt = slot.as_mut().ok_or(RuntimeError::NotInitialized)?;
    Ok(f(rt))
}

/// Shuts the global runtime down. It can be initialised again afterwards.
pub fn teardown() -> RuntimeResult<ShutdownReport> {
    let rt = RUNTIME.lock().take().ok_or(RuntimeError::NotInitialized)?;
    let report = rt.shutdown();
    info!("global runtime torn down, {} object(s) leaked", report.leaked);
    Ok(report)
}
