//! Runtime Configuration
//!
//! Each thread owns one reactive runtime, and each runtime carries a small
//! [`RuntimeConfig`]. The defaults are fine for almost every program; the knobs
//! exist for tests and for hosts that want louder diagnostics.

use std::cell::Cell;

/// Tuning options for the current thread's reactive runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Maximum number of scheduling rounds a single flush may take before it
    /// is treated as an infinite update loop and abandoned.
    pub max_flush_rounds: usize,

    /// Log a warning when an effect is created outside of any owner.
    /// Such effects are never disposed automatically.
    pub warn_unowned_effects: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_flush_rounds: 1000,
            warn_unowned_effects: false,
        }
    }
}

thread_local! {
    static CONFIG: Cell<RuntimeConfig> = Cell::new(RuntimeConfig::default());
}

/// Replace the configuration of the current thread's runtime.
pub fn set_config(config: RuntimeConfig) {
    CONFIG.with(|cell| cell.set(config));
}

/// Get the configuration of the current thread's runtime.
pub fn config() -> RuntimeConfig {
    CONFIG.with(Cell::get)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
