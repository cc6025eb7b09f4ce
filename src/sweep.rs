//! Opportunistic removal of stale session records.
//!
//! A small fraction of hook invocations also sweep the store, deleting
//! records not written within the retention window. The sweep never affects
//! the decision of the invocation that runs it.

use crate::config::GateConfig;
use crate::error::Result;
use crate::traits::SessionStore;
use chrono::Utc;
use rand::Rng;

/// Whether this invocation should sweep, given the configured probability.
///
/// Values at or below zero (and NaN) never sweep; values at or above one
/// always do.
pub fn should_sweep<R: Rng + ?Sized>(probability: f64, rng: &mut R) -> bool {
    if probability.is_nan() || probability <= 0.0 {
        return false;
    }
    if probability >= 1.0 {
        return true;
    }
    rng.gen::<f64>() < probability
}

/// Delete every record older than the retention window, returning how many
/// were removed.
///
/// A window reaching back past the earliest representable date keeps
/// everything.
///
/// # Errors
///
/// Returns an error if the store cannot be scanned.
pub fn sweep_now(store: &dyn SessionStore, config: &GateConfig) -> Result<usize> {
    let Some(cutoff) = Utc::now().checked_sub_signed(config.retention()) else {
        return Ok(0);
    };
    store.sweep(cutoff)
}

/// Sweep with the configured probability.
///
/// Returns `None` when this invocation was not picked.
pub fn maybe_sweep<R: Rng + ?Sized>(
    store: &dyn SessionStore,
    config: &GateConfig,
    rng: &mut R,
) -> Option<Result<usize>> {
    should_sweep(config.sweep_probability, rng).then(|| sweep_now(store, config))
}
