//! Optional metrics instrumentation for dupdb.
//!
//! When the `observe` feature is enabled, transactions, cursor walks and
//! opens emit counters and histograms via the [`metrics`] crate. A downstream
//! application must install a metrics recorder to collect the data.
//!
//! When the feature is **not** enabled every function in this module is a
//! zero-cost no-op.

use crate::types::TxMode;

fn mode_label(mode: TxMode) -> &'static str {
    match mode {
        TxMode::ReadOnly => "readonly",
        TxMode::ReadWrite => "readwrite",
    }
}

/// Record a committed session transaction.
///
/// - `dupdb.transaction.commits_total` – counter with `mode` label
/// - `dupdb.transaction.duration_seconds` – histogram
#[inline]
pub fn record_commit(mode: TxMode, duration: std::time::Duration) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("dupdb.transaction.commits_total", "mode" => mode_label(mode))
            .increment(1);
        metrics::histogram!("dupdb.transaction.duration_seconds")
            .record(duration.as_secs_f64());
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = (mode_label(mode), duration);
    }
}

/// Record an aborted session transaction.
///
/// - `dupdb.transaction.aborts_total` – counter with `mode` label
#[inline]
pub fn record_abort(mode: TxMode) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("dupdb.transaction.aborts_total", "mode" => mode_label(mode))
            .increment(1);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = mode_label(mode);
    }
}

/// Record a finished cursor walk.
///
/// - `dupdb.cursor.walks_total` – counter with `outcome` label
/// - `dupdb.cursor.items_total` – counter of positions visited
#[inline]
pub fn record_cursor_walk(items: u64, success: bool) {
    #[cfg(feature = "observe")]
    {
        let outcome = if success { "ok" } else { "fail" };
        metrics::counter!("dupdb.cursor.walks_total", "outcome" => outcome).increment(1);
        metrics::counter!("dupdb.cursor.items_total").increment(items);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = (items, success);
    }
}

/// Record a database open.
///
/// - `dupdb.open.total` – counter with `outcome` label (`ok`, `blocked`, `fail`)
/// - `dupdb.open.migrations_total` – legacy databases migrated on open
#[inline]
pub fn record_open(outcome: &'static str, migrated: bool) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("dupdb.open.total", "outcome" => outcome).increment(1);
        if migrated {
            metrics::counter!("dupdb.open.migrations_total").increment(1);
        }
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = (outcome, migrated);
    }
}
