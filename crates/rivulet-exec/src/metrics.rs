//! Per-call metrics hooks.
//!
//! Emitted as `tracing` events under the `rivulet::exec` target; wire them to
//! a subscriber or exporter in the binary layer.

use std::time::Duration;

pub fn record_call(kind: &'static str, operator: &str, args: usize) {
    tracing::debug!(target: "rivulet::exec", kind, operator, args, "operator call");
}

pub fn record_rejected(operator: &str, reason: &str) {
    tracing::debug!(target: "rivulet::exec", operator, reason, "operator call rejected");
}

pub fn record_function_done(operator: &str, elapsed: Duration, null: bool) {
    tracing::trace!(
        target: "rivulet::exec",
        operator,
        elapsed_us = elapsed.as_micros() as u64,
        null,
        "function finished"
    );
}
