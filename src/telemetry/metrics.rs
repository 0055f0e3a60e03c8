//! Metric instrument factories for reducer-rs.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without a configured provider these are no-ops.

use opentelemetry::metrics::{Counter, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("reducer-rs")
}

/// Counter: actions dispatched.
/// Labels: `engine`.
pub fn actions_dispatched() -> Counter<u64> {
    meter()
        .u64_counter("reducer.actions.dispatched")
        .with_description("Number of actions dispatched")
        .build()
}

/// Counter: in-flight work cancelled because a newer dispatch superseded it.
/// Labels: `engine`.
pub fn work_cancelled() -> Counter<u64> {
    meter()
        .u64_counter("reducer.work.cancelled")
        .with_description("Number of work units cancelled by policy")
        .build()
}

/// Counter: mutations reduced into state.
/// Labels: `engine`.
pub fn mutations_applied() -> Counter<u64> {
    meter()
        .u64_counter("reducer.mutations.applied")
        .with_description("Number of mutations applied to state")
        .build()
}

/// Counter: errors returned by behavior hooks.
/// Labels: `engine`, `hook` ("start" | "mutate").
pub fn behavior_errors() -> Counter<u64> {
    meter()
        .u64_counter("reducer.behavior.errors")
        .with_description("Errors returned by behavior hooks")
        .build()
}
