//! Work execution span helpers.
//!
//! Every work unit the engine spawns (the behavior's `start` hook and each
//! dispatched action) runs inside one of these spans.

use tracing::Span;

use crate::registry::WorkId;

/// Start a span for one work unit.
///
/// `kind` is `"start"` or `"action"`. The `work.outcome` field is declared
/// empty and filled by [`record_work_outcome`]; cancelled work never records
/// one.
pub fn start_work_span(engine: &str, kind: &'static str, work_id: &WorkId) -> Span {
    tracing::info_span!(
        "work.execute",
        "engine.name" = engine,
        "work.kind" = kind,
        "work.id" = %work_id.0,
        "work.outcome" = tracing::field::Empty,
    )
}

/// Record how a work unit ended ("completed" | "failed").
pub fn record_work_outcome(span: &Span, outcome: &'static str) {
    span.record("work.outcome", outcome);
}
