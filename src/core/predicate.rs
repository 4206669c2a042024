/// Condition evaluator — pure trigger checks over progress snapshots.
///
/// With a previous snapshot the check runs in transition mode and is true
/// only when the condition just became true. Without one it runs in
/// snapshot mode and reports whether the condition holds right now.
use crate::schema::metrics::GameMetricsSnapshot;
use crate::schema::trigger::TriggerPredicate;

/// Evaluate a parsed predicate. Total: never panics, never errors.
pub fn evaluate(
    predicate: &TriggerPredicate,
    current: &GameMetricsSnapshot,
    previous: Option<&GameMetricsSnapshot>,
) -> bool {
    match predicate {
        TriggerPredicate::ExactCount { metric } => {
            let now = current.metric(*metric) == 1;
            match previous {
                Some(prev) => now && prev.metric(*metric) == 0,
                None => now,
            }
        }
        TriggerPredicate::Threshold { metric, at } => {
            let now = current.metric(*metric) >= *at;
            match previous {
                Some(prev) => now && prev.metric(*metric) < *at,
                None => now,
            }
        }
        TriggerPredicate::GroupComplete { group } => {
            let now = current.group_complete(group);
            match previous {
                Some(prev) => now && !prev.group_complete(group),
                None => now,
            }
        }
        // Flags are one-off external booleans with no transition semantics.
        TriggerPredicate::Flag { name } => current.has_flag(name),
    }
}

/// Parse and evaluate a raw identifier. Malformed identifiers fail closed.
pub fn evaluate_identifier(
    identifier: &str,
    current: &GameMetricsSnapshot,
    previous: Option<&GameMetricsSnapshot>,
) -> bool {
    match TriggerPredicate::parse(identifier) {
        Ok(predicate) => evaluate(&predicate, current, previous),
        Err(e) => {
            tracing::warn!(identifier, error = %e, "malformed trigger evaluates false");
            false
        }
    }
}
