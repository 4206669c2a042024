/// Progression state machine — advances the current story beat when a
/// rule's thresholds are met.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::core::catalog::ContentIssue;
use crate::schema::beat::{BeatOrder, StoryBeat};
use crate::schema::metrics::GameMetricsSnapshot;
use crate::schema::rule::ProgressionRule;

/// A beat change, reported to subscribers as `(previous, new)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeatTransition {
    pub from: StoryBeat,
    pub to: StoryBeat,
}

/// Returns the reason a rule cannot be used with `order`, if any.
pub fn rule_issue(rule: &ProgressionRule, order: &BeatOrder) -> Option<ContentIssue> {
    if !order.contains(&rule.from) || !order.contains(&rule.to) {
        return Some(ContentIssue::RuleUnknownBeat {
            from: rule.from.clone(),
            to: rule.to.clone(),
        });
    }
    if order.is_terminal(&rule.from) {
        return Some(ContentIssue::RuleFromTerminal {
            from: rule.from.clone(),
            to: rule.to.clone(),
        });
    }
    None
}

#[derive(Debug, Clone)]
pub struct ProgressionMachine {
    order: BeatOrder,
    /// Rules keyed by `from` beat, in declaration order.
    rules: FxHashMap<StoryBeat, Vec<ProgressionRule>>,
    current: StoryBeat,
}

impl ProgressionMachine {
    /// Build a machine starting at the first beat. Rules naming unknown
    /// beats or leaving the terminal beat are logged and dropped.
    /// Returns `None` if `order` is empty.
    pub fn new(order: BeatOrder, rules: &[ProgressionRule]) -> Option<ProgressionMachine> {
        let current = order.first()?.clone();
        let mut by_beat: FxHashMap<StoryBeat, Vec<ProgressionRule>> = FxHashMap::default();
        for rule in rules {
            if let Some(issue) = rule_issue(rule, &order) {
                tracing::warn!(%issue, "progression rule rejected");
                continue;
            }
            by_beat
                .entry(rule.from.clone())
                .or_default()
                .push(rule.clone());
        }
        Some(ProgressionMachine {
            order,
            rules: by_beat,
            current,
        })
    }

    pub fn current(&self) -> &StoryBeat {
        &self.current
    }

    pub fn order(&self) -> &BeatOrder {
        &self.order
    }

    pub fn is_terminal(&self) -> bool {
        self.order.is_terminal(&self.current)
    }

    /// Set the current beat from persisted state. Unknown beats are
    /// rejected and the machine stays where it is.
    pub fn restore(&mut self, beat: &StoryBeat) -> bool {
        if !self.order.contains(beat) {
            tracing::warn!(%beat, "cannot restore unknown beat");
            return false;
        }
        self.current = beat.clone();
        true
    }

    /// Pick the rule that would fire for `snapshot` without applying it.
    ///
    /// Lowest priority number wins. Equal priorities are a content hazard:
    /// the first by declaration order wins and a warning is logged.
    pub fn select(&self, snapshot: &GameMetricsSnapshot) -> Option<&ProgressionRule> {
        let candidates = self.rules.get(&self.current)?;
        let mut best: Option<&ProgressionRule> = None;
        let mut tied = false;
        for rule in candidates.iter().filter(|r| r.is_satisfied(snapshot)) {
            match best {
                None => best = Some(rule),
                Some(b) if rule.priority < b.priority => {
                    best = Some(rule);
                    tied = false;
                }
                Some(b) if rule.priority == b.priority => tied = true,
                Some(_) => {}
            }
        }
        if tied {
            if let Some(b) = best {
                tracing::warn!(
                    from = %b.from,
                    to = %b.to,
                    priority = b.priority,
                    "several satisfied rules share a priority; using first declared"
                );
            }
        }
        best
    }

    /// Apply at most one transition for this update.
    pub fn evaluate(&mut self, snapshot: &GameMetricsSnapshot) -> Option<BeatTransition> {
        let to = self.select(snapshot)?.to.clone();
        let from = std::mem::replace(&mut self.current, to.clone());
        tracing::info!(%from, %to, "story beat transition");
        Some(BeatTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::metrics::Metric;
    use crate::schema::rule::ThresholdCondition;

    fn order() -> BeatOrder {
        BeatOrder::new(["hook", "midpoint", "end"].map(StoryBeat::from))
    }

    fn rule(from: &str, to: &str, puzzles: u32, priority: u32) -> ProgressionRule {
        ProgressionRule {
            from: from.into(),
            to: to.into(),
            conditions: vec![ThresholdCondition {
                metric: Metric::CompletedPuzzles,
                min: puzzles,
            }],
            priority,
        }
    }

    fn snap(puzzles: u32) -> GameMetricsSnapshot {
        GameMetricsSnapshot::new("hook".into()).with_puzzles(puzzles)
    }

    #[test]
    fn starts_at_first_beat() {
        let machine = ProgressionMachine::new(order(), &[]).unwrap();
        assert_eq!(machine.current(), &StoryBeat::from("hook"));
        assert!(ProgressionMachine::new(BeatOrder::default(), &[]).is_none());
    }

    #[test]
    fn transitions_exactly_once() {
        let mut machine =
            ProgressionMachine::new(order(), &[rule("hook", "midpoint", 3, 0)]).unwrap();
        assert_eq!(machine.evaluate(&snap(2)), None);
        assert_eq!(
            machine.evaluate(&snap(3)),
            Some(BeatTransition {
                from: "hook".into(),
                to: "midpoint".into()
            })
        );
        assert_eq!(machine.evaluate(&snap(3)), None);
        assert_eq!(machine.current(), &StoryBeat::from("midpoint"));
    }

    #[test]
    fn lowest_priority_wins() {
        let mut machine = ProgressionMachine::new(
            order(),
            &[rule("hook", "midpoint", 1, 5), rule("hook", "end", 1, 2)],
        )
        .unwrap();
        assert_eq!(machine.evaluate(&snap(1)).unwrap().to, StoryBeat::from("end"));
        assert!(machine.is_terminal());
    }

    #[test]
    fn ties_pick_first_declared() {
        let mut machine = ProgressionMachine::new(
            order(),
            &[rule("hook", "end", 1, 1), rule("hook", "midpoint", 1, 1)],
        )
        .unwrap();
        assert_eq!(machine.evaluate(&snap(1)).unwrap().to, StoryBeat::from("end"));
    }

    #[test]
    fn unsatisfied_higher_priority_is_ignored() {
        let mut machine = ProgressionMachine::new(
            order(),
            &[rule("hook", "end", 10, 0), rule("hook", "midpoint", 1, 9)],
        )
        .unwrap();
        assert_eq!(
            machine.evaluate(&snap(2)).unwrap().to,
            StoryBeat::from("midpoint")
        );
    }

    #[test]
    fn invalid_rules_dropped() {
        let machine = ProgressionMachine::new(
            order(),
            &[rule("end", "hook", 0, 0), rule("hook", "nowhere", 0, 0)],
        )
        .unwrap();
        assert!(machine.select(&snap(100)).is_none());
    }

    #[test]
    fn restore_known_beat_only() {
        let mut machine = ProgressionMachine::new(order(), &[]).unwrap();
        assert!(machine.restore(&"midpoint".into()));
        assert!(!machine.restore(&"epilogue".into()));
        assert_eq!(machine.current(), &StoryBeat::from("midpoint"));
    }
}
