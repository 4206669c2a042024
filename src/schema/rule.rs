use serde::{Deserialize, Serialize};

use super::beat::StoryBeat;
use super::metrics::{GameMetricsSnapshot, Metric};

/// `metric >= min`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdCondition {
    pub metric: Metric,
    pub min: u32,
}

impl ThresholdCondition {
    pub fn holds(&self, snapshot: &GameMetricsSnapshot) -> bool {
        snapshot.metric(self.metric) >= self.min
    }
}

/// A transition between two beats. All conditions must hold; among
/// satisfied rules from the same beat the lowest `priority` wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionRule {
    pub from: StoryBeat,
    pub to: StoryBeat,
    pub conditions: Vec<ThresholdCondition>,
    #[serde(default)]
    pub priority: u32,
}

impl ProgressionRule {
    /// A rule with no conditions is satisfied immediately.
    pub fn is_satisfied(&self, snapshot: &GameMetricsSnapshot) -> bool {
        self.conditions.iter().all(|c| c.holds(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_conditions_must_hold() {
        let rule = ProgressionRule {
            from: "hook".into(),
            to: "midpoint".into(),
            conditions: vec![
                ThresholdCondition {
                    metric: Metric::CompletedPuzzles,
                    min: 3,
                },
                ThresholdCondition {
                    metric: Metric::DiscoveredBooks,
                    min: 1,
                },
            ],
            priority: 0,
        };
        let mut snap = GameMetricsSnapshot::new("hook".into()).with_puzzles(3);
        assert!(!rule.is_satisfied(&snap));
        snap.discovered_books = 1;
        assert!(rule.is_satisfied(&snap));
    }

    #[test]
    fn rule_from_ron() {
        let rule: ProgressionRule = ron::from_str(
            r#"(from: "hook", to: "midpoint", conditions: [(metric: CompletedPuzzles, min: 3)])"#,
        )
        .unwrap();
        assert_eq!(rule.priority, 0);
        assert_eq!(rule.conditions[0].min, 3);
    }
}
