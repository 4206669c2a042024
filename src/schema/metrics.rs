use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::beat::StoryBeat;

/// A numeric progress counter that predicates and progression rules can test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    CompletedPuzzles,
    DiscoveredBooks,
    CompletedBooks,
    CompletedGroups,
}

impl Metric {
    /// Returns the identifier used in trigger strings (e.g., "puzzles").
    pub fn name(&self) -> &'static str {
        match self {
            Self::CompletedPuzzles => "puzzles",
            Self::DiscoveredBooks => "books_discovered",
            Self::CompletedBooks => "books_completed",
            Self::CompletedGroups => "groups_completed",
        }
    }

    pub fn from_name(name: &str) -> Option<Metric> {
        match name {
            "puzzles" => Some(Self::CompletedPuzzles),
            "books_discovered" => Some(Self::DiscoveredBooks),
            "books_completed" => Some(Self::CompletedBooks),
            "groups_completed" => Some(Self::CompletedGroups),
            _ => None,
        }
    }
}

/// Completion state of one category group (e.g., every puzzle in a book).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupProgress {
    pub items: BTreeSet<String>,
    #[serde(default)]
    pub completed: BTreeSet<String>,
}

impl GroupProgress {
    /// A group is complete when it has members and all of them are done.
    /// An empty group never counts as complete.
    pub fn is_complete(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(|i| self.completed.contains(i))
    }
}

/// Player progress at a point in time. Two snapshots (previous, current)
/// are compared to detect milestones that just became true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameMetricsSnapshot {
    #[serde(default)]
    pub completed_puzzles: u32,
    #[serde(default)]
    pub discovered_books: u32,
    #[serde(default)]
    pub completed_books: u32,
    #[serde(default)]
    pub groups: BTreeMap<String, GroupProgress>,
    #[serde(default)]
    pub flags: BTreeSet<String>,
    pub current_beat: StoryBeat,
}

impl GameMetricsSnapshot {
    /// An all-zero snapshot positioned at `beat`.
    pub fn new(beat: StoryBeat) -> Self {
        Self {
            completed_puzzles: 0,
            discovered_books: 0,
            completed_books: 0,
            groups: BTreeMap::new(),
            flags: BTreeSet::new(),
            current_beat: beat,
        }
    }

    pub fn metric(&self, metric: Metric) -> u32 {
        match metric {
            Metric::CompletedPuzzles => self.completed_puzzles,
            Metric::DiscoveredBooks => self.discovered_books,
            Metric::CompletedBooks => self.completed_books,
            Metric::CompletedGroups => self
                .groups
                .values()
                .filter(|g| g.is_complete())
                .count() as u32,
        }
    }

    /// Unknown groups are treated as incomplete.
    pub fn group_complete(&self, group: &str) -> bool {
        self.groups.get(group).is_some_and(GroupProgress::is_complete)
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    pub fn with_puzzles(mut self, completed: u32) -> Self {
        self.completed_puzzles = completed;
        self
    }

    pub fn with_flag(mut self, flag: &str) -> Self {
        self.flags.insert(flag.to_string());
        self
    }

    pub fn with_group(mut self, name: &str, items: &[&str], completed: &[&str]) -> Self {
        self.groups.insert(
            name.to_string(),
            GroupProgress {
                items: items.iter().map(|s| s.to_string()).collect(),
                completed: completed.iter().map(|s| s.to_string()).collect(),
            },
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_round_trip() {
        for metric in [
            Metric::CompletedPuzzles,
            Metric::DiscoveredBooks,
            Metric::CompletedBooks,
            Metric::CompletedGroups,
        ] {
            assert_eq!(Metric::from_name(metric.name()), Some(metric));
        }
        assert_eq!(Metric::from_name("coins"), None);
    }

    #[test]
    fn group_completion() {
        let snap = GameMetricsSnapshot::new("hook".into())
            .with_group("book_one", &["a", "b"], &["a", "b"])
            .with_group("book_two", &["c", "d"], &["c"])
            .with_group("empty", &[], &[]);
        assert!(snap.group_complete("book_one"));
        assert!(!snap.group_complete("book_two"));
        assert!(!snap.group_complete("empty"));
        assert!(!snap.group_complete("missing"));
        assert_eq!(snap.metric(Metric::CompletedGroups), 1);
    }

    #[test]
    fn flags_and_counts() {
        let snap = GameMetricsSnapshot::new("hook".into())
            .with_puzzles(4)
            .with_flag("tutorial_done");
        assert_eq!(snap.metric(Metric::CompletedPuzzles), 4);
        assert!(snap.has_flag("tutorial_done"));
        assert!(!snap.has_flag("credits_seen"));
    }
}
