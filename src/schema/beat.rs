use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Opaque identifier of a narrative stage. Ordering comes from a
/// [`BeatOrder`], never from the identifier itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoryBeat(pub String);

impl StoryBeat {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoryBeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StoryBeat {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Which beat owns an event. `Any` events are candidates at every beat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BeatScope {
    #[default]
    Any,
    Beat(StoryBeat),
}

impl BeatScope {
    /// Returns true if this scope admits the given beat.
    pub fn admits(&self, beat: &StoryBeat) -> bool {
        match self {
            Self::Any => true,
            Self::Beat(own) => own == beat,
        }
    }
}

impl From<Option<StoryBeat>> for BeatScope {
    fn from(beat: Option<StoryBeat>) -> Self {
        match beat {
            Some(b) => Self::Beat(b),
            None => Self::Any,
        }
    }
}

/// The fixed, totally ordered list of story beats for a session.
#[derive(Debug, Clone, Default)]
pub struct BeatOrder {
    beats: Vec<StoryBeat>,
    positions: FxHashMap<StoryBeat, usize>,
}

impl BeatOrder {
    /// Build an order from a list. Repeated beats keep their first position.
    pub fn new(beats: impl IntoIterator<Item = StoryBeat>) -> Self {
        let mut order = Self::default();
        for beat in beats {
            if order.positions.contains_key(&beat) {
                tracing::warn!(beat = %beat, "duplicate story beat ignored");
                continue;
            }
            order.positions.insert(beat.clone(), order.beats.len());
            order.beats.push(beat);
        }
        order
    }

    pub fn len(&self) -> usize {
        self.beats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beats.is_empty()
    }

    pub fn beats(&self) -> &[StoryBeat] {
        &self.beats
    }

    pub fn first(&self) -> Option<&StoryBeat> {
        self.beats.first()
    }

    /// The terminal beat. No progression rule may leave it.
    pub fn last(&self) -> Option<&StoryBeat> {
        self.beats.last()
    }

    pub fn contains(&self, beat: &StoryBeat) -> bool {
        self.positions.contains_key(beat)
    }

    pub fn position(&self, beat: &StoryBeat) -> Option<usize> {
        self.positions.get(beat).copied()
    }

    pub fn is_terminal(&self, beat: &StoryBeat) -> bool {
        self.last() == Some(beat)
    }

    /// Compare two beats by story order. `None` if either is unknown.
    pub fn compare(&self, a: &StoryBeat, b: &StoryBeat) -> Option<Ordering> {
        Some(self.position(a)?.cmp(&self.position(b)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> BeatOrder {
        BeatOrder::new(["hook", "midpoint", "end"].map(StoryBeat::from))
    }

    #[test]
    fn positions_follow_declaration() {
        let order = order();
        assert_eq!(order.len(), 3);
        assert_eq!(order.position(&"hook".into()), Some(0));
        assert_eq!(order.position(&"end".into()), Some(2));
        assert_eq!(order.position(&"epilogue".into()), None);
    }

    #[test]
    fn first_and_terminal() {
        let order = order();
        assert_eq!(order.first(), Some(&StoryBeat::from("hook")));
        assert!(order.is_terminal(&"end".into()));
        assert!(!order.is_terminal(&"midpoint".into()));
    }

    #[test]
    fn compare_by_story_order() {
        let order = order();
        assert_eq!(
            order.compare(&"midpoint".into(), &"hook".into()),
            Some(Ordering::Greater)
        );
        assert_eq!(order.compare(&"hook".into(), &"nowhere".into()), None);
    }

    #[test]
    fn duplicates_keep_first_position() {
        let order = BeatOrder::new(["a", "b", "a"].map(StoryBeat::from));
        assert_eq!(order.len(), 2);
        assert_eq!(order.position(&"a".into()), Some(0));
    }

    #[test]
    fn scope_admits() {
        assert!(BeatScope::Any.admits(&"hook".into()));
        assert!(BeatScope::Beat("hook".into()).admits(&"hook".into()));
        assert!(!BeatScope::Beat("hook".into()).admits(&"end".into()));
    }
}
