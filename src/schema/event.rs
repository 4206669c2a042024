use serde::{Deserialize, Serialize};
use std::fmt;

use super::beat::BeatScope;
use super::character::CharacterId;
use super::trigger::TriggerPredicate;

/// Newtype wrapper for narrative event IDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub String);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One spoken line of a scripted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueLine {
    pub speaker: CharacterId,
    pub text: String,
}

/// A scripted, multi-speaker dialogue sequence bound to one trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeEvent {
    pub id: EventId,
    pub beat: BeatScope,
    pub lines: Vec<DialogueLine>,
    pub characters: Vec<CharacterId>,
    pub trigger: TriggerPredicate,
}

impl NarrativeEvent {
    /// Speakers in order of first appearance, merged with the declared
    /// participant list.
    pub fn speakers(&self) -> Vec<&CharacterId> {
        let mut out: Vec<&CharacterId> = Vec::new();
        for id in self
            .characters
            .iter()
            .chain(self.lines.iter().map(|l| &l.speaker))
        {
            if !out.contains(&id) {
                out.push(id);
            }
        }
        out
    }
}
