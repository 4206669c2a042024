use serde::{Deserialize, Serialize};

use super::beat::{BeatOrder, StoryBeat};
use super::character::CharacterId;

/// Inclusive range of beats during which a banter line may be shown.
/// An open `until` means "from `from` to the end of the story".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub from: StoryBeat,
    #[serde(default)]
    pub until: Option<StoryBeat>,
}

impl AvailabilityWindow {
    /// Returns true if `beat` falls inside the window. Any unknown beat
    /// (in the window or the query) excludes the line.
    pub fn contains(&self, beat: &StoryBeat, order: &BeatOrder) -> bool {
        let (Some(at), Some(from)) = (order.position(beat), order.position(&self.from)) else {
            return false;
        };
        if at < from {
            return false;
        }
        match &self.until {
            None => true,
            Some(until) => order.position(until).is_some_and(|u| at <= u),
        }
    }

    /// Returns true if every beat named by the window is known.
    pub fn is_known(&self, order: &BeatOrder) -> bool {
        order.contains(&self.from) && self.until.as_ref().map_or(true, |u| order.contains(u))
    }
}

/// A single-speaker filler line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanterLine {
    pub character: CharacterId,
    pub text: String,
    #[serde(default)]
    pub emotions: Vec<String>,
    #[serde(default)]
    pub category: String,
    pub window: AvailabilityWindow,
}
