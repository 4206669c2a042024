/// Event/banter catalog — content loading, validation, and lookup.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::progression::rule_issue;
use crate::schema::banter::BanterLine;
use crate::schema::beat::{BeatOrder, BeatScope, StoryBeat};
use crate::schema::character::{Character, CharacterId};
use crate::schema::event::{DialogueLine, EventId, NarrativeEvent};
use crate::schema::rule::ProgressionRule;
use crate::schema::trigger::{PredicateError, TriggerPredicate};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("catalog declares no story beats")]
    NoBeats,
}

/// A problem found in loaded content. Every issue is logged; the offending
/// item is skipped unless noted otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentIssue {
    #[error("event '{event}': bad trigger '{trigger}': {error}")]
    BadTrigger {
        event: EventId,
        trigger: String,
        error: PredicateError,
    },
    #[error("event '{event}': unknown beat '{beat}'")]
    EventUnknownBeat { event: EventId, beat: StoryBeat },
    #[error("event '{0}': empty dialogue list")]
    EmptyDialogue(EventId),
    #[error("event '{0}': duplicate id, later definition ignored")]
    DuplicateEvent(EventId),
    /// Kept: playback skips the line.
    #[error("event '{event}': line {line} references unknown character '{character}'")]
    MissingSpeaker {
        event: EventId,
        line: usize,
        character: CharacterId,
    },
    #[error("banter for '{character}': unknown beat in availability window")]
    BanterUnknownBeat { character: CharacterId },
    #[error("banter references unknown character '{0}'")]
    BanterUnknownCharacter(CharacterId),
    #[error("rule {from} -> {to}: unknown beat")]
    RuleUnknownBeat { from: StoryBeat, to: StoryBeat },
    #[error("rule {from} -> {to}: leaves the terminal beat")]
    RuleFromTerminal { from: StoryBeat, to: StoryBeat },
}

impl ContentIssue {
    /// Returns true if the issue removed content from the catalog.
    pub fn is_skip(&self) -> bool {
        !matches!(self, Self::MissingSpeaker { .. })
    }
}

/// Catalog content as written in RON. Triggers are still raw identifiers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawCatalog {
    #[serde(default)]
    pub beats: Vec<StoryBeat>,
    #[serde(default)]
    pub characters: Vec<Character>,
    #[serde(default)]
    pub events: Vec<RawEvent>,
    #[serde(default)]
    pub banter: Vec<BanterLine>,
    #[serde(default)]
    pub rules: Vec<ProgressionRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    pub id: EventId,
    /// `None` means the event is available at any beat.
    #[serde(default)]
    pub beat: Option<StoryBeat>,
    pub trigger: String,
    #[serde(default)]
    pub characters: Vec<CharacterId>,
    #[serde(default)]
    pub lines: Vec<DialogueLine>,
}

impl RawCatalog {
    pub fn load_from_ron(path: &Path) -> Result<RawCatalog, CatalogError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<RawCatalog, CatalogError> {
        Ok(ron::from_str(input)?)
    }

    /// Merge another catalog into this one. Characters and events from
    /// `other` override those with the same id; banter and rules append;
    /// a non-empty beat list in `other` replaces ours.
    pub fn merge(&mut self, other: RawCatalog) {
        if !other.beats.is_empty() {
            self.beats = other.beats;
        }
        for character in other.characters {
            match self.characters.iter_mut().find(|c| c.id == character.id) {
                Some(existing) => *existing = character,
                None => self.characters.push(character),
            }
        }
        for event in other.events {
            match self.events.iter_mut().find(|e| e.id == event.id) {
                Some(existing) => *existing = event,
                None => self.events.push(event),
            }
        }
        self.banter.extend(other.banter);
        self.rules.extend(other.rules);
    }
}

/// Validated, read-only narrative content.
#[derive(Debug, Clone)]
pub struct Catalog {
    beats: BeatOrder,
    characters: Vec<Character>,
    character_index: FxHashMap<CharacterId, usize>,
    events: Vec<NarrativeEvent>,
    event_index: FxHashMap<EventId, usize>,
    banter: Vec<BanterLine>,
    rules: Vec<ProgressionRule>,
}

impl Catalog {
    /// Validate raw content, logging and skipping malformed entries.
    pub fn from_raw(raw: RawCatalog) -> Result<Catalog, CatalogError> {
        Self::validate(raw).map(|(catalog, _)| catalog)
    }

    /// Like [`Catalog::from_raw`] but also returns every issue found.
    pub fn validate(raw: RawCatalog) -> Result<(Catalog, Vec<ContentIssue>), CatalogError> {
        let beats = BeatOrder::new(raw.beats);
        if beats.is_empty() {
            return Err(CatalogError::NoBeats);
        }

        let mut issues = Vec::new();

        let mut characters = Vec::with_capacity(raw.characters.len());
        let mut character_index = FxHashMap::default();
        for character in raw.characters {
            if character_index.contains_key(&character.id) {
                tracing::warn!(character = %character.id, "duplicate character ignored");
                continue;
            }
            character_index.insert(character.id.clone(), characters.len());
            characters.push(character);
        }

        let mut events = Vec::with_capacity(raw.events.len());
        let mut event_index = FxHashMap::default();
        for raw_event in raw.events {
            let id = raw_event.id.clone();
            if event_index.contains_key(&id) {
                issues.push(ContentIssue::DuplicateEvent(id));
                continue;
            }
            let trigger = match TriggerPredicate::parse(&raw_event.trigger) {
                Ok(t) => t,
                Err(error) => {
                    issues.push(ContentIssue::BadTrigger {
                        event: id,
                        trigger: raw_event.trigger,
                        error,
                    });
                    continue;
                }
            };
            if let Some(beat) = &raw_event.beat {
                if !beats.contains(beat) {
                    issues.push(ContentIssue::EventUnknownBeat {
                        event: id,
                        beat: beat.clone(),
                    });
                    continue;
                }
            }
            if raw_event.lines.is_empty() {
                issues.push(ContentIssue::EmptyDialogue(id));
                continue;
            }
            for (line, dialogue) in raw_event.lines.iter().enumerate() {
                if !character_index.contains_key(&dialogue.speaker) {
                    issues.push(ContentIssue::MissingSpeaker {
                        event: id.clone(),
                        line,
                        character: dialogue.speaker.clone(),
                    });
                }
            }
            event_index.insert(id.clone(), events.len());
            events.push(NarrativeEvent {
                id,
                beat: BeatScope::from(raw_event.beat),
                lines: raw_event.lines,
                characters: raw_event.characters,
                trigger,
            });
        }

        let mut banter = Vec::with_capacity(raw.banter.len());
        for line in raw.banter {
            if !character_index.contains_key(&line.character) {
                issues.push(ContentIssue::BanterUnknownCharacter(line.character));
                continue;
            }
            if !line.window.is_known(&beats) {
                issues.push(ContentIssue::BanterUnknownBeat {
                    character: line.character,
                });
                continue;
            }
            banter.push(line);
        }

        let mut rules = Vec::with_capacity(raw.rules.len());
        for rule in raw.rules {
            match rule_issue(&rule, &beats) {
                Some(issue) => issues.push(issue),
                None => rules.push(rule),
            }
        }

        for issue in &issues {
            tracing::warn!(%issue, "content issue");
        }

        Ok((
            Catalog {
                beats,
                characters,
                character_index,
                events,
                event_index,
                banter,
                rules,
            },
            issues,
        ))
    }

    pub fn parse_ron(input: &str) -> Result<Catalog, CatalogError> {
        Self::from_raw(RawCatalog::parse_ron(input)?)
    }

    pub fn beats(&self) -> &BeatOrder {
        &self.beats
    }

    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    pub fn character(&self, id: &CharacterId) -> Option<&Character> {
        self.character_index.get(id).map(|&i| &self.characters[i])
    }

    pub fn events(&self) -> &[NarrativeEvent] {
        &self.events
    }

    pub fn event(&self, id: &EventId) -> Option<&NarrativeEvent> {
        self.event_index.get(id).map(|&i| &self.events[i])
    }

    pub fn banter(&self) -> &[BanterLine] {
        &self.banter
    }

    pub fn rules(&self) -> &[ProgressionRule] {
        &self.rules
    }
}

/// Source of narrative content. Called once at startup and again on reload.
pub trait ContentStore {
    fn load_catalog(&self) -> Result<Catalog, CatalogError>;
}

/// Loads a catalog from a RON file, or merges every `.ron` file in a
/// directory in file-name order.
#[derive(Debug, Clone)]
pub struct RonContentStore {
    path: PathBuf,
}

impl RonContentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load_raw(&self) -> Result<RawCatalog, CatalogError> {
        if self.path.is_dir() {
            let mut files = Vec::new();
            for entry in std::fs::read_dir(&self.path)? {
                let path = entry?.path();
                if path.extension().and_then(|s| s.to_str()) == Some("ron") {
                    files.push(path);
                }
            }
            files.sort();
            let mut raw = RawCatalog::default();
            for file in files {
                raw.merge(RawCatalog::load_from_ron(&file)?);
            }
            Ok(raw)
        } else {
            RawCatalog::load_from_ron(&self.path)
        }
    }
}

impl ContentStore for RonContentStore {
    fn load_catalog(&self) -> Result<Catalog, CatalogError> {
        Catalog::from_raw(self.load_raw()?)
    }
}

/// In-memory content, for tests and embedded data.
#[derive(Debug, Clone, Default)]
pub struct StaticContent(pub RawCatalog);

impl ContentStore for StaticContent {
    fn load_catalog(&self) -> Result<Catalog, CatalogError> {
        Catalog::from_raw(self.0.clone())
    }
}
