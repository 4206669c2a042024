/// Playback sequencer — streams a narrative event one speaker line at a
/// time, driven by external continue/abort signals.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::core::catalog::Catalog;
use crate::core::paginate::paginate;
use crate::schema::character::{Character, CharacterId};
use crate::schema::event::{EventId, NarrativeEvent};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("a session for '{0}' is still active; abort it first")]
    Busy(EventId),
    #[error("unknown narrative event '{0}'")]
    UnknownEvent(EventId),
    #[error("requested event '{requested}' but resolved '{resolved}'")]
    IdMismatch { requested: EventId, resolved: EventId },
    #[error("no event loaded")]
    NotLoaded,
    #[error("playback already started")]
    AlreadyStarted,
}

/// Read access to the content a session plays from.
pub trait ContentLookup {
    fn event(&self, id: &EventId) -> Option<&NarrativeEvent>;
    fn character(&self, id: &CharacterId) -> Option<&Character>;
}

impl ContentLookup for Catalog {
    fn event(&self, id: &EventId) -> Option<&NarrativeEvent> {
        Catalog::event(self, id)
    }

    fn character(&self, id: &CharacterId) -> Option<&Character> {
        Catalog::character(self, id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaybackState {
    Idle,
    Loaded,
    Playing,
    Completed,
    Aborted,
}

/// A display-ready line for the presentation surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DialogueEntry {
    /// `<event id>#<line index>`, unique within a catalog.
    pub id: String,
    pub character: Character,
    pub full_text: String,
    pub pages: Vec<String>,
    pub current_page_index: usize,
}

impl DialogueEntry {
    pub fn current_page(&self) -> &str {
        self.pages
            .get(self.current_page_index)
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn has_more_pages(&self) -> bool {
        self.current_page_index + 1 < self.pages.len()
    }
}

/// Result of a `start`/`advance` signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackStep {
    Entry(DialogueEntry),
    /// Lines ran out. Reported exactly once per session.
    Completed(EventId),
    /// The session is paused; the cursor did not move.
    Paused,
    /// Nothing left to do; the session already completed.
    Finished,
}

struct PlaybackSession {
    content: Arc<dyn ContentLookup>,
    event: NarrativeEvent,
    cursor: usize,
    current: Option<DialogueEntry>,
    paused: bool,
}

pub struct PlaybackSequencer {
    state: PlaybackState,
    session: Option<PlaybackSession>,
    page_width: usize,
    last_event: Option<EventId>,
}

impl PlaybackSequencer {
    pub fn new(page_width: usize) -> Self {
        Self {
            state: PlaybackState::Idle,
            session: None,
            page_width,
            last_event: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, PlaybackState::Loaded | PlaybackState::Playing)
    }

    pub fn is_paused(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.paused)
    }

    /// The event of the active session, or of the last finished one.
    pub fn event_id(&self) -> Option<&EventId> {
        self.session
            .as_ref()
            .map(|s| &s.event.id)
            .or(self.last_event.as_ref())
    }

    pub fn cursor(&self) -> Option<usize> {
        self.session.as_ref().map(|s| s.cursor)
    }

    pub fn current_entry(&self) -> Option<&DialogueEntry> {
        self.session.as_ref().and_then(|s| s.current.as_ref())
    }

    pub fn set_page_width(&mut self, width: usize) {
        self.page_width = width;
    }

    /// Resolve `id` and prepare a fresh session with the cursor at zero.
    pub fn load(
        &mut self,
        content: Arc<dyn ContentLookup>,
        id: &EventId,
    ) -> Result<(), PlaybackError> {
        if let Some(active) = self.session.as_ref().filter(|_| self.is_active()) {
            return Err(PlaybackError::Busy(active.event.id.clone()));
        }
        let event = content
            .event(id)
            .cloned()
            .ok_or_else(|| PlaybackError::UnknownEvent(id.clone()))?;
        if &event.id != id {
            tracing::error!(requested = %id, resolved = %event.id, "event lookup returned the wrong event");
            self.reset(PlaybackState::Aborted);
            return Err(PlaybackError::IdMismatch {
                requested: id.clone(),
                resolved: event.id,
            });
        }

        tracing::debug!(event = %id, lines = event.lines.len(), "playback loaded");
        self.session = Some(PlaybackSession {
            content,
            event,
            cursor: 0,
            current: None,
            paused: false,
        });
        self.last_event = None;
        self.state = PlaybackState::Loaded;
        Ok(())
    }

    /// Begin playback and emit the first entry.
    pub fn start(&mut self) -> Result<PlaybackStep, PlaybackError> {
        match self.state {
            PlaybackState::Loaded => {
                self.state = PlaybackState::Playing;
                Ok(self.emit_next())
            }
            PlaybackState::Playing => Err(PlaybackError::AlreadyStarted),
            PlaybackState::Completed => Ok(PlaybackStep::Finished),
            PlaybackState::Idle | PlaybackState::Aborted => Err(PlaybackError::NotLoaded),
        }
    }

    /// Emit the next entry. Starts playback if the session is only loaded.
    /// After completion this is a no-op returning `Finished`.
    pub fn advance(&mut self) -> Result<PlaybackStep, PlaybackError> {
        match self.state {
            PlaybackState::Loaded => self.start(),
            PlaybackState::Playing => Ok(self.emit_next()),
            PlaybackState::Completed => Ok(PlaybackStep::Finished),
            PlaybackState::Idle | PlaybackState::Aborted => Err(PlaybackError::NotLoaded),
        }
    }

    /// Move to the next page of the current entry, if it has one.
    pub fn next_page(&mut self) -> Option<&DialogueEntry> {
        let session = self.session.as_mut()?;
        if session.paused {
            return None;
        }
        let entry = session.current.as_mut()?;
        if !entry.has_more_pages() {
            return None;
        }
        entry.current_page_index += 1;
        Some(entry)
    }

    /// Returns false if there is no session to pause.
    pub fn pause(&mut self) -> bool {
        let active = self.is_active();
        match self.session.as_mut() {
            Some(s) if active => {
                s.paused = true;
                true
            }
            _ => false,
        }
    }

    pub fn resume(&mut self) -> bool {
        match self.session.as_mut() {
            Some(s) if s.paused => {
                s.paused = false;
                true
            }
            _ => false,
        }
    }

    /// Drop the active session so a later `load` starts clean.
    /// Returns false if nothing was active.
    pub fn abort(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }
        if let Some(s) = &self.session {
            tracing::debug!(event = %s.event.id, cursor = s.cursor, "playback aborted");
        }
        self.reset(PlaybackState::Aborted);
        true
    }

    fn reset(&mut self, state: PlaybackState) {
        self.session = None;
        self.last_event = None;
        self.state = state;
    }

    fn emit_next(&mut self) -> PlaybackStep {
        let Some(session) = self.session.as_mut() else {
            return PlaybackStep::Finished;
        };
        if session.paused {
            return PlaybackStep::Paused;
        }

        while let Some(line) = session.event.lines.get(session.cursor) {
            let index = session.cursor;
            session.cursor += 1;

            let Some(character) = session.content.character(&line.speaker) else {
                tracing::warn!(
                    event = %session.event.id,
                    line = index,
                    speaker = %line.speaker,
                    "skipping line with unknown speaker"
                );
                continue;
            };

            let entry = DialogueEntry {
                id: format!("{}#{}", session.event.id, index),
                character: character.clone(),
                full_text: line.text.clone(),
                pages: paginate(&line.text, self.page_width),
                current_page_index: 0,
            };
            session.current = Some(entry.clone());
            return PlaybackStep::Entry(entry);
        }

        let id = session.event.id.clone();
        tracing::info!(event = %id, "playback completed");
        self.session = None;
        self.last_event = Some(id.clone());
        self.state = PlaybackState::Completed;
        PlaybackStep::Completed(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Arc<Catalog> {
        Arc::new(
            Catalog::parse_ron(
                r#"(
                    beats: ["hook"],
                    characters: [
                        (id: "archivist", name: "Mira", title: "Archivist", portrait: "mira.png"),
                        (id: "cat", name: "Inkblot"),
                    ],
                    events: [
                        (id: "three", trigger: "first:puzzles", lines: [
                            (speaker: "archivist", text: "One."),
                            (speaker: "cat", text: "Two."),
                            (speaker: "archivist", text: "Three."),
                        ]),
                        (id: "ghostly", trigger: "flag:x", lines: [
                            (speaker: "ghost", text: "Boo."),
                            (speaker: "cat", text: "Hiss."),
                            (speaker: "ghost", text: "Boo again."),
                        ]),
                        (id: "long", trigger: "flag:y", lines: [
                            (speaker: "archivist", text: "First sentence here. Second sentence there. Third one."),
                        ]),
                    ],
                )"#,
            )
            .unwrap(),
        )
    }

    fn entry(step: PlaybackStep) -> DialogueEntry {
        match step {
            PlaybackStep::Entry(e) => e,
            other => panic!("expected entry, got {:?}", other),
        }
    }

    #[test]
    fn three_lines_then_completion_once() {
        let mut seq = PlaybackSequencer::new(80);
        seq.load(catalog(), &"three".into()).unwrap();
        assert_eq!(seq.state(), PlaybackState::Loaded);

        let texts: Vec<String> = (0..3)
            .map(|_| entry(seq.advance().unwrap()).full_text)
            .collect();
        assert_eq!(texts, vec!["One.", "Two.", "Three."]);

        assert_eq!(
            seq.advance().unwrap(),
            PlaybackStep::Completed("three".into())
        );
        assert_eq!(seq.state(), PlaybackState::Completed);
        assert_eq!(seq.advance().unwrap(), PlaybackStep::Finished);
        assert_eq!(seq.advance().unwrap(), PlaybackStep::Finished);
    }

    #[test]
    fn entries_carry_character_data() {
        let mut seq = PlaybackSequencer::new(80);
        seq.load(catalog(), &"three".into()).unwrap();
        let first = entry(seq.start().unwrap());
        assert_eq!(first.id, "three#0");
        assert_eq!(first.character.name, "Mira");
        assert_eq!(first.character.title, "Archivist");
        assert_eq!(first.character.portrait, "mira.png");
        assert_eq!(first.pages, vec!["One.".to_string()]);
        assert_eq!(first.current_page_index, 0);
        assert_eq!(seq.start(), Err(PlaybackError::AlreadyStarted));
    }

    #[test]
    fn missing_speakers_are_skipped() {
        let mut seq = PlaybackSequencer::new(80);
        seq.load(catalog(), &"ghostly".into()).unwrap();
        let only = entry(seq.advance().unwrap());
        assert_eq!(only.full_text, "Hiss.");
        assert_eq!(only.id, "ghostly#1");
        assert_eq!(
            seq.advance().unwrap(),
            PlaybackStep::Completed("ghostly".into())
        );
    }

    #[test]
    fn pause_keeps_cursor() {
        let mut seq = PlaybackSequencer::new(80);
        seq.load(catalog(), &"three".into()).unwrap();
        entry(seq.advance().unwrap());
        assert!(seq.pause());
        assert_eq!(seq.advance().unwrap(), PlaybackStep::Paused);
        assert_eq!(seq.advance().unwrap(), PlaybackStep::Paused);
        assert_eq!(seq.cursor(), Some(1));
        assert!(seq.resume());
        assert_eq!(entry(seq.advance().unwrap()).full_text, "Two.");
    }

    #[test]
    fn pause_needs_an_active_session() {
        let mut seq = PlaybackSequencer::new(80);
        assert!(!seq.pause());
        seq.load(catalog(), &"three".into()).unwrap();
        assert!(seq.pause());
        assert!(seq.abort());
        assert!(!seq.pause());
        assert!(!seq.is_paused());
    }

    #[test]
    fn busy_until_aborted() {
        let mut seq = PlaybackSequencer::new(80);
        seq.load(catalog(), &"three".into()).unwrap();
        entry(seq.advance().unwrap());
        assert_eq!(
            seq.load(catalog(), &"long".into()),
            Err(PlaybackError::Busy("three".into()))
        );
        assert!(seq.abort());
        assert_eq!(seq.state(), PlaybackState::Aborted);
        assert!(!seq.abort());
        assert_eq!(seq.advance(), Err(PlaybackError::NotLoaded));

        seq.load(catalog(), &"long".into()).unwrap();
        assert_eq!(seq.cursor(), Some(0));
        assert_eq!(entry(seq.advance().unwrap()).id, "long#0");
    }

    #[test]
    fn unknown_event() {
        let mut seq = PlaybackSequencer::new(80);
        assert_eq!(
            seq.load(catalog(), &"nope".into()),
            Err(PlaybackError::UnknownEvent("nope".into()))
        );
        assert_eq!(seq.state(), PlaybackState::Idle);
        assert_eq!(seq.advance(), Err(PlaybackError::NotLoaded));
    }

    struct WrongEventLookup(Arc<Catalog>);

    impl ContentLookup for WrongEventLookup {
        fn event(&self, _id: &EventId) -> Option<&NarrativeEvent> {
            self.0.events().first()
        }

        fn character(&self, id: &CharacterId) -> Option<&Character> {
            self.0.character(id)
        }
    }

    #[test]
    fn mismatched_resolution_fails_loudly() {
        let mut seq = PlaybackSequencer::new(80);
        let lookup = Arc::new(WrongEventLookup(catalog()));
        assert_eq!(
            seq.load(lookup, &"long".into()),
            Err(PlaybackError::IdMismatch {
                requested: "long".into(),
                resolved: "three".into()
            })
        );
        assert_eq!(seq.state(), PlaybackState::Aborted);
        assert!(seq.current_entry().is_none());
    }

    #[test]
    fn paging_within_entry() {
        let mut seq = PlaybackSequencer::new(25);
        seq.load(catalog(), &"long".into()).unwrap();
        let first = entry(seq.advance().unwrap());
        assert_eq!(first.pages.len(), 3);
        assert_eq!(first.current_page(), "First sentence here. ");

        assert_eq!(seq.next_page().unwrap().current_page_index, 1);
        assert_eq!(seq.next_page().unwrap().current_page(), "Third one.");
        assert!(seq.next_page().is_none());
        assert_eq!(seq.current_entry().unwrap().pages.concat(), first.full_text);
    }
}
