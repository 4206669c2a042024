/// Playback integration tests — session lifecycle and paged entries
/// against the fixture catalog.

use storybeat_engine::core::engine::{EngineError, NarrativeEngine};
use storybeat_engine::core::paginate::display_width;
use storybeat_engine::core::playback::{PlaybackError, PlaybackState, PlaybackStep};
use storybeat_engine::schema::event::EventId;
use storybeat_engine::schema::metrics::GameMetricsSnapshot;

fn engine(width: usize) -> NarrativeEngine {
    let mut engine = NarrativeEngine::builder()
        .page_width(width)
        .content_path("tests/fixtures/test_catalog.ron")
        .build()
        .unwrap();
    engine.on_progress_updated(GameMetricsSnapshot::new("hook".into()).with_puzzles(1));
    engine
}

fn entry(step: PlaybackStep) -> storybeat_engine::core::playback::DialogueEntry {
    match step {
        PlaybackStep::Entry(entry) => entry,
        other => panic!("expected an entry, got {:?}", other),
    }
}

#[test]
fn entries_carry_character_and_stable_ids() {
    let mut engine = engine(120);
    engine.load(&"first_puzzle".into()).unwrap();

    let first = entry(engine.start().unwrap());
    assert_eq!(first.id, "first_puzzle#0");
    assert_eq!(first.character.name, "Mira");
    assert_eq!(first.pages.len(), 1);
    assert_eq!(first.current_page(), first.full_text);

    let second = entry(engine.advance().unwrap());
    assert_eq!(second.id, "first_puzzle#1");
    assert_eq!(second.character.name, "Inkblot");
    assert_eq!(second.full_text, "Mrrp.");
}

#[test]
fn narrow_surface_pages_long_lines() {
    let mut engine = engine(40);
    engine.load(&"first_puzzle".into()).unwrap();

    let first = entry(engine.advance().unwrap());
    assert_eq!(first.pages.len(), 2);
    assert_eq!(first.pages.concat(), first.full_text);
    for page in &first.pages {
        assert!(display_width(page.trim_end()) <= 40, "page too wide: {:?}", page);
    }
    assert!(first.has_more_pages());

    let paged = engine.next_page().unwrap();
    assert_eq!(paged.current_page_index, 1);
    assert!(!paged.has_more_pages());
    assert!(engine.next_page().is_none());

    // Paging never moves the line cursor.
    let second = entry(engine.advance().unwrap());
    assert_eq!(second.id, "first_puzzle#1");
}

#[test]
fn pause_holds_the_cursor() {
    let mut engine = engine(120);
    engine.load(&"first_puzzle".into()).unwrap();
    engine.advance().unwrap();

    assert!(engine.pause());
    assert_eq!(engine.advance().unwrap(), PlaybackStep::Paused);
    assert_eq!(engine.advance().unwrap(), PlaybackStep::Paused);
    assert_eq!(engine.playback().cursor(), Some(1));

    assert!(engine.resume());
    assert!(!engine.resume());
    assert_eq!(entry(engine.advance().unwrap()).id, "first_puzzle#1");
}

#[test]
fn abort_leaves_event_unplayed() {
    let mut engine = engine(120);
    engine.load(&"first_puzzle".into()).unwrap();
    engine.advance().unwrap();
    engine.advance().unwrap();

    assert!(engine.abort());
    assert_eq!(engine.playback_state(), PlaybackState::Aborted);
    assert!(engine.ledger().is_empty());
    assert!(matches!(
        engine.advance(),
        Err(EngineError::Playback(PlaybackError::NotLoaded))
    ));

    // A fresh load starts from the first line again.
    engine.load(&"first_puzzle".into()).unwrap();
    assert_eq!(entry(engine.advance().unwrap()).id, "first_puzzle#0");
}

#[test]
fn second_load_while_active_is_busy() {
    let mut engine = engine(120);
    engine.load(&"first_puzzle".into()).unwrap();
    engine.advance().unwrap();

    let err = engine.load(&"first_book".into()).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Playback(PlaybackError::Busy(ref id)) if id == &EventId::from("first_puzzle")
    ));
    assert_eq!(entry(engine.advance().unwrap()).id, "first_puzzle#1");
}

#[test]
fn unknown_event_is_rejected() {
    let mut engine = engine(120);
    assert!(matches!(
        engine.load(&"no_such_event".into()),
        Err(EngineError::Playback(PlaybackError::UnknownEvent(_)))
    ));
    assert_eq!(engine.playback_state(), PlaybackState::Idle);
}

#[test]
fn sessions_run_back_to_back() {
    let mut engine = engine(120);
    engine.on_progress_updated(
        GameMetricsSnapshot::new("hook".into())
            .with_puzzles(1)
            .with_group("fables", &["fox"], &["fox"]),
    );

    for id in ["first_puzzle", "fables_done"] {
        engine.load(&id.into()).unwrap();
        loop {
            match engine.advance().unwrap() {
                PlaybackStep::Entry(_) => {}
                PlaybackStep::Completed(done) => {
                    assert_eq!(done, EventId::from(id));
                    break;
                }
                other => panic!("unexpected step {:?}", other),
            }
        }
    }
    assert_eq!(engine.ledger().len(), 2);
    assert_eq!(engine.playback().event_id(), Some(&EventId::from("fables_done")));
}
