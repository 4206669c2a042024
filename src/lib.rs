//! Storybeat Engine — narrative content for progression-gated games.
//!
//! Evaluates declarative trigger predicates against player progress,
//! advances an ordered story-beat state machine, chooses between scripted
//! events and character banter, and plays events back one paginated line
//! at a time.

pub mod core;
pub mod schema;
