use serde::{Deserialize, Serialize};
use std::fmt;

/// Newtype wrapper for character IDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacterId(pub String);

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CharacterId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A speaker. Reference data only; the engine never mutates characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    #[serde(default)]
    pub title: String,
    /// Opaque portrait handle passed through to the presentation surface.
    #[serde(default)]
    pub portrait: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn character_from_ron_defaults() {
        let c: Character = ron::from_str(r#"(id: "archivist", name: "Mira")"#).unwrap();
        assert_eq!(c.id, CharacterId::from("archivist"));
        assert_eq!(c.name, "Mira");
        assert!(c.title.is_empty());
        assert!(c.portrait.is_empty());
    }
}
