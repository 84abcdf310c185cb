//! Structured output shapes returned by the generation port.
//!
//! Drafts are what the generation adapter parses out of an LLM response
//! before the lifecycle controller validates them and turns them into
//! persisted [`StoryBeat`]s. They carry no IDs or timestamps -- those are
//! assigned at persistence time.
//!
//! [`StoryBeat`]: crate::entities::StoryBeat

use serde::{Deserialize, Serialize};

/// A pre-planned anchor beat produced at arc creation.
///
/// The generation port must return exactly three of these, at indices
/// 0, 7, and 14; the lifecycle controller rejects any other shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorDraft {
    /// Target index within the arc; must be 0, 7, or 14.
    pub beat_index: u8,
    /// Short beat title.
    pub name: String,
    /// Narrative description.
    pub description: String,
    /// Directives for downstream modules.
    #[serde(default)]
    pub directives: Vec<String>,
    /// Storylines this anchor establishes.
    #[serde(default)]
    pub storylines: Vec<String>,
}

/// A dynamic beat produced on demand during arc progression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeatDraft {
    /// Short beat title.
    pub name: String,
    /// Narrative description.
    pub description: String,
    /// Directives for downstream modules.
    #[serde(default)]
    pub directives: Vec<String>,
    /// Emergent storylines this beat opens or advances.
    #[serde(default)]
    pub emergent: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_draft_tolerates_missing_lists() {
        let json = r#"{"beat_index": 7, "name": "The Turning", "description": "Midpoint."}"#;
        let draft: Result<AnchorDraft, _> = serde_json::from_str(json);
        let draft = draft.ok();
        assert!(draft.is_some());
        assert!(draft.is_some_and(|d| d.directives.is_empty() && d.storylines.is_empty()));
    }

    #[test]
    fn beat_draft_roundtrip() {
        let draft = BeatDraft {
            name: String::from("Embers"),
            description: String::from("The city smolders."),
            directives: vec![String::from("factions: reassess holdings")],
            emergent: vec![String::from("refugee crisis")],
        };
        let json = serde_json::to_string(&draft).ok();
        let restored: Option<BeatDraft> =
            json.as_deref().and_then(|j| serde_json::from_str(j).ok());
        assert_eq!(restored.as_ref(), Some(&draft));
    }
}
