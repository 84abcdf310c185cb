//! LLM response parsing into typed generation drafts.
//!
//! The LLM returns raw text (ideally JSON). This module extracts and
//! validates the response into the draft shapes from `chronicle-types`.
//! Shape violations are errors, not silent repairs: an anchor batch that
//! is not exactly three drafts at indices 0, 7, and 14 is rejected so the
//! retry loop can ask again.

use chronicle_engine::allocator::ANCHOR_INDICES;
use chronicle_types::{AnchorDraft, BeatDraft};

use crate::error::RunnerError;

/// Wrapper shape the anchor prompt asks the LLM to produce.
#[derive(Debug, serde::Deserialize)]
struct RawAnchorResponse {
    anchors: Vec<AnchorDraft>,
}

/// Wrapper shape the summary prompt asks the LLM to produce.
#[derive(Debug, serde::Deserialize)]
struct RawSummaryResponse {
    summary: String,
}

/// Parse an anchor-batch response into exactly three validated drafts.
///
/// # Errors
///
/// Returns [`RunnerError::Parse`] when no recovery strategy yields JSON,
/// when the batch is not exactly three drafts, or when the indices are
/// not 0, 7, and 14.
pub fn parse_anchor_response(raw: &str) -> Result<Vec<AnchorDraft>, RunnerError> {
    let parsed: RawAnchorResponse = parse_with_recovery(raw)?;
    let mut anchors = parsed.anchors;

    if anchors.len() != ANCHOR_INDICES.len() {
        return Err(RunnerError::Parse(format!(
            "expected exactly {} anchors, got {}",
            ANCHOR_INDICES.len(),
            anchors.len()
        )));
    }

    anchors.sort_by_key(|a| a.beat_index);
    let indices: Vec<u8> = anchors.iter().map(|a| a.beat_index).collect();
    if indices != ANCHOR_INDICES {
        return Err(RunnerError::Parse(format!(
            "anchor indices must be {ANCHOR_INDICES:?}, got {indices:?}"
        )));
    }

    Ok(anchors)
}

/// Parse a next-beat response into a [`BeatDraft`].
///
/// # Errors
///
/// Returns [`RunnerError::Parse`] when no recovery strategy yields a
/// valid draft or the name/description are empty.
pub fn parse_beat_response(raw: &str) -> Result<BeatDraft, RunnerError> {
    let draft: BeatDraft = parse_with_recovery(raw)?;
    if draft.name.trim().is_empty() || draft.description.trim().is_empty() {
        return Err(RunnerError::Parse(
            "beat draft has an empty name or description".to_owned(),
        ));
    }
    Ok(draft)
}

/// Parse an arc-summary response into plain text.
///
/// Accepts `{"summary": "..."}` JSON; a response that is not JSON at all
/// is taken verbatim, since a summary is free text anyway.
///
/// # Errors
///
/// Returns [`RunnerError::Parse`] when the result is empty.
pub fn parse_summary_response(raw: &str) -> Result<String, RunnerError> {
    let summary = parse_with_recovery::<RawSummaryResponse>(raw)
        .map_or_else(|_| raw.trim().to_owned(), |parsed| parsed.summary);

    if summary.trim().is_empty() {
        return Err(RunnerError::Parse("summary is empty".to_owned()));
    }
    Ok(summary.trim().to_owned())
}

/// Attempt to deserialize the response through multiple recovery strategies:
///
/// 1. Direct `serde_json` deserialization
/// 2. Extract JSON from markdown code blocks
/// 3. Strip trailing commas and retry
/// 4. Code block extraction plus comma stripping
fn parse_with_recovery<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, RunnerError> {
    let trimmed = raw.trim();

    if let Ok(parsed) = serde_json::from_str::<T>(trimmed) {
        return Ok(parsed);
    }

    if let Some(json_str) = extract_json_from_codeblock(trimmed)
        && let Ok(parsed) = serde_json::from_str::<T>(json_str)
    {
        return Ok(parsed);
    }

    let cleaned = strip_trailing_commas(trimmed);
    if let Ok(parsed) = serde_json::from_str::<T>(&cleaned) {
        return Ok(parsed);
    }

    if let Some(json_str) = extract_json_from_codeblock(trimmed) {
        let cleaned_inner = strip_trailing_commas(json_str);
        if let Ok(parsed) = serde_json::from_str::<T>(&cleaned_inner) {
            return Ok(parsed);
        }
    }

    Err(RunnerError::Parse(format!(
        "all parse strategies failed for: {trimmed}"
    )))
}

/// Extract JSON from a markdown code block.
fn extract_json_from_codeblock(text: &str) -> Option<&str> {
    // Look for ```json ... ``` or ``` ... ```
    let start = text.find("```json").map(|i| {
        let after_tag = i.checked_add(7).unwrap_or(i);
        // Find the newline after ```json
        text.get(after_tag..)
            .and_then(|s| s.find('\n'))
            .and_then(|nl| after_tag.checked_add(nl))
            .and_then(|pos| pos.checked_add(1))
            .unwrap_or(after_tag)
    }).or_else(|| {
        text.find("```").map(|i| {
            let after_tag = i.checked_add(3).unwrap_or(i);
            text.get(after_tag..)
                .and_then(|s| s.find('\n'))
                .and_then(|nl| after_tag.checked_add(nl))
                .and_then(|pos| pos.checked_add(1))
                .unwrap_or(after_tag)
        })
    });

    let start = start?;
    let remaining = text.get(start..)?;
    let end = remaining.find("```")?;
    remaining.get(..end).map(str::trim)
}

/// Strip trailing commas before closing braces and brackets (common LLM error).
fn strip_trailing_commas(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    let mut i = 0;
    while i < len {
        let c = chars.get(i).copied().unwrap_or(' ');
        if c == ',' {
            // Look ahead past whitespace for } or ]
            let mut j = i.checked_add(1).unwrap_or(i);
            while j < len && chars.get(j).copied().unwrap_or(' ').is_whitespace() {
                j = j.checked_add(1).unwrap_or(j);
            }
            let next = chars.get(j).copied().unwrap_or(' ');
            if next == '}' || next == ']' {
                // Skip this comma
                i = i.checked_add(1).unwrap_or(i);
                continue;
            }
        }
        result.push(c);
        i = i.checked_add(1).unwrap_or(len);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor_json(indices: &[u8]) -> String {
        let anchors: Vec<String> = indices
            .iter()
            .map(|i| {
                format!(
                    r#"{{"beat_index": {i}, "name": "Anchor {i}", "description": "A waypoint."}}"#
                )
            })
            .collect();
        format!(r#"{{"anchors": [{}]}}"#, anchors.join(", "))
    }

    #[test]
    fn parse_valid_anchor_batch() {
        let result = parse_anchor_response(&anchor_json(&[0, 7, 14]));
        assert!(result.is_ok());
        let indices: Vec<u8> = result
            .unwrap_or_default()
            .iter()
            .map(|a| a.beat_index)
            .collect();
        assert_eq!(indices, vec![0, 7, 14]);
    }

    #[test]
    fn anchor_batch_is_sorted_by_index() {
        let result = parse_anchor_response(&anchor_json(&[14, 0, 7]));
        let indices: Vec<u8> = result
            .unwrap_or_default()
            .iter()
            .map(|a| a.beat_index)
            .collect();
        assert_eq!(indices, vec![0, 7, 14]);
    }

    #[test]
    fn wrong_anchor_count_is_rejected() {
        assert!(parse_anchor_response(&anchor_json(&[0, 7])).is_err());
        assert!(parse_anchor_response(&anchor_json(&[0, 7, 10, 14])).is_err());
    }

    #[test]
    fn wrong_anchor_indices_are_rejected() {
        assert!(parse_anchor_response(&anchor_json(&[0, 6, 14])).is_err());
        assert!(parse_anchor_response(&anchor_json(&[1, 7, 14])).is_err());
    }

    #[test]
    fn parse_beat_from_codeblock() {
        let raw = "Here is the next beat:\n\n```json\n{\"name\": \"Embers\", \"description\": \"The city smolders.\"}\n```\n";
        let draft = parse_beat_response(raw);
        assert_eq!(draft.ok().map(|d| d.name).as_deref(), Some("Embers"));
    }

    #[test]
    fn parse_beat_trailing_comma() {
        let raw = r#"{"name": "Embers", "description": "The city smolders.", "directives": ["hold"],}"#;
        let draft = parse_beat_response(raw);
        assert!(draft.is_ok());
    }

    #[test]
    fn empty_beat_fields_are_rejected() {
        let raw = r#"{"name": "  ", "description": "The city smolders."}"#;
        assert!(parse_beat_response(raw).is_err());
    }

    #[test]
    fn garbage_beat_is_an_error() {
        assert!(parse_beat_response("I think the story should continue.").is_err());
    }

    #[test]
    fn parse_summary_json_and_plain_text() {
        let json = r#"{"summary": "The arc closed quietly."}"#;
        assert_eq!(
            parse_summary_response(json).ok().as_deref(),
            Some("The arc closed quietly.")
        );

        let plain = "The arc closed quietly.\n";
        assert_eq!(
            parse_summary_response(plain).ok().as_deref(),
            Some("The arc closed quietly.")
        );

        assert!(parse_summary_response("   ").is_err());
    }

    #[test]
    fn extract_json_from_markdown() {
        let text = "```json\n{\"key\": \"value\"}\n```";
        let result = extract_json_from_codeblock(text);
        assert_eq!(result, Some("{\"key\": \"value\"}"));
    }

    #[test]
    fn strip_trailing_commas_basic() {
        let input = r#"{"a": 1, "b": 2,}"#;
        let result = strip_trailing_commas(input);
        assert_eq!(result, r#"{"a": 1, "b": 2}"#);
    }
}
