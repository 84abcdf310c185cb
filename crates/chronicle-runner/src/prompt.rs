//! Prompt template loading and rendering via `minijinja`.
//!
//! Templates are loaded from the filesystem (default: `templates/`
//! directory) so operators can tune narrative voice without recompiling.
//! One template per generation call: the anchor batch at arc creation,
//! the next dynamic beat, and the closing summary. All three share the
//! `system.j2` framing message.

use minijinja::Environment;
use serde::Serialize;

use chronicle_engine::context::{AnchorContext, BeatContext, SummaryContext};

use crate::error::RunnerError;

/// Manages prompt template loading and rendering.
///
/// Wraps a `minijinja` [`Environment`] with all narrative templates
/// pre-loaded. Templates can be edited on disk and will be picked up on
/// the next call to [`PromptEngine::new`].
pub struct PromptEngine {
    env: Environment<'static>,
}

/// The complete rendered prompt ready to send to an LLM backend.
#[derive(Debug, Clone)]
pub struct RenderedPrompt {
    /// System message establishing the narrator's role and output format.
    pub system: String,
    /// User message containing world state and the generation request.
    pub user: String,
}

impl PromptEngine {
    /// Create a new prompt engine loading templates from the given directory.
    ///
    /// The directory must contain: `system.j2`, `anchors.j2`, `beat.j2`,
    /// `summary.j2`.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Template`] when a file is missing or does
    /// not parse as a template.
    pub fn new(templates_dir: &str) -> Result<Self, RunnerError> {
        let mut env = Environment::new();

        for name in ["system", "anchors", "beat", "summary"] {
            let source = load_template(templates_dir, &format!("{name}.j2"))?;
            env.add_template_owned(name.to_owned(), source)
                .map_err(|e| {
                    RunnerError::Template(format!("failed to add {name} template: {e}"))
                })?;
        }

        Ok(Self { env })
    }

    /// Render the anchor-batch prompt for a new arc.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Template`] on render failure.
    pub fn render_anchors(&self, ctx: &AnchorContext) -> Result<RenderedPrompt, RunnerError> {
        self.render("anchors", ctx)
    }

    /// Render the next-beat prompt.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Template`] on render failure.
    pub fn render_beat(&self, ctx: &BeatContext) -> Result<RenderedPrompt, RunnerError> {
        self.render("beat", ctx)
    }

    /// Render the arc-summary prompt.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Template`] on render failure.
    pub fn render_summary(&self, ctx: &SummaryContext) -> Result<RenderedPrompt, RunnerError> {
        self.render("summary", ctx)
    }

    fn render<C: Serialize>(&self, name: &str, ctx: &C) -> Result<RenderedPrompt, RunnerError> {
        let system = self
            .env
            .get_template("system")
            .map_err(|e| RunnerError::Template(format!("missing system template: {e}")))?
            .render(ctx)
            .map_err(|e| RunnerError::Template(format!("system render failed: {e}")))?;

        let user = self
            .env
            .get_template(name)
            .map_err(|e| RunnerError::Template(format!("missing {name} template: {e}")))?
            .render(ctx)
            .map_err(|e| RunnerError::Template(format!("{name} render failed: {e}")))?;

        Ok(RenderedPrompt { system, user })
    }
}

/// Read a template file from disk.
fn load_template(dir: &str, filename: &str) -> Result<String, RunnerError> {
    let path = format!("{dir}/{filename}");
    std::fs::read_to_string(&path)
        .map_err(|e| RunnerError::Template(format!("failed to read {path}: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use chronicle_engine::context::WorldSnapshots;
    use chronicle_types::{World, WorldId};

    use super::*;

    fn write_test_templates(dir: &std::path::Path) {
        std::fs::write(
            dir.join("system.j2"),
            "You are the narrator of the world {{ world.name }}. Respond with JSON only.",
        )
        .ok();
        std::fs::write(
            dir.join("anchors.j2"),
            "## New Arc\nArc number: {{ arc_number }}\nFactions: {{ snapshots.factions | length }}\n\nProduce exactly three anchors at indices 0, 7, and 14.",
        )
        .ok();
        std::fs::write(
            dir.join("beat.j2"),
            "## Next Beat\nIndex: {{ next_index }}\nHeading toward: {{ next_anchor.name }}\n{% for line in recent_events %}{{ line }}\n{% endfor %}",
        )
        .ok();
        std::fs::write(
            dir.join("summary.j2"),
            "## Summary\n{% for beat in beats %}{{ beat.beat_index }}. {{ beat.name }}\n{% endfor %}",
        )
        .ok();
    }

    fn test_world(name: &str) -> World {
        World {
            id: WorldId::new(),
            name: name.to_owned(),
            current_arc_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn template_loading_and_rendering() {
        let unique = format!(
            "chronicle_test_templates_{}_{:?}",
            std::process::id(),
            std::thread::current().id(),
        );
        let dir = std::env::temp_dir().join(unique);
        std::fs::create_dir_all(&dir).ok();
        write_test_templates(&dir);

        let engine = PromptEngine::new(dir.to_str().unwrap());
        assert!(engine.is_ok(), "PromptEngine::new should succeed with valid templates");
        let engine = engine.unwrap();

        let ctx = AnchorContext {
            world: test_world("Vesper"),
            arc_number: 3,
            snapshots: WorldSnapshots::default(),
        };
        let prompt = engine.render_anchors(&ctx).unwrap();
        assert!(
            prompt.system.contains("Vesper"),
            "system prompt should contain the world name"
        );
        assert!(
            prompt.user.contains("Arc number: 3"),
            "user prompt should contain the arc number"
        );
        assert!(prompt.user.contains("three anchors"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_template_returns_error() {
        let unique = format!(
            "chronicle_missing_templates_{}_{:?}",
            std::process::id(),
            std::thread::current().id(),
        );
        let dir = std::env::temp_dir().join(unique);
        std::fs::create_dir_all(&dir).ok();
        // Write only some templates, leaving others missing
        std::fs::write(dir.join("system.j2"), "test").ok();

        let result = PromptEngine::new(dir.to_str().unwrap());
        assert!(result.is_err(), "should fail when templates are missing");

        std::fs::remove_dir_all(&dir).ok();
    }
}
