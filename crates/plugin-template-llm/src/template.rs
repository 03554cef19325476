//! Encounter templates and placeholder rendering.

use serde::{Deserialize, Serialize};

/// One text template. `{prompt}` and `{difficulty}` are substituted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterTemplate {
    pub title: String,
    pub body: String,
}

impl EncounterTemplate {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }

    /// Returns `(title, body)` with placeholders filled in.
    pub fn render(&self, prompt: &str, difficulty: &str) -> (String, String) {
        let fill = |text: &str| {
            text.replace("{prompt}", prompt)
                .replace("{difficulty}", difficulty)
        };
        (fill(&self.title), fill(&self.body))
    }
}

/// Templates used when the configuration supplies none.
pub fn default_templates() -> Vec<EncounterTemplate> {
    vec![
        EncounterTemplate::new(
            "Routine: {prompt}",
            "A {difficulty} scenario built around {prompt}. Work through it step by step.",
        ),
        EncounterTemplate::new(
            "Complication: {prompt}",
            "Something goes wrong during {prompt}. Difficulty: {difficulty}.",
        ),
    ]
}
