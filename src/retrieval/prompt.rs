//! Prompt templates with named slots, and line parsing for model output

use regex::{Captures, Regex};
use std::collections::BTreeSet;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromptError {
    #[error("Template is missing required slot {{{0}}}")]
    MissingSlot(String),

    #[error("Template uses undeclared slot {{{0}}}")]
    UnknownSlot(String),

    #[error("No value supplied for slot {{{0}}}")]
    MissingValue(String),
}

fn slot_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid slot regex"))
}

/// A prompt with `{slot}` placeholders, checked when it is built
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
    slots: BTreeSet<String>,
}

impl PromptTemplate {
    /// Build a template that must use exactly the given slots
    pub fn new(template: impl Into<String>, slots: &[&str]) -> Result<Self, PromptError> {
        let template = template.into();
        let declared: BTreeSet<String> = slots.iter().map(|s| s.to_string()).collect();

        let used: BTreeSet<String> = slot_pattern()
            .captures_iter(&template)
            .map(|caps| caps[1].to_string())
            .collect();

        if let Some(unknown) = used.difference(&declared).next() {
            return Err(PromptError::UnknownSlot(unknown.clone()));
        }
        if let Some(missing) = declared.difference(&used).next() {
            return Err(PromptError::MissingSlot(missing.clone()));
        }

        Ok(Self {
            template,
            slots: declared,
        })
    }

    /// Fill every slot in a single pass
    ///
    /// Values are inserted verbatim; braces inside a value are never expanded.
    pub fn render(&self, values: &[(&str, &str)]) -> Result<String, PromptError> {
        if let Some(missing) = self
            .slots
            .iter()
            .find(|slot| !values.iter().any(|(name, _)| *name == slot.as_str()))
        {
            return Err(PromptError::MissingValue(missing.clone()));
        }

        let rendered = slot_pattern().replace_all(&self.template, |caps: &Captures| {
            values
                .iter()
                .find(|(name, _)| *name == &caps[1])
                .map(|(_, value)| value.to_string())
                .unwrap_or_default()
        });

        Ok(rendered.into_owned())
    }

    pub fn slots(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(String::as_str)
    }
}

/// Split model output into non-empty lines
///
/// Total: never fails, empty input gives an empty vector. Lines are kept as
/// returned apart from the line terminator.
pub fn parse_lines(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
