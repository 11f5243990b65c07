//! A single static unit-tag rule: a radio-ID pattern paired with a
//! human-readable label, loaded from `unit_tags.csv`.
//!
//! A pattern column that already looks like `/.../ ` is compiled as a regex
//! verbatim; anything else is treated as an exact radio ID and wrapped into
//! an anchored regex so plain numeric rows behave like an exact match.

use regex::Regex;

use crate::error::DispatcherError;

#[derive(Debug, Clone)]
pub struct UnitTag {
    raw_pattern: String,
    pattern: Regex,
    pub tag: String,
}

impl UnitTag {
    pub fn new(pattern: &str, tag: String) -> Result<Self, DispatcherError> {
        let compiled = compile_pattern(pattern)?;
        Ok(Self {
            raw_pattern: pattern.to_string(),
            pattern: compiled,
            tag,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.raw_pattern
    }

    pub fn matches(&self, radio_id: i64) -> bool {
        self.pattern.is_match(&radio_id.to_string())
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex, DispatcherError> {
    let inner = if pattern.len() >= 2 && pattern.starts_with('/') && pattern.ends_with('/') {
        pattern[1..pattern.len() - 1].to_string()
    } else {
        format!("^{}$", regex::escape(pattern))
    };
    Regex::new(&inner).map_err(DispatcherError::from)
}
