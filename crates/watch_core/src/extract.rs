use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::Record;

pub const HALF_STAFF_PATTERN: &str =
    r"the flag of the United States shall be flown at half-staff.*until (.*)\. ";
pub const AUTHORITY_PATTERN: &str = r"(.*), by the authority vested in me";

/// Patterns and output field names for one kind of event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionRules {
    /// Marks a unit as describing the event. Capture group 1 is the qualifier.
    pub primary: String,
    /// Field receiving the title-cased qualifier.
    pub qualifier_field: String,
    /// Optional justification clause. Capture group 1 is the justification.
    pub secondary: String,
    /// Field receiving the justification, empty when `secondary` does not match.
    pub justification_field: String,
    /// Field receiving the whole trimmed unit.
    pub full_text_field: String,
}

impl Default for ExtractionRules {
    fn default() -> Self {
        Self {
            primary: HALF_STAFF_PATTERN.to_string(),
            qualifier_field: "until".to_string(),
            secondary: AUTHORITY_PATTERN.to_string(),
            justification_field: "why".to_string(),
            full_text_field: "full_text".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RulesError {
    #[error("invalid {which} pattern: {source}")]
    InvalidPattern {
        which: &'static str,
        #[source]
        source: regex::Error,
    },
    #[error("{which} pattern must contain a capture group")]
    MissingCaptureGroup { which: &'static str },
}

/// Turns unstructured text into a [`Record`] using [`ExtractionRules`].
#[derive(Debug, Clone)]
pub struct ExtractionEngine {
    primary: Regex,
    secondary: Regex,
    rules: ExtractionRules,
}

impl ExtractionEngine {
    pub fn new(rules: ExtractionRules) -> Result<Self, RulesError> {
        let primary = compile("primary", &rules.primary)?;
        let secondary = compile("secondary", &rules.secondary)?;
        Ok(Self {
            primary,
            secondary,
            rules,
        })
    }

    pub fn rules(&self) -> &ExtractionRules {
        &self.rules
    }

    /// Extracts from plain text, treating blank-line separated blocks as units.
    pub fn extract(&self, text: &str) -> Option<Record> {
        self.extract_units(split_paragraphs(text))
    }

    /// Extracts from pre-split units. The first unit matching the primary
    /// pattern wins; later matches are ignored.
    pub fn extract_units<'a, I>(&self, units: I) -> Option<Record>
    where
        I: IntoIterator<Item = &'a str>,
    {
        units.into_iter().find_map(|unit| self.extract_unit(unit))
    }

    fn extract_unit(&self, unit: &str) -> Option<Record> {
        let qualifier = self.primary.captures(unit)?.get(1)?.as_str();
        let justification = self
            .secondary
            .captures(unit)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .unwrap_or_default();

        Some(
            Record::new()
                .with_field(&self.rules.qualifier_field, title_case(qualifier.trim()))
                .with_field(&self.rules.justification_field, justification)
                .with_field(&self.rules.full_text_field, unit.trim()),
        )
    }
}

fn compile(which: &'static str, pattern: &str) -> Result<Regex, RulesError> {
    let regex =
        Regex::new(pattern).map_err(|source| RulesError::InvalidPattern { which, source })?;
    if regex.captures_len() < 2 {
        return Err(RulesError::MissingCaptureGroup { which });
    }
    Ok(regex)
}

/// Splits text into paragraphs at blank lines, dropping empty ones.
pub fn split_paragraphs(text: &str) -> impl Iterator<Item = &str> {
    let mut paragraphs = Vec::new();
    let mut start: Option<usize> = None;
    let mut end = 0;
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.trim().is_empty() {
            if let Some(s) = start.take() {
                paragraphs.push(&text[s..end]);
            }
        } else {
            start.get_or_insert(offset);
            end = offset + line.len();
        }
        offset += line.len();
    }
    if let Some(s) = start {
        paragraphs.push(&text[s..end]);
    }
    paragraphs.into_iter().map(str::trim).filter(|p| !p.is_empty())
}

/// Uppercases the first letter of every run of letters and lowercases the rest.
pub fn title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_is_letter = false;
    for ch in input.chars() {
        if ch.is_alphabetic() {
            if prev_is_letter {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(ch);
            prev_is_letter = false;
        }
    }
    out
}
