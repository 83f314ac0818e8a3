use std::fmt;
use std::str::FromStr;

use crate::Record;

pub const DEFAULT_SUBJECT: &str = "Flag at Half-Staff Until {until}";
pub const DEFAULT_BODY: &str = "{full_text}";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("unclosed placeholder starting at byte {position}")]
    UnclosedPlaceholder { position: usize },
    #[error("unmatched '}}' at byte {position}")]
    UnmatchedBrace { position: usize },
    #[error("empty placeholder at byte {position}")]
    EmptyPlaceholder { position: usize },
    #[error("template references field '{field}' which the record does not have")]
    MissingField { field: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
}

/// Text with `{field}` placeholders. `{{` and `}}` render literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((position, ch)) = chars.next() {
            match ch {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    literal.push('{');
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(TemplateError::UnmatchedBrace { position }),
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        if c == '{' {
                            return Err(TemplateError::UnclosedPlaceholder { position });
                        }
                        name.push(c);
                    }
                    if !closed {
                        return Err(TemplateError::UnclosedPlaceholder { position });
                    }
                    let name = name.trim();
                    if name.is_empty() {
                        return Err(TemplateError::EmptyPlaceholder { position });
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(name.to_string()));
                }
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// Field names referenced by the template, in order of appearance.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Field(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn render(&self, record: &Record) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(name) => {
                    let value = record.get(name).ok_or_else(|| TemplateError::MissingField {
                        field: name.clone(),
                    })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

impl FromStr for Template {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// A rendered, human-readable notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

/// Subject and body templates of one broadcaster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationTemplates {
    pub subject: Template,
    pub body: Template,
}

impl NotificationTemplates {
    pub fn parse(subject: &str, body: &str) -> Result<Self, TemplateError> {
        Ok(Self {
            subject: Template::parse(subject)?,
            body: Template::parse(body)?,
        })
    }

    pub fn format(&self, record: &Record) -> Result<Notification, TemplateError> {
        Ok(Notification {
            subject: self.subject.render(record)?,
            body: self.body.render(record)?,
        })
    }
}

impl Default for NotificationTemplates {
    fn default() -> Self {
        Self {
            subject: Template {
                source: DEFAULT_SUBJECT.to_string(),
                segments: vec![
                    Segment::Literal("Flag at Half-Staff Until ".to_string()),
                    Segment::Field("until".to_string()),
                ],
            },
            body: Template {
                source: DEFAULT_BODY.to_string(),
                segments: vec![Segment::Field("full_text".to_string())],
            },
        }
    }
}
