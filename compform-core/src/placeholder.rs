//! Brace-format message templates.
//!
//! A message template is plain text with `{name}` placeholders. `{{` and `}}`
//! stand for literal braces. Templates are split into segments once, at form
//! construction, so rendering never re-scans substituted values.

use std::collections::HashMap;

use crate::error::{FormError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
}

/// One role's message text, pre-split into literal and placeholder segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl MessageTemplate {
    /// Split `source` into segments.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::InvalidTemplate`] for an unmatched brace, an
    /// empty `{}` field, or a conversion / format-spec suffix.
    pub fn parse(role: &str, source: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for inner in chars.by_ref() {
                        match inner {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => {
                                return Err(template_error(role, "nested '{' inside a placeholder"));
                            }
                            other => name.push(other),
                        }
                    }
                    if !closed {
                        return Err(template_error(role, "single '{' encountered"));
                    }
                    if name.is_empty() {
                        return Err(template_error(role, "empty placeholder '{}'"));
                    }
                    if name.contains(['!', ':']) {
                        return Err(template_error(
                            role,
                            &format!("conversion or format spec in '{{{name}}}' is not supported"),
                        ));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(name));
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(template_error(role, "single '}' encountered")),
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

    /// The template text as written.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Placeholder names in order of appearance, repeats included.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Field(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Substitute every placeholder from `data`.
    ///
    /// Returns the name of the first placeholder without a value on failure.
    pub fn render<'a>(&'a self, data: &HashMap<String, String>) -> std::result::Result<String, &'a str> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(name) => match data.get(name) {
                    Some(value) => out.push_str(value),
                    None => return Err(name.as_str()),
                },
            }
        }
        Ok(out)
    }
}

fn template_error(role: &str, detail: &str) -> FormError {
    FormError::InvalidTemplate(format!("bad placeholder syntax in role '{role}': {detail}"))
}
