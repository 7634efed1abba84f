use std::fmt::Write;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::error::CompileError;

/// Marks a positional parameter in SQL text handed to the compiler.
pub const PLACEHOLDER: char = '?';

/// A SQL fragment together with the values bound to its placeholders, in order.
///
/// The text marks each parameter with `?`; `??` stands for a literal question mark. Question
/// marks inside quoted literals and identifiers, dollar-quoted strings and comments are left
/// alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Sql {
    pub text: String,
    pub params: Vec<Value>,
}

impl Sql {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(text: impl Into<String>, params: impl IntoIterator<Item = Value>) -> Self {
        Self {
            text: text.into(),
            params: params.into_iter().collect(),
        }
    }

    /// Appends `value` as the next bound parameter.
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }
}

impl From<&str> for Sql {
    fn from(text: &str) -> Self {
        Sql::new(text)
    }
}

impl From<String> for Sql {
    fn from(text: String) -> Self {
        Sql::new(text)
    }
}

/// How placeholders are rendered in the final query text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderStyle {
    /// `$1`, `$2`, … numbered in emission order, as PostgreSQL expects.
    #[default]
    Numbered,
    /// `?` for every parameter.
    Positional,
}

/// The final query text and its positional parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompiledSql {
    pub sql: String,
    pub params: Vec<Value>,
}

/// An append-only list of SQL fragments, each with its own bound parameters.
///
/// Parameter order is fixed by the order fragments are pushed; [`Emission::finish`] concatenates
/// the texts and the parameters in that same order.
#[derive(Debug, Clone, Default)]
pub struct Emission {
    fragments: Vec<Sql>,
}

impl Emission {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends text without parameters.
    pub fn push(&mut self, text: impl Into<String>) {
        self.fragments.push(Sql::new(text));
    }

    /// Appends a fragment and its parameters.
    pub fn push_sql(&mut self, sql: Sql) {
        self.fragments.push(sql);
    }

    /// Concatenates all fragments, numbering placeholders according to `style`.
    ///
    /// Fails when a fragment binds a different number of parameters than it has placeholders,
    /// because every later parameter would then be bound to the wrong position.
    pub fn finish(self, style: PlaceholderStyle) -> Result<CompiledSql, CompileError> {
        let mut compiled = CompiledSql {
            sql: String::with_capacity(self.fragments.iter().map(|f| f.text.len()).sum()),
            params: Vec::new(),
        };
        for fragment in self.fragments {
            let placeholders = render_fragment(
                &fragment.text,
                style,
                compiled.params.len(),
                &mut compiled.sql,
            );
            if placeholders != fragment.params.len() {
                return Err(CompileError::ParameterMismatch {
                    text: fragment.text,
                    placeholders,
                    params: fragment.params.len(),
                });
            }
            compiled.params.extend(fragment.params);
        }
        Ok(compiled)
    }
}

/// Writes `text` into `dst`, rewriting placeholders, and returns how many it found.
fn render_fragment(text: &str, style: PlaceholderStyle, offset: usize, dst: &mut String) -> usize {
    let mut placeholders = 0;
    let mut rest = text;
    while let Some(c) = rest.chars().next() {
        let verbatim = match c {
            '\'' | '"' => rest[1..].find(c).map_or(rest.len(), |end| end + 2),
            '-' if rest.starts_with("--") => rest.find('\n').unwrap_or(rest.len()),
            '/' if rest.starts_with("/*") => rest[2..].find("*/").map_or(rest.len(), |end| end + 4),
            '$' => dollar_quoted_len(rest).unwrap_or(1),
            PLACEHOLDER if rest[1..].starts_with(PLACEHOLDER) => {
                dst.push(PLACEHOLDER);
                rest = &rest[2..];
                continue;
            }
            PLACEHOLDER => {
                placeholders += 1;
                match style {
                    PlaceholderStyle::Numbered => {
                        let _ = write!(dst, "${}", offset + placeholders);
                    }
                    PlaceholderStyle::Positional => dst.push(PLACEHOLDER),
                }
                rest = &rest[1..];
                continue;
            }
            c => c.len_utf8(),
        };
        let (copied, remaining) = rest.split_at(verbatim);
        dst.push_str(copied);
        rest = remaining;
    }
    placeholders
}

/// Length of the `$tag$ ... $tag$` string starting `text`, if it is one.
///
/// Tags cannot start with a digit, which keeps `$1` a plain parameter reference.
fn dollar_quoted_len(text: &str) -> Option<usize> {
    let tag_len = text[1..].find('$')? + 2;
    let tag = &text[..tag_len];
    let name = &tag[1..tag_len - 1];
    if name.starts_with(|c: char| c.is_ascii_digit())
        || !name.chars().all(|c| c.is_alphanumeric() || c == '_')
    {
        return None;
    }
    let body_len = text[tag_len..].find(tag)?;
    Some(tag_len + body_len + tag_len)
}
