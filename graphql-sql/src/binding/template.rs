use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde_json::Value;

use crate::arguments::Arguments;
use crate::emit::Sql;

/// A malformed SQL template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("unclosed `{{` at byte {offset} in template `{template}`")]
    Unclosed { template: String, offset: usize },
    #[error("unmatched `}}` at byte {offset} in template `{template}`")]
    Unmatched { template: String, offset: usize },
    #[error("unknown substitution `{{{name}}}` in template `{template}`")]
    UnknownSubstitution { template: String, name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Alias,
    Argument(String),
}

/// SQL text with `{alias}` and `{arg:NAME}` substitutions, as written in a bindings document.
///
/// `{alias}` becomes the table alias of the row the template is evaluated against and
/// `{arg:NAME}` becomes a placeholder bound to the field argument `NAME` (null when absent).
/// `{{` and `}}` stand for literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut rest = source.char_indices().peekable();
        while let Some((offset, c)) = rest.next() {
            match c {
                '{' if matches!(rest.peek(), Some((_, '{'))) => {
                    rest.next();
                    text.push('{');
                }
                '}' if matches!(rest.peek(), Some((_, '}'))) => {
                    rest.next();
                    text.push('}');
                }
                '}' => {
                    return Err(TemplateError::Unmatched {
                        template: source.to_owned(),
                        offset,
                    });
                }
                '{' => {
                    let Some(len) = source[offset + 1..].find('}') else {
                        return Err(TemplateError::Unclosed {
                            template: source.to_owned(),
                            offset,
                        });
                    };
                    let name = &source[offset + 1..offset + 1 + len];
                    let segment = match name.split_once(':') {
                        None if name == "alias" => Segment::Alias,
                        Some(("arg", argument)) if !argument.is_empty() => {
                            Segment::Argument(argument.to_owned())
                        }
                        _ => {
                            return Err(TemplateError::UnknownSubstitution {
                                template: source.to_owned(),
                                name: name.to_owned(),
                            });
                        }
                    };
                    if !text.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut text)));
                    }
                    segments.push(segment);
                    while rest.next_if(|(i, _)| *i <= offset + 1 + len).is_some() {}
                }
                c => text.push(c),
            }
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }
        Ok(Self {
            source: source.to_owned(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Names of the arguments the template binds, in order of appearance.
    pub fn arguments(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Argument(name) => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn render(&self, arguments: &Arguments, alias: &str) -> Sql {
        let mut sql = Sql::default();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => sql.text.push_str(text),
                Segment::Alias => sql.text.push_str(alias),
                Segment::Argument(name) => {
                    sql.text.push('?');
                    sql.params
                        .push(arguments.get(name).cloned().unwrap_or(Value::Null));
                }
            }
        }
        sql
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

impl Serialize for Template {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for Template {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Self::parse(&source).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn substitutes_alias_and_arguments() {
        let template = Template::parse(
            "select * from posts where posts.user_id = {alias}.id and kind = {arg:kind} limit {arg:first}",
        )
        .unwrap();
        let mut arguments = Arguments::new();
        arguments.insert("first".to_owned(), json!(5));
        let sql = template.render(&arguments, "user");
        assert_eq!(
            sql.text,
            "select * from posts where posts.user_id = user.id and kind = ? limit ?"
        );
        assert_eq!(sql.params, [Value::Null, json!(5)]);
        assert_eq!(template.arguments().collect::<Vec<_>>(), ["kind", "first"]);
    }

    #[test]
    fn doubled_braces_are_literal() {
        let template = Template::parse("select '{{}}'::jsonb, {alias}.tags").unwrap();
        assert_eq!(
            template.render(&Arguments::new(), "post").text,
            "select '{}'::jsonb, post.tags"
        );
    }

    #[test]
    fn rejects_malformed_templates() {
        assert!(matches!(
            Template::parse("select {alias"),
            Err(TemplateError::Unclosed { offset: 7, .. })
        ));
        assert!(matches!(
            Template::parse("select } from x"),
            Err(TemplateError::Unmatched { offset: 7, .. })
        ));
        assert_eq!(
            Template::parse("select {table}.id").unwrap_err().to_string(),
            "unknown substitution `{table}` in template `select {table}.id`"
        );
        assert!(Template::parse("select {arg:}").is_err());
    }
}
