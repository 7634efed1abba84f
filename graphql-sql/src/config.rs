use serde::Deserialize;
use serde::Serialize;

use crate::emit::PlaceholderStyle;

/// Options controlling the SQL text produced by the compiler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct CompilerConfig {
    /// How positional parameters are written in the final query.
    ///
    /// Defaults to `numbered` (`$1`, `$2`, …).
    pub placeholders: PlaceholderStyle,

    /// Whether to annotate every `from` clause with the selection path it belongs to, as in
    /// `from (select * from posts) /*users.posts*/ as post`. Useful when reading query logs.
    ///
    /// Defaults to false.
    pub annotate_paths: bool,

    /// Whether table aliases are written as quoted identifiers. Table aliases are the
    /// lower-cased type names, which can collide with reserved words (`user`, `order`).
    ///
    /// Relation and expression bindings receive the alias as written, quotes included.
    ///
    /// Defaults to false.
    pub quote_table_aliases: bool,

    /// Maximum nesting depth of a compiled selection, counting the root field as 1.
    ///
    /// Defaults to no limit: depth is then bounded by the query itself.
    pub max_depth: Option<usize>,
}
