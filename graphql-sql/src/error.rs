//! Errors raised while compiling a selection or executing the compiled query.
use std::fmt;

use apollo_compiler::Name;
use serde::Serialize;

/// The sequence of response keys leading from the root field to the field being compiled.
///
/// Aliased fields render as `alias:name` so that a path stays unambiguous when the same
/// field is selected twice under different aliases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SelectionPath(Vec<String>);

impl SelectionPath {
    #[cfg(test)]
    pub(crate) fn root(segment: impl Into<String>) -> Self {
        Self(vec![segment.into()])
    }

    pub(crate) fn push_field(&mut self, alias: Option<&Name>, name: &Name) {
        let segment = match alias {
            Some(alias) => format!("{alias}:{name}"),
            None => name.to_string(),
        };
        self.0.push(segment);
    }

    pub(crate) fn pop(&mut self) {
        self.0.pop();
    }

    /// Number of segments, which is also the nesting depth of the current field.
    pub(crate) fn depth(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for SelectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// An argument literal that cannot be turned into a bound value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgumentError {
    #[error("unsupported argument kind: {kind} (argument `{argument}`)")]
    UnsupportedKind {
        argument: Name,
        kind: &'static str,
    },
    #[error("invalid {kind} literal `{literal}` (argument `{argument}`)")]
    InvalidNumber {
        argument: Name,
        kind: &'static str,
        literal: String,
    },
}

/// A failure to compile a selection into SQL.
///
/// Every variant is fatal for the query being compiled: nothing is partially emitted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("no binding configuration for type `{type_name}`; at path {path}")]
    MissingBinding {
        type_name: Name,
        path: SelectionPath,
    },
    #[error("field `{type_name}.{field}` of {kind} type expects a relation binding; at path {path}")]
    MissingRelation {
        type_name: Name,
        field: Name,
        kind: &'static str,
        path: SelectionPath,
    },
    #[error("field `{type_name}.{field}` is bound to an empty set of subtype relations; at path {path}")]
    EmptySubtypes {
        type_name: Name,
        field: Name,
        path: SelectionPath,
    },
    #[error("type `{type_name}` is not defined in the schema; at path {path}")]
    UnknownType {
        type_name: Name,
        path: SelectionPath,
    },
    #[error("type `{type_name}` is {kind} type and cannot be selected from a relation; at path {path}")]
    UnsupportedTypeKind {
        type_name: Name,
        kind: &'static str,
        path: SelectionPath,
    },
    #[error("field type `{field_type}` nests lists, which one subquery cannot aggregate; at path {path}")]
    NestedList {
        field_type: String,
        path: SelectionPath,
    },
    #[error("field `{type_name}.{field}` is not declared by the schema and is only bound as a relation; at path {path}")]
    UndeclaredRelationField {
        type_name: Name,
        field: Name,
        path: SelectionPath,
    },
    #[error("{source}; at path {path}")]
    Argument {
        #[source]
        source: ArgumentError,
        path: SelectionPath,
    },
    #[error("fragment `{name}` is not defined in the document")]
    UnknownFragment { name: Name },
    #[error("fragment `{name}` spreads itself")]
    FragmentCycle { name: Name },
    #[error("operation {} not found in the document", .name.as_deref().map(|name| format!("`{name}`")).unwrap_or_else(|| "(anonymous)".to_owned()))]
    UnknownOperation { name: Option<String> },
    #[error("root field `{field}` has leaf type `{type_name}` and cannot be compiled to a relation")]
    LeafRootField { field: Name, type_name: Name },
    #[error("selection depth exceeds the configured maximum of {max_depth}; at path {path}")]
    DepthLimitExceeded {
        max_depth: usize,
        path: SelectionPath,
    },
    #[error("SQL fragment `{text}` has {placeholders} placeholder(s) but {params} bound parameter(s)")]
    ParameterMismatch {
        text: String,
        placeholders: usize,
        params: usize,
    },
}

/// A failure to produce rows for a compiled query.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("fetching rows for `{response_key}` failed: {source}")]
    Fetch {
        response_key: String,
        #[source]
        source: BoxError,
    },
}

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
