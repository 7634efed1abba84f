//! Mapping of schema types onto relations and columns.
//!
//! A [`TypeBinding`] tells the compiler, for one named type, where its object-valued fields come
//! from (a relation correlated with the parent row), which relations provide each concrete type of
//! its interface- and union-valued fields, how its leaf fields map onto columns, and which columns
//! fields resolved outside SQL depend on. Bindings are plain closures registered up front; the
//! compiler only calls them.
use std::fmt;
use std::sync::Arc;

use apollo_compiler::Name;
use indexmap::IndexMap;

use crate::arguments::Arguments;
use crate::emit::Sql;

pub(crate) mod document;
pub(crate) mod template;

pub use document::BindingsDocument;
pub use document::ColumnDocument;
pub use document::TypeBindingDocument;
pub use template::Template;
pub use template::TemplateError;

/// Produces the relation for an object-valued field from its arguments and the parent's table
/// alias.
pub type RelationFn = dyn Fn(&Arguments, &str) -> Sql + Send + Sync;

/// Produces one relation per concrete type for an interface- or union-valued field.
pub type SubtypesFn = dyn Fn(&Arguments, &str) -> IndexMap<Name, Sql> + Send + Sync;

/// Produces the SQL expression for a leaf field.
pub type ExpressionFn = dyn Fn(&Arguments, &str) -> Sql + Send + Sync;

/// How a leaf field is read from the current row.
#[derive(Clone)]
pub enum ColumnBinding {
    /// A column of the current relation, read as `alias.column`.
    Column(String),
    /// An arbitrary expression, typically referring to the alias it is given.
    Expression(Arc<ExpressionFn>),
}

impl fmt::Debug for ColumnBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column(column) => f.debug_tuple("Column").field(column).finish(),
            Self::Expression(_) => f.write_str("Expression(..)"),
        }
    }
}

/// The binding configuration of one named type.
#[derive(Clone, Default)]
pub struct TypeBinding {
    relations: IndexMap<Name, Arc<RelationFn>>,
    subtypes: IndexMap<Name, Arc<SubtypesFn>>,
    columns: IndexMap<Name, ColumnBinding>,
    dependencies: IndexMap<Name, Vec<String>>,
}

impl TypeBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds an object-valued field to a relation.
    pub fn relation(
        mut self,
        field: Name,
        relation: impl Fn(&Arguments, &str) -> Sql + Send + Sync + 'static,
    ) -> Self {
        self.relations.insert(field, Arc::new(relation));
        self
    }

    /// Binds an interface- or union-valued field to one relation per concrete type.
    ///
    /// The concrete types are compiled in the order the returned map lists them.
    pub fn subtypes(
        mut self,
        field: Name,
        subtypes: impl Fn(&Arguments, &str) -> IndexMap<Name, Sql> + Send + Sync + 'static,
    ) -> Self {
        self.subtypes.insert(field, Arc::new(subtypes));
        self
    }

    /// Reads a leaf field from a column with a different name.
    pub fn column(mut self, field: Name, column: impl Into<String>) -> Self {
        self.columns
            .insert(field, ColumnBinding::Column(column.into()));
        self
    }

    /// Computes a leaf field with an expression.
    pub fn expression(
        mut self,
        field: Name,
        expression: impl Fn(&Arguments, &str) -> Sql + Send + Sync + 'static,
    ) -> Self {
        self.columns
            .insert(field, ColumnBinding::Expression(Arc::new(expression)));
        self
    }

    /// Declares the columns that a field resolved outside of SQL needs from the current row.
    pub fn dependencies<I>(mut self, field: Name, columns: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.dependencies
            .insert(field, columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn relation_for(&self, field: &str) -> Option<&RelationFn> {
        self.relations.get(field).map(Arc::as_ref)
    }

    pub fn subtypes_for(&self, field: &str) -> Option<&SubtypesFn> {
        self.subtypes.get(field).map(Arc::as_ref)
    }

    pub fn column_for(&self, field: &str) -> Option<&ColumnBinding> {
        self.columns.get(field)
    }

    pub fn dependencies_of(&self, field: &str) -> &[String] {
        self.dependencies
            .get(field)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether the binding provides `field` itself, as a relation, subtype set or column.
    ///
    /// Dependencies do not count: they only supply columns to fields resolved elsewhere.
    pub fn exposes(&self, field: &str) -> bool {
        self.relations.contains_key(field)
            || self.subtypes.contains_key(field)
            || self.columns.contains_key(field)
    }
}

impl fmt::Debug for TypeBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeBinding")
            .field("relations", &self.relations.keys().collect::<Vec<_>>())
            .field("subtypes", &self.subtypes.keys().collect::<Vec<_>>())
            .field("columns", &self.columns)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// Binding configurations of every type a compiled query may reach, keyed by type name.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    types: IndexMap<Name, TypeBinding>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the binding of `type_name`, replacing any previous one.
    pub fn bind(mut self, type_name: Name, binding: TypeBinding) -> Self {
        self.types.insert(type_name, binding);
        self
    }

    pub fn get(&self, type_name: &str) -> Option<&TypeBinding> {
        self.types.get(type_name)
    }
}

const _: () = {
    const fn assert_thread_safe<T: Sync + Send>() {}

    assert_thread_safe::<Bindings>();
};

#[cfg(test)]
mod tests {
    use apollo_compiler::name;
    use serde_json::json;

    use super::*;

    #[test]
    fn dependencies_do_not_expose_fields() {
        let binding = TypeBinding::new()
            .column(name!("fullName"), "full_name")
            .dependencies(name!("displayName"), ["first_name", "last_name"]);
        assert!(binding.exposes("fullName"));
        assert!(!binding.exposes("displayName"));
        assert_eq!(
            binding.dependencies_of("displayName"),
            ["first_name", "last_name"]
        );
        assert!(binding.dependencies_of("fullName").is_empty());
    }

    #[test]
    fn relations_receive_arguments_and_alias() {
        let binding = TypeBinding::new().relation(name!("posts"), |args, alias| {
            Sql::new(format!(
                "select * from posts where posts.user_id = {alias}.id limit ?"
            ))
            .bind(args.get("first").cloned().unwrap_or(json!(10)))
        });
        let relation = binding.relation_for("posts").unwrap();
        let mut args = Arguments::new();
        args.insert("first".to_owned(), json!(3));
        assert_eq!(
            relation(&args, "user"),
            Sql::with_params(
                "select * from posts where posts.user_id = user.id limit ?",
                [json!(3)]
            )
        );
    }
}
