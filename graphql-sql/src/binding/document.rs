use apollo_compiler::Name;
use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;

use super::Bindings;
use super::Template;
use super::TypeBinding;
use crate::config::CompilerConfig;

/// Bindings written as data rather than closures, loaded from YAML or JSON.
///
/// ```yaml
/// compiler:
///   placeholders: numbered
/// types:
///   Query:
///     relations:
///       users: "select * from users"
///   User:
///     columns:
///       fullName: full_name
///       score: { expression: "{alias}.score * {arg:factor}" }
///     relations:
///       posts: "select * from posts where posts.user_id = {alias}.id limit {arg:first}"
///     subtypes:
///       feed:
///         Post: "select * from posts where posts.user_id = {alias}.id"
///         Photo: "select * from photos where photos.user_id = {alias}.id"
///     dependencies:
///       displayName: [first_name, last_name]
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BindingsDocument {
    /// Options for the compiler using these bindings.
    #[serde(default)]
    pub compiler: CompilerConfig,

    /// Binding of each type, keyed by type name.
    #[serde(default)]
    pub types: IndexMap<Name, TypeBindingDocument>,
}

/// The bindings of one type in a [`BindingsDocument`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct TypeBindingDocument {
    /// Leaf fields read from a differently named column or computed by an expression.
    pub columns: IndexMap<Name, ColumnDocument>,

    /// Object-valued fields and the relation each one reads from.
    pub relations: IndexMap<Name, Template>,

    /// Interface- and union-valued fields and the relation of each concrete type, in the order
    /// they are compiled.
    pub subtypes: IndexMap<Name, IndexMap<Name, Template>>,

    /// Columns needed by fields that are resolved outside of SQL.
    pub dependencies: IndexMap<Name, Vec<String>>,
}

/// A leaf field binding: a bare column name, or `{ expression: "..." }`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ColumnDocument {
    Column(String),
    Expression { expression: Template },
}

impl BindingsDocument {
    pub fn from_yaml(source: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(source)
    }

    /// Builds the closures evaluating each template.
    pub fn to_bindings(&self) -> Bindings {
        self.types
            .iter()
            .fold(Bindings::new(), |bindings, (type_name, document)| {
                bindings.bind(type_name.clone(), document.to_binding())
            })
    }
}

impl TypeBindingDocument {
    pub fn to_binding(&self) -> TypeBinding {
        let mut binding = TypeBinding::new();
        for (field, column) in &self.columns {
            binding = match column {
                ColumnDocument::Column(column) => binding.column(field.clone(), column.clone()),
                ColumnDocument::Expression { expression } => {
                    let expression = expression.clone();
                    binding.expression(field.clone(), move |arguments, alias| {
                        expression.render(arguments, alias)
                    })
                }
            };
        }
        for (field, relation) in &self.relations {
            let relation = relation.clone();
            binding = binding.relation(field.clone(), move |arguments, alias| {
                relation.render(arguments, alias)
            });
        }
        for (field, subtypes) in &self.subtypes {
            let subtypes = subtypes.clone();
            binding = binding.subtypes(field.clone(), move |arguments, alias| {
                subtypes
                    .iter()
                    .map(|(type_name, relation)| {
                        (type_name.clone(), relation.render(arguments, alias))
                    })
                    .collect()
            });
        }
        for (field, columns) in &self.dependencies {
            binding = binding.dependencies(field.clone(), columns.iter().cloned());
        }
        binding
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::arguments::Arguments;
    use crate::binding::ColumnBinding;
    use crate::emit::PlaceholderStyle;
    use crate::emit::Sql;

    const DOCUMENT: &str = r#"
compiler:
  placeholders: positional
  annotate_paths: true
types:
  User:
    columns:
      fullName: full_name
      score: { expression: "{alias}.score * {arg:factor}" }
    relations:
      posts: "select * from posts where posts.user_id = {alias}.id limit {arg:first}"
    subtypes:
      feed:
        Post: "select * from posts where posts.user_id = {alias}.id"
        Photo: "select * from photos where photos.user_id = {alias}.id"
    dependencies:
      displayName: [first_name, last_name]
"#;

    #[test]
    fn loads_yaml_into_bindings() {
        let document = BindingsDocument::from_yaml(DOCUMENT).unwrap();
        assert_eq!(document.compiler.placeholders, PlaceholderStyle::Positional);
        assert!(document.compiler.annotate_paths);

        let bindings = document.to_bindings();
        let user = bindings.get("User").unwrap();
        let mut arguments = Arguments::new();
        arguments.insert("first".to_owned(), json!(2));
        arguments.insert("factor".to_owned(), json!(1.5));

        assert!(matches!(
            user.column_for("fullName"),
            Some(ColumnBinding::Column(column)) if column == "full_name"
        ));
        let Some(ColumnBinding::Expression(score)) = user.column_for("score") else {
            panic!("score is an expression");
        };
        assert_eq!(
            score(&arguments, "user"),
            Sql::with_params("user.score * ?", [json!(1.5)])
        );
        assert_eq!(
            user.relation_for("posts").unwrap()(&arguments, "user"),
            Sql::with_params(
                "select * from posts where posts.user_id = user.id limit ?",
                [json!(2)]
            )
        );
        let feed = user.subtypes_for("feed").unwrap()(&arguments, "user");
        assert_eq!(
            feed.keys().map(|name| name.as_str()).collect::<Vec<_>>(),
            ["Post", "Photo"]
        );
        assert_eq!(user.dependencies_of("displayName"), ["first_name", "last_name"]);
    }

    #[test]
    fn rejects_unknown_keys_and_bad_templates() {
        let err = BindingsDocument::from_yaml("types: { User: { tables: {} } }").unwrap_err();
        assert!(err.to_string().contains("unknown field `tables`"));

        let err =
            BindingsDocument::from_yaml("types: { User: { relations: { posts: '{table}' } } }")
                .unwrap_err();
        assert!(err.to_string().contains("unknown substitution `{table}`"));
    }
}
