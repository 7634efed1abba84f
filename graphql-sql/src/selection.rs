use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::executable::Field;
use apollo_compiler::executable::FragmentMap;
use apollo_compiler::executable::Selection;
use apollo_compiler::executable::SelectionSet;

use crate::error::CompileError;

/// Prefix reserved by GraphQL for introspection fields such as `__typename`.
const INTROSPECTION_PREFIX: &str = "__";

/// Expands fragment spreads and inline fragments of `selection_set` into the fields they select.
///
/// At every level, direct fields come first in document order, then the fields of each fragment
/// spread in the order the spreads appear, then the fields of accepted inline fragments. An inline
/// fragment is accepted when `allowed_types` is empty or contains its type condition, and the same
/// restriction applies to the fragments nested inside it. Introspection fields are dropped at every
/// level.
///
/// Fields sharing a response key are not merged: each occurrence is returned, with its own
/// sub-selection.
pub fn flatten_selections<'doc>(
    selection_set: &'doc SelectionSet,
    fragments: &'doc FragmentMap,
    allowed_types: &[Name],
) -> Result<Vec<&'doc Node<Field>>, CompileError> {
    let mut flattener = Flattener {
        fragments,
        allowed_types,
        expanding: Vec::new(),
    };
    let mut fields = Vec::new();
    flattener.collect(selection_set, &mut fields)?;
    Ok(fields)
}

struct Flattener<'doc, 'a> {
    fragments: &'doc FragmentMap,
    allowed_types: &'a [Name],
    /// Named fragments currently being expanded, to fail on cycles instead of recursing forever.
    expanding: Vec<&'doc Name>,
}

impl<'doc> Flattener<'doc, '_> {
    fn collect(
        &mut self,
        selection_set: &'doc SelectionSet,
        fields: &mut Vec<&'doc Node<Field>>,
    ) -> Result<(), CompileError> {
        fields.extend(
            selection_set
                .selections
                .iter()
                .filter_map(|selection| match selection {
                    Selection::Field(field) => Some(field),
                    _ => None,
                })
                .filter(|field| !field.name.starts_with(INTROSPECTION_PREFIX)),
        );

        for selection in &selection_set.selections {
            let Selection::FragmentSpread(spread) = selection else {
                continue;
            };
            let Some((name, fragment)) = self.fragments.get_key_value(&spread.fragment_name)
            else {
                return Err(CompileError::UnknownFragment {
                    name: spread.fragment_name.clone(),
                });
            };
            if self.expanding.contains(&name) {
                return Err(CompileError::FragmentCycle { name: name.clone() });
            }
            self.expanding.push(name);
            self.collect(&fragment.selection_set, fields)?;
            self.expanding.pop();
        }

        for selection in &selection_set.selections {
            let Selection::InlineFragment(inline) = selection else {
                continue;
            };
            if self.accepts(inline.type_condition.as_ref()) {
                self.collect(&inline.selection_set, fields)?;
            }
        }
        Ok(())
    }

    fn accepts(&self, type_condition: Option<&Name>) -> bool {
        match type_condition {
            Some(type_condition) => {
                self.allowed_types.is_empty() || self.allowed_types.contains(type_condition)
            }
            // `... @include(if: $x) { }` applies to the enclosing type
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use apollo_compiler::ExecutableDocument;
    use apollo_compiler::Schema;
    use apollo_compiler::name;
    use apollo_compiler::validation::Valid;
    use pretty_assertions::assert_eq;

    use super::*;

    fn schema() -> Valid<Schema> {
        Schema::parse_and_validate(
            r#"
            type Query { node: Node me: User }
            interface Node { id: ID! }
            type User implements Node { id: ID! a: Int b: Int c: Int d: Int e: Int }
            type Post implements Node { id: ID! title: String }
            "#,
            "schema.graphql",
        )
        .unwrap()
    }

    fn flattened(query: &str, root_field: &str, allowed_types: &[Name]) -> Vec<String> {
        let document = ExecutableDocument::parse(&schema(), query, "query.graphql").unwrap();
        let operation = document.operations.get(None).unwrap();
        let field = operation
            .selection_set
            .selections
            .iter()
            .find_map(|selection| match selection {
                Selection::Field(field) if field.name.as_str() == root_field => Some(field),
                _ => None,
            })
            .unwrap();
        flatten_selections(&field.selection_set, &document.fragments, allowed_types)
            .unwrap()
            .into_iter()
            .map(|field| field.response_key().to_string())
            .collect()
    }

    #[test]
    fn direct_fields_precede_fragment_fields() {
        let query = r#"
            { me { c: a ...Rest b } }
            fragment Rest on User { d e }
        "#;
        assert_eq!(flattened(query, "me", &[]), ["c", "b", "d", "e"]);
    }

    #[test]
    fn fragment_spreads_precede_inline_fragments() {
        let query = r#"
            { me { ... on User { e } a ...Named } }
            fragment Named on User { b ...Nested }
            fragment Nested on User { c }
        "#;
        assert_eq!(flattened(query, "me", &[]), ["a", "b", "c", "e"]);
    }

    #[test]
    fn restricts_inline_fragments_to_allowed_types() {
        let query = r#"
            { node { id ... on User { a } ... on Post { title } ... { __typename nodeId: id } } }
        "#;
        assert_eq!(flattened(query, "node", &[]), ["id", "a", "title", "nodeId"]);
        assert_eq!(
            flattened(query, "node", &[name!("Post")]),
            ["id", "title", "nodeId"]
        );
        assert_eq!(flattened(query, "node", &[name!("User")]), ["id", "a", "nodeId"]);
    }

    #[test]
    fn drops_introspection_fields_at_every_level() {
        let query = r#"
            { me { __typename a ...Named ... on User { __typename b } } }
            fragment Named on User { __typename c }
        "#;
        assert_eq!(flattened(query, "me", &[]), ["a", "c", "b"]);
    }

    #[test]
    fn repeated_response_keys_are_kept() {
        let query = r#"
            { me { a b ...Again } }
            fragment Again on User { a c }
        "#;
        assert_eq!(flattened(query, "me", &[]), ["a", "b", "a", "c"]);
    }

    #[test]
    fn unknown_fragments_are_reported() {
        let query = "{ me { a ...Missing } }";
        let document = ExecutableDocument::parse(&schema(), query, "query.graphql")
            .unwrap_or_else(|invalid| invalid.partial);
        let operation = document.operations.get(None).unwrap();
        let Selection::Field(me) = &operation.selection_set.selections[0] else {
            panic!("expected a field");
        };
        let err = flatten_selections(&me.selection_set, &document.fragments, &[]).unwrap_err();
        assert_eq!(
            err,
            CompileError::UnknownFragment {
                name: name!("Missing")
            }
        );
        assert_eq!(err.to_string(), "fragment `Missing` is not defined in the document");
    }

    #[test]
    fn fragment_cycles_fail_fast() {
        // Built without validation, which would otherwise reject the cycle up front.
        let query = r#"
            { me { ...A } }
            fragment A on User { a ...B }
            fragment B on User { b ...A }
        "#;
        let document = ExecutableDocument::parse(&schema(), query, "query.graphql").unwrap();
        let operation = document.operations.get(None).unwrap();
        let Selection::Field(me) = &operation.selection_set.selections[0] else {
            panic!("expected a field");
        };
        let err = flatten_selections(&me.selection_set, &document.fragments, &[]).unwrap_err();
        assert_eq!(err, CompileError::FragmentCycle { name: name!("A") });
    }
}
