use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast;
use serde_json::Number;
use serde_json::Value;

use crate::error::ArgumentError;

/// Argument values of one field, keyed by argument name, in document order.
pub type Arguments = serde_json::Map<String, Value>;

/// Variable values supplied with the request.
pub type Variables = serde_json::Map<String, Value>;

/// Converts the AST arguments of a field into concrete values.
///
/// Variables are looked up in `variables`; an unbound variable leaves its argument absent
/// rather than failing, supplying a complete set is up to the caller. Literals are limited to
/// integers, floats and strings.
pub fn extract_arguments(
    arguments: &[Node<ast::Argument>],
    variables: &Variables,
) -> Result<Arguments, ArgumentError> {
    let mut extracted = Arguments::new();
    for argument in arguments {
        let value = match &*argument.value {
            ast::Value::Variable(variable) => match variables.get(variable.as_str()) {
                Some(value) => value.clone(),
                None => {
                    tracing::debug!(
                        argument = %argument.name,
                        variable = %variable,
                        "argument references an unbound variable"
                    );
                    continue;
                }
            },
            literal => parse_literal(&argument.name, literal)?,
        };
        extracted.insert(argument.name.to_string(), value);
    }
    Ok(extracted)
}

/// Parses an integer, float or string literal into its JSON value.
pub fn parse_literal(argument: &Name, value: &ast::Value) -> Result<Value, ArgumentError> {
    match value {
        ast::Value::Int(int) => {
            let literal = int.as_str();
            literal
                .parse::<i64>()
                .map(Value::from)
                .or_else(|_| {
                    literal
                        .parse::<f64>()
                        .ok()
                        .and_then(Number::from_f64)
                        .map(Value::Number)
                        .ok_or(())
                })
                .map_err(|()| invalid_number(argument, "IntValue", literal))
        }
        ast::Value::Float(float) => {
            let literal = float.as_str();
            literal
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| invalid_number(argument, "FloatValue", literal))
        }
        ast::Value::String(string) => Ok(Value::String(string.clone())),
        other => Err(ArgumentError::UnsupportedKind {
            argument: argument.clone(),
            kind: kind_of(other),
        }),
    }
}

fn invalid_number(argument: &Name, kind: &'static str, literal: &str) -> ArgumentError {
    ArgumentError::InvalidNumber {
        argument: argument.clone(),
        kind,
        literal: literal.to_owned(),
    }
}

/// The GraphQL AST node kind of a value, as the GraphQL grammar names it.
fn kind_of(value: &ast::Value) -> &'static str {
    match value {
        ast::Value::Null => "NullValue",
        ast::Value::Enum(_) => "EnumValue",
        ast::Value::Variable(_) => "Variable",
        ast::Value::String(_) => "StringValue",
        ast::Value::Float(_) => "FloatValue",
        ast::Value::Int(_) => "IntValue",
        ast::Value::Boolean(_) => "BooleanValue",
        ast::Value::List(_) => "ListValue",
        ast::Value::Object(_) => "ObjectValue",
    }
}

#[cfg(test)]
mod tests {
    use apollo_compiler::ExecutableDocument;
    use apollo_compiler::executable::Selection;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn field_arguments(query: &str) -> Vec<Node<ast::Argument>> {
        let executable = ExecutableDocument::parse(&schema(), query, "query.graphql").unwrap();
        let operation = executable.operations.get(None).unwrap();
        let Selection::Field(field) = &operation.selection_set.selections[0] else {
            panic!("expected a field");
        };
        field.arguments.clone()
    }

    fn schema() -> apollo_compiler::validation::Valid<apollo_compiler::Schema> {
        apollo_compiler::Schema::parse_and_validate(
            r#"
            enum Order { ASC DESC }
            input Range { from: Int }
            type Query {
              posts(first: Int, ratio: Float, tag: String, flag: Boolean, order: Order,
                    ids: [ID], range: Range, note: String): [String]
            }
            "#,
            "schema.graphql",
        )
        .unwrap()
    }

    #[test]
    fn parses_supported_literals() {
        let arguments = field_arguments(r#"{ posts(first: 10, ratio: 0.5, tag: "rust") }"#);
        let extracted = extract_arguments(&arguments, &Variables::new()).unwrap();
        assert_eq!(
            Value::Object(extracted),
            json!({ "first": 10, "ratio": 0.5, "tag": "rust" })
        );
    }

    #[test]
    fn resolves_variables() {
        let arguments =
            field_arguments(r#"query($n: Int, $t: String) { posts(first: $n, tag: $t) }"#);
        let mut variables = Variables::new();
        variables.insert("n".to_owned(), json!(3));
        variables.insert("t".to_owned(), json!(["lists", "pass", "through"]));
        let extracted = extract_arguments(&arguments, &variables).unwrap();
        assert_eq!(
            Value::Object(extracted),
            json!({ "first": 3, "tag": ["lists", "pass", "through"] })
        );
    }

    #[test]
    fn unbound_variables_are_absent() {
        let arguments = field_arguments(r#"query($n: Int) { posts(first: $n, tag: "x") }"#);
        let extracted = extract_arguments(&arguments, &Variables::new()).unwrap();
        assert_eq!(Value::Object(extracted), json!({ "tag": "x" }));
    }

    #[rstest]
    #[case(r#"{ posts(flag: true) }"#, "BooleanValue")]
    #[case(r#"{ posts(order: ASC) }"#, "EnumValue")]
    #[case(r#"{ posts(ids: ["1"]) }"#, "ListValue")]
    #[case(r#"{ posts(range: { from: 1 }) }"#, "ObjectValue")]
    #[case(r#"{ posts(note: null) }"#, "NullValue")]
    fn rejects_other_literal_kinds(#[case] query: &str, #[case] kind: &str) {
        let arguments = field_arguments(query);
        let err = extract_arguments(&arguments, &Variables::new()).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("unsupported argument kind: {kind} (argument `{}`)", arguments[0].name)
        );
    }
}
