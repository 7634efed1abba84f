//! Running compiled queries through a caller-provided database connection.
use apollo_compiler::ExecutableDocument;
use async_trait::async_trait;
use serde_json::Map;
use serde_json::Value;

use crate::arguments::Variables;
use crate::compiler::CompiledQuery;
use crate::compiler::Compiler;
use crate::error::BoxError;
use crate::error::ExecutionError;

/// What a [`RowFetcher`] returns for one query.
#[derive(Debug, Clone, PartialEq)]
pub enum Rows {
    /// A single value, used as the field's value unchanged.
    One(Value),
    /// One JSON value per row, in the order the database returned them.
    Many(Vec<Value>),
}

/// Submits query text and positional parameters to a database.
///
/// Each row of a compiled query is a JSON object keyed by response key, so implementations
/// usually wrap the query as `select to_json(q) from (<sql>) q` or read the row as JSON.
#[async_trait]
pub trait RowFetcher: Send + Sync {
    async fn fetch_rows(&self, sql: &str, params: &[Value]) -> Result<Rows, BoxError>;
}

/// Fetches the value of one compiled root field.
///
/// A field that is not a list reads the first row of the result, or null when there is none.
pub async fn execute<F>(compiled: &CompiledQuery, fetcher: &F) -> Result<Value, BoxError>
where
    F: RowFetcher + ?Sized,
{
    let rows = fetcher.fetch_rows(&compiled.sql, &compiled.params).await?;
    Ok(match rows {
        Rows::One(value) => value,
        Rows::Many(rows) if compiled.shape.is_list => Value::Array(rows),
        Rows::Many(rows) => rows.into_iter().next().unwrap_or(Value::Null),
    })
}

/// Compiles every root field of an operation and fetches them one after the other.
///
/// The result maps each response key to its value, in selection order. Nothing is fetched when
/// any root field fails to compile.
#[tracing::instrument(level = "debug", skip_all, fields(operation = operation_name))]
pub async fn execute_operation<F>(
    compiler: &Compiler<'_>,
    document: &ExecutableDocument,
    operation_name: Option<&str>,
    variables: &Variables,
    fetcher: &F,
) -> Result<Value, ExecutionError>
where
    F: RowFetcher + ?Sized,
{
    let compiled = compiler.compile_operation(document, operation_name, variables)?;
    let mut data = Map::new();
    for (response_key, query) in &compiled {
        let value = execute(query, fetcher)
            .await
            .map_err(|source| ExecutionError::Fetch {
                response_key: response_key.to_string(),
                source,
            })?;
        data.insert(response_key.to_string(), value);
    }
    Ok(Value::Object(data))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use apollo_compiler::name;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::shape::TypeKind;
    use crate::shape::TypeShape;

    struct Canned {
        rows: Rows,
        seen: Mutex<Vec<(String, Vec<Value>)>>,
    }

    impl Canned {
        fn new(rows: Rows) -> Self {
            Self {
                rows,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RowFetcher for Canned {
        async fn fetch_rows(&self, sql: &str, params: &[Value]) -> Result<Rows, BoxError> {
            self.seen
                .lock()
                .unwrap()
                .push((sql.to_owned(), params.to_vec()));
            Ok(self.rows.clone())
        }
    }

    fn query(is_list: bool) -> CompiledQuery {
        CompiledQuery {
            sql: "select user.id as \"id\" from (select * from users where id = $1) as user"
                .to_owned(),
            params: vec![json!(7)],
            shape: TypeShape {
                named_type: name!("User"),
                is_list,
                is_non_null: false,
                kind: TypeKind::Object,
            },
        }
    }

    #[tokio::test]
    async fn single_objects_read_the_first_row() {
        let fetcher = Canned::new(Rows::Many(vec![json!({"id": 7}), json!({"id": 8})]));
        let value = execute(&query(false), &fetcher).await.unwrap();
        assert_eq!(value, json!({"id": 7}));
        assert_eq!(
            fetcher.seen.lock().unwrap().as_slice(),
            [(query(false).sql, vec![json!(7)])]
        );
    }

    #[tokio::test]
    async fn missing_single_objects_are_null() {
        let fetcher = Canned::new(Rows::Many(Vec::new()));
        assert_eq!(execute(&query(false), &fetcher).await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn lists_keep_every_row() {
        let fetcher = Canned::new(Rows::Many(vec![json!({"id": 7}), json!({"id": 8})]));
        let value = execute(&query(true), &fetcher).await.unwrap();
        assert_eq!(value, json!([{"id": 7}, {"id": 8}]));

        let fetcher = Canned::new(Rows::One(json!([{"id": 9}])));
        let value = execute(&query(true), &fetcher).await.unwrap();
        assert_eq!(value, json!([{"id": 9}]));
    }
}
