//! Compiles a GraphQL selection into a single nested SQL query whose rows are JSON.
//!
//! ## Usage
//!
//! Describe where each type's fields live with [`Bindings`], then compile an operation:
//!
//! ```
//! use apollo_compiler::ExecutableDocument;
//! use apollo_compiler::Schema;
//! use apollo_compiler::name;
//! use graphql_sql::Bindings;
//! use graphql_sql::Compiler;
//! use graphql_sql::Sql;
//! use graphql_sql::TypeBinding;
//!
//! let schema = Schema::parse_and_validate(
//!     "type Query { users: [User!]! } type User { id: ID! name: String }",
//!     "schema.graphql",
//! )
//! .unwrap();
//! let bindings = Bindings::new()
//!     .bind(
//!         name!("Query"),
//!         TypeBinding::new().relation(name!("users"), |_, _| Sql::new("select * from users")),
//!     )
//!     .bind(name!("User"), TypeBinding::new());
//! let document =
//!     ExecutableDocument::parse_and_validate(&schema, "{ users { id name } }", "query.graphql")
//!         .unwrap();
//!
//! let compiled = Compiler::new(&schema, &bindings)
//!     .compile_operation(&document, None, &Default::default())
//!     .unwrap();
//! assert_eq!(
//!     compiled["users"].sql,
//!     r#"select user.id as "id", user.name as "name" from (select * from users) as user"#
//! );
//! ```
//!
//! ## Query shape
//!
//! - Leaf fields are columns of the current relation (`alias.column as "responseKey"`), or
//!   expressions supplied by the type's binding.
//! - Object fields are correlated subqueries: `(select json_agg(x) from (…) x)` for lists,
//!   `(select to_json(x) from (…) x)` for single objects. Non-null lists are coalesced to `'[]'`.
//! - Interface and union fields are a `union all` of one subquery per concrete type the binding
//!   lists, each tagged with a `"$type"` column.
//! - Fields the schema does not declare and the binding does not expose are resolved elsewhere;
//!   they only contribute the dependency columns the binding declares for them.
//!
//! Bound values never appear in the query text: every value is a positional parameter, numbered
//! in the order the text is emitted.

#![warn(
    rustdoc::broken_intra_doc_links,
    unreachable_pub,
    unreachable_patterns,
    unused,
    unused_qualifications,
    dead_code,
    while_true,
    unconditional_panic,
    clippy::all
)]

pub mod arguments;
pub mod binding;
pub mod compiler;
pub mod config;
pub mod emit;
pub mod error;
pub mod execute;
pub mod selection;
pub mod shape;

pub use crate::arguments::Arguments;
pub use crate::arguments::Variables;
pub use crate::binding::Bindings;
pub use crate::binding::BindingsDocument;
pub use crate::binding::TypeBinding;
pub use crate::compiler::CompiledQuery;
pub use crate::compiler::Compiler;
pub use crate::config::CompilerConfig;
pub use crate::emit::PlaceholderStyle;
pub use crate::emit::Sql;
pub use crate::error::CompileError;
pub use crate::error::ExecutionError;
pub use crate::execute::RowFetcher;
pub use crate::execute::Rows;
pub use crate::execute::execute;
pub use crate::execute::execute_operation;
pub use crate::shape::TypeKind;
pub use crate::shape::TypeShape;
