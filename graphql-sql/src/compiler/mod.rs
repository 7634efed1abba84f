//! Compiles a GraphQL selection into one nested SQL query returning JSON.
//!
//! Every object-valued field becomes a correlated subquery aggregated with `json_agg` (lists) or
//! `to_json` (single objects). Interface- and union-valued fields become a `union all` of one
//! subquery per concrete type bound to the field, each row tagged with a `$type` column. Leaf
//! fields become plain columns or bound expressions of the current relation.
use apollo_compiler::ExecutableDocument;
use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::Schema;
use apollo_compiler::ast;
use apollo_compiler::executable::Field;
use apollo_compiler::executable::FragmentMap;
use apollo_compiler::executable::SelectionSet;
use apollo_compiler::schema::ExtendedType;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::arguments::Variables;
use crate::arguments::extract_arguments;
use crate::binding::Bindings;
use crate::binding::ColumnBinding;
use crate::binding::TypeBinding;
use crate::config::CompilerConfig;
use crate::emit::CompiledSql;
use crate::emit::Emission;
use crate::emit::Sql;
use crate::error::CompileError;
use crate::error::SelectionPath;
use crate::selection::flatten_selections;
use crate::shape::TypeKind;
use crate::shape::TypeShape;
use crate::shape::classify;


/// Name of the column tagging each row of a polymorphic field with its concrete type.
pub const DISCRIMINATOR: &str = "$type";

/// A root field compiled to a single query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    /// Query text, with placeholders rendered in the configured style.
    pub sql: String,
    /// Values of the placeholders, in order.
    pub params: Vec<Value>,
    /// Shape of the root field. The query yields one JSON value per row, and a root field that
    /// is not a list reads only the first row.
    pub shape: TypeShape,
}

/// Compiles selections against a schema and the bindings of its types.
#[derive(Debug, Clone)]
pub struct Compiler<'a> {
    schema: &'a Schema,
    bindings: &'a Bindings,
    config: CompilerConfig,
}

impl<'a> Compiler<'a> {
    /// `schema` may declare fewer fields than the schema documents were validated against.
    /// A selected field that it lacks and that the bindings do not expose is resolved outside
    /// SQL, and only adds its dependency columns to the query.
    pub fn new(schema: &'a Schema, bindings: &'a Bindings) -> Self {
        Self {
            schema,
            bindings,
            config: CompilerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: CompilerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compiles `field` to a query selecting from `relation`.
    ///
    /// `field` must be an object-, interface- or union-valued field of `document`, whose
    /// fragments are used to expand spreads. Polymorphic root fields are compiled against their
    /// named type's own binding, so `relation` must already produce rows of that type.
    #[tracing::instrument(level = "trace", skip_all, name = "Compiler::compile_field", fields(field = %field.name))]
    pub fn compile_field(
        &self,
        document: &ExecutableDocument,
        field: &Field,
        variables: &Variables,
        relation: Sql,
    ) -> Result<CompiledQuery, CompileError> {
        let mut path = SelectionPath::default();
        path.push_field(field.alias.as_ref(), &field.name);
        let shape = self.root_shape(field, &path)?;
        self.compile_root(document, field, shape, path, variables, relation)
    }

    /// Compiles every root field of an operation, keyed by response key.
    ///
    /// The relation of each root field comes from the binding of the operation's root type,
    /// evaluated with the field's arguments and the root type's table alias.
    #[tracing::instrument(level = "trace", skip_all, name = "Compiler::compile_operation")]
    pub fn compile_operation(
        &self,
        document: &ExecutableDocument,
        operation_name: Option<&str>,
        variables: &Variables,
    ) -> Result<IndexMap<Name, CompiledQuery>, CompileError> {
        let operation =
            document
                .operations
                .get(operation_name)
                .map_err(|_| CompileError::UnknownOperation {
                    name: operation_name.map(ToOwned::to_owned),
                })?;
        let root_type = &operation.selection_set.ty;
        let alias = self.table_alias(root_type);

        let mut compiled = IndexMap::new();
        for field in flatten_selections(&operation.selection_set, &document.fragments, &[])? {
            let mut path = SelectionPath::default();
            path.push_field(field.alias.as_ref(), &field.name);
            let shape = self.root_shape(field, &path)?;
            let binding = self.binding(root_type, &path)?;
            let Some(relation) = binding.relation_for(&field.name) else {
                return Err(CompileError::MissingRelation {
                    type_name: root_type.clone(),
                    field: field.name.clone(),
                    kind: shape.kind.describe(),
                    path,
                });
            };
            let arguments = extract_arguments(&field.arguments, variables).map_err(|source| {
                CompileError::Argument {
                    source,
                    path: path.clone(),
                }
            })?;
            let relation = relation(&arguments, &alias);
            let query = self.compile_root(document, field, shape, path, variables, relation)?;
            compiled.insert(field.response_key().clone(), query);
        }
        Ok(compiled)
    }

    fn root_shape(&self, field: &Field, path: &SelectionPath) -> Result<TypeShape, CompileError> {
        let shape = TypeShape::resolve(self.schema, &field.definition.ty, path)?;
        if shape.kind == TypeKind::Leaf {
            return Err(CompileError::LeafRootField {
                field: field.name.clone(),
                type_name: shape.named_type,
            });
        }
        Ok(shape)
    }

    fn compile_root(
        &self,
        document: &ExecutableDocument,
        field: &Field,
        shape: TypeShape,
        path: SelectionPath,
        variables: &Variables,
        relation: Sql,
    ) -> Result<CompiledQuery, CompileError> {
        let mut walk = Walk {
            compiler: self,
            fragments: &document.fragments,
            variables,
            emission: Emission::new(),
            path,
        };
        walk.compile_selection(&shape.named_type, &field.selection_set, relation, None, &[])?;
        let CompiledSql { sql, params } = walk.emission.finish(self.config.placeholders)?;
        tracing::debug!(
            field = %field.response_key(),
            params = params.len(),
            sql = %sql,
            "compiled root field"
        );
        Ok(CompiledQuery { sql, params, shape })
    }

    fn binding(&self, type_name: &Name, path: &SelectionPath) -> Result<&'a TypeBinding, CompileError> {
        self.bindings
            .get(type_name)
            .ok_or_else(|| CompileError::MissingBinding {
                type_name: type_name.clone(),
                path: path.clone(),
            })
    }

    /// The alias rows of `type_name` are selected under: the lower-cased type name.
    fn table_alias(&self, type_name: &Name) -> String {
        let alias = type_name.to_lowercase();
        if self.config.quote_table_aliases {
            format!("\"{alias}\"")
        } else {
            alias
        }
    }
}

/// State of one root field's compilation.
struct Walk<'c, 'doc> {
    compiler: &'c Compiler<'c>,
    fragments: &'doc FragmentMap,
    variables: &'doc Variables,
    emission: Emission,
    /// Path of the field whose selection is being compiled.
    path: SelectionPath,
}

impl<'c, 'doc> Walk<'c, 'doc> {
    /// Emits `select <columns> from (<relation>) as <alias>` for rows of `type_name`.
    ///
    /// `discriminator` is set for the branches of a polymorphic field and adds the `$type`
    /// column. `allowed_types` restricts which inline fragments apply.
    fn compile_selection(
        &mut self,
        type_name: &Name,
        selection_set: &'doc SelectionSet,
        relation: Sql,
        discriminator: Option<&Name>,
        allowed_types: &[Name],
    ) -> Result<(), CompileError> {
        let max_depth = self.compiler.config.max_depth;
        if let Some(max_depth) = max_depth.filter(|max_depth| self.path.depth() > *max_depth) {
            return Err(CompileError::DepthLimitExceeded {
                max_depth,
                path: self.path.clone(),
            });
        }
        let schema_type = self.schema_type(type_name)?;
        let binding = self.compiler.binding(type_name, &self.path)?;
        let alias = self.compiler.table_alias(type_name);

        let (resolvable, excluded): (Vec<_>, Vec<_>) =
            flatten_selections(selection_set, self.fragments, allowed_types)?
                .into_iter()
                .partition(|field| {
                    declared_field_type(schema_type, &field.name).is_some()
                        || binding.exposes(&field.name)
                });

        self.emission.push("select ");
        let mut columns: Vec<String> = Vec::new();
        if let Some(subtype) = discriminator {
            self.emission.push(format!(
                "coalesce(to_json({alias}.*) ->> '{DISCRIMINATOR}', '{subtype}') as \"{DISCRIMINATOR}\""
            ));
            columns.push(DISCRIMINATOR.to_owned());
        }
        for field in resolvable {
            if !columns.is_empty() {
                self.emission.push(", ");
            }
            self.compile_column(type_name, schema_type, binding, &alias, field)?;
            let response_key = field.response_key();
            self.emission.push(format!(" as \"{response_key}\""));
            columns.push(response_key.to_string());
        }
        for field in excluded {
            for dependency in binding.dependencies_of(&field.name) {
                if columns.contains(dependency) {
                    continue;
                }
                if !columns.is_empty() {
                    self.emission.push(", ");
                }
                self.emission
                    .push(format!("{alias}.{dependency} as \"{dependency}\""));
                columns.push(dependency.clone());
            }
        }

        let annotation = if self.compiler.config.annotate_paths {
            format!(" /*{}*/", self.path)
        } else {
            String::new()
        };
        self.emission.push_sql(Sql {
            text: format!(" from ({}){annotation} as {alias}", relation.text),
            params: relation.params,
        });
        Ok(())
    }

    /// Emits the value expression of one resolvable field, without its column alias.
    fn compile_column(
        &mut self,
        type_name: &Name,
        schema_type: &ExtendedType,
        binding: &TypeBinding,
        alias: &str,
        field: &'doc Node<Field>,
    ) -> Result<(), CompileError> {
        self.path.push_field(field.alias.as_ref(), &field.name);
        let shape = match declared_field_type(schema_type, &field.name) {
            Some(ty) => TypeShape::resolve(self.compiler.schema, ty, &self.path)?,
            None if binding.column_for(&field.name).is_some() => {
                TypeShape::undeclared(&field.name)
            }
            None => {
                return Err(CompileError::UndeclaredRelationField {
                    type_name: type_name.clone(),
                    field: field.name.clone(),
                    path: self.path.clone(),
                });
            }
        };
        let arguments = extract_arguments(&field.arguments, self.variables).map_err(|source| {
            CompileError::Argument {
                source,
                path: self.path.clone(),
            }
        })?;
        tracing::trace!(path = %self.path, kind = ?shape.kind, "compiling field");

        let missing_relation = || CompileError::MissingRelation {
            type_name: type_name.clone(),
            field: field.name.clone(),
            kind: shape.kind.describe(),
            path: self.path.clone(),
        };
        match shape.kind {
            TypeKind::Leaf => match binding.column_for(&field.name) {
                Some(ColumnBinding::Expression(expression)) => {
                    self.emission.push_sql(expression(&arguments, alias));
                }
                Some(ColumnBinding::Column(column)) => {
                    self.emission.push(format!("{alias}.{column}"));
                }
                None => self.emission.push(format!("{alias}.{}", field.name)),
            },
            TypeKind::Object => {
                let relation = binding.relation_for(&field.name).ok_or_else(missing_relation)?;
                let relation = relation(&arguments, alias);
                self.open_aggregate(&shape);
                self.compile_selection(&shape.named_type, &field.selection_set, relation, None, &[])?;
                self.close_aggregate(&shape);
            }
            TypeKind::Interface | TypeKind::Union => {
                let subtypes = binding.subtypes_for(&field.name).ok_or_else(missing_relation)?;
                let subtypes = subtypes(&arguments, alias);
                if subtypes.is_empty() {
                    return Err(CompileError::EmptySubtypes {
                        type_name: type_name.clone(),
                        field: field.name.clone(),
                        path: self.path.clone(),
                    });
                }
                self.open_aggregate(&shape);
                for (index, (subtype, relation)) in subtypes.into_iter().enumerate() {
                    if index > 0 {
                        self.emission.push(" union all ");
                    }
                    self.emission.push("(select to_json(x) as x from (");
                    self.compile_selection(
                        &subtype,
                        &field.selection_set,
                        relation,
                        Some(&subtype),
                        std::slice::from_ref(&subtype),
                    )?;
                    self.emission.push(") x)");
                }
                self.close_aggregate(&shape);
            }
        }
        self.path.pop();
        Ok(())
    }

    /// Opens the subquery turning the rows of a nested selection into one JSON value.
    fn open_aggregate(&mut self, shape: &TypeShape) {
        if coalesces_to_empty_list(shape) {
            self.emission.push("coalesce(");
        }
        let aggregate = if shape.is_list { "json_agg" } else { "to_json" };
        self.emission
            .push(format!("(select {aggregate}(x) from ("));
    }

    fn close_aggregate(&mut self, shape: &TypeShape) {
        self.emission.push(") x)");
        if coalesces_to_empty_list(shape) {
            self.emission.push(", '[]'::json)");
        }
    }

    fn schema_type(&self, type_name: &Name) -> Result<&'c ExtendedType, CompileError> {
        match classify(self.compiler.schema, type_name, &self.path)? {
            TypeKind::Leaf => Err(CompileError::UnsupportedTypeKind {
                type_name: type_name.clone(),
                kind: "a leaf",
                path: self.path.clone(),
            }),
            _ => self
                .compiler
                .schema
                .types
                .get(type_name)
                .ok_or_else(|| CompileError::UnknownType {
                    type_name: type_name.clone(),
                    path: self.path.clone(),
                }),
        }
    }
}

/// `json_agg` over no rows is null, which a non-null list field cannot be.
fn coalesces_to_empty_list(shape: &TypeShape) -> bool {
    shape.is_list && shape.is_non_null
}

/// The declared type of `field` on an object or interface type.
fn declared_field_type<'s>(schema_type: &'s ExtendedType, field: &str) -> Option<&'s ast::Type> {
    match schema_type {
        ExtendedType::Object(object) => object.fields.get(field).map(|definition| &definition.ty),
        ExtendedType::Interface(interface) => {
            interface.fields.get(field).map(|definition| &definition.ty)
        }
        _ => None,
    }
}
