use apollo_compiler::Name;
use apollo_compiler::Schema;
use apollo_compiler::ast;
use apollo_compiler::schema::ExtendedType;
use serde::Serialize;

use crate::error::CompileError;
use crate::error::SelectionPath;

/// How a named type is compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TypeKind {
    /// Scalars and enums, emitted as a single column.
    Leaf,
    /// Emitted as a correlated subquery aggregated to JSON.
    Object,
    /// Emitted as a `union all` of one subquery per bound concrete type.
    Interface,
    Union,
}

impl TypeKind {
    pub(crate) fn describe(self) -> &'static str {
        match self {
            TypeKind::Leaf => "leaf",
            TypeKind::Object => "object",
            TypeKind::Interface => "interface",
            TypeKind::Union => "union",
        }
    }
}

/// The wrappers and kind of a declared field type.
///
/// Wrappers are peeled outermost first: one non-null layer, then one list layer. Only those
/// two layers are recorded, so `[Post!]!` and `[Post]!` have the same shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeShape {
    pub named_type: Name,
    pub is_list: bool,
    pub is_non_null: bool,
    pub kind: TypeKind,
}

impl TypeShape {
    /// Classifies `ty` against `schema`.
    ///
    /// A named type that is missing from the schema or is an input object is a configuration
    /// bug and fails the compilation. So is a list of lists of selectable types, which one
    /// aggregate cannot produce. Leaf lists of lists stay single columns.
    pub fn resolve(
        schema: &Schema,
        ty: &ast::Type,
        path: &SelectionPath,
    ) -> Result<Self, CompileError> {
        let (is_non_null, unwrapped) = match ty {
            ast::Type::NonNullNamed(name) => (true, Unwrapped::Named(name)),
            ast::Type::NonNullList(inner) => (true, Unwrapped::List(inner)),
            ast::Type::Named(name) => (false, Unwrapped::Named(name)),
            ast::Type::List(inner) => (false, Unwrapped::List(inner)),
        };
        let (is_list, named_type) = match unwrapped {
            Unwrapped::Named(name) => (false, name),
            Unwrapped::List(inner) => (true, inner.inner_named_type()),
        };
        let kind = classify(schema, named_type, path)?;
        let nested_list = matches!(unwrapped, Unwrapped::List(inner) if inner.is_list());
        if nested_list && kind != TypeKind::Leaf {
            return Err(CompileError::NestedList {
                field_type: ty.to_string(),
                path: path.clone(),
            });
        }
        Ok(Self {
            named_type: named_type.clone(),
            is_list,
            is_non_null,
            kind,
        })
    }

    /// The shape of a field that the schema does not declare, which can only be a plain column.
    pub(crate) fn undeclared(field: &Name) -> Self {
        Self {
            named_type: field.clone(),
            is_list: false,
            is_non_null: false,
            kind: TypeKind::Leaf,
        }
    }
}

#[derive(Clone, Copy)]
enum Unwrapped<'a> {
    Named(&'a Name),
    List(&'a ast::Type),
}

/// Classifies a named type into exactly one [`TypeKind`].
pub fn classify(
    schema: &Schema,
    type_name: &Name,
    path: &SelectionPath,
) -> Result<TypeKind, CompileError> {
    match schema.types.get(type_name) {
        Some(ExtendedType::Scalar(_) | ExtendedType::Enum(_)) => Ok(TypeKind::Leaf),
        Some(ExtendedType::Object(_)) => Ok(TypeKind::Object),
        Some(ExtendedType::Interface(_)) => Ok(TypeKind::Interface),
        Some(ExtendedType::Union(_)) => Ok(TypeKind::Union),
        Some(ExtendedType::InputObject(_)) => Err(CompileError::UnsupportedTypeKind {
            type_name: type_name.clone(),
            kind: "an input object",
            path: path.clone(),
        }),
        None => Err(CompileError::UnknownType {
            type_name: type_name.clone(),
            path: path.clone(),
        }),
    }
}
