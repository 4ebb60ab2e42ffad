//! Textual rendering of Type IR.
//!
//! Rendering is compact and cycle-safe: a node that is already being
//! printed further up is shown as a back-reference such as `struct#3`.

use std::fmt;

use crate::{Type, TypeArena, TypeId};

/// Nesting depth past which nodes are shown as back-references.
const MAX_DEPTH: usize = 32;

/// Display adapter returned by [`TypeArena::display`].
pub struct TypeDisplay<'a> {
    arena: &'a TypeArena,
    id: TypeId,
}

impl TypeArena {
    /// Render a node, e.g. `struct#0 { i64, ptr(struct#0) }`.
    pub fn display(&self, id: TypeId) -> TypeDisplay<'_> {
        TypeDisplay { arena: self, id }
    }
}

impl fmt::Display for TypeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_type(self.arena, self.id, &mut Vec::new(), f)
    }
}

fn kind_name(ty: &Type) -> &'static str {
    match ty {
        Type::Void => "void",
        Type::Bool => "bool",
        Type::Integer { .. } => "int",
        Type::Float { .. } => "float",
        Type::Pointer { .. } => "ptr",
        Type::Array { .. } => "array",
        Type::Structure { .. } => "struct",
        Type::Union { .. } => "union",
        Type::Enum { .. } => "enum",
        Type::Typedef { .. } => "typedef",
        Type::Function { .. } => "fn",
        Type::Padding { .. } => "pad",
    }
}

fn write_list(
    arena: &TypeArena,
    ids: &[TypeId],
    path: &mut Vec<TypeId>,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    for (i, id) in ids.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write_type(arena, *id, path, f)?;
    }
    Ok(())
}

fn write_type(arena: &TypeArena, id: TypeId, path: &mut Vec<TypeId>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let Some(ty) = arena.get(id) else {
        return write!(f, "?#{}", id.index());
    };
    if path.contains(&id) || path.len() >= MAX_DEPTH {
        return write!(f, "{}#{}", kind_name(ty), id.index());
    }

    path.push(id);
    let result = match ty {
        Type::Void => write!(f, "void"),
        Type::Bool => write!(f, "bool"),
        Type::Integer { size, signed } => write!(f, "{}{}", if *signed { 'i' } else { 'u' }, size * 8),
        Type::Float { size } => write!(f, "f{}", size * 8),
        Type::Padding { bytes } => write!(f, "pad[{}]", bytes),
        Type::Pointer { element } => {
            write!(f, "ptr(")?;
            write_type(arena, *element, path, f)?;
            write!(f, ")")
        }
        Type::Array { element, count } => {
            write!(f, "[")?;
            write_type(arena, *element, path, f)?;
            write!(f, "; {}]", count)
        }
        Type::Structure { elements } | Type::Union { members: elements } => {
            write!(f, "{}#{} {{", kind_name(ty), id.index())?;
            if !elements.is_empty() {
                write!(f, " ")?;
                write_list(arena, elements, path, f)?;
                write!(f, " ")?;
            }
            write!(f, "}}")
        }
        Type::Enum { underlying } => {
            write!(f, "enum(")?;
            write_type(arena, *underlying, path, f)?;
            write!(f, ")")
        }
        Type::Typedef { underlying } => {
            write!(f, "typedef#{}(", id.index())?;
            write_type(arena, *underlying, path, f)?;
            write!(f, ")")
        }
        Type::Function {
            return_type,
            parameters,
            variadic,
        } => {
            write!(f, "fn(")?;
            write_list(arena, parameters, path, f)?;
            if *variadic {
                write!(f, "{}...", if parameters.is_empty() { "" } else { ", " })?;
            }
            write!(f, ") -> ")?;
            write_type(arena, *return_type, path, f)
        }
    };
    path.pop();
    result
}
