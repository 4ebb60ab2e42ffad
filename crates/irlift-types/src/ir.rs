//! Type IR representation.
//!
//! Types are stored in a [`TypeArena`] and referenced by [`TypeId`]. Two
//! references denote the same node exactly when their ids are equal, which
//! is what lets recursive aggregates point back at themselves.

use std::collections::{HashMap, HashSet};
use std::ops::Index;

use serde::{Deserialize, Serialize};

/// Index of a node in a [`TypeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeId(u32);

impl TypeId {
    /// Returns the arena index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A Type IR node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Type {
    Void,
    Bool,

    /// Integer of `size` bytes.
    Integer { size: u64, signed: bool },

    /// Floating point of `size` bytes (2, 4, 8, 10, 12 or 16).
    Float { size: u64 },

    Pointer { element: TypeId },

    Array { element: TypeId, count: u64 },

    /// Elements in ascending offset order, padding included.
    Structure { elements: Vec<TypeId> },

    /// Members in host order.
    Union { members: Vec<TypeId> },

    /// Enumeration over an unsigned integer.
    Enum { underlying: TypeId },

    Typedef { underlying: TypeId },

    Function {
        return_type: TypeId,
        parameters: Vec<TypeId>,
        variadic: bool,
    },

    /// Synthetic filler between structure members.
    Padding { bytes: u64 },
}

impl Type {
    /// Check if this is the void type.
    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    /// Check if this is a pointer type.
    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer { .. })
    }

    /// Check if this is an integer type.
    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Integer { .. })
    }

    /// Check if this is a floating-point type.
    pub fn is_float(&self) -> bool {
        matches!(self, Type::Float { .. })
    }

    /// Check if this is structure padding.
    pub fn is_padding(&self) -> bool {
        matches!(self, Type::Padding { .. })
    }

    /// Leaves have no children and no identity beyond their value.
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            Type::Void | Type::Bool | Type::Integer { .. } | Type::Float { .. } | Type::Padding { .. }
        )
    }

    /// Direct children of this node, in order.
    pub fn children(&self) -> Vec<TypeId> {
        match self {
            Type::Void | Type::Bool | Type::Integer { .. } | Type::Float { .. } | Type::Padding { .. } => {
                Vec::new()
            }
            Type::Pointer { element } | Type::Array { element, .. } => vec![*element],
            Type::Structure { elements } => elements.clone(),
            Type::Union { members } => members.clone(),
            Type::Enum { underlying } | Type::Typedef { underlying } => vec![*underlying],
            Type::Function {
                return_type,
                parameters,
                ..
            } => std::iter::once(*return_type).chain(parameters.iter().copied()).collect(),
        }
    }
}

/// Owner of all Type IR nodes of a program.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeArena {
    nodes: Vec<Type>,
    /// Interned leaf nodes.
    #[serde(skip)]
    leaves: HashMap<Type, TypeId>,
}

impl TypeArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a fully built node.
    ///
    /// # Panics
    ///
    /// Panics if the arena already holds `u32::MAX` nodes.
    pub fn alloc(&mut self, ty: Type) -> TypeId {
        match self.try_alloc(ty) {
            Some(id) => id,
            None => panic!("type arena is full"),
        }
    }

    /// Add a fully built node, or `None` if no id is left.
    pub fn try_alloc(&mut self, ty: Type) -> Option<TypeId> {
        let id = TypeId(u32::try_from(self.nodes.len()).ok()?);
        self.nodes.push(ty);
        Some(id)
    }

    /// Add a leaf node, reusing an equal leaf added earlier.
    ///
    /// Non-leaf nodes are always added as new nodes. Returns `None` if no
    /// id is left.
    pub fn intern(&mut self, ty: Type) -> Option<TypeId> {
        if !ty.is_leaf() {
            return self.try_alloc(ty);
        }
        if let Some(&id) = self.leaves.get(&ty) {
            return Some(id);
        }
        let id = self.try_alloc(ty.clone())?;
        self.leaves.insert(ty, id);
        Some(id)
    }

    /// Get a node, if the id belongs to this arena.
    pub fn get(&self, id: TypeId) -> Option<&Type> {
        self.nodes.get(id.index())
    }

    /// Iterate over all nodes with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &Type)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, ty)| (TypeId(i as u32), ty))
    }

    /// Reserve a slot whose contents are provided later by [`Self::fill`].
    /// The slot reads as `Void` until then.
    pub(crate) fn reserve(&mut self) -> Option<TypeId> {
        self.try_alloc(Type::Void)
    }

    pub(crate) fn fill(&mut self, id: TypeId, ty: Type) {
        self.nodes[id.index()] = ty;
    }

    /// Drop every node allocated at or after `len`.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.nodes.truncate(len);
        self.leaves.retain(|_, id| id.index() < len);
    }

    /// Size of a type in bytes.
    ///
    /// Pointers take `pointer_size` bytes. Void and function types are
    /// unsized, and so is anything whose size depends on itself.
    pub fn size_of(&self, id: TypeId, pointer_size: u64) -> Option<u64> {
        let mut sizes: HashMap<TypeId, Option<u64>> = HashMap::new();
        let mut on_path: HashSet<TypeId> = HashSet::new();
        let mut stack = vec![(id, false)];

        while let Some((current, expanded)) = stack.pop() {
            let ty = self.get(current)?;
            if expanded {
                let size = self.node_size(ty, pointer_size, &sizes);
                sizes.insert(current, size);
                on_path.remove(&current);
                continue;
            }
            if sizes.contains_key(&current) {
                continue;
            }
            if on_path.contains(&current) {
                // Reached from itself.
                sizes.insert(current, None);
                continue;
            }
            on_path.insert(current);
            stack.push((current, true));
            for child in Self::size_dependencies(ty) {
                stack.push((child, false));
            }
        }

        sizes.get(&id).copied().flatten()
    }

    fn size_dependencies(ty: &Type) -> Vec<TypeId> {
        match ty {
            Type::Pointer { .. } | Type::Function { .. } => Vec::new(),
            _ => ty.children(),
        }
    }

    fn node_size(&self, ty: &Type, pointer_size: u64, sizes: &HashMap<TypeId, Option<u64>>) -> Option<u64> {
        let size_of = |id: &TypeId| sizes.get(id).copied().flatten();
        match ty {
            Type::Void | Type::Function { .. } => None,
            Type::Bool => Some(1),
            Type::Integer { size, .. } | Type::Float { size } => Some(*size),
            Type::Padding { bytes } => Some(*bytes),
            Type::Pointer { .. } => Some(pointer_size),
            Type::Array { element, count } => size_of(element)?.checked_mul(*count),
            Type::Structure { elements } => elements
                .iter()
                .try_fold(0u64, |total, e| total.checked_add(size_of(e)?)),
            Type::Union { members } => members
                .iter()
                .try_fold(0u64, |largest, m| Some(largest.max(size_of(m)?))),
            Type::Enum { underlying } | Type::Typedef { underlying } => size_of(underlying),
        }
    }
}

impl Index<TypeId> for TypeArena {
    type Output = Type;

    fn index(&self, id: TypeId) -> &Type {
        &self.nodes[id.index()]
    }
}
