//! Type normalization.
//!
//! [`TypeNormalizer`] converts host [`TypeDescriptor`]s into Type IR nodes.
//! It keeps an identity cache keyed by the descriptor's stable key. Every
//! cacheable node is reserved in the arena and entered in the cache before
//! any of its children are visited; a child that refers back to the node
//! (directly, or through a named reference) then finds it in the cache, so
//! recursive type graphs terminate and shared types are built once.
//!
//! Anonymous structures, unions and enums are never cached: two different
//! anonymous aggregates may share a key.
//!
//! The traversal runs on an explicit work stack so the depth of the host's
//! type graph does not bound native stack usage.

use std::collections::{HashMap, HashSet};

use irlift_core::{BinaryView, NamedTypeClass, StructureMember, StructureVariant, TypeDescriptor, TypeKind};
use thiserror::Error;
use tracing::{debug, warn};

use crate::layout::{plan_structure, LayoutElement, MemberSpan};
use crate::{Type, TypeArena, TypeId};

/// Fatal normalization errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// The descriptor's kind has no translation.
    #[error("unhandled type kind '{class}' in type '{key}'")]
    UnhandledTypeKind { class: String, key: String },

    /// The traversal ended without exactly one root node.
    #[error("type '{key}' did not produce a single node")]
    Incomplete { key: String },

    /// Every type id is in use.
    #[error("type arena is full")]
    ArenaFull,
}

enum Frame<'a> {
    Visit(&'a TypeDescriptor),
    Finish(Pending),
}

/// A reserved node waiting for its children.
enum Pending {
    Pointer(TypeId),
    Array { id: TypeId, count: u64 },
    Function { id: TypeId, parameters: usize, variadic: bool },
    Typedef(TypeId),
    Structure { id: TypeId, width: u64, spans: Vec<(u64, u64)> },
    Union { id: TypeId, members: usize },
}

/// Outcome of resolving a named type reference.
enum Step<'a> {
    Done(TypeId),
    Visit(&'a TypeDescriptor),
    /// A reserved typedef node and the descriptor it aliases.
    Typedef(TypeId, &'a TypeDescriptor),
}

enum Resolution<'a> {
    Found(&'a TypeDescriptor),
    Unresolved,
    Cycle,
}

/// Converts host type descriptors into Type IR.
#[derive(Debug, Clone)]
pub struct TypeNormalizer {
    arena: TypeArena,
    cache: HashMap<String, TypeId>,
    pointer_size: u64,
    /// Keys cached by the request in progress.
    journal: Vec<String>,
}

impl TypeNormalizer {
    /// Create a normalizer for a target with `pointer_size`-byte pointers.
    pub fn new(pointer_size: usize) -> Self {
        Self {
            arena: TypeArena::new(),
            cache: HashMap::new(),
            pointer_size: pointer_size as u64,
            journal: Vec::new(),
        }
    }

    /// The arena holding every node built so far.
    pub fn arena(&self) -> &TypeArena {
        &self.arena
    }

    /// Pointer size in bytes of the target.
    pub fn pointer_size(&self) -> u64 {
        self.pointer_size
    }

    /// Look up a cached node by descriptor key.
    pub fn cached(&self, key: &str) -> Option<TypeId> {
        self.cache.get(key).copied()
    }

    /// Number of cached descriptors.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Normalize a descriptor.
    ///
    /// On error every node and cache entry created by this call is removed
    /// again, so later requests never observe half-built nodes.
    pub fn normalize<'a, V>(&mut self, view: &'a V, desc: &'a TypeDescriptor) -> Result<TypeId, NormalizeError>
    where
        V: BinaryView + ?Sized,
    {
        let mark = self.arena.len();
        self.journal.clear();

        match self.run(view, desc) {
            Ok(id) => {
                self.journal.clear();
                Ok(id)
            }
            Err(err) => {
                for key in self.journal.drain(..) {
                    self.cache.remove(&key);
                }
                self.arena.truncate(mark);
                Err(err)
            }
        }
    }

    fn run<'a, V>(&mut self, view: &'a V, desc: &'a TypeDescriptor) -> Result<TypeId, NormalizeError>
    where
        V: BinaryView + ?Sized,
    {
        let mut stack = vec![Frame::Visit(desc)];
        let mut values: Vec<TypeId> = Vec::new();

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Visit(desc) => self.visit(view, desc, &mut stack, &mut values)?,
                Frame::Finish(pending) => {
                    let id = self.finish(pending, &mut values)?;
                    values.push(id);
                }
            }
        }

        match values[..] {
            [root] => Ok(root),
            _ => Err(NormalizeError::Incomplete { key: desc.key.clone() }),
        }
    }

    fn visit<'a, V>(
        &mut self,
        view: &'a V,
        desc: &'a TypeDescriptor,
        stack: &mut Vec<Frame<'a>>,
        values: &mut Vec<TypeId>,
    ) -> Result<(), NormalizeError>
    where
        V: BinaryView + ?Sized,
    {
        if let Some(id) = self.cached(&desc.key) {
            values.push(id);
            return Ok(());
        }

        match &desc.kind {
            TypeKind::Void => values.push(self.intern(Type::Void)?),

            TypeKind::Bool => values.push(self.intern(Type::Bool)?),

            TypeKind::Integer { .. } => {
                let ty = self.integer(desc.width);
                values.push(self.intern(ty)?);
            }

            TypeKind::Float => values.push(self.intern(Type::Float { size: desc.width })?),

            TypeKind::WideChar | TypeKind::VarArgs | TypeKind::Value => {
                warn!(
                    class = desc.kind.class_name(),
                    key = %desc.key,
                    "unhandled type class, substituting void"
                );
                values.push(self.intern(Type::Void)?);
            }

            TypeKind::Pointer { target } => {
                let id = self.reserve_cached(&desc.key)?;
                stack.push(Frame::Finish(Pending::Pointer(id)));
                stack.push(Frame::Visit(target));
            }

            TypeKind::Array { element, count } => {
                let id = self.reserve_cached(&desc.key)?;
                stack.push(Frame::Finish(Pending::Array { id, count: *count }));
                stack.push(Frame::Visit(element));
            }

            TypeKind::Function {
                return_type,
                parameters,
                variadic,
            } => {
                let id = self.reserve_cached(&desc.key)?;
                stack.push(Frame::Finish(Pending::Function {
                    id,
                    parameters: parameters.len(),
                    variadic: *variadic,
                }));
                for param in parameters.iter().rev() {
                    stack.push(Frame::Visit(param));
                }
                stack.push(Frame::Visit(return_type));
            }

            TypeKind::Structure { variant, members } => {
                self.visit_aggregate(desc, *variant, members, stack)?;
            }

            TypeKind::Enumeration => {
                let underlying = self.intern(Type::Integer {
                    size: desc.width,
                    signed: false,
                })?;
                let id = self.alloc(Type::Enum { underlying })?;
                if desc.registered_name.is_some() {
                    self.insert_cached(&desc.key, id);
                }
                values.push(id);
            }

            TypeKind::NamedTypeReference { class, type_id, name } => {
                match self.visit_reference(view, &desc.key, class, type_id.as_deref(), name)? {
                    Step::Done(id) => values.push(id),
                    Step::Visit(target) => stack.push(Frame::Visit(target)),
                    Step::Typedef(id, target) => {
                        stack.push(Frame::Finish(Pending::Typedef(id)));
                        stack.push(Frame::Visit(target));
                    }
                }
            }

            TypeKind::Other(class) => {
                return Err(NormalizeError::UnhandledTypeKind {
                    class: class.clone(),
                    key: desc.key.clone(),
                });
            }
        }

        Ok(())
    }

    fn visit_aggregate<'a>(
        &mut self,
        desc: &'a TypeDescriptor,
        variant: StructureVariant,
        members: &'a [StructureMember],
        stack: &mut Vec<Frame<'a>>,
    ) -> Result<(), NormalizeError> {
        let id = self.reserve()?;
        if desc.registered_name.is_some() {
            self.insert_cached(&desc.key, id);
        }

        let pending = match variant {
            StructureVariant::Union => Pending::Union {
                id,
                members: members.len(),
            },
            StructureVariant::Struct | StructureVariant::Class => Pending::Structure {
                id,
                width: desc.width,
                spans: members.iter().map(|m| (m.offset, m.width)).collect(),
            },
        };
        stack.push(Frame::Finish(pending));
        for member in members.iter().rev() {
            stack.push(Frame::Visit(&member.ty));
        }
        Ok(())
    }

    fn visit_reference<'a, V>(
        &mut self,
        view: &'a V,
        key: &str,
        class: &NamedTypeClass,
        type_id: Option<&str>,
        name: &str,
    ) -> Result<Step<'a>, NormalizeError>
    where
        V: BinaryView + ?Sized,
    {
        let Some(resolved) = Self::lookup(view, type_id, name) else {
            debug!(name, "named type reference did not resolve, substituting void");
            return Ok(Step::Done(self.intern(Type::Void)?));
        };

        let step = match class {
            NamedTypeClass::Typedef => Step::Typedef(self.reserve_cached(key)?, resolved),
            NamedTypeClass::Struct | NamedTypeClass::Union | NamedTypeClass::Enum => {
                match Self::follow_references(view, resolved) {
                    Resolution::Found(target) => Step::Visit(target),
                    Resolution::Unresolved => {
                        debug!(name, "named type reference chain did not resolve, substituting void");
                        Step::Done(self.intern(Type::Void)?)
                    }
                    Resolution::Cycle => {
                        warn!(name, "named type reference refers to itself, substituting void");
                        Step::Done(self.intern(Type::Void)?)
                    }
                }
            }
            NamedTypeClass::Unknown => Step::Done(self.intern(Type::Void)?),
            NamedTypeClass::Other(other) => {
                warn!(class = %other, name, "unknown named type class, substituting void");
                Step::Done(self.intern(Type::Void)?)
            }
        };
        Ok(step)
    }

    fn lookup<'a, V>(view: &'a V, type_id: Option<&str>, name: &str) -> Option<&'a TypeDescriptor>
    where
        V: BinaryView + ?Sized,
    {
        type_id
            .and_then(|id| view.type_by_id(id))
            .or_else(|| view.type_by_name(name))
    }

    /// Follow struct/union/enum references until a concrete descriptor.
    fn follow_references<'a, V>(view: &'a V, start: &'a TypeDescriptor) -> Resolution<'a>
    where
        V: BinaryView + ?Sized,
    {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut current = start;
        loop {
            match &current.kind {
                TypeKind::NamedTypeReference {
                    class: NamedTypeClass::Struct | NamedTypeClass::Union | NamedTypeClass::Enum,
                    type_id,
                    name,
                } => {
                    if !seen.insert(current.key.as_str()) {
                        return Resolution::Cycle;
                    }
                    match Self::lookup(view, type_id.as_deref(), name) {
                        Some(next) => current = next,
                        None => return Resolution::Unresolved,
                    }
                }
                _ => return Resolution::Found(current),
            }
        }
    }

    fn finish(&mut self, pending: Pending, values: &mut Vec<TypeId>) -> Result<TypeId, NormalizeError> {
        let id = match pending {
            Pending::Pointer(id) => {
                let element = Self::take(values, 1)[0];
                self.arena.fill(id, Type::Pointer { element });
                id
            }
            Pending::Array { id, count } => {
                let element = Self::take(values, 1)[0];
                self.arena.fill(id, Type::Array { element, count });
                id
            }
            Pending::Function {
                id,
                parameters,
                variadic,
            } => {
                let types = Self::take(values, parameters + 1);
                self.arena.fill(
                    id,
                    Type::Function {
                        return_type: types[0],
                        parameters: types[1..].to_vec(),
                        variadic,
                    },
                );
                id
            }
            Pending::Typedef(id) => {
                let underlying = Self::take(values, 1)[0];
                self.arena.fill(id, Type::Typedef { underlying });
                id
            }
            Pending::Structure { id, width, spans } => {
                let types = Self::take(values, spans.len());
                let members: Vec<MemberSpan> = spans
                    .iter()
                    .zip(types)
                    .map(|(&(offset, width), ty)| MemberSpan { offset, width, ty })
                    .collect();
                let elements = plan_structure(width, &members)
                    .into_iter()
                    .map(|element| match element {
                        LayoutElement::Member(ty) => Ok(ty),
                        LayoutElement::Padding(bytes) => self.intern(Type::Padding { bytes }),
                    })
                    .collect::<Result<_, _>>()?;
                self.arena.fill(id, Type::Structure { elements });
                id
            }
            Pending::Union { id, members } => {
                let members = Self::take(values, members);
                self.arena.fill(id, Type::Union { members });
                id
            }
        };
        Ok(id)
    }

    /// Pop the last `n` child values, in visit order.
    fn take(values: &mut Vec<TypeId>, n: usize) -> Vec<TypeId> {
        let at = values.len() - n;
        values.split_off(at)
    }

    fn integer(&self, width: u64) -> Type {
        match width {
            1 | 2 | 4 | 8 | 16 => Type::Integer {
                size: width,
                signed: true,
            },
            // Extended-precision floats are sometimes reported as integers.
            10 | 12 => Type::Float { size: width },
            _ => Type::Integer {
                size: self.pointer_size,
                signed: true,
            },
        }
    }

    fn alloc(&mut self, ty: Type) -> Result<TypeId, NormalizeError> {
        self.arena.try_alloc(ty).ok_or(NormalizeError::ArenaFull)
    }

    fn intern(&mut self, ty: Type) -> Result<TypeId, NormalizeError> {
        self.arena.intern(ty).ok_or(NormalizeError::ArenaFull)
    }

    fn reserve(&mut self) -> Result<TypeId, NormalizeError> {
        self.arena.reserve().ok_or(NormalizeError::ArenaFull)
    }

    fn reserve_cached(&mut self, key: &str) -> Result<TypeId, NormalizeError> {
        let id = self.reserve()?;
        self.insert_cached(key, id);
        Ok(id)
    }

    fn insert_cached(&mut self, key: &str, id: TypeId) {
        self.cache.insert(key.to_string(), id);
        self.journal.push(key.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use irlift_core::StaticHost;

    fn host() -> StaticHost {
        StaticHost::linux_x86_64()
    }

    #[test]
    fn test_integer_widths() {
        let host = host();
        let mut norm = TypeNormalizer::new(8);
        for width in [1, 2, 4, 8, 16] {
            let id = norm.normalize(&host, &TypeDescriptor::int(width, false)).unwrap();
            assert_eq!(norm.arena()[id], Type::Integer { size: width, signed: true });
        }
        for width in [10, 12] {
            let id = norm.normalize(&host, &TypeDescriptor::int(width, true)).unwrap();
            assert_eq!(norm.arena()[id], Type::Float { size: width });
        }
    }

    #[test]
    fn test_fallback_integer_width() {
        let host = host();
        let mut norm = TypeNormalizer::new(8);
        let id = norm.normalize(&host, &TypeDescriptor::int(3, true)).unwrap();
        assert_eq!(norm.arena()[id], Type::Integer { size: 8, signed: true });

        let mut norm32 = TypeNormalizer::new(4);
        let id = norm32.normalize(&host, &TypeDescriptor::int(6, false)).unwrap();
        assert_eq!(norm32.arena()[id], Type::Integer { size: 4, signed: true });
    }

    #[test]
    fn test_leaves_are_not_cached() {
        let host = host();
        let mut norm = TypeNormalizer::new(8);
        let a = norm.normalize(&host, &TypeDescriptor::void()).unwrap();
        let b = norm.normalize(&host, &TypeDescriptor::void()).unwrap();
        let degraded = norm.normalize(&host, &TypeDescriptor::wide_char(4)).unwrap();
        // Equal leaves share a node without entering the descriptor cache.
        assert_eq!(a, b);
        assert_eq!(a, degraded);
        assert_eq!(norm.cache_len(), 0);

        let int = TypeDescriptor::int(8, false);
        let first = norm.normalize(&host, &int).unwrap();
        let len = norm.arena().len();
        for _ in 0..100 {
            assert_eq!(norm.normalize(&host, &int).unwrap(), first);
        }
        assert_eq!(norm.arena().len(), len);
    }

    #[test]
    fn test_huge_structure_width() {
        let host = host();
        let mut norm = TypeNormalizer::new(8);
        for (name, width) in [("huge", u64::MAX), ("large", 1 << 40)] {
            let desc = TypeDescriptor::structure(
                Some(name),
                width,
                vec![StructureMember::new("head", 0, TypeDescriptor::int(8, true))],
            );
            let id = norm.normalize(&host, &desc).unwrap();
            let Type::Structure { elements } = &norm.arena()[id] else {
                panic!("expected structure");
            };
            assert_eq!(norm.arena()[elements[1]], Type::Padding { bytes: width - 8 });
            assert_eq!(norm.arena().size_of(id, 8), Some(width));
            assert_eq!(norm.cached(&desc.key), Some(id));
        }
    }

    #[test]
    fn test_pointer_is_cached() {
        let host = host();
        let mut norm = TypeNormalizer::new(8);
        let desc = TypeDescriptor::pointer(TypeDescriptor::int(4, true), 8);
        let a = norm.normalize(&host, &desc).unwrap();
        let b = norm.normalize(&host, &desc).unwrap();
        assert_eq!(a, b);
        assert_eq!(norm.cached("int32_t*"), Some(a));
    }

    #[test]
    fn test_enum_underlying_is_unsigned() {
        let host = host();
        let mut norm = TypeNormalizer::new(8);
        let id = norm
            .normalize(&host, &TypeDescriptor::enumeration(Some("color"), 4))
            .unwrap();
        let Type::Enum { underlying } = norm.arena()[id] else {
            panic!("expected enum");
        };
        assert_eq!(norm.arena()[underlying], Type::Integer { size: 4, signed: false });
        assert_eq!(norm.cached("enum color"), Some(id));

        norm.normalize(&host, &TypeDescriptor::enumeration(None, 2)).unwrap();
        assert_eq!(norm.cache_len(), 1);
    }

    #[test]
    fn test_unsupported_classes_become_void() {
        let host = host();
        let mut norm = TypeNormalizer::new(8);
        for desc in [
            TypeDescriptor::var_args(),
            TypeDescriptor::value(4),
            TypeDescriptor::wide_char(2),
        ] {
            let id = norm.normalize(&host, &desc).unwrap();
            assert!(norm.arena()[id].is_void());
        }
    }

    #[test]
    fn test_unhandled_kind_is_fatal() {
        let host = host();
        let mut norm = TypeNormalizer::new(8);
        let err = norm
            .normalize(&host, &TypeDescriptor::other("vector", 16))
            .unwrap_err();
        assert_eq!(
            err,
            NormalizeError::UnhandledTypeKind {
                class: "vector".to_string(),
                key: "vector".to_string(),
            }
        );
    }

    #[test]
    fn test_failure_rolls_back_cache() {
        let host = host();
        let mut norm = TypeNormalizer::new(8);
        let int_ptr = TypeDescriptor::pointer(TypeDescriptor::int(4, true), 8);
        let before = norm.normalize(&host, &int_ptr).unwrap();
        let arena_len = norm.arena().len();

        let bad = TypeDescriptor::function(
            TypeDescriptor::void(),
            vec![
                TypeDescriptor::pointer(TypeDescriptor::int(8, true), 8),
                TypeDescriptor::other("vector", 16),
            ],
            false,
        );
        assert!(norm.normalize(&host, &bad).is_err());
        assert_eq!(norm.arena().len(), arena_len);
        assert_eq!(norm.cache_len(), 1);
        assert!(norm.cached("int64_t*").is_none());
        assert_eq!(norm.normalize(&host, &int_ptr).unwrap(), before);
    }

    #[test]
    fn test_function_type() {
        let host = host();
        let mut norm = TypeNormalizer::new(8);
        let desc = TypeDescriptor::function(
            TypeDescriptor::int(4, true),
            vec![TypeDescriptor::float(8), TypeDescriptor::bool()],
            true,
        );
        let id = norm.normalize(&host, &desc).unwrap();
        let Type::Function {
            return_type,
            parameters,
            variadic,
        } = norm.arena()[id].clone()
        else {
            panic!("expected function");
        };
        assert!(variadic);
        assert_eq!(norm.arena()[return_type], Type::Integer { size: 4, signed: true });
        assert_eq!(parameters.len(), 2);
        assert_eq!(norm.arena()[parameters[0]], Type::Float { size: 8 });
        assert_eq!(norm.arena()[parameters[1]], Type::Bool);
    }
}
