//! Host type descriptors.
//!
//! A [`TypeDescriptor`] is the host engine's native description of a type:
//! a kind tag, a width, an optional registered name and a stable identity
//! key (the host's string form of the type). Recursive types are expressed
//! the way the host expresses them, through [`TypeKind::NamedTypeReference`]
//! entries that are resolved by name or id against the binary view.

/// A host type descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TypeDescriptor {
    /// Kind tag plus kind-specific structure.
    pub kind: TypeKind,
    /// Width in bytes as reported by the host.
    pub width: u64,
    /// Registered name, present for named aggregates and enums.
    pub registered_name: Option<String>,
    /// Stable identity key (the host's string form of the descriptor).
    pub key: String,
}

/// Descriptor kind tag.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TypeKind {
    Void,
    Bool,
    Integer {
        signed: bool,
    },
    Float,
    /// Wide character class (recognized but not translated).
    WideChar,
    /// Variadic marker class (recognized but not translated).
    VarArgs,
    /// Value class (recognized but not translated).
    Value,
    Pointer {
        target: Box<TypeDescriptor>,
    },
    Array {
        element: Box<TypeDescriptor>,
        count: u64,
    },
    Function {
        return_type: Box<TypeDescriptor>,
        parameters: Vec<TypeDescriptor>,
        variadic: bool,
    },
    Structure {
        variant: StructureVariant,
        members: Vec<StructureMember>,
    },
    Enumeration,
    /// Reference to a type registered in the binary view.
    NamedTypeReference {
        class: NamedTypeClass,
        type_id: Option<String>,
        name: String,
    },
    /// A host type class this crate has no translation for.
    Other(String),
}

impl TypeKind {
    /// Returns a short name for the kind, used in diagnostics.
    pub fn class_name(&self) -> &str {
        match self {
            TypeKind::Void => "void",
            TypeKind::Bool => "bool",
            TypeKind::Integer { .. } => "integer",
            TypeKind::Float => "float",
            TypeKind::WideChar => "wide-char",
            TypeKind::VarArgs => "var-args",
            TypeKind::Value => "value",
            TypeKind::Pointer { .. } => "pointer",
            TypeKind::Array { .. } => "array",
            TypeKind::Function { .. } => "function",
            TypeKind::Structure { .. } => "structure",
            TypeKind::Enumeration => "enumeration",
            TypeKind::NamedTypeReference { .. } => "named-type-reference",
            TypeKind::Other(class) => class,
        }
    }
}

/// Flavor of a structure-class aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StructureVariant {
    Struct,
    Class,
    Union,
}

impl StructureVariant {
    fn keyword(&self) -> &'static str {
        match self {
            StructureVariant::Struct => "struct",
            StructureVariant::Class => "class",
            StructureVariant::Union => "union",
        }
    }
}

/// Class of a named type reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NamedTypeClass {
    Struct,
    Union,
    Typedef,
    Enum,
    Unknown,
    /// Any other class the host may report (e.g. class references).
    Other(String),
}

/// A member of a structure or union descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StructureMember {
    pub name: String,
    /// Byte offset from the start of the aggregate.
    pub offset: u64,
    /// Width in bytes claimed by the member.
    pub width: u64,
    pub ty: TypeDescriptor,
}

impl StructureMember {
    /// Creates a member whose width is the width of its type.
    pub fn new(name: impl Into<String>, offset: u64, ty: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            offset,
            width: ty.width,
            ty,
        }
    }

    /// Overrides the claimed width.
    pub fn with_width(mut self, width: u64) -> Self {
        self.width = width;
        self
    }
}

impl TypeDescriptor {
    fn unnamed(kind: TypeKind, width: u64, key: String) -> Self {
        Self {
            kind,
            width,
            registered_name: None,
            key,
        }
    }

    pub fn void() -> Self {
        Self::unnamed(TypeKind::Void, 0, "void".to_string())
    }

    pub fn bool() -> Self {
        Self::unnamed(TypeKind::Bool, 1, "bool".to_string())
    }

    pub fn int(width: u64, signed: bool) -> Self {
        let key = format!("{}int{}_t", if signed { "" } else { "u" }, width * 8);
        Self::unnamed(TypeKind::Integer { signed }, width, key)
    }

    pub fn float(width: u64) -> Self {
        let key = match width {
            4 => "float".to_string(),
            8 => "double".to_string(),
            10 | 12 | 16 => "long double".to_string(),
            _ => format!("float{}", width * 8),
        };
        Self::unnamed(TypeKind::Float, width, key)
    }

    pub fn wide_char(width: u64) -> Self {
        Self::unnamed(TypeKind::WideChar, width, "wchar_t".to_string())
    }

    pub fn var_args() -> Self {
        Self::unnamed(TypeKind::VarArgs, 0, "...".to_string())
    }

    pub fn value(width: u64) -> Self {
        Self::unnamed(TypeKind::Value, width, "value".to_string())
    }

    /// A pointer of `width` bytes to `target`.
    pub fn pointer(target: TypeDescriptor, width: u64) -> Self {
        let key = format!("{}*", target.key);
        Self::unnamed(
            TypeKind::Pointer {
                target: Box::new(target),
            },
            width,
            key,
        )
    }

    pub fn array(element: TypeDescriptor, count: u64) -> Self {
        let key = format!("{}[{}]", element.key, count);
        let width = element.width * count;
        Self::unnamed(
            TypeKind::Array {
                element: Box::new(element),
                count,
            },
            width,
            key,
        )
    }

    pub fn function(return_type: TypeDescriptor, parameters: Vec<TypeDescriptor>, variadic: bool) -> Self {
        let mut params: Vec<&str> = parameters.iter().map(|p| p.key.as_str()).collect();
        if variadic {
            params.push("...");
        }
        let key = format!("{}({})", return_type.key, params.join(", "));
        Self::unnamed(
            TypeKind::Function {
                return_type: Box::new(return_type),
                parameters,
                variadic,
            },
            0,
            key,
        )
    }

    /// A struct, class or union aggregate.
    ///
    /// Anonymous aggregates get a key spelled out from their members, which
    /// is not guaranteed unique.
    pub fn aggregate(
        variant: StructureVariant,
        name: Option<&str>,
        width: u64,
        members: Vec<StructureMember>,
    ) -> Self {
        let key = match name {
            Some(name) => format!("{} {}", variant.keyword(), name),
            None => {
                let fields: Vec<&str> = members.iter().map(|m| m.ty.key.as_str()).collect();
                format!("{} {{ {} }}", variant.keyword(), fields.join("; "))
            }
        };
        Self {
            kind: TypeKind::Structure { variant, members },
            width,
            registered_name: name.map(str::to_string),
            key,
        }
    }

    pub fn structure(name: Option<&str>, width: u64, members: Vec<StructureMember>) -> Self {
        Self::aggregate(StructureVariant::Struct, name, width, members)
    }

    pub fn union(name: Option<&str>, width: u64, members: Vec<StructureMember>) -> Self {
        Self::aggregate(StructureVariant::Union, name, width, members)
    }

    pub fn enumeration(name: Option<&str>, width: u64) -> Self {
        Self {
            kind: TypeKind::Enumeration,
            width,
            registered_name: name.map(str::to_string),
            key: match name {
                Some(name) => format!("enum {}", name),
                None => "enum".to_string(),
            },
        }
    }

    /// A reference to a type registered in the binary view.
    ///
    /// The key matches the key of the referenced aggregate
    /// (`struct node` refers to `struct node`), so a reference resolves to
    /// an already cached aggregate without a lookup.
    pub fn named_reference(class: NamedTypeClass, name: &str, type_id: Option<&str>) -> Self {
        let key = match &class {
            NamedTypeClass::Struct => format!("struct {}", name),
            NamedTypeClass::Union => format!("union {}", name),
            NamedTypeClass::Enum => format!("enum {}", name),
            _ => name.to_string(),
        };
        Self::unnamed(
            TypeKind::NamedTypeReference {
                class,
                type_id: type_id.map(str::to_string),
                name: name.to_string(),
            },
            0,
            key,
        )
    }

    /// A descriptor of a type class this crate does not know.
    pub fn other(class: &str, width: u64) -> Self {
        Self::unnamed(TypeKind::Other(class.to_string()), width, class.to_string())
    }

    /// Overrides the identity key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Overrides the registered name.
    pub fn with_registered_name(mut self, name: impl Into<String>) -> Self {
        self.registered_name = Some(name.into());
        self
    }

    /// Returns true if this is a void descriptor.
    pub fn is_void(&self) -> bool {
        matches!(self.kind, TypeKind::Void)
    }
}
