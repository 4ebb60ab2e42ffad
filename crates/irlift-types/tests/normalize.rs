//! Normalization of recursive and registered types through a static host.

use irlift_core::{NamedTypeClass, StaticHost, StructureMember, TypeDescriptor};
use irlift_types::{Location, Type, TypeNormalizer};

fn struct_ref(name: &str) -> TypeDescriptor {
    TypeDescriptor::named_reference(NamedTypeClass::Struct, name, None)
}

/// `struct node { int64_t value; struct node *next; }`
fn linked_list_node() -> TypeDescriptor {
    TypeDescriptor::structure(
        Some("node"),
        16,
        vec![
            StructureMember::new("value", 0, TypeDescriptor::int(8, true)),
            StructureMember::new("next", 8, TypeDescriptor::pointer(struct_ref("node"), 8)),
        ],
    )
}

fn host_with_node() -> StaticHost {
    let mut host = StaticHost::linux_x86_64();
    host.register_type("node", Some("node-id"), linked_list_node());
    host
}

#[test]
fn test_self_referential_struct() {
    let host = host_with_node();
    let mut norm = TypeNormalizer::new(8);
    let id = norm.normalize(&host, &linked_list_node()).unwrap();

    let Type::Structure { elements } = &norm.arena()[id] else {
        panic!("expected structure, got {:?}", norm.arena()[id]);
    };
    assert_eq!(elements.len(), 2);
    assert_eq!(norm.arena()[elements[1]], Type::Pointer { element: id });
    assert_eq!(norm.arena().size_of(id, 8), Some(16));
}

#[test]
fn test_reference_resolves_to_aggregate() {
    let host = host_with_node();
    let mut norm = TypeNormalizer::new(8);
    let via_ref = norm.normalize(&host, &struct_ref("node")).unwrap();
    let direct = norm.normalize(&host, &linked_list_node()).unwrap();
    assert_eq!(via_ref, direct);
    assert!(matches!(norm.arena()[via_ref], Type::Structure { .. }));

    let by_id = TypeDescriptor::named_reference(NamedTypeClass::Struct, "renamed", Some("node-id"));
    assert_eq!(norm.normalize(&host, &by_id).unwrap(), direct);
}

#[test]
fn test_idempotent_normalization() {
    let host = host_with_node();
    let mut norm = TypeNormalizer::new(8);
    let first = norm.normalize(&host, &linked_list_node()).unwrap();
    let len = norm.arena().len();
    let second = norm.normalize(&host, &linked_list_node()).unwrap();
    assert_eq!(first, second);
    assert_eq!(norm.arena().len(), len);
}

#[test]
fn test_mutually_recursive_structs() {
    let a = TypeDescriptor::structure(
        Some("a"),
        8,
        vec![StructureMember::new("b", 0, TypeDescriptor::pointer(struct_ref("b"), 8))],
    );
    let b = TypeDescriptor::structure(
        Some("b"),
        8,
        vec![StructureMember::new("a", 0, TypeDescriptor::pointer(struct_ref("a"), 8))],
    );
    let mut host = StaticHost::linux_x86_64();
    host.register_type("a", None, a.clone()).register_type("b", None, b.clone());

    let mut norm = TypeNormalizer::new(8);
    let a_id = norm.normalize(&host, &a).unwrap();
    let b_id = norm.normalize(&host, &b).unwrap();

    let Type::Structure { elements } = &norm.arena()[a_id] else {
        panic!("expected structure");
    };
    let Type::Pointer { element } = norm.arena()[elements[0]] else {
        panic!("expected pointer");
    };
    assert_eq!(element, b_id);
}

#[test]
fn test_layout_padding() {
    let host = StaticHost::linux_x86_64();
    let mut norm = TypeNormalizer::new(8);
    let desc = TypeDescriptor::structure(
        Some("sparse"),
        16,
        vec![
            StructureMember::new("head", 0, TypeDescriptor::int(4, true)),
            StructureMember::new("tail", 12, TypeDescriptor::int(4, true)),
        ],
    );
    let id = norm.normalize(&host, &desc).unwrap();
    let arena = norm.arena();
    let Type::Structure { elements } = &arena[id] else {
        panic!("expected structure");
    };
    assert_eq!(elements.len(), 3);
    assert_eq!(arena[elements[0]], Type::Integer { size: 4, signed: true });
    assert_eq!(arena[elements[1]], Type::Padding { bytes: 8 });
    assert_eq!(arena[elements[2]], Type::Integer { size: 4, signed: true });
    assert_eq!(arena.size_of(id, 8), Some(16));
}

#[test]
fn test_anonymous_aggregates_are_not_cached() {
    let host = StaticHost::linux_x86_64();
    let mut norm = TypeNormalizer::new(8);
    let members = || vec![StructureMember::new("x", 0, TypeDescriptor::int(4, true))];

    let a = norm.normalize(&host, &TypeDescriptor::structure(None, 4, members())).unwrap();
    let b = norm.normalize(&host, &TypeDescriptor::structure(None, 4, members())).unwrap();
    let u = norm.normalize(&host, &TypeDescriptor::union(None, 4, members())).unwrap();
    assert_ne!(a, b);
    assert!(matches!(norm.arena()[u], Type::Union { .. }));
    assert_eq!(norm.cache_len(), 0);
}

#[test]
fn test_self_aliasing_typedef_terminates() {
    let looping = TypeDescriptor::named_reference(NamedTypeClass::Typedef, "loop_t", None);
    let mut host = StaticHost::linux_x86_64();
    host.register_type("loop_t", None, looping.clone());

    let mut norm = TypeNormalizer::new(8);
    let id = norm.normalize(&host, &looping).unwrap();
    assert_eq!(norm.arena()[id], Type::Typedef { underlying: id });
    assert_eq!(norm.arena().size_of(id, 8), None);
}

#[test]
fn test_typedef_chain() {
    let mut host = StaticHost::linux_x86_64();
    host.register_type("u32", None, TypeDescriptor::int(4, false))
        .register_type(
            "handle_t",
            None,
            TypeDescriptor::named_reference(NamedTypeClass::Typedef, "u32", None),
        );

    let mut norm = TypeNormalizer::new(8);
    let desc = TypeDescriptor::named_reference(NamedTypeClass::Typedef, "handle_t", None);
    let id = norm.normalize(&host, &desc).unwrap();
    let Type::Typedef { underlying } = norm.arena()[id] else {
        panic!("expected typedef");
    };
    let Type::Typedef { underlying: inner } = norm.arena()[underlying] else {
        panic!("expected typedef");
    };
    assert_eq!(norm.arena()[inner], Type::Integer { size: 4, signed: true });
    assert_eq!(norm.cached("handle_t"), Some(id));
}

#[test]
fn test_reference_cycle_degrades_to_void() {
    let mut host = StaticHost::linux_x86_64();
    host.register_type("ouroboros", None, struct_ref("ouroboros"));

    let mut norm = TypeNormalizer::new(8);
    let id = norm.normalize(&host, &struct_ref("ouroboros")).unwrap();
    assert!(norm.arena()[id].is_void());
}

#[test]
fn test_unresolved_and_unknown_references() {
    let host = StaticHost::linux_x86_64();
    let mut norm = TypeNormalizer::new(8);
    for desc in [
        struct_ref("missing"),
        TypeDescriptor::named_reference(NamedTypeClass::Unknown, "mystery", None),
        TypeDescriptor::named_reference(NamedTypeClass::Other("class".to_string()), "widget", None),
    ] {
        let id = norm.normalize(&host, &desc).unwrap();
        assert!(norm.arena()[id].is_void(), "{} should degrade to void", desc.key);
    }
}

#[test]
fn test_rendering() {
    let record = TypeDescriptor::structure(
        Some("record"),
        24,
        vec![
            StructureMember::new("id", 0, TypeDescriptor::int(4, false)),
            StructureMember::new("score", 8, TypeDescriptor::float(8)),
            StructureMember::new(
                "callback",
                16,
                TypeDescriptor::pointer(
                    TypeDescriptor::function(
                        TypeDescriptor::void(),
                        vec![TypeDescriptor::pointer(struct_ref("record"), 8)],
                        false,
                    ),
                    8,
                ),
            ),
        ],
    );
    let mut host = StaticHost::linux_x86_64();
    host.register_type("record", None, record.clone());

    let mut norm = TypeNormalizer::new(8);
    let id = norm.normalize(&host, &record).unwrap();
    insta::assert_snapshot!(
        norm.arena().display(id).to_string(),
        @"struct#0 { i32, pad[4], f64, ptr(fn(ptr(struct#0)) -> void) }"
    );

    let node = norm.normalize(&host, &linked_list_node()).unwrap();
    assert_eq!(
        norm.arena().display(node).to_string(),
        format!("struct#{0} {{ i64, ptr(struct#{0}) }}", node.index())
    );
}

#[test]
fn test_location_json() {
    let host = StaticHost::linux_x86_64();
    let mut norm = TypeNormalizer::new(8);
    let int = norm.normalize(&host, &TypeDescriptor::int(4, true)).unwrap();

    let json = serde_json::to_value(Location::register("RDI", int)).unwrap();
    assert_eq!(json, serde_json::json!({ "storage": { "register": { "name": "RDI" } }, "ty": 0 }));

    let json = serde_json::to_value(Location::memory("RSP", 8, int)).unwrap();
    assert_eq!(
        json,
        serde_json::json!({ "storage": { "memory": { "base": "RSP", "offset": 8 } }, "ty": 0 })
    );
}
