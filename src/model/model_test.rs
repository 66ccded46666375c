use super::*;

#[test]
fn instance_key_bytes_preserve_order() {
    let a = InstanceKey::from(vec![1, 300]);
    let b = InstanceKey::from(vec![2, 1]);

    assert!(a.to_bytes() < b.to_bytes());
    assert_eq!(InstanceKey::from_bytes(&a.to_bytes()), Some(a));
    assert_eq!(InstanceKey::from_bytes(&[0, 1, 2]), None);
}

#[test]
fn instance_key_prefix_and_child() {
    let key = InstanceKey::from(vec![3, 7]);

    assert_eq!(key.prefix(1), InstanceKey::from(vec![3]));
    assert_eq!(key.prefix(5), key);
    assert_eq!(key.prefix(1).child(9), InstanceKey::from(vec![3, 9]));
    assert!(key.starts_with(&InstanceKey::root()));
    assert_eq!(key.to_string(), "3.7");
    assert_eq!(InstanceKey::root().to_string(), "-");
}

#[test]
fn backend_key_orders_lexicographically() {
    let eth0 = BackendKey::new(["eth0"]);
    let eth0_a = BackendKey::new(["eth0", "a"]);
    let eth1 = BackendKey::new(["eth1"]);

    assert!(eth0 < eth0_a);
    assert!(eth0_a < eth1);
    assert!(eth0.is_prefix_of(&eth0_a));
    assert!(!eth0.is_prefix_of(&eth0));
    assert!(!eth1.is_prefix_of(&eth0_a));
}

#[test]
fn descriptor_param_lookup_includes_index_params() {
    let d = ObjectDescriptor::new("Device.WiFi.SSID", &["i"]).with_params(&["Name", "Enable"]);

    assert_eq!(d.key_shape(), 1);
    assert!(d.has_param("i"));
    assert!(d.has_param("Name"));
    assert!(!d.has_param("Missing"));
    assert_eq!(d.index_position("i"), Some(0));
    assert_eq!(d.index_position("Name"), None);
}

#[test]
fn supplied_fields_override_defaults() {
    let d = ObjectDescriptor::new("Device.X", &["i"])
        .with_default("Enable", "false")
        .with_default("Mode", "auto");
    let mut supplied = FieldValues::new();
    supplied.insert("Enable".into(), "true".into());

    let fields = d.fields_with_defaults(&supplied);

    assert_eq!(fields.get("Enable").map(String::as_str), Some("true"));
    assert_eq!(fields.get("Mode").map(String::as_str), Some("auto"));
}

#[test]
fn catalog_splits_edges_by_class_and_orders_parents_first() {
    let catalog = MetadataCatalog::new(
        vec![
            ObjectDescriptor::new("B", &["i", "j"]),
            ObjectDescriptor::new("A", &["i"]),
            ObjectDescriptor::new("S", &[]),
        ],
        vec![
            DependencyEdge::new(DependencyClass::AutoCreate, ("A", "p"), ("B", "q")),
            DependencyEdge::new(DependencyClass::AutoDelete, ("A", "p"), ("B", "q")),
            DependencyEdge::new(DependencyClass::AutoDelete, ("A", "r"), ("B", "q")),
        ],
    );

    assert_eq!(catalog.edges("A", DependencyClass::AutoCreate).len(), 1);
    assert_eq!(catalog.edges("A", DependencyClass::AutoDelete).len(), 2);
    assert!(catalog.edges("B", DependencyClass::AutoCreate).is_empty());

    let names: Vec<_> = catalog.objects().iter().map(|d| d.name.clone()).collect();
    assert_eq!(names, vec!["S", "A", "B"]);
    assert!(catalog.descriptor("missing").is_none());
}

#[test]
fn ownership_user_involvement() {
    assert!(Ownership::user().touched_by_user());
    assert!(!Ownership::system().touched_by_user());
    assert!(Ownership {
        create_owner: Owner::System,
        cfg_owner: Owner::User
    }
    .touched_by_user());
}
