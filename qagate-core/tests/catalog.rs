use qagate_core::{AccessError, CatalogEntry, ResourceCatalog, ResourceKind};

#[test]
fn standard_catalog_lookup() {
    let catalog = ResourceCatalog::standard();
    let entry = catalog.lookup(" Audit-Reports ").unwrap();
    assert_eq!(entry.kind, ResourceKind::Page);
    assert_eq!(entry.category, "Audits");
    assert_eq!(entry.display_label, "Audit Reports");
}

#[test]
fn unknown_resource() {
    let catalog = ResourceCatalog::standard();
    let err = catalog.lookup("payroll").unwrap_err();
    assert!(matches!(err, AccessError::UnknownResource(name) if name == "payroll"));
}

#[test]
fn lookup_kind_distinguishes_kinds() {
    let catalog = ResourceCatalog::standard();
    assert!(catalog.lookup_kind("ai-audit", ResourceKind::Feature).is_ok());
    assert!(matches!(
        catalog.lookup_kind("ai-audit", ResourceKind::Page),
        Err(AccessError::UnknownResource(_))
    ));
}

#[test]
fn categories_follow_first_appearance() {
    let catalog = ResourceCatalog::from_entries(vec![
        CatalogEntry::new("b", ResourceKind::Page, "Second", "B"),
        CatalogEntry::new("a", ResourceKind::Page, "First", "A"),
        CatalogEntry::new("c", ResourceKind::Feature, "Second", "C"),
    ])
    .unwrap();

    assert_eq!(catalog.categories(), vec!["Second", "First"]);
    let grouped = catalog.grouped();
    assert_eq!(grouped[0].category, "Second");
    let names: Vec<_> = grouped[0].entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["b", "c"]);
}

#[test]
fn duplicate_entries_rejected() {
    let err = ResourceCatalog::from_entries(vec![
        CatalogEntry::new("settings", ResourceKind::Page, "Admin", "Settings"),
        CatalogEntry::new("SETTINGS", ResourceKind::Page, "Admin", "Settings again"),
    ])
    .unwrap_err();
    assert!(matches!(err, AccessError::InvalidCatalog(_)));
}

#[test]
fn same_name_different_kind_allowed() {
    let catalog = ResourceCatalog::from_entries(vec![
        CatalogEntry::new("analytics", ResourceKind::Page, "Analytics", "Analytics"),
        CatalogEntry::new("analytics", ResourceKind::ApiEndpoint, "API", "Analytics API"),
    ])
    .unwrap();
    assert_eq!(catalog.len(), 2);
}
