//! Generated lookup vocabulary: setup, accumulation and deduplicating commit

use etl_loader::{ErrorListener, LoadError, Loader, LoaderConfig, LookupCache, LookupHandler};
use etl_model::{
    FieldDescriptor, NodePath, Schema, SchemaRegistry, TypeDescriptor, Value, ValueRow,
};
use etl_store::{MemoryStore, ObjectStore};
use etl_test_utils::{pet_with_breed, ErrorLog, FailingStore, Fixture, BREED, SPECIES, SPECIES_BREED};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn paths(mappings: &[&str]) -> Vec<NodePath> {
    mappings.iter().map(|m| m.parse().unwrap()).collect()
}

fn handler(schema: Arc<dyn Schema>, store: Arc<dyn ObjectStore>) -> LookupHandler {
    handler_with_log(schema, store, &ErrorLog::new())
}

fn handler_with_log(
    schema: Arc<dyn Schema>,
    store: Arc<dyn ObjectStore>,
    log: &Arc<ErrorLog>,
) -> LookupHandler {
    let log = Arc::clone(log);
    let listener: Arc<dyn ErrorListener> =
        Arc::new(move |id: &str, error: &LoadError| log.record(id, error));
    let cache = LookupCache::new(Arc::clone(&store), 1_000);
    LookupHandler::new(schema, store, cache, listener)
}

fn load(fixture: &Fixture) -> etl_loader::LoadSummary {
    Loader::new(
        fixture.source.clone(),
        fixture.store.clone(),
        fixture.schema.clone(),
        LoaderConfig::default(),
    )
    .unwrap()
    .load()
    .unwrap()
}

#[test]
fn repeated_name_creates_one_lookup() {
    let fixture = Fixture::new(vec![
        ValueRow::new("a", "pet", "species", "Golden Retriever"),
        ValueRow::new("b", "pet", "species", "Golden Retriever"),
        ValueRow::new("c", "pet", "species", "Golden Retriever"),
    ]);
    let summary = load(&fixture);
    assert_eq!(summary.lookups_created, 1);
    assert_eq!(fixture.codes(SPECIES), vec!["GOLDEN_RETRIEVER"]);

    let lookup = &fixture.saved(SPECIES)[0];
    assert_eq!(lookup.text("name"), Some("Golden Retriever"));
    for pet in fixture.saved("pet") {
        assert_eq!(pet.text("species"), Some("GOLDEN_RETRIEVER"));
    }
}

#[test]
fn target_lookups_create_relationships() {
    let mut rows = pet_with_breed("a", "Rex", "Canine", "Kelpie");
    rows.extend(pet_with_breed("b", "Max", "Canine", "Labrador"));
    rows.extend(pet_with_breed("c", "Tom", "Feline", "Manx"));
    rows.extend(pet_with_breed("d", "Sky", "Canine", "Kelpie"));
    let fixture = Fixture::new(rows);

    let summary = load(&fixture);
    assert_eq!(summary.lookups_created, 5);
    assert_eq!(summary.relationships_created, 3);
    assert_eq!(fixture.codes(SPECIES), vec!["CANINE", "FELINE"]);
    assert_eq!(fixture.codes(BREED), vec!["KELPIE", "LABRADOR", "MANX"]);

    let species = fixture.saved(SPECIES);
    let canine = species
        .iter()
        .find(|s| s.text("code") == Some("CANINE"))
        .unwrap();
    let canine_links = fixture
        .saved(SPECIES_BREED)
        .into_iter()
        .filter(|link| link.get("source") == Some(&Value::Ref(canine.reference().clone())))
        .count();
    assert_eq!(canine_links, 2);
}

#[test]
fn rerunning_the_load_creates_no_more_vocabulary() {
    let mut rows = pet_with_breed("a", "Rex", "Canine", "Kelpie");
    rows.extend(pet_with_breed("b", "Tom", "Feline", "Manx"));
    let first = Fixture::new(rows);
    load(&first);

    let mut again = pet_with_breed("x", "Rex", "Canine", "Kelpie");
    again.extend(pet_with_breed("y", "Tom", "FELINE", "manx"));
    let second = first.with_rows(again);
    let summary = load(&second);

    assert_eq!(summary.lookups_created, 0);
    assert_eq!(summary.relationships_created, 0);
    assert_eq!(second.saved(SPECIES).len(), 2);
    assert_eq!(second.saved(BREED).len(), 2);
    assert_eq!(second.saved(SPECIES_BREED).len(), 2);
}

#[test]
fn recommitting_identical_pairs_is_a_no_op() {
    let fixture = Fixture::new(Vec::new());
    let mut handler = handler(fixture.schema.clone(), fixture.store.clone());
    handler
        .setup(&paths(&["<pet>species", "<pet>breed"]))
        .unwrap();
    let rows = pet_with_breed("a", "Rex", "Canine", "Kelpie");

    handler.add(&rows);
    let first = handler.commit().unwrap();
    assert_eq!(first.lookups_created, 2);
    assert_eq!(first.relationships_created, 1);

    handler.add(&rows);
    let second = handler.commit().unwrap();
    assert_eq!(second.lookups_created, 0);
    assert_eq!(second.relationships_created, 0);
    assert_eq!(fixture.store.len(), 3);
}

#[test]
fn persisted_codes_are_not_recreated() {
    let fixture = Fixture::new(vec![
        ValueRow::new("a", "pet", "species", "Canine"),
        ValueRow::new("b", "pet", "species", "Feline"),
    ]);
    let mut canine = fixture.store.create(SPECIES).unwrap();
    canine.set("code", "CANINE");
    canine.set("name", "Dog");
    fixture.store.insert(canine);

    let summary = load(&fixture);
    assert_eq!(summary.lookups_created, 1);
    let names: Vec<String> = fixture
        .saved(SPECIES)
        .iter()
        .filter_map(|s| s.text("name").map(str::to_string))
        .collect();
    assert!(names.contains(&"Dog".to_string()));
    assert!(names.contains(&"Feline".to_string()));
}

#[test]
fn first_name_for_a_code_wins() {
    let fixture = Fixture::new(vec![
        ValueRow::new("a", "pet", "species", "Golden Retriever"),
        ValueRow::new("b", "pet", "species", "GOLDEN RETRIEVER"),
    ]);
    load(&fixture);
    let species = fixture.saved(SPECIES);
    assert_eq!(species.len(), 1);
    assert_eq!(species[0].text("name"), Some("Golden Retriever"));
}

#[test]
fn individual_save_failures_are_soft() {
    let fixture = Fixture::new(Vec::new());
    let failing = Arc::new(
        FailingStore::new(fixture.store.clone())
            .fail_batches()
            .fail_code("FELINE"),
    );
    let log = ErrorLog::new();
    let mut handler = handler_with_log(fixture.schema.clone(), failing, &log);
    handler.setup(&paths(&["<pet>species"])).unwrap();
    handler.add(&[
        ValueRow::new("a", "pet", "species", "Canine"),
        ValueRow::new("b", "pet", "species", "Feline"),
        ValueRow::new("c", "pet", "species", "Bovine"),
    ]);

    let summary = handler.commit().unwrap();
    assert_eq!(summary.lookups_created, 2);
    assert_eq!(summary.soft_failures, 1);
    assert_eq!(fixture.codes(SPECIES), vec!["BOVINE", "CANINE"]);
    assert_eq!(log.identifiers(), vec![format!("{SPECIES}#FELINE")]);
}

#[test]
fn relationship_to_unsaved_lookup_fails() {
    let fixture = Fixture::new(Vec::new());
    let failing = Arc::new(FailingStore::new(fixture.store.clone()).fail_code("FELINE"));
    let mut handler = handler(fixture.schema.clone(), failing);
    handler
        .setup(&paths(&["<pet>species", "<pet>breed"]))
        .unwrap();
    handler.add(&pet_with_breed("c", "Tom", "Feline", "Manx"));

    let err = handler.commit().unwrap_err();
    assert!(
        matches!(&err, LoadError::LookupNotFound { type_name, code } if type_name == SPECIES && code == "FELINE"),
        "unexpected error: {err}"
    );
}

#[test]
fn generation_can_be_disabled() {
    let fixture = Fixture::new(vec![ValueRow::new("a", "pet", "species", "Golden Retriever")]);
    let summary = Loader::new(
        fixture.source.clone(),
        fixture.store.clone(),
        fixture.schema.clone(),
        LoaderConfig::new().with_generate_lookups(false),
    )
    .unwrap()
    .load()
    .unwrap();
    assert_eq!(summary.lookups_created, 0);
    assert!(fixture.saved(SPECIES).is_empty());
    assert_eq!(
        fixture.saved("pet")[0].text("species"),
        Some("Golden Retriever")
    );
}

#[test]
fn breed_without_species_records_no_relationship() {
    let fixture = Fixture::new(vec![
        ValueRow::new("a", "pet", "breed", "Kelpie"),
        ValueRow::new("b", "pet", "species", "Canine"),
    ]);
    let summary = load(&fixture);
    assert_eq!(summary.lookups_created, 2);
    assert_eq!(summary.relationships_created, 0);
}

fn breed_schema(relationship: Option<&str>, link: Option<TypeDescriptor>) -> Arc<SchemaRegistry> {
    let mut schema = SchemaRegistry::new()
        .with_type(
            TypeDescriptor::new("pet")
                .with_field(FieldDescriptor::lookup("species", SPECIES))
                .with_field(FieldDescriptor::target_lookup("breed", relationship, "/species")),
        )
        .with_type(TypeDescriptor::new(SPECIES));
    if let Some(link) = link {
        schema = schema.with_type(link);
    }
    Arc::new(schema)
}

fn setup_error(schema: Arc<SchemaRegistry>, mappings: &[&str]) -> LoadError {
    let store = Arc::new(MemoryStore::new(schema.clone()));
    handler(schema, store).setup(&paths(mappings)).unwrap_err()
}

#[test]
fn target_lookup_without_relationship() {
    let err = setup_error(breed_schema(None, None), &["<pet>species", "<pet>breed"]);
    assert!(matches!(err, LoadError::LookupRelationshipNotFound { .. }));
}

#[test]
fn target_lookup_with_unknown_relationship_type() {
    let err = setup_error(
        breed_schema(Some(SPECIES_BREED), None),
        &["<pet>species", "<pet>breed"],
    );
    assert!(matches!(err, LoadError::TypeNotFound(t) if t == SPECIES_BREED));
}

#[test]
fn relationship_without_target_type() {
    let link = TypeDescriptor::new(SPECIES_BREED)
        .with_field(FieldDescriptor::reference("source", SPECIES));
    let err = setup_error(
        breed_schema(Some(SPECIES_BREED), Some(link)),
        &["<pet>species", "<pet>breed"],
    );
    assert!(matches!(err, LoadError::LookupRelationshipTargetNotFound { .. }));
}

#[test]
fn target_lookup_without_mapped_source() {
    let link = TypeDescriptor::new(SPECIES_BREED)
        .with_field(FieldDescriptor::reference("source", SPECIES))
        .with_field(FieldDescriptor::reference("target", BREED));
    let err = setup_error(breed_schema(Some(SPECIES_BREED), Some(link)), &["<pet>breed"]);
    assert!(
        matches!(&err, LoadError::LookupSourceNotFound { source_path, .. } if source_path == "/species")
    );
}

#[test]
fn target_lookup_registered_after_its_source_regardless_of_order() {
    let fixture = Fixture::new(Vec::new());
    let mut handler = handler(fixture.schema.clone(), fixture.store.clone());
    handler
        .setup(&paths(&["<pet>breed", "<pet>species"]))
        .unwrap();
    let relationships: Vec<(&str, &str)> = handler
        .relationships()
        .map(|r| (r.source(), r.target()))
        .collect();
    assert_eq!(relationships, vec![(SPECIES, BREED)]);
    assert!(handler.is_lookup_field("pet", "breed"));
    assert!(!handler.is_lookup_field("pet", "name"));
}

#[test]
fn close_drops_registrations() {
    let fixture = Fixture::new(Vec::new());
    let mut handler = handler(fixture.schema.clone(), fixture.store.clone());
    handler.setup(&paths(&["<pet>species"])).unwrap();
    handler.close();
    assert_eq!(handler.lookups().count(), 0);
    assert!(!handler.is_lookup_field("pet", "species"));
}
