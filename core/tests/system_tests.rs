use ircore::persist::IndexPaths;
use ircore::{Document, IrConfig, IrError, IrSystem, SystemState};
use tempfile::tempdir;

fn titles(docs: Vec<&Document>) -> Vec<String> {
    docs.into_iter().map(|d| d.title.clone()).collect()
}

fn ship_corpus() -> Vec<Document> {
    (0..10)
        .map(|i| Document::new(format!("Ship {i}"), format!("a ship story number {i}")))
        .collect()
}

#[test]
fn deleted_documents_are_filtered_then_compacted_away() {
    let mut system = IrSystem::from_corpus(ship_corpus(), IrConfig::default());
    assert_eq!(system.delete_documents(&[2, 5]), 2);

    let expected: Vec<String> = [0, 1, 3, 4, 6, 7, 8, 9].iter().map(|i| format!("Ship {i}")).collect();
    assert_eq!(titles(system.query("ship").unwrap()), expected);
    // postings still reference the deleted ids until compaction
    assert!(system.primary().terms.get("ship").unwrap().contains(2));

    system.compact();
    assert_eq!(titles(system.query("ship").unwrap()), expected);
    let postings = system.primary().terms.get("ship").unwrap();
    assert!(!postings.contains(2) && !postings.contains(5));
    assert_eq!(system.corpus().get(2).unwrap().title, "REDACTED");
    assert!(system.corpus().get(5).unwrap().description.is_empty());
    assert_eq!(system.corpus().len(), 10);
}

#[test]
fn compaction_is_idempotent() {
    let mut system = IrSystem::from_corpus(ship_corpus(), IrConfig::default());
    system.add_documents(vec![Document::new("Extra", "ship harbour")]);
    system.delete_documents(&[1, 10]);
    system.compact();
    let once = system.primary().clone();
    let corpus_once = system.corpus().clone();
    system.compact();
    assert_eq!(system.primary(), &once);
    assert_eq!(system.corpus(), &corpus_once);
    assert!(system.primary().terms.get("harbour").is_none());
}

#[test]
fn and_not_binds_tightly() {
    let system = IrSystem::from_corpus(
        vec![Document::new("d0", "apple"), Document::new("d1", "apple banana"), Document::new("d2", "banana")],
        IrConfig::default(),
    );
    assert_eq!(titles(system.query("apple AND NOT banana").unwrap()), vec!["d0"]);
    assert_eq!(titles(system.query("NOT apple").unwrap()), vec!["d2"]);
    assert_eq!(titles(system.query("(apple OR banana) AND NOT (apple AND banana)").unwrap()), vec!["d0", "d2"]);
}

#[test]
fn phrase_queries_respect_word_order() {
    let system = IrSystem::from_corpus(
        vec![Document::new("Fox", "the quick brown fox"), Document::new("Dog", "a lazy dog")],
        IrConfig::default(),
    );
    assert_eq!(titles(system.phrase_query("quick brown")), vec!["Fox"]);
    assert_eq!(titles(system.phrase_query("Quick, brown fox!")), vec!["Fox"]);
    assert!(system.phrase_query("brown quick").is_empty());
    assert!(system.phrase_query("fox").is_empty());
}

#[test]
fn auxiliary_segment_is_queried_transparently() {
    let mut system = IrSystem::from_corpus(vec![Document::new("Old", "harbour town")], IrConfig::default());
    let ids = system.add_documents(vec![Document::new("New", "submarine crew"), Document::new("Newer", "submarine dive")]);
    assert_eq!(ids, 1..3);
    assert_eq!(system.state(), SystemState::PrimaryWithAuxiliary);
    assert!(system.primary().terms.get("submarin").is_none());

    assert_eq!(titles(system.query("submarine").unwrap()), vec!["New", "Newer"]);
    assert_eq!(titles(system.query("harbour OR crew").unwrap()), vec!["Old", "New"]);
    assert_eq!(titles(system.phrase_query("submarine dive")), vec!["Newer"]);
    // negation covers ids from both segments
    assert_eq!(titles(system.query("NOT crew").unwrap()), vec!["Old", "Newer"]);
}

#[test]
fn repeated_batches_merge_into_one_auxiliary_segment() {
    let mut system = IrSystem::from_corpus(vec![Document::new("A", "river")], IrConfig::default());
    system.add_documents(vec![Document::new("B", "river delta")]);
    system.add_documents(vec![Document::new("C", "river mouth")]);
    assert_eq!(system.auxiliary().unwrap().terms.get("river").unwrap().as_slice(), &[1, 2]);
    assert_eq!(titles(system.query("river").unwrap()), vec!["A", "B", "C"]);
    system.delete_documents(&[1]);
    assert_eq!(titles(system.query("river").unwrap()), vec!["A", "C"]);
}

#[test]
fn save_and_load_preserve_pending_deletions() {
    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    let mut system = IrSystem::from_corpus(ship_corpus(), IrConfig::default());
    system.add_documents(vec![Document::new("Late", "ship late arrival")]);
    system.delete_documents(&[3]);
    system.save(&paths).unwrap();
    assert_eq!(system.state(), SystemState::PrimaryOnly);

    let loaded = IrSystem::load(&paths, IrConfig::default()).unwrap();
    assert_eq!(loaded.primary(), system.primary());
    assert_eq!(loaded.universe_size(), 11);
    assert!(loaded.deletions().is_deleted(3));
    assert_eq!(loaded.count("ship").unwrap(), 10);
    assert_eq!(titles(loaded.query("late").unwrap()), vec!["Late"]);
}

#[test]
fn load_from_missing_dir_is_recoverable() {
    let dir = tempdir().unwrap();
    let err = IrSystem::load(&IndexPaths::new(dir.path().join("missing")), IrConfig::default()).err().unwrap();
    assert!(err.is_persistence_failure());
}

#[test]
fn malformed_queries_surface_errors() {
    let system = IrSystem::from_corpus(ship_corpus(), IrConfig::default());
    assert!(matches!(system.query("(ship"), Err(IrError::MalformedQuery(_))));
    assert!(matches!(system.query("ship OR"), Err(IrError::MalformedQuery(_))));
    assert!(system.query("").unwrap().is_empty());
}
