#![cfg(test)]
#![allow(clippy::panic_in_result_fn)]

use quadriga::graph::{QuadStore, QuadWriter, Ref, ValueHash};
use quadriga::iterate::Cancellation;
use quadriga::model::{BlankNode, Direction, Iri, Quad, Value};
use quadriga::storage::{ApplyOptions, Delta, StorageError};
use quadriga::store::Store;

fn iri(name: &str) -> Value {
    Value::Iri(Iri::new_unchecked(format!("http://example.com/{name}")))
}

fn quad(s: &str, p: &str, o: &str) -> Quad {
    Quad::new(iri(s), iri(p), iri(o))
}

fn all_quads(store: &Store) -> Vec<Quad> {
    let reader = store.read();
    let ctx = Cancellation::new();
    let mut cursor = reader.quads_all();
    let mut out = Vec::new();
    while cursor.next(&ctx) {
        let quad = reader
            .quad(&cursor.result().unwrap())
            .unwrap()
            .expect("present quad must resolve");
        out.push(quad);
    }
    out
}

#[test]
fn name_of_value_of_roundtrips_every_kind() -> Result<(), StorageError> {
    let store = Store::new();
    let values = [
        iri("alice"),
        Value::BlankNode(BlankNode::new_unchecked("b1")),
        Value::from("plain"),
        Value::new_lang_string("ville", "fr").unwrap(),
        Value::from(42),
        Value::from(2.5),
        Value::from(true),
        Value::DateTime("2011-02-03T04:05:06Z".parse().unwrap()),
    ];
    for value in &values {
        store.add_quad(Quad::new(iri("s"), iri("p"), value.clone()))?;
    }
    let reader = store.read();
    for value in &values {
        // The dictionary lookup, not the prefetched shortcut
        let stored = reader.name_of(&Ref::Node(ValueHash::new(value)))?;
        assert_eq!(Some(value), stored.as_ref());
        // And the prefetched shortcut agrees
        assert_eq!(
            Some(value.clone()),
            reader.name_of(&reader.value_of(value))?
        );
    }
    Ok(())
}

#[test]
fn size_matches_the_all_quads_scan() -> Result<(), StorageError> {
    let store = Store::new();
    store.add_quad(quad("alice", "likes", "bob"))?;
    store.add_quad(quad("bob", "likes", "dan"))?;
    store.add_quad(Quad::with_label(
        iri("alice"),
        iri("status"),
        Value::from("cool"),
        iri("statuses"),
    ))?;
    assert_eq!(3, store.size());
    assert_eq!(store.size() as usize, all_quads(&store).len());

    store.remove_quad(quad("bob", "likes", "dan"))?;
    assert_eq!(2, store.size());
    assert_eq!(store.size() as usize, all_quads(&store).len());
    Ok(())
}

#[test]
fn add_then_remove_leaves_no_trace_in_scans() -> Result<(), StorageError> {
    let store = Store::new();
    let q = quad("alice", "likes", "bob");
    store.add_quad(q.clone())?;
    store.remove_quad(q.clone())?;
    assert_eq!(0, store.size());
    assert!(!store.contains(&q)?);
    assert!(all_quads(&store).is_empty());
    // The delta history is preserved even though the quad is gone
    assert_eq!(2, store.log_entries()?.len());
    Ok(())
}

#[test]
fn duplicate_adds_and_missing_removes() -> Result<(), StorageError> {
    let store = Store::new();
    let q = quad("alice", "likes", "bob");
    store.add_quad(q.clone())?;
    assert!(matches!(
        store.add_quad(q.clone()),
        Err(StorageError::Delta(_))
    ));
    assert!(matches!(
        store.remove_quad(quad("x", "y", "z")),
        Err(StorageError::Delta(_))
    ));
    // With the ignore options both are no-ops
    store.apply_deltas(
        &[Delta::add(q.clone()), Delta::remove(quad("x", "y", "z"))],
        ApplyOptions {
            ignore_duplicate_add: true,
            ignore_missing_remove: true,
        },
    )?;
    assert_eq!(1, store.size());
    Ok(())
}

#[test]
fn batches_are_atomic() -> Result<(), StorageError> {
    let store = Store::new();
    let before = store.horizon();
    // The second delta violates parity, so nothing of the batch lands
    let result = store.apply_deltas(
        &[
            Delta::add(quad("alice", "likes", "bob")),
            Delta::remove(quad("never", "was", "there")),
        ],
        ApplyOptions::default(),
    );
    assert!(result.is_err());
    assert_eq!(0, store.size());
    assert_eq!(before, store.horizon());
    assert!(!store.contains(&quad("alice", "likes", "bob"))?);
    assert!(store.log_entries()?.is_empty());
    Ok(())
}

#[test]
fn every_direction_iterator_finds_its_quads() -> Result<(), StorageError> {
    let store = Store::new();
    let labeled = Quad::with_label(iri("alice"), iri("likes"), iri("bob"), iri("g"));
    store.add_quad(labeled.clone())?;
    store.add_quad(quad("bob", "likes", "dan"))?;

    let reader = store.read();
    let ctx = Cancellation::new();
    for (dir, value, expected) in [
        (Direction::Subject, iri("alice"), 1),
        (Direction::Predicate, iri("likes"), 2),
        (Direction::Object, iri("bob"), 1),
        (Direction::Label, iri("g"), 1),
    ] {
        let mut cursor = reader.quad_cursor(dir, &reader.value_of(&value));
        let mut count = 0;
        while cursor.next(&ctx) {
            count += 1;
            let found = reader.quad(&cursor.result().unwrap())?.unwrap();
            assert_eq!(Some(&value), found.get(dir));
        }
        assert_eq!(expected, count, "direction {dir}");
    }

    // Contains agrees with the scan
    let mut by_subject = reader.quad_cursor(Direction::Subject, &reader.value_of(&iri("alice")));
    let quad_ref = {
        let mut all = reader.quads_all();
        let mut found = None;
        while all.next(&ctx) {
            let r = all.result().unwrap();
            if reader.quad(&r)?.as_ref() == Some(&labeled) {
                found = Some(r);
            }
        }
        found.expect("labeled quad must be scanned")
    };
    assert!(by_subject.contains(&ctx, &quad_ref));
    Ok(())
}

#[test]
fn refcounts_equal_present_position_counts() -> Result<(), StorageError> {
    let store = Store::new();
    store.add_quad(quad("alice", "likes", "bob"))?;
    store.add_quad(quad("bob", "likes", "dan"))?;
    let reader = store.read();
    assert_eq!(2, reader.refcount(&iri("likes"))?);
    assert_eq!(2, reader.refcount(&iri("bob"))?);
    assert_eq!(1, reader.refcount(&iri("alice"))?);
    assert_eq!(0, reader.refcount(&iri("stranger"))?);

    store.remove_quad(quad("bob", "likes", "dan"))?;
    let reader = store.read();
    assert_eq!(1, reader.refcount(&iri("likes"))?);
    assert_eq!(1, reader.refcount(&iri("bob"))?);
    assert_eq!(0, reader.refcount(&iri("dan"))?);
    Ok(())
}

#[test]
fn horizon_is_monotone_and_snapshots_are_stable() -> Result<(), StorageError> {
    let store = Store::new();
    let mut last = store.horizon();
    let before = store.read();
    for i in 0..5 {
        store.add_quad(quad("s", "p", &format!("o{i}")))?;
        assert!(store.horizon() > last);
        last = store.horizon();
    }
    // The old snapshot still sees the empty store
    assert_eq!(0, before.size());
    let ctx = Cancellation::new();
    let mut cursor = before.quads_all();
    assert!(!cursor.next(&ctx));
    Ok(())
}

#[test]
fn nodes_all_returns_interned_nodes() -> Result<(), StorageError> {
    let store = Store::new();
    store.add_quad(quad("alice", "likes", "bob"))?;
    let reader = store.read();
    let ctx = Cancellation::new();
    let mut cursor = reader.nodes_all();
    let mut names = Vec::new();
    while cursor.next(&ctx) {
        names.push(reader.name_of(&cursor.result().unwrap())?.unwrap());
    }
    assert_eq!(3, names.len());
    for name in ["alice", "likes", "bob"] {
        assert!(names.contains(&iri(name)), "missing {name}");
    }
    assert_eq!(3, reader.node_count());
    Ok(())
}

#[test]
fn quad_direction_walks_the_slots() -> Result<(), StorageError> {
    let store = Store::new();
    store.add_quad(quad("alice", "likes", "bob"))?;
    let reader = store.read();
    let ctx = Cancellation::new();
    let mut cursor = reader.quads_all();
    assert!(cursor.next(&ctx));
    let quad_ref = cursor.result().unwrap();
    for (dir, expected) in [
        (Direction::Subject, Some(iri("alice"))),
        (Direction::Predicate, Some(iri("likes"))),
        (Direction::Object, Some(iri("bob"))),
        (Direction::Label, None),
    ] {
        let node = reader.quad_direction(&quad_ref, dir);
        match expected {
            Some(expected) => {
                assert_eq!(Some(expected), reader.name_of(&node.unwrap())?);
            }
            None => assert!(node.is_none()),
        }
    }
    Ok(())
}
