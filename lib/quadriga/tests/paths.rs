#![cfg(test)]
#![allow(clippy::panic_in_result_fn)]

use quadriga::graph::{QuadStore, QuadWriter};
use quadriga::iterate::compare::Operator;
use quadriga::iterate::{Cancellation, QueryError, TagMap};
use quadriga::model::{Iri, Quad, Value};
use quadriga::path::Path;
use quadriga::shape::ValueFilter;
use quadriga::store::Store;
use std::sync::Arc;

fn iri(name: &str) -> Value {
    Value::Iri(Iri::new_unchecked(format!("http://example.com/{name}")))
}

fn store_with(quads: &[(&str, &str, &str)]) -> Store {
    let store = Store::new();
    for (s, p, o) in quads {
        store
            .add_quad(Quad::new(iri(s), iri(p), iri(o)))
            .expect("test data must apply");
    }
    store
}

fn reader(store: &Store) -> Arc<dyn QuadStore> {
    Arc::new(store.read())
}

/// Collects the named results of a path, sorted for set comparison.
fn names(path: &Path) -> Vec<Value> {
    let store = path.store().expect("bound path");
    let ctx = Cancellation::new();
    let mut cursor = path.build_cursor().expect("path must lower");
    let mut out = Vec::new();
    while cursor.next(&ctx) {
        if let Some(value) = store
            .name_of(&cursor.result().unwrap())
            .expect("resolution must not fail")
        {
            out.push(value);
        }
    }
    assert!(cursor.err().is_none(), "scan failed: {:?}", cursor.err());
    out.sort_by(Value::total_cmp);
    out.dedup();
    out
}

fn set(names_list: &[&str]) -> Vec<Value> {
    let mut out: Vec<Value> = names_list.iter().map(|n| iri(n)).collect();
    out.sort_by(Value::total_cmp);
    out
}

#[test]
fn out_in_and_both_traverse_edges() {
    let store = store_with(&[("alice", "likes", "bob"), ("bob", "likes", "dan")]);
    let g = reader(&store);

    let out = Path::start(Arc::clone(&g), [iri("alice")]).out([iri("likes")]);
    assert_eq!(set(&["bob"]), names(&out));

    let in_ = Path::start(Arc::clone(&g), [iri("dan")]).in_([iri("likes")]);
    assert_eq!(set(&["bob"]), names(&in_));

    let both = Path::start(Arc::clone(&g), [iri("bob")]).both([iri("likes")]);
    assert_eq!(set(&["alice", "dan"]), names(&both));

    // Out with no predicate constraint follows any edge
    let any = Path::start(Arc::clone(&g), [iri("alice")]).out(Vec::new());
    assert_eq!(set(&["bob"]), names(&any));
}

#[test]
fn has_and_is_constrain_the_stream() {
    let store = store_with(&[
        ("alice", "likes", "bob"),
        ("bob", "likes", "dan"),
        ("dan", "status", "cool"),
    ]);
    let g = reader(&store);

    let likers = Path::start(Arc::clone(&g), Vec::new()).has([iri("likes")], Vec::new());
    assert_eq!(set(&["alice", "bob"]), names(&likers));

    let likes_dan = Path::start(Arc::clone(&g), Vec::new()).has([iri("likes")], [iri("dan")]);
    assert_eq!(set(&["bob"]), names(&likes_dan));

    let liked = Path::start(Arc::clone(&g), Vec::new()).has_reverse([iri("likes")], Vec::new());
    assert_eq!(set(&["bob", "dan"]), names(&liked));

    let is = Path::start(Arc::clone(&g), Vec::new()).is([iri("alice"), iri("nobody")]);
    assert_eq!(set(&["alice"]), names(&is));
}

#[test]
fn tags_flow_to_the_results() {
    let store = store_with(&[("alice", "likes", "bob")]);
    let g = reader(&store);
    let path = Path::start(Arc::clone(&g), [iri("alice")])
        .tag(["start".to_owned()])
        .out([iri("likes")]);
    let ctx = Cancellation::new();
    let mut cursor = path.build_cursor().unwrap();
    assert!(cursor.next(&ctx));
    let mut tags = TagMap::default();
    cursor.tag_results(&mut tags);
    let start = tags.get("start").expect("tagged start position");
    assert_eq!(Some(iri("alice")), g.name_of(start).unwrap());
}

#[test]
fn back_returns_to_the_origin_or_a_tag() {
    let store = store_with(&[("alice", "likes", "bob"), ("bob", "likes", "dan")]);
    let g = reader(&store);

    // The empty tag is the origin of the path scope
    let origin = Path::start(Arc::clone(&g), [iri("alice")])
        .out([iri("likes")])
        .back("");
    assert_eq!(set(&["alice"]), names(&origin));

    let tagged = Path::start(Arc::clone(&g), Vec::new())
        .tag(["here".to_owned()])
        .out([iri("likes")])
        .is([iri("dan")])
        .back("here");
    assert_eq!(set(&["bob"]), names(&tagged));
}

#[test]
fn follow_and_follow_reverse_apply_morphisms() {
    let store = store_with(&[("alice", "likes", "bob"), ("bob", "likes", "dan")]);
    let g = reader(&store);
    let likes = Path::morphism().out([iri("likes")]);

    let followed = Path::start(Arc::clone(&g), [iri("alice")]).follow(likes.clone());
    assert_eq!(set(&["bob"]), names(&followed));

    let reversed = Path::start(Arc::clone(&g), [iri("bob")]).follow_reverse(likes);
    assert_eq!(set(&["alice"]), names(&reversed));
}

#[test]
fn follow_recursive_detects_cycles() {
    let store = store_with(&[
        ("alice", "likes", "bob"),
        ("bob", "likes", "dan"),
        ("dan", "likes", "alice"),
    ]);
    let g = reader(&store);
    let likes = Path::morphism().out([iri("likes")]);

    // The cycle back to alice is detected, not re-emitted
    let unbounded =
        Path::start(Arc::clone(&g), [iri("alice")]).follow_recursive(likes.clone(), 0);
    assert_eq!(set(&["bob", "dan"]), names(&unbounded));

    let shallow = Path::start(Arc::clone(&g), [iri("alice")]).follow_recursive(likes, 1);
    assert_eq!(set(&["bob"]), names(&shallow));
}

#[test]
fn except_and_or_compose_sets() {
    let store = store_with(&[("alice", "likes", "bob"), ("bob", "likes", "dan")]);
    let g = reader(&store);

    let everyone_liked = Path::start(Arc::clone(&g), Vec::new()).has_reverse([iri("likes")], Vec::new());
    let not_dan = everyone_liked.except(Path::start(Arc::clone(&g), [iri("dan")]));
    assert_eq!(set(&["bob"]), names(&not_dan));

    let both = Path::start(Arc::clone(&g), [iri("alice")])
        .or(Path::start(Arc::clone(&g), [iri("dan")]));
    assert_eq!(set(&["alice", "dan"]), names(&both));

    let and = Path::start(Arc::clone(&g), Vec::new())
        .has([iri("likes")], Vec::new())
        .and(Path::start(Arc::clone(&g), [iri("bob"), iri("dan")]));
    assert_eq!(set(&["bob"]), names(&and));
}

#[test]
fn save_tags_neighbors() {
    let store = store_with(&[("alice", "name", "na"), ("alice", "likes", "bob")]);
    let g = reader(&store);

    // Non-optional save requires the edge
    let named = Path::start(Arc::clone(&g), Vec::new()).save(iri("name"), "n");
    assert_eq!(set(&["alice"]), names(&named));

    // Optional save keeps edge-less values and leaves the tag absent
    let path = Path::start(Arc::clone(&g), [iri("alice"), iri("bob")])
        .save_optional(iri("name"), "n");
    let ctx = Cancellation::new();
    let mut cursor = path.build_cursor().unwrap();
    let mut rows = Vec::new();
    while cursor.next(&ctx) {
        let mut tags = TagMap::default();
        cursor.tag_results(&mut tags);
        let subject = g.name_of(&cursor.result().unwrap()).unwrap().unwrap();
        let tagged = tags
            .get("n")
            .map(|r| g.name_of(r).unwrap().unwrap());
        rows.push((subject, tagged));
    }
    rows.sort_by(|a, b| a.0.total_cmp(&b.0));
    assert_eq!(
        vec![(iri("alice"), Some(iri("na"))), (iri("bob"), None)],
        rows
    );
}

#[test]
fn predicate_enumeration() {
    let store = store_with(&[("alice", "likes", "bob"), ("alice", "name", "na")]);
    let g = reader(&store);

    let out_preds = Path::start(Arc::clone(&g), [iri("alice")]).out_predicates();
    assert_eq!(set(&["likes", "name"]), names(&out_preds));

    let in_preds = Path::start(Arc::clone(&g), [iri("bob")]).in_predicates();
    assert_eq!(set(&["likes"]), names(&in_preds));

    // SavePredicates enumerates alternatives through next_path
    let path = Path::start(Arc::clone(&g), [iri("alice")]).save_predicates("p", false);
    let ctx = Cancellation::new();
    let mut cursor = path.build_cursor().unwrap();
    assert!(cursor.next(&ctx));
    let mut seen = Vec::new();
    loop {
        let mut tags = TagMap::default();
        cursor.tag_results(&mut tags);
        seen.push(g.name_of(tags.get("p").unwrap()).unwrap().unwrap());
        if !cursor.next_path(&ctx) {
            break;
        }
    }
    seen.sort_by(Value::total_cmp);
    assert_eq!(set(&["likes", "name"]), seen);
}

#[test]
fn labels_of_labeled_quads() {
    let store = Store::new();
    store
        .add_quad(Quad::with_label(
            iri("alice"),
            iri("status"),
            iri("cool"),
            iri("statuses"),
        ))
        .unwrap();
    store.add_quad(Quad::new(iri("alice"), iri("likes"), iri("bob"))).unwrap();
    let g = reader(&store);
    let labels = Path::start(Arc::clone(&g), [iri("alice")]).labels();
    assert_eq!(set(&["statuses"]), names(&labels));
}

#[test]
fn filters_compare_and_match() {
    let store = Store::new();
    for value in [Value::from("Alice"), Value::from(0), Value::from(1)] {
        store
            .add_quad(Quad::new(iri("alice"), iri("name"), value))
            .unwrap();
    }
    let g = reader(&store);

    let less = Path::start(Arc::clone(&g), Vec::new()).filter(Operator::LessThan, Value::from(1));
    assert_eq!(vec![Value::from(0)], names(&less));

    let at_least = Path::start(Arc::clone(&g), Vec::new())
        .filter(Operator::GreaterThanEquals, Value::from(1));
    assert_eq!(vec![Value::from(1)], names(&at_least));

    let matching = Path::start(Arc::clone(&g), Vec::new()).filters(vec![ValueFilter::Regexp {
        pattern: "^Al".into(),
        include_iris: false,
    }]);
    assert_eq!(vec![Value::from("Alice")], names(&matching));

    // A broken pattern surfaces as a regex execution error
    let broken = Path::start(Arc::clone(&g), Vec::new()).filters(vec![ValueFilter::Regexp {
        pattern: "(".into(),
        include_iris: false,
    }]);
    match broken.build_cursor() {
        Err(err) => assert!(matches!(err, QueryError::Regex(_))),
        Ok(_) => panic!("expected a regex execution error"),
    }
}

#[test]
fn order_limit_skip_and_unique() {
    let store = store_with(&[
        ("alice", "likes", "bob"),
        ("alice", "likes", "dan"),
        ("bob", "likes", "dan"),
    ]);
    let g = reader(&store);

    let ordered = Path::start(Arc::clone(&g), Vec::new())
        .has([iri("likes")], Vec::new())
        .unique()
        .order();
    let ctx = Cancellation::new();
    let mut cursor = ordered.build_cursor().unwrap();
    let mut out = Vec::new();
    while cursor.next(&ctx) {
        out.push(g.name_of(&cursor.result().unwrap()).unwrap().unwrap());
    }
    assert_eq!(set(&["alice", "bob"]), out);

    let paged = Path::start(Arc::clone(&g), Vec::new())
        .has([iri("likes")], Vec::new())
        .unique()
        .order()
        .skip(1)
        .limit(1);
    assert_eq!(set(&["bob"]), names(&paged));
}

#[test]
fn count_collapses_the_stream() {
    let store = store_with(&[("alice", "likes", "bob")]);
    let g = reader(&store);
    // Three nodes plus the interned quad record
    let count = Path::start(Arc::clone(&g), Vec::new()).count();
    assert_eq!(vec![Value::from(4)], names(&count));

    let out_count = Path::start(Arc::clone(&g), [iri("alice")])
        .out([iri("likes")])
        .count();
    assert_eq!(vec![Value::from(1)], names(&out_count));
}

#[test]
fn optional_branches_attach_tags_without_filtering() {
    let store = store_with(&[("alice", "likes", "bob"), ("bob", "name", "nb")]);
    let g = reader(&store);
    let with_name = Path::morphism().save(iri("name"), "n");
    let path = Path::start(Arc::clone(&g), [iri("alice"), iri("bob")]).optional(with_name);

    let ctx = Cancellation::new();
    let mut cursor = path.build_cursor().unwrap();
    let mut rows = Vec::new();
    while cursor.next(&ctx) {
        let mut tags = TagMap::default();
        cursor.tag_results(&mut tags);
        let subject = g.name_of(&cursor.result().unwrap()).unwrap().unwrap();
        rows.push((subject, tags.contains_key("n")));
    }
    rows.sort_by(|a, b| a.0.total_cmp(&b.0));
    assert_eq!(vec![(iri("alice"), false), (iri("bob"), true)], rows);
}

#[test]
fn optimize_preserves_result_sets() {
    let store = store_with(&[
        ("alice", "likes", "bob"),
        ("bob", "likes", "dan"),
        ("dan", "status", "cool"),
    ]);
    let g = reader(&store);
    let path = Path::start(Arc::clone(&g), Vec::new())
        .has([iri("likes")], Vec::new())
        .out([iri("likes")]);

    // The optimized pipeline is what build_cursor runs; the raw lowering
    // skips both shape and cursor rewrites
    let raw = path.to_shape().lower(&g).unwrap();
    let ctx = Cancellation::new();
    let mut raw = raw;
    let mut unoptimized = Vec::new();
    while raw.next(&ctx) {
        if let Some(value) = g.name_of(&raw.result().unwrap()).unwrap() {
            unoptimized.push(value);
        }
    }
    unoptimized.sort_by(Value::total_cmp);
    unoptimized.dedup();
    assert_eq!(unoptimized, names(&path));
}

#[test]
fn cancellation_stops_the_scan() {
    let store = store_with(&[("alice", "likes", "bob")]);
    let g = reader(&store);
    let path = Path::start(Arc::clone(&g), Vec::new());
    let mut cursor = path.build_cursor().unwrap();
    let ctx = Cancellation::new();
    ctx.cancel();
    assert!(!cursor.next(&ctx));
    assert!(matches!(cursor.err(), Some(QueryError::Cancelled)));
}
