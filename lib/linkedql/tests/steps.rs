#![cfg(test)]
#![allow(clippy::panic_in_result_fn)]

use linkedql::{execute, EvaluationError, ParseError, QueryResults, StepRegistry};
use quadriga::graph::QuadWriter;
use quadriga::iterate::Cancellation;
use quadriga::model::{Iri, Quad, Value};
use quadriga::store::Store;
use serde_json::{json, Value as Json};

fn iri(name: &str) -> Value {
    Value::Iri(Iri::new_unchecked(format!("http://example.com/{name}")))
}

fn id(name: &str) -> Json {
    json!({ "@id": format!("http://example.com/{name}") })
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

fn values(store: &Store, query: Json) -> Vec<Value> {
    let registry = StepRegistry::default();
    let results = execute(store, &registry, &query, &Cancellation::new())
        .expect("query must compile and run");
    let QueryResults::Values(stream) = results else {
        panic!("expected a value stream");
    };
    let mut out: Vec<Value> = stream
        .collect::<Result<_, _>>()
        .expect("scan must not fail");
    out.sort_by(Value::total_cmp);
    out.dedup();
    out
}

fn set(names: &[&str]) -> Vec<Value> {
    let mut out: Vec<Value> = names.iter().map(|n| iri(n)).collect();
    out.sort_by(Value::total_cmp);
    out
}

#[test]
fn vertex_returns_every_named_node() {
    // S1
    let store = store_with(&[("alice", "likes", "bob")]);
    assert_eq!(
        set(&["alice", "likes", "bob"]),
        values(&store, json!({ "@type": "Vertex" }))
    );
}

#[test]
fn view_and_back() {
    // S2
    let store = store_with(&[("alice", "likes", "bob")]);
    let view = json!({
        "@type": "View",
        "from": { "@type": "Vertex", "values": [id("alice")] },
        "properties": [id("likes")],
    });
    assert_eq!(set(&["bob"]), values(&store, view.clone()));

    let back = json!({ "@type": "Back", "from": view });
    assert_eq!(set(&["alice"]), values(&store, back));
}

#[test]
fn view_both_walks_both_directions() {
    // S3
    let store = store_with(&[("alice", "likes", "bob"), ("bob", "likes", "dan")]);
    let query = json!({
        "@type": "ViewBoth",
        "from": { "@type": "Vertex", "values": [id("bob")] },
        "properties": [id("likes")],
    });
    assert_eq!(set(&["alice", "dan"]), values(&store, query));
}

#[test]
fn count_counts_every_interned_entity() {
    // S4: three distinct nodes plus the quad record
    let store = store_with(&[("alice", "likes", "bob")]);
    let query = json!({
        "@type": "Count",
        "from": { "@type": "Vertex" },
    });
    assert_eq!(vec![Value::from(4)], values(&store, query));
}

#[test]
fn filters_are_type_constrained() {
    // S5
    let store = Store::new();
    for value in [Value::from("Alice"), Value::from(0), Value::from(1)] {
        store
            .add_quad(Quad::new(iri("alice"), iri("name"), value))
            .unwrap();
    }
    let filtered = |filter: Json| {
        json!({
            "@type": "Filter",
            "from": { "@type": "Vertex" },
            "filter": filter,
        })
    };
    assert_eq!(
        vec![Value::from(0)],
        values(&store, filtered(json!({ "@type": "LessThan", "value": 1 })))
    );
    assert_eq!(
        vec![Value::from(1)],
        values(
            &store,
            filtered(json!({ "@type": "GreaterThanEquals", "value": 1 }))
        )
    );
    assert_eq!(
        vec![Value::from("Alice")],
        values(
            &store,
            filtered(json!({ "@type": "RegExp", "pattern": "^Al" }))
        )
    );
}

#[test]
fn documents_assemble_properties_by_subject() {
    // S6
    let store = Store::new();
    store
        .add_quad(Quad::new(iri("alice"), iri("likes"), iri("bob")))
        .unwrap();
    store
        .add_quad(Quad::new(iri("alice"), iri("name"), Value::from("Alice")))
        .unwrap();
    store
        .add_quad(Quad::new(iri("bob"), iri("name"), Value::from("Bob")))
        .unwrap();

    let query = json!({
        "@type": "Documents",
        "from": {
            "@type": "Properties",
            "from": { "@type": "Vertex" },
            "names": [id("name"), id("likes")],
        },
    });
    let registry = StepRegistry::default();
    let results = execute(&store, &registry, &query, &Cancellation::new()).unwrap();
    let QueryResults::Documents(docs) = results else {
        panic!("expected documents");
    };

    assert_eq!(2, docs.len());
    let by_id = |id: &str| {
        docs.iter()
            .find(|doc| doc["@id"] == json!(format!("http://example.com/{id}")))
            .unwrap_or_else(|| panic!("no document for {id}"))
            .clone()
    };
    let alice = by_id("alice");
    assert_eq!(
        json!(["Alice"]),
        alice["http://example.com/name"]
    );
    assert_eq!(
        json!([{ "@id": "http://example.com/bob" }]),
        alice["http://example.com/likes"]
    );
    let bob = by_id("bob");
    assert_eq!(json!(["Bob"]), bob["http://example.com/name"]);
    assert!(bob.get("http://example.com/likes").is_none());
}

#[test]
fn select_streams_tag_rows() {
    let store = store_with(&[("alice", "likes", "bob"), ("bob", "likes", "dan")]);
    let query = json!({
        "@type": "Select",
        "from": {
            "@type": "View",
            "from": {
                "@type": "As",
                "from": { "@type": "Vertex", "values": [id("alice"), id("bob")] },
                "name": "who",
            },
            "properties": [id("likes")],
        },
    });
    let registry = StepRegistry::default();
    let results = execute(&store, &registry, &query, &Cancellation::new()).unwrap();
    let QueryResults::Solutions(stream) = results else {
        panic!("expected solutions");
    };
    let mut rows: Vec<(Value, Value)> = stream
        .map(|solution| {
            let solution = solution.unwrap();
            (
                solution.bindings["who"].clone(),
                solution.value.unwrap(),
            )
        })
        .collect();
    rows.sort_by(|a, b| a.0.total_cmp(&b.0));
    rows.dedup();
    assert_eq!(
        vec![(iri("alice"), iri("bob")), (iri("bob"), iri("dan"))],
        rows
    );
}

#[test]
fn select_first_stops_after_one_row() {
    let store = store_with(&[("alice", "likes", "bob"), ("alice", "likes", "dan")]);
    let query = json!({
        "@type": "SelectFirst",
        "from": {
            "@type": "As",
            "from": {
                "@type": "View",
                "from": { "@type": "Vertex", "values": [id("alice")] },
                "properties": [id("likes")],
            },
            "name": "liked",
        },
    });
    let registry = StepRegistry::default();
    let results = execute(&store, &registry, &query, &Cancellation::new()).unwrap();
    let QueryResults::Solutions(stream) = results else {
        panic!("expected solutions");
    };
    let rows: Vec<_> = stream.map(Result::unwrap).collect();
    assert_eq!(1, rows.len());
    assert!(rows[0].bindings.contains_key("liked"));
}

#[test]
fn prefixed_field_and_type_names_normalize() {
    let store = store_with(&[("alice", "likes", "bob")]);
    let query = json!({
        "@type": "linkedql:View",
        "linkedql:from": { "@type": "linkedql:Vertex", "linkedql:values": [id("alice")] },
        "linkedql:properties": [id("likes")],
    });
    assert_eq!(set(&["bob"]), values(&store, query));
}

#[test]
fn context_resolves_short_iris() {
    let store = store_with(&[("alice", "likes", "bob")]);
    let query = json!({
        "@context": { "ex": "http://example.com/" },
        "@type": "View",
        "from": { "@type": "Vertex", "values": [{ "@id": "ex:alice" }] },
        "properties": [{ "@id": "ex:likes" }],
    });
    assert_eq!(set(&["bob"]), values(&store, query));

    // The Context step scopes additional prefixes to its subtree
    let step_scoped = json!({
        "@type": "Context",
        "context": { "ex": "http://example.com/" },
        "from": {
            "@type": "Has",
            "from": { "@type": "Vertex" },
            "property": { "@id": "ex:likes" },
            "values": [{ "@id": "ex:bob" }],
        },
    });
    assert_eq!(set(&["alice"]), values(&store, step_scoped));
}

#[test]
fn intersect_union_difference() {
    let store = store_with(&[("alice", "likes", "bob"), ("bob", "likes", "dan")]);
    let likers = json!({
        "@type": "Has",
        "from": { "@type": "Vertex" },
        "property": id("likes"),
        "values": [],
    });
    let intersect = json!({
        "@type": "Intersect",
        "from": likers.clone(),
        "steps": [{ "@type": "Vertex", "values": [id("bob"), id("dan")] }],
    });
    assert_eq!(set(&["bob"]), values(&store, intersect));

    let union = json!({
        "@type": "Union",
        "from": { "@type": "Vertex", "values": [id("alice")] },
        "steps": [{ "@type": "Vertex", "values": [id("dan")] }],
    });
    assert_eq!(set(&["alice", "dan"]), values(&store, union));

    let difference = json!({
        "@type": "Difference",
        "from": likers,
        "steps": [{ "@type": "Vertex", "values": [id("bob")] }],
    });
    assert_eq!(set(&["alice"]), values(&store, difference));
}

#[test]
fn follow_morphisms() {
    let store = store_with(&[("alice", "likes", "bob"), ("bob", "likes", "dan")]);
    let likes = json!({
        "@type": "View",
        "from": { "@type": "Morphism" },
        "properties": [id("likes")],
    });
    let follow = json!({
        "@type": "Follow",
        "from": { "@type": "Vertex", "values": [id("alice")] },
        "followed": likes.clone(),
    });
    assert_eq!(set(&["bob"]), values(&store, follow));

    let reverse = json!({
        "@type": "FollowReverse",
        "from": { "@type": "Vertex", "values": [id("bob")] },
        "followed": likes.clone(),
    });
    assert_eq!(set(&["alice"]), values(&store, reverse));

    let recursive = json!({
        "@type": "FollowRecursive",
        "from": { "@type": "Vertex", "values": [id("alice")] },
        "followed": likes,
    });
    assert_eq!(set(&["bob", "dan"]), values(&store, recursive));
}

#[test]
fn property_name_steps() {
    let store = store_with(&[("alice", "likes", "bob"), ("alice", "name", "na")]);
    let names = json!({
        "@type": "PropertyNames",
        "from": { "@type": "Vertex", "values": [id("alice")] },
    });
    assert_eq!(set(&["likes", "name"]), values(&store, names));

    let reverse = json!({
        "@type": "ReversePropertyNames",
        "from": { "@type": "Vertex", "values": [id("bob")] },
    });
    assert_eq!(set(&["likes"]), values(&store, reverse));
}

#[test]
fn match_patterns_constrain_entities() {
    let store = store_with(&[
        ("alice", "likes", "bob"),
        ("bob", "likes", "dan"),
        ("dan", "status", "cool"),
    ]);
    // Who likes somebody who likes dan?
    let query = json!({
        "@type": "Match",
        "from": { "@type": "Vertex" },
        "pattern": {
            "http://example.com/likes": {
                "http://example.com/likes": { "@id": "http://example.com/dan" },
            },
        },
    });
    assert_eq!(set(&["alice"]), values(&store, query));

    // The entity-only pattern asserts bare existence
    let exists = json!({
        "@type": "Match",
        "from": { "@type": "Vertex", "values": [id("alice")] },
        "pattern": { "@id": "http://example.com/alice" },
    });
    assert_eq!(set(&["alice"]), values(&store, exists));
}

#[test]
fn unknown_steps_and_missing_fields_fail_to_parse() {
    let store = Store::new();
    let registry = StepRegistry::default();
    let unknown = execute(
        &store,
        &registry,
        &json!({ "@type": "Teleport" }),
        &Cancellation::new(),
    );
    assert!(matches!(
        unknown,
        Err(EvaluationError::Parse(ParseError::UnknownStep(_)))
    ));

    let missing = execute(
        &store,
        &registry,
        &json!({ "@type": "View" }),
        &Cancellation::new(),
    );
    assert!(matches!(
        missing,
        Err(EvaluationError::Parse(ParseError::MissingField { .. }))
    ));
}

#[test]
fn cancellation_surfaces_as_a_query_error() {
    let store = store_with(&[("alice", "likes", "bob")]);
    let registry = StepRegistry::default();
    let cancel = Cancellation::new();
    cancel.cancel();
    let results = execute(&store, &registry, &json!({ "@type": "Vertex" }), &cancel).unwrap();
    let QueryResults::Values(mut stream) = results else {
        panic!("expected a value stream");
    };
    assert!(matches!(
        stream.next(),
        Some(Err(EvaluationError::Query(_)))
    ));
}
