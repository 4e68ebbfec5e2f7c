//! Result collation: raw value streams, flat tag tuples and JSON-LD
//! document assembly.

use crate::error::EvaluationError;
use crate::json::value_to_json;
use quadriga::graph::QuadStore;
use quadriga::iterate::{Cancellation, Cursor, TagMap, RESERVED_TAG_SIGIL};
use quadriga_model::Value;
use rustc_hash::FxHashMap;
use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;
use std::sync::Arc;

/// What a query evaluates to.
pub enum QueryResults {
    /// A stream of raw values.
    Values(ValueStream),
    /// A stream of flat tag tuples.
    Solutions(SolutionStream),
    /// JSON-LD documents assembled from the tagged bindings.
    Documents(Vec<Json>),
}

/// Streams the named values of a scanner, skipping refs that resolve to
/// no name (quad records and unknown hashes).
pub struct ValueStream {
    cursor: Box<dyn Cursor>,
    store: Arc<dyn QuadStore>,
    cancel: Cancellation,
    failed: bool,
}

impl ValueStream {
    pub(crate) fn new(
        cursor: Box<dyn Cursor>,
        store: Arc<dyn QuadStore>,
        cancel: Cancellation,
    ) -> Self {
        Self {
            cursor,
            store,
            cancel,
            failed: false,
        }
    }
}

impl Iterator for ValueStream {
    type Item = Result<Value, EvaluationError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if !self.cursor.next(&self.cancel) {
                if let Some(err) = self.cursor.err() {
                    self.failed = true;
                    return Some(Err(err.into()));
                }
                self.cursor.close();
                return None;
            }
            let Some(result) = self.cursor.result() else {
                continue;
            };
            match self.store.name_of(&result) {
                Ok(Some(value)) => return Some(Ok(value)),
                Ok(None) => continue,
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err.into()));
                }
            }
        }
    }
}

impl Drop for ValueStream {
    fn drop(&mut self) {
        self.cursor.close();
    }
}

/// One result row: the primary value (when nameable) and its resolved tag
/// bindings. Internal sigil tags are stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub value: Option<Value>,
    pub bindings: BTreeMap<String, Value>,
}

/// Streams result rows, one per binding witness: alternatives found
/// through `next_path` become their own rows.
pub struct SolutionStream {
    cursor: Box<dyn Cursor>,
    store: Arc<dyn QuadStore>,
    cancel: Cancellation,
    select: Option<Vec<String>>,
    active: bool,
    failed: bool,
}

impl SolutionStream {
    pub(crate) fn new(
        cursor: Box<dyn Cursor>,
        store: Arc<dyn QuadStore>,
        cancel: Cancellation,
        select: Option<Vec<String>>,
    ) -> Self {
        Self {
            cursor,
            store,
            cancel,
            select,
            active: false,
            failed: false,
        }
    }

    fn advance(&mut self) -> Result<bool, EvaluationError> {
        if self.active && self.cursor.next_path(&self.cancel) {
            return Ok(true);
        }
        if self.cursor.next(&self.cancel) {
            self.active = true;
            return Ok(true);
        }
        if let Some(err) = self.cursor.err() {
            return Err(err.into());
        }
        self.cursor.close();
        Ok(false)
    }

    fn solution(&self) -> Result<Solution, EvaluationError> {
        let mut tags = TagMap::default();
        self.cursor.tag_results(&mut tags);
        let mut bindings = BTreeMap::new();
        for (name, r) in &tags {
            if name.starts_with(RESERVED_TAG_SIGIL) {
                continue;
            }
            if let Some(select) = &self.select {
                if !select.contains(name) {
                    continue;
                }
            }
            if let Some(value) = self.store.name_of(r)? {
                bindings.insert(name.clone(), value);
            }
        }
        let value = match self.cursor.result() {
            Some(result) => self.store.name_of(&result)?,
            None => None,
        };
        Ok(Solution { value, bindings })
    }
}

impl Iterator for SolutionStream {
    type Item = Result<Solution, EvaluationError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.advance() {
            Ok(true) => Some(self.solution().inspect_err(|_| {
                self.failed = true;
            })),
            Ok(false) => None,
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

impl Drop for SolutionStream {
    fn drop(&mut self) {
        self.cursor.close();
    }
}

/// Collates a solution stream into JSON-LD documents keyed by `@id`.
/// Rows without a subject identifier or without any binding are dropped;
/// repeated property values are merged into arrays.
pub(crate) fn documents(stream: SolutionStream) -> Result<Vec<Json>, EvaluationError> {
    let mut order = Vec::new();
    let mut by_id: FxHashMap<String, BTreeMap<String, Vec<Json>>> = FxHashMap::default();
    for solution in stream {
        let solution = solution?;
        if solution.bindings.is_empty() {
            continue;
        }
        let id = match &solution.value {
            Some(Value::Iri(iri)) => iri.as_str().to_owned(),
            Some(Value::BlankNode(node)) => format!("_:{}", node.as_str()),
            _ => continue,
        };
        if !by_id.contains_key(&id) {
            order.push(id.clone());
        }
        let doc = by_id.entry(id).or_default();
        for (tag, value) in &solution.bindings {
            let rendered = value_to_json(value);
            let values = doc.entry(tag.clone()).or_default();
            if !values.contains(&rendered) {
                values.push(rendered);
            }
        }
    }
    Ok(order
        .into_iter()
        .filter_map(|id| {
            let fields = by_id.remove(&id)?;
            let mut doc = Map::new();
            doc.insert("@id".into(), Json::String(id));
            for (tag, values) in fields {
                doc.insert(tag, Json::Array(values));
            }
            Some(Json::Object(doc))
        })
        .collect())
}
