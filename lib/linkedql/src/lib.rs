//! LinkedQL: a declarative JSON-LD query surface.
//!
//! A query is a tree of typed steps. The `@type` of each JSON object
//! selects a step constructor from a [`StepRegistry`]; the steps build a
//! [`quadriga::path::Path`] which compiles down to an iterator tree.
//!
//! Usage example:
//! ```
//! use linkedql::{execute, QueryResults, StepRegistry};
//! use quadriga::graph::QuadWriter;
//! use quadriga::iterate::Cancellation;
//! use quadriga::model::{Iri, Quad};
//! use quadriga::store::Store;
//! use serde_json::json;
//!
//! let store = Store::new();
//! store.add_quad(Quad::new(
//!     Iri::new("http://example.com/alice")?,
//!     Iri::new("http://example.com/likes")?,
//!     Iri::new("http://example.com/bob")?,
//! ))?;
//!
//! let registry = StepRegistry::default();
//! let query = json!({
//!     "@type": "Vertex",
//!     "values": [{ "@id": "http://example.com/alice" }],
//! });
//! let results = execute(&store, &registry, &query, &Cancellation::new())?;
//! let QueryResults::Values(values) = results else {
//!     panic!("expected raw values");
//! };
//! assert_eq!(1, values.count());
//! # Result::<_, Box<dyn std::error::Error>>::Ok(())
//! ```

mod error;
mod json;
mod pattern;
mod registry;
mod results;
pub mod steps;

pub use crate::error::{EvaluationError, ParseError};
pub use crate::json::{decode_value, value_to_json};
pub use crate::registry::StepRegistry;
pub use crate::results::{QueryResults, Solution, SolutionStream, ValueStream};

use quadriga::graph::QuadStore;
use quadriga::iterate::Cancellation;
use quadriga::path::Path;
use quadriga::store::Store;
use rustc_hash::FxHashMap;
use serde_json::Value as Json;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// The prefix → base-IRI map threaded through path building. Every IRI is
/// resolved to its absolute form at build time; short IRIs never reach
/// iterators.
#[derive(Debug, Clone)]
pub struct Namespaces {
    map: FxHashMap<String, String>,
}

impl Default for Namespaces {
    fn default() -> Self {
        let mut ns = Self {
            map: FxHashMap::default(),
        };
        ns.set("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#");
        ns.set("rdfs", "http://www.w3.org/2000/01/rdf-schema#");
        ns.set("xsd", "http://www.w3.org/2001/XMLSchema#");
        ns.set("linkedql", quadriga_model::vocab::linkedql::NAMESPACE);
        ns
    }
}

impl Namespaces {
    pub fn set(&mut self, prefix: impl Into<String>, base: impl Into<String>) {
        self.map.insert(prefix.into(), base.into());
    }

    /// Expands `prefix:rest` against a registered prefix; anything else is
    /// returned unchanged.
    pub fn resolve(&self, name: &str) -> String {
        if let Some((prefix, rest)) = name.split_once(':') {
            if let Some(base) = self.map.get(prefix) {
                return format!("{base}{rest}");
            }
        }
        name.into()
    }

    /// Folds a JSON-LD `@context` object (prefix → base string entries)
    /// into the map.
    pub fn extend_from_json(&mut self, context: &Json) {
        if let Json::Object(fields) = context {
            for (prefix, base) in fields {
                if let Json::String(base) = base {
                    self.set(prefix.clone(), base.clone());
                }
            }
        }
    }
}

/// Everything a step needs while lowering to a path: the bound store
/// snapshot and the active namespace map.
pub struct BuildContext {
    pub store: Arc<dyn QuadStore>,
    pub ns: Namespaces,
}

/// A step that lowers to a path.
pub trait PathStep: fmt::Debug + Send + Sync {
    fn build_path(&self, ctx: &mut BuildContext) -> Result<Path, EvaluationError>;
}

/// A terminal, result-producing step.
pub trait FinalStep: fmt::Debug + Send + Sync {
    fn execute(
        &self,
        ctx: &mut BuildContext,
        cancel: &Cancellation,
    ) -> Result<QueryResults, EvaluationError>;
}

/// Compiles and runs a query document against a store.
///
/// A document whose root is a non-terminal step is wrapped in a raw value
/// stream. The cancellation token trips every scanner of the running query.
pub fn execute(
    store: &Store,
    registry: &StepRegistry,
    query: &Json,
    cancel: &Cancellation,
) -> Result<QueryResults, EvaluationError> {
    let step = registry.decode_query(query)?;
    debug!(?step, "compiled query");
    let mut ns = Namespaces::default();
    if let Some(context) = query.get("@context") {
        ns.extend_from_json(context);
    }
    let mut ctx = BuildContext {
        store: Arc::new(store.read()),
        ns,
    };
    step.execute(&mut ctx, cancel)
}
