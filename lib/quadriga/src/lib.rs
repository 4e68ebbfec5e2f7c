//! Quadriga is a graph database engine operating on RDF-style quads
//! ⟨subject, predicate, object, label⟩.
//!
//! Three layers build on each other:
//!
//! * [`storage`] and [`store`]: the quad-indexed persistent store with
//!   delete-tombstone history, identity hashing of node values and
//!   size/horizon bookkeeping.
//! * [`iterate`]: the lazy iterator algebra query plans are made of.
//! * [`shape`] and [`path`]: the traversal builder that compiles
//!   high-level graph expressions into optimizable iterator trees.
//!
//! Usage example:
//! ```
//! use quadriga::graph::QuadWriter;
//! use quadriga::iterate::Cancellation;
//! use quadriga::model::{Iri, Quad, Value};
//! use quadriga::path::Path;
//! use quadriga::store::Store;
//! use std::sync::Arc;
//!
//! let store = Store::new();
//! let alice = Iri::new("http://example.com/alice")?;
//! let likes = Iri::new("http://example.com/likes")?;
//! let bob = Iri::new("http://example.com/bob")?;
//! store.add_quad(Quad::new(alice.clone(), likes.clone(), bob.clone()))?;
//!
//! let reader = Arc::new(store.read()) as Arc<dyn quadriga::graph::QuadStore>;
//! let path = Path::start(Arc::clone(&reader), [Value::Iri(alice)])
//!     .out([Value::Iri(likes)]);
//! let mut cursor = path.build_cursor()?;
//! let ctx = Cancellation::new();
//! assert!(cursor.next(&ctx));
//! assert_eq!(
//!     Some(Value::Iri(bob)),
//!     reader.name_of(&cursor.result().unwrap())?
//! );
//! # Result::<_, Box<dyn std::error::Error>>::Ok(())
//! ```

pub mod graph;
pub mod iterate;
pub mod path;
pub mod shape;
pub mod storage;
pub mod store;

/// The quad and value data model, re-exported from `quadriga-model`.
pub mod model {
    pub use quadriga_model::*;
}
