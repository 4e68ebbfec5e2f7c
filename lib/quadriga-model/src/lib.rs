//! Data structures for quad graphs: node [`Value`]s, [`Quad`]s and the
//! direction taxonomy used by quad indexes.
//!
//! Usage example:
//! ```
//! use quadriga_model::{Iri, Quad, Value};
//!
//! let alice = Iri::new("http://example.com/alice")?;
//! let likes = Iri::new("http://example.com/likes")?;
//! let bob = Iri::new("http://example.com/bob")?;
//! let quad = Quad::new(alice, likes, bob);
//! assert_eq!(
//!     "<http://example.com/alice> <http://example.com/likes> <http://example.com/bob> .",
//!     quad.to_string()
//! );
//! # Result::<_, quadriga_model::IriParseError>::Ok(())
//! ```

mod blank_node;
mod iri;
mod quad;
mod value;
pub mod vocab;

pub use crate::blank_node::{BlankNode, BlankNodeIdParseError};
pub use crate::iri::Iri;
pub use crate::quad::{Direction, Quad};
pub use crate::value::{LanguageTagParseError, Value};
pub use oxiri::IriParseError;
