use quadriga::iterate::QueryError;
use quadriga::storage::StorageError;
use quadriga_model::IriParseError;
use thiserror::Error;

/// An error raised while unmarshaling a LinkedQL step document.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The `@type` does not name a registered step.
    #[error("unknown step type {0:?}")]
    UnknownStep(String),
    /// A step document is not an object carrying an `@type`.
    #[error("a step must be a JSON object with an @type")]
    NotAStep,
    #[error("step {step} is missing required field {field:?}")]
    MissingField {
        step: &'static str,
        field: &'static str,
    },
    #[error("field {field:?} of step {step} must be {expected}")]
    WrongFieldType {
        step: &'static str,
        field: &'static str,
        expected: &'static str,
    },
    /// A quad-value literal could not be decoded.
    #[error("invalid value literal: {0}")]
    InvalidValue(String),
    #[error("invalid IRI {iri:?}: {error}")]
    InvalidIri {
        iri: String,
        #[source]
        error: IriParseError,
    },
}

/// An error raised while compiling or running a query.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
