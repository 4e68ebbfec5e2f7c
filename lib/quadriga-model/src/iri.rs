use oxiri::IriParseError;
use std::cmp::Ordering;
use std::fmt;

/// An owned [IRI](https://www.w3.org/TR/rdf11-concepts/#dfn-iri).
///
/// The default string formatter is returning an N-Quads compatible
/// representation:
/// ```
/// use quadriga_model::Iri;
///
/// assert_eq!(
///     "<http://example.com/foo>",
///     Iri::new("http://example.com/foo")?.to_string()
/// );
/// # Result::<_, quadriga_model::IriParseError>::Ok(())
/// ```
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Clone, Hash)]
pub struct Iri {
    iri: String,
}

impl Iri {
    /// Builds and validates an IRI.
    pub fn new(iri: impl Into<String>) -> Result<Self, IriParseError> {
        Ok(Self {
            iri: oxiri::Iri::parse(iri.into())?.into_inner(),
        })
    }

    /// Builds an IRI from a string.
    ///
    /// It is the caller's responsibility to ensure that `iri` is a valid IRI.
    ///
    /// [`Iri::new()`] is a safe version of this constructor and should be
    /// used for untrusted data.
    #[inline]
    pub fn new_unchecked(iri: impl Into<String>) -> Self {
        Self { iri: iri.into() }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        self.iri.as_str()
    }

    #[inline]
    pub fn into_string(self) -> String {
        self.iri
    }
}

impl fmt::Display for Iri {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.iri)
    }
}

impl From<Iri> for String {
    #[inline]
    fn from(iri: Iri) -> Self {
        iri.into_string()
    }
}

impl PartialEq<str> for Iri {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<Iri> for str {
    #[inline]
    fn eq(&self, other: &Iri) -> bool {
        self == other.as_str()
    }
}

impl PartialOrd<str> for Iri {
    #[inline]
    fn partial_cmp(&self, other: &str) -> Option<Ordering> {
        self.as_str().partial_cmp(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_relative_iris() {
        assert!(Iri::new("http://example.com/a").is_ok());
        assert!(Iri::new("foo").is_err());
    }
}
