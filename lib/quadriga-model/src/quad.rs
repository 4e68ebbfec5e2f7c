use crate::Value;
use std::fmt;

/// A direction within a [`Quad`].
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Clone, Copy, Hash)]
pub enum Direction {
    Subject,
    Predicate,
    Object,
    Label,
}

impl Direction {
    /// All directions in quad order.
    pub const ALL: [Self; 4] = [Self::Subject, Self::Predicate, Self::Object, Self::Label];

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Subject => "subject",
            Self::Predicate => "predicate",
            Self::Object => "object",
            Self::Label => "label",
        }
    }
}

impl fmt::Display for Direction {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered 4-tuple ⟨subject, predicate, object, label⟩.
///
/// Subject, predicate and object are required; the label (the named graph
/// the quad belongs to) is optional.
///
/// The default string formatter is returning an N-Quads compatible
/// representation.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct Quad {
    pub subject: Value,
    pub predicate: Value,
    pub object: Value,
    pub label: Option<Value>,
}

impl Quad {
    /// Builds a quad in the unlabeled (default) graph.
    #[inline]
    pub fn new(
        subject: impl Into<Value>,
        predicate: impl Into<Value>,
        object: impl Into<Value>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            label: None,
        }
    }

    /// Builds a quad carrying a label.
    #[inline]
    pub fn with_label(
        subject: impl Into<Value>,
        predicate: impl Into<Value>,
        object: impl Into<Value>,
        label: impl Into<Value>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            label: Some(label.into()),
        }
    }

    /// The value at `dir`, if any.
    #[inline]
    pub fn get(&self, dir: Direction) -> Option<&Value> {
        match dir {
            Direction::Subject => Some(&self.subject),
            Direction::Predicate => Some(&self.predicate),
            Direction::Object => Some(&self.object),
            Direction::Label => self.label.as_ref(),
        }
    }
}

impl fmt::Display for Quad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)?;
        if let Some(label) = &self.label {
            write!(f, " {label}")?;
        }
        f.write_str(" .")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Iri;

    #[test]
    fn get_by_direction() {
        let quad = Quad::with_label(
            Iri::new_unchecked("http://example.com/s"),
            Iri::new_unchecked("http://example.com/p"),
            "o",
            Iri::new_unchecked("http://example.com/g"),
        );
        assert_eq!(
            Some("http://example.com/p"),
            quad.get(Direction::Predicate)
                .and_then(Value::as_iri)
                .map(Iri::as_str)
        );
        assert!(Quad::new(
            Iri::new_unchecked("http://example.com/s"),
            Iri::new_unchecked("http://example.com/p"),
            "o",
        )
        .get(Direction::Label)
        .is_none());
    }
}
