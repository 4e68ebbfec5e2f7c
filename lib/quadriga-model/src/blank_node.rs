use rand::random;
use std::fmt;
use thiserror::Error;

/// An owned blank node: a node identifier scoped to the local graph.
///
/// The common way to create a new blank node is to use the
/// [`BlankNode::default()`] function that generates a random unique
/// identifier.
///
/// The default string formatter is returning an N-Quads compatible
/// representation:
/// ```
/// use quadriga_model::BlankNode;
///
/// assert_eq!("_:a122", BlankNode::new("a122")?.to_string());
/// # Result::<_, quadriga_model::BlankNodeIdParseError>::Ok(())
/// ```
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Clone, Hash)]
pub struct BlankNode {
    id: String,
}

impl BlankNode {
    /// Creates a blank node from a unique identifier.
    ///
    /// The identifier must be valid according to the N-Quads grammar.
    pub fn new(id: impl Into<String>) -> Result<Self, BlankNodeIdParseError> {
        let id = id.into();
        validate_blank_node_identifier(&id)?;
        Ok(Self { id })
    }

    /// Creates a blank node from a unique identifier without validation.
    ///
    /// [`BlankNode::new()`] is a safe version of this constructor and should
    /// be used for untrusted data.
    #[inline]
    pub fn new_unchecked(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        self.id.as_str()
    }

    #[inline]
    pub fn into_string(self) -> String {
        self.id
    }
}

impl fmt::Display for BlankNode {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_:{}", self.id)
    }
}

impl Default for BlankNode {
    /// Builds a new blank node with a unique id.
    fn default() -> Self {
        // The id should not start with a digit to stay valid in all syntaxes
        loop {
            let id = format!("{:x}", random::<u128>());
            if matches!(id.as_bytes().first(), Some(b'a'..=b'f')) {
                return Self { id };
            }
        }
    }
}

fn validate_blank_node_identifier(id: &str) -> Result<(), BlankNodeIdParseError> {
    let mut chars = id.chars();
    let front = chars.next().ok_or(BlankNodeIdParseError)?;
    match front {
        '0'..='9' | '_' | ':' | 'A'..='Z' | 'a'..='z' => (),
        c if c > '\u{7f}' => (),
        _ => return Err(BlankNodeIdParseError),
    }
    for c in chars {
        match c {
            '.' | '-' | '0'..='9' | '_' | ':' | 'A'..='Z' | 'a'..='z' => (),
            c if c > '\u{7f}' => (),
            _ => return Err(BlankNodeIdParseError),
        }
    }
    // Dots are not allowed at the end
    if id.ends_with('.') {
        return Err(BlankNodeIdParseError);
    }
    Ok(())
}

/// An error raised during [`BlankNode`] identifier validation.
#[derive(Debug, Error)]
#[error("The blank node identifier is invalid")]
pub struct BlankNodeIdParseError;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_validates() {
        assert!(BlankNode::new("a1").is_ok());
        assert!(BlankNode::new("a.b").is_ok());
        assert!(BlankNode::new("").is_err());
        assert!(BlankNode::new("a b").is_err());
        assert!(BlankNode::new("a.").is_err());
    }

    #[test]
    fn default_is_unique() {
        assert_ne!(BlankNode::default(), BlankNode::default());
    }
}
