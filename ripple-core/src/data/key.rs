//! Property keys.
//!
//! Objects are keyed by name, arrays by index. A name that spells a canonical
//! non-negative integer (`"0"`, `"17"`, but not `"01"` or `"-1"`) is the same
//! key as the index, so `Key::from("2") == Key::Index(2)`.

use std::fmt;
use std::rc::Rc;

/// The name of the array length property.
pub const LENGTH: &str = "length";

/// A property key on a [`Target`](super::Target).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// An integer index.
    Index(usize),
    /// Any other property name.
    Name(Rc<str>),
}

impl Key {
    /// The length sentinel.
    pub fn length() -> Self {
        Key::Name(Rc::from(LENGTH))
    }

    /// Whether this key is the length sentinel.
    pub fn is_length(&self) -> bool {
        matches!(self, Key::Name(name) if &**name == LENGTH)
    }

    /// The index, if this key is integer-like.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(index) => Some(*index),
            Key::Name(_) => None,
        }
    }

    /// Parse a property name, folding canonical integers into indices.
    pub fn parse(name: &str) -> Self {
        match parse_index(name) {
            Some(index) => Key::Index(index),
            None => Key::Name(Rc::from(name)),
        }
    }
}

fn parse_index(name: &str) -> Option<usize> {
    let canonical = !name.is_empty()
        && name.bytes().all(|b| b.is_ascii_digit())
        && (name == "0" || !name.starts_with('0'));
    if canonical {
        name.parse().ok()
    } else {
        None
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::parse(name)
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::parse(&name)
    }
}

impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(index) => write!(f, "{index}"),
            Key::Name(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_names_fold_into_indices() {
        assert_eq!(Key::from("0"), Key::Index(0));
        assert_eq!(Key::from("42"), Key::Index(42));
        assert_eq!(Key::from(String::from("7")), Key::Index(7));
    }

    #[test]
    fn non_canonical_integers_stay_names() {
        assert!(matches!(Key::from("01"), Key::Name(_)));
        assert!(matches!(Key::from("-1"), Key::Name(_)));
        assert!(matches!(Key::from("1.5"), Key::Name(_)));
        assert!(matches!(Key::from(""), Key::Name(_)));
    }

    #[test]
    fn length_sentinel() {
        assert!(Key::length().is_length());
        assert!(Key::from("length").is_length());
        assert!(!Key::from("len").is_length());
        assert_eq!(Key::length().as_index(), None);
    }

    #[test]
    fn display_matches_source_name() {
        assert_eq!(Key::Index(3).to_string(), "3");
        assert_eq!(Key::from("name").to_string(), "name");
    }
}
