//! Entity identifier types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when an identifier string is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid identifier: {reason}")]
pub struct InvalidId {
    reason: &'static str,
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create an identifier from a string.
            ///
            /// Returns an error if the string is empty.
            pub fn new(s: impl Into<String>) -> Result<Self, InvalidId> {
                let s = s.into();
                if s.is_empty() {
                    return Err(InvalidId {
                        reason: "identifier cannot be empty",
                    });
                }
                Ok($name(s))
            }

            /// Identifier minted by the store; `n` keeps it non-empty.
            pub(crate) fn generated(prefix: &str, n: u64) -> Self {
                $name(format!("{prefix}-{n}"))
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the identifier and returns the inner String.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = InvalidId;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                $name::new(s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

entity_id!(
    /// Identifier of a [`Trip`](super::Trip).
    ///
    /// # Examples
    ///
    /// ```
    /// use itinerary_engine::domain::TripId;
    ///
    /// let id = TripId::new("trip-1").unwrap();
    /// assert_eq!(id.as_str(), "trip-1");
    ///
    /// // Empty strings are rejected
    /// assert!(TripId::new("").is_err());
    /// ```
    TripId
);

entity_id!(
    /// Identifier of a [`Day`](super::Day).
    DayId
);

entity_id!(
    /// Identifier of an [`Item`](super::Item).
    ItemId
);

entity_id!(
    /// Identifier of a synthesized [`Link`](super::Link).
    LinkId
);

impl LinkId {
    /// The identifier of the move block between two items.
    ///
    /// Derived from the endpoints so that re-synthesizing an unchanged day
    /// yields the same identifiers.
    pub fn between(from: &ItemId, to: &ItemId) -> Self {
        LinkId(format!("{}->{}", from.0, to.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_valid_id() {
        assert!(TripId::new("trip-1").is_ok());
        assert!(DayId::new("d1").is_ok());
        assert!(ItemId::new("firestore/AbC123").is_ok());
    }

    #[test]
    fn reject_empty() {
        assert!(TripId::new("").is_err());
        assert!(ItemId::new(String::new()).is_err());
    }

    #[test]
    fn display_and_debug() {
        let id = ItemId::new("item-7").unwrap();
        assert_eq!(format!("{id}"), "item-7");
        assert_eq!(format!("{id:?}"), "ItemId(item-7)");
    }

    #[test]
    fn link_id_from_endpoints() {
        let a = ItemId::new("i1").unwrap();
        let b = ItemId::new("i2").unwrap();
        assert_eq!(LinkId::between(&a, &b).as_str(), "i1->i2");
        assert_ne!(LinkId::between(&a, &b), LinkId::between(&b, &a));
    }

    #[test]
    fn serde_is_transparent() {
        let id = DayId::new("day-3").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"day-3\"");

        let back: DayId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);

        assert!(serde_json::from_str::<DayId>("\"\"").is_err());
    }
}
