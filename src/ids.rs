//! ULID-backed identifiers.
//!
//! Applications, hooks and requests each get their own newtype so they cannot be
//! mixed up. Hook ids are what makes hook deduplication work: a hook keeps its id
//! when it is copied into a parent application, so the same hook arriving twice
//! through different compositions collapses to one entry.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

macro_rules! ulid_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
        pub struct $name(pub ulid::Ulid);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(ulid::Ulid::new())
            }

            #[must_use]
            pub fn from_ulid(id: ulid::Ulid) -> Self {
                Self(id)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ulid::DecodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let id = ulid::Ulid::from_string(s)?;
                Ok($name(id))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse::<$name>()
                    .map_err(|_| serde::de::Error::custom(concat!("invalid ", $label)))
            }
        }
    };
}

ulid_id!(
    /// Identity of an [`App`](crate::app::App) builder, used in log fields.
    AppId,
    "app id"
);

ulid_id!(
    /// Stable identity of a registered lifecycle hook.
    HookId,
    "hook id"
);

ulid_id!(
    /// Strongly typed request identifier.
    RequestId,
    "request id"
);

impl RequestId {
    /// Attempt to parse from a header string; if invalid, generate a new one.
    #[must_use]
    pub fn from_header_or_new(header_value: Option<&str>) -> Self {
        header_value
            .and_then(|s| s.parse::<RequestId>().ok())
            .unwrap_or_default()
    }
}
