//! Core identifier and payload types
//!
//! Identifiers are plain `u64` newtypes allocated monotonically by the store.
//! They are global (not per-collection), so an id alone is enough to find the
//! owning collection.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw id
            #[inline]
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Raw id value
            #[inline]
            pub const fn as_u64(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, ":{}"), self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

id_type!(
    /// Identifier of a collection (dataset)
    CollectionId,
    "collection"
);
id_type!(
    /// Identifier of a version marker
    VersionId,
    "version"
);
id_type!(
    /// Identifier of a logical example; stable across all of its revisions
    ExampleId,
    "example"
);
id_type!(
    /// Identifier of one immutable revision
    RevisionId,
    "revision"
);

/// What a revision does to its example
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RevisionKind {
    /// Example becomes visible with this payload
    Create,
    /// Visible example gets a new payload
    Patch,
    /// Example stops being visible
    Delete,
}

impl RevisionKind {
    /// Wire name
    pub const fn as_str(&self) -> &'static str {
        match self {
            RevisionKind::Create => "CREATE",
            RevisionKind::Patch => "PATCH",
            RevisionKind::Delete => "DELETE",
        }
    }

    /// Whether an example whose latest revision has this kind is visible
    #[inline]
    pub const fn is_visible(&self) -> bool {
        !matches!(self, RevisionKind::Delete)
    }

    /// Check that `next` may follow `previous` for the same example
    ///
    /// `previous` is the kind of the example's latest revision, `None` if it
    /// has none yet.
    pub fn may_follow(previous: Option<RevisionKind>, next: RevisionKind) -> bool {
        let visible = previous.map(|k| k.is_visible()).unwrap_or(false);
        match next {
            RevisionKind::Create => !visible,
            RevisionKind::Patch | RevisionKind::Delete => visible,
        }
    }
}

impl fmt::Display for RevisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RevisionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(RevisionKind::Create),
            "PATCH" => Ok(RevisionKind::Patch),
            "DELETE" => Ok(RevisionKind::Delete),
            other => Err(format!("unknown revision kind '{}'", other)),
        }
    }
}

/// Example payload carried by a revision
///
/// All three parts are free-form JSON. A `DELETE` revision usually carries
/// empty objects, but whatever it carries is never visible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// Example input
    pub input: JsonValue,
    /// Expected output
    pub output: JsonValue,
    /// Free-form metadata
    pub metadata: JsonValue,
}

impl Payload {
    /// Create a payload from its parts
    pub fn new(input: JsonValue, output: JsonValue, metadata: JsonValue) -> Self {
        Self {
            input,
            output,
            metadata,
        }
    }

    /// Payload with empty objects in every part
    pub fn empty() -> Self {
        Self::new(
            JsonValue::Object(Default::default()),
            JsonValue::Object(Default::default()),
            JsonValue::Object(Default::default()),
        )
    }
}

impl Default for Payload {
    fn default() -> Self {
        Self::empty()
    }
}
