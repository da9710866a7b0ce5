//! Typed identifiers for schema and protocol entities.
//!
//! All ids are plain integers in persistent storage; the newtypes exist so
//! that a field id cannot be handed to an API expecting a protocol id.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn value(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

id_type!(
    /// Identifies one field within a study type's structure.
    FieldId
);
id_type!(
    /// Identifies a group of fields within a tab.
    GroupId
);
id_type!(
    /// Identifies a tab within a study type's structure.
    TabId
);
id_type!(
    /// Identifies a study type (a named kind of examination).
    StudyTypeId
);
id_type!(
    /// Identifies one saved protocol record.
    ProtocolId
);
id_type!(
    /// Identifies a patient.
    PatientId
);
