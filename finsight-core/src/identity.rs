//! Type-safe identifiers for finsight entities.
//!
//! Every workspace-scoped lookup in this system is keyed by a `SessionId`
//! and an `UploadId`. Mixing the two up is the one mistake workspace
//! isolation cannot tolerate, so both are newtypes over `Uuid` rather than
//! raw strings: a `SessionId` cannot be passed where an `UploadId` is
//! expected, and vice versa.

use crate::error::EntityIdParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A UUID newtype that cannot be confused with any other entity's id.
/// `SessionId` is long-lived (one per authenticated session); `UploadId`
/// is the isolation key scoping every document and query to one upload.
pub trait EntityIdType:
    Copy
    + Clone
    + Eq
    + PartialEq
    + std::hash::Hash
    + fmt::Debug
    + fmt::Display
    + FromStr
    + Serialize
    + serde::de::DeserializeOwned
    + Send
    + Sync
    + 'static
{
    const ENTITY_NAME: &'static str;

    fn new(uuid: Uuid) -> Self;
    fn as_uuid(&self) -> Uuid;

    /// A new random id, used for session identifiers.
    fn new_v4() -> Self {
        Self::new(Uuid::new_v4())
    }

    /// A new timestamp-sortable id, used for upload identifiers so a
    /// session's uploads list in ingestion order without an extra column.
    fn now_v7() -> Self {
        Self::new(Uuid::now_v7())
    }

    /// The nil id. Used as an `AgentContext` placeholder in single-agent
    /// tests that never touch the store, and nowhere in request handling.
    fn nil() -> Self {
        Self::new(Uuid::nil())
    }
}

macro_rules! define_entity_id {
    ($name:ident, $entity:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(Uuid);

        impl EntityIdType for $name {
            const ENTITY_NAME: &'static str = $entity;

            fn new(uuid: Uuid) -> Self {
                Self(uuid)
            }

            fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = EntityIdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::from_str(s).map(Self).map_err(|e| EntityIdParseError {
                    entity_name: Self::ENTITY_NAME,
                    input: s.to_string(),
                    source: e.into(),
                })
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                self.0.serialize(serializer)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                Uuid::deserialize(deserializer).map(Self)
            }
        }
    };
}

define_entity_id!(SessionId, "session", "Type-safe id for an authenticated session.");
define_entity_id!(UploadId, "upload", "Type-safe id for one ingested upload (the isolation key).");

/// UTC timestamp used throughout the core.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
