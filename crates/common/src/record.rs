use std::fmt;

use serde::{Deserialize, Serialize};

/// Doc pointer every record is indexed under
pub const MAIN_RECORD: &str = "main_record";

/// Lower-case and trim a keyword
pub fn normalize_keyword(keyword: &str) -> String {
    keyword.trim().to_lowercase()
}

/// Identifier of one data subject (patient)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Pointer to a document inside an entity's record set
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocPointer(String);

impl DocPointer {
    pub fn new(pointer: impl Into<String>) -> Self {
        Self(pointer.into())
    }

    pub fn main_record() -> Self {
        Self(MAIN_RECORD.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocPointer {
    fn from(pointer: &str) -> Self {
        Self(pointer.to_string())
    }
}

impl PartialEq<&str> for DocPointer {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// A plaintext record as delivered by a record source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(alias = "patient_id")]
    pub entity_id: EntityId,
    pub content: String,
    pub keywords: Vec<String>,
}
