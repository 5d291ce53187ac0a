use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::FavoriteRecord;

/// A named, locally persisted snapshot of favorites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    #[serde(default)]
    pub records: Vec<FavoriteRecord>,
    /// When the records were last replaced by a snapshot.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: Vec::new(),
            updated_at: None,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Replace the whole content with a fresh snapshot.
    pub fn replace_records(&mut self, records: Vec<FavoriteRecord>) {
        self.records = records;
        self.updated_at = Some(Utc::now());
    }

    pub fn summary(&self) -> GroupSummary {
        GroupSummary {
            name: self.name.clone(),
            size: self.records.len(),
            updated_at: self.updated_at,
        }
    }
}

/// Listing entry for a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSummary {
    pub name: String,
    pub size: usize,
    pub updated_at: Option<DateTime<Utc>>,
}
