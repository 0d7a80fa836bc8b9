use serde_json::{Map, Value};

use super::plant::{is_reserved_field, PlantRecord};

/// What an update does to the record's image.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ImageChange {
    #[default]
    Keep,
    Set(Vec<u8>),
    Clear,
}

/// A typed partial update of a plant.
///
/// Merge precedence is new over old: every field present in the patch
/// replaces the stored value, everything else is carried over untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct PlantPatch {
    pub guid: String,
    pub image: ImageChange,
    pub fields: Map<String, Value>,
}

impl PlantPatch {
    pub fn new(guid: impl Into<String>) -> Self {
        Self {
            guid: guid.into(),
            image: ImageChange::Keep,
            fields: Map::new(),
        }
    }

    /// Overrides a user field. Reserved keys are ignored.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if !is_reserved_field(&key) {
            self.fields.insert(key, value.into());
        }
        self
    }

    pub fn with_blob(mut self, blob: Vec<u8>) -> Self {
        self.image = ImageChange::Set(blob);
        self
    }

    pub fn clear_blob(mut self) -> Self {
        self.image = ImageChange::Clear;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.image == ImageChange::Keep
    }

    /// Merges this patch over `existing`, stamping `modified` with `now`.
    ///
    /// Without an existing record the result is the patch alone, with
    /// `created` equal to `modified`.
    pub fn apply_to(self, existing: Option<&PlantRecord>, now: i64) -> PlantRecord {
        let (mut fields, blob, created) = match existing {
            Some(record) => (record.fields.clone(), record.blob.clone(), record.created),
            None => (Map::new(), None, now),
        };

        fields.extend(self.fields);

        let blob = match self.image {
            ImageChange::Keep => blob,
            ImageChange::Set(bytes) => Some(bytes),
            ImageChange::Clear => None,
        };

        PlantRecord {
            guid: self.guid,
            blob,
            created,
            modified: now,
            fields,
        }
    }
}
