use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Keys owned by the record itself; user fields may not shadow them.
pub const RESERVED_FIELDS: [&str; 4] = ["guid", "blob", "created", "modified"];

pub fn is_reserved_field(key: &str) -> bool {
    RESERVED_FIELDS.contains(&key)
}

/// A plant as held in memory. The image is always binary here, whatever
/// encoding the persistent store uses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlantRecord {
    pub guid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob: Option<Vec<u8>>,
    pub created: i64,  // ms since epoch
    pub modified: i64, // ms since epoch
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl PlantRecord {
    /// Creates a record with a fresh guid, stamped at `now`.
    pub fn create(input: NewPlant, now: i64) -> Self {
        Self {
            guid: Uuid::new_v4().to_string(),
            blob: input.blob,
            created: now,
            modified: now,
            fields: input.fields,
        }
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Display name, taken from the `name` field when it is a string.
    pub fn name(&self) -> Option<&str> {
        self.field("name").and_then(Value::as_str)
    }
}

impl fmt::Display for PlantRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = self.name().unwrap_or("(unnamed plant)");
        writeln!(f, "{}", title)?;
        writeln!(f, "{}", "=".repeat(title.chars().count()))?;
        writeln!(f, "GUID: {}", self.guid)?;
        writeln!(f, "Created: {}", format_millis(self.created))?;
        writeln!(f, "Modified: {}", format_millis(self.modified))?;

        match &self.blob {
            Some(blob) => writeln!(f, "Image: {} bytes", blob.len())?,
            None => writeln!(f, "Image: none")?,
        }

        let extra: Vec<_> = self.fields.iter().filter(|(k, _)| *k != "name").collect();
        if !extra.is_empty() {
            writeln!(f, "\nFields:")?;
            for (key, value) in extra {
                match value {
                    Value::String(s) => writeln!(f, "  {}: {}", key, s)?,
                    other => writeln!(f, "  {}: {}", key, other)?,
                }
            }
        }

        Ok(())
    }
}

fn format_millis(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| millis.to_string())
}

/// Input for creating a plant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewPlant {
    pub blob: Option<Vec<u8>>,
    pub fields: Map<String, Value>,
}

impl NewPlant {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a user field. Reserved keys are ignored.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if !is_reserved_field(&key) {
            self.fields.insert(key, value.into());
        }
        self
    }

    pub fn with_blob(mut self, blob: Vec<u8>) -> Self {
        self.blob = Some(blob);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_stamps_both_timestamps() {
        let plant = PlantRecord::create(NewPlant::new().with_field("name", "Fern"), 1_000);
        assert_eq!(plant.created, 1_000);
        assert_eq!(plant.modified, 1_000);
        assert_eq!(plant.name(), Some("Fern"));
        assert!(Uuid::parse_str(&plant.guid).is_ok());
    }

    #[test]
    fn test_create_assigns_unique_guids() {
        let a = PlantRecord::create(NewPlant::new(), 0);
        let b = PlantRecord::create(NewPlant::new(), 0);
        assert_ne!(a.guid, b.guid);
    }

    #[test]
    fn test_reserved_fields_are_ignored() {
        let input = NewPlant::new()
            .with_field("guid", "spoofed")
            .with_field("created", 5)
            .with_field("species", "Monstera");
        assert_eq!(input.fields.len(), 1);
        assert_eq!(input.fields.get("species"), Some(&json!("Monstera")));
    }

    #[test]
    fn test_fields_flatten_into_json() {
        let plant = PlantRecord::create(
            NewPlant::new().with_field("name", "Cactus").with_field("water_days", 14),
            42,
        );
        let value = serde_json::to_value(&plant).unwrap();
        assert_eq!(value["name"], json!("Cactus"));
        assert_eq!(value["water_days"], json!(14));
        assert_eq!(value["created"], json!(42));
        assert!(value.get("blob").is_none());
    }

    #[test]
    fn test_display() {
        let plant = PlantRecord::create(
            NewPlant::new()
                .with_field("name", "Basil")
                .with_field("location", "kitchen")
                .with_blob(vec![1, 2, 3]),
            0,
        );
        let output = format!("{}", plant);
        assert!(output.contains("Basil"));
        assert!(output.contains("Image: 3 bytes"));
        assert!(output.contains("location: kitchen"));
    }
}
