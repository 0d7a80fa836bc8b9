//! Storage encodings for plant images.
//!
//! Some stores cannot hold binary payloads reliably, so the image can be
//! persisted as base64 text instead. The strategy is chosen once, from
//! configuration; the in-memory view is always binary.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::models::{PlantDescriptor, PlantRecord, StoredImage};

/// Turns a binary image into its stored form.
pub trait StorageEncoding: Send + Sync {
    fn kind(&self) -> EncodingKind;
    fn encode(&self, blob: &[u8]) -> StoredImage;
}

/// Stores images as raw bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryStorage;

impl StorageEncoding for BinaryStorage {
    fn kind(&self) -> EncodingKind {
        EncodingKind::Binary
    }

    fn encode(&self, blob: &[u8]) -> StoredImage {
        StoredImage::Binary(blob.to_vec())
    }
}

/// Stores images as standard padded base64 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextEncodedStorage;

impl StorageEncoding for TextEncodedStorage {
    fn kind(&self) -> EncodingKind {
        EncodingKind::Text
    }

    fn encode(&self, blob: &[u8]) -> StoredImage {
        StoredImage::Base64(STANDARD.encode(blob))
    }
}

/// Configuration-level name of a storage encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingKind {
    #[default]
    Binary,
    Text,
}

impl EncodingKind {
    pub fn strategy(self) -> Box<dyn StorageEncoding> {
        match self {
            EncodingKind::Binary => Box::new(BinaryStorage),
            EncodingKind::Text => Box::new(TextEncodedStorage),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "binary" => Some(EncodingKind::Binary),
            "text" | "base64" => Some(EncodingKind::Text),
            _ => None,
        }
    }
}

impl std::fmt::Display for EncodingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodingKind::Binary => write!(f, "binary"),
            EncodingKind::Text => write!(f, "text"),
        }
    }
}

/// Builds the stored form of a record using `encoding` for its image.
pub fn to_descriptor(record: &PlantRecord, encoding: &dyn StorageEncoding) -> PlantDescriptor {
    PlantDescriptor {
        guid: record.guid.clone(),
        blob: record.blob.as_deref().map(|blob| encoding.encode(blob)),
        created: record.created,
        modified: record.modified,
        fields: record.fields.clone(),
    }
}

/// Resolves a stored descriptor into an in-memory record with a binary image.
pub fn convert_to_blob(descriptor: PlantDescriptor) -> Result<PlantRecord, SyncError> {
    let blob = match descriptor.blob {
        None => None,
        Some(StoredImage::Binary(bytes)) => Some(bytes),
        Some(StoredImage::Base64(text)) => {
            let bytes = STANDARD
                .decode(text.trim())
                .map_err(|source| SyncError::Base64 {
                    guid: descriptor.guid.clone(),
                    source,
                })?;
            Some(bytes)
        }
    };

    Ok(PlantRecord {
        guid: descriptor.guid,
        blob,
        created: descriptor.created,
        modified: descriptor.modified,
        fields: descriptor.fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewPlant;

    fn plant_with_image() -> PlantRecord {
        PlantRecord::create(
            NewPlant::new()
                .with_field("name", "Pothos")
                .with_blob(vec![0xff, 0xd8, 0x00, 0x10]),
            7,
        )
    }

    #[test]
    fn test_binary_storage_keeps_bytes() {
        let record = plant_with_image();
        let desc = to_descriptor(&record, &BinaryStorage);
        assert_eq!(desc.blob, Some(StoredImage::Binary(vec![0xff, 0xd8, 0x00, 0x10])));
        assert_eq!(desc.fields, record.fields);
    }

    #[test]
    fn test_text_storage_encodes_base64() {
        let record = plant_with_image();
        let desc = to_descriptor(&record, &TextEncodedStorage);
        assert_eq!(desc.blob, Some(StoredImage::Base64("/9gAEA==".to_string())));
    }

    #[test]
    fn test_convert_restores_binary_from_either_encoding() {
        let record = plant_with_image();
        for encoding in [EncodingKind::Binary, EncodingKind::Text] {
            let desc = to_descriptor(&record, encoding.strategy().as_ref());
            let restored = convert_to_blob(desc).unwrap();
            assert_eq!(restored, record);
        }
    }

    #[test]
    fn test_convert_without_image() {
        let record = PlantRecord::create(NewPlant::new(), 1);
        let restored = convert_to_blob(to_descriptor(&record, &TextEncodedStorage)).unwrap();
        assert_eq!(restored.blob, None);
    }

    #[test]
    fn test_convert_rejects_invalid_base64() {
        let desc = PlantDescriptor {
            guid: "broken".to_string(),
            blob: Some(StoredImage::Base64("not base64!".to_string())),
            created: 0,
            modified: 0,
            fields: Default::default(),
        };
        let err = convert_to_blob(desc).unwrap_err();
        assert!(matches!(err, SyncError::Base64 { ref guid, .. } if guid == "broken"));
    }

    #[test]
    fn test_encoding_kind_parse() {
        assert_eq!(EncodingKind::parse("binary"), Some(EncodingKind::Binary));
        assert_eq!(EncodingKind::parse("TEXT"), Some(EncodingKind::Text));
        assert_eq!(EncodingKind::parse("base64"), Some(EncodingKind::Text));
        assert_eq!(EncodingKind::parse("hex"), None);
        assert_eq!(EncodingKind::Text.strategy().kind(), EncodingKind::Text);
    }
}
