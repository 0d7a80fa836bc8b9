use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An image as held by a persistent store.
///
/// Both variants travel as JSON strings; binary bytes are base64 on the
/// wire and only the store decides whether to keep them as text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "encoding", content = "data", rename_all = "lowercase")]
pub enum StoredImage {
    Binary(#[serde(with = "wire_bytes")] Vec<u8>),
    Base64(String),
}

mod wire_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

impl StoredImage {
    pub fn encoding_name(&self) -> &'static str {
        match self {
            StoredImage::Binary(_) => "binary",
            StoredImage::Base64(_) => "base64",
        }
    }
}

/// A plant as exchanged with the persistent store. The image is kept in
/// whatever encoding the store was written with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlantDescriptor {
    pub guid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob: Option<StoredImage>,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub modified: i64,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}
