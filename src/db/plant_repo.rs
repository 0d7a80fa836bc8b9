use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::SqlitePool;

use crate::api::PlantApi;
use crate::error::SyncError;
use crate::models::{PlantDescriptor, StoredImage};

/// SQLite-backed plant store.
#[derive(Clone)]
pub struct PlantRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct PlantRow {
    guid: String,
    image_encoding: Option<String>,
    image_data: Option<Vec<u8>>,
    image_text: Option<String>,
    fields: String,
    created: i64,
    modified: i64,
}

/// Column values for a stored image: (encoding, bytes, text).
type ImageColumns<'a> = (Option<&'static str>, Option<&'a [u8]>, Option<&'a str>);

fn image_columns(image: Option<&StoredImage>) -> ImageColumns<'_> {
    let encoding = image.map(StoredImage::encoding_name);
    match image {
        None => (None, None, None),
        Some(StoredImage::Binary(bytes)) => (encoding, Some(bytes.as_slice()), None),
        Some(StoredImage::Base64(text)) => (encoding, None, Some(text.as_str())),
    }
}

const SELECT_PLANTS: &str =
    "SELECT guid, image_encoding, image_data, image_text, fields, created, modified FROM plants";

impl PlantRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<PlantDescriptor>, SyncError> {
        let rows: Vec<PlantRow> = sqlx::query_as(&format!("{} ORDER BY rowid", SELECT_PLANTS))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::hydrate).collect()
    }

    pub async fn get(&self, guid: &str) -> Result<Option<PlantDescriptor>, SyncError> {
        let row: Option<PlantRow> = sqlx::query_as(&format!("{} WHERE guid = ?", SELECT_PLANTS))
            .bind(guid)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::hydrate).transpose()
    }

    pub async fn insert(&self, plant: &PlantDescriptor) -> Result<(), SyncError> {
        let fields = serde_json::to_string(&plant.fields)?;
        let (encoding, data, text) = image_columns(plant.blob.as_ref());

        sqlx::query(
            r#"
            INSERT INTO plants (guid, image_encoding, image_data, image_text, fields, created, modified)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&plant.guid)
        .bind(encoding)
        .bind(data)
        .bind(text)
        .bind(&fields)
        .bind(plant.created)
        .bind(plant.modified)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Inserts or replaces the whole record, keeping its original position.
    pub async fn upsert(&self, plant: &PlantDescriptor) -> Result<(), SyncError> {
        let fields = serde_json::to_string(&plant.fields)?;
        let (encoding, data, text) = image_columns(plant.blob.as_ref());

        sqlx::query(
            r#"
            INSERT INTO plants (guid, image_encoding, image_data, image_text, fields, created, modified)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(guid) DO UPDATE SET
                image_encoding = excluded.image_encoding,
                image_data = excluded.image_data,
                image_text = excluded.image_text,
                fields = excluded.fields,
                created = excluded.created,
                modified = excluded.modified
            "#,
        )
        .bind(&plant.guid)
        .bind(encoding)
        .bind(data)
        .bind(text)
        .bind(&fields)
        .bind(plant.created)
        .bind(plant.modified)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Deletes a batch atomically. Returns how many rows were removed.
    pub async fn delete_many(&self, guids: &[String]) -> Result<u64, SyncError> {
        let mut tx = self.pool.begin().await?;
        let mut removed = 0;

        for guid in guids {
            let result = sqlx::query("DELETE FROM plants WHERE guid = ?")
                .bind(guid)
                .execute(&mut *tx)
                .await?;
            removed += result.rows_affected();
        }

        tx.commit().await?;
        Ok(removed)
    }

    fn hydrate(row: PlantRow) -> Result<PlantDescriptor, SyncError> {
        let fields: Map<String, Value> = serde_json::from_str(&row.fields)?;

        let blob = match (row.image_encoding.as_deref(), row.image_data, row.image_text) {
            (Some("binary"), Some(bytes), _) => Some(StoredImage::Binary(bytes)),
            (Some("base64"), _, Some(text)) => Some(StoredImage::Base64(text)),
            (None, _, _) => None,
            (Some(other), _, _) => {
                tracing::warn!(
                    "Plant {} has image encoding '{}' without matching data, ignoring image",
                    row.guid,
                    other
                );
                None
            }
        };

        Ok(PlantDescriptor {
            guid: row.guid,
            blob,
            created: row.created,
            modified: row.modified,
            fields,
        })
    }
}

#[async_trait]
impl PlantApi for PlantRepository {
    async fn fetch_plants(&self) -> Result<Vec<PlantDescriptor>, SyncError> {
        self.list().await
    }

    async fn add_plant(&self, plant: &PlantDescriptor) -> Result<(), SyncError> {
        self.insert(plant).await
    }

    async fn update_plant(&self, plant: &PlantDescriptor) -> Result<(), SyncError> {
        self.upsert(plant).await
    }

    async fn delete_plants(&self, guids: &[String]) -> Result<(), SyncError> {
        let removed = self.delete_many(guids).await?;
        tracing::debug!("Deleted {} of {} requested plant(s)", removed, guids.len());
        Ok(())
    }
}
