//! Plant sync actions.
//!
//! Every action is remote-first: the persistent store is written before the
//! local `PlantStore` is notified, so a failed remote call never leaves a
//! record in memory that the store does not have. Failures propagate
//! unchanged; nothing is retried.

use std::sync::Arc;

use crate::api::PlantApi;
use crate::config::Config;
use crate::encoding::{convert_to_blob, to_descriptor, BinaryStorage, StorageEncoding};
use crate::error::SyncError;
use crate::models::{ImageChange, NewPlant, PlantPatch, PlantRecord};
use crate::orientation::{ExifOrientation, ImageNormalizer, Passthrough};
use crate::store::{PlantEvent, PlantStore};

/// Source of record timestamps, in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Refetch even if the collection is already populated
    pub force: bool,
}

impl LoadOptions {
    pub fn force() -> Self {
        Self { force: true }
    }
}

pub struct PlantSyncActions {
    api: Arc<dyn PlantApi>,
    store: Arc<PlantStore>,
    encoding: Box<dyn StorageEncoding>,
    normalizer: Box<dyn ImageNormalizer>,
    clock: Box<dyn Clock>,
}

impl PlantSyncActions {
    /// Creates actions with binary storage, EXIF normalization and the
    /// system clock.
    pub fn new(api: Arc<dyn PlantApi>, store: Arc<PlantStore>) -> Self {
        Self {
            api,
            store,
            encoding: Box::new(BinaryStorage),
            normalizer: Box::new(ExifOrientation),
            clock: Box::new(SystemClock),
        }
    }

    pub fn from_config(api: Arc<dyn PlantApi>, store: Arc<PlantStore>, config: &Config) -> Self {
        let actions = Self::new(api, store).with_encoding(config.storage_encoding.value.strategy());
        if config.normalize_images.value {
            actions
        } else {
            actions.with_normalizer(Box::new(Passthrough))
        }
    }

    pub fn with_encoding(mut self, encoding: Box<dyn StorageEncoding>) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_normalizer(mut self, normalizer: Box<dyn ImageNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<PlantStore> {
        &self.store
    }

    /// Fetches the whole collection when it is empty or `options.force` is
    /// set, replacing it with a single `LoadPlants` event.
    ///
    /// Returns whether a fetch happened.
    pub async fn load_plants(&self, options: LoadOptions) -> Result<bool, SyncError> {
        if !options.force && !self.store.is_empty().await {
            tracing::debug!("Plants already loaded, skipping fetch");
            return Ok(false);
        }

        let descriptors = self.api.fetch_plants().await?;
        let plants = descriptors
            .into_iter()
            .map(convert_to_blob)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!("Loaded {} plant(s)", plants.len());
        self.store.commit(PlantEvent::LoadPlants { plants }).await;
        Ok(true)
    }

    /// Looks a plant up in the loaded collection and publishes it as the
    /// current item. Never touches the remote store.
    pub async fn load_plant_item(&self, guid: &str) -> Option<PlantRecord> {
        let item = self.store.find(guid).await;
        self.store
            .commit(PlantEvent::LoadPlantItem { item: item.clone() })
            .await;
        item
    }

    /// Creates a plant and returns its guid.
    ///
    /// The image is normalized before the record is built, so both the
    /// store and the local view hold the corrected image.
    pub async fn add_plant(&self, input: NewPlant) -> Result<String, SyncError> {
        let NewPlant { blob, fields } = input;
        let blob = match blob {
            Some(blob) => Some(self.normalizer.normalize(blob).await?),
            None => None,
        };

        let item = PlantRecord::create(NewPlant { blob, fields }, self.clock.now_millis());
        let descriptor = to_descriptor(&item, self.encoding.as_ref());
        self.api.add_plant(&descriptor).await?;

        tracing::debug!(
            guid = %item.guid,
            encoding = %self.encoding.kind(),
            "Added plant"
        );
        let guid = item.guid.clone();
        self.store.commit(PlantEvent::AddPlant { item }).await;
        Ok(guid)
    }

    /// Removes a batch of plants. A remote failure aborts the whole batch.
    pub async fn delete_plants(&self, guids: &[String]) -> Result<(), SyncError> {
        self.api.delete_plants(guids).await?;
        self.store
            .commit(PlantEvent::DeletePlants {
                guids: guids.to_vec(),
            })
            .await;
        Ok(())
    }

    /// Merges `patch` over the loaded record, persists the result and
    /// publishes it. Returns the merged record.
    pub async fn update_plant(&self, patch: PlantPatch) -> Result<PlantRecord, SyncError> {
        let existing = self.store.find(&patch.guid).await;
        if existing.is_none() {
            tracing::warn!("Updating plant {} that is not loaded", patch.guid);
        }

        let patch = match patch.image {
            ImageChange::Set(blob) => PlantPatch {
                image: ImageChange::Set(self.normalizer.normalize(blob).await?),
                ..patch
            },
            _ => patch,
        };

        let config = patch.apply_to(existing.as_ref(), self.clock.now_millis());
        let descriptor = to_descriptor(&config, self.encoding.as_ref());
        self.api.update_plant(&descriptor).await?;

        self.store
            .commit(PlantEvent::UpdatePlant {
                config: config.clone(),
            })
            .await;
        Ok(config)
    }
}
