//! Plant persistence boundary.
//!
//! The sync actions talk to a `PlantApi` and never to a concrete store. Two
//! implementations ship with the crate: `HttpPlantApi` for a remote plant
//! server and `PlantRepository` (see `db`) for a local SQLite file.

mod http;

pub use http::{check_server, DeleteRequest, HttpPlantApi};

use async_trait::async_trait;

use crate::error::SyncError;
use crate::models::PlantDescriptor;

/// Request/response access to the persistent plant collection.
#[async_trait]
pub trait PlantApi: Send + Sync {
    /// Returns every stored plant, in store order.
    async fn fetch_plants(&self) -> Result<Vec<PlantDescriptor>, SyncError>;

    async fn add_plant(&self, plant: &PlantDescriptor) -> Result<(), SyncError>;

    /// Writes the full record, replacing any stored version.
    async fn update_plant(&self, plant: &PlantDescriptor) -> Result<(), SyncError>;

    /// Removes a batch. Unknown guids are ignored.
    async fn delete_plants(&self, guids: &[String]) -> Result<(), SyncError>;
}
