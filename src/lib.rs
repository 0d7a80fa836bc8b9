//! plantsync
//!
//! Keeps an in-memory plant collection in step with a persistent plant
//! store. Writes go to the store first and are mirrored into the local
//! `PlantStore` only once they succeed.

pub mod actions;
pub mod api;
pub mod config;
pub mod db;
pub mod encoding;
pub mod error;
pub mod models;
pub mod orientation;
pub mod server;
pub mod store;

pub use actions::{Clock, LoadOptions, PlantSyncActions, SystemClock};
pub use api::{check_server, HttpPlantApi, PlantApi};
pub use config::{Config, ConfigError, ConfigSource, ConfigValue};
pub use db::{init_db, PlantRepository};
pub use encoding::{
    convert_to_blob, BinaryStorage, EncodingKind, StorageEncoding, TextEncodedStorage,
};
pub use error::SyncError;
pub use models::{ImageChange, NewPlant, PlantDescriptor, PlantPatch, PlantRecord, StoredImage};
pub use orientation::{ExifOrientation, ImageNormalizer, Passthrough};
pub use store::{PlantEvent, PlantState, PlantStore};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
