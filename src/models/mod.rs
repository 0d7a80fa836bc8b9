mod descriptor;
mod patch;
mod plant;

pub use descriptor::{PlantDescriptor, StoredImage};
pub use patch::{ImageChange, PlantPatch};
pub use plant::{is_reserved_field, NewPlant, PlantRecord, RESERVED_FIELDS};
