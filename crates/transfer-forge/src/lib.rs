//! Autodesk Data Management adapter for storage-transfer (the internal store).
//!
//! - `href`: parsing of `.../projects/{project}/{kind}/{id}` references
//! - `jsonapi`: request bodies and response shapes
//! - `forge`: the `InternalStore` implementation

mod forge;
mod href;
mod jsonapi;

pub use forge::{ForgeClient, ImportPolicy, StorageCallback};
pub use href::{parse_data_ref, parse_object_id, DataRef, ObjectId, ResourceKind};
