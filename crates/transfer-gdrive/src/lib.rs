//! Google Drive adapter for storage-transfer (the external store).

mod gdrive;

pub use gdrive::{escape_query_value, GDriveClient, FOLDER_MIME_TYPE};
