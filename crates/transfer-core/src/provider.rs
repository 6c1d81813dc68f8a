use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::credentials::AccessToken;
use crate::descriptor::HttpMethod;
use crate::error::TransferError;

/// Wire form of the provider root folder.
pub const ROOT_SENTINEL: &str = "#";

/// Folder identifier on the external store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FolderHandle {
    Root,
    Id(String),
}

impl FolderHandle {
    /// Parse the wire form: `"#"` is the root, `""` is rejected.
    pub fn parse(raw: &str) -> Result<Self, TransferError> {
        match raw {
            "" => Err(TransferError::InvalidArgument(
                "parent folder must not be empty".to_string(),
            )),
            ROOT_SENTINEL => Ok(Self::Root),
            id => Ok(Self::Id(id.to_string())),
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Root => None,
            Self::Id(id) => Some(id),
        }
    }
}

impl std::fmt::Display for FolderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Root => f.write_str(ROOT_SENTINEL),
            Self::Id(id) => f.write_str(id),
        }
    }
}

/// Item identifier on the external store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemHandle(pub String);

impl ItemHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A folder found by a name lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderEntry {
    pub id: String,
    pub name: String,
}

/// Metadata of an external item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemInfo {
    pub id: String,
    pub name: String,
    pub mime_type: Option<String>,
}

/// Empty item created so that bytes have somewhere to land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderItem {
    pub id: String,
    pub mime_type: Option<String>,
}

/// Where and how to write an item's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub url: String,
    pub method: HttpMethod,
    pub content_type: Option<String>,
}

/// External store adapter. Stateless: the token is passed on every call.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Non-trashed folders directly under `parent` whose name is exactly `name`.
    async fn list_folders(
        &self,
        token: &AccessToken,
        parent: &FolderHandle,
        name: &str,
    ) -> Result<Vec<FolderEntry>, TransferError>;

    /// Create a folder under `parent` and return its handle.
    async fn create_folder(
        &self,
        token: &AccessToken,
        parent: &FolderHandle,
        name: &str,
    ) -> Result<FolderHandle, TransferError>;

    async fn get_item(
        &self,
        token: &AccessToken,
        item: &ItemHandle,
    ) -> Result<ItemInfo, TransferError>;

    /// Create an empty item named `name` under `folder`.
    async fn create_placeholder_item(
        &self,
        token: &AccessToken,
        folder: &FolderHandle,
        name: &str,
    ) -> Result<PlaceholderItem, TransferError>;

    /// URL returning the raw content of `item`.
    fn content_url(&self, item: &ItemHandle) -> String;

    fn upload_target(&self, item: &PlaceholderItem) -> UploadTarget;
}

/// A version record on the internal store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub project_id: String,
    pub version_id: String,
    pub display_name: String,
    /// Durable content URL of the version's storage object.
    pub storage_url: String,
}

/// A validated folder on the internal store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderRef {
    pub project_id: String,
    pub folder_id: String,
}

/// Opaque data the internal store hands to the runner, and gets back once the
/// bytes have landed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallbackContext(pub serde_json::Value);

/// Outcome of preparing internal storage for an import.
#[derive(Debug, Clone, PartialEq)]
pub enum StoragePreparation {
    /// Nothing to do; the caller reports a conflict and does not dispatch.
    Skip,
    Proceed {
        write_url: String,
        callback: CallbackContext,
    },
}

/// Internal store adapter.
#[async_trait]
pub trait InternalStore: Send + Sync {
    /// Resolve an item or version reference to a version record.
    async fn resolve_version(
        &self,
        token: &AccessToken,
        item_ref: &str,
    ) -> Result<VersionInfo, TransferError>;

    /// Validate that `folder_ref` is a folder; `NotAFolder` otherwise.
    async fn resolve_folder(
        &self,
        token: &AccessToken,
        folder_ref: &str,
    ) -> Result<FolderRef, TransferError>;

    async fn prepare_storage(
        &self,
        token: &AccessToken,
        folder: &FolderRef,
        desired_name: &str,
    ) -> Result<StoragePreparation, TransferError>;

    /// Register uploaded bytes as a new item or version.
    async fn register_upload(
        &self,
        token: &AccessToken,
        callback: &CallbackContext,
    ) -> Result<(), TransferError>;
}
