//! In-memory doubles for the collaborator traits.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::credentials::{AccessToken, TransferCredentials};
use crate::descriptor::HttpMethod;
use crate::dispatch::{JobRunner, TransferJob};
use crate::error::TransferError;
use crate::provider::{
    CallbackContext, FolderEntry, FolderHandle, FolderRef, InternalStore, ItemHandle, ItemInfo,
    PlaceholderItem, StoragePreparation, StorageProvider, UploadTarget, VersionInfo,
};

pub fn credentials() -> TransferCredentials {
    TransferCredentials {
        internal: AccessToken::new("forge-token"),
        external: AccessToken::new("drive-token"),
    }
}

pub fn version(name: &str) -> VersionInfo {
    VersionInfo {
        project_id: "p1".to_string(),
        version_id: "v1".to_string(),
        display_name: name.to_string(),
        storage_url: "https://storage.test/oss/drawing".to_string(),
    }
}

#[derive(Default)]
struct ProviderState {
    /// (parent, id, name)
    folders: Vec<(String, String, String)>,
    created: Vec<(FolderHandle, String)>,
    placeholders: Vec<(String, String)>,
}

#[derive(Default)]
pub struct FakeProvider {
    state: Mutex<ProviderState>,
    calls: AtomicUsize,
    fail_listing: AtomicBool,
    fail_placeholder: AtomicBool,
    empty_placeholder_id: AtomicBool,
}

impl FakeProvider {
    pub fn seed_folder(&self, parent: &str, id: &str, name: &str) {
        self.state.lock().unwrap().folders.push((
            parent.to_string(),
            id.to_string(),
            name.to_string(),
        ));
    }

    pub fn fail_listing(&self) {
        self.fail_listing.store(true, Ordering::SeqCst);
    }

    pub fn fail_placeholder(&self) {
        self.fail_placeholder.store(true, Ordering::SeqCst);
    }

    pub fn empty_placeholder_id(&self) {
        self.empty_placeholder_id.store(true, Ordering::SeqCst);
    }

    pub fn network_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn created_folders(&self) -> Vec<(FolderHandle, String)> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn placeholders(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().placeholders.clone()
    }
}

#[async_trait]
impl StorageProvider for FakeProvider {
    async fn list_folders(
        &self,
        _token: &AccessToken,
        parent: &FolderHandle,
        name: &str,
    ) -> Result<Vec<FolderEntry>, TransferError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(TransferError::Provider("listing failed".to_string()));
        }
        let parent = parent.to_string();
        Ok(self
            .state
            .lock()
            .unwrap()
            .folders
            .iter()
            .filter(|(p, _, n)| *p == parent && n == name)
            .map(|(_, id, n)| FolderEntry {
                id: id.clone(),
                name: n.clone(),
            })
            .collect())
    }

    async fn create_folder(
        &self,
        _token: &AccessToken,
        parent: &FolderHandle,
        name: &str,
    ) -> Result<FolderHandle, TransferError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        let id = format!("folder-{}", state.created.len() + 1);
        state
            .folders
            .push((parent.to_string(), id.clone(), name.to_string()));
        state.created.push((parent.clone(), name.to_string()));
        Ok(FolderHandle::Id(id))
    }

    async fn get_item(
        &self,
        _token: &AccessToken,
        item: &ItemHandle,
    ) -> Result<ItemInfo, TransferError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ItemInfo {
            id: item.0.clone(),
            name: format!("{}.pdf", item.0),
            mime_type: Some("application/pdf".to_string()),
        })
    }

    async fn create_placeholder_item(
        &self,
        _token: &AccessToken,
        folder: &FolderHandle,
        name: &str,
    ) -> Result<PlaceholderItem, TransferError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_placeholder.load(Ordering::SeqCst) {
            return Err(TransferError::Provider("create failed".to_string()));
        }
        let mut state = self.state.lock().unwrap();
        state
            .placeholders
            .push((folder.to_string(), name.to_string()));
        let id = if self.empty_placeholder_id.load(Ordering::SeqCst) {
            String::new()
        } else {
            format!("placeholder-{}", state.placeholders.len())
        };
        Ok(PlaceholderItem {
            id,
            mime_type: Some("application/octet-stream".to_string()),
        })
    }

    fn content_url(&self, item: &ItemHandle) -> String {
        format!("https://content.test/{}", item.0)
    }

    fn upload_target(&self, item: &PlaceholderItem) -> UploadTarget {
        UploadTarget {
            url: format!("https://upload.test/{}", item.id),
            method: HttpMethod::Patch,
            content_type: item.mime_type.clone(),
        }
    }
}

#[derive(Default)]
pub struct FakeInternalStore {
    calls: AtomicUsize,
    skip: AtomicBool,
    prepared: Mutex<Vec<(String, String)>>,
}

impl FakeInternalStore {
    pub fn skip_existing(&self) {
        self.skip.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prepared(&self) -> Vec<(String, String)> {
        self.prepared.lock().unwrap().clone()
    }
}

#[async_trait]
impl InternalStore for FakeInternalStore {
    async fn resolve_version(
        &self,
        _token: &AccessToken,
        item_ref: &str,
    ) -> Result<VersionInfo, TransferError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !item_ref.contains("version") {
            return Err(TransferError::NotAVersion(item_ref.to_string()));
        }
        Ok(version("Drawing.dwg"))
    }

    async fn resolve_folder(
        &self,
        _token: &AccessToken,
        folder_ref: &str,
    ) -> Result<FolderRef, TransferError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !folder_ref.contains("folder") {
            return Err(TransferError::NotAFolder(folder_ref.to_string()));
        }
        Ok(FolderRef {
            project_id: "p1".to_string(),
            folder_id: "folder-1".to_string(),
        })
    }

    async fn prepare_storage(
        &self,
        _token: &AccessToken,
        folder: &FolderRef,
        desired_name: &str,
    ) -> Result<StoragePreparation, TransferError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prepared
            .lock()
            .unwrap()
            .push((folder.folder_id.clone(), desired_name.to_string()));
        if self.skip.load(Ordering::SeqCst) {
            return Ok(StoragePreparation::Skip);
        }
        Ok(StoragePreparation::Proceed {
            write_url: format!("https://oss.test/objects/{}", desired_name),
            callback: CallbackContext(serde_json::json!({
                "folderId": folder.folder_id,
                "fileName": desired_name,
            })),
        })
    }

    async fn register_upload(
        &self,
        _token: &AccessToken,
        _callback: &CallbackContext,
    ) -> Result<(), TransferError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingRunner {
    reject: Option<String>,
    calls: AtomicUsize,
    jobs: Mutex<Vec<TransferJob>>,
}

impl RecordingRunner {
    pub fn rejecting(reason: &str) -> Self {
        Self {
            reject: Some(reason.to_string()),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn jobs(&self) -> Vec<TransferJob> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobRunner for RecordingRunner {
    async fn submit(&self, job: TransferJob) -> Result<(), TransferError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.reject {
            return Err(TransferError::Dispatch(reason.clone()));
        }
        self.jobs.lock().unwrap().push(job);
        Ok(())
    }
}
