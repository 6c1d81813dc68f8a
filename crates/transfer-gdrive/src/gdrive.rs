//! Google Drive API v3 client wrapper.
//!
//! Token is passed per-call by the caller (from the session credentials).

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use transfer_core::{
    AccessToken, FolderEntry, FolderHandle, HttpMethod, ItemHandle, ItemInfo, PlaceholderItem,
    StorageProvider, TransferError, UploadTarget,
};

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

const DEFAULT_API_URL: &str = "https://www.googleapis.com";

/// File resource as returned by Drive (only the fields we request).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    mime_type: Option<String>,
}

/// `files.list` response. Always read from `files`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    #[allow(dead_code)]
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewFolder<'a> {
    name: &'a str,
    mime_type: &'static str,
    /// Serialized as `null` for the drive root.
    parents: Option<Vec<&'a str>>,
}

#[derive(Serialize)]
struct NewFile<'a> {
    name: &'a str,
    parents: Option<Vec<&'a str>>,
}

/// Google Drive API client (stateless, token provided per call).
pub struct GDriveClient {
    http: Client,
    api_url: String,
    upload_url: String,
}

impl Default for GDriveClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GDriveClient {
    pub fn new() -> Self {
        Self::with_base_urls(DEFAULT_API_URL, DEFAULT_API_URL)
    }

    /// Point the client at other hosts (the upload host may differ from the metadata host).
    pub fn with_base_urls(api_url: &str, upload_url: &str) -> Self {
        Self {
            http: Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            upload_url: upload_url.trim_end_matches('/').to_string(),
        }
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.api_url)
    }

    /// Look up non-trashed folders named `name` directly under `parent_id`.
    #[instrument(skip(self, token), level = "debug")]
    async fn find_folders(
        &self,
        token: &str,
        parent_id: &str,
        name: &str,
    ) -> anyhow::Result<Vec<DriveFile>> {
        let q = format!(
            "'{}' in parents and name = '{}' and mimeType = '{}' and trashed = false",
            escape_query_value(parent_id),
            escape_query_value(name),
            FOLDER_MIME_TYPE
        );

        let resp = self
            .http
            .get(self.files_url())
            .bearer_auth(token)
            .query(&[
                ("q", q.as_str()),
                ("fields", "nextPageToken, files(id,name)"),
            ])
            .send()
            .await?;

        let list: FileList = check(resp, "Google Drive list error").await?.json().await?;
        debug!(
            "Found {} folders named {:?} under {}",
            list.files.len(),
            name,
            parent_id
        );
        Ok(list.files)
    }

    #[instrument(skip(self, token), level = "debug")]
    async fn insert_folder(
        &self,
        token: &str,
        parent_id: Option<&str>,
        name: &str,
    ) -> anyhow::Result<DriveFile> {
        let body = NewFolder {
            name,
            mime_type: FOLDER_MIME_TYPE,
            parents: parent_id.map(|p| vec![p]),
        };

        let resp = self
            .http
            .post(self.files_url())
            .bearer_auth(token)
            .query(&[("fields", "id")])
            .json(&body)
            .send()
            .await?;

        let file: DriveFile = check(resp, "Google Drive create folder error")
            .await?
            .json()
            .await?;
        debug!("Created folder {:?} -> {}", name, file.id);
        Ok(file)
    }

    /// Create an empty file entry that content can later be uploaded into.
    #[instrument(skip(self, token), level = "debug")]
    async fn insert_file(
        &self,
        token: &str,
        parent_id: Option<&str>,
        name: &str,
    ) -> anyhow::Result<DriveFile> {
        let body = NewFile {
            name,
            parents: parent_id.map(|p| vec![p]),
        };

        let resp = self
            .http
            .post(self.files_url())
            .bearer_auth(token)
            .query(&[("fields", "id,name,mimeType")])
            .json(&body)
            .send()
            .await?;

        let file: DriveFile = check(resp, "Google Drive create file error")
            .await?
            .json()
            .await?;
        debug!("Created file {:?} -> {}", name, file.id);
        Ok(file)
    }

    #[instrument(skip(self, token), level = "debug")]
    async fn get_file(&self, token: &str, file_id: &str) -> anyhow::Result<Option<DriveFile>> {
        let url = format!("{}/{}", self.files_url(), file_id);

        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&[("fields", "id,name,mimeType")])
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let file: DriveFile = check(resp, "Google Drive API error").await?.json().await?;
        debug!("Got metadata for file {}: {:?}", file_id, file);
        Ok(Some(file))
    }
}

async fn check(resp: Response, context: &str) -> anyhow::Result<Response> {
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("{} {}: {}", context, status, body);
    }
    Ok(resp)
}

/// Escape a literal for use inside single quotes in a Drive `q` expression.
pub fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn parent_id(folder: &FolderHandle) -> Option<&str> {
    folder.id()
}

#[async_trait]
impl StorageProvider for GDriveClient {
    async fn list_folders(
        &self,
        token: &AccessToken,
        parent: &FolderHandle,
        name: &str,
    ) -> Result<Vec<FolderEntry>, TransferError> {
        let parent_id = parent_id(parent).unwrap_or("root");
        let files = self
            .find_folders(&token.access_token, parent_id, name)
            .await
            .map_err(|e| TransferError::provider("Google Drive folder lookup", e))?;

        Ok(files
            .into_iter()
            .map(|f| FolderEntry {
                id: f.id,
                name: f.name,
            })
            .collect())
    }

    async fn create_folder(
        &self,
        token: &AccessToken,
        parent: &FolderHandle,
        name: &str,
    ) -> Result<FolderHandle, TransferError> {
        let file = self
            .insert_folder(&token.access_token, parent_id(parent), name)
            .await
            .map_err(|e| TransferError::provider("Google Drive folder creation", e))?;
        Ok(FolderHandle::Id(file.id))
    }

    async fn get_item(
        &self,
        token: &AccessToken,
        item: &ItemHandle,
    ) -> Result<ItemInfo, TransferError> {
        let file = self
            .get_file(&token.access_token, item.as_str())
            .await
            .map_err(|e| TransferError::provider("Google Drive metadata", e))?
            .ok_or_else(|| {
                TransferError::NotFound(format!("Google Drive file {}", item.as_str()))
            })?;

        Ok(ItemInfo {
            id: file.id,
            name: file.name,
            mime_type: file.mime_type,
        })
    }

    async fn create_placeholder_item(
        &self,
        token: &AccessToken,
        folder: &FolderHandle,
        name: &str,
    ) -> Result<PlaceholderItem, TransferError> {
        let file = self
            .insert_file(&token.access_token, parent_id(folder), name)
            .await
            .map_err(|e| TransferError::provider("Google Drive placeholder creation", e))?;

        Ok(PlaceholderItem {
            id: file.id,
            mime_type: file.mime_type,
        })
    }

    fn content_url(&self, item: &ItemHandle) -> String {
        format!("{}/{}?alt=media", self.files_url(), item.as_str())
    }

    fn upload_target(&self, item: &PlaceholderItem) -> UploadTarget {
        UploadTarget {
            url: format!(
                "{}/upload/drive/v3/files/{}?uploadType=media",
                self.upload_url, item.id
            ),
            method: HttpMethod::Patch,
            content_type: item.mime_type.clone(),
        }
    }
}
