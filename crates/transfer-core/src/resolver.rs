//! Lookup-then-create of destination folders on the external store.
//!
//! Two concurrent calls for the same (parent, name) can both miss the lookup
//! and create two folders. The providers offer no conditional create, so this
//! race is accepted.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::credentials::AccessToken;
use crate::error::TransferError;
use crate::provider::{FolderHandle, StorageProvider};

pub struct FolderResolver {
    provider: Arc<dyn StorageProvider>,
}

impl FolderResolver {
    pub fn new(provider: Arc<dyn StorageProvider>) -> Self {
        Self { provider }
    }

    /// Return the folder named `name` under `parent`, creating it unless
    /// exactly one already exists.
    ///
    /// `parent` uses the wire form (`"#"` for the root) and `name` may carry
    /// HTML entities, which are decoded before use.
    #[instrument(skip(self, token), level = "debug")]
    pub async fn resolve_or_create_folder(
        &self,
        token: &AccessToken,
        parent: &str,
        name: &str,
    ) -> Result<FolderHandle, TransferError> {
        let parent = FolderHandle::parse(parent)?;
        let name = html_escape::decode_html_entities(name);
        if name.is_empty() {
            return Err(TransferError::InvalidArgument(
                "folder name must not be empty".to_string(),
            ));
        }

        let matches = self
            .provider
            .list_folders(token, &parent, &name)
            .await
            .inspect_err(|e| warn!("Folder lookup under {} failed: {}", parent, e))?;

        if let [only] = matches.as_slice() {
            debug!("Folder {:?} already exists under {}: {}", name, parent, only.id);
            return Ok(FolderHandle::Id(only.id.clone()));
        }

        if matches.len() > 1 {
            warn!(
                "{} folders named {:?} under {}, creating a new one",
                matches.len(),
                name,
                parent
            );
        }

        let created = self
            .provider
            .create_folder(token, &parent, &name)
            .await
            .inspect_err(|e| warn!("Folder creation under {} failed: {}", parent, e))?;

        info!("Created folder {:?} under {} -> {}", name, parent, created);
        Ok(created)
    }
}
