//! The three transfer routes as sequential stages:
//! credentials, pre-step, descriptors, dispatch.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::credentials::SessionCredentials;
use crate::descriptor::{DescriptorBuilder, DescriptorRequest};
use crate::dispatch::TransferDispatcher;
use crate::error::TransferError;
use crate::provider::{
    FolderHandle, InternalStore, ItemHandle, StoragePreparation, StorageProvider,
};
use crate::resolver::FolderResolver;
use crate::task::TransferTask;

pub struct TransferPipeline {
    external: Arc<dyn StorageProvider>,
    internal: Arc<dyn InternalStore>,
    resolver: FolderResolver,
    descriptors: DescriptorBuilder,
    dispatcher: TransferDispatcher,
}

impl TransferPipeline {
    pub fn new(
        external: Arc<dyn StorageProvider>,
        internal: Arc<dyn InternalStore>,
        dispatcher: TransferDispatcher,
    ) -> Self {
        Self {
            resolver: FolderResolver::new(external.clone()),
            descriptors: DescriptorBuilder::new(external.clone()),
            external,
            internal,
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &TransferDispatcher {
        &self.dispatcher
    }

    /// Find or create `folder_name` under `parent_folder` on the external store.
    #[instrument(skip(self, session), level = "debug")]
    pub async fn create_folder(
        &self,
        session: &SessionCredentials,
        parent_folder: &str,
        folder_name: &str,
    ) -> Result<FolderHandle, TransferError> {
        let token = session.external()?;
        self.resolver
            .resolve_or_create_folder(token, parent_folder, folder_name)
            .await
    }

    /// Export an internal version into an external folder.
    #[instrument(skip(self, session), level = "debug")]
    pub async fn transfer_to(
        &self,
        session: &SessionCredentials,
        autodesk_item: &str,
        storage_folder: &str,
    ) -> Result<TransferTask, TransferError> {
        let credentials = session.require_both()?;
        let folder = FolderHandle::parse(storage_folder)?;

        let version = self
            .internal
            .resolve_version(&credentials.internal, autodesk_item)
            .await?;

        let pair = self
            .descriptors
            .build(DescriptorRequest::Export { version, folder }, &credentials)
            .await?;

        let task = self.dispatcher.dispatch(pair, &credentials, None).await?;
        info!("Export of {} dispatched as {}", autodesk_item, task.task_id);
        Ok(task)
    }

    /// Import an external item into an internal folder.
    #[instrument(skip(self, session), level = "debug")]
    pub async fn transfer_from(
        &self,
        session: &SessionCredentials,
        autodesk_folder: &str,
        storage_item: &str,
    ) -> Result<TransferTask, TransferError> {
        let credentials = session.require_both()?;
        if storage_item.is_empty() {
            return Err(TransferError::InvalidArgument(
                "storage item must not be empty".to_string(),
            ));
        }

        let folder = self
            .internal
            .resolve_folder(&credentials.internal, autodesk_folder)
            .await?;

        let item = ItemHandle(storage_item.to_string());
        let info = self.external.get_item(&credentials.external, &item).await?;

        let (write_url, callback) = match self
            .internal
            .prepare_storage(&credentials.internal, &folder, &info.name)
            .await?
        {
            StoragePreparation::Skip => {
                return Err(TransferError::Conflict(format!(
                    "{} already exists in folder {}",
                    info.name, folder.folder_id
                )))
            }
            StoragePreparation::Proceed {
                write_url,
                callback,
            } => (write_url, callback),
        };

        let pair = self
            .descriptors
            .build(DescriptorRequest::Import { item, write_url }, &credentials)
            .await?;

        let task = self
            .dispatcher
            .dispatch(pair, &credentials, Some(callback))
            .await?;
        info!("Import of {} dispatched as {}", storage_item, task.task_id);
        Ok(task)
    }
}
