//! Core traits and types for storage-transfer.
//!
//! This crate defines the pieces shared between the provider adapters, the job
//! runners and the HTTP service:
//! - `StorageProvider`: external store adapter (folders, items, placeholders)
//! - `InternalStore`: internal store adapter (versions, folders, storage preparation)
//! - `JobRunner`: asynchronous byte-copy worker
//! - `CredentialAccessor`: per-session token lookup
//! - `TransferPipeline`: the sequential orchestration of the three routes

mod credentials;
mod descriptor;
mod dispatch;
mod error;
mod pipeline;
mod provider;
mod resolver;
mod task;

#[cfg(test)]
mod testing;

pub use credentials::{AccessToken, CredentialAccessor, SessionCredentials, TransferCredentials};
pub use descriptor::{
    BodyEncoding, DescriptorBuilder, DescriptorPair, DescriptorRequest, Direction, HttpMethod,
    TransferDescriptor,
};
pub use dispatch::{JobRunner, TransferDispatcher, TransferJob};
pub use error::TransferError;
pub use pipeline::TransferPipeline;
pub use provider::{
    CallbackContext, FolderEntry, FolderHandle, FolderRef, InternalStore, ItemHandle, ItemInfo,
    PlaceholderItem, StoragePreparation, StorageProvider, UploadTarget, VersionInfo,
};
pub use resolver::FolderResolver;
pub use task::{TaskRegistry, TaskStatus, TransferTask, DEFAULT_TASK_RETENTION};
