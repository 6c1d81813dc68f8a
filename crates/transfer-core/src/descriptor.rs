//! Source/destination descriptors for a byte transfer.
//!
//! A descriptor is a fully specified HTTP endpoint plus auth; the job runner
//! reads from one and writes into the other without the orchestrator ever
//! buffering the content.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::credentials::{AccessToken, TransferCredentials};
use crate::error::TransferError;
use crate::provider::{FolderHandle, ItemHandle, StorageProvider, VersionInfo};

const AUTHORIZATION: &str = "Authorization";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Patch,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Patch => "PATCH",
        }
    }
}

/// How the runner must treat the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyEncoding {
    /// UTF-8 text, used for JSON metadata.
    Text,
    /// Raw bytes, never re-encoded.
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Internal store to external store.
    Export,
    /// External store to internal store.
    Import,
}

/// One end of a transfer. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferDescriptor {
    url: String,
    method: HttpMethod,
    headers: BTreeMap<String, String>,
    body_encoding: BodyEncoding,
}

impl TransferDescriptor {
    pub fn new(
        url: impl Into<String>,
        method: HttpMethod,
        token: &AccessToken,
        body_encoding: BodyEncoding,
    ) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(AUTHORIZATION.to_string(), token.bearer());
        Self {
            url: url.into(),
            method,
            headers,
            body_encoding,
        }
    }

    /// Add a header. The Authorization header is fixed by the constructor.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        if name.eq_ignore_ascii_case(AUTHORIZATION) {
            warn!("Ignoring extra Authorization header on transfer descriptor");
            return self;
        }
        self.headers.insert(name, value.into());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn body_encoding(&self) -> BodyEncoding {
        self.body_encoding
    }

    pub fn is_binary(&self) -> bool {
        self.body_encoding == BodyEncoding::Binary
    }
}

/// Readable source plus writable destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorPair {
    pub source: TransferDescriptor,
    pub destination: TransferDescriptor,
}

/// What to build descriptors for.
#[derive(Debug, Clone)]
pub enum DescriptorRequest {
    Export {
        version: VersionInfo,
        folder: FolderHandle,
    },
    Import {
        item: ItemHandle,
        /// Pre-provisioned write URL on the internal store.
        write_url: String,
    },
}

impl DescriptorRequest {
    pub fn direction(&self) -> Direction {
        match self {
            Self::Export { .. } => Direction::Export,
            Self::Import { .. } => Direction::Import,
        }
    }
}

/// Builds the descriptor pair for one transfer.
pub struct DescriptorBuilder {
    external: Arc<dyn StorageProvider>,
}

impl DescriptorBuilder {
    pub fn new(external: Arc<dyn StorageProvider>) -> Self {
        Self { external }
    }

    #[instrument(skip(self, request, credentials), level = "debug", fields(direction = ?request.direction()))]
    pub async fn build(
        &self,
        request: DescriptorRequest,
        credentials: &TransferCredentials,
    ) -> Result<DescriptorPair, TransferError> {
        match request {
            DescriptorRequest::Export { version, folder } => {
                self.build_export(&version, &folder, credentials).await
            }
            DescriptorRequest::Import { item, write_url } => {
                Ok(self.build_import(&item, write_url, credentials))
            }
        }
    }

    async fn build_export(
        &self,
        version: &VersionInfo,
        folder: &FolderHandle,
        credentials: &TransferCredentials,
    ) -> Result<DescriptorPair, TransferError> {
        // The external store needs an item id before it accepts bytes.
        let placeholder = self
            .external
            .create_placeholder_item(&credentials.external, folder, &version.display_name)
            .await
            .map_err(|e| TransferError::DestinationProvisioning(e.to_string()))?;

        if placeholder.id.is_empty() {
            return Err(TransferError::DestinationProvisioning(format!(
                "placeholder for {} was created without an id",
                version.display_name
            )));
        }

        debug!(
            "Created placeholder {} for version {}",
            placeholder.id, version.version_id
        );

        let source = TransferDescriptor::new(
            &version.storage_url,
            HttpMethod::Get,
            &credentials.internal,
            BodyEncoding::Binary,
        );

        let target = self.external.upload_target(&placeholder);
        let mut destination = TransferDescriptor::new(
            target.url,
            target.method,
            &credentials.external,
            BodyEncoding::Binary,
        );
        if let Some(content_type) = target.content_type {
            destination = destination.with_header("Content-Type", content_type);
        }

        Ok(DescriptorPair {
            source,
            destination,
        })
    }

    fn build_import(
        &self,
        item: &ItemHandle,
        write_url: String,
        credentials: &TransferCredentials,
    ) -> DescriptorPair {
        let source = TransferDescriptor::new(
            self.external.content_url(item),
            HttpMethod::Get,
            &credentials.external,
            BodyEncoding::Binary,
        );
        let destination = TransferDescriptor::new(
            write_url,
            HttpMethod::Put,
            &credentials.internal,
            BodyEncoding::Binary,
        );

        DescriptorPair {
            source,
            destination,
        }
    }
}
