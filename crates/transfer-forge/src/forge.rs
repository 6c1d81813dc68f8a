//! Data Management client implementing `InternalStore`.
//!
//! Token is passed per-call by the caller (from the session credentials).

use async_trait::async_trait;
use reqwest::{header, Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use transfer_core::{
    AccessToken, CallbackContext, FolderRef, InternalStore, StoragePreparation, TransferError,
    VersionInfo,
};

use crate::href::{parse_data_ref, parse_object_id, ResourceKind};
use crate::jsonapi::{self, Document, Resource};

const DEFAULT_BASE_URL: &str = "https://developer.api.autodesk.com";

/// What to do when the import target already holds an item with the same name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportPolicy {
    /// Report a conflict instead of adding a new version.
    pub skip_existing: bool,
}

/// Context carried from `prepare_storage` to `register_upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageCallback {
    pub project_id: String,
    pub folder_id: String,
    pub file_name: String,
    pub object_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_item_id: Option<String>,
}

/// Autodesk Data Management client (stateless, token provided per call).
pub struct ForgeClient {
    http: Client,
    base_url: String,
    policy: ImportPolicy,
}

impl ForgeClient {
    pub fn new(policy: ImportPolicy) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, policy)
    }

    pub fn with_base_url(base_url: &str, policy: ImportPolicy) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            policy,
        }
    }

    fn project_url(&self, project_id: &str) -> String {
        format!(
            "{}/data/v1/projects/{}",
            self.base_url,
            urlencoding::encode(project_id)
        )
    }

    async fn get_resource(&self, token: &str, url: &str) -> anyhow::Result<Option<Resource>> {
        let resp = self.http.get(url).bearer_auth(token).send().await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let doc: Document<Resource> = check(resp, "Data Management API error").await?.json().await?;
        Ok(Some(doc.data))
    }

    async fn post_jsonapi(&self, token: &str, url: &str, body: &Value) -> anyhow::Result<Value> {
        let resp = self
            .http
            .post(url)
            .bearer_auth(token)
            .header(header::CONTENT_TYPE, jsonapi::CONTENT_TYPE)
            .body(serde_json::to_vec(body)?)
            .send()
            .await?;

        Ok(check(resp, "Data Management API error").await?.json().await?)
    }

    #[instrument(skip(self, token), level = "debug")]
    async fn get_version(
        &self,
        token: &str,
        project_id: &str,
        version_id: &str,
    ) -> anyhow::Result<Option<Resource>> {
        let url = format!(
            "{}/versions/{}",
            self.project_url(project_id),
            urlencoding::encode(version_id)
        );
        self.get_resource(token, &url).await
    }

    #[instrument(skip(self, token), level = "debug")]
    async fn get_tip(
        &self,
        token: &str,
        project_id: &str,
        item_id: &str,
    ) -> anyhow::Result<Option<Resource>> {
        let url = format!(
            "{}/items/{}/tip",
            self.project_url(project_id),
            urlencoding::encode(item_id)
        );
        self.get_resource(token, &url).await
    }

    #[instrument(skip(self, token), level = "debug")]
    async fn get_folder(
        &self,
        token: &str,
        project_id: &str,
        folder_id: &str,
    ) -> anyhow::Result<Option<Resource>> {
        let url = format!(
            "{}/folders/{}",
            self.project_url(project_id),
            urlencoding::encode(folder_id)
        );
        self.get_resource(token, &url).await
    }

    /// Id of the item named `name` in the folder, if any.
    #[instrument(skip(self, token), level = "debug")]
    async fn find_item(
        &self,
        token: &str,
        folder: &FolderRef,
        name: &str,
    ) -> anyhow::Result<Option<String>> {
        let url = format!(
            "{}/folders/{}/contents",
            self.project_url(&folder.project_id),
            urlencoding::encode(&folder.folder_id)
        );

        let mut req = self
            .http
            .get(&url)
            .query(&[("filter[type]", "items")]);

        // Pages are followed until the name is found or `links.next` runs out
        loop {
            let resp = req.bearer_auth(token).send().await?;
            let doc: Document<Vec<Resource>> =
                check(resp, "Data Management API error").await?.json().await?;

            let next = doc.next_page().map(str::to_string);
            if let Some(item) = doc
                .data
                .into_iter()
                .find(|r| r.kind == "items" && r.display_name() == Some(name))
            {
                return Ok(Some(item.id));
            }

            match next {
                Some(href) => req = self.http.get(href),
                None => return Ok(None),
            }
        }
    }

    /// Create an OSS storage object for `name` in the folder; returns its storage id.
    #[instrument(skip(self, token), level = "debug")]
    async fn create_storage(
        &self,
        token: &str,
        folder: &FolderRef,
        name: &str,
    ) -> anyhow::Result<String> {
        let url = format!("{}/storage", self.project_url(&folder.project_id));
        let body = jsonapi::storage_request(name, &folder.folder_id);

        let created = self.post_jsonapi(token, &url, &body).await?;
        let id = created["data"]["id"]
            .as_str()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| anyhow::anyhow!("storage response has no object id"))?;

        debug!("Created storage object {} for {:?}", id, name);
        Ok(id.to_string())
    }

    fn object_url(&self, storage_id: &str) -> Option<String> {
        let object = parse_object_id(storage_id)?;
        Some(format!(
            "{}/oss/v2/buckets/{}/objects/{}",
            self.base_url,
            urlencoding::encode(&object.bucket),
            urlencoding::encode(&object.object)
        ))
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

fn version_info(project_id: &str, resource: Resource) -> Result<VersionInfo, TransferError> {
    if resource.kind != "versions" {
        return Err(TransferError::NotAVersion(resource.id));
    }

    let display_name = resource
        .display_name()
        .map(str::to_string)
        .ok_or_else(|| TransferError::Provider(format!("version {} has no name", resource.id)))?;
    let storage_url = resource
        .storage_href()
        .map(str::to_string)
        .ok_or_else(|| {
            TransferError::Provider(format!("version {} has no storage link", resource.id))
        })?;

    Ok(VersionInfo {
        project_id: project_id.to_string(),
        version_id: resource.id,
        display_name,
        storage_url,
    })
}

#[async_trait]
impl InternalStore for ForgeClient {
    async fn resolve_version(
        &self,
        token: &AccessToken,
        item_ref: &str,
    ) -> Result<VersionInfo, TransferError> {
        let data_ref = parse_data_ref(item_ref)
            .ok_or_else(|| TransferError::NotAVersion(item_ref.to_string()))?;

        let resource = match data_ref.kind {
            ResourceKind::Versions => {
                self.get_version(&token.access_token, &data_ref.project_id, &data_ref.id)
                    .await
            }
            // an item stands for its latest version
            ResourceKind::Items => {
                self.get_tip(&token.access_token, &data_ref.project_id, &data_ref.id)
                    .await
            }
            _ => return Err(TransferError::NotAVersion(item_ref.to_string())),
        }
        .map_err(|e| TransferError::provider("Data Management version lookup", e))?
        .ok_or_else(|| TransferError::NotFound(item_ref.to_string()))?;

        version_info(&data_ref.project_id, resource)
    }

    async fn resolve_folder(
        &self,
        token: &AccessToken,
        folder_ref: &str,
    ) -> Result<FolderRef, TransferError> {
        let data_ref = parse_data_ref(folder_ref)
            .filter(|r| r.kind == ResourceKind::Folders)
            .ok_or_else(|| TransferError::NotAFolder(folder_ref.to_string()))?;

        let resource = self
            .get_folder(&token.access_token, &data_ref.project_id, &data_ref.id)
            .await
            .map_err(|e| TransferError::provider("Data Management folder lookup", e))?
            .ok_or_else(|| TransferError::NotFound(folder_ref.to_string()))?;

        if resource.kind != "folders" {
            return Err(TransferError::NotAFolder(folder_ref.to_string()));
        }

        Ok(FolderRef {
            project_id: data_ref.project_id,
            folder_id: resource.id,
        })
    }

    async fn prepare_storage(
        &self,
        token: &AccessToken,
        folder: &FolderRef,
        desired_name: &str,
    ) -> Result<StoragePreparation, TransferError> {
        let existing_item_id = self
            .find_item(&token.access_token, folder, desired_name)
            .await
            .map_err(|e| TransferError::provider("Data Management folder contents", e))?;

        if existing_item_id.is_some() && self.policy.skip_existing {
            info!(
                "{:?} already exists in folder {}, skipping",
                desired_name, folder.folder_id
            );
            return Ok(StoragePreparation::Skip);
        }

        let object_id = self
            .create_storage(&token.access_token, folder, desired_name)
            .await
            .map_err(|e| TransferError::DestinationProvisioning(e.to_string()))?;

        let write_url = self.object_url(&object_id).ok_or_else(|| {
            TransferError::DestinationProvisioning(format!(
                "unexpected storage object id {}",
                object_id
            ))
        })?;

        let callback = StorageCallback {
            project_id: folder.project_id.clone(),
            folder_id: folder.folder_id.clone(),
            file_name: desired_name.to_string(),
            object_id,
            existing_item_id,
        };
        let callback = serde_json::to_value(&callback)
            .map_err(|e| TransferError::DestinationProvisioning(e.to_string()))?;

        Ok(StoragePreparation::Proceed {
            write_url,
            callback: CallbackContext(callback),
        })
    }

    #[instrument(skip(self, token, callback), level = "debug")]
    async fn register_upload(
        &self,
        token: &AccessToken,
        callback: &CallbackContext,
    ) -> Result<(), TransferError> {
        let ctx: StorageCallback = serde_json::from_value(callback.0.clone())
            .map_err(|e| TransferError::InvalidArgument(format!("callback context: {}", e)))?;

        let project_url = self.project_url(&ctx.project_id);
        let (url, body) = match &ctx.existing_item_id {
            Some(item_id) => (
                format!("{}/versions", project_url),
                jsonapi::version_request(&ctx.file_name, item_id, &ctx.object_id),
            ),
            None => (
                format!("{}/items", project_url),
                jsonapi::item_request(&ctx.file_name, &ctx.folder_id, &ctx.object_id),
            ),
        };

        self.post_jsonapi(&token.access_token, &url, &body)
            .await
            .map_err(|e| {
                warn!("Registering {:?} failed: {}", ctx.file_name, e);
                TransferError::provider("Data Management registration", e)
            })?;

        info!(
            "Registered {:?} in folder {} ({})",
            ctx.file_name,
            ctx.folder_id,
            if ctx.existing_item_id.is_some() {
                "new version"
            } else {
                "new item"
            }
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PROJECT: &str = "b.p1";
    const FOLDER_ID: &str = "urn:adsk.wipprod:fs.folder:co.f1";
    const FOLDER_PATH_ID: &str = "urn%3Aadsk.wipprod%3Afs.folder%3Aco.f1";

    fn token() -> AccessToken {
        AccessToken::new("forge-token")
    }

    fn folder() -> FolderRef {
        FolderRef {
            project_id: PROJECT.to_string(),
            folder_id: FOLDER_ID.to_string(),
        }
    }

    fn version_body(id: &str) -> Value {
        json!({
            "data": {
                "type": "versions",
                "id": id,
                "attributes": { "displayName": "Drawing.dwg" },
                "relationships": {
                    "storage": { "meta": { "link": { "href": "https://oss.test/buckets/b/objects/drawing.dwg" } } }
                }
            }
        })
    }

    async fn mount_contents(server: &MockServer, items: Value) {
        Mock::given(method("GET"))
            .and(path(format!(
                "/data/v1/projects/{}/folders/{}/contents",
                PROJECT, FOLDER_PATH_ID
            )))
            .and(query_param("filter[type]", "items"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": items })))
            .mount(server)
            .await;
    }

    async fn mount_storage(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path(format!("/data/v1/projects/{}/storage", PROJECT)))
            .and(header("content-type", "application/vnd.api+json"))
            .and(body_partial_json(json!({
                "data": { "attributes": { "name": "Plan.pdf" } }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "data": { "type": "objects", "id": "urn:adsk.objects:os.object:wip.dm.prod/obj-1.pdf" }
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_resolve_version_reference() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/v1/projects/b.p1/versions/urn%3Av1%3Fversion%3D3"))
            .and(header("authorization", "Bearer forge-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(version_body("urn:v1?version=3")))
            .mount(&server)
            .await;

        let client = ForgeClient::with_base_url(&server.uri(), ImportPolicy::default());
        let version = client
            .resolve_version(
                &token(),
                "https://developer.api.autodesk.com/data/v1/projects/b.p1/versions/urn%3Av1%3Fversion%3D3",
            )
            .await
            .unwrap();

        assert_eq!(version.display_name, "Drawing.dwg");
        assert_eq!(version.version_id, "urn:v1?version=3");
        assert_eq!(
            version.storage_url,
            "https://oss.test/buckets/b/objects/drawing.dwg"
        );
    }

    #[tokio::test]
    async fn test_resolve_item_uses_tip() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/v1/projects/b.p1/items/i1/tip"))
            .respond_with(ResponseTemplate::new(200).set_body_json(version_body("urn:v1?version=7")))
            .expect(1)
            .mount(&server)
            .await;

        let client = ForgeClient::with_base_url(&server.uri(), ImportPolicy::default());
        let version = client
            .resolve_version(&token(), "/data/v1/projects/b.p1/items/i1")
            .await
            .unwrap();

        assert_eq!(version.version_id, "urn:v1?version=7");
    }

    #[tokio::test]
    async fn test_resolve_version_rejects_folders() {
        let server = MockServer::start().await;
        let client = ForgeClient::with_base_url(&server.uri(), ImportPolicy::default());

        let result = client
            .resolve_version(&token(), "/data/v1/projects/b.p1/folders/f1")
            .await;

        assert!(matches!(result, Err(TransferError::NotAVersion(_))));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_folder() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!(
                "/data/v1/projects/{}/folders/{}",
                PROJECT, FOLDER_PATH_ID
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "type": "folders", "id": FOLDER_ID }
            })))
            .mount(&server)
            .await;

        let client = ForgeClient::with_base_url(&server.uri(), ImportPolicy::default());
        let folder = client
            .resolve_folder(
                &token(),
                &format!("/data/v1/projects/{}/folders/{}", PROJECT, FOLDER_ID),
            )
            .await
            .unwrap();

        assert_eq!(folder, self::folder());
    }

    #[tokio::test]
    async fn test_resolve_folder_rejects_items() {
        let server = MockServer::start().await;
        let client = ForgeClient::with_base_url(&server.uri(), ImportPolicy::default());

        let result = client
            .resolve_folder(&token(), "/data/v1/projects/b.p1/items/i1")
            .await;

        assert!(matches!(result, Err(TransferError::NotAFolder(_))));
    }

    #[tokio::test]
    async fn test_resolve_folder_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = ForgeClient::with_base_url(&server.uri(), ImportPolicy::default());
        let result = client
            .resolve_folder(&token(), "/data/v1/projects/b.p1/folders/gone")
            .await;

        assert!(matches!(result, Err(TransferError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_prepare_storage_for_new_item() {
        let server = MockServer::start().await;
        mount_contents(&server, json!([])).await;
        mount_storage(&server).await;

        let client = ForgeClient::with_base_url(&server.uri(), ImportPolicy::default());
        let prep = client
            .prepare_storage(&token(), &folder(), "Plan.pdf")
            .await
            .unwrap();

        let StoragePreparation::Proceed {
            write_url,
            callback,
        } = prep
        else {
            panic!("expected Proceed");
        };
        assert_eq!(
            write_url,
            format!("{}/oss/v2/buckets/wip.dm.prod/objects/obj-1.pdf", server.uri())
        );
        let ctx: StorageCallback = serde_json::from_value(callback.0).unwrap();
        assert_eq!(ctx.file_name, "Plan.pdf");
        assert_eq!(ctx.object_id, "urn:adsk.objects:os.object:wip.dm.prod/obj-1.pdf");
        assert_eq!(ctx.existing_item_id, None);
    }

    #[tokio::test]
    async fn test_prepare_storage_existing_item_adds_version() {
        let server = MockServer::start().await;
        mount_contents(
            &server,
            json!([{ "type": "items", "id": "item-9", "attributes": { "displayName": "Plan.pdf" } }]),
        )
        .await;
        mount_storage(&server).await;

        let client = ForgeClient::with_base_url(&server.uri(), ImportPolicy::default());
        let prep = client
            .prepare_storage(&token(), &folder(), "Plan.pdf")
            .await
            .unwrap();

        let StoragePreparation::Proceed { callback, .. } = prep else {
            panic!("expected Proceed");
        };
        assert_eq!(callback.0["existingItemId"], "item-9");
    }

    #[tokio::test]
    async fn test_prepare_storage_skip_creates_nothing() {
        let server = MockServer::start().await;
        mount_contents(
            &server,
            json!([{ "type": "items", "id": "item-9", "attributes": { "displayName": "Plan.pdf" } }]),
        )
        .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let client = ForgeClient::with_base_url(
            &server.uri(),
            ImportPolicy {
                skip_existing: true,
            },
        );
        let prep = client
            .prepare_storage(&token(), &folder(), "Plan.pdf")
            .await
            .unwrap();

        assert_eq!(prep, StoragePreparation::Skip);
    }

    #[tokio::test]
    async fn test_prepare_storage_finds_item_on_later_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!(
                "/data/v1/projects/{}/folders/{}/contents",
                PROJECT, FOLDER_PATH_ID
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "type": "items", "id": "item-1", "attributes": { "displayName": "Other.pdf" } }],
                "links": { "next": { "href": format!("{}/contents-page-2", server.uri()) } }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/contents-page-2"))
            .and(header("authorization", "Bearer forge-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "type": "items", "id": "item-9", "attributes": { "displayName": "Plan.pdf" } }],
                "links": { "self": { "href": "ignored" } }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let client = ForgeClient::with_base_url(
            &server.uri(),
            ImportPolicy {
                skip_existing: true,
            },
        );
        let prep = client
            .prepare_storage(&token(), &folder(), "Plan.pdf")
            .await
            .unwrap();

        assert_eq!(prep, StoragePreparation::Skip);
    }

    #[tokio::test]
    async fn test_register_upload_new_item() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/data/v1/projects/{}/items", PROJECT)))
            .and(body_partial_json(json!({
                "data": { "type": "items", "attributes": { "displayName": "Plan.pdf" } }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"data": {}})))
            .expect(1)
            .mount(&server)
            .await;

        let client = ForgeClient::with_base_url(&server.uri(), ImportPolicy::default());
        let callback = StorageCallback {
            project_id: PROJECT.to_string(),
            folder_id: FOLDER_ID.to_string(),
            file_name: "Plan.pdf".to_string(),
            object_id: "urn:adsk.objects:os.object:b/o".to_string(),
            existing_item_id: None,
        };

        client
            .register_upload(
                &token(),
                &CallbackContext(serde_json::to_value(&callback).unwrap()),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_register_upload_new_version() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/data/v1/projects/{}/versions", PROJECT)))
            .and(body_partial_json(json!({
                "data": { "relationships": { "item": { "data": { "id": "item-9" } } } }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"data": {}})))
            .expect(1)
            .mount(&server)
            .await;

        let client = ForgeClient::with_base_url(&server.uri(), ImportPolicy::default());
        let callback = StorageCallback {
            project_id: PROJECT.to_string(),
            folder_id: FOLDER_ID.to_string(),
            file_name: "Plan.pdf".to_string(),
            object_id: "urn:adsk.objects:os.object:b/o".to_string(),
            existing_item_id: Some("item-9".to_string()),
        };

        client
            .register_upload(
                &token(),
                &CallbackContext(serde_json::to_value(&callback).unwrap()),
            )
            .await
            .unwrap();
    }
}
