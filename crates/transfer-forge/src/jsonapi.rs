//! JSON:API shapes used by the Data Management endpoints.

use serde::Deserialize;
use serde_json::{json, Value};

pub const CONTENT_TYPE: &str = "application/vnd.api+json";

#[derive(Debug, Deserialize)]
pub struct Document<T> {
    pub data: T,
    #[serde(default)]
    pub links: Option<PageLinks>,
}

/// Pagination links of a collection response.
#[derive(Debug, Default, Deserialize)]
pub struct PageLinks {
    #[serde(default)]
    pub next: Option<Link>,
}

impl<T> Document<T> {
    pub fn next_page(&self) -> Option<&str> {
        self.links
            .as_ref()
            .and_then(|l| l.next.as_ref())
            .map(|l| l.href.as_str())
    }
}

#[derive(Debug, Deserialize)]
pub struct Resource {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub relationships: Relationships,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attributes {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Relationships {
    #[serde(default)]
    pub storage: Option<StorageRelationship>,
}

#[derive(Debug, Deserialize)]
pub struct StorageRelationship {
    #[serde(default)]
    pub meta: Option<StorageMeta>,
}

#[derive(Debug, Deserialize)]
pub struct StorageMeta {
    pub link: Link,
}

#[derive(Debug, Deserialize)]
pub struct Link {
    pub href: String,
}

impl Resource {
    pub fn display_name(&self) -> Option<&str> {
        self.attributes
            .display_name
            .as_deref()
            .or(self.attributes.name.as_deref())
    }

    pub fn storage_href(&self) -> Option<&str> {
        self.relationships
            .storage
            .as_ref()
            .and_then(|s| s.meta.as_ref())
            .map(|m| m.link.href.as_str())
    }
}

fn envelope(data: Value) -> Value {
    json!({
        "jsonapi": { "version": "1.0" },
        "data": data,
    })
}

/// Body for `POST /data/v1/projects/{project}/storage`.
pub fn storage_request(file_name: &str, folder_id: &str) -> Value {
    envelope(json!({
        "type": "objects",
        "attributes": { "name": file_name },
        "relationships": {
            "target": { "data": { "type": "folders", "id": folder_id } }
        }
    }))
}

/// Body for `POST /data/v1/projects/{project}/items`: first version of a new item.
pub fn item_request(file_name: &str, folder_id: &str, object_id: &str) -> Value {
    let mut body = envelope(json!({
        "type": "items",
        "attributes": {
            "displayName": file_name,
            "extension": { "type": "items:autodesk.core:File", "version": "1.0" }
        },
        "relationships": {
            "tip": { "data": { "type": "versions", "id": "1" } },
            "parent": { "data": { "type": "folders", "id": folder_id } }
        }
    }));
    body["included"] = json!([{
        "type": "versions",
        "id": "1",
        "attributes": {
            "name": file_name,
            "extension": { "type": "versions:autodesk.core:File", "version": "1.0" }
        },
        "relationships": {
            "storage": { "data": { "type": "objects", "id": object_id } }
        }
    }]);
    body
}

/// Body for `POST /data/v1/projects/{project}/versions`: new version of an existing item.
pub fn version_request(file_name: &str, item_id: &str, object_id: &str) -> Value {
    envelope(json!({
        "type": "versions",
        "attributes": {
            "name": file_name,
            "extension": { "type": "versions:autodesk.core:File", "version": "1.0" }
        },
        "relationships": {
            "item": { "data": { "type": "items", "id": item_id } },
            "storage": { "data": { "type": "objects", "id": object_id } }
        }
    }))
}
