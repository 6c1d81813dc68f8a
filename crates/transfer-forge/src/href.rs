/// Kind of a Data Management resource, taken from its href.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceKind {
    Items,
    Versions,
    Folders,
    Other(String),
}

impl ResourceKind {
    fn from_segment(segment: &str) -> Self {
        match segment {
            "items" => Self::Items,
            "versions" => Self::Versions,
            "folders" => Self::Folders,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A resource reference: `.../projects/{project_id}/{kind}/{id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRef {
    pub project_id: String,
    pub kind: ResourceKind,
    /// Percent-decoded id (version ids carry `?version=N`).
    pub id: String,
}

/// Parse a Data Management href or path. Trailing slashes are ignored.
pub fn parse_data_ref(href: &str) -> Option<DataRef> {
    let segments: Vec<&str> = href.trim_end_matches('/').split('/').collect();
    let idx = segments.iter().position(|s| *s == "projects")?;

    let project_id = segments.get(idx + 1).filter(|s| !s.is_empty())?;
    let kind = segments.get(idx + 2).filter(|s| !s.is_empty())?;
    let id = segments.get(idx + 3).filter(|s| !s.is_empty())?;
    if segments.len() > idx + 4 {
        return None;
    }

    let id = urlencoding::decode(id).ok()?.into_owned();

    Some(DataRef {
        project_id: project_id.to_string(),
        kind: ResourceKind::from_segment(kind),
        id,
    })
}

/// OSS object behind a storage id: `urn:adsk.objects:os.object:{bucket}/{object}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectId {
    pub bucket: String,
    pub object: String,
}

pub fn parse_object_id(storage_id: &str) -> Option<ObjectId> {
    let rest = storage_id.strip_prefix("urn:adsk.objects:os.object:")?;
    let (bucket, object) = rest.split_once('/')?;
    if bucket.is_empty() || object.is_empty() {
        return None;
    }
    Some(ObjectId {
        bucket: bucket.to_string(),
        object: object.to_string(),
    })
}
