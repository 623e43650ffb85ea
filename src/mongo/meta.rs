//! Maps an attribute id to the field name/dotted path it's stored under
//! in MongoDB. Attributes whose natural name MongoDB forbids (a leading
//! `$`, an embedded `.`, most often schema-extension-root URNs) need an
//! alias; everything else is stored under its own name verbatim.

use std::collections::HashMap;

use serde::Deserialize;

/// One entry of the on-disk metadata document (`{"metadata":[...]}`,
/// per the external interface format).
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataEntry {
    pub id: String,
    #[serde(rename = "mongoName")]
    pub mongo_name: String,
    #[serde(rename = "mongoPath")]
    pub mongo_path: String,
}

#[derive(Debug, Clone, Deserialize)]
struct MetadataDocument {
    metadata: Vec<MetadataEntry>,
}

#[derive(Debug, Default)]
pub struct MetadataHub {
    by_id: HashMap<String, MetadataEntry>,
}

impl MetadataHub {
    pub fn new() -> Self {
        MetadataHub::default()
    }

    pub fn register(&mut self, id: impl Into<String>, mongo_name: impl Into<String>, mongo_path: impl Into<String>) {
        let id = id.into();
        self.by_id.insert(
            id.clone(),
            MetadataEntry {
                id,
                mongo_name: mongo_name.into(),
                mongo_path: mongo_path.into(),
            },
        );
    }

    /// Parses the `{"metadata":[{"id":...,"mongoName":...,"mongoPath":...}]}`
    /// document format.
    pub fn load(json: &str) -> Result<Self, serde_json::Error> {
        let doc: MetadataDocument = serde_json::from_str(json)?;
        let mut hub = MetadataHub::new();
        for entry in doc.metadata {
            hub.by_id.insert(entry.id.clone(), entry);
        }
        Ok(hub)
    }

    /// The storage field name for `attribute_id`, falling back to
    /// `fallback_name` (the attribute's own SCIM name) when unaliased.
    pub fn mongo_name_for<'a>(&'a self, attribute_id: &str, fallback_name: &'a str) -> &'a str {
        self.by_id.get(attribute_id).map(|e| e.mongo_name.as_str()).unwrap_or(fallback_name)
    }

    /// The full dotted storage path for `attribute_id`, falling back to
    /// `fallback_path` (the attribute's dotted SCIM path) when unaliased.
    pub fn mongo_path_for<'a>(&'a self, attribute_id: &str, fallback_path: &'a str) -> &'a str {
        self.by_id.get(attribute_id).map(|e| e.mongo_path.as_str()).unwrap_or(fallback_path)
    }
}
