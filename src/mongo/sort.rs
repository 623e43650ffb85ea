//! Maps SCIM sort/pagination/projection parameters onto their BSON
//! query-option equivalents.

use bson::{Bson, Document};

use crate::model::Attribute;

use super::meta::MetadataHub;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone)]
pub struct Sort {
    pub by: String,
    pub order: SortOrder,
}

/// Resolves `sort.by` through the metadata hub; an empty or unresolvable
/// attribute name falls back to the internal `_id`.
pub fn sort_document(sort: Option<&Sort>, root: &Attribute, hub: &MetadataHub) -> Document {
    let mut doc = Document::new();
    let (mongo_path, direction) = match sort {
        Some(s) if !s.by.is_empty() => {
            let path = root
                .sub_attribute(&s.by)
                .map(|attr| hub.mongo_path_for(&attr.id, &attr.name).to_string())
                .unwrap_or_else(|| "_id".to_string());
            let dir = if s.order == SortOrder::Descending { -1 } else { 1 };
            (path, dir)
        }
        _ => ("_id".to_string(), 1),
    };
    doc.insert(mongo_path, Bson::Int32(direction));
    doc
}

/// 1-based `startIndex`/`count` to Mongo's 0-based `skip`/`limit`.
pub fn pagination(start_index: Option<i64>, count: Option<i64>) -> (i64, Option<i64>) {
    let skip = start_index.map(|i| (i - 1).max(0)).unwrap_or(0);
    (skip, count.map(|c| c.max(0)))
}

/// Builds a `{mp: 1}`/`{mp: 0}` projection document from include/exclude
/// attribute lists, skipping any path that doesn't resolve.
pub fn projection_document(include: &[String], exclude: &[String], root: &Attribute, hub: &MetadataHub) -> Document {
    let mut doc = Document::new();
    if !include.is_empty() {
        for path in include {
            if let Some(mp) = resolve_mongo_path(path, root, hub) {
                doc.insert(mp, Bson::Int32(1));
            }
        }
    } else {
        for path in exclude {
            if let Some(mp) = resolve_mongo_path(path, root, hub) {
                doc.insert(mp, Bson::Int32(0));
            }
        }
    }
    doc
}

fn resolve_mongo_path(path: &str, root: &Attribute, hub: &MetadataHub) -> Option<String> {
    let mut current = root;
    let mut mongo_segments = Vec::new();
    for segment in path.split('.') {
        let attr = current.sub_attribute(segment)?;
        mongo_segments.push(hub.mongo_name_for(&attr.id, &attr.name).to_string());
        current = attr;
    }
    if mongo_segments.is_empty() {
        None
    } else {
        Some(mongo_segments.join("."))
    }
}
