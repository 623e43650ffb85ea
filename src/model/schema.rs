//! Schema: a named, URN-identified collection of top-level attributes, plus
//! a process-wide registry of them.
//!
//! The registry mirrors the init-then-freeze model §5 calls for: schemas
//! are registered once at startup (`ResourceTypeRegistry::with_defaults`,
//! or a caller's own `register`) and read many times per request after
//! that, so the registry is an `RwLock` rather than anything finer-grained.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use super::attribute::Attribute;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub attributes: Vec<Attribute>,
}

impl Schema {
    pub fn new(id: impl Into<String>, name: impl Into<String>, attributes: Vec<Attribute>) -> Self {
        Schema {
            id: id.into(),
            name: name.into(),
            description: None,
            attributes,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name.eq_ignore_ascii_case(name))
    }
}

/// Process-wide registry of schemas by URN. Cheap to clone a handle to
/// (`Arc<Schema>` values inside), never cheap to rebuild, so callers
/// generally hold one `SchemaRegistry` for the process lifetime.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    by_urn: RwLock<HashMap<String, Arc<Schema>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        SchemaRegistry {
            by_urn: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, schema: Schema) {
        self.by_urn
            .write()
            .expect("schema registry lock poisoned")
            .insert(schema.id.clone(), Arc::new(schema));
    }

    pub fn get(&self, urn: &str) -> Option<Arc<Schema>> {
        self.by_urn.read().expect("schema registry lock poisoned").get(urn).cloned()
    }

    pub fn urns(&self) -> Vec<String> {
        self.by_urn.read().expect("schema registry lock poisoned").keys().cloned().collect()
    }
}
