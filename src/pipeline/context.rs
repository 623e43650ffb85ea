//! Per-request state shared across filter pipeline stages.

use std::collections::HashMap;

use serde_json::Value as Json;

use crate::model::ResourceType;

pub struct FilterContext {
    pub resource_type: ResourceType,
    baseline_hash: Option<u64>,
    password_hashed: bool,
    extras: HashMap<String, Json>,
}

impl FilterContext {
    pub fn new(resource_type: ResourceType) -> Self {
        FilterContext {
            resource_type,
            baseline_hash: None,
            password_hashed: false,
            extras: HashMap::new(),
        }
    }

    pub fn baseline_hash(&self) -> Option<u64> {
        self.baseline_hash
    }

    pub fn set_baseline_hash(&mut self, hash: u64) {
        self.baseline_hash = Some(hash);
    }

    pub fn password_already_hashed(&self) -> bool {
        self.password_hashed
    }

    pub fn mark_password_hashed(&mut self) {
        self.password_hashed = true;
    }

    pub fn set(&mut self, key: impl Into<String>, value: Json) {
        self.extras.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Json> {
        self.extras.get(key)
    }
}
