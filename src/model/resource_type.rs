//! ResourceType: names the core schema a resource belongs to plus the
//! schema extensions it may carry, and synthesizes the single flat
//! attribute tree that the property tree is actually built against.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use super::attribute::{Annotation, Attribute, DataType, Mutability, Returned};
use super::schema::{Schema, SchemaRegistry};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaExtension {
    pub schema: String,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceType {
    pub id: String,
    pub name: String,
    pub endpoint: String,
    pub schema: String,
    #[serde(default)]
    pub schema_extensions: Vec<SchemaExtension>,
}

impl ResourceType {
    pub fn new(id: impl Into<String>, name: impl Into<String>, endpoint: impl Into<String>, schema: impl Into<String>) -> Self {
        ResourceType {
            id: id.into(),
            name: name.into(),
            endpoint: endpoint.into(),
            schema: schema.into(),
            schema_extensions: Vec::new(),
        }
    }

    pub fn with_extension(mut self, schema: impl Into<String>, required: bool) -> Self {
        self.schema_extensions.push(SchemaExtension {
            schema: schema.into(),
            required,
        });
        self
    }

    /// Builds the single super-attribute backing this resource type's
    /// property tree: the core schema's attributes plus `schemas`/`id`/
    /// `externalId`/`meta`, plus one synthetic complex sub-attribute per
    /// extension, each tagged `@StateSummary` + `@SchemaExtensionRoot` so
    /// the extension's own top-level attributes live under their own
    /// namespace instead of flattened into the base resource.
    pub fn super_attribute(&self, registry: &SchemaRegistry) -> Result<Attribute, String> {
        let core = registry
            .get(&self.schema)
            .ok_or_else(|| format!("unregistered core schema {}", self.schema))?;

        let mut sub_attributes = common_attributes();
        sub_attributes.extend(core.attributes.iter().cloned());

        for ext in &self.schema_extensions {
            let ext_schema = registry
                .get(&ext.schema)
                .ok_or_else(|| format!("unregistered extension schema {}", ext.schema))?;
            let mut extension_root = Attribute::complex(
                ext_schema.id.clone(),
                ext_schema.id.clone(),
                ext_schema.attributes.clone(),
            )
            .annotate(Annotation::StateSummary)
            .annotate(Annotation::SchemaExtensionRoot);
            if ext.required {
                extension_root = extension_root.required();
            }
            sub_attributes.push(extension_root);
        }

        Ok(Attribute::complex(self.id.clone(), self.name.clone(), sub_attributes).annotate(Annotation::SyncSchema))
    }
}

/// Attributes common to every resource per RFC 7643 §3.1: `schemas`, `id`,
/// `externalId`, and `meta` (itself complex).
fn common_attributes() -> Vec<Attribute> {
    vec![
        Attribute::scalar(
            "urn:ietf:params:scim:schemas:core:2.0:Common:schemas",
            "schemas",
            DataType::String,
        )
        .multi_valued()
        .required(),
        Attribute::scalar("urn:ietf:params:scim:schemas:core:2.0:Common:id", "id", DataType::String)
            .mutability(Mutability::ReadOnly)
            .returned(Returned::Always)
            .annotate(Annotation::Identity)
            .annotate(Annotation::CopyReadOnly),
        Attribute::scalar(
            "urn:ietf:params:scim:schemas:core:2.0:Common:externalId",
            "externalId",
            DataType::String,
        ),
        Attribute::complex(
            "urn:ietf:params:scim:schemas:core:2.0:Common:meta",
            "meta",
            vec![
                Attribute::scalar(
                    "urn:ietf:params:scim:schemas:core:2.0:Common:meta.resourceType",
                    "resourceType",
                    DataType::String,
                )
                .mutability(Mutability::ReadOnly),
                Attribute::scalar(
                    "urn:ietf:params:scim:schemas:core:2.0:Common:meta.created",
                    "created",
                    DataType::DateTime,
                )
                .mutability(Mutability::ReadOnly)
                .annotate(Annotation::CopyReadOnly),
                Attribute::scalar(
                    "urn:ietf:params:scim:schemas:core:2.0:Common:meta.lastModified",
                    "lastModified",
                    DataType::DateTime,
                )
                .mutability(Mutability::ReadOnly),
                Attribute::scalar(
                    "urn:ietf:params:scim:schemas:core:2.0:Common:meta.location",
                    "location",
                    DataType::Reference,
                )
                .mutability(Mutability::ReadOnly),
                Attribute::scalar(
                    "urn:ietf:params:scim:schemas:core:2.0:Common:meta.version",
                    "version",
                    DataType::String,
                )
                .mutability(Mutability::ReadOnly)
                .annotate(Annotation::StateSummary),
            ],
        )
        .mutability(Mutability::ReadOnly),
    ]
}

#[derive(Debug, Default)]
pub struct ResourceTypeRegistry {
    by_name: RwLock<HashMap<String, Arc<ResourceType>>>,
    pub schemas: SchemaRegistry,
}

impl ResourceTypeRegistry {
    pub fn new() -> Self {
        ResourceTypeRegistry {
            by_name: RwLock::new(HashMap::new()),
            schemas: SchemaRegistry::new(),
        }
    }

    pub fn register_schema(&self, schema: Schema) {
        self.schemas.register(schema);
    }

    pub fn register(&self, resource_type: ResourceType) {
        self.by_name
            .write()
            .expect("resource type registry lock poisoned")
            .insert(resource_type.name.clone(), Arc::new(resource_type));
    }

    pub fn get(&self, name: &str) -> Option<Arc<ResourceType>> {
        self.by_name
            .read()
            .expect("resource type registry lock poisoned")
            .get(name)
            .cloned()
    }

    /// Loads the default RFC 7643 Core/User/Group/EnterpriseUser schemas
    /// and the `User`/`Group` resource types built from them.
    pub fn with_defaults() -> Self {
        let registry = ResourceTypeRegistry::new();
        for schema in super::defaults::default_schemas() {
            registry.register_schema(schema);
        }
        for resource_type in super::defaults::default_resource_types() {
            registry.register(resource_type);
        }
        registry
    }
}
