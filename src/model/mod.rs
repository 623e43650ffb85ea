//! The metamodel: attribute/schema/resource-type definitions that describe
//! a resource's shape as data, plus the embedded RFC 7643 defaults built
//! from it.

pub mod attribute;
pub mod defaults;
pub mod resource_type;
pub mod schema;
pub mod service_provider_config;

pub use attribute::{Annotation, Attribute, DataType, Mutability, Returned, Uniqueness};
pub use resource_type::{ResourceType, ResourceTypeRegistry, SchemaExtension};
pub use schema::{Schema, SchemaRegistry};
pub use service_provider_config::ServiceProviderConfig;
