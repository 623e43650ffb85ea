//! # scim-core
//!
//! A schema-driven core for building a SCIM v2 (RFC 7643/7644) identity
//! service: a dynamic property tree shaped by runtime-loaded attribute
//! metadata, a filter/path expression compiler shared between query
//! filters and PATCH path resolution, a JSON codec honoring `returned`/
//! `mutability`/projection rules, CRUD operators, a filter pipeline
//! wiring id assignment/password hashing/meta bookkeeping/validation
//! together, and — behind the `mongo` feature — a MongoDB-backed
//! `PersistenceProvider` with its own filter-to-BSON translator.
//!
//! This crate has no HTTP layer and no bulk-operation or SCIM-discovery
//! support; it is the engine a host wires into its own endpoints.
//!
//! ## Example
//!
//! ```
//! use scim_core::config::ScimConfig;
//! use scim_core::model::ResourceTypeRegistry;
//! use scim_core::pipeline::{self, FilterContext};
//! use scim_core::tree::property::{self, construct_root, ScalarValue};
//!
//! let registry = ResourceTypeRegistry::with_defaults();
//! let resource_type = registry.get("User").expect("User resource type is built in");
//! let super_attribute = resource_type.super_attribute(&registry.schemas).unwrap();
//! let root = construct_root(super_attribute);
//!
//! let user_name = property::sub_property(&root, "userName").unwrap();
//! property::replace_scalar(&user_name, ScalarValue::Str("jdoe".into())).unwrap();
//!
//! let config = ScimConfig::new("https://example.com/scim/v2");
//! let mut ctx = FilterContext::new((*resource_type).clone());
//! pipeline::filter(&mut ctx, &config, &root).unwrap();
//!
//! assert!(property::present(&property::sub_property(&root, "id").unwrap()));
//! ```

pub mod config;
pub mod crud;
pub mod expr;
pub mod json;
pub mod model;
#[cfg(feature = "mongo")]
pub mod mongo;
pub mod persistence;
pub mod pipeline;
pub mod tree;
pub mod utils;
