//! The persistence port: storage-backend contract plus the per-resource
//! lock provider, both expressed as `async-trait` traits so alternate
//! backends can be written against the same contract the Mongo adapter
//! implements. `PersistenceProvider`/`LockProvider` are always available;
//! `MongoPersistence` additionally requires the `mongo` feature.

use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::expr::ast::Node as FilterNode;
use crate::tree::property::PropertyRef;
use crate::utils::error::ScimError;

/// Cooperative cancellation: every I/O call propagates this and must
/// honor its deadline. Not a hard preemption mechanism — callers check
/// `is_expired` at suspension points.
#[derive(Clone, Copy)]
pub struct RequestContext {
    deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new() -> Self {
        RequestContext { deadline: None }
    }

    pub fn with_deadline(timeout: Duration) -> Self {
        RequestContext {
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(Instant::now()))
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        RequestContext::new()
    }
}

/// A held per-resource lock; returning it (or dropping it) releases the
/// slot. Opaque to callers — only the provider that issued it interprets it.
pub struct LockToken(pub String);

/// Serializes Replace/Patch/Delete against the same resource id. The
/// authoritative concurrency guard is the storage layer's conditional
/// write; this is an optimization to avoid wasted work racing for it.
#[async_trait(?Send)]
pub trait LockProvider: Send + Sync {
    async fn lock(&self, resource_id: &str, ctx: &RequestContext) -> Result<LockToken, ScimError>;
    async fn unlock(&self, token: LockToken) -> Result<(), ScimError>;
}

pub struct Pagination {
    pub start_index: Option<i64>,
    pub count: Option<i64>,
}

pub struct Projection {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

pub struct Sort {
    pub by: String,
    pub descending: bool,
}

pub struct QueryResult {
    pub resources: Vec<PropertyRef>,
    pub total: i64,
}

/// One implementation per ResourceType (one collection/table each).
/// `replace`/`delete` condition on `(id, meta.version)`: a mismatch is a
/// `Conflict`, not a `NotFound`, since the caller supplied a resource
/// that did exist. `insert` fails `Internal` on a uniqueness-index
/// duplicate-key, per the persistence contract's explicit override of
/// the general duplicate-key-is-uniqueness rule.
#[async_trait(?Send)]
pub trait PersistenceProvider: Send + Sync {
    async fn insert(&self, resource: &PropertyRef, ctx: &RequestContext) -> Result<(), ScimError>;
    async fn get(&self, id: &str, projection: &Projection, ctx: &RequestContext) -> Result<Option<PropertyRef>, ScimError>;
    async fn replace(&self, reference: &PropertyRef, new: &PropertyRef, ctx: &RequestContext) -> Result<(), ScimError>;
    async fn delete(&self, resource: &PropertyRef, ctx: &RequestContext) -> Result<(), ScimError>;
    async fn count(&self, filter: Option<&FilterNode>, ctx: &RequestContext) -> Result<i64, ScimError>;
    async fn query(
        &self,
        filter: Option<&FilterNode>,
        sort: Option<&Sort>,
        pagination: &Pagination,
        projection: &Projection,
        ctx: &RequestContext,
    ) -> Result<QueryResult, ScimError>;
}

#[cfg(feature = "mongo")]
mod mongo_impl {
    use bson::Document;
    use mongodb::options::IndexOptions;
    use mongodb::{Collection, IndexModel};

    use crate::model::{Attribute, Uniqueness};
    use crate::mongo::{self, MetadataHub};
    use crate::tree::property::{self};

    use super::*;

    pub struct MongoPersistence {
        collection: Collection<Document>,
        root: Attribute,
        hub: MetadataHub,
    }

    impl MongoPersistence {
        pub fn new(collection: Collection<Document>, root: Attribute, hub: MetadataHub) -> Self {
            MongoPersistence { collection, root, hub }
        }

        /// Creates unique indexes for `server`/`global`-uniqueness
        /// attributes and ordinary indexes for `@MongoIndex`-annotated
        /// ones. Creation failures are logged as warnings, per the
        /// contract: a missing index degrades query performance, it
        /// doesn't make the collection unusable.
        pub async fn ensure_indexes(&self) {
            for attr in indexable_attributes(&self.root) {
                let mongo_path = self.hub.mongo_path_for(&attr.id, &attr.name).to_string();
                let unique = matches!(attr.uniqueness, Uniqueness::Server | Uniqueness::Global);
                let model = IndexModel::builder()
                    .keys(bson::doc! { (mongo_path.clone()): 1 })
                    .options(IndexOptions::builder().unique(unique).build())
                    .build();
                if let Err(err) = self.collection.create_index(model).await {
                    tracing::warn!(attribute = %attr.id, error = %err, "failed to create index");
                }
            }
        }
    }

    fn indexable_attributes(attr: &Attribute) -> Vec<Attribute> {
        let mut out = Vec::new();
        collect_indexable(attr, &mut out);
        out
    }

    fn collect_indexable(attr: &Attribute, out: &mut Vec<Attribute>) {
        if matches!(attr.uniqueness, Uniqueness::Server | Uniqueness::Global) || attr.has_annotation(crate::model::Annotation::MongoIndex) {
            out.push(attr.clone());
        }
        for child in &attr.sub_attributes {
            collect_indexable(child, out);
        }
    }

    #[async_trait(?Send)]
    impl PersistenceProvider for MongoPersistence {
        async fn insert(&self, resource: &PropertyRef, ctx: &RequestContext) -> Result<(), ScimError> {
            check_deadline(ctx)?;
            let doc = match mongo::marshal(resource, &self.hub) {
                bson::Bson::Document(doc) => doc,
                _ => return Err(ScimError::Internal("resource did not marshal to a document".into())),
            };
            self.collection.insert_one(doc).await.map_err(|err| to_scim_error(err, true))?;
            Ok(())
        }

        async fn get(&self, id: &str, projection: &Projection, ctx: &RequestContext) -> Result<Option<PropertyRef>, ScimError> {
            check_deadline(ctx)?;
            let id_path = self.hub.mongo_path_for("id", "id").to_string();
            let filter = bson::doc! { (id_path): id };
            let opts = mongodb::options::FindOneOptions::builder()
                .projection(mongo::projection_document(&projection.include, &projection.exclude, &self.root, &self.hub))
                .build();
            let found = self.collection.find_one(filter).with_options(opts).await.map_err(|e| to_scim_error(e, false))?;
            let Some(doc) = found else { return Ok(None) };
            let target = property::construct_root(self.root.clone());
            mongo::unmarshal(&target, &doc, &self.hub)?;
            Ok(Some(target))
        }

        async fn replace(&self, reference: &PropertyRef, new: &PropertyRef, ctx: &RequestContext) -> Result<(), ScimError> {
            check_deadline(ctx)?;
            let id_path = self.hub.mongo_path_for("id", "id").to_string();
            let version_path = self.hub.mongo_path_for("meta.version", "meta.version").to_string();
            let id = scalar_string(reference, "id")?;
            let version = scalar_string(reference, "meta.version")?;
            let filter = bson::doc! { (id_path): id, (version_path): version };
            let doc = match mongo::marshal(new, &self.hub) {
                bson::Bson::Document(doc) => doc,
                _ => return Err(ScimError::Internal("resource did not marshal to a document".into())),
            };
            let result = self
                .collection
                .replace_one(filter, doc)
                .await
                .map_err(|e| to_scim_error(e, false))?;
            if result.matched_count == 0 {
                return Err(ScimError::Conflict("resource was modified since it was read".into()));
            }
            Ok(())
        }

        async fn delete(&self, resource: &PropertyRef, ctx: &RequestContext) -> Result<(), ScimError> {
            check_deadline(ctx)?;
            let id_path = self.hub.mongo_path_for("id", "id").to_string();
            let version_path = self.hub.mongo_path_for("meta.version", "meta.version").to_string();
            let id = scalar_string(resource, "id")?;
            let version = scalar_string(resource, "meta.version")?;
            let filter = bson::doc! { (id_path): id, (version_path): version };
            let result = self.collection.delete_one(filter).await.map_err(|e| to_scim_error(e, false))?;
            if result.deleted_count == 0 {
                return Err(ScimError::Conflict("resource was modified since it was read".into()));
            }
            Ok(())
        }

        async fn count(&self, filter: Option<&FilterNode>, ctx: &RequestContext) -> Result<i64, ScimError> {
            check_deadline(ctx)?;
            let query = match filter {
                Some(node) => mongo::translate(node, &self.root, &self.hub)?,
                None => bson::doc! {},
            };
            let count = self.collection.count_documents(query).await.map_err(|e| to_scim_error(e, false))?;
            Ok(count as i64)
        }

        async fn query(
            &self,
            filter: Option<&FilterNode>,
            sort: Option<&Sort>,
            pagination: &Pagination,
            projection: &Projection,
            ctx: &RequestContext,
        ) -> Result<QueryResult, ScimError> {
            check_deadline(ctx)?;
            let query = match filter {
                Some(node) => mongo::translate(node, &self.root, &self.hub)?,
                None => bson::doc! {},
            };
            let total = self.collection.count_documents(query.clone()).await.map_err(|e| to_scim_error(e, false))? as i64;

            check_deadline(ctx)?;
            let mongo_sort = sort.map(|s| mongo::Sort {
                by: s.by.clone(),
                order: if s.descending { mongo::SortOrder::Descending } else { mongo::SortOrder::Ascending },
            });
            let (skip, limit) = mongo::pagination(pagination.start_index, pagination.count);
            let mut opts = mongodb::options::FindOptions::builder()
                .sort(mongo::sort_document(mongo_sort.as_ref(), &self.root, &self.hub))
                .projection(mongo::projection_document(&projection.include, &projection.exclude, &self.root, &self.hub))
                .skip(skip as u64)
                .build();
            if let Some(limit) = limit {
                opts.limit = Some(limit);
            }

            let mut cursor = self.collection.find(query).with_options(opts).await.map_err(|e| to_scim_error(e, false))?;
            let mut resources = Vec::new();
            while cursor.advance().await.map_err(|e| to_scim_error(e, false))? {
                check_deadline(ctx)?;
                let doc = cursor.deserialize_current().map_err(|e| to_scim_error(e, false))?;
                let target = property::construct_root(self.root.clone());
                mongo::unmarshal(&target, &doc, &self.hub)?;
                resources.push(target);
            }
            Ok(QueryResult { resources, total })
        }
    }

    /// Every I/O call checks the request-scoped deadline before issuing
    /// work, honoring the cooperative-cancellation contract: suspension
    /// points (each `.await` here) are where a caller with an expired
    /// deadline should stop making progress, rather than running the
    /// query to completion regardless.
    fn check_deadline(ctx: &RequestContext) -> Result<(), ScimError> {
        if ctx.is_expired() {
            return Err(ScimError::Internal("request deadline exceeded".into()));
        }
        Ok(())
    }

    fn scalar_string(resource: &PropertyRef, dotted_path: &str) -> Result<String, ScimError> {
        let mut node = resource.clone();
        for segment in dotted_path.split('.') {
            node = property::sub_property(&node, segment)
                .ok_or_else(|| ScimError::Internal(format!("missing {dotted_path} while building a conditional write")))?;
        }
        property::scalar_value(&node)
            .and_then(|v| v.as_str().map(str::to_string))
            .ok_or_else(|| ScimError::Internal(format!("{dotted_path} was not a scalar string")))
    }

    /// `insert`'s duplicate-key failures are `Internal` per the
    /// persistence contract's explicit override; anywhere else a
    /// duplicate-key error surfaces it's a genuine uniqueness violation.
    fn to_scim_error(err: mongodb::error::Error, is_insert: bool) -> ScimError {
        let is_duplicate_key = err.to_string().contains("E11000");
        if is_duplicate_key && !is_insert {
            return ScimError::Uniqueness {
                attribute: "unknown".into(),
                detail: err.to_string(),
            };
        }
        ScimError::Internal(err.to_string())
    }
}

#[cfg(feature = "mongo")]
pub use mongo_impl::MongoPersistence;
