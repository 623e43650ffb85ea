//! The ordered resource-filter stages run on every create/replace/patch.
//!
//! Canonical stage list per the spec: ID, Clear-ReadOnly, Copy-ReadOnly,
//! Password, Meta, Validation, with Baseline-Hash captured at pipeline
//! entry. Clear-ReadOnly runs before ID (not after, despite the spec's
//! enumeration order) so a freshly assigned id survives it; on the
//! `FilterRef` entry point, ID is skipped entirely (ids are never
//! reassigned on replace/patch) and Copy-ReadOnly restores `id` and
//! `meta.created` from the reference before Meta recomputes the rest.

use sha1::{Digest, Sha1};

use crate::config::ScimConfig;
use crate::model::{Annotation, Mutability};
use crate::tree::property::{self, PropertyRef, ScalarValue};
use crate::utils::error::ScimError;

use super::context::FilterContext;

/// Runs the pipeline for a create.
pub fn filter(ctx: &mut FilterContext, config: &ScimConfig, resource: &PropertyRef) -> Result<(), ScimError> {
    tracing::debug!(resource_type = %ctx.resource_type.name, "running create pipeline");
    clear_readonly(resource)?;
    assign_id(config, resource)?;
    hash_password(ctx, config, resource)?;
    assign_meta(ctx, config, resource, true, None)?;
    let result = validate(resource, None);
    if let Err(err) = &result {
        tracing::warn!(resource_type = %ctx.resource_type.name, error = %err, "create validation failed");
    }
    result
}

/// Runs the pipeline for a replace/patch against `reference`, the
/// currently stored resource.
pub fn filter_ref(ctx: &mut FilterContext, config: &ScimConfig, resource: &PropertyRef, reference: &PropertyRef) -> Result<(), ScimError> {
    let id = property::sub_property(reference, "id")
        .and_then(|p| property::scalar_value(&p))
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    tracing::debug!(resource_type = %ctx.resource_type.name, resource_id = %id, "running replace/patch pipeline");
    ctx.set_baseline_hash(content_hash(reference));
    clear_readonly(resource)?;
    copy_readonly(resource, reference)?;
    hash_password(ctx, config, resource)?;
    assign_meta(ctx, config, resource, false, Some(reference))?;
    let result = validate(resource, Some(reference));
    if let Err(err) = &result {
        tracing::warn!(resource_type = %ctx.resource_type.name, resource_id = %id, error = %err, "replace/patch validation failed");
    }
    result
}

fn assign_id(config: &ScimConfig, resource: &PropertyRef) -> Result<(), ScimError> {
    let Some(id) = property::sub_property(resource, "id") else {
        return Ok(());
    };
    if property::is_unassigned(&id) {
        property::replace_scalar(&id, ScalarValue::Str(config.id_generator.generate()))?;
    }
    Ok(())
}

fn clear_readonly(node: &PropertyRef) -> Result<(), ScimError> {
    if property::attribute(node).mutability == Mutability::ReadOnly {
        return property::delete(node);
    }
    if let Some(children) = property::complex_children(node) {
        for child in children {
            clear_readonly(&child)?;
        }
    }
    Ok(())
}

fn copy_readonly(resource: &PropertyRef, reference: &PropertyRef) -> Result<(), ScimError> {
    let Some(children) = property::complex_children(resource) else {
        return Ok(());
    };
    for child in children {
        let attr = property::attribute(&child);
        let Some(source) = property::sub_property(reference, &attr.name) else {
            continue;
        };
        if attr.mutability == Mutability::ReadOnly && attr.has_annotation(Annotation::CopyReadOnly) {
            property::copy_value(&child, &source)?;
        } else {
            copy_readonly(&child, &source)?;
        }
    }
    Ok(())
}

fn hash_password(ctx: &mut FilterContext, config: &ScimConfig, resource: &PropertyRef) -> Result<(), ScimError> {
    if ctx.password_already_hashed() {
        return Ok(());
    }
    if let Some(password) = property::sub_property(resource, "password") {
        if let Some(ScalarValue::Str(plaintext)) = property::scalar_value(&password) {
            let hashed = bcrypt::hash(&plaintext, config.bcrypt_cost).map_err(|e| ScimError::Internal(e.to_string()))?;
            property::replace_scalar(&password, ScalarValue::Str(hashed))?;
        }
    }
    ctx.mark_password_hashed();
    Ok(())
}

fn assign_meta(
    ctx: &FilterContext,
    config: &ScimConfig,
    resource: &PropertyRef,
    is_create: bool,
    reference: Option<&PropertyRef>,
) -> Result<(), ScimError> {
    let Some(meta) = property::sub_property(resource, "meta") else {
        return Ok(());
    };

    let resource_type_field = property::sub_property(&meta, "resourceType").expect("meta always carries resourceType");
    property::replace_scalar(&resource_type_field, ScalarValue::Str(ctx.resource_type.name.clone()))?;

    let now = config.clock.now();
    let created = property::sub_property(&meta, "created").expect("meta always carries created");
    if is_create || property::is_unassigned(&created) {
        property::replace_scalar(&created, ScalarValue::DateTime(now))?;
    }

    let last_modified = property::sub_property(&meta, "lastModified").expect("meta always carries lastModified");
    let changed = !is_create && ctx.baseline_hash() != Some(content_hash(resource));
    if is_create || changed {
        property::replace_scalar(&last_modified, ScalarValue::DateTime(now))?;
    } else if let Some(reference) = reference {
        if let Some(reference_last_modified) = property::sub_property(reference, "meta").and_then(|m| property::sub_property(&m, "lastModified")) {
            property::copy_value(&last_modified, &reference_last_modified)?;
        }
    }

    let id = property::sub_property(resource, "id")
        .and_then(|p| property::scalar_value(&p))
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    let location_field = property::sub_property(&meta, "location").expect("meta always carries location");
    let location = format!(
        "{}/{}/{}",
        config.base_url.trim_end_matches('/'),
        ctx.resource_type.endpoint.trim_start_matches('/'),
        id
    );
    property::replace_scalar(&location_field, ScalarValue::Reference(location))?;

    let version_field = property::sub_property(&meta, "version").expect("meta always carries version");
    property::replace_scalar(&version_field, ScalarValue::Str(weak_etag(&id)))?;

    Ok(())
}

fn weak_etag(id: &str) -> String {
    let nonce: u64 = rand::random();
    let mut hasher = Sha1::new();
    hasher.update(id.as_bytes());
    hasher.update(nonce.to_le_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("W/\"{hex}\"")
}

/// `property::hash` short-circuits a complex node to just its `@Identity`
/// children once any exist, which is right for deciding whether two
/// resources name the same entity but wrong here: the root's own `id` is
/// `@Identity`-tagged, so hashing the whole resource would collapse to
/// just the id. This hashes each top-level attribute independently
/// instead (skipping `id`/`meta`, which never reflect submitted content)
/// so a real content change is actually detected.
fn content_hash(resource: &PropertyRef) -> u64 {
    let mut hashes: Vec<u64> = property::complex_children(resource)
        .unwrap_or_default()
        .iter()
        .filter(|child| !matches!(property::attribute(child).name.as_str(), "id" | "meta"))
        .map(property::hash)
        .collect();
    hashes.sort_unstable();
    fxhash::hash64(&hashes)
}

/// Required fields present, mutability honored (immutable values can't
/// change once set, read-only values can't be written by the caller —
/// already enforced upstream by Clear-ReadOnly, checked again here for
/// defense against a stage bypass), and `server`/`global` uniqueness is
/// left to the caller via the persistence layer (this core has no
/// storage handle to query against).
fn validate(resource: &PropertyRef, reference: Option<&PropertyRef>) -> Result<(), ScimError> {
    validate_node(resource, reference)
}

fn validate_node(node: &PropertyRef, reference: Option<&PropertyRef>) -> Result<(), ScimError> {
    let attr = property::attribute(node);
    if attr.required && property::is_unassigned(node) {
        return Err(ScimError::InvalidValue {
            attribute: attr.id.clone(),
            detail: "required attribute is not present".into(),
        });
    }
    if attr.mutability == Mutability::Immutable {
        if let Some(reference) = reference {
            if let Some(reference_value) = property::sub_property(reference, &attr.name) {
                if property::present(&reference_value) && property::present(node) && !property::matches(node, &reference_value) {
                    return Err(ScimError::mutability(attr.id.clone(), "immutable attribute already has a different value"));
                }
            }
        }
    }
    if let Some(children) = property::complex_children(node) {
        for child in children {
            let child_name = property::attribute(&child).name.clone();
            validate_node(&child, reference.and_then(|r| property::sub_property(r, &child_name)).as_ref())?;
        }
    }
    if let Some(elements) = property::elements(node) {
        for element in elements {
            validate_node(&element, None)?;
        }
    }
    Ok(())
}
