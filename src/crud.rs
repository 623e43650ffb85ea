//! PATCH operators (`add`/`replace`/`remove`, RFC 7644 §3.5.2) over a
//! resource's property tree. Path traversal reuses the exact fan-out and
//! embedded-filter rules the filter evaluator already implements —
//! `Add`/`Replace`/`Delete` all compile their path and hand it to
//! `expr::resolve`, which fans across multiValued segments and narrows by
//! an embedded `[filter]` the same way a query filter does.

use serde::Deserialize;
use serde_json::Value as Json;

use crate::expr::{self, Compiler};
use crate::json;
use crate::tree::property::{self, PropertyRef};
use crate::utils::error::ScimError;

/// One operation within a `PatchOp` body (RFC 7644 §3.5.2).
#[derive(Debug, Clone, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub value: Option<Json>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Replace,
    Remove,
}

/// The full `PatchOp` request body. `schemas` is parsed but not
/// otherwise enforced — the envelope is well known enough that
/// validating its one fixed URN buys little.
#[derive(Debug, Clone, Deserialize)]
pub struct PatchRequest {
    #[serde(default)]
    pub schemas: Vec<String>,
    #[serde(rename = "Operations")]
    pub operations: Vec<PatchOperation>,
}

/// Applies every operation in `request` against `root` in order.
/// `remove` requires `path` and rejects `value`; `add`/`replace` require
/// `value`.
pub fn apply_patch(root: &PropertyRef, compiler: &Compiler, request: &PatchRequest) -> Result<(), ScimError> {
    for operation in &request.operations {
        match operation.op {
            PatchOp::Remove => {
                if operation.value.is_some() {
                    return Err(ScimError::InvalidRequest("remove must not carry a value".into()));
                }
                delete(root, compiler, operation.path.as_deref())?;
            }
            PatchOp::Add | PatchOp::Replace => {
                let value = operation
                    .value
                    .as_ref()
                    .ok_or_else(|| ScimError::InvalidRequest(format!("{:?} requires a value", operation.op)))?;
                match operation.op {
                    PatchOp::Add => add(root, compiler, operation.path.as_deref(), value)?,
                    PatchOp::Replace => replace(root, compiler, operation.path.as_deref(), value)?,
                    PatchOp::Remove => unreachable!(),
                }
            }
        }
    }
    Ok(())
}

/// `add` merges `value` into the resource (no path) or the path's target:
/// appended-with-dedup for a multiValued target, merged-by-name for a
/// complex one, replaced for a scalar one.
pub fn add(root: &PropertyRef, compiler: &Compiler, path: Option<&str>, value: &Json) -> Result<(), ScimError> {
    for_each_target(root, compiler, path, |target| apply_add(target, value))
}

/// `replace` fully overwrites the resource (no path) or the path's target.
pub fn replace(root: &PropertyRef, compiler: &Compiler, path: Option<&str>, value: &Json) -> Result<(), ScimError> {
    for_each_target(root, compiler, path, |target| json::assign_value(target, value))
}

/// `remove` unassigns the path's target. A `remove` with no path is
/// invalid: RFC 7644 requires a path for this operation.
pub fn delete(root: &PropertyRef, compiler: &Compiler, path: Option<&str>) -> Result<(), ScimError> {
    let Some(path) = path else {
        return Err(ScimError::InvalidPath("remove requires a path".into()));
    };
    for_each_target(root, compiler, Some(path), property::delete)
}

fn for_each_target(
    root: &PropertyRef,
    compiler: &Compiler,
    path: Option<&str>,
    mutate: impl Fn(&PropertyRef) -> Result<(), ScimError>,
) -> Result<(), ScimError> {
    match path {
        None => mutate(root),
        Some(path) => {
            let segment = compiler.compile_path(path)?;
            let targets = expr::resolve(root, &segment)?;
            for target in &targets {
                mutate(target)?;
            }
            Ok(())
        }
    }
}

fn apply_add(target: &PropertyRef, value: &Json) -> Result<(), ScimError> {
    let attr = property::attribute(target);
    if !attr.multi_valued {
        return json::assign_value(target, value);
    }
    let items: Vec<Json> = match value {
        Json::Array(items) => items.clone(),
        single => vec![single.clone()],
    };
    for item in items {
        property::add_element(target, |element| json::assign_value(element, &item))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{Attribute, DataType};
    use crate::tree::property::{construct_root, raw};

    fn user_root() -> PropertyRef {
        let emails = Attribute::complex(
            "test:emails",
            "emails",
            vec![
                Attribute::scalar("test:emails.value", "value", DataType::String),
                Attribute::scalar("test:emails.type", "type", DataType::String),
                Attribute::scalar("test:emails.primary", "primary", DataType::Boolean),
            ],
        )
        .multi_valued();
        let name = Attribute::complex(
            "test:name",
            "name",
            vec![Attribute::scalar("test:name.givenName", "givenName", DataType::String)],
        );
        let root = Attribute::complex("test:User", "User", vec![name, emails]);
        construct_root(root)
    }

    #[test]
    fn replace_without_path_merges_into_resource_root() {
        let root = user_root();
        replace(&root, &Compiler::new(), None, &serde_json::json!({"name": {"givenName": "Ada"}})).unwrap();
        assert_eq!(raw(&property::sub_property(&root, "name").unwrap())["givenName"], serde_json::json!("Ada"));
    }

    #[test]
    fn add_on_multi_valued_appends_without_clearing_existing() {
        let root = user_root();
        let compiler = Compiler::new();
        add(&root, &compiler, Some("emails"), &serde_json::json!({"value": "a@b", "type": "work"})).unwrap();
        add(&root, &compiler, Some("emails"), &serde_json::json!({"value": "c@d", "type": "home"})).unwrap();
        let emails = property::sub_property(&root, "emails").unwrap();
        assert_eq!(property::elements(&emails).unwrap().len(), 2);
    }

    #[test]
    fn replace_on_multi_valued_clears_existing_elements_first() {
        let root = user_root();
        let compiler = Compiler::new();
        add(&root, &compiler, Some("emails"), &serde_json::json!({"value": "a@b"})).unwrap();
        replace(&root, &compiler, Some("emails"), &serde_json::json!([{"value": "c@d"}])).unwrap();
        let emails = property::sub_property(&root, "emails").unwrap();
        let elements = property::elements(&emails).unwrap();
        assert_eq!(elements.len(), 1);
        assert_eq!(raw(&elements[0])["value"], serde_json::json!("c@d"));
    }

    #[test]
    fn delete_with_embedded_filter_removes_only_matching_elements() {
        let root = user_root();
        let compiler = Compiler::new();
        add(&root, &compiler, Some("emails"), &serde_json::json!({"value": "a@b", "type": "work"})).unwrap();
        add(&root, &compiler, Some("emails"), &serde_json::json!({"value": "c@d", "type": "home"})).unwrap();

        delete(&root, &compiler, Some(r#"emails[type eq "work"]"#)).unwrap();

        let emails = property::sub_property(&root, "emails").unwrap();
        let remaining = property::elements(&emails).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(raw(&remaining[0])["type"], serde_json::json!("home"));
    }

    #[test]
    fn apply_patch_runs_operations_in_order() {
        let root = user_root();
        let compiler = Compiler::new();
        let request: PatchRequest = serde_json::from_value(serde_json::json!({
            "schemas": ["urn:ietf:params:scim:api:messages:2.0:PatchOp"],
            "Operations": [
                {"op": "add", "path": "name.givenName", "value": "Ada"},
                {"op": "add", "path": "emails", "value": {"value": "a@b", "type": "work"}},
                {"op": "remove", "path": "emails[type eq \"work\"]"},
            ]
        }))
        .unwrap();

        apply_patch(&root, &compiler, &request).unwrap();

        assert_eq!(raw(&property::sub_property(&root, "name").unwrap())["givenName"], serde_json::json!("Ada"));
        let emails = property::sub_property(&root, "emails").unwrap();
        assert_eq!(property::elements(&emails).unwrap().len(), 0);
    }

    #[test]
    fn apply_patch_rejects_remove_with_value() {
        let root = user_root();
        let compiler = Compiler::new();
        let request: PatchRequest = serde_json::from_value(serde_json::json!({
            "Operations": [{"op": "remove", "path": "emails", "value": "x"}]
        }))
        .unwrap();
        let err = apply_patch(&root, &compiler, &request).unwrap_err();
        assert!(matches!(err, ScimError::InvalidRequest(_)));
    }

    #[test]
    fn apply_patch_rejects_add_without_value() {
        let root = user_root();
        let compiler = Compiler::new();
        let request: PatchRequest = serde_json::from_value(serde_json::json!({
            "Operations": [{"op": "add", "path": "emails"}]
        }))
        .unwrap();
        let err = apply_patch(&root, &compiler, &request).unwrap_err();
        assert!(matches!(err, ScimError::InvalidRequest(_)));
    }

    #[test]
    fn delete_without_path_is_invalid() {
        let root = user_root();
        let err = delete(&root, &Compiler::new(), None).unwrap_err();
        assert!(matches!(err, ScimError::InvalidPath(_)));
    }
}
