//! Serializes a property tree back to JSON, honoring the attribute's
//! `returned` setting and the caller's attributes/excludedAttributes
//! projection (RFC 7644 §3.9).

use serde_json::Value as Json;

use crate::model::Returned;
use crate::tree::property::{self, PropertyRef};

/// Inclusion (`attributes`) and exclusion (`excludedAttributes`) path
/// lists from a request, matched against attribute ids by prefix.
#[derive(Debug, Clone, Default)]
pub struct Projection {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl Projection {
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        Projection { include, exclude }
    }

    fn included(&self, id: &str) -> bool {
        self.include.is_empty() || self.include.iter().any(|p| path_matches(p, id))
    }

    fn excluded(&self, id: &str) -> bool {
        self.exclude.iter().any(|p| path_matches(p, id))
    }
}

fn path_matches(projected: &str, attribute_id: &str) -> bool {
    attribute_id.eq_ignore_ascii_case(projected) || attribute_id.to_lowercase().starts_with(&format!("{}.", projected.to_lowercase()))
}

/// Serializes `root` under `projection`. Returns `Json::Null` in the (only
/// reachable at the top level) case the root itself is suppressed.
pub fn serialize(root: &PropertyRef, projection: &Projection) -> Json {
    serialize_node(root, projection).unwrap_or(Json::Null)
}

fn serialize_node(node: &PropertyRef, projection: &Projection) -> Option<Json> {
    let attr = property::attribute(node);

    if attr.mutability == crate::model::Mutability::WriteOnly {
        return None;
    }

    let emit = match attr.returned {
        Returned::Always => true,
        Returned::Never => false,
        Returned::Request => projection.include.iter().any(|p| path_matches(p, &attr.id)),
        Returned::Default => {
            !projection.excluded(&attr.id) && projection.included(&attr.id) && property::present(node)
        }
    };
    if !emit {
        return None;
    }

    if let Some(children) = property::complex_children(node) {
        let mut map = serde_json::Map::new();
        for child in children {
            let name = property::attribute(&child).name.clone();
            if let Some(value) = serialize_node(&child, projection) {
                map.insert(name, value);
            }
        }
        if map.is_empty() {
            return None;
        }
        return Some(Json::Object(map));
    }

    if let Some(elements) = property::elements(node) {
        let items: Vec<Json> = elements
            .iter()
            .filter_map(|e| serialize_node(e, projection))
            .collect();
        if items.is_empty() {
            return None;
        }
        return Some(Json::Array(items));
    }

    Some(property::raw(node))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::DataType;
    use crate::tree::property::{construct_root, replace_scalar, sub_property, ScalarValue};

    fn root_with_fields() -> PropertyRef {
        let attr = crate::model::Attribute::complex(
            "test:User",
            "User",
            vec![
                crate::model::Attribute::scalar("test:userName", "userName", DataType::String),
                crate::model::Attribute::scalar("test:password", "password", DataType::String)
                    .mutability(crate::model::Mutability::WriteOnly)
                    .returned(Returned::Never),
                crate::model::Attribute::scalar("test:id", "id", DataType::String).returned(Returned::Always),
            ],
        );
        construct_root(attr)
    }

    #[test]
    fn write_only_and_never_returned_are_always_suppressed() {
        let root = root_with_fields();
        replace_scalar(&sub_property(&root, "userName").unwrap(), ScalarValue::Str("jdoe".into())).unwrap();
        replace_scalar(&sub_property(&root, "password").unwrap(), ScalarValue::Str("secret".into())).unwrap();
        replace_scalar(&sub_property(&root, "id").unwrap(), ScalarValue::Str("1".into())).unwrap();

        let json = serialize(&root, &Projection::default());
        assert_eq!(json["userName"], serde_json::json!("jdoe"));
        assert_eq!(json["id"], serde_json::json!("1"));
        assert!(json.get("password").is_none());
    }

    #[test]
    fn unassigned_default_attribute_is_omitted() {
        let root = root_with_fields();
        replace_scalar(&sub_property(&root, "id").unwrap(), ScalarValue::Str("1".into())).unwrap();
        let json = serialize(&root, &Projection::default());
        assert!(json.get("userName").is_none());
    }

    #[test]
    fn inclusion_list_restricts_to_named_attributes() {
        let root = root_with_fields();
        replace_scalar(&sub_property(&root, "userName").unwrap(), ScalarValue::Str("jdoe".into())).unwrap();
        replace_scalar(&sub_property(&root, "id").unwrap(), ScalarValue::Str("1".into())).unwrap();

        let projection = Projection::new(vec!["userName".into()], vec![]);
        let json = serialize(&root, &projection);
        assert_eq!(json["userName"], serde_json::json!("jdoe"));
        // `id` is `Returned::Always`, so it's emitted regardless of the inclusion list.
        assert_eq!(json["id"], serde_json::json!("1"));
    }

    #[test]
    fn exclusion_list_suppresses_named_attribute() {
        let root = root_with_fields();
        replace_scalar(&sub_property(&root, "userName").unwrap(), ScalarValue::Str("jdoe".into())).unwrap();

        let projection = Projection::new(vec![], vec!["userName".into()]);
        let json = serialize(&root, &projection);
        assert!(json.get("userName").is_none());
    }
}
