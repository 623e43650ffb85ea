//! Streaming-in-spirit JSON deserializer: walks the resource tree in
//! lock-step with the parsed `serde_json::Value`, dispatching on the
//! focused property's attribute type. `null` deletes and marks the
//! property touched, distinguishing an explicit null from "never
//! assigned" for PATCH semantics.

use serde_json::Value as Json;
use time::format_description::well_known::Rfc3339;
use time::PrimitiveDateTime;

use crate::model::DataType;
use crate::tree::property::{self, PropertyRef, ScalarValue};
use crate::utils::error::ScimError;

/// Populates `root` (freshly constructed, all-unassigned) from a whole
/// resource document.
pub fn deserialize(root: &PropertyRef, json: &Json) -> Result<(), ScimError> {
    assign_complex(root, json)
}

fn assign_complex(target: &PropertyRef, json: &Json) -> Result<(), ScimError> {
    let Json::Object(map) = json else {
        return Err(ScimError::InvalidSyntax(format!(
            "expected a JSON object for {}",
            property::attribute(target).id
        )));
    };
    for (key, value) in map {
        // Unrecognized attributes are ignored rather than rejected, per
        // the usual SCIM server posture toward unknown extensions.
        if let Some(sub) = property::sub_property(target, key) {
            assign_value(&sub, value)?;
        }
    }
    Ok(())
}

/// Assigns one JSON value to `target`, recursing for objects/arrays.
pub fn assign_value(target: &PropertyRef, value: &Json) -> Result<(), ScimError> {
    if value.is_null() {
        return property::delete(target);
    }

    let attr = property::attribute(target);

    if attr.multi_valued {
        let Json::Array(items) = value else {
            return Err(ScimError::invalid_value(attr.id.clone(), "expected a JSON array"));
        };
        property::delete(target)?;
        for item in items {
            let element = property::push_element(target)?;
            assign_value(&element, item)?;
        }
        return Ok(());
    }

    match attr.r#type {
        DataType::Complex => assign_complex(target, value),
        DataType::Boolean => {
            let Json::Bool(b) = value else {
                return Err(ScimError::invalid_value(attr.id.clone(), "expected a JSON boolean"));
            };
            property::replace_scalar(target, ScalarValue::Bool(*b))
        }
        DataType::Integer => {
            let Json::Number(n) = value else {
                return Err(ScimError::invalid_value(attr.id.clone(), "expected a JSON number"));
            };
            let i = n
                .as_i64()
                .ok_or_else(|| ScimError::invalid_value(attr.id.clone(), "expected an integer, found a decimal"))?;
            property::replace_scalar(target, ScalarValue::Int(i))
        }
        DataType::Decimal => {
            let Json::Number(n) = value else {
                return Err(ScimError::invalid_value(attr.id.clone(), "expected a JSON number"));
            };
            let d = n
                .as_f64()
                .ok_or_else(|| ScimError::invalid_value(attr.id.clone(), "not representable as f64"))?;
            property::replace_scalar(target, ScalarValue::Decimal(d))
        }
        DataType::DateTime => {
            let Json::String(s) = value else {
                return Err(ScimError::invalid_value(attr.id.clone(), "expected a JSON string"));
            };
            property::replace_scalar(target, ScalarValue::DateTime(parse_datetime(&attr.id, s)?))
        }
        DataType::Binary => {
            let Json::String(s) = value else {
                return Err(ScimError::invalid_value(attr.id.clone(), "expected a JSON string"));
            };
            property::replace_scalar(target, ScalarValue::Binary(property::base64_decode(s)?))
        }
        DataType::Reference => {
            let Json::String(s) = value else {
                return Err(ScimError::invalid_value(attr.id.clone(), "expected a JSON string"));
            };
            property::replace_scalar(target, ScalarValue::Reference(s.clone()))
        }
        DataType::String => {
            let Json::String(s) = value else {
                return Err(ScimError::invalid_value(attr.id.clone(), "expected a JSON string"));
            };
            property::replace_scalar(target, ScalarValue::Str(s.clone()))
        }
    }
}

fn parse_datetime(attribute_id: &str, s: &str) -> Result<time::OffsetDateTime, ScimError> {
    if let Ok(dt) = time::OffsetDateTime::parse(s, &Rfc3339) {
        return Ok(dt);
    }
    // RFC 7643's `2006-01-02T15:04:05` form carries no zone; treat it as UTC.
    let format = time::macros::format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    PrimitiveDateTime::parse(s, &format)
        .map(|dt| dt.assume_utc())
        .map_err(|e| ScimError::invalid_value(attribute_id.to_string(), format!("not a valid dateTime: {e}")))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{Attribute, DataType};
    use crate::tree::property::{construct_root, elements, is_unassigned, raw, sub_property};

    fn user_attribute() -> Attribute {
        Attribute::complex(
            "test:User",
            "User",
            vec![
                Attribute::scalar("test:userName", "userName", DataType::String).required(),
                Attribute::scalar("test:active", "active", DataType::Boolean),
                Attribute::complex(
                    "test:emails",
                    "emails",
                    vec![
                        Attribute::scalar("test:emails.value", "value", DataType::String),
                        Attribute::scalar("test:emails.primary", "primary", DataType::Boolean),
                    ],
                )
                .multi_valued(),
            ],
        )
    }

    #[test]
    fn deserialize_populates_scalars_and_multi_valued_elements() {
        let root = construct_root(user_attribute());
        let json = serde_json::json!({
            "userName": "jdoe",
            "active": true,
            "emails": [
                {"value": "a@b", "primary": true},
                {"value": "c@d", "primary": false},
            ],
        });
        deserialize(&root, &json).unwrap();

        assert_eq!(raw(&sub_property(&root, "userName").unwrap()), serde_json::json!("jdoe"));
        assert_eq!(elements(&sub_property(&root, "emails").unwrap()).unwrap().len(), 2);
    }

    #[test]
    fn null_deletes_and_marks_touched() {
        let root = construct_root(user_attribute());
        deserialize(&root, &serde_json::json!({"userName": "jdoe"})).unwrap();
        let user_name = sub_property(&root, "userName").unwrap();
        assign_value(&user_name, &Json::Null).unwrap();
        assert!(is_unassigned(&user_name));
        assert!(property::is_touched(&user_name));
    }

    #[test]
    fn integer_typed_field_rejects_decimal_input() {
        let attr = Attribute::complex(
            "test:Resource",
            "Resource",
            vec![Attribute::scalar("test:count", "count", DataType::Integer)],
        );
        let root = construct_root(attr);
        let count = sub_property(&root, "count").unwrap();
        let err = assign_value(&count, &serde_json::json!(1.5)).unwrap_err();
        assert!(matches!(err, ScimError::InvalidValue { .. }));
    }
}
