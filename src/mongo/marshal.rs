//! Resource ↔ BSON marshaling. The marshaler walks the property tree
//! depth-first, writing each leaf under its `mongoName`; the unmarshaler
//! does the reverse, matching each BSON key to a sub-attribute by name or
//! by its metadata alias.

use bson::{Binary, Bson, Document};
use bson::spec::BinarySubtype;

use crate::model::DataType;
use crate::tree::property::{self, PropertyRef, ScalarValue};
use crate::utils::error::ScimError;

use super::meta::MetadataHub;

pub fn marshal(node: &PropertyRef, hub: &MetadataHub) -> Bson {
    if let Some(children) = property::complex_children(node) {
        let mut doc = Document::new();
        for child in children {
            if property::is_unassigned(&child) {
                continue;
            }
            let attr = property::attribute(&child);
            let key = hub.mongo_name_for(&attr.id, &attr.name).to_string();
            doc.insert(key, marshal(&child, hub));
        }
        return Bson::Document(doc);
    }
    if let Some(elements) = property::elements(node) {
        return Bson::Array(elements.iter().map(|e| marshal(e, hub)).collect());
    }
    match property::scalar_value(node) {
        None => Bson::Null,
        Some(value) => scalar_to_bson(&value),
    }
}

fn scalar_to_bson(value: &ScalarValue) -> Bson {
    match value {
        ScalarValue::Str(s) | ScalarValue::Reference(s) => Bson::String(s.clone()),
        ScalarValue::Int(i) => Bson::Int64(*i),
        ScalarValue::Decimal(d) => Bson::Double(*d),
        ScalarValue::Bool(b) => Bson::Boolean(*b),
        ScalarValue::DateTime(dt) => Bson::DateTime(bson::DateTime::from_millis(
            dt.unix_timestamp() * 1000 + i64::from(dt.millisecond()),
        )),
        ScalarValue::Binary(bytes) => Bson::Binary(Binary {
            subtype: BinarySubtype::Generic,
            bytes: bytes.clone(),
        }),
    }
}

pub fn unmarshal(target: &PropertyRef, doc: &Document, hub: &MetadataHub) -> Result<(), ScimError> {
    let children = property::complex_children(target).ok_or_else(|| {
        ScimError::InvalidValue {
            attribute: property::attribute(target).id,
            detail: "expected a complex property for a BSON document".into(),
        }
    })?;
    for (key, value) in doc {
        if let Some(child) = children.iter().find(|c| matches_key(c, key, hub)) {
            unmarshal_value(child, value)?;
        }
    }
    Ok(())
}

fn matches_key(child: &PropertyRef, key: &str, hub: &MetadataHub) -> bool {
    let attr = property::attribute(child);
    attr.name.eq_ignore_ascii_case(key) || hub.mongo_name_for(&attr.id, &attr.name) == key
}

fn unmarshal_value(target: &PropertyRef, value: &Bson) -> Result<(), ScimError> {
    if matches!(value, Bson::Null) {
        return property::delete(target);
    }

    let attr = property::attribute(target);

    if attr.multi_valued {
        let Bson::Array(items) = value else {
            return Err(ScimError::invalid_value(attr.id.clone(), "expected a BSON array"));
        };
        property::delete(target)?;
        for item in items {
            let element = property::push_element(target)?;
            unmarshal_value(&element, item)?;
        }
        return Ok(());
    }

    match (attr.r#type, value) {
        (DataType::Complex, Bson::Document(doc)) => {
            // `unmarshal` expects a pre-built hub for alias lookups; reuse
            // the same logic by matching on name only here, since nested
            // complexes rarely carry their own aliases distinct from their
            // parent's.
            for (key, inner) in doc {
                if let Some(child) = property::sub_property(target, key) {
                    unmarshal_value(&child, inner)?;
                }
            }
            Ok(())
        }
        (DataType::Boolean, Bson::Boolean(b)) => property::replace_scalar(target, ScalarValue::Bool(*b)),
        (DataType::Integer, Bson::Int64(i)) => property::replace_scalar(target, ScalarValue::Int(*i)),
        (DataType::Integer, Bson::Int32(i)) => property::replace_scalar(target, ScalarValue::Int(i64::from(*i))),
        (DataType::Decimal, Bson::Double(d)) => property::replace_scalar(target, ScalarValue::Decimal(*d)),
        (DataType::DateTime, Bson::DateTime(dt)) => {
            let odt = time::OffsetDateTime::from_unix_timestamp(dt.timestamp_millis() / 1000)
                .map_err(|e| ScimError::invalid_value(attr.id.clone(), e))?;
            property::replace_scalar(target, ScalarValue::DateTime(odt))
        }
        (DataType::Binary, Bson::Binary(b)) => property::replace_scalar(target, ScalarValue::Binary(b.bytes.clone())),
        (DataType::Reference, Bson::String(s)) => property::replace_scalar(target, ScalarValue::Reference(s.clone())),
        (DataType::String, Bson::String(s)) => property::replace_scalar(target, ScalarValue::Str(s.clone())),
        _ => Err(ScimError::invalid_value(attr.id.clone(), format!("BSON type mismatch for {:?}", attr.r#type))),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::Attribute;
    use crate::tree::property::{construct_root, replace_scalar};

    fn simple_user() -> Attribute {
        Attribute::complex(
            "test:User",
            "User",
            vec![Attribute::scalar("test:userName", "userName", DataType::String)],
        )
    }

    #[test]
    fn marshal_then_unmarshal_round_trips_a_scalar_field() {
        let hub = MetadataHub::new();
        let root = construct_root(simple_user());
        replace_scalar(&property::sub_property(&root, "userName").unwrap(), ScalarValue::Str("jdoe".into())).unwrap();

        let Bson::Document(doc) = marshal(&root, &hub) else {
            panic!("expected a document");
        };
        assert_eq!(doc.get_str("userName").unwrap(), "jdoe");

        let restored = construct_root(simple_user());
        unmarshal(&restored, &doc, &hub).unwrap();
        assert_eq!(
            property::scalar_value(&property::sub_property(&restored, "userName").unwrap()),
            Some(ScalarValue::Str("jdoe".into()))
        );
    }

    #[test]
    fn unmarshal_resolves_aliased_field_by_mongo_name() {
        let mut hub = MetadataHub::new();
        hub.register("test:userName", "un", "un");
        let mut doc = Document::new();
        doc.insert("un", "jdoe");

        let restored = construct_root(simple_user());
        unmarshal(&restored, &doc, &hub).unwrap();
        assert_eq!(
            property::scalar_value(&property::sub_property(&restored, "userName").unwrap()),
            Some(ScalarValue::Str("jdoe".into()))
        );
    }
}
