//! Translates a compiled filter AST into a BSON query document.
//!
//! Path resolution walks the same `Attribute` tree the property tree was
//! built from (rather than a live `PropertyRef`, since there's no resource
//! in scope at query time) and tracks the closest multiValued ancestor on
//! the path: everything from there to the leaf becomes the `$elemMatch`
//! sub-document, everything before it becomes dotted prefix. A second
//! multiValued hop nested inside the first is treated as a plain dotted
//! path inside the outer `$elemMatch` rather than getting its own nested
//! `$elemMatch` — correct for the common single-array-hop filters RFC
//! 7644 examples use, an approximation for doubly-nested ones.

use bson::{Bson, Document};

use crate::expr::ast::{Literal, Node, PathSegment, RelOp};
use crate::model::{Attribute, DataType};
use crate::utils::error::ScimError;

use super::meta::MetadataHub;

pub fn translate(node: &Node, root: &Attribute, hub: &MetadataHub) -> Result<Document, ScimError> {
    tracing::trace!(resource_type = %root.name, "translating filter node to bson");
    match node {
        Node::And(l, r) => Ok(combine("$and", translate(l, root, hub)?, translate(r, root, hub)?)),
        Node::Or(l, r) => Ok(combine("$or", translate(l, root, hub)?, translate(r, root, hub)?)),
        Node::Not(inner) => {
            let mut doc = Document::new();
            doc.insert("$nor", Bson::Array(vec![Bson::Document(translate(inner, root, hub)?)]));
            Ok(doc)
        }
        Node::Relational { path, op, literal } => relational(path, *op, literal.as_ref(), root, hub),
    }
}

fn combine(key: &str, l: Document, r: Document) -> Document {
    let mut doc = Document::new();
    doc.insert(key, Bson::Array(vec![Bson::Document(l), Bson::Document(r)]));
    doc
}

struct Resolved {
    leaf: Attribute,
    mongo_path: String,
    /// `(elemMatch container's mongo name, path relative to one element)`
    elem_match: Option<(String, String)>,
}

fn resolve_path(focus: &Attribute, segment: &PathSegment, hub: &MetadataHub) -> Result<Resolved, ScimError> {
    let (scope, name) = strip_urn_prefix(focus, &segment.name);
    let attr = scope
        .sub_attribute(&name)
        .cloned()
        .ok_or_else(|| ScimError::NoTarget(format!("no such attribute '{name}'")))?;
    let mongo_name = hub.mongo_name_for(&attr.id, &attr.name).to_string();

    match &segment.next {
        None => Ok(Resolved {
            leaf: attr.clone(),
            mongo_path: mongo_name.clone(),
            elem_match: if attr.multi_valued { Some((mongo_name, String::new())) } else { None },
        }),
        Some(next) => {
            let inner = resolve_path(&attr, next, hub)?;
            let mongo_path = format!("{mongo_name}.{}", inner.mongo_path);
            let elem_match = if attr.multi_valued {
                Some((mongo_name, inner.mongo_path.clone()))
            } else {
                inner.elem_match.map(|(container, rel)| (format!("{mongo_name}.{container}"), rel))
            };
            Ok(Resolved { leaf: inner.leaf, mongo_path, elem_match })
        }
    }
}

/// A leading `urn:...:Schema:attr` segment skips the hop when it names
/// the resource's own core schema, the static-metadata analogue of
/// `expr::strip_urn_prefix`.
fn strip_urn_prefix<'a>(focus: &'a Attribute, name: &'a str) -> (&'a Attribute, String) {
    if let Some((urn, attr)) = name.rsplit_once(':') {
        if urn.starts_with("urn:") {
            if let Some(root) = focus.sub_attribute(urn) {
                return (root, attr.to_string());
            }
            return (focus, attr.to_string());
        }
    }
    (focus, name.to_string())
}

fn relational(path: &PathSegment, op: RelOp, literal: Option<&Literal>, root: &Attribute, hub: &MetadataHub) -> Result<Document, ScimError> {
    let resolved = resolve_path(root, path, hub).map_err(|err| {
        tracing::warn!(path = %path.name, error = %err, "mongo filter path resolution failed");
        err
    })?;

    if op == RelOp::Pr {
        let presence = presence_condition(&resolved.leaf);
        return Ok(match resolved.elem_match {
            Some((container, relative)) if relative.is_empty() => {
                // `pr` on the multiValued container itself: non-empty array.
                single(&container, non_empty_array_condition())
            }
            Some((container, relative)) => single(&container, elem_match(&relative, presence)),
            None => single(&resolved.mongo_path, presence),
        });
    }

    let literal = literal.expect("binary relational op always carries a literal");
    let operator = binary_operator(&resolved.leaf, op, literal)?;
    Ok(match resolved.elem_match {
        Some((container, relative)) if relative.is_empty() => single(&container, operator),
        Some((container, relative)) => single(&container, elem_match(&relative, operator)),
        None => single(&resolved.mongo_path, operator),
    })
}

fn single(key: &str, value: Document) -> Document {
    let mut doc = Document::new();
    doc.insert(key, Bson::Document(value));
    doc
}

fn elem_match(relative_path: &str, inner: Document) -> Document {
    let mut field = Document::new();
    field.insert(relative_path, Bson::Document(inner));
    let mut doc = Document::new();
    doc.insert("$elemMatch", Bson::Document(field));
    doc
}

/// `pr` requires `$exists ∧ $ne:null ∧` a type-appropriate non-empty
/// check. The type-appropriate check and the null check both constrain
/// the same value, so they're expressed as one `$nin` rather than two
/// `$ne` keys clobbering each other in the same operator document.
fn presence_condition(attr: &Attribute) -> Document {
    let mut doc = Document::new();
    doc.insert("$exists", Bson::Boolean(true));
    match attr.r#type {
        DataType::String | DataType::Reference | DataType::Binary => {
            doc.insert("$nin", Bson::Array(vec![Bson::Null, Bson::String(String::new())]));
        }
        DataType::Complex => {
            doc.insert("$nin", Bson::Array(vec![Bson::Null, Bson::Document(Document::new())]));
        }
        _ => {
            doc.insert("$ne", Bson::Null);
        }
    }
    doc
}

fn non_empty_array_condition() -> Document {
    let mut size = Document::new();
    size.insert("$size", Bson::Int32(0));
    let mut not = Document::new();
    not.insert("$not", Bson::Document(size));
    let mut doc = Document::new();
    doc.insert("$exists", Bson::Boolean(true));
    doc.insert("$ne", Bson::Null);
    doc.extend(not);
    doc
}

fn binary_operator(attr: &Attribute, op: RelOp, literal: &Literal) -> Result<Document, ScimError> {
    let mut doc = Document::new();
    if matches!(op, RelOp::Eq | RelOp::Ne) && matches!(attr.r#type, DataType::String | DataType::Reference) {
        if !attr.case_exact {
            let value = literal_as_str(literal, attr)?;
            let pattern = if op == RelOp::Eq {
                format!("^{}$", regex::escape(&value))
            } else {
                format!("^((?!{}$).)", regex::escape(&value))
            };
            doc.insert("$regex", Bson::String(pattern));
            doc.insert("$options", Bson::String("i".into()));
            return Ok(doc);
        }
        let value = literal_to_bson(attr, literal)?;
        doc.insert(if op == RelOp::Eq { "$eq" } else { "$ne" }, value);
        return Ok(doc);
    }

    match op {
        RelOp::Eq => {
            doc.insert("$eq", literal_to_bson(attr, literal)?);
        }
        RelOp::Ne => {
            doc.insert("$ne", literal_to_bson(attr, literal)?);
        }
        RelOp::Gt => {
            doc.insert("$gt", literal_to_bson(attr, literal)?);
        }
        RelOp::Ge => {
            doc.insert("$gte", literal_to_bson(attr, literal)?);
        }
        RelOp::Lt => {
            doc.insert("$lt", literal_to_bson(attr, literal)?);
        }
        RelOp::Le => {
            doc.insert("$lte", literal_to_bson(attr, literal)?);
        }
        RelOp::Sw | RelOp::Ew | RelOp::Co => {
            let value = literal_as_str(literal, attr)?;
            let pattern = match op {
                RelOp::Sw => format!("^{}", regex::escape(&value)),
                RelOp::Ew => format!("{}$", regex::escape(&value)),
                RelOp::Co => regex::escape(&value),
                _ => unreachable!(),
            };
            doc.insert("$regex", Bson::String(pattern));
            if !attr.case_exact {
                doc.insert("$options", Bson::String("i".into()));
            }
        }
        RelOp::Pr => unreachable!("pr is handled before reaching binary_operator"),
    }
    Ok(doc)
}

fn literal_as_str(literal: &Literal, attr: &Attribute) -> Result<String, ScimError> {
    match literal {
        Literal::Str(s) => Ok(s.clone()),
        _ => Err(ScimError::InvalidFilter(format!("expected a string literal for {}", attr.id))),
    }
}

fn literal_to_bson(attr: &Attribute, literal: &Literal) -> Result<Bson, ScimError> {
    Ok(match (attr.r#type, literal) {
        (DataType::String | DataType::Reference | DataType::Binary, Literal::Str(s)) => Bson::String(s.clone()),
        (DataType::Boolean, Literal::Bool(b)) => Bson::Boolean(*b),
        (DataType::Integer, Literal::Int(i)) => Bson::Int64(*i),
        (DataType::Decimal, Literal::Decimal(d)) => Bson::Double(*d),
        (DataType::Decimal, Literal::Int(i)) => Bson::Double(*i as f64),
        (DataType::DateTime, Literal::Str(s)) => {
            let parsed = time::OffsetDateTime::parse(s, &time::format_description::well_known::Rfc3339)
                .map_err(|e| ScimError::InvalidFilter(format!("not a valid dateTime literal: {e}")))?;
            Bson::DateTime(bson::DateTime::from_millis(parsed.unix_timestamp() * 1000))
        }
        _ => return Err(ScimError::InvalidFilter(format!("literal type mismatch for {}", attr.id))),
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::expr::Compiler;
    use crate::model::DataType;

    fn user_attr() -> Attribute {
        let emails = Attribute::complex(
            "test:emails",
            "emails",
            vec![
                Attribute::scalar("test:emails.value", "value", DataType::String),
                Attribute::scalar("test:emails.type", "type", DataType::String),
            ],
        )
        .multi_valued();
        Attribute::complex(
            "test:User",
            "User",
            vec![Attribute::scalar("test:userName", "userName", DataType::String), emails],
        )
    }

    fn compile(src: &str) -> Node {
        Compiler::new().compile(src).unwrap()
    }

    #[test]
    fn case_insensitive_eq_on_string_becomes_anchored_regex() {
        let node = compile(r#"userName eq "jdoe""#);
        let doc = translate(&node, &user_attr(), &MetadataHub::new()).unwrap();
        let inner = doc.get_document("userName").unwrap();
        assert_eq!(inner.get_str("$regex").unwrap(), "^jdoe$");
        assert_eq!(inner.get_str("$options").unwrap(), "i");
    }

    #[test]
    fn nested_multi_valued_path_wraps_in_elem_match() {
        let node = compile(r#"emails.value eq "a@b""#);
        let doc = translate(&node, &user_attr(), &MetadataHub::new()).unwrap();
        let emails = doc.get_document("emails").unwrap();
        let elem_match = emails.get_document("$elemMatch").unwrap();
        assert!(elem_match.contains_key("value"));
    }

    #[test]
    fn presence_on_multi_valued_container_checks_non_empty_array() {
        let node = compile("emails pr");
        let doc = translate(&node, &user_attr(), &MetadataHub::new()).unwrap();
        let emails = doc.get_document("emails").unwrap();
        assert_eq!(emails.get_bool("$exists").unwrap(), true);
        assert!(emails.contains_key("$not"));
    }

    #[test]
    fn and_combines_into_dollar_and_array() {
        let node = compile(r#"userName eq "a" and emails pr"#);
        let doc = translate(&node, &user_attr(), &MetadataHub::new()).unwrap();
        assert!(doc.get_array("$and").unwrap().len() == 2);
    }
}
