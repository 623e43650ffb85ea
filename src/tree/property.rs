//! The runtime value node backing one attribute on one resource.
//!
//! A `Property` exclusively owns its children (complex sub-properties,
//! multiValued elements) and holds a weak, non-owning back reference to
//! its parent for event propagation — an owning tree plus a raw parent
//! handle, never a cycle. Not `Send`/`Sync`: a resource is processed by
//! exactly one thread for the duration of a request.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use serde_json::Value as Json;
use time::OffsetDateTime;

use crate::model::{Annotation, Attribute, DataType};
use crate::utils::error::ScimError;

use super::event::{Event, EventKind};
use super::subscriber;

#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Str(String),
    Int(i64),
    Decimal(f64),
    Bool(bool),
    DateTime(OffsetDateTime),
    Binary(Vec<u8>),
    Reference(String),
}

impl ScalarValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScalarValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScalarValue::Str(s) | ScalarValue::Reference(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub(crate) enum State {
    Unassigned,
    Scalar(ScalarValue),
    Complex(Vec<PropertyRef>),
    MultiValued(Vec<PropertyRef>),
}

#[derive(Debug)]
pub struct PropertyNode {
    attribute: Attribute,
    parent: Option<Weak<RefCell<PropertyNode>>>,
    state: State,
    touched: bool,
}

pub type PropertyRef = Rc<RefCell<PropertyNode>>;

/// Builds a fresh property tree for `attribute`. Complex attributes get a
/// fixed, ordered set of unassigned sub-properties mirroring
/// `sub_attributes`; multiValued attributes start with zero elements.
pub fn construct(attribute: Attribute, parent: Option<Weak<RefCell<PropertyNode>>>) -> PropertyRef {
    let node = Rc::new(RefCell::new(PropertyNode {
        attribute: attribute.clone(),
        parent,
        state: State::Unassigned,
        touched: false,
    }));

    let state = if attribute.multi_valued {
        State::MultiValued(Vec::new())
    } else if attribute.r#type == DataType::Complex {
        let weak = Rc::downgrade(&node);
        let children = attribute
            .sub_attributes
            .iter()
            .cloned()
            .map(|sub| construct(sub, Some(weak.clone())))
            .collect();
        State::Complex(children)
    } else {
        State::Unassigned
    };
    node.borrow_mut().state = state;
    node
}

/// A fresh top-level resource property rooted at a ResourceType's super
/// attribute, with no parent.
pub fn construct_root(super_attribute: Attribute) -> PropertyRef {
    construct(super_attribute, None)
}

pub fn attribute(node: &PropertyRef) -> Attribute {
    node.borrow().attribute.clone()
}

pub fn parent(node: &PropertyRef) -> Option<PropertyRef> {
    node.borrow().parent.as_ref().and_then(Weak::upgrade)
}

pub fn is_touched(node: &PropertyRef) -> bool {
    node.borrow().touched
}

pub fn is_unassigned(node: &PropertyRef) -> bool {
    match &node.borrow().state {
        State::Unassigned => true,
        State::Scalar(_) => false,
        State::Complex(children) => children.iter().all(is_unassigned),
        State::MultiValued(elements) => elements.is_empty(),
    }
}

pub fn sub_property(node: &PropertyRef, name: &str) -> Option<PropertyRef> {
    match &node.borrow().state {
        State::Complex(children) => children
            .iter()
            .find(|c| c.borrow().attribute.name.eq_ignore_ascii_case(name))
            .cloned(),
        _ => None,
    }
}

pub fn complex_children(node: &PropertyRef) -> Option<Vec<PropertyRef>> {
    match &node.borrow().state {
        State::Complex(children) => Some(children.clone()),
        _ => None,
    }
}

pub fn elements(node: &PropertyRef) -> Option<Vec<PropertyRef>> {
    match &node.borrow().state {
        State::MultiValued(elements) => Some(elements.clone()),
        _ => None,
    }
}

pub fn scalar_value(node: &PropertyRef) -> Option<ScalarValue> {
    match &node.borrow().state {
        State::Scalar(v) => Some(v.clone()),
        _ => None,
    }
}

pub fn raw(node: &PropertyRef) -> Json {
    match &node.borrow().state {
        State::Unassigned => Json::Null,
        State::Scalar(v) => scalar_to_json(v),
        State::Complex(children) => {
            let mut map = serde_json::Map::new();
            for child in children {
                map.insert(child.borrow().attribute.name.clone(), raw(child));
            }
            Json::Object(map)
        }
        State::MultiValued(elements) => Json::Array(elements.iter().map(raw).collect()),
    }
}

fn scalar_to_json(value: &ScalarValue) -> Json {
    match value {
        ScalarValue::Str(s) | ScalarValue::Reference(s) => Json::String(s.clone()),
        ScalarValue::Int(i) => Json::Number((*i).into()),
        ScalarValue::Decimal(d) => serde_json::Number::from_f64(*d)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        ScalarValue::Bool(b) => Json::Bool(*b),
        ScalarValue::DateTime(dt) => Json::String(format_datetime(dt)),
        ScalarValue::Binary(bytes) => Json::String(base64_encode(bytes)),
    }
}

pub fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

pub fn base64_decode(s: &str) -> Result<Vec<u8>, ScimError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(s)
        .map_err(|e| ScimError::InvalidValue {
            attribute: "binary".into(),
            detail: e.to_string(),
        })
}

pub fn format_datetime(dt: &OffsetDateTime) -> String {
    let dt = dt.to_offset(time::UtcOffset::UTC);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
        dt.year(),
        u8::from(dt.month()),
        dt.day(),
        dt.hour(),
        dt.minute(),
        dt.second()
    )
}

fn hex_encode(bytes: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push(DIGITS[(b >> 4) as usize] as char);
        out.push(DIGITS[(b & 0x0f) as usize] as char);
    }
    out
}

/// Pure function of the property's value plus attribute identity. Complex
/// properties hash only their `@Identity` sub-attributes when any exist;
/// multiValued hashing is order-independent so `{a,b}` and `{b,a}` match.
pub fn hash(node: &PropertyRef) -> u64 {
    let n = node.borrow();
    match &n.state {
        State::Unassigned => fxhash::hash64(&(n.attribute.id.as_str(), "unassigned")),
        State::Scalar(v) => {
            let normalized = normalize_scalar(&n.attribute, v);
            fxhash::hash64(&(n.attribute.id.as_str(), normalized))
        }
        State::Complex(children) => {
            let identity: Vec<&PropertyRef> = children
                .iter()
                .filter(|c| c.borrow().attribute.has_annotation(Annotation::Identity))
                .collect();
            let participants: Vec<&PropertyRef> = if identity.is_empty() {
                children.iter().collect()
            } else {
                identity
            };
            let hashes: Vec<u64> = participants.iter().map(|c| hash(c)).collect();
            fxhash::hash64(&hashes)
        }
        State::MultiValued(list) => {
            let mut hashes: Vec<u64> = list.iter().map(hash).collect();
            hashes.sort_unstable();
            fxhash::hash64(&hashes)
        }
    }
}

fn normalize_scalar(attr: &Attribute, v: &ScalarValue) -> String {
    match v {
        ScalarValue::Str(s) | ScalarValue::Reference(s) => {
            if attr.case_exact {
                s.clone()
            } else {
                s.to_lowercase()
            }
        }
        ScalarValue::Int(i) => i.to_string(),
        ScalarValue::Decimal(d) => d.to_bits().to_string(),
        ScalarValue::Bool(b) => b.to_string(),
        ScalarValue::DateTime(dt) => dt.unix_timestamp().to_string(),
        ScalarValue::Binary(bytes) => hex_encode(bytes),
    }
}

/// `R.matches(R')` per the spec's definition: identical hash.
pub fn matches(a: &PropertyRef, b: &PropertyRef) -> bool {
    hash(a) == hash(b)
}

pub fn present(node: &PropertyRef) -> bool {
    !is_unassigned(node)
}

pub fn equals_to(node: &PropertyRef, other: &ScalarValue) -> bool {
    relational(node, other, |a, b| a == b)
}

pub fn starts_with(node: &PropertyRef, other: &ScalarValue) -> bool {
    string_relational(node, other, str::starts_with)
}

pub fn ends_with(node: &PropertyRef, other: &ScalarValue) -> bool {
    string_relational(node, other, str::ends_with)
}

pub fn contains(node: &PropertyRef, other: &ScalarValue) -> bool {
    string_relational(node, other, str::contains)
}

pub fn greater_than(node: &PropertyRef, other: &ScalarValue) -> bool {
    ordering(node, other, std::cmp::Ordering::is_gt)
}

pub fn less_than(node: &PropertyRef, other: &ScalarValue) -> bool {
    ordering(node, other, std::cmp::Ordering::is_lt)
}

fn relational(node: &PropertyRef, other: &ScalarValue, cmp: impl Fn(&str, &str) -> bool) -> bool {
    let n = node.borrow();
    let State::Scalar(value) = &n.state else {
        return false;
    };
    let normalized_self = normalize_scalar(&n.attribute, value);
    let normalized_other = normalize_scalar(&n.attribute, other);
    cmp(&normalized_self, &normalized_other)
}

fn string_relational(node: &PropertyRef, other: &ScalarValue, cmp: impl Fn(&str, &str) -> bool) -> bool {
    relational(node, other, cmp)
}

fn ordering(node: &PropertyRef, other: &ScalarValue, accept: impl Fn(std::cmp::Ordering) -> bool) -> bool {
    let n = node.borrow();
    let State::Scalar(value) = &n.state else {
        return false;
    };
    let ord = match (value, other) {
        (ScalarValue::Int(a), ScalarValue::Int(b)) => a.partial_cmp(b),
        (ScalarValue::Decimal(a), ScalarValue::Decimal(b)) => a.partial_cmp(b),
        (ScalarValue::DateTime(a), ScalarValue::DateTime(b)) => a.partial_cmp(b),
        (ScalarValue::Str(a), ScalarValue::Str(b)) | (ScalarValue::Reference(a), ScalarValue::Reference(b)) => {
            if n.attribute.case_exact {
                a.partial_cmp(b)
            } else {
                a.to_lowercase().partial_cmp(&b.to_lowercase())
            }
        }
        _ => None,
    };
    ord.is_some_and(accept)
}

fn emit_and_propagate(node: &PropertyRef, kind: EventKind) -> Result<(), ScimError> {
    let mut event = Event::new(kind, node.clone());
    if let Some(parent) = parent(node) {
        propagate(&parent, node, &mut event)?;
    }
    Ok(())
}

pub(crate) fn propagate(node: &PropertyRef, via_child: &PropertyRef, event: &mut Event) -> Result<(), ScimError> {
    subscriber::apply(node, via_child, event)?;
    if !event.propagate {
        return Ok(());
    }
    if let Some(grandparent) = parent(node) {
        propagate(&grandparent, node, event)?;
    }
    Ok(())
}

/// Scalar `replace`; scalar `add` is defined as equivalent to `replace`.
pub fn replace_scalar(node: &PropertyRef, value: ScalarValue) -> Result<(), ScimError> {
    {
        let mut n = node.borrow_mut();
        if n.attribute.multi_valued || n.attribute.r#type == DataType::Complex {
            return Err(ScimError::InvalidValue {
                attribute: n.attribute.id.clone(),
                detail: "cannot replace a complex or multiValued property with a scalar".into(),
            });
        }
        n.state = State::Scalar(value);
        n.touched = true;
    }
    emit_and_propagate(node, EventKind::Assigned)
}

pub fn add_scalar(node: &PropertyRef, value: ScalarValue) -> Result<(), ScimError> {
    replace_scalar(node, value)
}

/// Deletes the property back to unassigned. Complex properties delete
/// every sub-property; multiValued properties clear their elements. The
/// touched bit is always set so PATCH can distinguish an explicit null
/// from a value that was simply never assigned.
///
/// If `node` is itself an element of a multiValued parent — as it is
/// when CRUD/PATCH `remove` targets a path with an embedded filter,
/// since `expr::resolve` returns the matching elements themselves — it
/// is also spliced out of the parent's Vec. This doesn't depend on
/// `@AutoCompact`: that annotation handles an element going fully
/// unassigned as a side effect of deleting one of its leaves, but a
/// direct `delete` on the element must remove it regardless of which
/// attribute it belongs to, or it leaves a ghost all-unassigned entry
/// that still counts toward the multiValued hash.
pub fn delete(node: &PropertyRef) -> Result<(), ScimError> {
    let was_unassigned = is_unassigned(node);
    {
        let mut n = node.borrow_mut();
        n.touched = true;
        match &n.state {
            State::Complex(children) => {
                let children = children.clone();
                drop(n);
                for child in &children {
                    delete(child)?;
                }
                node.borrow_mut().touched = true;
                splice_from_parent(node);
                return if was_unassigned {
                    Ok(())
                } else {
                    emit_and_propagate(node, EventKind::Unassigned)
                };
            }
            State::MultiValued(_) => n.state = State::MultiValued(Vec::new()),
            State::Scalar(_) => n.state = State::Unassigned,
            State::Unassigned => {}
        }
    }
    splice_from_parent(node);
    if was_unassigned {
        Ok(())
    } else {
        emit_and_propagate(node, EventKind::Unassigned)
    }
}

/// Removes `node` from its parent's Vec if the parent is multiValued and
/// `node` is one of its elements. A no-op for anything else (a
/// multiValued container's own parent is always Complex, never
/// MultiValued, so this never fires on the container itself).
fn splice_from_parent(node: &PropertyRef) {
    let Some(parent) = parent(node) else { return };
    if let State::MultiValued(list) = &mut parent.borrow_mut().state {
        list.retain(|e| !Rc::ptr_eq(e, node));
    }
}

/// Appends a new, unpopulated element to a multiValued property and
/// returns it for the caller (codec, CRUD add) to populate. Used
/// unconditionally by the JSON/BSON deserializers, which create one
/// element per array item with no deduplication.
pub fn push_element(node: &PropertyRef) -> Result<PropertyRef, ScimError> {
    let (element_attr, weak_parent) = {
        let n = node.borrow();
        if !n.attribute.multi_valued {
            return Err(ScimError::InvalidValue {
                attribute: n.attribute.id.clone(),
                detail: "not a multiValued property".into(),
            });
        }
        (n.attribute.element_attribute(), Rc::downgrade(node))
    };
    let element = construct(element_attr, Some(weak_parent));
    if let State::MultiValued(list) = &mut node.borrow_mut().state {
        list.push(element.clone());
    }
    Ok(element)
}

/// CRUD/PATCH `add` on a multiValued property: builds a candidate element
/// via `populate`, then keeps it only if it doesn't `match` an existing
/// element.
pub fn add_element(node: &PropertyRef, populate: impl FnOnce(&PropertyRef) -> Result<(), ScimError>) -> Result<(), ScimError> {
    let element = push_element(node)?;
    populate(&element)?;
    let duplicate = {
        let n = node.borrow();
        let State::MultiValued(list) = &n.state else {
            unreachable!("push_element guarantees multiValued state")
        };
        list.iter()
            .filter(|e| !Rc::ptr_eq(e, &element))
            .any(|existing| matches(existing, &element))
    };
    if duplicate {
        if let State::MultiValued(list) = &mut node.borrow_mut().state {
            list.retain(|e| !Rc::ptr_eq(e, &element));
        }
    }
    Ok(())
}

/// CRUD/PATCH `add` on a complex property: merges `source`'s assigned
/// sub-properties into `node` by name.
pub fn merge_complex(node: &PropertyRef, source: &PropertyRef) -> Result<(), ScimError> {
    let source_children = complex_children(source).ok_or_else(|| ScimError::InvalidValue {
        attribute: attribute(source).id.clone(),
        detail: "source is not complex".into(),
    })?;
    for source_child in source_children {
        if is_unassigned(&source_child) {
            continue;
        }
        let name = attribute(&source_child).name.clone();
        if let Some(target_child) = sub_property(node, &name) {
            copy_value(&target_child, &source_child)?;
        }
    }
    Ok(())
}

/// Copies `source`'s value into `target` node-for-node, regardless of
/// complex/multiValued/scalar shape. Used by `merge_complex` and by the
/// filter pipeline's `@CopyReadOnly` stage to carry a reference resource's
/// read-only values forward onto a replacement.
pub fn copy_value(target: &PropertyRef, source: &PropertyRef) -> Result<(), ScimError> {
    let source_kind_is_complex = complex_children(source).is_some();
    let source_is_multi = elements(source).is_some();
    if source_is_multi {
        for element in elements(source).unwrap() {
            add_element(target, |e| copy_value(e, &element))?;
        }
        Ok(())
    } else if source_kind_is_complex {
        merge_complex(target, source)
    } else if let Some(value) = scalar_value(source) {
        add_scalar(target, value)
    } else {
        delete(target)
    }
}

/// Removes unassigned elements from a multiValued property, preserving
/// the order of the remaining ones. Invoked by the `@AutoCompact`
/// subscriber.
pub fn compact(node: &PropertyRef) {
    if let State::MultiValued(list) = &mut node.borrow_mut().state {
        list.retain(|e| !is_unassigned(e));
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{Attribute, DataType};

    fn string_attr(name: &str) -> Attribute {
        Attribute::scalar(format!("test:{name}"), name, DataType::String)
    }

    #[test]
    fn replace_scalar_then_raw_round_trips() {
        let node = construct_root(string_attr("userName"));
        replace_scalar(&node, ScalarValue::Str("jdoe".into())).unwrap();
        assert_eq!(raw(&node), serde_json::json!("jdoe"));
        assert!(present(&node));
    }

    #[test]
    fn delete_marks_touched_and_unassigns() {
        let node = construct_root(string_attr("nickName"));
        replace_scalar(&node, ScalarValue::Str("x".into())).unwrap();
        delete(&node).unwrap();
        assert!(is_unassigned(&node));
        assert!(is_touched(&node));
    }

    #[test]
    fn matches_is_case_insensitive_unless_case_exact() {
        let a = construct_root(string_attr("userName"));
        let b = construct_root(string_attr("userName"));
        replace_scalar(&a, ScalarValue::Str("IMULAB".into())).unwrap();
        replace_scalar(&b, ScalarValue::Str("imulab".into())).unwrap();
        assert!(matches(&a, &b));
    }

    #[test]
    fn multi_valued_add_element_dedupes_matching_elements() {
        let attr = Attribute::complex(
            "test:emails",
            "emails",
            vec![string_attr("value")],
        )
        .multi_valued();
        let node = construct_root(attr);
        add_element(&node, |e| {
            replace_scalar(&sub_property(e, "value").unwrap(), ScalarValue::Str("a@b".into()))
        })
        .unwrap();
        add_element(&node, |e| {
            replace_scalar(&sub_property(e, "value").unwrap(), ScalarValue::Str("a@b".into()))
        })
        .unwrap();
        assert_eq!(elements(&node).unwrap().len(), 1);
    }

    #[test]
    fn compact_preserves_order_of_remaining_elements() {
        let attr = Attribute::complex("test:roles", "roles", vec![string_attr("value")]).multi_valued();
        let node = construct_root(attr);
        let first = push_element(&node).unwrap();
        replace_scalar(&sub_property(&first, "value").unwrap(), ScalarValue::Str("a".into())).unwrap();
        let _second = push_element(&node).unwrap();
        let third = push_element(&node).unwrap();
        replace_scalar(&sub_property(&third, "value").unwrap(), ScalarValue::Str("c".into())).unwrap();

        compact(&node);
        let remaining = elements(&node).unwrap();
        assert_eq!(remaining.len(), 2);
        assert_eq!(raw(&remaining[0]), serde_json::json!({"value": "a"}));
        assert_eq!(raw(&remaining[1]), serde_json::json!({"value": "c"}));
    }
}
