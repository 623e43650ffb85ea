//! Annotation-driven subscribers, consulted by `property::propagate` as
//! an event passes through each ancestor on its way to the root.
//!
//! Kept as free functions dispatched on the ancestor's own annotations
//! rather than a boxed-trait registry: the annotation set already lives on
//! the `Attribute`, so there's no extra indirection to buy by reifying a
//! `Subscriber` trait object per property. Downstream behaviors that need
//! the richer plugin shape can still be layered on top of
//! `property::propagate` without changing this module's contract.

use crate::model::Annotation;
use crate::utils::error::ScimError;

use super::event::{Event, EventKind};
use super::property::{self, PropertyRef, ScalarValue};

pub(crate) fn apply(node: &PropertyRef, via_child: &PropertyRef, event: &mut Event) -> Result<(), ScimError> {
    let attr = property::attribute(node);

    if attr.multi_valued && attr.has_annotation(Annotation::ExclusivePrimary) {
        exclusive_primary(node, via_child, event)?;
    }
    if attr.multi_valued && attr.has_annotation(Annotation::AutoCompact) {
        auto_compact(node, via_child, event);
    }
    if !attr.multi_valued && attr.has_annotation(Annotation::StateSummary) {
        state_summary(node, event);
    }
    if attr.has_annotation(Annotation::SyncSchema) {
        sync_schema(node, event)?;
    }
    Ok(())
}

/// On an `Assigned` event whose origin is a `@Primary` sub-property set
/// to `true`, clears the same-named primary sub-property on every other
/// element of this container.
fn exclusive_primary(node: &PropertyRef, via_child: &PropertyRef, event: &Event) -> Result<(), ScimError> {
    if event.kind != EventKind::Assigned {
        return Ok(());
    }
    let origin_attr = property::attribute(&event.origin);
    if !origin_attr.has_annotation(Annotation::Primary) {
        return Ok(());
    }
    if property::scalar_value(&event.origin) != Some(ScalarValue::Bool(true)) {
        return Ok(());
    }
    let Some(elements) = property::elements(node) else {
        return Ok(());
    };
    for element in &elements {
        if std::rc::Rc::ptr_eq(element, via_child) {
            continue;
        }
        if let Some(primary) = property::sub_property(element, &origin_attr.name) {
            property::delete(&primary)?;
        }
    }
    Ok(())
}

/// On an `Unassigned` event whose origin is a direct element of this
/// container that is now fully unassigned, removes unassigned elements.
fn auto_compact(node: &PropertyRef, via_child: &PropertyRef, event: &Event) {
    if event.kind != EventKind::Unassigned {
        return;
    }
    if !std::rc::Rc::ptr_eq(via_child, &event.origin) {
        return;
    }
    if !property::is_unassigned(via_child) {
        return;
    }
    property::compact(node);
}

/// Re-emits an `Assigned`/`Unassigned` event with `origin` rewritten to
/// this container, so ancestors see "this container changed" rather than
/// the leaf that triggered it. An `Unassigned` re-emission only happens
/// once every child has gone unassigned.
fn state_summary(node: &PropertyRef, event: &mut Event) {
    match event.kind {
        EventKind::Assigned => {
            event.origin = node.clone();
        }
        EventKind::Unassigned => {
            if property::is_unassigned(node) {
                event.origin = node.clone();
            } else {
                event.stop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{Attribute, DataType};
    use crate::tree::property::construct_root;

    fn emails_root() -> PropertyRef {
        let emails = Attribute::complex(
            "test:emails",
            "emails",
            vec![
                Attribute::scalar("test:emails.value", "value", DataType::String),
                Attribute::scalar("test:emails.primary", "primary", DataType::Boolean).annotate(Annotation::Primary),
            ],
        )
        .multi_valued()
        .annotate(Annotation::ExclusivePrimary);
        construct_root(Attribute::complex("test:User", "User", vec![emails]))
    }

    #[test]
    fn setting_a_new_primary_clears_the_previous_one() {
        let root = emails_root();
        let emails = property::sub_property(&root, "emails").unwrap();

        let mut first = None;
        property::add_element(&emails, |e| {
            property::replace_scalar(&property::sub_property(e, "value").unwrap(), ScalarValue::Str("a@b".into()))?;
            property::replace_scalar(&property::sub_property(e, "primary").unwrap(), ScalarValue::Bool(true))?;
            first = Some(e.clone());
            Ok(())
        })
        .unwrap();
        property::add_element(&emails, |e| {
            property::replace_scalar(&property::sub_property(e, "value").unwrap(), ScalarValue::Str("c@d".into()))?;
            property::replace_scalar(&property::sub_property(e, "primary").unwrap(), ScalarValue::Bool(true))
        })
        .unwrap();

        let first = first.unwrap();
        let first_primary = property::sub_property(&first, "primary").unwrap();
        assert!(property::is_unassigned(&first_primary));
    }

    #[test]
    fn assigning_an_extension_root_adds_its_urn_to_schemas() {
        let schemas = Attribute::scalar("test:schemas", "schemas", DataType::String).multi_valued();
        let ext = Attribute::complex(
            "urn:test:ext",
            "urn:test:ext",
            vec![Attribute::scalar("urn:test:ext:employeeNumber", "employeeNumber", DataType::String)],
        )
        .annotate(Annotation::StateSummary)
        .annotate(Annotation::SchemaExtensionRoot);
        let root = construct_root(Attribute::complex("test:User", "User", vec![schemas, ext]).annotate(Annotation::SyncSchema));

        let ext = property::sub_property(&root, "urn:test:ext").unwrap();
        let employee_number = property::sub_property(&ext, "employeeNumber").unwrap();
        property::replace_scalar(&employee_number, ScalarValue::Str("42".into())).unwrap();

        let schemas = property::sub_property(&root, "schemas").unwrap();
        let values: Vec<_> = property::elements(&schemas)
            .unwrap()
            .iter()
            .filter_map(property::scalar_value)
            .collect();
        assert_eq!(values, vec![ScalarValue::Str("urn:test:ext".into())]);

        property::delete(&employee_number).unwrap();
        let schemas = property::sub_property(&root, "schemas").unwrap();
        assert!(property::elements(&schemas).unwrap().is_empty());
    }
}

/// On the top-level resource: when a `@SchemaExtensionRoot` container is
/// assigned, adds its URN to `schemas`; when unassigned, removes it.
fn sync_schema(node: &PropertyRef, event: &Event) -> Result<(), ScimError> {
    let origin_attr = property::attribute(&event.origin);
    if !origin_attr.has_annotation(Annotation::SchemaExtensionRoot) {
        return Ok(());
    }
    let Some(schemas) = property::sub_property(node, "schemas") else {
        return Ok(());
    };
    match event.kind {
        EventKind::Assigned => property::add_element(&schemas, |e| {
            property::add_scalar(e, ScalarValue::Str(origin_attr.id.clone()))
        }),
        EventKind::Unassigned => {
            if let Some(elements) = property::elements(&schemas) {
                for element in elements {
                    if property::scalar_value(&element).as_ref().and_then(ScalarValue::as_str)
                        == Some(origin_attr.id.as_str())
                    {
                        property::delete(&element)?;
                    }
                }
            }
            Ok(())
        }
    }
}
