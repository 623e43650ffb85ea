//! A stack-based traversal cursor over a property tree.

use crate::utils::error::ScimError;

use super::property::{self, PropertyRef};

/// The bottom of the stack (the resource root a `Navigator` was built
/// from) is never popped by `retract`.
pub struct Navigator {
    stack: Vec<PropertyRef>,
}

impl Navigator {
    pub fn new(root: PropertyRef) -> Self {
        Navigator { stack: vec![root] }
    }

    pub fn focus(&self) -> &PropertyRef {
        self.stack.last().expect("navigator stack is never empty")
    }

    pub fn focus_name(&mut self, name: &str) -> Result<(), ScimError> {
        let current = self.focus().clone();
        let next = property::sub_property(&current, name).ok_or_else(|| {
            ScimError::NoTarget(format!("no sub-attribute named '{name}' on {}", property::attribute(&current).id))
        })?;
        self.stack.push(next);
        Ok(())
    }

    pub fn focus_index(&mut self, index: usize) -> Result<(), ScimError> {
        let current = self.focus().clone();
        let elements = property::elements(&current).ok_or_else(|| {
            ScimError::InvalidPath(format!("{} is not multiValued", property::attribute(&current).id))
        })?;
        let element = elements
            .get(index)
            .cloned()
            .ok_or_else(|| ScimError::NoTarget(format!("index {index} out of bounds")))?;
        self.stack.push(element);
        Ok(())
    }

    /// Focuses every element of the current multiValued property matching
    /// `predicate`, returning their indices within the element list.
    pub fn focus_criteria(&mut self, predicate: impl Fn(&PropertyRef) -> bool) -> Result<Vec<PropertyRef>, ScimError> {
        let current = self.focus().clone();
        let elements = property::elements(&current).ok_or_else(|| {
            ScimError::InvalidFilter(format!(
                "filter applied to non-multiValued property {}",
                property::attribute(&current).id
            ))
        })?;
        Ok(elements.into_iter().filter(|e| predicate(e)).collect())
    }

    /// Pops the top of the stack. A no-op at the bottom.
    pub fn retract(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{Attribute, DataType};
    use crate::tree::property::{construct_root, replace_scalar, ScalarValue};

    #[test]
    fn focus_name_then_retract_returns_to_parent() {
        let attr = Attribute::complex(
            "test:name",
            "name",
            vec![Attribute::scalar("test:name.givenName", "givenName", DataType::String)],
        );
        let root = construct_root(attr);
        let mut nav = Navigator::new(root);
        assert_eq!(nav.depth(), 1);
        nav.focus_name("givenName").unwrap();
        assert_eq!(nav.depth(), 2);
        replace_scalar(nav.focus(), ScalarValue::Str("Ada".into())).unwrap();
        nav.retract();
        assert_eq!(nav.depth(), 1);
        nav.retract();
        assert_eq!(nav.depth(), 1, "retract never pops the bottom of the stack");
    }

    #[test]
    fn focus_name_unknown_sub_attribute_is_no_target() {
        let attr = Attribute::scalar("test:userName", "userName", DataType::String);
        let root = construct_root(attr);
        let mut nav = Navigator::new(root);
        let err = nav.focus_name("missing").unwrap_err();
        assert_eq!(err.to_string(), "no such target: no sub-attribute named 'missing' on test:userName");
    }
}
