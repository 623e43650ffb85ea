//! Attribute metadata: the compile-time-absent, runtime-present description
//! of one field in a schema.
//!
//! Mirrors the attribute shape `cocoon-scim-v2-rust`'s `models::scim_schema::Attributes`
//! hard-codes per-field, except here it's data: one `Attribute` value per
//! field, assembled into a `Schema`, so that shape can come from a loaded
//! document instead of a Rust struct definition.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// The SCIM attribute data type (RFC 7643 §2.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    Integer,
    Decimal,
    Boolean,
    #[serde(rename = "dateTime")]
    DateTime,
    Binary,
    Reference,
    Complex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mutability {
    ReadWrite,
    ReadOnly,
    WriteOnly,
    Immutable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Returned {
    Default,
    Always,
    Request,
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Uniqueness {
    None,
    Server,
    Global,
}

/// A cross-cutting behavior tag attached to an attribute. The tag itself
/// just names a behavior; the actual subscriber logic lives in
/// `crate::tree::subscriber` and is wired up by an open, string-keyed
/// registration map (see `crate::tree::subscriber::SubscriberFactory`) so
/// downstream crates can add their own annotations without touching this
/// enum — but the nine the spec names are first-class here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Annotation {
    CopyReadOnly,
    AutoCompact,
    ExclusivePrimary,
    StateSummary,
    SchemaExtensionRoot,
    SyncSchema,
    Identity,
    Primary,
    MongoIndex,
}

/// Describes one field, top-level or nested. Cheap to clone: the expensive
/// parts (sub-attributes, canonical values) live behind `Arc` so that an
/// `Attribute` can be copied freely while building derived attributes (the
/// per-element attribute of a multiValued field, the super attribute of a
/// ResourceType) without cloning the whole subtree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribute {
    /// Globally unique, typically `schemaURN:dotted.path`.
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub r#type: DataType,
    #[serde(default)]
    pub multi_valued: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub case_exact: bool,
    #[serde(default = "default_mutability")]
    pub mutability: Mutability,
    #[serde(default = "default_returned")]
    pub returned: Returned,
    #[serde(default = "default_uniqueness")]
    pub uniqueness: Uniqueness,
    #[serde(default)]
    pub canonical_values: HashSet<String>,
    #[serde(default)]
    pub reference_types: Vec<String>,
    /// Ordered; only populated when `type == Complex`.
    #[serde(default)]
    pub sub_attributes: Arc<Vec<Attribute>>,
    #[serde(default)]
    pub annotations: HashSet<Annotation>,
}

fn default_mutability() -> Mutability {
    Mutability::ReadWrite
}
fn default_returned() -> Returned {
    Returned::Default
}
fn default_uniqueness() -> Uniqueness {
    Uniqueness::None
}

impl Attribute {
    /// A scalar attribute with otherwise-default metadata. Most attributes
    /// in hand-built schemas start here and get adjusted with the `with_*`
    /// builders below — mirrors the terse `Default::default()` + field
    /// overrides pattern the teacher uses for its resource structs.
    pub fn scalar(id: impl Into<String>, name: impl Into<String>, r#type: DataType) -> Self {
        Attribute {
            id: id.into(),
            name: name.into(),
            description: None,
            r#type,
            multi_valued: false,
            required: false,
            case_exact: false,
            mutability: Mutability::ReadWrite,
            returned: Returned::Default,
            uniqueness: Uniqueness::None,
            canonical_values: HashSet::new(),
            reference_types: Vec::new(),
            sub_attributes: Arc::new(Vec::new()),
            annotations: HashSet::new(),
        }
    }

    pub fn complex(
        id: impl Into<String>,
        name: impl Into<String>,
        sub_attributes: Vec<Attribute>,
    ) -> Self {
        let mut a = Attribute::scalar(id, name, DataType::Complex);
        a.sub_attributes = Arc::new(sub_attributes);
        a
    }

    pub fn multi_valued(mut self) -> Self {
        self.multi_valued = true;
        self
    }
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
    pub fn case_exact(mut self) -> Self {
        self.case_exact = true;
        self
    }
    pub fn mutability(mut self, m: Mutability) -> Self {
        self.mutability = m;
        self
    }
    pub fn returned(mut self, r: Returned) -> Self {
        self.returned = r;
        self
    }
    pub fn uniqueness(mut self, u: Uniqueness) -> Self {
        self.uniqueness = u;
        self
    }
    pub fn annotate(mut self, a: Annotation) -> Self {
        self.annotations.insert(a);
        self
    }
    pub fn canonical_values(mut self, values: impl IntoIterator<Item = &'static str>) -> Self {
        self.canonical_values = values.into_iter().map(String::from).collect();
        self
    }

    pub fn has_annotation(&self, a: Annotation) -> bool {
        self.annotations.contains(&a)
    }

    pub fn sub_attribute(&self, name: &str) -> Option<&Attribute> {
        self.sub_attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// The derived *element attribute* for a multiValued attribute: same
    /// settings, `multiValued = false`. Per §3's invariant, every
    /// multiValued attribute has exactly one of these, used to build each
    /// element property.
    pub fn element_attribute(&self) -> Attribute {
        let mut element = self.clone();
        element.multi_valued = false;
        element
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn element_attribute_strips_multi_valued_only() {
        let emails = Attribute::complex(
            "urn:ietf:params:scim:schemas:core:2.0:User:emails",
            "emails",
            vec![Attribute::scalar(
                "urn:ietf:params:scim:schemas:core:2.0:User:emails.value",
                "value",
                DataType::String,
            )],
        )
        .multi_valued();

        let element = emails.element_attribute();
        assert!(!element.multi_valued);
        assert_eq!(element.sub_attributes.len(), 1);
        assert_eq!(element.name, "emails");
    }

    #[test]
    fn sub_attribute_lookup_is_case_insensitive() {
        let name = Attribute::complex(
            "urn:ietf:params:scim:schemas:core:2.0:User:name",
            "name",
            vec![Attribute::scalar(
                "urn:ietf:params:scim:schemas:core:2.0:User:name.givenName",
                "givenName",
                DataType::String,
            )],
        );
        assert!(name.sub_attribute("GIVENNAME").is_some());
        assert!(name.sub_attribute("missing").is_none());
    }
}
