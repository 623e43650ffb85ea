//! Embedded RFC 7643 default schema and resource-type data.
//!
//! Builds the same field set `cocoon-scim-v2-rust`'s `models::user::User`,
//! `models::group::Group`, and `models::enterprise_user::EnterpriseUser`
//! hard-code as Rust struct fields, but as `Attribute`/`Schema` data so it
//! can be loaded into a `ResourceTypeRegistry` at runtime instead of fixed
//! at compile time.

use super::attribute::{Annotation, Attribute, DataType, Mutability, Returned, Uniqueness};
use super::resource_type::ResourceType;
use super::schema::Schema;

const USER_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:User";
const GROUP_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:Group";
const ENTERPRISE_SCHEMA: &str = "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User";

fn id(schema: &str, path: &str) -> String {
    format!("{schema}:{path}")
}

/// A multiValued "thing with value/type/primary/display" attribute, the
/// shape repeated for `emails`, `phoneNumbers`, `ims`, `photos`,
/// `entitlements`, and `roles` in the teacher's `User` struct.
fn multi_valued_complex(schema: &str, name: &str, canonical: &[&'static str]) -> Attribute {
    let base = id(schema, name);
    let value = Attribute::scalar(format!("{base}.value"), "value", DataType::String);
    let mut type_attr = Attribute::scalar(format!("{base}.type"), "type", DataType::String);
    if !canonical.is_empty() {
        type_attr = type_attr.canonical_values(canonical.iter().copied());
    }
    let primary = Attribute::scalar(format!("{base}.primary"), "primary", DataType::Boolean)
        .annotate(Annotation::Primary);
    let display = Attribute::scalar(format!("{base}.display"), "display", DataType::String);
    Attribute::complex(base, name, vec![value, type_attr, primary, display])
        .multi_valued()
        .annotate(Annotation::ExclusivePrimary)
}

fn user_name_attribute() -> Attribute {
    let base = id(USER_SCHEMA, "name");
    Attribute::complex(
        base.clone(),
        "name",
        vec![
            Attribute::scalar(format!("{base}.formatted"), "formatted", DataType::String),
            Attribute::scalar(format!("{base}.familyName"), "familyName", DataType::String),
            Attribute::scalar(format!("{base}.givenName"), "givenName", DataType::String),
            Attribute::scalar(format!("{base}.middleName"), "middleName", DataType::String),
            Attribute::scalar(format!("{base}.honorificPrefix"), "honorificPrefix", DataType::String),
            Attribute::scalar(format!("{base}.honorificSuffix"), "honorificSuffix", DataType::String),
        ],
    )
}

fn addresses_attribute() -> Attribute {
    let base = id(USER_SCHEMA, "addresses");
    Attribute::complex(
        base.clone(),
        "addresses",
        vec![
            Attribute::scalar(format!("{base}.formatted"), "formatted", DataType::String),
            Attribute::scalar(format!("{base}.streetAddress"), "streetAddress", DataType::String),
            Attribute::scalar(format!("{base}.locality"), "locality", DataType::String),
            Attribute::scalar(format!("{base}.region"), "region", DataType::String),
            Attribute::scalar(format!("{base}.postalCode"), "postalCode", DataType::String),
            Attribute::scalar(format!("{base}.country"), "country", DataType::String),
            Attribute::scalar(format!("{base}.type"), "type", DataType::String)
                .canonical_values(["work", "home", "other"]),
            Attribute::scalar(format!("{base}.primary"), "primary", DataType::Boolean)
                .annotate(Annotation::Primary),
        ],
    )
    .multi_valued()
    .annotate(Annotation::ExclusivePrimary)
}

fn groups_attribute() -> Attribute {
    let base = id(USER_SCHEMA, "groups");
    Attribute::complex(
        base.clone(),
        "groups",
        vec![
            Attribute::scalar(format!("{base}.value"), "value", DataType::String)
                .mutability(Mutability::ReadOnly),
            Attribute::scalar(format!("{base}.$ref"), "$ref", DataType::Reference)
                .mutability(Mutability::ReadOnly),
            Attribute::scalar(format!("{base}.display"), "display", DataType::String)
                .mutability(Mutability::ReadOnly),
            Attribute::scalar(format!("{base}.type"), "type", DataType::String)
                .mutability(Mutability::ReadOnly)
                .canonical_values(["direct", "indirect"]),
        ],
    )
    .multi_valued()
    .mutability(Mutability::ReadOnly)
    .returned(Returned::Default)
}

fn x509_certificates_attribute() -> Attribute {
    let base = id(USER_SCHEMA, "x509Certificates");
    Attribute::complex(
        base.clone(),
        "x509Certificates",
        vec![Attribute::scalar(format!("{base}.value"), "value", DataType::Binary)],
    )
    .multi_valued()
}

/// The RFC 7643 §4.1 User schema, matching the field set validated field
/// by field in the teacher's `models::user::User`.
fn user_schema() -> Schema {
    let attrs = vec![
        Attribute::scalar(id(USER_SCHEMA, "userName"), "userName", DataType::String)
            .required()
            .uniqueness(Uniqueness::Server)
            .annotate(Annotation::MongoIndex),
        user_name_attribute(),
        Attribute::scalar(id(USER_SCHEMA, "displayName"), "displayName", DataType::String),
        Attribute::scalar(id(USER_SCHEMA, "nickName"), "nickName", DataType::String),
        Attribute::scalar(id(USER_SCHEMA, "profileUrl"), "profileUrl", DataType::Reference),
        Attribute::scalar(id(USER_SCHEMA, "title"), "title", DataType::String),
        Attribute::scalar(id(USER_SCHEMA, "userType"), "userType", DataType::String),
        Attribute::scalar(id(USER_SCHEMA, "preferredLanguage"), "preferredLanguage", DataType::String),
        Attribute::scalar(id(USER_SCHEMA, "locale"), "locale", DataType::String),
        Attribute::scalar(id(USER_SCHEMA, "timezone"), "timezone", DataType::String),
        Attribute::scalar(id(USER_SCHEMA, "active"), "active", DataType::Boolean),
        Attribute::scalar(id(USER_SCHEMA, "password"), "password", DataType::String)
            .mutability(Mutability::WriteOnly)
            .returned(Returned::Never)
            .annotate(Annotation::CopyReadOnly),
        multi_valued_complex(USER_SCHEMA, "emails", &["work", "home", "other"]),
        multi_valued_complex(USER_SCHEMA, "phoneNumbers", &["work", "home", "mobile", "fax", "pager", "other"]),
        multi_valued_complex(USER_SCHEMA, "ims", &["aim", "gtalk", "icq", "xmpp", "msn", "skype", "qq", "yahoo"]),
        multi_valued_complex(USER_SCHEMA, "photos", &["photo", "thumbnail"]),
        addresses_attribute(),
        groups_attribute(),
        multi_valued_complex(USER_SCHEMA, "entitlements", &[]),
        multi_valued_complex(USER_SCHEMA, "roles", &[]),
        x509_certificates_attribute(),
    ];
    Schema::new(USER_SCHEMA, "User", attrs)
}

fn group_member_attribute() -> Attribute {
    let base = id(GROUP_SCHEMA, "members");
    Attribute::complex(
        base.clone(),
        "members",
        vec![
            Attribute::scalar(format!("{base}.value"), "value", DataType::String),
            Attribute::scalar(format!("{base}.$ref"), "$ref", DataType::Reference),
            Attribute::scalar(format!("{base}.display"), "display", DataType::String),
            Attribute::scalar(format!("{base}.type"), "type", DataType::String)
                .canonical_values(["User", "Group"]),
        ],
    )
    .multi_valued()
    .annotate(Annotation::AutoCompact)
}

/// The RFC 7643 §4.2 Group schema, matching `models::group::Group`.
fn group_schema() -> Schema {
    Schema::new(
        GROUP_SCHEMA,
        "Group",
        vec![
            Attribute::scalar(id(GROUP_SCHEMA, "displayName"), "displayName", DataType::String)
                .required(),
            group_member_attribute(),
        ],
    )
}

fn manager_attribute() -> Attribute {
    let base = id(ENTERPRISE_SCHEMA, "manager");
    Attribute::complex(
        base.clone(),
        "manager",
        vec![
            Attribute::scalar(format!("{base}.value"), "value", DataType::String),
            Attribute::scalar(format!("{base}.$ref"), "$ref", DataType::Reference),
            Attribute::scalar(format!("{base}.displayName"), "displayName", DataType::String)
                .mutability(Mutability::ReadOnly),
        ],
    )
}

/// The RFC 7643 §4.3 Enterprise User extension, matching
/// `models::enterprise_user::EnterpriseUser`.
fn enterprise_user_schema() -> Schema {
    Schema::new(
        ENTERPRISE_SCHEMA,
        "EnterpriseUser",
        vec![
            Attribute::scalar(id(ENTERPRISE_SCHEMA, "employeeNumber"), "employeeNumber", DataType::String),
            Attribute::scalar(id(ENTERPRISE_SCHEMA, "costCenter"), "costCenter", DataType::String),
            Attribute::scalar(id(ENTERPRISE_SCHEMA, "organization"), "organization", DataType::String),
            Attribute::scalar(id(ENTERPRISE_SCHEMA, "division"), "division", DataType::String),
            Attribute::scalar(id(ENTERPRISE_SCHEMA, "department"), "department", DataType::String),
            manager_attribute(),
        ],
    )
}

pub fn default_schemas() -> Vec<Schema> {
    vec![user_schema(), group_schema(), enterprise_user_schema()]
}

pub fn default_resource_types() -> Vec<ResourceType> {
    vec![
        ResourceType::new(USER_SCHEMA, "User", "/Users", USER_SCHEMA).with_extension(ENTERPRISE_SCHEMA, false),
        ResourceType::new(GROUP_SCHEMA, "Group", "/Groups", GROUP_SCHEMA),
    ]
}
