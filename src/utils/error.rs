//! The crate's error taxonomy.
//!
//! `ScimError` unifies every failure mode named in the spec's error handling
//! design into one enum so that callers can match on `.kind()` to pick an
//! HTTP status and `scimType` keyword at the (out of scope) HTTP layer,
//! without needing to know which subsystem raised the error.

use std::fmt;

use thiserror::Error;

/// The SCIM-aligned error kind, independent of the detail message carried
/// alongside it. Maps 1:1 onto RFC 7644 §3.12's `scimType` keywords plus
/// the HTTP status family used by the (out of scope) endpoint layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidRequest,
    InvalidFilter,
    TooMany,
    Uniqueness,
    Mutability,
    InvalidSyntax,
    InvalidPath,
    NoTarget,
    InvalidValue,
    NotFound,
    Conflict,
    Internal,
}

impl ErrorKind {
    /// The HTTP status family a host would map this kind to. Kept here
    /// rather than in the HTTP layer so the mapping lives next to the
    /// taxonomy it classifies.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Internal => 500,
            _ => 400,
        }
    }
}

/// An error raised anywhere in the core: metamodel, property tree,
/// expression compiler, CRUD operators, codecs, mongo adapter, or filter
/// pipeline.
#[derive(Error, Debug)]
pub enum ScimError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("too many results: {0}")]
    TooMany(String),

    #[error("uniqueness violation on {attribute}: {detail}")]
    Uniqueness { attribute: String, detail: String },

    #[error("mutability violation on {attribute}: {detail}")]
    Mutability { attribute: String, detail: String },

    #[error("invalid syntax: {0}")]
    InvalidSyntax(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("no such target: {0}")]
    NoTarget(String),

    #[error("invalid value for {attribute}: {detail}")]
    InvalidValue { attribute: String, detail: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ScimError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScimError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            ScimError::InvalidFilter(_) => ErrorKind::InvalidFilter,
            ScimError::TooMany(_) => ErrorKind::TooMany,
            ScimError::Uniqueness { .. } => ErrorKind::Uniqueness,
            ScimError::Mutability { .. } => ErrorKind::Mutability,
            ScimError::InvalidSyntax(_) => ErrorKind::InvalidSyntax,
            ScimError::InvalidPath(_) => ErrorKind::InvalidPath,
            ScimError::NoTarget(_) => ErrorKind::NoTarget,
            ScimError::InvalidValue { .. } => ErrorKind::InvalidValue,
            ScimError::NotFound(_) => ErrorKind::NotFound,
            ScimError::Conflict(_) => ErrorKind::Conflict,
            ScimError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn invalid_value(attribute: impl Into<String>, detail: impl fmt::Display) -> Self {
        ScimError::InvalidValue {
            attribute: attribute.into(),
            detail: detail.to_string(),
        }
    }

    pub fn mutability(attribute: impl Into<String>, detail: impl fmt::Display) -> Self {
        ScimError::Mutability {
            attribute: attribute.into(),
            detail: detail.to_string(),
        }
    }

    pub fn uniqueness(attribute: impl Into<String>, detail: impl fmt::Display) -> Self {
        ScimError::Uniqueness {
            attribute: attribute.into(),
            detail: detail.to_string(),
        }
    }
}

impl From<serde_json::Error> for ScimError {
    fn from(err: serde_json::Error) -> ScimError {
        ScimError::InvalidSyntax(err.to_string())
    }
}
