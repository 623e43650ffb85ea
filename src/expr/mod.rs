//! The filter/path expression compiler and evaluator: tokenizer, URN
//! trie, shunting-yard-precedence parser producing a hybrid tree/list
//! AST, an LRU compile cache, and an evaluator that walks the AST against
//! a property tree.

pub mod ast;
pub mod cache;
pub mod parser;
pub mod token;
pub mod urn_trie;

use crate::tree::property::{self, PropertyRef, ScalarValue};
use crate::utils::error::ScimError;

use ast::{Literal, Node, PathSegment, RelOp};
use cache::ExpressionCache;
use urn_trie::UrnTrie;

/// Owns the URN trie (populated at schema-registration time) and the
/// compile cache; the thing CRUD operators and the filter pipeline hold
/// onto for the process lifetime.
pub struct Compiler {
    trie: UrnTrie,
    cache: ExpressionCache,
}

impl Compiler {
    pub fn new() -> Self {
        Compiler {
            trie: UrnTrie::new(),
            cache: ExpressionCache::default(),
        }
    }

    pub fn register_urn(&mut self, urn: &str) {
        self.trie.insert(urn);
    }

    pub fn compile(&self, source: &str) -> Result<Node, ScimError> {
        if let Some(cached) = self.cache.get(source) {
            tracing::trace!(filter = source, "filter compile cache hit");
            return Ok(cached);
        }
        tracing::debug!(filter = source, "compiling filter");
        let tokens = token::tokenize(source, &self.trie)?;
        let node = parser::parse(&tokens).map_err(|err| {
            tracing::warn!(filter = source, error = %err, "filter compile failed");
            err
        })?;
        self.cache.put(source, node.clone());
        Ok(node)
    }

    /// Compiles a bare path (no top-level relational/logical operators),
    /// as used by `CRUD` operators. Not cache-backed: unlike query
    /// filters, PATCH paths are rarely repeated verbatim.
    pub fn compile_path(&self, source: &str) -> Result<PathSegment, ScimError> {
        tracing::debug!(path = source, "compiling path");
        let tokens = token::tokenize(source, &self.trie)?;
        parser::parse_path(&tokens).map_err(|err| {
            tracing::warn!(path = source, error = %err, "path compile failed");
            err
        })
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Compiler::new()
    }
}

/// Evaluates a compiled filter against `focus` (typically a resource
/// root). Relational operators are existential over a multiValued path:
/// `emails.value eq "x"` is true if any element's value matches.
pub fn evaluate(node: &Node, focus: &PropertyRef) -> Result<bool, ScimError> {
    match node {
        Node::And(l, r) => Ok(evaluate(l, focus)? && evaluate(r, focus)?),
        Node::Or(l, r) => Ok(evaluate(l, focus)? || evaluate(r, focus)?),
        Node::Not(inner) => Ok(!evaluate(inner, focus)?),
        Node::Relational { path, op, literal } => {
            let focuses = resolve(focus, path)?;
            Ok(match op {
                RelOp::Pr => focuses.iter().any(property::present),
                _ => {
                    let literal = literal.as_ref().expect("binary relational op always carries a literal");
                    focuses.iter().any(|f| evaluate_relational(f, *op, literal))
                }
            })
        }
    }
}

/// Focuses every property named by `segment` (and its chained
/// continuation), fanning out over multiValued attributes — filtered by
/// an embedded `[filter]` when present, or every element otherwise.
/// Shared by filter evaluation and the CRUD operators' path traversal.
pub fn resolve(focus: &PropertyRef, segment: &PathSegment) -> Result<Vec<PropertyRef>, ScimError> {
    let (focus, name) = strip_urn_prefix(focus, &segment.name);
    let current = property::sub_property(&focus, &name)
        .ok_or_else(|| ScimError::NoTarget(format!("no such attribute '{name}'")))?;

    let focuses: Vec<PropertyRef> = if let Some(elements) = property::elements(&current) {
        match &segment.filter {
            Some(filter_node) => elements
                .into_iter()
                .filter(|e| evaluate(filter_node, e).unwrap_or(false))
                .collect(),
            None => elements,
        }
    } else {
        if segment.filter.is_some() {
            return Err(ScimError::InvalidFilter(format!("filter applied to non-multiValued attribute '{name}'")));
        }
        vec![current]
    };

    match &segment.next {
        None => Ok(focuses),
        Some(next_segment) => {
            let mut out = Vec::new();
            for f in focuses {
                out.extend(resolve(&f, next_segment)?);
            }
            Ok(out)
        }
    }
}

/// A leading `urn:...:<Schema>:attr`-style segment skips the schema
/// hop when it names the resource's own core schema, or descends into
/// the matching schema-extension root when it names an extension.
fn strip_urn_prefix(focus: &PropertyRef, name: &str) -> (PropertyRef, String) {
    if let Some((urn, attr)) = name.rsplit_once(':') {
        if urn.starts_with("urn:") {
            if let Some(root) = property::sub_property(focus, urn) {
                return (root, attr.to_string());
            }
            return (focus.clone(), attr.to_string());
        }
    }
    (focus.clone(), name.to_string())
}

fn evaluate_relational(focus: &PropertyRef, op: RelOp, literal: &Literal) -> bool {
    if matches!(literal, Literal::Null) {
        return match op {
            RelOp::Eq => !property::present(focus),
            RelOp::Ne => property::present(focus),
            _ => false,
        };
    }
    let Some(value) = literal_to_scalar(literal) else {
        return false;
    };
    match op {
        RelOp::Eq => property::equals_to(focus, &value),
        RelOp::Ne => !property::equals_to(focus, &value),
        RelOp::Co => property::contains(focus, &value),
        RelOp::Sw => property::starts_with(focus, &value),
        RelOp::Ew => property::ends_with(focus, &value),
        RelOp::Gt => property::greater_than(focus, &value),
        RelOp::Ge => property::greater_than(focus, &value) || property::equals_to(focus, &value),
        RelOp::Lt => property::less_than(focus, &value),
        RelOp::Le => property::less_than(focus, &value) || property::equals_to(focus, &value),
        RelOp::Pr => unreachable!("pr is handled before reaching evaluate_relational"),
    }
}

fn literal_to_scalar(literal: &Literal) -> Option<ScalarValue> {
    Some(match literal {
        Literal::Str(s) => ScalarValue::Str(s.clone()),
        Literal::Int(i) => ScalarValue::Int(*i),
        Literal::Decimal(d) => ScalarValue::Decimal(*d),
        Literal::Bool(b) => ScalarValue::Bool(*b),
        Literal::Null => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attribute, DataType};
    use crate::tree::property::{add_element, construct_root, replace_scalar, sub_property};

    fn user_like_root() -> PropertyRef {
        let email = Attribute::complex(
            "test:emails",
            "emails",
            vec![
                Attribute::scalar("test:emails.value", "value", DataType::String),
                Attribute::scalar("test:emails.type", "type", DataType::String),
            ],
        )
        .multi_valued();
        let user_name = Attribute::scalar("test:userName", "userName", DataType::String).case_exact();
        let root = Attribute::complex("test:User", "User", vec![user_name, email]);
        construct_root(root)
    }

    #[test]
    fn s1_eq_on_string_is_case_insensitive_when_not_case_exact() {
        let root = Attribute::complex(
            "test:User",
            "User",
            vec![Attribute::scalar("test:userName", "userName", DataType::String)],
        );
        let root = construct_root(root);
        replace_scalar(&sub_property(&root, "userName").unwrap(), ScalarValue::Str("imulab".into())).unwrap();

        let compiler = Compiler::new();
        let ast = compiler.compile(r#"userName eq "IMULAB""#).unwrap();
        assert!(evaluate(&ast, &root).unwrap());
    }

    #[test]
    fn s2_pr_on_multi_valued_is_existential() {
        let root = user_like_root();
        let emails = sub_property(&root, "emails").unwrap();
        add_element(&emails, |e| replace_scalar(&sub_property(e, "value").unwrap(), ScalarValue::Str("a@b".into()))).unwrap();

        let compiler = Compiler::new();
        let ast = compiler.compile("emails pr").unwrap();
        assert!(evaluate(&ast, &root).unwrap());
    }

    #[test]
    fn s3_nested_pr_walks_into_element_sub_attribute() {
        let root = user_like_root();
        let emails = sub_property(&root, "emails").unwrap();
        add_element(&emails, |e| replace_scalar(&sub_property(e, "value").unwrap(), ScalarValue::Str("a@b".into()))).unwrap();

        let compiler = Compiler::new();
        let ast = compiler.compile("emails.value pr").unwrap();
        assert!(evaluate(&ast, &root).unwrap());
    }

    #[test]
    fn embedded_filter_selects_only_matching_elements() {
        let root = user_like_root();
        let emails = sub_property(&root, "emails").unwrap();
        add_element(&emails, |e| {
            replace_scalar(&sub_property(e, "value").unwrap(), ScalarValue::Str("work@b".into()))?;
            replace_scalar(&sub_property(e, "type").unwrap(), ScalarValue::Str("work".into()))
        })
        .unwrap();
        add_element(&emails, |e| {
            replace_scalar(&sub_property(e, "value").unwrap(), ScalarValue::Str("home@b".into()))?;
            replace_scalar(&sub_property(e, "type").unwrap(), ScalarValue::Str("home".into()))
        })
        .unwrap();

        let compiler = Compiler::new();
        let ast = compiler.compile(r#"emails[type eq "work"].value sw "work""#).unwrap();
        assert!(evaluate(&ast, &root).unwrap());

        let ast = compiler.compile(r#"emails[type eq "missing"].value sw "work""#).unwrap();
        assert!(!evaluate(&ast, &root).unwrap());
    }

    #[test]
    fn unknown_attribute_is_no_target() {
        let root = user_like_root();
        let compiler = Compiler::new();
        let ast = compiler.compile("bogus eq \"x\"").unwrap();
        let err = evaluate(&ast, &root).unwrap_err();
        assert!(matches!(err, ScimError::NoTarget(_)));
    }
}
