//! LRU cache of compiled expressions keyed by lowercased source text.
//! Advisory only: a cache miss just recompiles, so the cache is safe
//! under concurrent readers without synchronizing compilation itself.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use super::ast::Node;

pub struct ExpressionCache {
    inner: Mutex<LruCache<String, Node>>,
}

impl ExpressionCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        ExpressionCache {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, source: &str) -> Option<Node> {
        let key = source.to_lowercase();
        self.inner.lock().expect("expression cache lock poisoned").get(&key).cloned()
    }

    pub fn put(&self, source: &str, node: Node) {
        let key = source.to_lowercase();
        self.inner.lock().expect("expression cache lock poisoned").put(key, node);
    }
}

impl Default for ExpressionCache {
    fn default() -> Self {
        ExpressionCache::new(256)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::expr::ast::{Literal, PathSegment, RelOp};

    #[test]
    fn lookup_is_case_insensitive_on_source_text() {
        let cache = ExpressionCache::new(4);
        let node = Node::Relational {
            path: PathSegment::single("userName"),
            op: RelOp::Eq,
            literal: Some(Literal::Str("x".into())),
        };
        cache.put("userName EQ \"x\"", node.clone());
        assert_eq!(cache.get("username eq \"x\""), Some(node));
    }
}
