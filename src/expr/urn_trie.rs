//! A trie over registered schema URNs, used by the tokenizer to tell a
//! URN's internal `.` (e.g. the `2.0` in
//! `urn:ietf:params:scim:schemas:core:2.0:User`) apart from a path
//! separator.

use std::collections::HashMap;

#[derive(Default)]
struct Node {
    children: HashMap<char, Node>,
    terminal: bool,
}

#[derive(Default)]
pub struct UrnTrie {
    root: Node,
}

impl UrnTrie {
    pub fn new() -> Self {
        UrnTrie::default()
    }

    pub fn insert(&mut self, urn: &str) {
        let mut node = &mut self.root;
        for ch in urn.chars() {
            node = node.children.entry(ch).or_default();
        }
        node.terminal = true;
    }

    /// The byte length of the longest registered URN that is a prefix of
    /// `s`, if any.
    pub fn longest_registered_prefix(&self, s: &str) -> Option<usize> {
        let mut node = &self.root;
        let mut longest = None;
        let mut consumed = 0;
        for ch in s.chars() {
            match node.children.get(&ch) {
                Some(next) => {
                    node = next;
                    consumed += ch.len_utf8();
                    if node.terminal {
                        longest = Some(consumed);
                    }
                }
                None => break,
            }
        }
        longest
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn longest_prefix_stops_before_trailing_attribute_name() {
        let mut trie = UrnTrie::new();
        trie.insert("urn:ietf:params:scim:schemas:core:2.0:User");
        let input = "urn:ietf:params:scim:schemas:core:2.0:User:userName eq \"x\"";
        let len = trie.longest_registered_prefix(input).unwrap();
        assert_eq!(&input[..len], "urn:ietf:params:scim:schemas:core:2.0:User");
    }

    #[test]
    fn unregistered_urn_has_no_match() {
        let trie = UrnTrie::new();
        assert_eq!(trie.longest_registered_prefix("urn:example:unknown"), None);
    }
}
