//! Character-driven tokenizer for the SCIM filter/path grammar.

use crate::utils::error::ScimError;

use super::urn_trie::UrnTrie;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    And,
    Or,
    Not,
    Pr,
    Eq,
    Ne,
    Co,
    Sw,
    Ew,
    Gt,
    Ge,
    Lt,
    Le,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    Str(String),
    Int(i64),
    Decimal(f64),
    Bool(bool),
    Null,
}

/// Identifiers begin `[A-Za-z$]`, continue `[A-Za-z0-9_-]`; `urn:`-prefixed
/// spans are matched greedily against the trie first so that the dots
/// inside a registered URN don't get mistaken for path separators.
pub fn tokenize(src: &str, trie: &UrnTrie) -> Result<Vec<Token>, ScimError> {
    let bytes = src.as_bytes();
    let mut i = 0usize;
    let mut tokens = Vec::new();

    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '"' => {
                let (literal, next) = scan_string(src, i)?;
                tokens.push(Token::Str(literal));
                i = next;
            }
            c if c.is_ascii_digit() || (c == '-' && peek_digit(bytes, i + 1)) => {
                let (tok, next) = scan_number(src, i)?;
                tokens.push(tok);
                i = next;
            }
            c if c.is_ascii_alphabetic() || c == '$' => {
                if src[i..].starts_with("urn:") {
                    if let Some(len) = trie.longest_registered_prefix(&src[i..]) {
                        // Consume any ":attributeName" (or ".sub.path") tail
                        // immediately following the registered URN prefix as
                        // part of the same qualified identifier.
                        let (suffix, next) = scan_ident(src, i + len);
                        tokens.push(Token::Ident(format!("{}{suffix}", &src[i..i + len])));
                        i = next;
                        continue;
                    }
                }
                let (word, next) = scan_ident(src, i);
                tokens.push(keyword_or_ident(&word));
                i = next;
            }
            other => {
                return Err(ScimError::InvalidSyntax(format!("unexpected character '{other}' at byte {i}")));
            }
        }
    }
    Ok(tokens)
}

fn peek_digit(bytes: &[u8], i: usize) -> bool {
    bytes.get(i).is_some_and(|b| (*b as char).is_ascii_digit())
}

fn scan_ident(src: &str, start: usize) -> (String, usize) {
    let bytes = src.as_bytes();
    let mut i = start;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == ':' || c == '$' {
            i += 1;
        } else {
            break;
        }
    }
    (src[start..i].to_string(), i)
}

fn keyword_or_ident(word: &str) -> Token {
    match word.to_ascii_lowercase().as_str() {
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        "pr" => Token::Pr,
        "eq" => Token::Eq,
        "ne" => Token::Ne,
        "co" => Token::Co,
        "sw" => Token::Sw,
        "ew" => Token::Ew,
        "gt" => Token::Gt,
        "ge" => Token::Ge,
        "lt" => Token::Lt,
        "le" => Token::Le,
        "true" => Token::Bool(true),
        "false" => Token::Bool(false),
        "null" => Token::Null,
        _ => Token::Ident(word.to_string()),
    }
}

fn scan_string(src: &str, start: usize) -> Result<(String, usize), ScimError> {
    let bytes = src.as_bytes();
    let mut i = start + 1;
    let mut out = String::new();
    loop {
        let Some(&b) = bytes.get(i) else {
            return Err(ScimError::InvalidSyntax("unterminated string literal".into()));
        };
        match b as char {
            '"' => return Ok((out, i + 1)),
            '\\' if bytes.get(i + 1).is_some() => {
                out.push(bytes[i + 1] as char);
                i += 2;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
}

fn scan_number(src: &str, start: usize) -> Result<(Token, usize), ScimError> {
    let bytes = src.as_bytes();
    let mut i = start;
    if bytes[i] as char == '-' {
        i += 1;
    }
    let mut is_decimal = false;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_ascii_digit() {
            i += 1;
        } else if c == '.' && !is_decimal {
            is_decimal = true;
            i += 1;
        } else {
            break;
        }
    }
    let slice = &src[start..i];
    if is_decimal {
        slice
            .parse::<f64>()
            .map(|v| (Token::Decimal(v), i))
            .map_err(|e| ScimError::InvalidSyntax(format!("bad decimal literal '{slice}': {e}")))
    } else {
        slice
            .parse::<i64>()
            .map(|v| (Token::Int(v), i))
            .map_err(|e| ScimError::InvalidSyntax(format!("bad integer literal '{slice}': {e}")))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn tokenizes_simple_relational_expression() {
        let trie = UrnTrie::new();
        let tokens = tokenize(r#"userName eq "IMULAB""#, &trie).unwrap();
        assert_eq!(
            tokens,
            vec![Token::Ident("userName".into()), Token::Eq, Token::Str("IMULAB".into())]
        );
    }

    #[test]
    fn tokenizes_urn_qualified_path_as_one_identifier() {
        let mut trie = UrnTrie::new();
        trie.insert("urn:ietf:params:scim:schemas:core:2.0:User");
        let tokens = tokenize("urn:ietf:params:scim:schemas:core:2.0:User:userName eq \"x\"", &trie).unwrap();
        assert_eq!(
            tokens[0],
            Token::Ident("urn:ietf:params:scim:schemas:core:2.0:User:userName".into())
        );
        assert_eq!(tokens[1], Token::Eq);
    }

    #[test]
    fn tokenizes_bracketed_embedded_filter() {
        let trie = UrnTrie::new();
        let tokens = tokenize(r#"emails[type eq "work"].value"#, &trie).unwrap();
        assert!(tokens.contains(&Token::LBracket));
        assert!(tokens.contains(&Token::RBracket));
        assert!(tokens.contains(&Token::Dot));
    }
}
