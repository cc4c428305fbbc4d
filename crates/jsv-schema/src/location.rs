//! # Location-Tracking Parse
//!
//! A small JSON parser that records, for every node it constructs, the
//! position at which the node was produced. Nodes live in an arena and are
//! addressed by [`NodeId`]; locations are stored in a vector indexed by the
//! same id, so lookups never depend on value equality.
//!
//! Scalars are located after their token has been consumed. Objects and
//! arrays are located once their opening bracket has been consumed.
//!
//! [`LocatedDocument::locate`] maps a JSON Pointer back to a line. Malformed
//! or dangling pointers map to the `(0, 0)` sentinel. The reported column is
//! always `0`.

use thiserror::Error;

/// Maximum container nesting accepted by the parser.
const MAX_DEPTH: usize = 512;

/// Stable index of a node within one [`LocatedDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// A position in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// 1-based line, `0` when unknown.
    pub line: usize,
    /// Column, `0` when unknown.
    pub column: usize,
}

#[derive(Debug, Clone)]
enum NodeKind {
    Scalar,
    Array(Vec<NodeId>),
    Object(Vec<(String, NodeId)>),
}

/// Error from the location-tracking parse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocationError {
    /// The text is not well-formed JSON.
    #[error("syntax error at line {line}, column {column}: {reason}")]
    Syntax {
        /// Line of the offending character.
        line: usize,
        /// Column of the offending character.
        column: usize,
        /// What was expected.
        reason: String,
    },

    /// Containers are nested deeper than the parser allows.
    #[error("document nesting exceeds {MAX_DEPTH} levels")]
    TooDeep,
}

/// A parsed document with one recorded position per node.
#[derive(Debug, Clone)]
pub struct LocatedDocument {
    nodes: Vec<NodeKind>,
    locations: Vec<Position>,
    root: NodeId,
}

impl LocatedDocument {
    /// Parse `text`, recording node positions.
    pub fn parse(text: &str) -> Result<Self, LocationError> {
        let mut parser = Parser::new(text);
        parser.skip_whitespace();
        let root = parser.value(0)?;
        parser.skip_whitespace();
        if parser.peek().is_some() {
            return Err(parser.error("trailing characters after document"));
        }
        Ok(Self {
            nodes: parser.nodes,
            locations: parser.locations,
            root,
        })
    }

    /// Number of nodes in the arena.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Recorded position of a node.
    pub fn position(&self, node: NodeId) -> Position {
        self.locations.get(node.0).copied().unwrap_or_default()
    }

    /// Resolve a JSON Pointer to a node.
    ///
    /// Accepts plain (`/a/0`) and fragment (`#/a/0`) forms. For duplicate
    /// object keys the last occurrence wins.
    pub fn resolve(&self, pointer: &str) -> Option<NodeId> {
        let pointer = pointer.strip_prefix('#').unwrap_or(pointer);
        if pointer.is_empty() {
            return Some(self.root);
        }
        let rest = pointer.strip_prefix('/')?;
        let mut node = self.root;
        for raw in rest.split('/') {
            let token = raw.replace("~1", "/").replace("~0", "~");
            node = match self.nodes.get(node.0)? {
                NodeKind::Object(members) => members
                    .iter()
                    .rev()
                    .find(|(key, _)| *key == token)
                    .map(|(_, id)| *id)?,
                NodeKind::Array(items) => items.get(array_index(&token)?).copied()?,
                NodeKind::Scalar => return None,
            };
        }
        Some(node)
    }

    /// Line of the node addressed by `pointer`, with column `0`.
    pub fn locate(&self, pointer: &str) -> Position {
        match self.resolve(pointer) {
            Some(node) => Position {
                line: self.position(node).line,
                column: 0,
            },
            None => Position::default(),
        }
    }
}

fn array_index(token: &str) -> Option<usize> {
    let digits = !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit());
    if !digits || (token.len() > 1 && token.starts_with('0')) {
        return None;
    }
    token.parse().ok()
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
    line: usize,
    column: usize,
    nodes: Vec<NodeKind>,
    locations: Vec<Position>,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos: 0,
            line: 1,
            column: 0,
            nodes: Vec::new(),
            locations: Vec::new(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(b)
    }

    fn here(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
        }
    }

    fn error(&self, reason: &str) -> LocationError {
        LocationError::Syntax {
            line: self.line,
            column: self.column,
            reason: reason.to_string(),
        }
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(kind);
        self.locations.push(self.here());
        id
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.bump();
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), LocationError> {
        if self.peek() == Some(byte) {
            self.bump();
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", byte as char)))
        }
    }

    fn value(&mut self, depth: usize) -> Result<NodeId, LocationError> {
        match self.peek() {
            Some(b'{') => self.object(depth + 1),
            Some(b'[') => self.array(depth + 1),
            Some(b'"') => {
                self.string()?;
                Ok(self.alloc(NodeKind::Scalar))
            }
            Some(b't') => self.literal("true"),
            Some(b'f') => self.literal("false"),
            Some(b'n') => self.literal("null"),
            Some(b'-' | b'0'..=b'9') => self.number(),
            Some(_) => Err(self.error("expected a JSON value")),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn object(&mut self, depth: usize) -> Result<NodeId, LocationError> {
        if depth > MAX_DEPTH {
            return Err(LocationError::TooDeep);
        }
        self.bump();
        let id = self.alloc(NodeKind::Scalar);
        let mut members = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(b'}') {
            self.bump();
        } else {
            loop {
                self.skip_whitespace();
                let key = self.string()?;
                self.skip_whitespace();
                self.expect(b':')?;
                self.skip_whitespace();
                let child = self.value(depth)?;
                members.push((key, child));
                self.skip_whitespace();
                match self.bump() {
                    Some(b',') => continue,
                    Some(b'}') => break,
                    _ => return Err(self.error("expected ',' or '}'")),
                }
            }
        }
        self.nodes[id.0] = NodeKind::Object(members);
        Ok(id)
    }

    fn array(&mut self, depth: usize) -> Result<NodeId, LocationError> {
        if depth > MAX_DEPTH {
            return Err(LocationError::TooDeep);
        }
        self.bump();
        let id = self.alloc(NodeKind::Scalar);
        let mut items = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(b']') {
            self.bump();
        } else {
            loop {
                self.skip_whitespace();
                items.push(self.value(depth)?);
                self.skip_whitespace();
                match self.bump() {
                    Some(b',') => continue,
                    Some(b']') => break,
                    _ => return Err(self.error("expected ',' or ']'")),
                }
            }
        }
        self.nodes[id.0] = NodeKind::Array(items);
        Ok(id)
    }

    fn literal(&mut self, word: &str) -> Result<NodeId, LocationError> {
        if !self.bytes[self.pos..].starts_with(word.as_bytes()) {
            return Err(self.error(&format!("expected '{word}'")));
        }
        for _ in 0..word.len() {
            self.bump();
        }
        Ok(self.alloc(NodeKind::Scalar))
    }

    fn number(&mut self) -> Result<NodeId, LocationError> {
        let start = self.pos;
        while matches!(
            self.peek(),
            Some(b'-' | b'+' | b'.' | b'e' | b'E' | b'0'..=b'9')
        ) {
            self.bump();
        }
        if !self.bytes[start..self.pos].iter().any(u8::is_ascii_digit) {
            return Err(self.error("malformed number"));
        }
        Ok(self.alloc(NodeKind::Scalar))
    }

    /// Consume a string literal and return its decoded contents.
    fn string(&mut self) -> Result<String, LocationError> {
        self.expect(b'"')?;
        let mut out: Vec<u8> = Vec::new();
        loop {
            match self.bump() {
                Some(b'"') => break,
                Some(b'\\') => {
                    let escaped = self
                        .bump()
                        .ok_or_else(|| self.error("unterminated escape"))?;
                    match escaped {
                        b'"' | b'\\' | b'/' => out.push(escaped),
                        b'b' => out.push(0x08),
                        b'f' => out.push(0x0c),
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'u' => {
                            let c = self.unicode_escape()?;
                            let mut buf = [0u8; 4];
                            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                        }
                        _ => return Err(self.error("invalid escape")),
                    }
                }
                Some(b) => out.push(b),
                None => return Err(self.error("unterminated string")),
            }
        }
        String::from_utf8(out).map_err(|_| self.error("invalid UTF-8 in string"))
    }

    fn hex4(&mut self) -> Result<u32, LocationError> {
        let mut value = 0u32;
        for _ in 0..4 {
            let digit = self
                .bump()
                .and_then(|b| (b as char).to_digit(16))
                .ok_or_else(|| self.error("invalid unicode escape"))?;
            value = value * 16 + digit;
        }
        Ok(value)
    }

    fn unicode_escape(&mut self) -> Result<char, LocationError> {
        let high = self.hex4()?;
        if (0xD800..0xDC00).contains(&high) && self.bytes[self.pos..].starts_with(b"\\u") {
            self.bump();
            self.bump();
            let low = self.hex4()?;
            if (0xDC00..0xE000).contains(&low) {
                let combined = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                return Ok(char::from_u32(combined).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            return Ok(char::REPLACEMENT_CHARACTER);
        }
        Ok(char::from_u32(high).unwrap_or(char::REPLACEMENT_CHARACTER))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRETTY: &str = "{\n  \"a\": 1,\n  \"list\": [\n    true,\n    {\n      \"k/ey\": \"v\"\n    }\n  ],\n  \"t~x\": null\n}";

    #[test]
    fn test_scalar_lines() {
        let doc = LocatedDocument::parse(PRETTY).unwrap();
        assert_eq!(doc.locate("/a").line, 2);
        assert_eq!(doc.locate("/list/0").line, 4);
        assert_eq!(doc.locate("/list/1/k~1ey").line, 6);
        assert_eq!(doc.locate("/t~0x").line, 9);
    }

    #[test]
    fn test_containers_located_at_opening_bracket() {
        let doc = LocatedDocument::parse(PRETTY).unwrap();
        assert_eq!(doc.locate("").line, 1);
        assert_eq!(doc.locate("/list").line, 3);
        assert_eq!(doc.locate("/list/1").line, 5);
    }

    #[test]
    fn test_empty_pointer_locates_root() {
        let doc = LocatedDocument::parse("\n\n{\n  \"a\": 1\n}").unwrap();
        assert_eq!(doc.locate("").line, 3);
        assert_eq!(doc.locate("#").line, 3);
        assert_eq!(doc.locate("/missing").line, 0);
    }

    #[test]
    fn test_fragment_form_and_column_is_zero() {
        let doc = LocatedDocument::parse(PRETTY).unwrap();
        let position = doc.locate("#/a");
        assert_eq!(position, Position { line: 2, column: 0 });
        let root = doc.resolve("#").unwrap();
        assert!(doc.position(root).column > 0);
    }

    #[test]
    fn test_bad_pointers_hit_sentinel() {
        let doc = LocatedDocument::parse(PRETTY).unwrap();
        for pointer in ["a", "/missing", "/list/2", "/list/01", "/list/-", "/a/b", "#/"] {
            assert_eq!(doc.locate(pointer), Position::default(), "pointer {pointer}");
        }
    }

    #[test]
    fn test_duplicate_keys_last_wins() {
        let doc = LocatedDocument::parse("{\n\"a\": 1,\n\"a\": 2\n}").unwrap();
        assert_eq!(doc.locate("/a").line, 3);
    }

    #[test]
    fn test_every_node_has_one_location() {
        let doc = LocatedDocument::parse(PRETTY).unwrap();
        assert_eq!(doc.node_count(), 7);
        assert_eq!(doc.locations.len(), doc.node_count());
    }

    #[test]
    fn test_unicode_keys() {
        let doc = LocatedDocument::parse("{\"\\u00e9t\\u00e9\": [\n\"\\ud83d\\ude00\"]}").unwrap();
        assert_eq!(doc.locate("/été/0").line, 2);
    }

    #[test]
    fn test_malformed_input_rejected() {
        assert!(LocatedDocument::parse("{\"a\": }").is_err());
        assert!(LocatedDocument::parse("[1, 2").is_err());
        assert!(LocatedDocument::parse("{} {}").is_err());
        assert!(LocatedDocument::parse("\"open").is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}{}", "[".repeat(MAX_DEPTH + 1), "]".repeat(MAX_DEPTH + 1));
        assert_eq!(LocatedDocument::parse(&deep).unwrap_err(), LocationError::TooDeep);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn parse_never_panics(text in "\\PC{0,64}") {
                let _ = LocatedDocument::parse(&text);
            }

            #[test]
            fn locate_is_idempotent(pointer in "(/[a-z0-9~]{0,4}){0,4}") {
                let doc = LocatedDocument::parse(PRETTY).unwrap();
                prop_assert_eq!(doc.locate(&pointer), doc.locate(&pointer));
            }
        }
    }
}
