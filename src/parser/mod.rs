//! Tolerant JSON parser producing a value and a position-annotated tree.
//!
//! Accepts strict JSON plus the comment-tolerant dialect used by policy
//! files: `//` line comments, `/* */` block comments and trailing commas.
//! Malformed input never panics; errors are collected in
//! [`ParsedDocument::syntax_errors`] and the parser recovers where it can,
//! yielding a partial tree.

pub mod ast;
pub mod line_index;

use serde_json::{Map, Value};

pub use ast::{AstNode, PathSegment, Span, find_node_by_path, find_property_by_path, parse_pointer};
pub use line_index::{LineIndex, SourceSpan};

const MAX_DEPTH: usize = 128;

/// A syntax error with its byte location.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

/// Result of parsing one document version.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub text: String,
    /// `None` when nothing could be recovered.
    pub value: Option<Value>,
    pub tree: Option<AstNode>,
    pub syntax_errors: Vec<ParseError>,
    line_index: LineIndex,
}

impl ParsedDocument {
    /// Parsed without any syntax error.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.syntax_errors.is_empty() && self.value.is_some()
    }

    #[must_use]
    pub const fn line_index(&self) -> &LineIndex {
        &self.line_index
    }

    /// Line/column range of a node.
    #[must_use]
    pub fn range_of(&self, node: &AstNode) -> SourceSpan {
        self.span_of(node.span())
    }

    #[must_use]
    pub fn span_of(&self, span: Span) -> SourceSpan {
        self.line_index.span(&self.text, span.offset, span.end())
    }

    /// Value node at `path`, if it exists.
    #[must_use]
    pub fn node_at(&self, path: &[PathSegment]) -> Option<&AstNode> {
        find_node_by_path(self.tree.as_ref()?, path)
    }

    /// Span of the first line of the document.
    #[must_use]
    pub fn first_line(&self) -> SourceSpan {
        let end = self.text.find('\n').unwrap_or(self.text.len());
        self.line_index.span(&self.text, 0, end)
    }
}

/// Parse `text` into a [`ParsedDocument`].
#[must_use]
pub fn parse(text: &str) -> ParsedDocument {
    let mut parser = Parser::new(text);
    parser.skip_trivia();
    let root = if parser.at_end() {
        parser.error_at(parser.pos, 0, "empty document");
        None
    } else {
        parser.parse_value(0)
    };

    parser.skip_trivia();
    if root.is_some() && !parser.at_end() {
        let pos = parser.pos;
        parser.error_at(pos, text.len() - pos, "unexpected content after document end");
    }

    let (tree, value) = match root {
        Some((tree, value)) => (Some(tree), Some(value)),
        None => (None, None),
    };

    ParsedDocument {
        text: text.to_string(),
        value,
        tree,
        syntax_errors: parser.errors,
        line_index: LineIndex::new(text),
    }
}

struct Parser<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    errors: Vec<ParseError>,
}

impl<'a> Parser<'a> {
    const fn new(text: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
            errors: Vec::new(),
        }
    }

    const fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn error_at(&mut self, offset: usize, length: usize, message: impl Into<String>) {
        self.errors.push(ParseError {
            message: message.into(),
            span: Span::new(offset, length),
        });
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\n' | b'\r') => self.pos += 1,
                Some(b'/') => match self.bytes.get(self.pos + 1) {
                    Some(b'/') => {
                        while let Some(b) = self.peek() {
                            if b == b'\n' {
                                break;
                            }
                            self.pos += 1;
                        }
                    }
                    Some(b'*') => {
                        let start = self.pos;
                        match self.text[self.pos + 2..].find("*/") {
                            Some(end) => self.pos += 2 + end + 2,
                            None => {
                                self.pos = self.bytes.len();
                                self.error_at(start, self.pos - start, "unterminated block comment");
                            }
                        }
                    }
                    _ => return,
                },
                _ => return,
            }
        }
    }

    fn parse_value(&mut self, depth: usize) -> Option<(AstNode, Value)> {
        if depth > MAX_DEPTH {
            self.error_at(self.pos, 1, "document nested too deeply");
            self.pos = self.bytes.len();
            return None;
        }
        match self.peek()? {
            b'{' => Some(self.parse_object(depth)),
            b'[' => Some(self.parse_array(depth)),
            b'"' => {
                let (span, value) = self.parse_string();
                let value = Value::String(value);
                Some((
                    AstNode::Scalar {
                        span,
                        value: value.clone(),
                    },
                    value,
                ))
            }
            b'-' | b'0'..=b'9' => self.parse_number(),
            b't' => self.parse_literal("true", Value::Bool(true)),
            b'f' => self.parse_literal("false", Value::Bool(false)),
            b'n' => self.parse_literal("null", Value::Null),
            _ => {
                let start = self.pos;
                let len = self.text[start..].chars().next().map_or(1, char::len_utf8);
                self.error_at(start, len, "expected a value");
                None
            }
        }
    }

    fn parse_object(&mut self, depth: usize) -> (AstNode, Value) {
        let start = self.pos;
        self.pos += 1;
        let mut children = Vec::new();
        let mut map = Map::new();

        loop {
            self.skip_trivia();
            match self.peek() {
                None => {
                    self.error_at(start, 1, "unterminated object");
                    break;
                }
                Some(b'}') => {
                    self.pos += 1;
                    break;
                }
                Some(b'"') => {
                    let (key_span, key) = self.parse_string();
                    self.skip_trivia();
                    let value = if self.peek() == Some(b':') {
                        self.pos += 1;
                        self.skip_trivia();
                        self.parse_value(depth + 1)
                    } else {
                        self.error_at(self.pos, 0, format!("expected ':' after \"{key}\""));
                        None
                    };

                    let end = value
                        .as_ref()
                        .map_or(key_span.end(), |(node, _)| node.span().end());
                    let value_node = match value {
                        Some((node, value)) => {
                            // First occurrence of a duplicate key wins, matching tree lookup.
                            map.entry(key.clone()).or_insert(value);
                            Some(Box::new(node))
                        }
                        None => {
                            self.recover(&[b',', b'}']);
                            None
                        }
                    };
                    children.push(AstNode::Property {
                        span: Span::between(key_span.offset, end),
                        key,
                        key_span,
                        value: value_node,
                    });

                    self.skip_trivia();
                    match self.peek() {
                        Some(b',') => self.pos += 1,
                        Some(b'}') | None => {}
                        Some(b'"') => self.error_at(self.pos, 0, "expected ','"),
                        Some(_) => {
                            self.error_at(self.pos, 1, "expected ',' or '}'");
                            self.recover(&[b',', b'}']);
                            if self.peek() == Some(b',') {
                                self.pos += 1;
                            }
                        }
                    }
                }
                Some(_) => {
                    self.error_at(self.pos, 1, "expected property name");
                    let before = self.pos;
                    self.recover(&[b',', b'}']);
                    if self.peek() == Some(b',') || self.pos == before {
                        self.pos += 1;
                    }
                }
            }
        }

        (
            AstNode::Object {
                span: Span::between(start, self.pos),
                children,
            },
            Value::Object(map),
        )
    }

    fn parse_array(&mut self, depth: usize) -> (AstNode, Value) {
        let start = self.pos;
        self.pos += 1;
        let mut children = Vec::new();
        let mut values = Vec::new();

        loop {
            self.skip_trivia();
            match self.peek() {
                None => {
                    self.error_at(start, 1, "unterminated array");
                    break;
                }
                Some(b']') => {
                    self.pos += 1;
                    break;
                }
                Some(_) => {
                    let before = self.pos;
                    match self.parse_value(depth + 1) {
                        Some((node, value)) => {
                            children.push(node);
                            values.push(value);
                        }
                        None => {
                            self.recover(&[b',', b']']);
                            if self.pos == before && self.peek() != Some(b']') {
                                self.pos += 1;
                            }
                        }
                    }
                    self.skip_trivia();
                    match self.peek() {
                        Some(b',') => self.pos += 1,
                        Some(b']') | None => {}
                        Some(_) => self.error_at(self.pos, 0, "expected ','"),
                    }
                }
            }
        }

        (
            AstNode::Array {
                span: Span::between(start, self.pos),
                children,
            },
            Value::Array(values),
        )
    }

    /// Parse a string token starting at the opening quote.
    ///
    /// An unterminated string ends at the line break.
    fn parse_string(&mut self) -> (Span, String) {
        let text = self.text;
        let start = self.pos;
        let mut idx = start + 1;
        let mut terminated = false;
        while let Some(&b) = self.bytes.get(idx) {
            match b {
                b'\\' => idx += 2,
                b'"' => {
                    idx += 1;
                    terminated = true;
                    break;
                }
                b'\n' => break,
                _ => idx += 1,
            }
        }
        let end = idx.min(self.bytes.len());
        self.pos = end;

        if !terminated {
            self.error_at(start, end - start, "unterminated string");
            return (
                Span::between(start, end),
                text[start + 1..end].trim_end().to_string(),
            );
        }

        let raw = &text[start..end];
        let decoded = serde_json::from_str::<String>(raw).unwrap_or_else(|_| {
            self.error_at(start, end - start, "invalid string escape");
            raw[1..raw.len() - 1].to_string()
        });
        (Span::between(start, end), decoded)
    }

    fn parse_number(&mut self) -> Option<(AstNode, Value)> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.' | b'e' | b'E') {
                self.pos += 1;
            } else {
                break;
            }
        }
        let raw = &self.text[start..self.pos];
        match serde_json::from_str::<serde_json::Number>(raw) {
            Ok(number) => {
                let value = Value::Number(number);
                Some((
                    AstNode::Scalar {
                        span: Span::between(start, self.pos),
                        value: value.clone(),
                    },
                    value,
                ))
            }
            Err(_) => {
                self.error_at(start, self.pos - start, format!("invalid number '{raw}'"));
                None
            }
        }
    }

    fn parse_literal(&mut self, word: &str, value: Value) -> Option<(AstNode, Value)> {
        let start = self.pos;
        if self.text[start..].starts_with(word) {
            self.pos += word.len();
            Some((
                AstNode::Scalar {
                    span: Span::between(start, self.pos),
                    value: value.clone(),
                },
                value,
            ))
        } else {
            let len = self.text[start..]
                .find(|c: char| !c.is_ascii_alphanumeric())
                .unwrap_or(self.text.len() - start)
                .max(1);
            self.error_at(start, len, "expected a value");
            None
        }
    }

    /// Skip ahead to one of `stops` at the current nesting level.
    fn recover(&mut self, stops: &[u8]) {
        let mut depth = 0usize;
        while let Some(b) = self.peek() {
            match b {
                b'"' => {
                    self.parse_string_silently();
                    continue;
                }
                b'{' | b'[' => depth += 1,
                b'}' | b']' if depth > 0 => depth -= 1,
                _ if depth == 0 && stops.contains(&b) => return,
                b'}' | b']' => return,
                _ => {}
            }
            self.pos += 1;
        }
    }

    fn parse_string_silently(&mut self) {
        let errors = self.errors.len();
        let _ = self.parse_string();
        self.errors.truncate(errors);
    }
}
