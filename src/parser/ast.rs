//! Position-annotated syntax tree.

use std::fmt;

use serde_json::Value;

/// Byte range of a node in the source text.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash)]
pub struct Span {
    pub offset: usize,
    pub length: usize,
}

impl Span {
    #[must_use]
    pub const fn new(offset: usize, length: usize) -> Self {
        Self { offset, length }
    }

    #[must_use]
    pub const fn between(start: usize, end: usize) -> Self {
        Self {
            offset: start,
            length: end.saturating_sub(start),
        }
    }

    #[must_use]
    pub const fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// One step of a value path: an object key or an array index.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl PathSegment {
    pub fn key(key: impl Into<String>) -> Self {
        Self::Key(key.into())
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => write!(f, "{key}"),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Parse a JSON pointer (`/a/0/b`) into path segments.
///
/// Numeric segments become indices; `~1` and `~0` are unescaped.
#[must_use]
pub fn parse_pointer(pointer: &str) -> Vec<PathSegment> {
    pointer
        .split('/')
        .skip(1)
        .map(|raw| {
            let token = raw.replace("~1", "/").replace("~0", "~");
            match token.parse::<usize>() {
                Ok(index) if !token.starts_with('+') => PathSegment::Index(index),
                _ => PathSegment::Key(token),
            }
        })
        .collect()
}

/// A syntax tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum AstNode {
    /// `{ ... }`; children are always `Property` nodes.
    Object { span: Span, children: Vec<AstNode> },
    Array { span: Span, children: Vec<AstNode> },
    /// `"key": value`. `value` is `None` when recovery dropped it.
    Property {
        span: Span,
        key: String,
        key_span: Span,
        value: Option<Box<AstNode>>,
    },
    /// String, number, boolean or null.
    Scalar { span: Span, value: Value },
}

impl AstNode {
    #[must_use]
    pub const fn span(&self) -> Span {
        match self {
            Self::Object { span, .. }
            | Self::Array { span, .. }
            | Self::Property { span, .. }
            | Self::Scalar { span, .. } => *span,
        }
    }

    #[must_use]
    pub fn children(&self) -> &[AstNode] {
        match self {
            Self::Object { children, .. } | Self::Array { children, .. } => children,
            _ => &[],
        }
    }

    #[must_use]
    pub const fn is_object(&self) -> bool {
        matches!(self, Self::Object { .. })
    }

    /// The string content of a string scalar.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar { value, .. } => value.as_str(),
            _ => None,
        }
    }

    /// Find the property node named `key` in an object node.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&AstNode> {
        self.children().iter().find(
            |child| matches!(child, Self::Property { key: k, .. } if k == key),
        )
    }

    /// Value of the property named `key` in an object node.
    #[must_use]
    pub fn property_value(&self, key: &str) -> Option<&AstNode> {
        match self.property(key)? {
            Self::Property { value, .. } => value.as_deref(),
            _ => None,
        }
    }

    /// Step into one path segment.
    #[must_use]
    pub fn child(&self, segment: &PathSegment) -> Option<&AstNode> {
        match (self, segment) {
            (Self::Object { .. }, PathSegment::Key(key)) => self.property_value(key),
            (Self::Array { children, .. }, PathSegment::Index(index)) => children.get(*index),
            _ => None,
        }
    }

    /// Walk every value node reachable from `self`, paired with its path.
    ///
    /// Property nodes are not yielded themselves; their values are.
    #[must_use]
    pub fn walk(&self) -> Vec<(Vec<PathSegment>, &AstNode)> {
        let mut out = Vec::new();
        walk_into(self, &mut Vec::new(), &mut out);
        out
    }
}

fn walk_into<'a>(
    node: &'a AstNode,
    path: &mut Vec<PathSegment>,
    out: &mut Vec<(Vec<PathSegment>, &'a AstNode)>,
) {
    out.push((path.clone(), node));
    match node {
        AstNode::Object { children, .. } => {
            for child in children {
                if let AstNode::Property {
                    key,
                    value: Some(value),
                    ..
                } = child
                {
                    path.push(PathSegment::Key(key.clone()));
                    walk_into(value, path, out);
                    path.pop();
                }
            }
        }
        AstNode::Array { children, .. } => {
            for (index, child) in children.iter().enumerate() {
                path.push(PathSegment::Index(index));
                walk_into(child, path, out);
                path.pop();
            }
        }
        _ => {}
    }
}

/// Resolve a value node by walking `path` from `root`.
///
/// Returns `None` as soon as a segment cannot be resolved.
#[must_use]
pub fn find_node_by_path<'a>(root: &'a AstNode, path: &[PathSegment]) -> Option<&'a AstNode> {
    path.iter().try_fold(root, |node, segment| node.child(segment))
}

/// Resolve the property node holding the value at `path`.
///
/// The last segment must be a key.
#[must_use]
pub fn find_property_by_path<'a>(root: &'a AstNode, path: &[PathSegment]) -> Option<&'a AstNode> {
    let (last, parent) = path.split_last()?;
    let PathSegment::Key(key) = last else {
        return None;
    };
    find_node_by_path(root, parent)?.property(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn test_parse_pointer() {
        assert_eq!(parse_pointer(""), Vec::<PathSegment>::new());
        assert_eq!(
            parse_pointer("/properties/policyDefinitions/3/policyDefinitionId"),
            vec![
                PathSegment::key("properties"),
                PathSegment::key("policyDefinitions"),
                PathSegment::Index(3),
                PathSegment::key("policyDefinitionId"),
            ]
        );
        assert_eq!(parse_pointer("/a~1b/c~0d"), vec![
            PathSegment::key("a/b"),
            PathSegment::key("c~d")
        ]);
    }

    #[test]
    fn test_find_node_by_path() {
        let doc = parse(r#"{"a": {"b": [10, {"c": "x"}]}}"#);
        let tree = doc.tree.as_ref().unwrap();

        let node = find_node_by_path(tree, &["a".into(), "b".into(), PathSegment::Index(1), "c".into()]).unwrap();
        assert_eq!(node.as_str(), Some("x"));

        assert!(find_node_by_path(tree, &["a".into(), "missing".into()]).is_none());
        assert!(find_node_by_path(tree, &["a".into(), "b".into(), PathSegment::Index(7)]).is_none());
        assert!(find_node_by_path(tree, &["a".into(), PathSegment::Index(0)]).is_none());
    }

    #[test]
    fn test_find_property_by_path() {
        let text = r#"{"a": {"b": 1}}"#;
        let doc = parse(text);
        let tree = doc.tree.as_ref().unwrap();
        let prop = find_property_by_path(tree, &["a".into(), "b".into()]).unwrap();
        let AstNode::Property { key_span, .. } = prop else {
            panic!("expected property");
        };
        assert_eq!(&text[key_span.offset..key_span.end()], "\"b\"");
    }

    #[test]
    fn test_walk_round_trips() {
        let doc = parse(r#"{"x": [1, [2, 3], {"y": null}], "z": {"w": true}}"#);
        let tree = doc.tree.as_ref().unwrap();
        let nodes = tree.walk();
        assert_eq!(nodes.len(), 10);
        for (path, node) in nodes {
            assert_eq!(find_node_by_path(tree, &path), Some(node));
        }
    }
}
