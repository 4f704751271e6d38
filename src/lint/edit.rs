//! Text edits computed by quick fixes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LintError, Result};
use crate::parser::{AstNode, ParsedDocument, SourceSpan, Span};

/// A single replacement in a document's text.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct TextEdit {
    /// Line/column range being replaced
    pub range: SourceSpan,
    /// Byte offset where the replacement starts
    pub start: usize,
    /// Byte offset where the replacement ends (exclusive)
    pub end: usize,
    pub new_text: String,
}

impl TextEdit {
    /// Replace the bytes covered by `span`.
    #[must_use]
    pub fn replace(doc: &ParsedDocument, span: Span, new_text: impl Into<String>) -> Self {
        Self {
            range: doc.span_of(span),
            start: span.offset,
            end: span.end(),
            new_text: new_text.into(),
        }
    }

    /// Insert text at `offset`.
    #[must_use]
    pub fn insert(doc: &ParsedDocument, offset: usize, new_text: impl Into<String>) -> Self {
        Self::replace(doc, Span::new(offset, 0), new_text)
    }

    /// Apply this edit to `text`.
    ///
    /// # Errors
    ///
    /// Fails when the byte range does not fit `text`, which happens when the
    /// edit was computed against a different version of the document.
    pub fn apply(&self, text: &str) -> Result<String> {
        if self.start > self.end
            || self.end > text.len()
            || !text.is_char_boundary(self.start)
            || !text.is_char_boundary(self.end)
        {
            return Err(LintError::fix(
                "edit",
                format!(
                    "range {}..{} does not fit a document of {} bytes",
                    self.start,
                    self.end,
                    text.len()
                ),
            ));
        }
        let mut out = String::with_capacity(text.len() + self.new_text.len());
        out.push_str(&text[..self.start]);
        out.push_str(&self.new_text);
        out.push_str(&text[self.end..]);
        Ok(out)
    }
}

/// Replace a scalar node with the JSON encoding of `value`.
///
/// # Errors
///
/// Fails when `value` cannot be serialized.
pub fn replace_value(doc: &ParsedDocument, node: &AstNode, value: &Value) -> Result<TextEdit> {
    Ok(TextEdit::replace(doc, node.span(), serde_json::to_string(value)?))
}

/// Insert `"key": value` as the last property of an object node.
///
/// Follows the object's layout: one property per line when the existing
/// properties are on their own lines, inline otherwise.
///
/// # Errors
///
/// Fails when `object` is not an object node or `value` cannot be serialized.
pub fn insert_property(
    doc: &ParsedDocument,
    object: &AstNode,
    key: &str,
    value: &Value,
) -> Result<TextEdit> {
    let AstNode::Object { span, children } = object else {
        return Err(LintError::fix(key, "target is not an object"));
    };
    let key_json = serde_json::to_string(key)?;

    let Some(last) = children.last() else {
        let value_text = serde_json::to_string(value)?;
        return Ok(TextEdit::insert(
            doc,
            span.offset + 1,
            format!("{key_json}: {value_text}"),
        ));
    };

    let last_span = last.span();
    let text = &doc.text;
    let line_start = text[..last_span.offset].rfind('\n').map(|idx| idx + 1);
    let multiline = line_start.is_some_and(|start| {
        start > span.offset && text[start..last_span.offset].trim().is_empty()
    });

    let new_text = if let (true, Some(start)) = (multiline, line_start) {
        let indent = &text[start..last_span.offset];
        let value_text = indent_lines(&serde_json::to_string_pretty(value)?, indent);
        format!(",\n{indent}{key_json}: {value_text}")
    } else {
        format!(", {key_json}: {}", serde_json::to_string(value)?)
    };

    Ok(TextEdit::insert(doc, last_span.end(), new_text))
}

fn indent_lines(pretty: &str, indent: &str) -> String {
    let mut lines = pretty.lines();
    let mut out = lines.next().unwrap_or_default().to_string();
    for line in lines {
        out.push('\n');
        out.push_str(indent);
        out.push_str(line);
    }
    out
}
