//! Markup tree and the recursive-descent template parser.
//!
//! The grammar is deliberately small: elements, attributes, text, comments.
//! Whether a tag is a component reference is decided here, once, and carried
//! on the node as [`TagKind`].

use serde::{Deserialize, Serialize};

use crate::attribute::{decode_entities, AttrValue, Attributes};
use crate::component::registry;
use crate::validate::{is_void_tag, CompilerError};

// ═══════════════════════════════════════════════════════════════════════════════
// TREE TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TagKind {
    Plain(String),
    Component(String),
}

impl TagKind {
    pub fn from_name(name: &str) -> TagKind {
        if is_component_tag(name) {
            TagKind::Component(name.to_string())
        } else {
            TagKind::Plain(name.to_string())
        }
    }

    pub fn name(&self) -> &str {
        match self {
            TagKind::Plain(name) | TagKind::Component(name) => name,
        }
    }

    fn is_void(&self) -> bool {
        match self {
            TagKind::Plain(name) => is_void_tag(name),
            TagKind::Component(name) => registry().is_void(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    /// Raw character data, emitted as written.
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementNode {
    pub kind: TagKind,
    pub attributes: Attributes,
    pub children: Vec<MarkupNode>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarkupNode {
    Text(TextNode),
    Element(ElementNode),
}

/// Check if a tag name represents a component (starts with uppercase)
pub fn is_component_tag(tag_name: &str) -> bool {
    tag_name
        .chars()
        .next()
        .map(|c| c.is_uppercase())
        .unwrap_or(false)
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARSER
// ═══════════════════════════════════════════════════════════════════════════════

/// Deepest element nesting accepted. Every later stage walks the tree
/// recursively, so this also bounds their stack use.
pub const MAX_NESTING_DEPTH: usize = 128;

/// Parse template text into its top-level nodes.
///
/// The text is treated as the content of a synthetic root, so any number of
/// top-level siblings is legal.
pub fn parse_template(text: &str) -> Result<Vec<MarkupNode>, CompilerError> {
    let mut parser = Parser {
        src: text,
        pos: 0,
        depth: 0,
        cursor: LineCursor::default(),
    };
    parser.parse_children(None)
}

/// Line/column of `offset`, advanced incrementally as elements are parsed
/// left to right.
#[derive(Debug, Clone, Copy)]
struct LineCursor {
    offset: usize,
    line: u32,
    /// Characters between the start of the line and `offset`.
    column: u32,
}

impl Default for LineCursor {
    fn default() -> Self {
        LineCursor {
            offset: 0,
            line: 1,
            column: 0,
        }
    }
}

impl LineCursor {
    fn advance(&mut self, src: &str, to: usize) {
        if to < self.offset {
            *self = LineCursor::default();
        }
        for c in src[self.offset..to].chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
        self.offset = to;
    }

    fn location(&self) -> SourceLocation {
        SourceLocation {
            line: self.line,
            column: self.column + 1,
        }
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
    cursor: LineCursor,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn location_at(&mut self, pos: usize) -> SourceLocation {
        self.cursor.advance(self.src, pos);
        self.cursor.location()
    }

    // Error path only: scans from the start instead of moving the cursor.
    fn error_at(&self, pos: usize, message: String) -> CompilerError {
        let mut cursor = LineCursor::default();
        cursor.advance(self.src, pos);
        let loc = cursor.location();
        CompilerError::MalformedMarkup {
            message,
            line: loc.line,
            column: loc.column,
        }
    }

    /// Whether the text at the cursor opens markup rather than being a literal `<`.
    fn at_markup(&self) -> bool {
        let rest = self.rest();
        let mut chars = rest.chars();
        if chars.next() != Some('<') {
            return false;
        }
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '/' || c == '!')
    }

    fn parse_children(&mut self, parent: Option<(&str, usize)>) -> Result<Vec<MarkupNode>, CompilerError> {
        let mut nodes = Vec::new();

        loop {
            if self.eof() {
                return match parent {
                    Some((name, start)) => {
                        Err(self.error_at(start, format!("<{}> is never closed", name)))
                    }
                    None => Ok(nodes),
                };
            }

            let rest = self.rest();
            if rest.starts_with("<!--") {
                let start = self.pos;
                match rest[4..].find("-->") {
                    Some(end) => self.pos += 4 + end + 3,
                    None => return Err(self.error_at(start, "unterminated comment".to_string())),
                }
            } else if rest.starts_with("<!") {
                // doctype and other declarations carry no content
                let start = self.pos;
                match rest.find('>') {
                    Some(end) => self.pos += end + 1,
                    None => return Err(self.error_at(start, "unterminated declaration".to_string())),
                }
            } else if rest.starts_with("</") {
                let start = self.pos;
                self.pos += 2;
                let name = self.read_name();
                self.skip_whitespace();
                if self.bump() != Some('>') {
                    return Err(self.error_at(start, format!("malformed closing tag </{}", name)));
                }
                match parent {
                    Some((open, _)) if open == name => return Ok(nodes),
                    _ if TagKind::from_name(&name).is_void() => {}
                    Some((open, _)) => {
                        return Err(self.error_at(
                            start,
                            format!("expected </{}> but found </{}>", open, name),
                        ))
                    }
                    None => {
                        return Err(self.error_at(start, format!("unexpected closing tag </{}>", name)))
                    }
                }
            } else if self.at_markup() {
                nodes.push(MarkupNode::Element(self.parse_element()?));
            } else {
                nodes.push(MarkupNode::Text(TextNode {
                    value: self.read_text(),
                }));
            }
        }
    }

    fn read_text(&mut self) -> String {
        let start = self.pos;
        self.bump();
        while !self.eof() && !self.at_markup() {
            self.bump();
        }
        self.src[start..self.pos].to_string()
    }

    fn read_name(&mut self) -> String {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')) {
            self.bump();
        }
        self.src[start..self.pos].to_string()
    }

    fn parse_element(&mut self) -> Result<ElementNode, CompilerError> {
        let start = self.pos;
        let location = self.location_at(start);
        self.bump(); // <
        let name = self.read_name();
        let kind = TagKind::from_name(&name);
        let mut attributes = Attributes::new();

        let self_closing = loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.is_empty() {
                return Err(self.error_at(start, format!("unterminated tag <{}", name)));
            }
            if rest.starts_with("/>") {
                self.pos += 2;
                break true;
            }
            if rest.starts_with('>') {
                self.pos += 1;
                break false;
            }
            if rest.starts_with('/') {
                self.pos += 1;
                continue;
            }
            self.parse_attribute(&mut attributes, start)?;
        };

        let children = if self_closing || kind.is_void() {
            Vec::new()
        } else {
            if self.depth >= MAX_NESTING_DEPTH {
                return Err(self.error_at(
                    start,
                    format!("<{}> is nested deeper than {} levels", name, MAX_NESTING_DEPTH),
                ));
            }
            self.depth += 1;
            let children = self.parse_children(Some((&name, start)))?;
            self.depth -= 1;
            children
        };

        Ok(ElementNode {
            kind,
            attributes,
            children,
            location,
        })
    }

    fn parse_attribute(&mut self, attributes: &mut Attributes, tag_start: usize) -> Result<(), CompilerError> {
        let name_start = self.pos;
        while matches!(self.peek(), Some(c) if !c.is_whitespace() && !matches!(c, '=' | '>' | '/' | '"' | '\''))
        {
            self.bump();
        }
        let name = self.src[name_start..self.pos].to_string();
        if name.is_empty() {
            return Err(self.error_at(self.pos, "expected attribute name".to_string()));
        }

        self.skip_whitespace();
        let raw = if self.peek() == Some('=') {
            self.bump();
            self.skip_whitespace();
            match self.peek() {
                Some(quote @ ('"' | '\'')) => {
                    let value_start = self.pos;
                    self.bump();
                    let end = self.rest().find(quote).ok_or_else(|| {
                        self.error_at(value_start, format!("unterminated value for `{}`", name))
                    })?;
                    let value = self.rest()[..end].to_string();
                    self.pos += end + 1;
                    value
                }
                Some(_) => {
                    let value_start = self.pos;
                    while matches!(self.peek(), Some(c) if !c.is_whitespace() && c != '>') {
                        if self.rest().starts_with("/>") {
                            break;
                        }
                        self.bump();
                    }
                    self.src[value_start..self.pos].to_string()
                }
                None => {
                    return Err(self.error_at(tag_start, "unterminated tag".to_string()));
                }
            }
        } else {
            String::new()
        };

        // first occurrence wins
        if !attributes.contains(&name) {
            attributes.set(&name, AttrValue::parse(&decode_entities(&raw)));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn element(node: &MarkupNode) -> &ElementNode {
        match node {
            MarkupNode::Element(el) => el,
            MarkupNode::Text(t) => panic!("expected element, got text {:?}", t.value),
        }
    }

    #[test]
    fn test_is_component_tag() {
        assert!(is_component_tag("Row"));
        assert!(is_component_tag("Title"));
        assert!(!is_component_tag("div"));
        assert!(!is_component_tag(""));
    }

    #[test]
    fn test_multiple_top_level_siblings() {
        let nodes = parse_template("<p>a</p>text<span>b</span>").unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(element(&nodes[0]).kind, TagKind::Plain("p".to_string()));
        assert!(matches!(&nodes[1], MarkupNode::Text(t) if t.value == "text"));
    }

    #[test]
    fn test_component_kind_decided_at_parse() {
        let nodes = parse_template(r#"<Row gap="8"><Title as="h2">Hi</Title></Row>"#).unwrap();
        let row = element(&nodes[0]);
        assert_eq!(row.kind, TagKind::Component("Row".to_string()));
        assert_eq!(row.attributes.get("gap"), Some(&AttrValue::Number(8.0)));
        let title = element(&row.children[0]);
        assert_eq!(title.kind, TagKind::Component("Title".to_string()));
        assert_eq!(title.attributes.get("as"), Some(&AttrValue::Str("h2".to_string())));
    }

    #[test]
    fn test_attribute_forms() {
        let nodes =
            parse_template(r#"<input type=text disabled value='a &amp; b' data-x="1"/>"#).unwrap();
        let input = element(&nodes[0]);
        assert_eq!(input.attributes.get("type"), Some(&AttrValue::Str("text".to_string())));
        assert_eq!(input.attributes.get("disabled"), Some(&AttrValue::Str(String::new())));
        assert_eq!(input.attributes.get("value"), Some(&AttrValue::Str("a & b".to_string())));
        assert_eq!(input.attributes.get("data-x"), Some(&AttrValue::Number(1.0)));
    }

    #[test]
    fn test_void_elements_take_no_children() {
        let nodes = parse_template("<p>a<br>b<img src=x.png></p>").unwrap();
        let p = element(&nodes[0]);
        assert_eq!(p.children.len(), 4);
        assert!(element(&p.children[1]).children.is_empty());
    }

    #[test]
    fn test_void_component_without_slash() {
        let nodes = parse_template(r#"<Image src="a.png"><p>after</p>"#).unwrap();
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn test_comments_and_doctype_are_dropped() {
        let nodes = parse_template("<!DOCTYPE html><!-- note --><p>x</p>").unwrap();
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn test_literal_less_than_is_text() {
        let nodes = parse_template("<p>1 < 2</p>").unwrap();
        let p = element(&nodes[0]);
        let text: String = p
            .children
            .iter()
            .map(|c| match c {
                MarkupNode::Text(t) => t.value.clone(),
                _ => String::new(),
            })
            .collect();
        assert_eq!(text, "1 < 2");
    }

    #[test]
    fn test_mismatched_close_reports_position() {
        let err = parse_template("<div>\n  <p>x</span>\n</div>").unwrap_err();
        match err {
            CompilerError::MalformedMarkup { line, column, message } => {
                assert_eq!(line, 2);
                assert_eq!(column, 7);
                assert!(message.contains("</p>"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_nesting_limit_is_an_error() {
        let depth = MAX_NESTING_DEPTH + 1;
        let text = format!("{}x{}", "<div>".repeat(depth), "</div>".repeat(depth));
        let err = parse_template(&text).unwrap_err();
        match err {
            CompilerError::MalformedMarkup { line, column, message } => {
                assert!(message.contains("nested deeper"));
                assert_eq!(line, 1);
                assert_eq!(column as usize, MAX_NESTING_DEPTH * 5 + 1);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_nesting_at_limit_is_accepted() {
        let text = format!(
            "{}x{}",
            "<div>".repeat(MAX_NESTING_DEPTH),
            "</div>".repeat(MAX_NESTING_DEPTH)
        );
        assert_eq!(parse_template(&text).unwrap().len(), 1);
    }

    #[test]
    fn test_very_deep_nesting_does_not_overflow() {
        let text = format!("{}x{}", "<div>".repeat(50_000), "</div>".repeat(50_000));
        assert!(matches!(
            parse_template(&text),
            Err(CompilerError::MalformedMarkup { .. })
        ));
    }

    #[test]
    fn test_locations_across_lines() {
        let nodes = parse_template("<p>a</p>\n  <span>b</span><em>ü</em>\n<b>c</b>").unwrap();
        let locations: Vec<_> = nodes
            .iter()
            .filter_map(|n| match n {
                MarkupNode::Element(el) => Some((el.location.line, el.location.column)),
                MarkupNode::Text(_) => None,
            })
            .collect();
        assert_eq!(locations, vec![(1, 1), (2, 3), (2, 17), (3, 1)]);
    }

    #[test]
    fn test_many_siblings_on_one_line() {
        let text = "<br>".repeat(60_000);
        let nodes = parse_template(&text).unwrap();
        assert_eq!(nodes.len(), 60_000);
        match &nodes[59_999] {
            MarkupNode::Element(el) => assert_eq!(el.location.column, 59_999 * 4 + 1),
            MarkupNode::Text(_) => panic!("expected element"),
        }
    }

    #[test]
    fn test_unclosed_element_is_error() {
        let err = parse_template("<section><p>x</p>").unwrap_err();
        assert!(err.to_string().contains("<section> is never closed"));
        assert_eq!(err.location(), Some((1, 1)));
    }
}
