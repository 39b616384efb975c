//! XML codec built on quick-xml
//!
//! Parsing turns one well-formed document (or fragment with a single root)
//! into an [`XmlTree`]. Rendering writes the canonical line-per-element form
//! that line addressing depends on: the root opens the output and every later
//! opening tag starts a new line, with no indentation and no declaration.
//!
//! Both directions walk the tree with explicit stacks.

use crate::models::{ElementIndex, XmlElement, XmlTree, TEXT_FIELD_KEY};
use quick_xml::escape::escape;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;
use quick_xml::{Reader, Writer};
use std::borrow::Cow;
use thiserror::Error;

/// Nesting limit applied when callers do not configure one
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Well-formedness and rendering failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XmlError {
    #[error("Malformed XML at byte {position}: {message}")]
    Malformed { position: u64, message: String },

    #[error("Document has no root element")]
    NoRoot,

    #[error("Document has more than one root element (second root '{0}')")]
    MultipleRoots(String),

    #[error("Text outside the root element: '{0}'")]
    TextOutsideRoot(String),

    #[error("Element '{0}' is never closed")]
    Unclosed(String),

    #[error("Nesting exceeds the maximum depth of {0}")]
    TooDeep(usize),

    #[error("Attribute name '{0}' is reserved for element text")]
    ReservedAttribute(String),

    #[error("Failed to write XML: {0}")]
    Write(String),
}

impl XmlError {
    fn malformed(position: u64, message: impl ToString) -> Self {
        Self::Malformed {
            position,
            message: message.to_string(),
        }
    }
}

/// Open element on the parse stack
struct OpenElement {
    index: ElementIndex,
    text: String,
    has_child: bool,
}

impl OpenElement {
    /// Keep text seen before the first child if it is not blank
    fn settle_text(&mut self, tree: &mut XmlTree) {
        if self.has_child {
            return;
        }
        self.has_child = true;
        if !self.text.trim().is_empty() {
            if let Some(element) = tree.get_mut(self.index) {
                element.text = Some(std::mem::take(&mut self.text));
            }
        }
    }
}

/// Parse `text` as a document with exactly one root element.
///
/// Declarations, comments, processing instructions and DOCTYPE are skipped.
/// CDATA is read as text. Text after an element's first child is dropped.
///
/// Beyond well-formedness, one restriction applies: an attribute named
/// `__text__` is rejected with [`XmlError::ReservedAttribute`]. That key holds
/// element text in storage.
///
/// # Examples
///
/// ```
/// use xmlspace_core::utils::parse_document;
///
/// let tree = parse_document(r#"<root><item id="1">a</item></root>"#, 64).unwrap();
/// assert_eq!(tree.root().name, "root");
/// assert_eq!(tree.len(), 2);
/// assert!(parse_document("<root><item></root>", 64).is_err());
/// ```
pub fn parse_document(text: &str, max_depth: usize) -> Result<XmlTree, XmlError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().check_end_names = true;

    let mut tree: Option<XmlTree> = None;
    let mut stack: Vec<OpenElement> = Vec::new();

    loop {
        let position = reader.buffer_position() as u64;
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let index = open_element(&mut tree, &mut stack, &start, max_depth, position)?;
                stack.push(OpenElement {
                    index,
                    text: String::new(),
                    has_child: false,
                });
            }
            Ok(Event::Empty(start)) => {
                open_element(&mut tree, &mut stack, &start, max_depth, position)?;
            }
            Ok(Event::Text(content)) => {
                let content = content
                    .unescape()
                    .map_err(|e| XmlError::malformed(position, e))?;
                append_text(&mut stack, &content)?;
            }
            Ok(Event::CData(content)) => {
                let content = String::from_utf8_lossy(&content).into_owned();
                append_text(&mut stack, &content)?;
            }
            Ok(Event::End(_)) => {
                if let Some(mut open) = stack.pop() {
                    if let Some(tree) = tree.as_mut() {
                        open.settle_text(tree);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(XmlError::malformed(reader.buffer_position() as u64, e)),
        }
    }

    let tree = tree.ok_or(XmlError::NoRoot)?;
    if let Some(open) = stack.last() {
        return Err(XmlError::Unclosed(tree[open.index].name.clone()));
    }
    Ok(tree)
}

fn open_element(
    tree: &mut Option<XmlTree>,
    stack: &mut [OpenElement],
    start: &BytesStart<'_>,
    max_depth: usize,
    position: u64,
) -> Result<ElementIndex, XmlError> {
    let element = read_element(start, position)?;
    let depth = stack.len();

    let Some(parent) = stack.last_mut() else {
        if tree.is_some() {
            return Err(XmlError::MultipleRoots(element.name));
        }
        *tree = Some(XmlTree::new(element));
        return Ok(XmlTree::ROOT);
    };

    if depth > max_depth {
        return Err(XmlError::TooDeep(max_depth));
    }

    let tree = tree.as_mut().ok_or(XmlError::NoRoot)?;
    parent.settle_text(tree);
    tree.push_child(parent.index, element)
        .ok_or_else(|| XmlError::malformed(position, "parent element missing from tree"))
}

fn read_element(start: &BytesStart<'_>, position: u64) -> Result<XmlElement, XmlError> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| XmlError::malformed(position, e))?
        .to_string();
    let mut element = XmlElement::new(name);

    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| XmlError::malformed(position, e))?;
        let key = std::str::from_utf8(attribute.key.as_ref())
            .map_err(|e| XmlError::malformed(position, e))?
            .to_string();
        if key == TEXT_FIELD_KEY {
            return Err(XmlError::ReservedAttribute(key));
        }
        let value = attribute
            .unescape_value()
            .map_err(|e| XmlError::malformed(position, e))?
            .into_owned();
        element.attributes.push((key, value));
    }

    Ok(element)
}

fn append_text(stack: &mut [OpenElement], content: &str) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(open) if !open.has_child => {
            open.text.push_str(content);
            Ok(())
        }
        Some(_) => Ok(()),
        None if content.trim().is_empty() => Ok(()),
        None => Err(XmlError::TextOutsideRoot(content.trim().to_string())),
    }
}

enum Step {
    Open(ElementIndex),
    Close(ElementIndex),
}

/// Render `tree` in canonical form: one opening tag per line.
///
/// Childless elements without text are written self-closing. Newlines inside
/// text and attribute values are written as character references so that an
/// element never spills onto a second line.
///
/// # Examples
///
/// ```
/// use xmlspace_core::utils::{parse_document, render_document};
///
/// let tree = parse_document("<a><b>1</b><c/></a>", 64).unwrap();
/// assert_eq!(render_document(&tree).unwrap(), "<a>\n<b>1</b>\n<c/></a>");
/// ```
pub fn render_document(tree: &XmlTree) -> Result<String, XmlError> {
    let mut writer = Writer::new(Vec::new());
    let mut stack = vec![Step::Open(XmlTree::ROOT)];
    let mut first = true;

    while let Some(step) = stack.pop() {
        match step {
            Step::Open(index) => {
                let element = &tree[index];
                if !first {
                    write(&mut writer, Event::Text(BytesText::new("\n")))?;
                }
                first = false;

                let start = start_tag(element);
                if element.children.is_empty() && element.text.is_none() {
                    write(&mut writer, Event::Empty(start))?;
                    continue;
                }

                write(&mut writer, Event::Start(start))?;
                if let Some(text) = &element.text {
                    write(&mut writer, Event::Text(text_content(text)))?;
                }
                stack.push(Step::Close(index));
                stack.extend(element.children.iter().rev().map(|&child| Step::Open(child)));
            }
            Step::Close(index) => {
                write(&mut writer, Event::End(BytesEnd::new(tree[index].name.as_str())))?;
            }
        }
    }

    String::from_utf8(writer.into_inner()).map_err(|e| XmlError::Write(e.to_string()))
}

/// Render one element on its own: attributes and text, no descendants.
///
/// The tag is always written as an explicit open/close pair.
///
/// ```
/// use xmlspace_core::models::XmlElement;
/// use xmlspace_core::utils::render_element;
///
/// let person = XmlElement::new("person").with_attribute("id", "1");
/// assert_eq!(render_element(&person).unwrap(), r#"<person id="1"></person>"#);
/// ```
pub fn render_element(element: &XmlElement) -> Result<String, XmlError> {
    let mut writer = Writer::new(Vec::new());

    write(&mut writer, Event::Start(start_tag(element)))?;
    if let Some(text) = &element.text {
        write(&mut writer, Event::Text(text_content(text)))?;
    }
    write(&mut writer, Event::End(BytesEnd::new(element.name.as_str())))?;

    String::from_utf8(writer.into_inner()).map_err(|e| XmlError::Write(e.to_string()))
}

fn start_tag(element: &XmlElement) -> BytesStart<'_> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute(Attribute {
            key: QName(key.as_bytes()),
            value: Cow::Owned(escape_single_line(value).into_bytes()),
        });
    }
    start
}

fn text_content(text: &str) -> BytesText<'static> {
    BytesText::from_escaped(escape_single_line(text))
}

fn escape_single_line(raw: &str) -> String {
    escape(raw).replace('\n', "&#10;").replace('\r', "&#13;")
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), XmlError> {
    writer
        .write_event(event)
        .map_err(|e| XmlError::Write(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEOPLE: &str = concat!(
        r#"<root><person id="1" name="John"><age>30</age><gender>Male</gender></person>"#,
        r#"<person id="2" name="Jane"><age>25</age><gender>Female</gender></person></root>"#,
    );

    #[test]
    fn test_parse_people_document() {
        let tree = parse_document(PEOPLE, DEFAULT_MAX_DEPTH).unwrap();
        assert_eq!(tree.len(), 7);

        let root = tree.root();
        assert_eq!(root.children.len(), 2);
        let john = &tree[root.children[0]];
        assert_eq!(john.attribute("name"), Some("John"));
        assert_eq!(john.text, None);
        assert_eq!(tree[john.children[0]].text.as_deref(), Some("30"));
    }

    #[test]
    fn test_render_places_each_element_on_its_own_line() {
        let tree = parse_document(PEOPLE, DEFAULT_MAX_DEPTH).unwrap();
        let rendered = render_document(&tree).unwrap();
        assert_eq!(
            rendered,
            "<root>\n\
             <person id=\"1\" name=\"John\">\n\
             <age>30</age>\n\
             <gender>Male</gender></person>\n\
             <person id=\"2\" name=\"Jane\">\n\
             <age>25</age>\n\
             <gender>Female</gender></person></root>"
        );
        assert_eq!(rendered.lines().count(), tree.len());
    }

    #[test]
    fn test_render_matches_newline_insertion_rule() {
        let tree = parse_document(PEOPLE, DEFAULT_MAX_DEPTH).unwrap();
        let rendered = render_document(&tree).unwrap();
        let mut expected = String::new();
        let mut chars = PEOPLE.chars().peekable();
        while let Some(c) = chars.next() {
            expected.push(c);
            if c == '>' {
                let mut lookahead = chars.clone();
                if lookahead.next() == Some('<') && lookahead.next() != Some('/') {
                    expected.push('\n');
                }
            }
        }
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_blank_text_is_not_kept() {
        let tree = parse_document("<a>\n  <b> x </b>\n</a>", DEFAULT_MAX_DEPTH).unwrap();
        assert_eq!(tree.root().text, None);
        assert_eq!(tree[1].text.as_deref(), Some(" x "));
    }

    #[test]
    fn test_tail_text_is_dropped() {
        let tree = parse_document("<a>head<b/>tail</a>", DEFAULT_MAX_DEPTH).unwrap();
        assert_eq!(tree.root().text.as_deref(), Some("head"));
        assert_eq!(render_document(&tree).unwrap(), "<a>head\n<b/></a>");
    }

    #[test]
    fn test_declaration_and_comments_are_skipped() {
        let tree = parse_document(
            "<?xml version=\"1.0\" encoding=\"utf8\"?><!-- c --><a><b/></a>",
            DEFAULT_MAX_DEPTH,
        )
        .unwrap();
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_entities_round_trip() {
        let tree = parse_document(r#"<a q="x &amp; &quot;y&quot;">1 &lt; 2</a>"#, 8).unwrap();
        assert_eq!(tree.root().attribute("q"), Some("x & \"y\""));
        assert_eq!(tree.root().text.as_deref(), Some("1 < 2"));

        let rendered = render_document(&tree).unwrap();
        assert_eq!(parse_document(&rendered, 8).unwrap(), tree);
    }

    #[test]
    fn test_newlines_in_values_stay_on_one_line() {
        let tree = parse_document("<a note=\"x&#10;y\">one\ntwo<b/></a>", 8).unwrap();
        let rendered = render_document(&tree).unwrap();
        assert_eq!(rendered.lines().count(), 2);
        assert_eq!(parse_document(&rendered, 8).unwrap(), tree);
    }

    #[test]
    fn test_mismatched_end_tag_is_malformed() {
        let err = parse_document("<a><b></a>", DEFAULT_MAX_DEPTH).unwrap_err();
        assert!(matches!(err, XmlError::Malformed { .. }));
    }

    #[test]
    fn test_unclosed_element() {
        let err = parse_document("<a><b></b>", DEFAULT_MAX_DEPTH).unwrap_err();
        assert_eq!(err, XmlError::Unclosed("a".to_string()));
    }

    #[test]
    fn test_multiple_roots() {
        let err = parse_document("<a/><b/>", DEFAULT_MAX_DEPTH).unwrap_err();
        assert_eq!(err, XmlError::MultipleRoots("b".to_string()));
    }

    #[test]
    fn test_empty_input_has_no_root() {
        assert_eq!(parse_document("  ", DEFAULT_MAX_DEPTH), Err(XmlError::NoRoot));
    }

    #[test]
    fn test_text_outside_root() {
        let err = parse_document("<a/>junk", DEFAULT_MAX_DEPTH).unwrap_err();
        assert_eq!(err, XmlError::TextOutsideRoot("junk".to_string()));
    }

    #[test]
    fn test_reserved_attribute_is_rejected() {
        let err = parse_document(r#"<a __text__="x"/>"#, DEFAULT_MAX_DEPTH).unwrap_err();
        assert_eq!(err, XmlError::ReservedAttribute(TEXT_FIELD_KEY.to_string()));
    }

    #[test]
    fn test_depth_limit() {
        assert!(parse_document("<a><b><c/></b></a>", 2).is_ok());
        assert_eq!(
            parse_document("<a><b><c><d/></c></b></a>", 2),
            Err(XmlError::TooDeep(2))
        );
    }

    #[test]
    fn test_deep_document_renders_without_recursion() {
        let depth = 5_000;
        let text = format!("{}{}", "<n>".repeat(depth), "</n>".repeat(depth));
        let tree = parse_document(&text, depth).unwrap();
        assert_eq!(tree.depth(), depth - 1);
        let rendered = render_document(&tree).unwrap();
        assert_eq!(rendered.lines().count(), depth);
    }

    #[test]
    fn test_render_element_without_descendants() {
        let tree = parse_document(PEOPLE, DEFAULT_MAX_DEPTH).unwrap();
        let john = &tree[tree.root().children[0]];
        assert_eq!(
            render_element(john).unwrap(),
            r#"<person id="1" name="John"></person>"#
        );
        let age = XmlElement::new("age").with_text("25");
        assert_eq!(render_element(&age).unwrap(), "<age>25</age>");
    }
}
