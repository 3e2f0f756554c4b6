//! XML element tree and namespace normalization.
//!
//! Devices answer with XML whose element names carry arbitrary namespace
//! prefixes (`junos:chassis`, `a:y`, ...). [`XmlNormalizer`] parses a payload
//! and rebuilds it using local names only, so downstream code can look up
//! elements without caring which namespaces a device chose.
//!
//! Parsing drops whitespace-only text nodes. Comments and processing
//! instructions inside the root element are kept; anything outside the root
//! element (XML declaration, doctype, prolog comments) is discarded.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use quick_xml::escape::{escape, partial_escape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use crate::error::{Error, Result};

/// XML parse failure with the reader position it occurred at.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (at byte {position})")]
pub struct XmlError {
    message: String,
    position: u64,
}

impl XmlError {
    fn new(message: impl Into<String>, position: u64) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }

    /// Byte offset in the input where parsing stopped.
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.position
    }
}

/// A node inside an [`Element`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Child element
    Element(Element),
    /// Character data, already unescaped
    Text(String),
    /// Comment body without the `<!--`/`-->` delimiters
    Comment(String),
    /// Processing instruction
    ProcessingInstruction {
        /// PI target, e.g. `xml-stylesheet`
        target: String,
        /// Everything after the target
        data: String,
    },
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Self::Element(element)
    }
}

/// An XML element with ordered attributes and children.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    /// Create an empty element.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Parse a document and return its root element.
    ///
    /// Qualified names and `xmlns` declarations are kept as written.
    /// Whitespace-only text is dropped when it only separates markup: it is
    /// kept when it is the sole content of an element, when it follows or
    /// shares a parent with other text, and anywhere under
    /// `xml:space="preserve"`.
    ///
    /// # Errors
    ///
    /// Returns an [`XmlError`] if the text is not a single well-formed
    /// element.
    pub fn parse(text: &str) -> std::result::Result<Self, XmlError> {
        let mut reader = Reader::from_str(text);
        let mut stack: Vec<(Self, bool)> = Vec::new();
        let mut root: Option<Self> = None;
        // Blank text seen in a still-empty element; kept only if the element
        // closes right after it.
        let mut pending_blank: Option<String> = None;

        loop {
            let position = reader.buffer_position() as u64;
            let event = reader
                .read_event()
                .map_err(|e| XmlError::new(e.to_string(), position))?;

            let pending = pending_blank.take();
            match event {
                Event::Start(start) => {
                    let element = Self::from_start(&start, position)?;
                    let inherited = stack.last().is_some_and(|(_, preserve)| *preserve);
                    let preserve = element.space_preserve().unwrap_or(inherited);
                    stack.push((element, preserve));
                }
                Event::Empty(start) => {
                    let element = Self::from_start(&start, position)?;
                    attach(&mut stack, &mut root, element, position)?;
                }
                Event::End(_) => {
                    let (mut element, _) = stack
                        .pop()
                        .ok_or_else(|| XmlError::new("unexpected closing tag", position))?;
                    if let Some(blank) = pending {
                        element.push_text(&blank);
                    }
                    attach(&mut stack, &mut root, element, position)?;
                }
                Event::Text(raw) => {
                    let blank = raw.iter().all(|&b| matches!(b, b' ' | b'\t' | b'\n' | b'\r'));
                    let text = raw
                        .unescape()
                        .map_err(|e| XmlError::new(e.to_string(), position))?;
                    let Some((parent, preserve)) = stack.last_mut() else {
                        if blank {
                            continue;
                        }
                        return Err(XmlError::new("text outside of root element", position));
                    };
                    if !blank || *preserve || parent.keeps_blank_text() {
                        parent.push_text(&text);
                    } else if parent.children.is_empty() {
                        pending_blank = Some(text.into_owned());
                    }
                }
                Event::CData(data) => {
                    let text = utf8(data.into_inner(), position)?;
                    match stack.last_mut() {
                        Some((parent, _)) => parent.push_text(&text),
                        None => return Err(XmlError::new("CDATA outside of root element", position)),
                    }
                }
                Event::Comment(comment) => {
                    if let Some((parent, _)) = stack.last_mut() {
                        let body = utf8(comment.into_inner(), position)?;
                        parent.children.push(Node::Comment(body));
                    }
                }
                Event::PI(pi) => {
                    if let Some((parent, _)) = stack.last_mut() {
                        let target = utf8(Cow::Borrowed(pi.target()), position)?;
                        let data = utf8(Cow::Borrowed(pi.content()), position)?;
                        parent.children.push(Node::ProcessingInstruction {
                            target,
                            data: data.trim_start().to_string(),
                        });
                    }
                }
                Event::Decl(_) | Event::DocType(_) => {}
                Event::Eof => break,
            }
        }

        let position = reader.buffer_position() as u64;
        if let Some((open, _)) = stack.last() {
            return Err(XmlError::new(
                format!("unclosed element `{}`", open.name),
                position,
            ));
        }
        root.ok_or_else(|| XmlError::new("no root element", position))
    }

    fn space_preserve(&self) -> Option<bool> {
        match self.attribute("xml:space") {
            Some("preserve") => Some(true),
            Some("default") => Some(false),
            _ => None,
        }
    }

    /// Blank text is significant once this element holds other text.
    fn keeps_blank_text(&self) -> bool {
        matches!(self.children.first(), Some(Node::Text(_)))
            || matches!(self.children.last(), Some(Node::Text(_)))
    }

    fn from_start(start: &BytesStart<'_>, position: u64) -> std::result::Result<Self, XmlError> {
        let name = utf8(Cow::Borrowed(start.name().as_ref()), position)?;
        let mut element = Self::new(name);
        for attr in start.attributes() {
            let attr = attr.map_err(|e| XmlError::new(e.to_string(), position))?;
            let key = utf8(Cow::Borrowed(attr.key.as_ref()), position)?;
            let value = attr
                .unescape_value()
                .map_err(|e| XmlError::new(e.to_string(), position))?;
            element.set_attribute(key, value.into_owned());
        }
        Ok(element)
    }

    fn push_text(&mut self, text: &str) {
        if let Some(Node::Text(existing)) = self.children.last_mut() {
            existing.push_str(text);
        } else {
            self.children.push(Node::Text(text.to_string()));
        }
    }

    /// Element name, possibly prefixed.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Element name with any namespace prefix removed.
    #[must_use]
    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    /// Attributes in document order.
    #[must_use]
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// Look up an attribute value.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute, replacing an existing value in place.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Builder form of [`Element::set_attribute`].
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// All child nodes.
    #[must_use]
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Append a child node.
    pub fn push(&mut self, node: impl Into<Node>) {
        self.children.push(node.into());
    }

    /// Builder form of [`Element::push`].
    #[must_use]
    pub fn with_child(mut self, node: impl Into<Node>) -> Self {
        self.push(node);
        self
    }

    /// Append a text node.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    /// Child elements, skipping text, comments and PIs.
    pub fn child_elements(&self) -> impl Iterator<Item = &Self> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    /// First child element, if any.
    #[must_use]
    pub fn first_child_element(&self) -> Option<&Self> {
        self.child_elements().next()
    }

    /// Take ownership of the first child element.
    #[must_use]
    pub fn into_first_child_element(self) -> Option<Self> {
        self.children.into_iter().find_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    /// First direct child with the given name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Self> {
        self.child_elements().find(|e| e.name == name)
    }

    /// All direct children with the given name.
    pub fn find_all<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = &'a Self> + 'n
    where
        'a: 'n,
    {
        self.child_elements().filter(move |e| e.name == name)
    }

    /// All descendants (not including `self`) with the given name, depth first.
    #[must_use]
    pub fn descendants(&self, name: &str) -> Vec<&Self> {
        let mut found = Vec::new();
        for child in self.child_elements() {
            child.collect_named(name, &mut found);
        }
        found
    }

    fn collect_named<'a>(&'a self, name: &str, found: &mut Vec<&'a Self>) {
        if self.name == name {
            found.push(self);
        }
        for child in self.child_elements() {
            child.collect_named(name, found);
        }
    }

    /// Select elements by a `/`-separated path.
    ///
    /// The first segment matches `self` or any descendant; each further
    /// segment steps to direct children. `select("chassis/description")`
    /// behaves like the XPath `//chassis/description`.
    #[must_use]
    pub fn select(&self, path: &str) -> Vec<&Self> {
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let Some(first) = segments.next() else {
            return Vec::new();
        };

        let mut current = Vec::new();
        self.collect_named(first, &mut current);
        for segment in segments {
            current = current
                .into_iter()
                .flat_map(|element| element.child_elements().filter(move |e| e.name == segment))
                .collect();
        }
        current
    }

    /// First match of [`Element::select`].
    #[must_use]
    pub fn find_path(&self, path: &str) -> Option<&Self> {
        self.select(path).into_iter().next()
    }

    /// Concatenated direct text content.
    #[must_use]
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Rebuild the tree with every element and attribute renamed to its
    /// local name.
    ///
    /// Namespace declarations are dropped. If two attributes collapse onto
    /// the same local name the later value wins. Order, text, comments and
    /// processing instructions are preserved.
    #[must_use]
    pub fn into_local_names(self) -> Self {
        let mut element = Self::new(local_name(&self.name));
        for (key, value) in self.attributes {
            if is_namespace_declaration(&key) {
                continue;
            }
            element.set_attribute(local_name(&key), value);
        }
        element.children = self
            .children
            .into_iter()
            .map(|node| match node {
                Node::Element(child) => Node::Element(child.into_local_names()),
                other => other,
            })
            .collect();
        element
    }

    /// Serialize the element without an XML declaration.
    #[must_use]
    pub fn to_xml_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.name)?;
        for (key, value) in &self.attributes {
            write!(f, " {key}=\"{}\"", escape(value.as_str()))?;
        }
        if self.children.is_empty() {
            return f.write_str("/>");
        }
        f.write_str(">")?;
        for child in &self.children {
            match child {
                Node::Element(element) => write!(f, "{element}")?,
                Node::Text(text) => f.write_str(&partial_escape(text.as_str()))?,
                Node::Comment(body) => write!(f, "<!--{body}-->")?,
                Node::ProcessingInstruction { target, data } if data.is_empty() => {
                    write!(f, "<?{target}?>")?;
                }
                Node::ProcessingInstruction { target, data } => write!(f, "<?{target} {data}?>")?,
            }
        }
        write!(f, "</{}>", self.name)
    }
}

fn attach(
    stack: &mut [(Element, bool)],
    root: &mut Option<Element>,
    element: Element,
    position: u64,
) -> std::result::Result<(), XmlError> {
    if let Some((parent, _)) = stack.last_mut() {
        parent.children.push(Node::Element(element));
        Ok(())
    } else if root.is_some() {
        Err(XmlError::new("multiple root elements", position))
    } else {
        *root = Some(element);
        Ok(())
    }
}

fn utf8(bytes: Cow<'_, [u8]>, position: u64) -> std::result::Result<String, XmlError> {
    String::from_utf8(bytes.into_owned())
        .map_err(|e| XmlError::new(format!("invalid UTF-8: {e}"), position))
}

fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

fn is_namespace_declaration(name: &str) -> bool {
    name == "xmlns" || name.starts_with("xmlns:")
}

/// Hook that rewrites raw payload text before it is parsed.
pub type PreParser = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Parses response payloads into namespace-free element trees.
#[derive(Clone, Default)]
pub struct XmlNormalizer {
    pre_parser: Option<PreParser>,
}

impl XmlNormalizer {
    /// Create a normalizer without a pre-parse hook.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a hook that rewrites payload text before parsing, e.g. to fix
    /// escaping on proxies that emit broken entities.
    #[must_use]
    pub fn with_pre_parser<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.pre_parser = Some(Arc::new(hook));
        self
    }

    /// Returns true if a pre-parse hook is installed.
    #[must_use]
    pub fn has_pre_parser(&self) -> bool {
        self.pre_parser.is_some()
    }

    /// Parse `text` and strip every namespace prefix and declaration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedResponse`] naming `host` when the payload is
    /// not well-formed XML.
    pub fn normalize(&self, text: &str, host: Option<&str>) -> Result<Element> {
        let text = match &self.pre_parser {
            Some(hook) => Cow::Owned(hook(text)),
            None => Cow::Borrowed(text),
        };
        Element::parse(&text)
            .map(Element::into_local_names)
            .map_err(|e| Error::malformed_response(host, format!("invalid XML payload: {e}")))
    }
}

impl fmt::Debug for XmlNormalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlNormalizer")
            .field("pre_parser", &self.pre_parser.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHASSIS: &str = r#"<?xml version="1.0"?>
<junos:chassis-inventory xmlns:junos="http://xml.juniper.net/junos/12.3R6/junos" xmlns="http://xml.juniper.net/junos/12.3R6/junos-chassis">
    <chassis junos:style="inventory">
        <name>Chassis</name>
        <!-- primary unit -->
        <serial-number>GP0211AB1234</serial-number>
        <description>EX2200-24T-4G</description>
    </chassis>
</junos:chassis-inventory>"#;

    #[test]
    fn test_normalize_spec_example() {
        let element = XmlNormalizer::new()
            .normalize("<a:x xmlns:a='ns'><a:y>1</a:y></a:x>", Some("r1"))
            .unwrap();
        assert_eq!(element.to_xml_string(), "<x><y>1</y></x>");
    }

    #[test]
    fn test_normalize_strips_prefixes_and_declarations() {
        let element = XmlNormalizer::new().normalize(CHASSIS, None).unwrap();

        assert_eq!(element.name(), "chassis-inventory");
        assert!(element.attributes().is_empty());

        let chassis = element.find("chassis").unwrap();
        assert_eq!(chassis.attribute("style"), Some("inventory"));
        assert_eq!(
            element.find_path("chassis/serial-number").unwrap().text(),
            "GP0211AB1234"
        );
        assert_eq!(
            element.find_path("chassis/description").unwrap().text(),
            "EX2200-24T-4G"
        );
    }

    #[test]
    fn test_normalize_preserves_order_comments_and_pis() {
        let element = XmlNormalizer::new()
            .normalize(
                r#"<n:r xmlns:n="urn:x" n:b="2" a="1"><n:c/><!-- note --><?app run?><n:d>t</n:d></n:r>"#,
                None,
            )
            .unwrap();

        assert_eq!(
            element.attributes(),
            &[
                ("b".to_string(), "2".to_string()),
                ("a".to_string(), "1".to_string())
            ]
        );
        assert_eq!(
            element.to_xml_string(),
            r#"<r b="2" a="1"><c/><!-- note --><?app run?><d>t</d></r>"#
        );
    }

    #[test]
    fn test_normalize_drops_blank_text() {
        let element = XmlNormalizer::new()
            .normalize("<a>\n  <b> x </b>\n  <c/>\n</a>", None)
            .unwrap();
        assert_eq!(element.to_xml_string(), "<a><b> x </b><c/></a>");
    }

    #[test]
    fn test_normalize_keeps_sole_blank_content() {
        let element = XmlNormalizer::new().normalize("<a><b> </b></a>", None).unwrap();
        assert_eq!(element.to_xml_string(), "<a><b> </b></a>");
        assert_eq!(element.find("b").unwrap().text(), " ");
    }

    #[test]
    fn test_normalize_keeps_blank_in_mixed_content() {
        let element = XmlNormalizer::new()
            .normalize("<p>x <b/> <i/></p>", None)
            .unwrap();
        assert_eq!(element.to_xml_string(), "<p>x <b/> <i/></p>");
    }

    #[test]
    fn test_normalize_drops_blank_before_markup_in_empty_element() {
        let element = XmlNormalizer::new()
            .normalize("<a> <!-- c --> </a>", None)
            .unwrap();
        assert_eq!(element.to_xml_string(), "<a><!-- c --></a>");
    }

    #[test]
    fn test_normalize_honors_xml_space() {
        let element = XmlNormalizer::new()
            .normalize(
                r#"<a xml:space="preserve"> <b/> <c xml:space="default"> <d/> </c></a>"#,
                None,
            )
            .unwrap();
        assert_eq!(
            element.to_xml_string(),
            r#"<a space="preserve"> <b/> <c space="default"><d/></c></a>"#
        );
    }

    #[test]
    fn test_normalize_non_breaking_space_is_content() {
        let element = XmlNormalizer::new()
            .normalize("<a><b>\u{a0}</b><c/></a>", None)
            .unwrap();
        assert_eq!(element.find("b").unwrap().text(), "\u{a0}");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let normalizer = XmlNormalizer::new();
        let once = normalizer.normalize(CHASSIS, None).unwrap();
        let twice = normalizer.normalize(&once.to_xml_string(), None).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_normalize_colliding_attributes_last_wins() {
        let element = XmlNormalizer::new()
            .normalize(r#"<r xmlns:a="urn:a" xmlns:b="urn:b" a:id="1" b:id="2"/>"#, None)
            .unwrap();
        assert_eq!(element.attributes(), &[("id".to_string(), "2".to_string())]);
    }

    #[test]
    fn test_normalize_entities_round_trip() {
        let element = XmlNormalizer::new()
            .normalize(r#"<m v="a&amp;b">1 &lt; 2</m>"#, None)
            .unwrap();
        assert_eq!(element.attribute("v"), Some("a&b"));
        assert_eq!(element.text(), "1 < 2");
        assert_eq!(element.to_xml_string(), r#"<m v="a&amp;b">1 &lt; 2</m>"#);
    }

    #[test]
    fn test_normalize_malformed_names_host() {
        let err = XmlNormalizer::new()
            .normalize("<a><b></a>", Some("r7"))
            .unwrap_err();
        match err {
            Error::MalformedResponse { host, .. } => assert_eq!(host.as_deref(), Some("r7")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_normalize_rejects_plain_text() {
        assert!(XmlNormalizer::new().normalize("auth failed", None).is_err());
        assert!(XmlNormalizer::new().normalize("", None).is_err());
    }

    #[test]
    fn test_pre_parser_hook() {
        let normalizer = XmlNormalizer::new().with_pre_parser(|raw| raw.replace("&nbsp;", " "));
        assert!(normalizer.has_pre_parser());

        let element = normalizer.normalize("<a>x&nbsp;y</a>", None).unwrap();
        assert_eq!(element.text(), "x y");
    }

    #[test]
    fn test_parse_keeps_qualified_names() {
        let element = Element::parse(r#"<a:x xmlns:a="ns"><a:y/></a:x>"#).unwrap();
        assert_eq!(element.name(), "a:x");
        assert_eq!(element.local_name(), "x");
        assert_eq!(element.attribute("xmlns:a"), Some("ns"));
        assert_eq!(element.first_child_element().unwrap().name(), "a:y");
    }

    #[test]
    fn test_parse_rejects_multiple_roots() {
        let err = Element::parse("<a/><b/>").unwrap_err();
        assert!(err.to_string().contains("multiple root elements"));
    }

    #[test]
    fn test_parse_rejects_unclosed() {
        assert!(Element::parse("<a><b/>").is_err());
    }

    #[test]
    fn test_select_and_descendants() {
        let element = Element::parse(
            "<inv><chassis><module><name>FPC 0</name></module><module><name>PSU 0</name></module></chassis></inv>",
        )
        .unwrap();

        let names: Vec<String> = element
            .select("module/name")
            .into_iter()
            .map(Element::text)
            .collect();
        assert_eq!(names, vec!["FPC 0", "PSU 0"]);
        assert_eq!(element.descendants("module").len(), 2);
        assert_eq!(element.find_path("inv/chassis").unwrap().name(), "chassis");
        assert!(element.find_path("missing").is_none());
        assert!(element.select("").is_empty());
    }

    #[test]
    fn test_select_with_short_lived_path() {
        let element = Element::parse("<inv><chassis><name>Chassis</name></chassis></inv>").unwrap();
        let found = {
            let path = String::from("chassis/name");
            element.select(&path)
        };
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text(), "Chassis");

        let names: Vec<&Element> = {
            let name = String::from("chassis");
            element.find_all(&name).collect()
        };
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_builder_serialization() {
        let element = Element::new("rpc").with_child(
            Element::new("get-interface-information")
                .with_attribute("detail", "true")
                .with_child(Element::new("interface-name").with_text("ge-0/0/0")),
        );
        assert_eq!(
            element.to_xml_string(),
            r#"<rpc><get-interface-information detail="true"><interface-name>ge-0/0/0</interface-name></get-interface-information></rpc>"#
        );
    }

    #[test]
    fn test_into_first_child_element() {
        let element = Element::parse("<r><!-- c --><first/><second/></r>").unwrap();
        assert_eq!(element.into_first_child_element().unwrap().name(), "first");
        assert!(Element::new("empty").into_first_child_element().is_none());
    }
}
