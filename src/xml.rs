//! Owned, namespace-aware XML element tree.
//!
//! The envelope embeds an arbitrary foreign XML subtree. [`XmlElement`] is an
//! owned representation of such a subtree: parsed with `quick-xml`, compared
//! structurally, and serialized back with the minimal set of namespace
//! declarations. Text inside the root element is kept exactly as parsed,
//! whitespace included; comments, processing instructions and whitespace
//! around the root element are not retained.
//!
//! [`SharedElement`] is the handle used when a tree has to be shared rather
//! than copied. Whether a value is shared or copied is always chosen
//! explicitly through [`SharedElement::share`] or [`SharedElement::deep_copy`].

use std::io::{self, BufRead};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use quick_xml::escape::{escape, unescape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;
use thiserror::Error;

/// Namespace bound to the reserved `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Errors raised while parsing XML.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XmlError {
    /// The input is not well-formed
    #[error("Malformed XML: {0}")]
    Malformed(String),

    /// A prefix was used without being declared
    #[error("Unknown namespace prefix: {0}")]
    UnknownPrefix(String),

    /// The input contains no element at all
    #[error("Document has no root element")]
    NoRootElement,

    /// Content was found after the root element was closed
    #[error("Unexpected content after the root element")]
    TrailingContent,
}

fn malformed(err: impl std::fmt::Display) -> XmlError {
    XmlError::Malformed(err.to_string())
}

fn utf8(bytes: &[u8]) -> Result<&str, XmlError> {
    std::str::from_utf8(bytes).map_err(malformed)
}

/// A child node of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    /// Nested element
    Element(XmlElement),
    /// Character data, already unescaped
    Text(String),
}

/// An attribute of an element. Namespace declarations are not attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    /// Resolved namespace URI, if the attribute is prefixed
    pub namespace: Option<String>,
    /// Prefix as written in the source
    pub prefix: Option<String>,
    /// Local name
    pub local_name: String,
    /// Unescaped value
    pub value: String,
}

/// An owned XML element with its whole subtree.
///
/// Equality is deep: names, namespaces, prefixes, attributes (in order) and
/// children are compared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    namespace: Option<String>,
    prefix: Option<String>,
    local_name: String,
    attributes: Vec<XmlAttribute>,
    children: Vec<XmlNode>,
}

impl XmlElement {
    /// Create an element without namespace.
    pub fn new(local_name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            prefix: None,
            local_name: local_name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Create an element in `namespace`, using it as default namespace when serialized.
    pub fn new_ns(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        let mut element = Self::new(local_name);
        element.namespace = Some(namespace.into());
        element
    }

    /// Serialize the element with `prefix` instead of a default namespace declaration.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Add an unqualified attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Append a text node.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.push_text(text);
        self
    }

    /// Append a child element.
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.push_child(child);
        self
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Check namespace and local name.
    pub fn is(&self, namespace: Option<&str>, local_name: &str) -> bool {
        self.namespace.as_deref() == namespace && self.local_name == local_name
    }

    pub fn attributes(&self) -> &[XmlAttribute] {
        &self.attributes
    }

    /// Value of the unqualified attribute `name`.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.is_none() && a.local_name == name)
            .map(|a| a.value.as_str())
    }

    /// Set or replace the unqualified attribute `name`.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .attributes
            .iter_mut()
            .find(|a| a.namespace.is_none() && a.local_name == name)
        {
            Some(existing) => existing.value = value,
            None => self.attributes.push(XmlAttribute {
                namespace: None,
                prefix: None,
                local_name: name,
                value,
            }),
        }
    }

    pub fn children(&self) -> &[XmlNode] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<XmlNode> {
        &mut self.children
    }

    /// Consume the element, returning its children.
    pub fn into_children(self) -> Vec<XmlNode> {
        self.children
    }

    pub fn push_child(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    /// Append text, merging with a preceding text node.
    pub fn push_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if let Some(XmlNode::Text(existing)) = self.children.last_mut() {
            existing.push_str(&text);
        } else {
            self.children.push(XmlNode::Text(text));
        }
    }

    /// Iterate over child elements, skipping text.
    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    /// Child elements with the given name.
    pub fn children_named<'a>(
        &'a self,
        namespace: Option<&'a str>,
        local_name: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.child_elements()
            .filter(move |child| child.is(namespace, local_name))
    }

    /// First child element with the given name.
    pub fn first_child(&self, namespace: Option<&str>, local_name: &str) -> Option<&XmlElement> {
        self.child_elements()
            .find(|child| child.is(namespace, local_name))
    }

    /// Concatenated direct text content.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                XmlNode::Text(text) => Some(text.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect()
    }

    /// Parse a complete document from a string.
    pub fn parse_str(xml: &str) -> Result<Self, XmlError> {
        Self::parse_reader(xml.as_bytes())
    }

    /// Parse a complete document from a buffered reader.
    pub fn parse_reader<R: BufRead>(source: R) -> Result<Self, XmlError> {
        let mut reader = NsReader::from_reader(source);
        reader.config_mut().expand_empty_elements = true;

        let mut buf = Vec::new();
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            let (resolved, event) = reader
                .read_resolved_event_into(&mut buf)
                .map_err(malformed)?;
            let namespace = owned_namespace(resolved)?;
            match event {
                Event::Start(start) => {
                    if root.is_some() {
                        return Err(XmlError::TrailingContent);
                    }
                    stack.push(start_element(&reader, &start, namespace)?);
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| malformed("unbalanced end tag"))?;
                    match stack.last_mut() {
                        Some(parent) => parent.push_child(element),
                        None => root = Some(element),
                    }
                }
                Event::Text(text) => {
                    let value = unescape(utf8(&text)?).map_err(malformed)?;
                    push_text(&mut stack, &value)?;
                }
                Event::CData(data) => push_text(&mut stack, utf8(&data)?)?,
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(malformed("unclosed element at end of input"));
        }
        root.ok_or(XmlError::NoRootElement)
    }

    /// Serialize the subtree without XML declaration.
    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        write_element(self, &mut out, &mut Vec::new());
        out
    }

    /// Serialize as a standalone document with XML declaration.
    pub fn to_xml_document(&self) -> String {
        let mut out = String::from(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        write_element(self, &mut out, &mut Vec::new());
        out
    }

    /// Write the serialized document to `writer`.
    pub fn write_to<W: io::Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(self.to_xml_document().as_bytes())?;
        writer.flush()
    }
}

fn owned_namespace(resolved: ResolveResult<'_>) -> Result<Option<String>, XmlError> {
    match resolved {
        ResolveResult::Bound(ns) if ns.as_ref().is_empty() => Ok(None),
        ResolveResult::Bound(ns) => Ok(Some(utf8(ns.as_ref())?.to_string())),
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(prefix) => Err(XmlError::UnknownPrefix(
            String::from_utf8_lossy(&prefix).into_owned(),
        )),
    }
}

fn start_element<R>(
    reader: &NsReader<R>,
    start: &BytesStart<'_>,
    namespace: Option<String>,
) -> Result<XmlElement, XmlError> {
    let mut element = XmlElement::new(utf8(start.local_name().as_ref())?);
    element.namespace = namespace;
    element.prefix = match start.name().prefix() {
        Some(prefix) => Some(utf8(prefix.as_ref())?.to_string()),
        None => None,
    };

    for attribute in start.attributes() {
        let attribute = attribute.map_err(malformed)?;
        if attribute.key.as_namespace_binding().is_some() {
            continue;
        }
        let (resolved, local) = reader.resolve_attribute(attribute.key);
        let namespace = owned_namespace(resolved)?;
        let prefix = match attribute.key.prefix() {
            Some(prefix) => Some(utf8(prefix.as_ref())?.to_string()),
            None => None,
        };
        let value = unescape(utf8(&attribute.value)?).map_err(malformed)?;
        element.attributes.push(XmlAttribute {
            namespace,
            prefix,
            local_name: utf8(local.as_ref())?.to_string(),
            value: value.into_owned(),
        });
    }
    Ok(element)
}

fn push_text(stack: &mut [XmlElement], text: &str) -> Result<(), XmlError> {
    if text.is_empty() {
        return Ok(());
    }
    match stack.last_mut() {
        Some(element) => {
            element.push_text(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(XmlError::TrailingContent),
    }
}

type Scope = Vec<(Option<String>, Option<String>)>;

/// Bind `prefix` to `namespace` unless that binding is already in scope.
fn bind(
    scope: &mut Scope,
    declarations: &mut Vec<(Option<String>, String)>,
    prefix: Option<&str>,
    namespace: Option<&str>,
) {
    if prefix == Some("xml") {
        return;
    }
    let current = scope
        .iter()
        .rev()
        .find(|(p, _)| p.as_deref() == prefix)
        .and_then(|(_, ns)| ns.as_deref());
    if current == namespace || (prefix.is_some() && namespace.is_none()) {
        return;
    }
    scope.push((prefix.map(str::to_string), namespace.map(str::to_string)));
    declarations.push((
        prefix.map(str::to_string),
        namespace.unwrap_or_default().to_string(),
    ));
}

fn qualified(prefix: Option<&str>, local_name: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}:{local_name}"),
        None => local_name.to_string(),
    }
}

fn write_element(element: &XmlElement, out: &mut String, scope: &mut Scope) {
    let mark = scope.len();
    let mut declarations = Vec::new();

    let prefix = element.namespace.as_ref().and(element.prefix.as_deref());
    bind(
        scope,
        &mut declarations,
        prefix,
        element.namespace.as_deref(),
    );
    for attribute in &element.attributes {
        if let (Some(prefix), Some(namespace)) = (&attribute.prefix, &attribute.namespace) {
            bind(
                scope,
                &mut declarations,
                Some(prefix.as_str()),
                Some(namespace.as_str()),
            );
        }
    }

    let name = qualified(prefix, &element.local_name);
    out.push('<');
    out.push_str(&name);
    for (prefix, namespace) in &declarations {
        match prefix {
            Some(prefix) => out.push_str(&format!(" xmlns:{prefix}=\"{}\"", escape(namespace))),
            None => out.push_str(&format!(" xmlns=\"{}\"", escape(namespace))),
        }
    }
    for attribute in &element.attributes {
        let prefix = attribute
            .namespace
            .as_ref()
            .and(attribute.prefix.as_deref());
        out.push_str(&format!(
            " {}=\"{}\"",
            qualified(prefix, &attribute.local_name),
            escape(&attribute.value)
        ));
    }

    if element.children.is_empty() {
        out.push_str("/>");
    } else {
        out.push('>');
        for child in &element.children {
            match child {
                XmlNode::Element(child) => write_element(child, out, scope),
                XmlNode::Text(text) => out.push_str(&escape(text)),
            }
        }
        out.push_str("</");
        out.push_str(&name);
        out.push('>');
    }
    scope.truncate(mark);
}

/// A shared, mutable handle to an element tree.
///
/// [`SharedElement::share`] hands out another handle to the *same* tree:
/// mutations through one handle are visible through all of them.
/// [`SharedElement::deep_copy`] creates an independent tree.
/// Equality compares tree contents, not identity.
#[derive(Debug)]
pub struct SharedElement(Arc<RwLock<XmlElement>>);

impl SharedElement {
    /// Take ownership of `element`.
    pub fn new(element: XmlElement) -> Self {
        Self(Arc::new(RwLock::new(element)))
    }

    /// Another handle to the same tree.
    pub fn share(&self) -> Self {
        Self(Arc::clone(&self.0))
    }

    /// A handle to an independent copy of the tree.
    pub fn deep_copy(&self) -> Self {
        Self::new(self.to_element())
    }

    /// An owned copy of the current tree contents.
    pub fn to_element(&self) -> XmlElement {
        self.read().clone()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, XmlElement> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, XmlElement> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether both handles refer to the same tree.
    pub fn ptr_eq(&self, other: &SharedElement) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for SharedElement {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.read() == *other.read()
    }
}

impl Eq for SharedElement {}

impl From<XmlElement> for SharedElement {
    fn from(element: XmlElement) -> Self {
        Self::new(element)
    }
}
