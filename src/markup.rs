//! Minimal document tree over quick-xml events.
//!
//! Archive documents are walked as a closed set of node kinds, [`Node::Tag`]
//! and [`Node::Text`], with explicit attribute accessors. Only elements and
//! character data are kept; comments, processing instructions and doctype
//! declarations are dropped.

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarkupError {
    #[error("XML error at byte {position}: {source}")]
    Xml {
        position: usize,
        #[source]
        source: quick_xml::Error,
    },
    #[error("unexpected closing tag </{0}>")]
    UnbalancedEnd(String),
    #[error("unclosed element <{0}>")]
    Unclosed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Tag(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Local name, without namespace prefix.
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    fn from_start(e: &BytesStart) -> Self {
        let name = local_name(e.name().as_ref());
        let attributes = e
            .attributes()
            .filter_map(|a| a.ok())
            .map(|a| {
                let key = local_name(a.key.as_ref());
                let value = a
                    .unescape_value()
                    .map(|v| v.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(&a.value).into_owned());
                (key, value)
            })
            .collect();
        Element {
            name,
            attributes,
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    /// Whitespace-separated class names.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    /// Concatenated descendant text.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out, &|_| false);
        out
    }

    /// Concatenated descendant text, skipping subtrees for which `skip` holds.
    pub fn text_excluding(&self, skip: &dyn Fn(&Element) -> bool) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out, skip);
        out
    }

    /// Depth-first search for the first descendant matching `pred`.
    pub fn find(&self, pred: &dyn Fn(&Element) -> bool) -> Option<&Element> {
        find_in(&self.children, pred)
    }

    /// All descendants matching `pred`, in document order.
    pub fn find_all<'a>(&'a self, pred: &dyn Fn(&Element) -> bool) -> Vec<&'a Element> {
        let mut out = Vec::new();
        find_all_in(&self.children, pred, &mut out);
        out
    }
}

fn collect_text(nodes: &[Node], out: &mut String, skip: &dyn Fn(&Element) -> bool) {
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Tag(el) if skip(el) => {}
            Node::Tag(el) => collect_text(&el.children, out, skip),
        }
    }
}

/// Depth-first search over a node list.
pub fn find_in<'a>(nodes: &'a [Node], pred: &dyn Fn(&Element) -> bool) -> Option<&'a Element> {
    for node in nodes {
        if let Node::Tag(el) = node {
            if pred(el) {
                return Some(el);
            }
            if let Some(found) = find_in(&el.children, pred) {
                return Some(found);
            }
        }
    }
    None
}

fn find_all_in<'a>(nodes: &'a [Node], pred: &dyn Fn(&Element) -> bool, out: &mut Vec<&'a Element>) {
    for node in nodes {
        if let Node::Tag(el) = node {
            if pred(el) {
                out.push(el);
            }
            find_all_in(&el.children, pred, out);
        }
    }
}

fn local_name(qname: &[u8]) -> String {
    let name = String::from_utf8_lossy(qname);
    match name.rsplit_once(':') {
        Some((_, local)) => local.to_string(),
        None => name.into_owned(),
    }
}

/// Resolve the handful of HTML entities that show up in XHTML scripture text.
fn html_entity(name: &str) -> Option<&'static str> {
    match name {
        "nbsp" => Some("\u{a0}"),
        "ensp" => Some("\u{2002}"),
        "emsp" => Some("\u{2003}"),
        "mdash" => Some("\u{2014}"),
        "ndash" => Some("\u{2013}"),
        "hellip" => Some("\u{2026}"),
        "middot" => Some("\u{b7}"),
        _ => None,
    }
}

fn decode_text(e: &BytesText) -> String {
    e.unescape_with(html_entity)
        .map(|t| t.into_owned())
        .unwrap_or_else(|_| String::from_utf8_lossy(e.as_ref()).into_owned())
}

/// Parse a document into its top-level nodes.
pub fn parse_document(content: &str) -> Result<Vec<Node>, MarkupError> {
    let mut reader = Reader::from_str(content);
    reader.trim_text(false);

    let mut roots: Vec<Node> = Vec::new();
    let mut stack: Vec<Element> = Vec::new();

    fn push(node: Node, stack: &mut [Element], roots: &mut Vec<Node>) {
        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => roots.push(node),
        }
    }

    loop {
        let event = reader.read_event().map_err(|source| MarkupError::Xml {
            position: reader.buffer_position(),
            source,
        })?;
        match event {
            Event::Start(ref e) => stack.push(Element::from_start(e)),
            Event::Empty(ref e) => push(Node::Tag(Element::from_start(e)), &mut stack, &mut roots),
            Event::End(ref e) => {
                let name = local_name(e.name().as_ref());
                let element = stack
                    .pop()
                    .ok_or_else(|| MarkupError::UnbalancedEnd(name.clone()))?;
                push(Node::Tag(element), &mut stack, &mut roots);
            }
            Event::Text(ref e) => {
                let text = decode_text(e);
                if !text.is_empty() {
                    push(Node::Text(text), &mut stack, &mut roots);
                }
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                push(Node::Text(text), &mut stack, &mut roots);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(MarkupError::Unclosed(open.name));
    }

    Ok(roots)
}
