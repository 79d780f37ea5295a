//! An owned, immutable XML tree built from payload bytes.
//!
//! `roxmltree` does the parsing; its borrowed tree is then flattened into an arena so the
//! document outlives the input buffer. Node ids follow document order, with an element's
//! attributes numbered directly after the element itself, so `Ord` on [`XmlNode`] is
//! document order.

use crate::datasource::{DataSourceNode, NodeType, QName};
use crate::encoding;
use crate::error::DocumentError;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

#[derive(Debug, Clone)]
struct ExpandedName {
    prefix: Option<String>,
    namespace: Option<String>,
    local: String,
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeType,
    name: Option<ExpandedName>,
    value: String,
    parent: Option<usize>,
    children: Vec<usize>,
    attributes: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct XmlDocument {
    nodes: Vec<NodeData>,
}

impl XmlDocument {
    /// Parses XML bytes in the encoding given by their BOM or XML declaration, UTF-8 when
    /// neither says otherwise.
    pub fn parse(bytes: &[u8]) -> Result<Self, DocumentError> {
        Self::parse_stripping(bytes, |_, _| false)
    }

    /// Parses like [`XmlDocument::parse`], dropping whitespace-only text children of every
    /// element for which `strip(namespace, local_name)` returns true.
    pub fn parse_stripping<F>(bytes: &[u8], strip: F) -> Result<Self, DocumentError>
    where
        F: Fn(Option<&str>, &str) -> bool,
    {
        let text = encoding::decode(bytes)?;
        let options = roxmltree::ParsingOptions {
            allow_dtd: true,
            ..Default::default()
        };
        let parsed = roxmltree::Document::parse_with_options(&text, options)?;

        let mut doc = XmlDocument { nodes: Vec::new() };
        doc.append(parsed.root(), None, &strip);
        log::debug!("Parsed XML document with {} nodes", doc.nodes.len());
        Ok(doc)
    }

    pub fn root(&self) -> XmlNode<'_> {
        XmlNode { doc: self, id: 0 }
    }

    /// The outermost element, if the document has one.
    pub fn document_element(&self) -> Option<XmlNode<'_>> {
        self.root()
            .children()
            .find(|n| n.node_type() == NodeType::Element)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push(&mut self, data: NodeData) -> usize {
        let id = self.nodes.len();
        self.nodes.push(data);
        id
    }

    fn append<F>(&mut self, node: roxmltree::Node<'_, '_>, parent: Option<usize>, strip: &F)
    where
        F: Fn(Option<&str>, &str) -> bool,
    {
        let (kind, name, value) = match node.node_type() {
            roxmltree::NodeType::Root => (NodeType::Root, None, String::new()),
            roxmltree::NodeType::Element => {
                let tag = node.tag_name();
                let name = ExpandedName {
                    prefix: tag.namespace().and_then(|uri| prefix_for(node, uri)),
                    namespace: tag.namespace().map(str::to_string),
                    local: tag.name().to_string(),
                };
                (NodeType::Element, Some(name), String::new())
            }
            roxmltree::NodeType::Text => {
                let text = node.text().unwrap_or_default();
                let strippable = text.trim().is_empty()
                    && node.parent_element().is_some_and(|p| {
                        strip(p.tag_name().namespace(), p.tag_name().name())
                    });
                if strippable {
                    return;
                }
                (NodeType::Text, None, text.to_string())
            }
            roxmltree::NodeType::Comment => (
                NodeType::Comment,
                None,
                node.text().unwrap_or_default().to_string(),
            ),
            roxmltree::NodeType::PI => {
                let Some(pi) = node.pi() else { return };
                let name = ExpandedName {
                    prefix: None,
                    namespace: None,
                    local: pi.target.to_string(),
                };
                (
                    NodeType::ProcessingInstruction,
                    Some(name),
                    pi.value.unwrap_or_default().to_string(),
                )
            }
        };

        let id = self.push(NodeData {
            kind,
            name,
            value,
            parent,
            children: vec![],
            attributes: vec![],
        });
        if let Some(p) = parent {
            self.nodes[p].children.push(id);
        }

        if kind == NodeType::Element {
            for attr in node.attributes() {
                let name = ExpandedName {
                    prefix: attr.namespace().and_then(|uri| prefix_for(node, uri)),
                    namespace: attr.namespace().map(str::to_string),
                    local: attr.name().to_string(),
                };
                let attr_id = self.push(NodeData {
                    kind: NodeType::Attribute,
                    name: Some(name),
                    value: attr.value().to_string(),
                    parent: Some(id),
                    children: vec![],
                    attributes: vec![],
                });
                self.nodes[id].attributes.push(attr_id);
            }
        }

        for child in node.children() {
            self.append(child, Some(id), strip);
        }
    }
}

fn prefix_for(node: roxmltree::Node<'_, '_>, uri: &str) -> Option<String> {
    if uri == XML_NAMESPACE {
        return Some("xml".to_string());
    }
    node.namespaces()
        .find(|ns| ns.uri() == uri && ns.name().is_some())
        .and_then(|ns| ns.name())
        .map(str::to_string)
}

/// A node handle into an [`XmlDocument`]. Cheap to copy; compares in document order.
#[derive(Clone, Copy)]
pub struct XmlNode<'d> {
    doc: &'d XmlDocument,
    id: usize,
}

impl<'d> XmlNode<'d> {
    fn data(&self) -> &'d NodeData {
        &self.doc.nodes[self.id]
    }

    pub fn document(&self) -> &'d XmlDocument {
        self.doc
    }

    pub fn namespace(&self) -> Option<&'d str> {
        self.data().name.as_ref().and_then(|n| n.namespace.as_deref())
    }

    pub fn local_name(&self) -> Option<&'d str> {
        self.data().name.as_ref().map(|n| n.local.as_str())
    }

    pub fn prefix(&self) -> Option<&'d str> {
        self.data().name.as_ref().and_then(|n| n.prefix.as_deref())
    }

    /// The node's own content: text for text and comment nodes, the value for attributes
    /// and processing instructions. Empty for elements and the root.
    pub fn value(&self) -> &'d str {
        &self.data().value
    }

    /// Whitespace-only text nodes.
    pub fn is_whitespace(&self) -> bool {
        self.data().kind == NodeType::Text && self.data().value.trim().is_empty()
    }

    fn collect_text(&self, out: &mut String) {
        for child in self.data().children.iter().map(|&id| XmlNode { doc: self.doc, id }) {
            match child.data().kind {
                NodeType::Text => out.push_str(&child.data().value),
                NodeType::Element => child.collect_text(out),
                _ => {}
            }
        }
    }
}

impl<'d> PartialEq for XmlNode<'d> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && std::ptr::eq(self.doc, other.doc)
    }
}

impl<'d> Eq for XmlNode<'d> {}

impl<'d> PartialOrd for XmlNode<'d> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<'d> Ord for XmlNode<'d> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl<'d> Hash for XmlNode<'d> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<'d> fmt::Debug for XmlNode<'d> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data();
        match &data.name {
            Some(name) => write!(f, "{:?}#{}({})", data.kind, self.id, name.local),
            None => write!(f, "{:?}#{}", data.kind, self.id),
        }
    }
}

impl<'d> DataSourceNode<'d> for XmlNode<'d> {
    fn node_type(&self) -> NodeType {
        self.data().kind
    }

    fn name(&self) -> Option<QName<'d>> {
        self.data().name.as_ref().map(|n| QName {
            prefix: n.prefix.as_deref(),
            local_part: &n.local,
            namespace: n.namespace.as_deref(),
        })
    }

    fn string_value(&self) -> String {
        match self.data().kind {
            NodeType::Root | NodeType::Element => {
                let mut out = String::new();
                self.collect_text(&mut out);
                out
            }
            _ => self.data().value.clone(),
        }
    }

    fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'd> {
        let doc = self.doc;
        Box::new(self.data().attributes.iter().map(move |&id| XmlNode { doc, id }))
    }

    fn children(&self) -> Box<dyn Iterator<Item = Self> + 'd> {
        let doc = self.doc;
        Box::new(self.data().children.iter().map(move |&id| XmlNode { doc, id }))
    }

    fn parent(&self) -> Option<Self> {
        self.data().parent.map(|id| XmlNode { doc: self.doc, id })
    }
}
