//! Writes a finished result tree as text using `quick-xml`, declaring namespaces where
//! the names in the tree need them.

use crate::ast::{OutputMethod, OutputSettings, ResultName};
use crate::error::XsltError;
use crate::output::ResultNode;
use quick_xml::Writer;
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};
use xmlbridge_xpath::XML_NAMESPACE;

const HTML_VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Serializes `nodes` according to `settings`. Without an explicit method, output whose
/// first element is an unqualified `html` is written as HTML, anything else as XML.
pub fn serialize(nodes: &[ResultNode], settings: &OutputSettings) -> Result<String, XsltError> {
    let method = settings.method.unwrap_or_else(|| detect_method(nodes));
    if method == OutputMethod::Text {
        let mut text = String::new();
        collect_text(nodes, &mut text);
        return Ok(text);
    }

    let writer = if settings.indent {
        Writer::new_with_indent(Vec::new(), b' ', 2)
    } else {
        Writer::new(Vec::new())
    };
    let mut serializer = Serializer {
        writer,
        html: method == OutputMethod::Html,
        scopes: vec![vec![
            (None, String::new()),
            (Some("xml".to_string()), XML_NAMESPACE.to_string()),
        ]],
        generated: 0,
    };
    if method == OutputMethod::Xml && !settings.omit_xml_declaration {
        let standalone = settings.standalone.map(|s| if s { "yes" } else { "no" });
        serializer.emit(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), standalone)))?;
    }
    for node in nodes {
        serializer.write_node(node)?;
    }
    Ok(String::from_utf8(serializer.writer.into_inner())?)
}

fn detect_method(nodes: &[ResultNode]) -> OutputMethod {
    for node in nodes {
        match node {
            ResultNode::Text(t) if t.trim().is_empty() => continue,
            ResultNode::Element { name, .. }
                if name.namespace.is_none() && name.local.eq_ignore_ascii_case("html") =>
            {
                return OutputMethod::Html;
            }
            ResultNode::Comment(_) | ResultNode::ProcessingInstruction { .. } => continue,
            _ => break,
        }
    }
    OutputMethod::Xml
}

fn collect_text(nodes: &[ResultNode], out: &mut String) {
    for node in nodes {
        match node {
            ResultNode::Text(t) => out.push_str(t),
            ResultNode::Element { children, .. } => collect_text(children, out),
            _ => {}
        }
    }
}

type Binding = (Option<String>, String);

struct Serializer {
    writer: Writer<Vec<u8>>,
    html: bool,
    /// Namespace declarations in effect, one entry per open element.
    scopes: Vec<Vec<Binding>>,
    generated: usize,
}

impl Serializer {
    fn emit(&mut self, event: Event<'_>) -> Result<(), XsltError> {
        self.writer
            .write_event(event)
            .map_err(|e| XsltError::Serialization(e.to_string()))
    }

    fn lookup<'b>(&'b self, declared: &'b [Binding], prefix: Option<&str>) -> Option<&'b str> {
        declared
            .iter()
            .chain(self.scopes.iter().rev().flatten())
            .find(|(p, _)| p.as_deref() == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    /// A non-default prefix already bound to `uri`, if any.
    fn prefix_for(&self, declared: &[Binding], uri: &str) -> Option<String> {
        declared
            .iter()
            .chain(self.scopes.iter().rev().flatten())
            .filter_map(|(p, u)| p.as_ref().filter(|_| u == uri))
            .find(|p| self.lookup(declared, Some(p.as_str())) == Some(uri))
            .cloned()
    }

    fn fresh_prefix(&mut self, declared: &[Binding]) -> String {
        loop {
            let candidate = format!("ns{}", self.generated);
            self.generated += 1;
            if self.lookup(declared, Some(&candidate)).is_none() {
                return candidate;
            }
        }
    }

    /// Ensures `prefix` maps to `uri` on the element being opened. Returns the prefix that
    /// was actually used, which differs when `prefix` is already taken on this element.
    fn bind(&mut self, declared: &mut Vec<Binding>, prefix: Option<String>, uri: &str) -> Option<String> {
        if prefix.as_deref() == Some("xml") {
            return prefix;
        }
        if self.lookup(declared, prefix.as_deref()) == Some(uri) {
            return prefix;
        }
        let taken_here = declared.iter().any(|(p, _)| *p == prefix);
        let prefix = if taken_here {
            Some(self.fresh_prefix(declared))
        } else {
            prefix
        };
        declared.push((prefix.clone(), uri.to_string()));
        prefix
    }

    fn write_node(&mut self, node: &ResultNode) -> Result<(), XsltError> {
        match node {
            ResultNode::Text(text) => {
                self.emit(Event::Text(BytesText::from_escaped(partial_escape(text))))
            }
            ResultNode::Comment(text) => {
                let safe = text.replace("--", "- -");
                self.emit(Event::Comment(BytesText::from_escaped(safe)))
            }
            ResultNode::ProcessingInstruction { target, data } => {
                let content = if data.is_empty() {
                    target.clone()
                } else {
                    format!("{} {}", target, data)
                };
                self.emit(Event::PI(BytesPI::new(content)))
            }
            ResultNode::Element {
                name,
                namespaces,
                attributes,
                children,
            } => self.write_element(name, namespaces, attributes, children),
        }
    }

    fn write_element(
        &mut self,
        name: &ResultName,
        namespaces: &[Binding],
        attributes: &[(ResultName, String)],
        children: &[ResultNode],
    ) -> Result<(), XsltError> {
        let mut declared: Vec<Binding> = Vec::new();
        for (prefix, uri) in namespaces {
            if prefix.is_some() && uri.is_empty() {
                continue;
            }
            self.bind(&mut declared, prefix.clone(), uri);
        }

        let element_uri = name.namespace.clone().unwrap_or_default();
        let element_prefix = if element_uri.is_empty() {
            None
        } else {
            name.prefix.clone()
        };
        let element_prefix = self.bind(&mut declared, element_prefix, &element_uri);
        let qname = qualified(element_prefix.as_deref(), &name.local);

        let mut written_attributes = Vec::with_capacity(attributes.len());
        for (attr_name, value) in attributes {
            let attr_qname = match attr_name.namespace.as_deref() {
                None | Some("") => attr_name.local.clone(),
                Some(uri) => {
                    let prefix = match attr_name.prefix.clone() {
                        Some(p) => p,
                        None => match self.prefix_for(&declared, uri) {
                            Some(p) => p,
                            None => self.fresh_prefix(&declared),
                        },
                    };
                    let used = self.bind(&mut declared, Some(prefix), uri);
                    qualified(used.as_deref(), &attr_name.local)
                }
            };
            written_attributes.push((attr_qname, value.as_str()));
        }

        let mut start = BytesStart::new(qname.clone());
        for (prefix, uri) in &declared {
            let key = match prefix {
                Some(p) => format!("xmlns:{}", p),
                None => "xmlns".to_string(),
            };
            start.push_attribute((key.as_str(), uri.as_str()));
        }
        for (key, value) in &written_attributes {
            start.push_attribute((key.as_str(), *value));
        }

        self.scopes.push(declared);
        if children.is_empty() {
            if !self.html {
                self.emit(Event::Empty(start))?;
            } else if HTML_VOID_ELEMENTS.contains(&name.local.to_ascii_lowercase().as_str()) {
                self.emit(Event::Start(start))?;
            } else {
                self.emit(Event::Start(start))?;
                self.emit(Event::End(BytesEnd::new(qname)))?;
            }
        } else {
            self.emit(Event::Start(start))?;
            for child in children {
                self.write_node(child)?;
            }
            self.emit(Event::End(BytesEnd::new(qname)))?;
        }
        self.scopes.pop();
        Ok(())
    }
}

fn qualified(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(p) => format!("{}:{}", p, local),
        None => local.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{OutputBuilder, ResultTree};

    fn name(prefix: Option<&str>, local: &str, ns: Option<&str>) -> ResultName {
        ResultName {
            prefix: prefix.map(str::to_string),
            local: local.to_string(),
            namespace: ns.map(str::to_string),
        }
    }

    fn settings(method: Option<OutputMethod>, omit: bool) -> OutputSettings {
        OutputSettings {
            method,
            omit_xml_declaration: omit,
            ..Default::default()
        }
    }

    #[test]
    fn test_xml_with_declaration_and_escaping() {
        let mut tree = ResultTree::new();
        tree.start_element(name(None, "a", None));
        tree.set_attribute(name(None, "q", None), "say \"hi\"");
        tree.add_text("1 < 2 & 'x'");
        tree.end_element();
        let out = serialize(&tree.finish(), &settings(None, false)).unwrap();
        assert_eq!(
            out,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><a q=\"say &quot;hi&quot;\">1 &lt; 2 &amp; 'x'</a>"
        );
    }

    #[test]
    fn test_namespaces_are_declared_once() {
        let mut tree = ResultTree::new();
        tree.start_element(name(Some("b"), "store", Some("urn:b")));
        tree.start_element(name(Some("b"), "book", Some("urn:b")));
        tree.end_element();
        tree.start_element(name(None, "plain", None));
        tree.end_element();
        tree.end_element();
        let out = serialize(&tree.finish(), &settings(None, true)).unwrap();
        assert_eq!(out, r#"<b:store xmlns:b="urn:b"><b:book/><plain/></b:store>"#);
    }

    #[test]
    fn test_default_namespace_is_undeclared_for_unqualified_children() {
        let mut tree = ResultTree::new();
        tree.start_element(name(None, "root", Some("urn:d")));
        tree.start_element(name(None, "child", None));
        tree.end_element();
        tree.end_element();
        let out = serialize(&tree.finish(), &settings(None, true)).unwrap();
        assert_eq!(out, r#"<root xmlns="urn:d"><child xmlns=""/></root>"#);
    }

    #[test]
    fn test_namespaced_attribute_without_prefix_gets_one() {
        let mut tree = ResultTree::new();
        tree.start_element(name(None, "e", None));
        tree.set_attribute(name(None, "id", Some("urn:attr")), "1");
        tree.end_element();
        let out = serialize(&tree.finish(), &settings(None, true)).unwrap();
        assert_eq!(out, r#"<e xmlns:ns0="urn:attr" ns0:id="1"/>"#);
    }

    #[test]
    fn test_text_method_and_html_detection() {
        let mut tree = ResultTree::new();
        tree.start_element(name(None, "html", None));
        tree.start_element(name(None, "br", None));
        tree.end_element();
        tree.add_text("x");
        tree.end_element();
        let nodes = tree.finish();
        assert_eq!(serialize(&nodes, &settings(None, false)).unwrap(), "<html><br>x</html>");
        assert_eq!(serialize(&nodes, &settings(Some(OutputMethod::Text), false)).unwrap(), "x");
    }
}
