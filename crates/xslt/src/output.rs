//! Defines the `OutputBuilder` trait, which decouples the executor from the result
//! tree it produces, and the two builders used by the processor.

use crate::ast::ResultName;

/// The semantic actions of building a result tree.
pub trait OutputBuilder {
    fn start_element(&mut self, name: ResultName);
    fn end_element(&mut self);

    /// Declares a namespace on the element most recently started.
    fn declare_namespace(&mut self, prefix: Option<&str>, uri: &str);

    /// Sets an attribute on the element most recently started. Ignored once that element
    /// has children.
    fn set_attribute(&mut self, name: ResultName, value: &str);

    fn add_text(&mut self, text: &str);
    fn add_comment(&mut self, text: &str);
    fn add_processing_instruction(&mut self, target: &str, data: &str);
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResultNode {
    Element {
        name: ResultName,
        namespaces: Vec<(Option<String>, String)>,
        attributes: Vec<(ResultName, String)>,
        children: Vec<ResultNode>,
    },
    Text(String),
    Comment(String),
    ProcessingInstruction {
        target: String,
        data: String,
    },
}

impl ResultNode {
    fn push_text(children: &mut Vec<ResultNode>, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(ResultNode::Text(last)) = children.last_mut() {
            last.push_str(text);
        } else {
            children.push(ResultNode::Text(text.to_string()));
        }
    }
}

#[derive(Debug)]
struct OpenElement {
    name: ResultName,
    namespaces: Vec<(Option<String>, String)>,
    attributes: Vec<(ResultName, String)>,
    children: Vec<ResultNode>,
}

/// Builds an in-memory result tree for the serializer.
#[derive(Debug, Default)]
pub struct ResultTree {
    roots: Vec<ResultNode>,
    open: Vec<OpenElement>,
}

impl ResultTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Closes anything still open and returns the top-level nodes.
    pub fn finish(mut self) -> Vec<ResultNode> {
        while !self.open.is_empty() {
            self.end_element();
        }
        self.roots
    }

    fn children_mut(&mut self) -> &mut Vec<ResultNode> {
        match self.open.last_mut() {
            Some(element) => &mut element.children,
            None => &mut self.roots,
        }
    }
}

impl OutputBuilder for ResultTree {
    fn start_element(&mut self, name: ResultName) {
        self.open.push(OpenElement {
            name,
            namespaces: Vec::new(),
            attributes: Vec::new(),
            children: Vec::new(),
        });
    }

    fn end_element(&mut self) {
        if let Some(element) = self.open.pop() {
            let node = ResultNode::Element {
                name: element.name,
                namespaces: element.namespaces,
                attributes: element.attributes,
                children: element.children,
            };
            self.children_mut().push(node);
        }
    }

    fn declare_namespace(&mut self, prefix: Option<&str>, uri: &str) {
        if let Some(element) = self.open.last_mut() {
            let prefix = prefix.map(str::to_string);
            element.namespaces.retain(|(p, _)| *p != prefix);
            element.namespaces.push((prefix, uri.to_string()));
        }
    }

    fn set_attribute(&mut self, name: ResultName, value: &str) {
        let Some(element) = self.open.last_mut() else {
            log::warn!("Attribute '{}' created outside of an element, ignoring.", name.lexical());
            return;
        };
        if !element.children.is_empty() {
            log::warn!(
                "Attribute '{}' added after children of <{}>, ignoring.",
                name.lexical(),
                element.name.lexical()
            );
            return;
        }
        if let Some(existing) = element.attributes.iter_mut().find(|(n, _)| n.same_expanded_name(&name)) {
            existing.1 = value.to_string();
        } else {
            element.attributes.push((name, value.to_string()));
        }
    }

    fn add_text(&mut self, text: &str) {
        ResultNode::push_text(self.children_mut(), text);
    }

    fn add_comment(&mut self, text: &str) {
        self.children_mut().push(ResultNode::Comment(text.to_string()));
    }

    fn add_processing_instruction(&mut self, target: &str, data: &str) {
        self.children_mut().push(ResultNode::ProcessingInstruction {
            target: target.to_string(),
            data: data.to_string(),
        });
    }
}

/// Collects only the text written to it. Used for the bodies of `xsl:attribute`,
/// `xsl:comment`, `xsl:message` and content-defined variables.
#[derive(Debug, Default)]
pub struct TextCollector {
    text: String,
}

impl TextCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl OutputBuilder for TextCollector {
    fn start_element(&mut self, _: ResultName) {}
    fn end_element(&mut self) {}
    fn declare_namespace(&mut self, _: Option<&str>, _: &str) {}
    fn set_attribute(&mut self, _: ResultName, _: &str) {}

    fn add_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn add_comment(&mut self, _: &str) {}
    fn add_processing_instruction(&mut self, _: &str, _: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_nests_and_merges_text() {
        let mut tree = ResultTree::new();
        tree.start_element(ResultName::local("a"));
        tree.set_attribute(ResultName::local("x"), "1");
        tree.add_text("he");
        tree.add_text("llo");
        tree.start_element(ResultName::local("b"));
        tree.end_element();
        tree.end_element();
        let roots = tree.finish();
        assert_eq!(
            roots,
            vec![ResultNode::Element {
                name: ResultName::local("a"),
                namespaces: vec![],
                attributes: vec![(ResultName::local("x"), "1".to_string())],
                children: vec![
                    ResultNode::Text("hello".to_string()),
                    ResultNode::Element {
                        name: ResultName::local("b"),
                        namespaces: vec![],
                        attributes: vec![],
                        children: vec![],
                    }
                ],
            }]
        );
    }

    #[test]
    fn test_late_and_duplicate_attributes() {
        let mut tree = ResultTree::new();
        tree.start_element(ResultName::local("a"));
        tree.set_attribute(ResultName::local("x"), "1");
        tree.set_attribute(ResultName::local("x"), "2");
        tree.add_text("t");
        tree.set_attribute(ResultName::local("y"), "ignored");
        let roots = tree.finish();
        match &roots[0] {
            ResultNode::Element { attributes, .. } => {
                assert_eq!(attributes, &vec![(ResultName::local("x"), "2".to_string())]);
            }
            other => panic!("Expected element, got {:?}", other),
        }
    }

    #[test]
    fn test_text_collector_keeps_only_text() {
        let mut collector = TextCollector::new();
        collector.add_text("a");
        collector.start_element(ResultName::local("b"));
        collector.add_text("c");
        collector.end_element();
        collector.add_comment("ignored");
        assert_eq!(collector.into_string(), "ac");
    }
}
