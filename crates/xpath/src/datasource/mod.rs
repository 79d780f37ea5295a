//! Defines the core abstraction for a navigable, read-only data source tree.
use std::hash::Hash;

/// A qualified name: optional prefix, local part and the namespace URI it is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QName<'a> {
    pub prefix: Option<&'a str>,
    pub local_part: &'a str,
    pub namespace: Option<&'a str>,
}

impl<'a> QName<'a> {
    pub fn local(local_part: &'a str) -> Self {
        Self {
            prefix: None,
            local_part,
            namespace: None,
        }
    }

    /// The lexical form used by `name()`, e.g. `ns2:book`.
    pub fn lexical(&self) -> String {
        match self.prefix {
            Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, self.local_part),
            _ => self.local_part.to_string(),
        }
    }
}

/// The type of a node in the data source tree, aligned with the XPath 1.0 data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Root,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
}

/// The contract for a node in a read-only, hierarchical data source.
///
/// The XPath evaluator and the XSLT executor are written against this trait only.
/// Implementations must order nodes in document order through `Ord`.
///
/// `'a` is the lifetime of the underlying document.
pub trait DataSourceNode<'a>:
    std::fmt::Debug + Clone + Copy + PartialEq + Eq + Hash + PartialOrd + Ord
{
    /// The type of the node (Element, Text, Attribute, etc.).
    fn node_type(&self) -> NodeType;

    /// The expanded name of the node. Returns `None` for text, comment and root nodes.
    /// For a processing-instruction, this is its target.
    fn name(&self) -> Option<QName<'a>>;

    /// The string value of the node, as defined by the XPath 1.0 `string()` function.
    /// - For a text node, this is its content.
    /// - For an element or the root, this is the concatenation of all descendant text.
    /// - For an attribute, this is its value.
    fn string_value(&self) -> String;

    /// An iterator over the attribute nodes of this node.
    fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'a>;

    /// An iterator over the child nodes of this node, in document order.
    fn children(&self) -> Box<dyn Iterator<Item = Self> + 'a>;

    /// The parent node. An attribute's parent is its owning element.
    fn parent(&self) -> Option<Self>;
}

/// A hand-built tree for unit tests in this crate and in downstream crates.
pub mod mock {
    use super::*;
    use std::cmp::Ordering;
    use std::hash::Hasher;

    #[derive(Debug, Clone)]
    struct MockNodeData<'a> {
        node_type: NodeType,
        name: Option<QName<'a>>,
        value: String,
        parent: Option<usize>,
        children: Vec<usize>,
        attributes: Vec<usize>,
    }

    #[derive(Debug, Default)]
    pub struct MockTree<'a> {
        nodes: Vec<MockNodeData<'a>>,
    }

    #[derive(Debug, Clone, Copy)]
    pub struct MockNode<'a> {
        pub id: usize,
        pub tree: &'a MockTree<'a>,
    }

    impl<'a> MockTree<'a> {
        pub fn node(&'a self, id: usize) -> MockNode<'a> {
            MockNode { id, tree: self }
        }

        fn push(
            &mut self,
            parent: Option<usize>,
            node_type: NodeType,
            name: Option<QName<'a>>,
            value: &str,
        ) -> usize {
            let id = self.nodes.len();
            self.nodes.push(MockNodeData {
                node_type,
                name,
                value: value.to_string(),
                parent,
                children: vec![],
                attributes: vec![],
            });
            if let Some(p) = parent {
                if node_type == NodeType::Attribute {
                    self.nodes[p].attributes.push(id);
                } else {
                    self.nodes[p].children.push(id);
                }
            }
            id
        }
    }

    impl<'a> PartialEq for MockNode<'a> {
        fn eq(&self, other: &Self) -> bool {
            self.id == other.id
        }
    }
    impl<'a> Eq for MockNode<'a> {}

    impl<'a> PartialOrd for MockNode<'a> {
        fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
            Some(self.cmp(other))
        }
    }
    impl<'a> Ord for MockNode<'a> {
        fn cmp(&self, other: &Self) -> Ordering {
            self.id.cmp(&other.id)
        }
    }

    impl<'a> Hash for MockNode<'a> {
        fn hash<H: Hasher>(&self, state: &mut H) {
            self.id.hash(state);
        }
    }

    impl<'a> DataSourceNode<'a> for MockNode<'a> {
        fn node_type(&self) -> NodeType {
            self.tree.nodes[self.id].node_type
        }

        fn name(&self) -> Option<QName<'a>> {
            self.tree.nodes[self.id].name
        }

        fn string_value(&self) -> String {
            let data = &self.tree.nodes[self.id];
            match data.node_type {
                NodeType::Root | NodeType::Element => data
                    .children
                    .iter()
                    .map(|&c| self.tree.node(c))
                    .filter(|n| matches!(n.node_type(), NodeType::Element | NodeType::Text))
                    .map(|n| n.string_value())
                    .collect(),
                _ => data.value.clone(),
            }
        }

        fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
            let tree = self.tree;
            Box::new(tree.nodes[self.id].attributes.iter().map(move |&id| tree.node(id)))
        }

        fn children(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
            let tree = self.tree;
            Box::new(tree.nodes[self.id].children.iter().map(move |&id| tree.node(id)))
        }

        fn parent(&self) -> Option<Self> {
            self.tree.nodes[self.id].parent.map(|pid| self.tree.node(pid))
        }
    }

    /// Creates a small tree, ids assigned in document order:
    /// ```text
    /// <root>                                   0 (root node)
    ///   <para id="p1" xml:lang="en">Hello</para> 1, attrs 2 and 3, text 4
    ///   <!-- comment node -->                  5
    ///   <div/>                                 6
    ///   <?pi-target pi-value?>                 7
    ///   <para>World</para>                     8, text 9
    /// </root>
    /// ```
    pub fn create_test_tree<'a>() -> MockTree<'a> {
        let mut tree = MockTree::default();
        let root = tree.push(None, NodeType::Root, None, "");
        let para = tree.push(Some(root), NodeType::Element, Some(QName::local("para")), "");
        tree.push(Some(para), NodeType::Attribute, Some(QName::local("id")), "p1");
        tree.push(
            Some(para),
            NodeType::Attribute,
            Some(QName {
                prefix: Some("xml"),
                local_part: "lang",
                namespace: Some("http://www.w3.org/XML/1998/namespace"),
            }),
            "en",
        );
        tree.push(Some(para), NodeType::Text, None, "Hello");
        tree.push(Some(root), NodeType::Comment, None, " comment node ");
        tree.push(Some(root), NodeType::Element, Some(QName::local("div")), "");
        tree.push(
            Some(root),
            NodeType::ProcessingInstruction,
            Some(QName::local("pi-target")),
            "pi-value",
        );
        let para2 = tree.push(Some(root), NodeType::Element, Some(QName::local("para")), "");
        tree.push(Some(para2), NodeType::Text, None, "World");
        tree
    }
}
