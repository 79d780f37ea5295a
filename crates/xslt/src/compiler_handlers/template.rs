//! Compiles instruction sequences: the bodies of templates and of every instruction that
//! has content. Literal result elements and the simple XSLT instructions are handled here.

use crate::ast::{PreparsedTemplate, ResultName, When, XsltInstruction};
use crate::compiler::{CompilerBuilder, XSLT_NAMESPACE, is_xsl};
use crate::compiler_handlers::{is_ignorable, is_xslt_namespace};
use crate::error::XsltError;
use crate::util::split_qname;
use roxmltree::Node;
use xmlbridge_xpath::XML_NAMESPACE;

impl<'d, 'i: 'd> CompilerBuilder<'d, 'i> {
    pub(crate) fn compile_sequence(
        &mut self,
        parent: Node<'d, 'i>,
    ) -> Result<PreparsedTemplate, XsltError> {
        self.compile_nodes(parent.children())
    }

    /// Compiles sibling nodes in order. Whitespace-only text in the stylesheet is dropped;
    /// `xsl:text` is the way to write it.
    pub(crate) fn compile_nodes<I>(&mut self, nodes: I) -> Result<PreparsedTemplate, XsltError>
    where
        I: IntoIterator<Item = Node<'d, 'i>>,
    {
        let mut instructions = Vec::new();
        for node in nodes {
            if is_ignorable(node) {
                continue;
            }
            if node.is_text() {
                if let Some(text) = node.text() {
                    instructions.push(XsltInstruction::Text(text.to_string()));
                }
                continue;
            }
            if !node.is_element() {
                continue;
            }
            if is_xslt_namespace(node.tag_name().namespace()) {
                if let Some(instruction) = self.compile_instruction(node)? {
                    instructions.push(instruction);
                }
            } else {
                instructions.push(self.compile_literal_result_element(node)?);
            }
        }
        Ok(PreparsedTemplate(instructions))
    }

    fn compile_instruction(
        &mut self,
        node: Node<'d, 'i>,
    ) -> Result<Option<XsltInstruction>, XsltError> {
        let instruction = match node.tag_name().name() {
            "apply-templates" => self.handle_apply_templates(node)?,
            "call-template" => self.handle_call_template(node)?,
            "for-each" => self.handle_for_each(node)?,
            "value-of" => {
                if node.attribute("disable-output-escaping") == Some("yes") {
                    log::warn!("disable-output-escaping is not supported and is ignored");
                }
                XsltInstruction::ValueOf {
                    select: self.expression_attr(node, "select")?,
                }
            }
            "copy-of" => XsltInstruction::CopyOf {
                select: self.expression_attr(node, "select")?,
            },
            "copy" => {
                self.reject_attribute_sets(node)?;
                XsltInstruction::Copy {
                    body: self.compile_sequence(node)?,
                }
            }
            "if" => XsltInstruction::If {
                test: self.expression_attr(node, "test")?,
                body: self.compile_sequence(node)?,
            },
            "choose" => self.handle_choose(node)?,
            "text" => return self.handle_text(node),
            "element" => {
                self.reject_attribute_sets(node)?;
                XsltInstruction::Element {
                    name: self.avt(node, self.required_attr(node, "name")?)?,
                    namespace: self.namespace_avt(node)?,
                    scope: self.namespace_scope(node),
                    body: self.compile_sequence(node)?,
                }
            }
            "attribute" => XsltInstruction::Attribute {
                name: self.avt(node, self.required_attr(node, "name")?)?,
                namespace: self.namespace_avt(node)?,
                scope: self.namespace_scope(node),
                body: self.compile_sequence(node)?,
            },
            "comment" => XsltInstruction::Comment {
                body: self.compile_sequence(node)?,
            },
            "processing-instruction" => XsltInstruction::ProcessingInstruction {
                name: self.avt(node, self.required_attr(node, "name")?)?,
                body: self.compile_sequence(node)?,
            },
            "variable" => self.handle_variable(node)?,
            "message" => XsltInstruction::Message {
                terminate: self.yes_no_attr(node, "terminate")?.unwrap_or(false),
                body: self.compile_sequence(node)?,
            },
            "fallback" => return Ok(None),
            "param" => {
                return Err(self.error(node, "xsl:param must come first in an xsl:template"));
            }
            "sort" => {
                return Err(self.error(
                    node,
                    "xsl:sort is only allowed at the start of xsl:for-each or in xsl:apply-templates",
                ));
            }
            "with-param" => {
                return Err(self.error(
                    node,
                    "xsl:with-param is only allowed in xsl:call-template or xsl:apply-templates",
                ));
            }
            "when" | "otherwise" => {
                return Err(self.error(
                    node,
                    format!("xsl:{} is only allowed in xsl:choose", node.tag_name().name()),
                ));
            }
            "number" | "apply-imports" => {
                return Err(self.error(
                    node,
                    format!("<xsl:{}> is not supported", node.tag_name().name()),
                ));
            }
            other => {
                return Err(self.error(node, format!("Unknown XSLT instruction <xsl:{}>", other)));
            }
        };
        Ok(Some(instruction))
    }

    fn handle_choose(&mut self, node: Node<'d, 'i>) -> Result<XsltInstruction, XsltError> {
        let mut whens = Vec::new();
        let mut otherwise = None;
        for child in node.children().filter(|c| !is_ignorable(*c)) {
            if otherwise.is_some() {
                return Err(self.error(child, "xsl:otherwise must be the last child of xsl:choose"));
            }
            if is_xsl(child, "when") {
                whens.push(When {
                    test: self.expression_attr(child, "test")?,
                    body: self.compile_sequence(child)?,
                });
            } else if is_xsl(child, "otherwise") {
                otherwise = Some(self.compile_sequence(child)?);
            } else {
                return Err(self.error(
                    child,
                    "xsl:choose may only contain xsl:when and xsl:otherwise",
                ));
            }
        }
        if whens.is_empty() {
            return Err(self.error(node, "xsl:choose needs at least one xsl:when"));
        }
        Ok(XsltInstruction::Choose { whens, otherwise })
    }

    /// `xsl:text` keeps its content exactly, whitespace included.
    fn handle_text(&self, node: Node<'d, 'i>) -> Result<Option<XsltInstruction>, XsltError> {
        if node.attribute("disable-output-escaping") == Some("yes") {
            log::warn!("disable-output-escaping is not supported and is ignored");
        }
        let mut text = String::new();
        for child in node.children() {
            if child.is_element() {
                return Err(self.error(child, "xsl:text may only contain text"));
            }
            if child.is_text()
                && let Some(t) = child.text()
            {
                text.push_str(t);
            }
        }
        Ok((!text.is_empty()).then_some(XsltInstruction::Text(text)))
    }

    fn namespace_avt(
        &self,
        node: Node<'d, 'i>,
    ) -> Result<Option<crate::ast::AttributeValueTemplate>, XsltError> {
        node.attribute("namespace")
            .map(|ns| self.avt(node, ns))
            .transpose()
    }

    fn reject_attribute_sets(&self, node: Node<'d, 'i>) -> Result<(), XsltError> {
        if node.attribute("use-attribute-sets").is_some() {
            return Err(self.error(node, "Attribute sets are not supported"));
        }
        Ok(())
    }

    /// An element from outside the XSLT namespace, copied to the output with its
    /// attributes evaluated as value templates. The namespaces in scope go with it,
    /// except the XSLT namespace and any excluded ones.
    pub(crate) fn compile_literal_result_element(
        &mut self,
        node: Node<'d, 'i>,
    ) -> Result<XsltInstruction, XsltError> {
        self.read_excluded_prefixes(node, (XSLT_NAMESPACE, "exclude-result-prefixes"))?;

        let tag = node.tag_name();
        let name = ResultName {
            prefix: tag
                .namespace()
                .and_then(|_| self.written_prefix(node))
                .map(str::to_string),
            local: tag.name().to_string(),
            namespace: tag.namespace().map(str::to_string),
        };

        let namespaces = node
            .namespaces()
            .filter(|ns| {
                let uri = ns.uri();
                uri != XSLT_NAMESPACE
                    && uri != XML_NAMESPACE
                    && !self.excluded_namespaces.contains(uri)
            })
            .map(|ns| (ns.name().map(str::to_string), ns.uri().to_string()))
            .collect();

        let mut attributes = Vec::new();
        for attr in node.attributes() {
            if is_xslt_namespace(attr.namespace()) {
                continue;
            }
            let prefix = attr.namespace().and_then(|uri| {
                node.namespaces()
                    .find(|ns| ns.uri() == uri && ns.name().is_some())
                    .and_then(|ns| ns.name())
            });
            let attr_name = ResultName {
                prefix: prefix.map(str::to_string),
                local: attr.name().to_string(),
                namespace: attr.namespace().map(str::to_string),
            };
            attributes.push((attr_name, self.avt(node, attr.value())?));
        }

        Ok(XsltInstruction::LiteralElement {
            name,
            namespaces,
            attributes,
            body: self.compile_sequence(node)?,
        })
    }

    /// The prefix the element was written with in the stylesheet source.
    fn written_prefix(&self, node: Node<'d, 'i>) -> Option<&'i str> {
        let source = self.document.input_text().get(node.range())?;
        let qname = source
            .strip_prefix('<')?
            .split(|c: char| c.is_whitespace() || c == '/' || c == '>')
            .next()?;
        split_qname(qname).0
    }
}
