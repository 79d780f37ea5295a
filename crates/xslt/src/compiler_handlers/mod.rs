pub(super) mod loops;
pub(super) mod stylesheet;
pub(super) mod template;
pub(super) mod variables;

use crate::ast::{AttributeValueTemplate, NamespaceScope};
use crate::compiler::{CompilerBuilder, XSLT_NAMESPACE, is_whitespace_text, is_xsl};
use crate::error::{Location, XsltError};
use crate::util::{AvtError, parse_avt};
use roxmltree::{ExpandedName, Node};
use xmlbridge_xpath::{Expression, FunctionRegistry, NamespaceContext, XPathCompiler};

// Helpers shared by every handler. They are implemented as methods on CompilerBuilder.

impl<'d, 'i: 'd> CompilerBuilder<'d, 'i> {
    pub(crate) fn location(&self, node: Node<'d, 'i>) -> Location {
        let pos = self.document.text_pos_at(node.range().start);
        Location {
            line: pos.row as usize,
            col: pos.col as usize,
        }
    }

    pub(crate) fn error(&self, node: Node<'d, 'i>, message: impl Into<String>) -> XsltError {
        XsltError::Compilation {
            message: message.into(),
            location: self.location(node),
        }
    }

    pub(crate) fn required_attr(
        &self,
        node: Node<'d, 'i>,
        name: &str,
    ) -> Result<&'d str, XsltError> {
        node.attribute(name).ok_or_else(|| {
            self.error(
                node,
                format!(
                    "<xsl:{}> is missing required attribute '{}'",
                    node.tag_name().name(),
                    name
                ),
            )
        })
    }

    /// A `yes`/`no` attribute; absent means `None`.
    pub(crate) fn yes_no_attr(
        &self,
        node: Node<'d, 'i>,
        name: &str,
    ) -> Result<Option<bool>, XsltError> {
        match node.attribute(name).map(str::trim) {
            None => Ok(None),
            Some("yes") => Ok(Some(true)),
            Some("no") => Ok(Some(false)),
            Some(other) => Err(self.error(
                node,
                format!("Attribute '{}' must be 'yes' or 'no', found '{}'", name, other),
            )),
        }
    }

    /// An XPath compiler that knows the namespaces in scope at `node`.
    pub(crate) fn xpath_compiler(&self, node: Node<'d, 'i>) -> XPathCompiler {
        let mut namespaces = NamespaceContext::new();
        for ns in node.namespaces() {
            if let Some(prefix) = ns.name()
                && let Err(e) = namespaces.bind(prefix, ns.uri())
            {
                log::debug!("Namespace binding '{}' not usable in expressions: {}", prefix, e);
            }
        }
        XPathCompiler::with_functions(namespaces, FunctionRegistry::xslt())
    }

    pub(crate) fn compile_xpath(
        &self,
        node: Node<'d, 'i>,
        source: &str,
    ) -> Result<Expression, XsltError> {
        let xpath_error = |source_error| XsltError::XPath {
            expression: source.to_string(),
            source: source_error,
        };
        let mut expression = xmlbridge_xpath::parse_expression(source).map_err(xpath_error)?;
        self.xpath_compiler(node)
            .resolve(&mut expression)
            .map_err(xpath_error)?;
        Ok(expression)
    }

    /// Compiles the required XPath attribute `name` of `node`.
    pub(crate) fn expression_attr(
        &self,
        node: Node<'d, 'i>,
        name: &str,
    ) -> Result<Expression, XsltError> {
        let source = self.required_attr(node, name)?;
        self.compile_xpath(node, source)
    }

    pub(crate) fn avt(
        &self,
        node: Node<'d, 'i>,
        value: &str,
    ) -> Result<AttributeValueTemplate, XsltError> {
        parse_avt(value, &self.xpath_compiler(node)).map_err(|e| match e {
            AvtError::Syntax(message) => self.error(node, message),
            AvtError::XPath(expression, source) => XsltError::XPath { expression, source },
        })
    }

    pub(crate) fn namespace_scope(&self, node: Node<'d, 'i>) -> NamespaceScope {
        NamespaceScope {
            default: node.lookup_namespace_uri(None).map(str::to_string),
            prefixes: node
                .namespaces()
                .filter_map(|ns| ns.name().map(|p| (p.to_string(), ns.uri().to_string())))
                .collect(),
        }
    }

    /// Adds the namespaces named by an `exclude-result-prefixes` attribute to the excluded
    /// set. `#default` stands for the default namespace.
    pub(crate) fn read_excluded_prefixes<'n, 'm, N>(
        &mut self,
        node: Node<'d, 'i>,
        attribute: N,
    ) -> Result<(), XsltError>
    where
        N: Into<ExpandedName<'n, 'm>>,
    {
        let Some(value) = node.attribute(attribute) else {
            return Ok(());
        };
        for token in value.split_whitespace() {
            let prefix = (token != "#default").then_some(token);
            match node.lookup_namespace_uri(prefix) {
                Some(uri) => {
                    self.excluded_namespaces.insert(uri.to_string());
                }
                None => {
                    return Err(self.error(
                        node,
                        format!("exclude-result-prefixes names undeclared prefix '{}'", token),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Splits the element children of `parent` into the leading `xsl:{local}` elements and
    /// the nodes after them. An `xsl:{local}` anywhere later is an error.
    pub(crate) fn split_leading(
        &self,
        parent: Node<'d, 'i>,
        local: &str,
    ) -> Result<(Vec<Node<'d, 'i>>, Vec<Node<'d, 'i>>), XsltError> {
        let mut leading = Vec::new();
        let mut rest = Vec::new();
        for child in parent.children() {
            if is_xsl(child, local) {
                if !rest.iter().all(|n| is_ignorable(*n)) {
                    return Err(self.error(
                        child,
                        format!(
                            "<xsl:{}> must come before any other content of <{}>",
                            local,
                            parent.tag_name().name()
                        ),
                    ));
                }
                leading.push(child);
            } else {
                rest.push(child);
            }
        }
        Ok((leading, rest))
    }
}

/// Whitespace-only text, comments and processing instructions carry no instructions.
pub(crate) fn is_ignorable(node: Node<'_, '_>) -> bool {
    is_whitespace_text(node) || node.is_comment() || node.is_pi()
}

pub(crate) fn is_xslt_namespace(uri: Option<&str>) -> bool {
    uri == Some(XSLT_NAMESPACE)
}
