//! Handlers for `<xsl:stylesheet>` and its top-level children.

use crate::ast::{NamedTemplate, OutputMethod, Param, SpaceTest, TemplateRule};
use crate::compiler::{CompilerBuilder, XSLT_NAMESPACE, is_xsl};
use crate::error::XsltError;
use crate::pattern::Pattern;
use crate::util::split_qname;
use roxmltree::Node;
use std::sync::Arc;

const UNSUPPORTED_TOP_LEVEL: &[&str] = &[
    "import",
    "include",
    "key",
    "attribute-set",
    "namespace-alias",
    "decimal-format",
];

impl<'d, 'i: 'd> CompilerBuilder<'d, 'i> {
    pub(crate) fn handle_stylesheet(&mut self, root: Node<'d, 'i>) -> Result<(), XsltError> {
        match root.attribute("version") {
            Some("1.0") => {}
            Some(other) => log::warn!("Stylesheet version '{}' is processed as XSLT 1.0", other),
            None => return Err(self.error(root, "xsl:stylesheet is missing the 'version' attribute")),
        }
        self.read_excluded_prefixes(root, "exclude-result-prefixes")?;
        self.read_excluded_prefixes(root, "extension-element-prefixes")?;

        for child in root.children().filter(Node::is_element) {
            if child.tag_name().namespace() != Some(XSLT_NAMESPACE) {
                log::debug!("Ignoring top-level element <{}>", child.tag_name().name());
                continue;
            }
            match child.tag_name().name() {
                "template" => self.handle_template(child)?,
                "output" => self.handle_output(child)?,
                "strip-space" => {
                    let tests = self.space_tests(child)?;
                    self.stylesheet.space.strip.extend(tests);
                }
                "preserve-space" => {
                    let tests = self.space_tests(child)?;
                    self.stylesheet.space.preserve.extend(tests);
                }
                "variable" | "param" => self.handle_global(child)?,
                name if UNSUPPORTED_TOP_LEVEL.contains(&name) => {
                    return Err(self.error(child, format!("<xsl:{}> is not supported", name)));
                }
                name => {
                    return Err(self.error(
                        child,
                        format!("<xsl:{}> is not allowed at the top level", name),
                    ));
                }
            }
        }
        Ok(())
    }

    fn handle_template(&mut self, node: Node<'d, 'i>) -> Result<(), XsltError> {
        let (param_nodes, body_nodes) = self.split_leading(node, "param")?;
        let params = param_nodes
            .into_iter()
            .map(|p| self.compile_param(p))
            .collect::<Result<Vec<_>, _>>()?;
        let body = Arc::new(self.compile_nodes(body_nodes)?);

        let name = node.attribute("name");
        let match_attr = node.attribute("match");
        if name.is_none() && match_attr.is_none() {
            return Err(self.error(node, "xsl:template needs a 'match' or a 'name' attribute"));
        }

        if let Some(name) = name {
            if self.stylesheet.named_templates.contains_key(name) {
                return Err(self.error(node, format!("Duplicate named template '{}'", name)));
            }
            self.stylesheet.named_templates.insert(
                name.to_string(),
                NamedTemplate {
                    params: params.clone(),
                    body: Arc::clone(&body),
                },
            );
        }

        if let Some(match_text) = match_attr {
            let pattern = Pattern::compile(match_text, &self.xpath_compiler(node))?;
            let priority = match node.attribute("priority") {
                Some(p) => Some(p.trim().parse::<f64>().map_err(|_| {
                    self.error(node, format!("Invalid template priority '{}'", p))
                })?),
                None => None,
            };
            let mode = node.attribute("mode").map(str::to_string);
            let position = self.next_position;
            self.next_position += 1;

            let rules = self.stylesheet.template_rules.entry(mode.clone()).or_default();
            for alternative in pattern.alternatives() {
                rules.push(TemplateRule {
                    priority: priority.unwrap_or_else(|| alternative.default_priority()),
                    pattern: alternative,
                    position,
                    mode: mode.clone(),
                    params: params.clone(),
                    body: Arc::clone(&body),
                });
            }
        } else if node.attribute("mode").is_some() || node.attribute("priority").is_some() {
            log::warn!("'mode' and 'priority' are ignored on a template without 'match'");
        }
        Ok(())
    }

    fn handle_output(&mut self, node: Node<'d, 'i>) -> Result<(), XsltError> {
        if let Some(method) = node.attribute("method") {
            let method = match method.trim() {
                "xml" => OutputMethod::Xml,
                "html" => OutputMethod::Html,
                "text" => OutputMethod::Text,
                other => {
                    return Err(self.error(node, format!("Unsupported output method '{}'", other)));
                }
            };
            self.stylesheet.output.method = Some(method);
        }
        if let Some(indent) = self.yes_no_attr(node, "indent")? {
            self.stylesheet.output.indent = indent;
        }
        if let Some(omit) = self.yes_no_attr(node, "omit-xml-declaration")? {
            self.stylesheet.output.omit_xml_declaration = omit;
        }
        if let Some(standalone) = self.yes_no_attr(node, "standalone")? {
            self.stylesheet.output.standalone = Some(standalone);
        }
        if let Some(encoding) = node.attribute("encoding")
            && !encoding.eq_ignore_ascii_case("utf-8")
        {
            log::warn!("Output encoding '{}' ignored; output is always UTF-8", encoding);
        }
        Ok(())
    }

    fn space_tests(&self, node: Node<'d, 'i>) -> Result<Vec<SpaceTest>, XsltError> {
        let elements = self.required_attr(node, "elements")?;
        elements
            .split_whitespace()
            .map(|token| {
                if token == "*" {
                    return Ok(SpaceTest::Any);
                }
                let (prefix, local) = split_qname(token);
                let namespace = match prefix {
                    Some(p) => Some(node.lookup_namespace_uri(Some(p)).ok_or_else(|| {
                        self.error(node, format!("Undeclared prefix '{}' in '{}'", p, token))
                    })?),
                    None => None,
                };
                Ok(match (namespace, local) {
                    (Some(ns), "*") => SpaceTest::Namespace(ns.to_string()),
                    (namespace, local) => SpaceTest::Name {
                        namespace: namespace.map(str::to_string),
                        local: local.to_string(),
                    },
                })
            })
            .collect()
    }

    fn handle_global(&mut self, node: Node<'d, 'i>) -> Result<(), XsltError> {
        let global = self.compile_param(node)?;
        if self.stylesheet.globals.iter().any(|g| g.name == global.name) {
            return Err(self.error(
                node,
                format!("Duplicate global variable or parameter '{}'", global.name),
            ));
        }
        self.stylesheet.globals.push(global);
        Ok(())
    }

    /// `xsl:param` in a template, or a top-level `xsl:param`/`xsl:variable`.
    pub(crate) fn compile_param(&mut self, node: Node<'d, 'i>) -> Result<Param, XsltError> {
        debug_assert!(is_xsl(node, "param") || is_xsl(node, "variable"));
        let (name, value) = self.compile_binding(node)?;
        Ok(Param { name, value })
    }
}
