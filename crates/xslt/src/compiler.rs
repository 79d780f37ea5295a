//! Compiles stylesheet text into a [`CompiledStylesheet`].
//!
//! The stylesheet is parsed with `roxmltree` so that every element sees its in-scope
//! namespace declarations, then walked top-down by [`CompilerBuilder`]. The per-element
//! handlers live in `compiler_handlers`.

use crate::ast::{CompiledStylesheet, PreparsedTemplate, TemplateRule};
use crate::error::{Location, XsltError};
use roxmltree::{Document, Node};
use std::collections::HashSet;
use std::sync::Arc;

pub const XSLT_NAMESPACE: &str = "http://www.w3.org/1999/XSL/Transform";

/// Compiles a stylesheet from its source text.
pub fn compile(source: &str) -> Result<CompiledStylesheet, XsltError> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    let document = Document::parse_with_options(source, options)?;
    let builder = CompilerBuilder::new(&document);
    let stylesheet = builder.build()?;
    log::debug!(
        "Compiled stylesheet: {} template rules, {} named templates, {} globals",
        stylesheet.template_rules.values().map(Vec::len).sum::<usize>(),
        stylesheet.named_templates.len(),
        stylesheet.globals.len()
    );
    Ok(stylesheet)
}

/// Walks a parsed stylesheet and accumulates the compiled result.
pub(crate) struct CompilerBuilder<'d, 'i: 'd> {
    pub(crate) document: &'d Document<'i>,
    pub(crate) stylesheet: CompiledStylesheet,
    /// Namespace URIs that literal result elements do not copy to the output.
    pub(crate) excluded_namespaces: HashSet<String>,
    pub(crate) next_position: usize,
    /// `xsl:call-template` names seen, checked once every named template is known.
    pub(crate) called_templates: Vec<(String, Location)>,
}

impl<'d, 'i: 'd> CompilerBuilder<'d, 'i> {
    pub(crate) fn new(document: &'d Document<'i>) -> Self {
        Self {
            document,
            stylesheet: CompiledStylesheet::default(),
            excluded_namespaces: HashSet::new(),
            next_position: 0,
            called_templates: Vec::new(),
        }
    }

    pub(crate) fn build(mut self) -> Result<CompiledStylesheet, XsltError> {
        let root = self.document.root_element();
        if is_xsl(root, "stylesheet") || is_xsl(root, "transform") {
            self.handle_stylesheet(root)?;
        } else if root.attribute((XSLT_NAMESPACE, "version")).is_some() {
            self.handle_simplified_stylesheet(root)?;
        } else {
            return Err(self.error(
                root,
                format!(
                    "Root element <{}> is neither xsl:stylesheet nor xsl:transform",
                    root.tag_name().name()
                ),
            ));
        }

        let called = std::mem::take(&mut self.called_templates);
        if let Some((name, location)) = called
            .into_iter()
            .find(|(name, _)| !self.stylesheet.named_templates.contains_key(name))
        {
            return Err(XsltError::Compilation {
                message: format!("xsl:call-template refers to unknown template '{}'", name),
                location,
            });
        }

        for rules in self.stylesheet.template_rules.values_mut() {
            rules.sort_by(|a, b| {
                b.priority
                    .total_cmp(&a.priority)
                    .then_with(|| b.position.cmp(&a.position))
            });
        }
        Ok(self.stylesheet)
    }

    /// A literal result element as the document element stands for a single template
    /// matching the root node.
    fn handle_simplified_stylesheet(&mut self, root: Node<'d, 'i>) -> Result<(), XsltError> {
        self.read_excluded_prefixes(root, (XSLT_NAMESPACE, "exclude-result-prefixes"))?;
        let body = PreparsedTemplate(vec![self.compile_literal_result_element(root)?]);
        let pattern = crate::pattern::Pattern::compile("/", &self.xpath_compiler(root))?;
        self.stylesheet.template_rules.entry(None).or_default().push(TemplateRule {
            priority: pattern.default_priority(),
            pattern,
            position: 0,
            mode: None,
            params: Vec::new(),
            body: Arc::new(body),
        });
        Ok(())
    }
}

/// Whether `node` is the XSLT element `local`.
pub(crate) fn is_xsl(node: Node<'_, '_>, local: &str) -> bool {
    node.is_element()
        && node.tag_name().namespace() == Some(XSLT_NAMESPACE)
        && node.tag_name().name() == local
}

pub(crate) fn is_whitespace_text(node: Node<'_, '_>) -> bool {
    node.is_text() && node.text().is_some_and(|t| t.trim().is_empty())
}
