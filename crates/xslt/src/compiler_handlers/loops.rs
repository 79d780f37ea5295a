//! Handlers for iteration: `<xsl:for-each>`, `<xsl:apply-templates>` and the `<xsl:sort>`
//! and `<xsl:with-param>` children they accept. `<xsl:call-template>` lives here too since
//! it shares the parameter handling.

use crate::ast::{SortDataType, SortKey, SortOrder, XsltInstruction};
use crate::compiler::{CompilerBuilder, is_xsl};
use crate::compiler_handlers::is_ignorable;
use crate::error::XsltError;
use roxmltree::Node;

impl<'d, 'i: 'd> CompilerBuilder<'d, 'i> {
    pub(crate) fn handle_for_each(
        &mut self,
        node: Node<'d, 'i>,
    ) -> Result<XsltInstruction, XsltError> {
        let select = self.expression_attr(node, "select")?;
        let (sort_nodes, body_nodes) = self.split_leading(node, "sort")?;
        let sort_keys = sort_nodes
            .into_iter()
            .map(|s| self.handle_sort(s))
            .collect::<Result<Vec<_>, _>>()?;
        let body = self.compile_nodes(body_nodes)?;
        Ok(XsltInstruction::ForEach {
            select,
            sort_keys,
            body,
        })
    }

    pub(crate) fn handle_apply_templates(
        &mut self,
        node: Node<'d, 'i>,
    ) -> Result<XsltInstruction, XsltError> {
        let select = match node.attribute("select") {
            Some(s) => Some(self.compile_xpath(node, s)?),
            None => None,
        };
        let mode = node.attribute("mode").map(str::to_string);

        let mut sort_keys = Vec::new();
        let mut params = Vec::new();
        for child in node.children().filter(|c| !is_ignorable(*c)) {
            if is_xsl(child, "sort") {
                sort_keys.push(self.handle_sort(child)?);
            } else if is_xsl(child, "with-param") {
                params.push(self.handle_with_param(child)?);
            } else {
                return Err(self.error(
                    child,
                    "xsl:apply-templates may only contain xsl:sort and xsl:with-param",
                ));
            }
        }
        Ok(XsltInstruction::ApplyTemplates {
            select,
            mode,
            sort_keys,
            params,
        })
    }

    pub(crate) fn handle_call_template(
        &mut self,
        node: Node<'d, 'i>,
    ) -> Result<XsltInstruction, XsltError> {
        let name = self.required_attr(node, "name")?.to_string();
        let mut params = Vec::new();
        for child in node.children().filter(|c| !is_ignorable(*c)) {
            if !is_xsl(child, "with-param") {
                return Err(self.error(child, "xsl:call-template may only contain xsl:with-param"));
            }
            params.push(self.handle_with_param(child)?);
        }
        let location = self.location(node);
        self.called_templates.push((name.clone(), location));
        Ok(XsltInstruction::CallTemplate { name, params })
    }

    pub(crate) fn handle_sort(&mut self, node: Node<'d, 'i>) -> Result<SortKey, XsltError> {
        let select = self.compile_xpath(node, node.attribute("select").unwrap_or("."))?;
        let order = match node.attribute("order").map(str::trim) {
            None | Some("ascending") => SortOrder::Ascending,
            Some("descending") => SortOrder::Descending,
            Some(other) => {
                return Err(self.error(node, format!("Invalid sort order '{}'", other)));
            }
        };
        let data_type = match node.attribute("data-type").map(str::trim) {
            None | Some("text") => SortDataType::Text,
            Some("number") => SortDataType::Number,
            Some(other) => {
                return Err(self.error(node, format!("Unsupported sort data-type '{}'", other)));
            }
        };
        if node.attribute("lang").is_some() || node.attribute("case-order").is_some() {
            log::debug!("xsl:sort 'lang' and 'case-order' are ignored");
        }
        Ok(SortKey {
            select,
            order,
            data_type,
        })
    }
}
