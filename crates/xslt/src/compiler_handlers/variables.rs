//! Handlers for `<xsl:variable>`, `<xsl:param>`, and `<xsl:with-param>`.

use crate::ast::{VariableValue, WithParam, XsltInstruction};
use crate::compiler::CompilerBuilder;
use crate::compiler_handlers::is_ignorable;
use crate::error::XsltError;
use roxmltree::Node;

impl<'d, 'i: 'd> CompilerBuilder<'d, 'i> {
    /// The name and value shared by all three binding elements. A binding has either a
    /// `select` expression or content, never both.
    pub(crate) fn compile_binding(
        &mut self,
        node: Node<'d, 'i>,
    ) -> Result<(String, VariableValue), XsltError> {
        let name = self.required_attr(node, "name")?.to_string();
        let has_content = !node.children().all(is_ignorable);
        let value = match node.attribute("select") {
            Some(_) if has_content => {
                return Err(self.error(
                    node,
                    format!(
                        "<xsl:{}> '{}' has both a 'select' attribute and content",
                        node.tag_name().name(),
                        name
                    ),
                ));
            }
            Some(select) => VariableValue::Select(self.compile_xpath(node, select)?),
            None if has_content => VariableValue::Content(self.compile_sequence(node)?),
            None => VariableValue::Empty,
        };
        Ok((name, value))
    }

    pub(crate) fn handle_variable(
        &mut self,
        node: Node<'d, 'i>,
    ) -> Result<XsltInstruction, XsltError> {
        let (name, value) = self.compile_binding(node)?;
        Ok(XsltInstruction::Variable { name, value })
    }

    pub(crate) fn handle_with_param(&mut self, node: Node<'d, 'i>) -> Result<WithParam, XsltError> {
        let (name, value) = self.compile_binding(node)?;
        Ok(WithParam { name, value })
    }
}
