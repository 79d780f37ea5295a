//! The seam between the adapter and the XML processor. Strategies and evaluators only
//! reach the processor through [`XmlEngine`], so tests can observe or replace it.

mod native;

pub use native::NativeEngine;

use crate::config::XPathConfiguration;
use crate::error::XmlError;
use std::fmt::Debug;
use xmlbridge_xpath::{CompiledXPath, XPathCompiler, XPathValue, XmlDocument, XmlNode};
use xmlbridge_xslt::Stylesheet;

pub trait XmlEngine: Send + Sync + Debug {
    /// A compiler bound to the configured namespaces. Fails with
    /// [`XmlError::Configuration`] when a binding is rejected.
    fn build_compiler(&self, config: &XPathConfiguration) -> Result<XPathCompiler, XmlError>;

    /// Fails with [`XmlError::MalformedDocument`].
    fn parse_document(&self, bytes: &[u8]) -> Result<XmlDocument, XmlError>;

    /// Fails with [`XmlError::InvalidExpression`].
    fn compile_expression(
        &self,
        compiler: &XPathCompiler,
        expression: &str,
    ) -> Result<CompiledXPath, XmlError>;

    /// Evaluates with the document node as the context item.
    fn evaluate<'d>(
        &self,
        expression: &CompiledXPath,
        document: &'d XmlDocument,
    ) -> Result<XPathValue<XmlNode<'d>>, XmlError>;

    /// Fails with [`XmlError::Transformation`].
    fn compile_stylesheet(&self, source: &[u8]) -> Result<Stylesheet, XmlError>;

    /// Parses `input` and runs `stylesheet` over it.
    fn transform(&self, stylesheet: &Stylesheet, input: &[u8]) -> Result<String, XmlError>;
}
