use super::XmlEngine;
use crate::config::XPathConfiguration;
use crate::error::XmlError;
use xmlbridge_xpath::{
    CompiledXPath, NamespaceContext, XPathCompiler, XPathValue, XmlDocument, XmlNode,
};
use xmlbridge_xslt::Stylesheet;

/// The built-in engine backed by `xmlbridge-xpath` and `xmlbridge-xslt`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeEngine;

impl XmlEngine for NativeEngine {
    fn build_compiler(&self, config: &XPathConfiguration) -> Result<XPathCompiler, XmlError> {
        let mut namespaces = NamespaceContext::new();
        for (prefix, uri) in config.bindings() {
            namespaces
                .bind(prefix, uri)
                .map_err(|e| XmlError::Configuration {
                    message: format!("cannot bind prefix '{}' to '{}'", prefix, uri),
                    source: Some(e),
                })?;
        }
        log::debug!("Built XPath compiler with {} namespace bindings", namespaces.len());
        Ok(XPathCompiler::new(namespaces))
    }

    fn parse_document(&self, bytes: &[u8]) -> Result<XmlDocument, XmlError> {
        Ok(XmlDocument::parse(bytes)?)
    }

    fn compile_expression(
        &self,
        compiler: &XPathCompiler,
        expression: &str,
    ) -> Result<CompiledXPath, XmlError> {
        compiler
            .compile(expression)
            .map_err(|source| XmlError::InvalidExpression {
                expression: expression.to_string(),
                source,
            })
    }

    fn evaluate<'d>(
        &self,
        expression: &CompiledXPath,
        document: &'d XmlDocument,
    ) -> Result<XPathValue<XmlNode<'d>>, XmlError> {
        expression
            .evaluate(document)
            .map_err(|source| XmlError::InvalidExpression {
                expression: expression.source().to_string(),
                source,
            })
    }

    fn compile_stylesheet(&self, source: &[u8]) -> Result<Stylesheet, XmlError> {
        let stylesheet = Stylesheet::compile_bytes(source).map_err(|e| XmlError::Transformation {
            message: format!("stylesheet does not compile: {}", e),
            source: Some(e),
        })?;
        log::debug!("Compiled XSLT stylesheet ({} bytes)", source.len());
        Ok(stylesheet)
    }

    fn transform(&self, stylesheet: &Stylesheet, input: &[u8]) -> Result<String, XmlError> {
        Ok(stylesheet.transform(input)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_rejected_binding_is_a_configuration_error() {
        let config = XPathConfiguration::from_pairs([("1bad", "urn:x")]);
        let err = NativeEngine.build_compiler(&config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let config = XPathConfiguration::from_pairs([("p", "")]);
        assert!(NativeEngine.build_compiler(&config).is_err());
    }

    #[test]
    fn test_error_kinds() {
        let compiler = NativeEngine.build_compiler(&XPathConfiguration::new()).unwrap();
        assert_eq!(
            NativeEngine.compile_expression(&compiler, "//x:a").unwrap_err().kind(),
            ErrorKind::InvalidExpression
        );
        assert_eq!(
            NativeEngine.parse_document(b"<a>").unwrap_err().kind(),
            ErrorKind::MalformedDocument
        );
        assert_eq!(
            NativeEngine.compile_stylesheet(b"<not-xslt/>").unwrap_err().kind(),
            ErrorKind::Transformation
        );
    }
}
