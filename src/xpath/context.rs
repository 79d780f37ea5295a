use crate::config::XPathConfiguration;
use crate::engine::XmlEngine;
use crate::error::XmlError;
use std::sync::Arc;
use xmlbridge_xpath::{CompiledXPath, XPathCompiler, XmlDocument};

/// A compiler bound to one namespace configuration, plus the engine that builds
/// documents for it. Immutable once built.
#[derive(Debug, Clone)]
pub struct XPathContext {
    engine: Arc<dyn XmlEngine>,
    compiler: XPathCompiler,
}

impl XPathContext {
    pub fn new(engine: Arc<dyn XmlEngine>, config: &XPathConfiguration) -> Result<Self, XmlError> {
        let compiler = engine.build_compiler(config)?;
        Ok(Self { engine, compiler })
    }

    pub fn engine(&self) -> &dyn XmlEngine {
        self.engine.as_ref()
    }

    pub fn parse_document(&self, bytes: &[u8]) -> Result<XmlDocument, XmlError> {
        self.engine.parse_document(bytes)
    }

    pub fn compile(&self, expression: &str) -> Result<CompiledXPath, XmlError> {
        self.engine.compile_expression(&self.compiler, expression)
    }
}
