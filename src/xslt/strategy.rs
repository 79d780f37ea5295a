use crate::engine::XmlEngine;
use crate::error::XmlError;
use crate::message::{FlowContext, Message};
use crate::resource::ResourceProvider;
use crate::script::{DynamicString, ScriptEngineService};
use std::fmt::Debug;
use std::io::Read;
use std::sync::Arc;
use xmlbridge_xslt::Stylesheet;

/// Applies a stylesheet to an input document.
pub trait XsltTransformerStrategy: Send + Sync + Debug {
    /// Reads the whole input, transforms it and returns the serialized result. Nothing
    /// is returned from a run that fails part way.
    fn transform(
        &self,
        input: &mut dyn Read,
        message: &Message,
        context: &FlowContext,
    ) -> Result<String, XmlError>;

    /// Releases any compiled stylesheet. Calling it again does nothing.
    fn dispose(&mut self) {}
}

fn read_input(input: &mut dyn Read) -> Result<Vec<u8>, XmlError> {
    let mut bytes = Vec::new();
    input
        .read_to_end(&mut bytes)
        .map_err(|e| XmlError::transformation(format!("cannot read input document: {}", e)))?;
    Ok(bytes)
}

fn load_stylesheet(
    engine: &dyn XmlEngine,
    resources: &dyn ResourceProvider,
    path: &str,
) -> Result<Stylesheet, XmlError> {
    log::debug!("Loading stylesheet '{}' from {}", path, resources.name());
    let source = resources.load(path)?;
    engine.compile_stylesheet(&source)
}

/// A stylesheet read and compiled once, then shared by every call.
#[derive(Debug)]
pub struct StaticResourceTransformer {
    engine: Arc<dyn XmlEngine>,
    stylesheet: Option<Stylesheet>,
}

impl StaticResourceTransformer {
    pub fn load(
        engine: Arc<dyn XmlEngine>,
        resources: &dyn ResourceProvider,
        path: &str,
    ) -> Result<Self, XmlError> {
        let stylesheet = load_stylesheet(engine.as_ref(), resources, path)?;
        Ok(Self {
            engine,
            stylesheet: Some(stylesheet),
        })
    }

    /// Compiles stylesheet text already in hand.
    pub fn from_source(engine: Arc<dyn XmlEngine>, source: &[u8]) -> Result<Self, XmlError> {
        let stylesheet = engine.compile_stylesheet(source)?;
        Ok(Self {
            engine,
            stylesheet: Some(stylesheet),
        })
    }

    pub fn is_disposed(&self) -> bool {
        self.stylesheet.is_none()
    }
}

impl XsltTransformerStrategy for StaticResourceTransformer {
    fn transform(
        &self,
        input: &mut dyn Read,
        _message: &Message,
        _context: &FlowContext,
    ) -> Result<String, XmlError> {
        let stylesheet = self
            .stylesheet
            .as_ref()
            .ok_or_else(|| XmlError::transformation("stylesheet has been disposed"))?;
        let bytes = read_input(input)?;
        self.engine.transform(stylesheet, &bytes)
    }

    fn dispose(&mut self) {
        if self.stylesheet.take().is_some() {
            log::debug!("Disposed compiled stylesheet");
        }
    }
}

/// Resolves, loads and compiles the stylesheet on every call, so the file name can
/// depend on the message.
#[derive(Debug)]
pub struct DynamicResourceTransformer {
    engine: Arc<dyn XmlEngine>,
    resources: Arc<dyn ResourceProvider>,
    file_name: DynamicString,
    script_engine: Option<Arc<dyn ScriptEngineService>>,
}

impl DynamicResourceTransformer {
    pub fn new(
        engine: Arc<dyn XmlEngine>,
        resources: Arc<dyn ResourceProvider>,
        file_name: DynamicString,
        script_engine: Option<Arc<dyn ScriptEngineService>>,
    ) -> Result<Self, XmlError> {
        if file_name.is_dynamic() && script_engine.is_none() {
            return Err(XmlError::configuration(format!(
                "dynamic stylesheet name '{}' needs a script engine",
                file_name
            )));
        }
        Ok(Self {
            engine,
            resources,
            file_name,
            script_engine,
        })
    }

    fn resolve_file_name(&self, message: &Message, context: &FlowContext) -> Result<String, XmlError> {
        let Some(script_engine) = self.script_engine.as_ref().filter(|_| self.file_name.is_dynamic()) else {
            return Ok(self.file_name.value().to_string());
        };
        script_engine
            .evaluate(&self.file_name, context, message)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| {
                XmlError::transformation(format!(
                    "stylesheet name '{}' did not resolve to a file",
                    self.file_name
                ))
            })
    }
}

impl XsltTransformerStrategy for DynamicResourceTransformer {
    fn transform(
        &self,
        input: &mut dyn Read,
        message: &Message,
        context: &FlowContext,
    ) -> Result<String, XmlError> {
        let file_name = self.resolve_file_name(message, context)?;
        let stylesheet = load_stylesheet(self.engine.as_ref(), self.resources.as_ref(), &file_name)?;
        let bytes = read_input(input)?;
        self.engine.transform(&stylesheet, &bytes)
    }
}
