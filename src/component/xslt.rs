use super::ProcessorSync;
use crate::config::{XsltComponentConfig, XsltFileComponentConfig};
use crate::engine::{NativeEngine, XmlEngine};
use crate::error::{PlatformError, XmlError};
use crate::message::{FlowContext, Message, Payload};
use crate::resource::ResourceProvider;
use crate::script::ScriptEngineService;
use crate::xslt::{DynamicResourceTransformer, StaticResourceTransformer, XsltTransformerStrategy};
use std::sync::Arc;

fn run_transformer(
    transformer: Option<&dyn XsltTransformerStrategy>,
    message: Message,
    context: &FlowContext,
) -> Result<Message, PlatformError> {
    let transformer =
        transformer.ok_or_else(|| XmlError::configuration("XSLT component used before initialize"))?;
    let output = {
        let bytes = message.payload().to_bytes();
        let mut input: &[u8] = &bytes;
        transformer.transform(&mut input, &message, context)?
    };
    let (_, attributes) = message.into_parts();
    Ok(Message::new(Payload::Text(output), attributes))
}

/// Transforms payloads with one stylesheet compiled at initialisation.
#[derive(Debug)]
pub struct XsltComponent {
    config: XsltComponentConfig,
    engine: Arc<dyn XmlEngine>,
    resources: Arc<dyn ResourceProvider>,
    transformer: Option<StaticResourceTransformer>,
}

impl XsltComponent {
    pub fn new(config: XsltComponentConfig, resources: Arc<dyn ResourceProvider>) -> Self {
        Self {
            config,
            engine: Arc::new(NativeEngine),
            resources,
            transformer: None,
        }
    }

    pub fn with_engine(mut self, engine: Arc<dyn XmlEngine>) -> Self {
        self.engine = engine;
        self
    }
}

impl ProcessorSync for XsltComponent {
    fn initialize(&mut self) -> Result<(), PlatformError> {
        if self.config.style_sheet_file.trim().is_empty() {
            return Err(XmlError::configuration("no stylesheet file configured").into());
        }
        let transformer = StaticResourceTransformer::load(
            Arc::clone(&self.engine),
            self.resources.as_ref(),
            &self.config.style_sheet_file,
        )?;
        self.transformer = Some(transformer);
        Ok(())
    }

    fn apply(&self, message: Message, context: &FlowContext) -> Result<Message, PlatformError> {
        let transformer = self.transformer.as_ref().map(|t| t as &dyn XsltTransformerStrategy);
        run_transformer(transformer, message, context)
    }

    fn dispose(&mut self) {
        if let Some(transformer) = self.transformer.as_mut() {
            transformer.dispose();
        }
    }
}

/// Transforms payloads with a stylesheet named by a possibly dynamic file name. A plain
/// name is compiled once; a `#[...]` name is resolved and compiled for every message.
#[derive(Debug)]
pub struct XsltFileComponent {
    config: XsltFileComponentConfig,
    engine: Arc<dyn XmlEngine>,
    resources: Arc<dyn ResourceProvider>,
    script_engine: Option<Arc<dyn ScriptEngineService>>,
    transformer: Option<Box<dyn XsltTransformerStrategy>>,
}

impl XsltFileComponent {
    pub fn new(config: XsltFileComponentConfig, resources: Arc<dyn ResourceProvider>) -> Self {
        Self {
            config,
            engine: Arc::new(NativeEngine),
            resources,
            script_engine: None,
            transformer: None,
        }
    }

    pub fn with_engine(mut self, engine: Arc<dyn XmlEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_script_engine(mut self, script_engine: Arc<dyn ScriptEngineService>) -> Self {
        self.script_engine = Some(script_engine);
        self
    }
}

impl ProcessorSync for XsltFileComponent {
    fn initialize(&mut self) -> Result<(), PlatformError> {
        let file_name = &self.config.file_name;
        if file_name.is_blank() {
            return Err(XmlError::configuration("no stylesheet file name configured").into());
        }
        let transformer: Box<dyn XsltTransformerStrategy> = if file_name.is_dynamic() {
            log::debug!("Stylesheet name '{}' is resolved per message", file_name);
            Box::new(DynamicResourceTransformer::new(
                Arc::clone(&self.engine),
                Arc::clone(&self.resources),
                file_name.clone(),
                self.script_engine.clone(),
            )?)
        } else {
            Box::new(StaticResourceTransformer::load(
                Arc::clone(&self.engine),
                self.resources.as_ref(),
                file_name.value(),
            )?)
        };
        self.transformer = Some(transformer);
        Ok(())
    }

    fn apply(&self, message: Message, context: &FlowContext) -> Result<Message, PlatformError> {
        run_transformer(self.transformer.as_deref(), message, context)
    }

    fn dispose(&mut self) {
        if let Some(transformer) = self.transformer.as_mut() {
            transformer.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::resource::InMemoryResourceProvider;

    const GREETING: &str = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
        <xsl:output method="text"/>
        <xsl:template match="/person">Hello <xsl:value-of select="@name"/></xsl:template>
    </xsl:stylesheet>"#;

    fn resources() -> Arc<dyn ResourceProvider> {
        let provider = InMemoryResourceProvider::new();
        provider.add("greeting.xsl", GREETING).unwrap();
        Arc::new(provider)
    }

    #[test]
    fn test_static_component_transforms_payload() {
        let mut component = XsltComponent::new(
            XsltComponentConfig {
                style_sheet_file: "greeting.xsl".to_string(),
            },
            resources(),
        );
        component.initialize().unwrap();

        let message = Message::text(r#"<person name="Ada"/>"#).with_attribute("id", "7");
        let out = component.apply(message, &FlowContext::default()).unwrap();
        assert_eq!(out.payload(), &Payload::Text("Hello Ada".to_string()));
        assert_eq!(out.attributes().get("id"), Some("7"));

        component.dispose();
        component.dispose();
        let err = component
            .apply(Message::text("<person/>"), &FlowContext::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transformation);
    }

    #[test]
    fn test_missing_stylesheet_fails_initialize() {
        let mut component = XsltComponent::new(
            XsltComponentConfig {
                style_sheet_file: "absent.xsl".to_string(),
            },
            resources(),
        );
        assert_eq!(component.initialize().unwrap_err().kind(), ErrorKind::Resource);
    }

    #[test]
    fn test_file_component_with_plain_name() {
        let mut component = XsltFileComponent::new(
            XsltFileComponentConfig {
                file_name: "greeting.xsl".into(),
            },
            resources(),
        );
        component.initialize().unwrap();
        let out = component
            .apply(Message::text(r#"<person name="Lin"/>"#), &FlowContext::default())
            .unwrap();
        assert_eq!(out.payload(), &Payload::Text("Hello Lin".to_string()));
    }

    #[test]
    fn test_file_component_needs_initialize() {
        let component = XsltFileComponent::new(
            XsltFileComponentConfig {
                file_name: "greeting.xsl".into(),
            },
            resources(),
        );
        let err = component
            .apply(Message::text("<person/>"), &FlowContext::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
