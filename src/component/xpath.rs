use super::ProcessorSync;
use crate::config::XPathComponentConfig;
use crate::engine::{NativeEngine, XmlEngine};
use crate::error::{PlatformError, XmlError};
use crate::message::{FlowContext, Message, Payload};
use crate::script::ScriptEngineService;
use crate::xpath::{ExpressionStrategy, XPathContext, XPathEvaluator};
use std::sync::Arc;

/// Output attribute holding the expression that was evaluated.
pub const XPATH_EXPRESSION_ATTRIBUTE: &str = "xPathExpression";

/// Replaces the payload with the typed result of an XPath expression.
#[derive(Debug)]
pub struct XPathComponent {
    config: XPathComponentConfig,
    engine: Arc<dyn XmlEngine>,
    script_engine: Option<Arc<dyn ScriptEngineService>>,
    evaluator: Option<XPathEvaluator>,
}

impl XPathComponent {
    pub fn new(config: XPathComponentConfig) -> Self {
        Self {
            config,
            engine: Arc::new(NativeEngine),
            script_engine: None,
            evaluator: None,
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

    pub fn is_initialized(&self) -> bool {
        self.evaluator.is_some()
    }
}

impl ProcessorSync for XPathComponent {
    fn initialize(&mut self) -> Result<(), PlatformError> {
        let namespaces = self.config.configuration.clone().unwrap_or_default();
        let context = XPathContext::new(Arc::clone(&self.engine), &namespaces)?;
        let strategy =
            ExpressionStrategy::from_dynamic_string(&self.config.expression, self.script_engine.clone())?;
        log::debug!(
            "XPath component ready: expression '{}', {} namespace bindings",
            self.config.expression,
            namespaces.bindings().count()
        );
        self.evaluator = Some(XPathEvaluator::new(context, strategy));
        Ok(())
    }

    fn apply(&self, message: Message, context: &FlowContext) -> Result<Message, PlatformError> {
        let evaluator = self
            .evaluator
            .as_ref()
            .ok_or_else(|| XmlError::configuration("XPath component used before initialize"))?;
        let result = evaluator.evaluate(&message.payload().to_bytes(), &message, context)?;

        let (_, mut attributes) = message.into_parts();
        if let Some(expression) = result.expression {
            attributes.insert(XPATH_EXPRESSION_ATTRIBUTE, expression);
        }
        let payload = result.value.map(Payload::XPath).unwrap_or_default();
        Ok(Message::new(payload, attributes))
    }

    fn dispose(&mut self) {
        self.evaluator = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::xpath::XPathResult;
    use num_bigint::BigInt;

    fn component(expression: &str) -> XPathComponent {
        let mut component = XPathComponent::new(XPathComponentConfig {
            expression: expression.into(),
            configuration: None,
        });
        component.initialize().unwrap();
        component
    }

    #[test]
    fn test_apply_replaces_payload_and_keeps_attributes() {
        let message = Message::text("<a><b/><b/></a>").with_attribute("origin", "test");
        let out = component("count(/a/b)").apply(message, &FlowContext::default()).unwrap();

        assert_eq!(out.payload(), &Payload::XPath(XPathResult::Integer(BigInt::from(2))));
        assert_eq!(out.attributes().get("origin"), Some("test"));
        assert_eq!(out.attributes().get(XPATH_EXPRESSION_ATTRIBUTE), Some("count(/a/b)"));
    }

    #[test]
    fn test_no_match_gives_empty_payload() {
        let out = component("/a/c")
            .apply(Message::text("<a/>"), &FlowContext::default())
            .unwrap();
        assert!(out.payload().is_empty());
    }

    #[test]
    fn test_apply_before_initialize_fails() {
        let component = XPathComponent::new(XPathComponentConfig {
            expression: "/a".into(),
            configuration: None,
        });
        let err = component.apply(Message::text("<a/>"), &FlowContext::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_dynamic_expression_without_script_engine_fails_initialize() {
        let mut component = XPathComponent::new(XPathComponentConfig {
            expression: "#[vars.path]".into(),
            configuration: None,
        });
        assert_eq!(component.initialize().unwrap_err().kind(), ErrorKind::Configuration);
        assert!(!component.is_initialized());
    }
}
