use crate::error::XmlError;
use crate::message::{FlowContext, Message};
use crate::script::{DynamicString, ScriptEngineService};
use once_cell::sync::OnceCell;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use xmlbridge_xpath::CompiledXPath;

/// The outcome of resolving an expression for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<'e> {
    Resolved(Cow<'e, str>),
    /// The script engine produced nothing; there is no expression to evaluate.
    Unresolved,
}

/// Where the XPath expression comes from.
pub enum ExpressionStrategy {
    /// Fixed text, compiled on first use and reused after that.
    Static {
        expression: String,
        compiled: OnceCell<CompiledXPath>,
    },
    /// A template resolved through the script engine for every message, then compiled
    /// afresh.
    Dynamic {
        template: DynamicString,
        script_engine: Arc<dyn ScriptEngineService>,
    },
}

impl ExpressionStrategy {
    pub fn fixed(expression: impl Into<String>) -> Self {
        ExpressionStrategy::Static {
            expression: expression.into(),
            compiled: OnceCell::new(),
        }
    }

    pub fn dynamic(template: DynamicString, script_engine: Arc<dyn ScriptEngineService>) -> Self {
        ExpressionStrategy::Dynamic {
            template,
            script_engine,
        }
    }

    /// Picks the variant from the configured value. A `#[...]` template needs a script
    /// engine.
    pub fn from_dynamic_string(
        expression: &DynamicString,
        script_engine: Option<Arc<dyn ScriptEngineService>>,
    ) -> Result<Self, XmlError> {
        if expression.is_blank() {
            return Err(XmlError::configuration("XPath expression is empty"));
        }
        if !expression.is_dynamic() {
            return Ok(Self::fixed(expression.value()));
        }
        match script_engine {
            Some(engine) => Ok(Self::dynamic(expression.clone(), engine)),
            None => Err(XmlError::configuration(format!(
                "dynamic expression '{}' needs a script engine",
                expression
            ))),
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, ExpressionStrategy::Dynamic { .. })
    }

    pub fn resolve(&self, message: &Message, context: &FlowContext) -> Resolution<'_> {
        match self {
            ExpressionStrategy::Static { expression, .. } => {
                Resolution::Resolved(Cow::Borrowed(expression.as_str()))
            }
            ExpressionStrategy::Dynamic {
                template,
                script_engine,
            } => match script_engine.evaluate(template, context, message) {
                Some(expression) => {
                    log::debug!("Dynamic XPath '{}' resolved to '{}'", template, expression);
                    Resolution::Resolved(Cow::Owned(expression))
                }
                None => {
                    log::debug!("Dynamic XPath '{}' did not resolve", template);
                    Resolution::Unresolved
                }
            },
        }
    }
}

impl fmt::Debug for ExpressionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpressionStrategy::Static {
                expression,
                compiled,
            } => f
                .debug_struct("Static")
                .field("expression", expression)
                .field("compiled", &compiled.get().is_some())
                .finish(),
            ExpressionStrategy::Dynamic { template, .. } => {
                f.debug_struct("Dynamic").field("template", template).finish()
            }
        }
    }
}
