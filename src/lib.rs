//! XPath evaluation and XSLT transformation components for message-processing pipelines.
//!
//! The crate wraps the `xmlbridge-xpath` engine and the `xmlbridge-xslt` processor in
//! the shapes a pipeline host expects:
//!
//! - [`XPathComponent`]: evaluates a static or per-message expression against the
//!   payload and replaces it with a typed [`XPathResult`]
//! - [`XsltComponent`] and [`XsltFileComponent`]: transform the payload with a
//!   stylesheet compiled once, or resolved and compiled per message
//!
//! Every processor call goes through the [`XmlEngine`] trait, and every failure reaches
//! the host as a [`PlatformError`].

pub mod component;
pub mod config;
pub mod engine;
pub mod error;
pub mod message;
pub mod resource;
pub mod script;
pub mod xpath;
pub mod xslt;

pub use component::{ProcessorSync, XPATH_EXPRESSION_ATTRIBUTE, XPathComponent, XsltComponent, XsltFileComponent};
pub use config::{XPathComponentConfig, XPathConfiguration, XsltComponentConfig, XsltFileComponentConfig};
pub use engine::{NativeEngine, XmlEngine};
pub use error::{ErrorKind, PlatformError, XmlError};
pub use message::{FlowContext, Message, MessageAttributes, Payload};
pub use resource::{FilesystemResourceProvider, InMemoryResourceProvider, ResourceError, ResourceProvider};
pub use script::{DynamicString, ScriptEngineService};
pub use xpath::{EvaluationResult, ExpressionStrategy, Resolution, XPathEvaluator, XPathResult};
pub use xslt::{DynamicResourceTransformer, StaticResourceTransformer, XsltTransformerStrategy};
