//! Pipeline components wrapping the evaluator and the transformers.
//!
//! A host creates a component from its configuration, calls
//! [`ProcessorSync::initialize`] once, [`ProcessorSync::apply`] for every message and
//! [`ProcessorSync::dispose`] when the flow stops.

mod xpath;
mod xslt;

pub use xpath::{XPATH_EXPRESSION_ATTRIBUTE, XPathComponent};
pub use xslt::{XsltComponent, XsltFileComponent};

use crate::error::PlatformError;
use crate::message::{FlowContext, Message};

/// A synchronous message processor.
pub trait ProcessorSync: Send + Sync {
    /// Builds whatever the component needs before the first message.
    fn initialize(&mut self) -> Result<(), PlatformError> {
        Ok(())
    }

    fn apply(&self, message: Message, context: &FlowContext) -> Result<Message, PlatformError>;

    fn dispose(&mut self) {}
}
