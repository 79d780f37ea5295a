//! XSLT 1.0 processor built on `xmlbridge-xpath`.
//!
//! A stylesheet is compiled once into an immutable [`Stylesheet`] and then applied to any
//! number of documents, each run using its own executor state.

pub mod ast;
pub mod compiler;
pub mod error;
pub mod executor;
pub mod output;
pub mod pattern;
pub mod processor;
pub mod serializer;

mod compiler_handlers;
mod executor_handlers;
mod util;

pub use compiler::XSLT_NAMESPACE;
pub use error::{Location, XsltError};
pub use executor::ExecutionError;
pub use output::{OutputBuilder, ResultNode, ResultTree};
pub use processor::Stylesheet;
