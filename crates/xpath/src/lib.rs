//! A namespace-aware XPath 1.0 engine.
//!
//! Expressions are parsed with `nom`, resolved against a [`NamespaceContext`] by the
//! [`XPathCompiler`], and evaluated against anything implementing [`DataSourceNode`].
//! [`XmlDocument`] is the owned tree used for real payloads.

pub mod ast;
pub mod axes;
pub mod compiler;
pub mod datasource;
pub mod document;
pub mod encoding;
pub mod engine;
pub mod error;
pub mod functions;
pub mod operators;
pub mod parser;

pub use ast::{Axis, BinaryOperator, Expression, LocationPath, NameTest, NodeTest, Step};
pub use compiler::{CompiledXPath, NamespaceContext, XPathCompiler};
pub use datasource::{DataSourceNode, NodeType, QName};
pub use document::{XML_NAMESPACE, XmlDocument, XmlNode};
pub use engine::{EvaluationContext, XPathValue, evaluate, format_number};
pub use error::{DocumentError, XPathError};
pub use functions::FunctionRegistry;
pub use parser::parse_expression;
