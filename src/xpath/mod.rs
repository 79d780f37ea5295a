//! XPath evaluation against message payloads.

mod context;
mod evaluator;
mod mapper;
mod strategy;

pub use context::XPathContext;
pub use evaluator::{EvaluationResult, XPathEvaluator};
pub use mapper::{XPathResult, map_result};
pub use strategy::{ExpressionStrategy, Resolution};
