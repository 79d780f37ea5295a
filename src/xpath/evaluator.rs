use super::context::XPathContext;
use super::mapper::{XPathResult, map_result};
use super::strategy::{ExpressionStrategy, Resolution};
use crate::error::XmlError;
use crate::message::{FlowContext, Message};
use std::borrow::Cow;
use xmlbridge_xpath::CompiledXPath;

/// What one evaluation produced: the expression actually used and its mapped value.
/// Both are `None` when a dynamic expression did not resolve.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EvaluationResult {
    pub expression: Option<String>,
    pub value: Option<XPathResult>,
}

/// Evaluates one configured expression against message payloads. Holds no state that
/// outlives a call apart from the static strategy's compiled expression.
#[derive(Debug)]
pub struct XPathEvaluator {
    context: XPathContext,
    strategy: ExpressionStrategy,
}

impl XPathEvaluator {
    pub fn new(context: XPathContext, strategy: ExpressionStrategy) -> Self {
        Self { context, strategy }
    }

    pub fn strategy(&self) -> &ExpressionStrategy {
        &self.strategy
    }

    pub fn evaluate(
        &self,
        payload: &[u8],
        message: &Message,
        flow: &FlowContext,
    ) -> Result<EvaluationResult, XmlError> {
        let expression = match self.strategy.resolve(message, flow) {
            Resolution::Resolved(expression) => expression,
            Resolution::Unresolved => return Ok(EvaluationResult::default()),
        };

        let document = self.context.parse_document(payload)?;
        let compiled = self.compiled(&expression)?;
        let value = self.context.engine().evaluate(&compiled, &document)?;

        Ok(EvaluationResult {
            value: map_result(value),
            expression: Some(expression.into_owned()),
        })
    }

    /// The static expression compiled once, or a dynamic one compiled for this call.
    fn compiled<'s>(&'s self, expression: &str) -> Result<Cow<'s, CompiledXPath>, XmlError> {
        match &self.strategy {
            ExpressionStrategy::Static { compiled, .. } => compiled
                .get_or_try_init(|| self.context.compile(expression))
                .map(Cow::Borrowed),
            ExpressionStrategy::Dynamic { .. } => self.context.compile(expression).map(Cow::Owned),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::XPathConfiguration;
    use crate::engine::NativeEngine;
    use rust_decimal::Decimal;
    use crate::error::ErrorKind;
    use num_bigint::BigInt;
    use std::sync::Arc;

    const INVENTORY: &[u8] = br#"<inventory>
        <book year="2000"><title>Snow Crash</title><price>14.95</price></book>
        <book year="2005"><title>Burning Tower</title><price>5.99</price></book>
        <book year="1995"><title>Zodiac</title><price>7.5</price></book>
    </inventory>"#;

    fn evaluator(expression: &str) -> XPathEvaluator {
        let context = XPathContext::new(Arc::new(NativeEngine), &XPathConfiguration::new()).unwrap();
        XPathEvaluator::new(context, ExpressionStrategy::fixed(expression))
    }

    fn run(expression: &str) -> Result<EvaluationResult, XmlError> {
        evaluator(expression).evaluate(INVENTORY, &Message::default(), &FlowContext::default())
    }

    #[test]
    fn test_typed_results() {
        assert_eq!(
            run("count(//book/title)").unwrap().value,
            Some(XPathResult::Integer(BigInt::from(3)))
        );
        assert_eq!(
            run("boolean(/inventory/book/price[text() > 14])").unwrap().value,
            Some(XPathResult::Boolean(true))
        );
        assert_eq!(
            run("//book[@year>2001]/title/text()").unwrap().value,
            Some(XPathResult::String("Burning Tower".to_string()))
        );
        assert_eq!(run("//magazine").unwrap().value, None);
    }

    #[test]
    fn test_result_carries_expression() {
        let result = run("count(//book)").unwrap();
        assert_eq!(result.expression.as_deref(), Some("count(//book)"));
    }

    #[test]
    fn test_decimal_literals_keep_their_fraction() {
        assert_eq!(run("//price = 14.95").unwrap().value, Some(XPathResult::Boolean(true)));
        assert_eq!(run("count(//price) > 2.5").unwrap().value, Some(XPathResult::Boolean(true)));
        assert_eq!(
            run("14.5").unwrap().value,
            Some(XPathResult::Decimal(Decimal::new(145, 1)))
        );
    }

    #[test]
    fn test_static_expression_compiled_once_and_reused() {
        let evaluator = evaluator("string(//book[1]/title)");
        for _ in 0..3 {
            let result = evaluator
                .evaluate(INVENTORY, &Message::default(), &FlowContext::default())
                .unwrap();
            assert_eq!(result.value, Some(XPathResult::String("Snow Crash".to_string())));
        }
        match evaluator.strategy() {
            ExpressionStrategy::Static { compiled, .. } => assert!(compiled.get().is_some()),
            other => panic!("Expected static strategy, got {:?}", other),
        }
    }

    #[test]
    fn test_errors() {
        assert_eq!(run("//book[").unwrap_err().kind(), ErrorKind::InvalidExpression);
        assert_eq!(run("//x:book").unwrap_err().kind(), ErrorKind::InvalidExpression);
        assert_eq!(run("frobnicate()").unwrap_err().kind(), ErrorKind::InvalidExpression);
        let malformed = evaluator("count(//book)").evaluate(
            b"<inventory>",
            &Message::default(),
            &FlowContext::default(),
        );
        assert_eq!(malformed.unwrap_err().kind(), ErrorKind::MalformedDocument);
    }
}
