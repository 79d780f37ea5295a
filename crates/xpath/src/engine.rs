//! The evaluation engine for executing a parsed XPath AST against a generic `DataSourceNode`.

use super::ast::{Axis, Expression, LocationPath, NameTest, NodeTest, NodeTypeTest, Step};
use super::ast::{BinaryOperator, UnaryOperator};
use super::functions::{self, FunctionRegistry};
use super::{axes, operators};
use crate::datasource::{DataSourceNode, NodeType};
use crate::error::XPathError;
use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::marker::PhantomData;

/// Represents the possible result types of an XPath expression evaluation.
///
/// `Integer` carries values that are integral by construction (integer literals, `count()`,
/// `position()`, integer arithmetic) so they never pass through a lossy `f64`.
#[derive(Debug, Clone)]
pub enum XPathValue<N> {
    NodeSet(Vec<N>),
    String(String),
    Integer(BigInt),
    Number(f64),
    Boolean(bool),
}

impl<'a, N: DataSourceNode<'a>> XPathValue<N> {
    /// Coerces the XPath value to a boolean as per XPath 1.0 rules.
    pub fn to_bool(&self) -> bool {
        match self {
            XPathValue::NodeSet(nodes) => !nodes.is_empty(),
            XPathValue::String(s) => !s.is_empty(),
            XPathValue::Integer(i) => !i.is_zero(),
            XPathValue::Number(n) => *n != 0.0 && !n.is_nan(),
            XPathValue::Boolean(b) => *b,
        }
    }

    /// Coerces the XPath value to a number as per XPath 1.0 rules.
    pub fn to_number(&self) -> f64 {
        match self {
            XPathValue::Number(n) => *n,
            XPathValue::Integer(i) => i.to_f64().unwrap_or(f64::NAN),
            XPathValue::String(s) => string_to_number(s),
            XPathValue::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            XPathValue::NodeSet(nodes) => nodes
                .first()
                .map(|n| string_to_number(&n.string_value()))
                .unwrap_or(f64::NAN),
        }
    }

    pub fn is_node_set(&self) -> bool {
        matches!(self, XPathValue::NodeSet(_))
    }
}

impl<'a, N: DataSourceNode<'a>> fmt::Display for XPathValue<N> {
    /// Coerces the XPath value to a string as per XPath 1.0 rules.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XPathValue::NodeSet(nodes) => write!(
                f,
                "{}",
                nodes.first().map(|n| n.string_value()).unwrap_or_default()
            ),
            XPathValue::String(s) => write!(f, "{}", s),
            XPathValue::Integer(i) => write!(f, "{}", i),
            XPathValue::Number(n) => write!(f, "{}", format_number(*n)),
            XPathValue::Boolean(b) => write!(f, "{}", b),
        }
    }
}

/// Parses a string with the XPath `number()` grammar: optional whitespace, an optional
/// minus sign, digits with an optional fraction. Anything else is NaN.
pub fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let valid = !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.chars().filter(|&c| c == '.').count() <= 1
        && digits != ".";
    if valid {
        trimmed.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

/// Formats a double the way XPath 1.0 `string()` does.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e17 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// A container for all state needed during expression evaluation.
/// `'a` is the lifetime of the underlying data source.
/// `'d` is the lifetime of the borrowed registry and variables.
pub struct EvaluationContext<'a, 'd, N: DataSourceNode<'a>> {
    pub context_node: N,
    pub root_node: N,
    /// The XSLT current node. Equal to the context node outside of predicates.
    pub current_node: N,
    pub functions: &'d FunctionRegistry,
    pub context_position: usize, // 1-based index
    pub context_size: usize,
    pub variables: &'d HashMap<String, XPathValue<N>>,
    /// If true, references to unbound variables are errors instead of empty strings.
    pub strict: bool,
    _marker: PhantomData<&'a ()>,
}

impl<'a, 'd, N: DataSourceNode<'a>> EvaluationContext<'a, 'd, N> {
    pub fn new(
        context_node: N,
        root_node: N,
        functions: &'d FunctionRegistry,
        variables: &'d HashMap<String, XPathValue<N>>,
    ) -> Self {
        Self {
            context_node,
            root_node,
            current_node: context_node,
            functions,
            context_position: 1,
            context_size: 1,
            variables,
            strict: true,
            _marker: PhantomData,
        }
    }

    pub fn with_position(mut self, position: usize, size: usize) -> Self {
        self.context_position = position;
        self.context_size = size;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// A context for a predicate or nested step: same variables and current node,
    /// new context node and position.
    fn focus(&self, node: N, position: usize, size: usize) -> Self {
        Self {
            context_node: node,
            root_node: self.root_node,
            current_node: self.current_node,
            functions: self.functions,
            context_position: position,
            context_size: size,
            variables: self.variables,
            strict: self.strict,
            _marker: PhantomData,
        }
    }
}

/// Evaluates a parsed expression and returns a concrete `XPathValue`.
pub fn evaluate<'a, N>(
    expr: &Expression,
    e_ctx: &EvaluationContext<'a, '_, N>,
) -> Result<XPathValue<N>, XPathError>
where
    N: DataSourceNode<'a> + 'a,
{
    match expr {
        Expression::Literal(s) => Ok(XPathValue::String(s.clone())),
        Expression::Integer(i) => Ok(XPathValue::Integer(i.clone())),
        Expression::Number(n) => Ok(XPathValue::Number(*n)),
        Expression::LocationPath(path) => {
            let nodes = evaluate_location_path(path, e_ctx)?;
            Ok(XPathValue::NodeSet(nodes))
        }
        Expression::Filter { base, predicates } => match evaluate(base, e_ctx)? {
            XPathValue::NodeSet(nodes) => {
                Ok(XPathValue::NodeSet(apply_predicates(&nodes, predicates, e_ctx)?))
            }
            other => Err(XPathError::TypeError(format!(
                "Predicates can only filter a node-set, got {:?}",
                other
            ))),
        },
        Expression::Variable(name) => match e_ctx.variables.get(name) {
            Some(value) => Ok(value.clone()),
            None if e_ctx.strict => Err(XPathError::UnknownVariable(name.clone())),
            None => Ok(XPathValue::String(String::new())),
        },
        Expression::FunctionCall { name, args } => {
            let mut evaluated_args = Vec::with_capacity(args.len());
            for arg in args {
                evaluated_args.push(evaluate(arg, e_ctx)?);
            }
            functions::evaluate_function(name, evaluated_args, e_ctx)
        }
        Expression::BinaryOp { left, op, right } => {
            let left_val = evaluate(left, e_ctx)?;
            match op {
                BinaryOperator::And if !left_val.to_bool() => Ok(XPathValue::Boolean(false)),
                BinaryOperator::Or if left_val.to_bool() => Ok(XPathValue::Boolean(true)),
                _ => {
                    let right_val = evaluate(right, e_ctx)?;
                    operators::evaluate(*op, left_val, right_val)
                }
            }
        }
        Expression::UnaryOp { op, expr } => {
            let val = evaluate(expr, e_ctx)?;
            match op {
                UnaryOperator::Minus => Ok(match val {
                    XPathValue::Integer(i) => XPathValue::Integer(-i),
                    other => XPathValue::Number(-other.to_number()),
                }),
            }
        }
    }
}

fn evaluate_location_path<'a, N>(
    path: &LocationPath,
    e_ctx: &EvaluationContext<'a, '_, N>,
) -> Result<Vec<N>, XPathError>
where
    N: DataSourceNode<'a> + 'a,
{
    let initial_context = if let Some(start_expr) = &path.start_point {
        match evaluate(start_expr, e_ctx)? {
            XPathValue::NodeSet(nodes) => nodes,
            other => {
                return Err(XPathError::TypeError(format!(
                    "A path can only continue from a node-set, got {:?}",
                    other
                )));
            }
        }
    } else if path.is_absolute {
        vec![e_ctx.root_node]
    } else {
        vec![e_ctx.context_node]
    };

    let mut current_nodes = initial_context;
    for step in &path.steps {
        current_nodes = evaluate_step(step, &current_nodes, e_ctx)?;
    }
    Ok(current_nodes)
}

/// Evaluates one step for every context node, then merges the results into a
/// duplicate-free node-set in document order.
fn evaluate_step<'a, N>(
    step: &Step,
    context_nodes: &[N],
    e_ctx: &EvaluationContext<'a, '_, N>,
) -> Result<Vec<N>, XPathError>
where
    N: DataSourceNode<'a> + 'a,
{
    let mut seen = HashSet::new();
    let mut result_nodes = Vec::new();
    for &node in context_nodes {
        let axis_nodes = axes::collect(step.axis, node);
        let tested_nodes = filter_by_node_test(&axis_nodes, &step.node_test, step.axis);
        for n in apply_predicates(&tested_nodes, &step.predicates, e_ctx)? {
            if seen.insert(n) {
                result_nodes.push(n);
            }
        }
    }
    result_nodes.sort();
    Ok(result_nodes)
}

/// The node kind a name test or `*` selects on an axis.
fn principal_node_type(axis: Axis) -> NodeType {
    match axis {
        Axis::Attribute => NodeType::Attribute,
        _ => NodeType::Element,
    }
}

/// Whether `node` satisfies a name test. Compiled tests compare namespace URIs;
/// a test whose prefix was never resolved falls back to comparing prefixes.
pub fn name_test_matches<'a, N: DataSourceNode<'a>>(test: &NameTest, node: &N) -> bool {
    let Some(q_name) = node.name() else {
        return false;
    };
    if q_name.local_part != test.local_part {
        return false;
    }
    match (&test.namespace, &test.prefix) {
        (Some(uri), _) => q_name.namespace == Some(uri.as_str()),
        (None, Some(prefix)) => q_name.prefix == Some(prefix.as_str()),
        (None, None) => q_name.namespace.is_none(),
    }
}

pub(crate) fn filter_by_node_test<'a, N>(nodes: &[N], test: &NodeTest, axis: Axis) -> Vec<N>
where
    N: DataSourceNode<'a> + 'a,
{
    nodes
        .iter()
        .filter(|&node| node_test_matches(test, axis, node))
        .copied()
        .collect()
}

pub fn node_test_matches<'a, N: DataSourceNode<'a>>(test: &NodeTest, axis: Axis, node: &N) -> bool {
    match test {
        NodeTest::Wildcard => node.node_type() == principal_node_type(axis),
        NodeTest::NamespaceWildcard { prefix, namespace } => {
            node.node_type() == principal_node_type(axis)
                && node.name().is_some_and(|q| match namespace {
                    Some(uri) => q.namespace == Some(uri.as_str()),
                    None => q.prefix == Some(prefix.as_str()),
                })
        }
        NodeTest::Name(name_test) => {
            node.node_type() == principal_node_type(axis) && name_test_matches(name_test, node)
        }
        NodeTest::NodeType(ntt) => match ntt {
            NodeTypeTest::Text => node.node_type() == NodeType::Text,
            NodeTypeTest::Comment => node.node_type() == NodeType::Comment,
            NodeTypeTest::ProcessingInstruction => {
                node.node_type() == NodeType::ProcessingInstruction
            }
            NodeTypeTest::Node => true,
        },
    }
}

/// Filters nodes (in axis order) through each predicate in turn. A numeric predicate
/// keeps the node at that position.
pub fn apply_predicates<'a, N>(
    nodes: &[N],
    predicates: &[Expression],
    e_ctx: &EvaluationContext<'a, '_, N>,
) -> Result<Vec<N>, XPathError>
where
    N: DataSourceNode<'a> + 'a,
{
    let mut final_nodes = nodes.to_vec();
    for predicate in predicates {
        let context_size = final_nodes.len();
        let mut predicate_results = Vec::new();
        for (i, node) in final_nodes.iter().enumerate() {
            let position = i + 1;
            let predicate_e_ctx = e_ctx.focus(*node, position, context_size);
            let keep = match evaluate(predicate, &predicate_e_ctx)? {
                XPathValue::Integer(n) => n == BigInt::from(position),
                XPathValue::Number(n) => n == position as f64,
                other => other.to_bool(),
            };
            if keep {
                predicate_results.push(*node);
            }
        }
        final_nodes = predicate_results;
    }
    Ok(final_nodes)
}
