//! Comparison, arithmetic and union operators.

use crate::ast::BinaryOperator;
use crate::datasource::DataSourceNode;
use crate::engine::{XPathValue, string_to_number};
use crate::error::XPathError;
use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};
use std::collections::HashSet;

/// Applies a binary operator to two already evaluated operands.
/// `and`/`or` are also accepted here, but the engine short-circuits them first.
pub fn evaluate<'a, N: DataSourceNode<'a>>(
    op: BinaryOperator,
    left: XPathValue<N>,
    right: XPathValue<N>,
) -> Result<XPathValue<N>, XPathError> {
    use BinaryOperator::*;
    match op {
        Or => Ok(XPathValue::Boolean(left.to_bool() || right.to_bool())),
        And => Ok(XPathValue::Boolean(left.to_bool() && right.to_bool())),
        Equals | NotEquals | LessThan | LessThanOrEqual | GreaterThan | GreaterThanOrEqual => {
            Ok(XPathValue::Boolean(compare(op, &left, &right)))
        }
        Plus | Minus | Multiply | Divide | Modulo => Ok(arithmetic(op, &left, &right)),
        Union => union(left, right),
    }
}

fn union<'a, N: DataSourceNode<'a>>(
    left: XPathValue<N>,
    right: XPathValue<N>,
) -> Result<XPathValue<N>, XPathError> {
    match (left, right) {
        (XPathValue::NodeSet(l), XPathValue::NodeSet(r)) => {
            let mut seen = HashSet::new();
            let mut merged: Vec<N> = l.into_iter().chain(r).filter(|n| seen.insert(*n)).collect();
            merged.sort();
            Ok(XPathValue::NodeSet(merged))
        }
        (l, r) => Err(XPathError::TypeError(format!(
            "Operands of '|' must be node-sets, got {:?} and {:?}",
            l, r
        ))),
    }
}

fn arithmetic<'a, N: DataSourceNode<'a>>(
    op: BinaryOperator,
    left: &XPathValue<N>,
    right: &XPathValue<N>,
) -> XPathValue<N> {
    if let (XPathValue::Integer(l), XPathValue::Integer(r)) = (left, right) {
        match op {
            BinaryOperator::Plus => return XPathValue::Integer(l + r),
            BinaryOperator::Minus => return XPathValue::Integer(l - r),
            BinaryOperator::Multiply => return XPathValue::Integer(l * r),
            // Truncating remainder, matching the sign of the dividend.
            BinaryOperator::Modulo if !r.is_zero() => return XPathValue::Integer(l % r),
            _ => {}
        }
    }
    let (l, r) = (left.to_number(), right.to_number());
    let n = match op {
        BinaryOperator::Plus => l + r,
        BinaryOperator::Minus => l - r,
        BinaryOperator::Multiply => l * r,
        BinaryOperator::Divide => l / r,
        _ => l % r,
    };
    XPathValue::Number(n)
}

/// A scalar operand after node-sets have been expanded into their members.
#[derive(Debug, Clone)]
enum Atom {
    String(String),
    Integer(BigInt),
    Number(f64),
    Boolean(bool),
}

impl Atom {
    fn from_value<'a, N: DataSourceNode<'a>>(value: &XPathValue<N>) -> Self {
        match value {
            XPathValue::String(s) => Atom::String(s.clone()),
            XPathValue::Integer(i) => Atom::Integer(i.clone()),
            XPathValue::Number(n) => Atom::Number(*n),
            XPathValue::Boolean(b) => Atom::Boolean(*b),
            XPathValue::NodeSet(_) => Atom::Boolean(value.to_bool()),
        }
    }

    fn to_number(&self) -> f64 {
        match self {
            Atom::String(s) => string_to_number(s),
            Atom::Integer(i) => i.to_f64().unwrap_or(f64::NAN),
            Atom::Number(n) => *n,
            Atom::Boolean(b) => f64::from(u8::from(*b)),
        }
    }

    fn to_bool(&self) -> bool {
        match self {
            Atom::String(s) => !s.is_empty(),
            Atom::Integer(i) => !i.is_zero(),
            Atom::Number(n) => *n != 0.0 && !n.is_nan(),
            Atom::Boolean(b) => *b,
        }
    }

    fn as_string(&self) -> String {
        match self {
            Atom::String(s) => s.clone(),
            Atom::Integer(i) => i.to_string(),
            Atom::Number(n) => crate::engine::format_number(*n),
            Atom::Boolean(b) => b.to_string(),
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, Atom::Integer(_) | Atom::Number(_))
    }
}

/// XPath 1.0 comparison. A node-set operand compares true if any of its members does.
fn compare<'a, N: DataSourceNode<'a>>(
    op: BinaryOperator,
    left: &XPathValue<N>,
    right: &XPathValue<N>,
) -> bool {
    // A node-set against a boolean compares the node-set's truth value.
    let booleans = matches!(left, XPathValue::Boolean(_)) || matches!(right, XPathValue::Boolean(_));
    let expand = |v: &XPathValue<N>| -> Vec<Atom> {
        match v {
            XPathValue::NodeSet(nodes) if !booleans => nodes
                .iter()
                .map(|n| Atom::String(n.string_value()))
                .collect(),
            other => vec![Atom::from_value(other)],
        }
    };
    let lefts = expand(left);
    let rights = expand(right);
    lefts
        .iter()
        .any(|l| rights.iter().any(|r| compare_atoms(op, l, r)))
}

fn compare_atoms(op: BinaryOperator, left: &Atom, right: &Atom) -> bool {
    use BinaryOperator::*;
    match op {
        Equals | NotEquals => {
            let equal = if matches!(left, Atom::Boolean(_)) || matches!(right, Atom::Boolean(_)) {
                left.to_bool() == right.to_bool()
            } else if let (Atom::Integer(l), Atom::Integer(r)) = (left, right) {
                l == r
            } else if left.is_numeric() || right.is_numeric() {
                left.to_number() == right.to_number()
            } else {
                left.as_string() == right.as_string()
            };
            if op == Equals { equal } else { !equal }
        }
        _ => {
            if let (Atom::Integer(l), Atom::Integer(r)) = (left, right) {
                return match op {
                    LessThan => l < r,
                    LessThanOrEqual => l <= r,
                    GreaterThan => l > r,
                    _ => l >= r,
                };
            }
            let (l, r) = (left.to_number(), right.to_number());
            match op {
                LessThan => l < r,
                LessThanOrEqual => l <= r,
                GreaterThan => l > r,
                _ => l >= r,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::mock::{MockNode, create_test_tree};

    type Value<'a> = XPathValue<MockNode<'a>>;

    fn int<'a>(i: i64) -> Value<'a> {
        XPathValue::Integer(BigInt::from(i))
    }

    fn boolean(v: Value<'_>) -> bool {
        match v {
            XPathValue::Boolean(b) => b,
            other => panic!("Expected Boolean, got {:?}", other),
        }
    }

    #[test]
    fn test_node_set_comparisons_are_existential() {
        let tree = create_test_tree();
        let paras: Value = XPathValue::NodeSet(vec![tree.node(1), tree.node(8)]);
        let world: Value = XPathValue::String("World".to_string());
        assert!(boolean(evaluate(BinaryOperator::Equals, paras.clone(), world.clone()).unwrap()));
        assert!(boolean(evaluate(BinaryOperator::NotEquals, paras, world).unwrap()));
    }

    #[test]
    fn test_empty_node_set_compares_false() {
        let empty: Value = XPathValue::NodeSet(vec![]);
        assert!(!boolean(evaluate(BinaryOperator::Equals, empty.clone(), int(1)).unwrap()));
        assert!(!boolean(evaluate(BinaryOperator::NotEquals, empty, int(1)).unwrap()));
    }

    #[test]
    fn test_node_set_against_boolean_uses_truth_value() {
        let empty: Value = XPathValue::NodeSet(vec![]);
        let f: Value = XPathValue::Boolean(false);
        assert!(boolean(evaluate(BinaryOperator::Equals, empty, f).unwrap()));
    }

    #[test]
    fn test_relational_uses_numbers() {
        let s: Value = XPathValue::String("15.5".to_string());
        assert!(boolean(evaluate(BinaryOperator::GreaterThan, s, int(14)).unwrap()));
        let big: Value = XPathValue::Integer(BigInt::from(u64::MAX) * 4);
        assert!(boolean(evaluate(BinaryOperator::GreaterThan, big, int(1)).unwrap()));
    }

    #[test]
    fn test_integer_arithmetic() {
        let sum = evaluate(BinaryOperator::Plus, int(2), int(3)).unwrap();
        assert!(matches!(sum, XPathValue::Integer(i) if i == BigInt::from(5)));
        let rem = evaluate(BinaryOperator::Modulo, int(-7), int(2)).unwrap();
        assert!(matches!(rem, XPathValue::Integer(i) if i == BigInt::from(-1)));
        let nan = evaluate(BinaryOperator::Modulo, int(1), int(0)).unwrap();
        assert!(matches!(nan, XPathValue::Number(n) if n.is_nan()));
        let mixed = evaluate(BinaryOperator::Plus, int(1), XPathValue::Number(0.5)).unwrap();
        assert!(matches!(mixed, XPathValue::Number(n) if n == 1.5));
    }

    #[test]
    fn test_union_requires_node_sets() {
        let tree = create_test_tree();
        let merged = evaluate(
            BinaryOperator::Union,
            XPathValue::NodeSet(vec![tree.node(8), tree.node(1)]),
            XPathValue::NodeSet(vec![tree.node(1)]),
        )
        .unwrap();
        match merged {
            XPathValue::NodeSet(nodes) => {
                assert_eq!(nodes.iter().map(|n| n.id).collect::<Vec<_>>(), vec![1, 8])
            }
            other => panic!("Expected NodeSet, got {:?}", other),
        }
        assert!(evaluate(BinaryOperator::Union, int(1), int(2)).is_err());
    }
}
