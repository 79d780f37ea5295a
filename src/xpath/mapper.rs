//! Maps native XPath values to the values handed to the host.

use num_bigint::BigInt;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::fmt;
use xmlbridge_xpath::{DataSourceNode, XPathValue, format_number};

#[derive(Debug, Clone, PartialEq)]
pub enum XPathResult {
    Boolean(bool),
    Integer(BigInt),
    Decimal(Decimal),
    String(String),
    /// The string values of a node-set with more than one node, in document order.
    List(Vec<String>),
}

impl fmt::Display for XPathResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XPathResult::Boolean(b) => write!(f, "{}", b),
            XPathResult::Integer(i) => write!(f, "{}", i),
            XPathResult::Decimal(d) => write!(f, "{}", d),
            XPathResult::String(s) => f.write_str(s),
            XPathResult::List(items) => f.write_str(&items.join("\n")),
        }
    }
}

/// Empty node-sets map to `None`, a single node to its string value and larger
/// node-sets to a list. Numbers that have no decimal form (NaN, the infinities, values
/// out of range) become their XPath string form.
pub fn map_result<'a, N: DataSourceNode<'a>>(value: XPathValue<N>) -> Option<XPathResult> {
    match value {
        XPathValue::NodeSet(nodes) => match nodes.as_slice() {
            [] => None,
            [node] => Some(XPathResult::String(node.string_value())),
            _ => Some(XPathResult::List(
                nodes.iter().map(|n| n.string_value()).collect(),
            )),
        },
        XPathValue::Boolean(b) => Some(XPathResult::Boolean(b)),
        XPathValue::Integer(i) => Some(XPathResult::Integer(i)),
        XPathValue::Number(n) => Some(
            Decimal::from_f64(n)
                .map(|d| XPathResult::Decimal(d.normalize()))
                .unwrap_or_else(|| XPathResult::String(format_number(n))),
        ),
        XPathValue::String(s) => Some(XPathResult::String(s)),
    }
}
