//! Defines the registry and built-in implementations for XPath 1.0 functions.

use super::engine::{EvaluationContext, XPathValue, string_to_number};
use crate::datasource::{DataSourceNode, NodeType};
use crate::document::XML_NAMESPACE;
use crate::error::XPathError;
use num_bigint::BigInt;
use std::collections::HashSet;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

const CORE_FUNCTIONS: &[&str] = &[
    // Node-set
    "last",
    "position",
    "count",
    "id",
    "local-name",
    "namespace-uri",
    "name",
    "generate-id",
    // String
    "string",
    "concat",
    "starts-with",
    "contains",
    "substring-before",
    "substring-after",
    "substring",
    "string-length",
    "normalize-space",
    "translate",
    // Boolean
    "boolean",
    "not",
    "true",
    "false",
    "lang",
    // Number
    "number",
    "sum",
    "floor",
    "ceiling",
    "round",
];

/// The set of function names an expression may call. Calls to anything else are
/// rejected when the expression is compiled.
#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    functions: HashSet<&'static str>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self {
            functions: HashSet::new(),
        }
    }

    /// The core library plus the functions XSLT adds (`current()`).
    pub fn xslt() -> Self {
        let mut registry = Self::default();
        registry.register("current");
        registry
    }

    pub fn register(&mut self, name: &'static str) {
        self.functions.insert(name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains(name)
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        for name in CORE_FUNCTIONS {
            registry.register(name);
        }
        registry
    }
}

/// Dispatches a function call to the correct implementation.
pub fn evaluate_function<'a, 'd, N: DataSourceNode<'a>>(
    name: &str,
    args: Vec<XPathValue<N>>,
    e_ctx: &EvaluationContext<'a, 'd, N>,
) -> Result<XPathValue<N>, XPathError> {
    if !e_ctx.functions.contains(name) {
        return Err(XPathError::UnknownFunction(name.to_string()));
    }
    match name {
        // Node-set
        "last" => {
            arity(name, &args, 0, 0)?;
            Ok(XPathValue::Integer(BigInt::from(e_ctx.context_size)))
        }
        "position" => {
            arity(name, &args, 0, 0)?;
            Ok(XPathValue::Integer(BigInt::from(e_ctx.context_position)))
        }
        "count" => func_count(args),
        "id" => func_id(args, e_ctx),
        "local-name" => {
            let node = optional_node_arg(name, args, e_ctx)?;
            Ok(XPathValue::String(
                node.and_then(|n| n.name())
                    .map(|q| q.local_part.to_string())
                    .unwrap_or_default(),
            ))
        }
        "namespace-uri" => {
            let node = optional_node_arg(name, args, e_ctx)?;
            Ok(XPathValue::String(
                node.and_then(|n| n.name())
                    .and_then(|q| q.namespace)
                    .unwrap_or_default()
                    .to_string(),
            ))
        }
        "name" => {
            let node = optional_node_arg(name, args, e_ctx)?;
            Ok(XPathValue::String(
                node.and_then(|n| n.name())
                    .map(|q| q.lexical())
                    .unwrap_or_default(),
            ))
        }
        "generate-id" => {
            let node = optional_node_arg(name, args, e_ctx)?;
            Ok(XPathValue::String(node.map(generate_id).unwrap_or_default()))
        }

        // String
        "string" => {
            arity(name, &args, 0, 1)?;
            Ok(XPathValue::String(string_arg_or_context(args, e_ctx)))
        }
        "concat" => {
            arity(name, &args, 2, usize::MAX)?;
            Ok(XPathValue::String(args.iter().map(|v| v.to_string()).collect()))
        }
        "starts-with" => {
            let (s1, s2) = two_strings(name, args)?;
            Ok(XPathValue::Boolean(s1.starts_with(&s2)))
        }
        "contains" => {
            let (s1, s2) = two_strings(name, args)?;
            Ok(XPathValue::Boolean(s1.contains(&s2)))
        }
        "substring-before" => {
            let (s1, s2) = two_strings(name, args)?;
            let before = s1.find(&s2).map(|i| &s1[..i]).unwrap_or_default();
            Ok(XPathValue::String(before.to_string()))
        }
        "substring-after" => {
            let (s1, s2) = two_strings(name, args)?;
            let after = s1.find(&s2).map(|i| &s1[i + s2.len()..]).unwrap_or_default();
            Ok(XPathValue::String(after.to_string()))
        }
        "substring" => func_substring(args),
        "string-length" => {
            arity(name, &args, 0, 1)?;
            let s = string_arg_or_context(args, e_ctx);
            Ok(XPathValue::Integer(BigInt::from(s.chars().count())))
        }
        "normalize-space" => {
            arity(name, &args, 0, 1)?;
            let s = string_arg_or_context(args, e_ctx);
            Ok(XPathValue::String(s.split_whitespace().collect::<Vec<_>>().join(" ")))
        }
        "translate" => func_translate(args),

        // Boolean
        "boolean" => {
            arity(name, &args, 1, 1)?;
            Ok(XPathValue::Boolean(args[0].to_bool()))
        }
        "not" => {
            arity(name, &args, 1, 1)?;
            Ok(XPathValue::Boolean(!args[0].to_bool()))
        }
        "true" => {
            arity(name, &args, 0, 0)?;
            Ok(XPathValue::Boolean(true))
        }
        "false" => {
            arity(name, &args, 0, 0)?;
            Ok(XPathValue::Boolean(false))
        }
        "lang" => func_lang(args, e_ctx),

        // Number
        "number" => {
            arity(name, &args, 0, 1)?;
            let n = match args.first() {
                Some(v) => v.to_number(),
                None => string_to_number(&e_ctx.context_node.string_value()),
            };
            Ok(XPathValue::Number(n))
        }
        "sum" => func_sum(args),
        "floor" => rounding(name, args, f64::floor),
        "ceiling" => rounding(name, args, f64::ceil),
        // XPath rounds halves towards positive infinity.
        "round" => rounding(name, args, |n| (n + 0.5).floor()),

        // XSLT
        "current" => {
            arity(name, &args, 0, 0)?;
            Ok(XPathValue::NodeSet(vec![e_ctx.current_node]))
        }

        _ => Err(XPathError::UnknownFunction(name.to_string())),
    }
}

fn arity<N>(function: &str, args: &[XPathValue<N>], min: usize, max: usize) -> Result<(), XPathError> {
    if args.len() < min || args.len() > max {
        let expected = match (min, max) {
            (min, max) if min == max => format!("{}", min),
            (min, usize::MAX) => format!("at least {}", min),
            (min, max) => format!("{} to {}", min, max),
        };
        return Err(XPathError::FunctionError {
            function: format!("{}()", function),
            message: format!("Expected {} arguments, got {}", expected, args.len()),
        });
    }
    Ok(())
}

fn string_arg_or_context<'a, N: DataSourceNode<'a>>(
    mut args: Vec<XPathValue<N>>,
    e_ctx: &EvaluationContext<'a, '_, N>,
) -> String {
    match args.pop() {
        Some(v) => v.to_string(),
        None => e_ctx.context_node.string_value(),
    }
}

fn two_strings<'a, N: DataSourceNode<'a>>(
    function: &str,
    args: Vec<XPathValue<N>>,
) -> Result<(String, String), XPathError> {
    arity(function, &args, 2, 2)?;
    Ok((args[0].to_string(), args[1].to_string()))
}

/// The first node of an optional node-set argument, or the context node when omitted.
fn optional_node_arg<'a, N: DataSourceNode<'a>>(
    function: &str,
    mut args: Vec<XPathValue<N>>,
    e_ctx: &EvaluationContext<'a, '_, N>,
) -> Result<Option<N>, XPathError> {
    arity(function, &args, 0, 1)?;
    match args.pop() {
        None => Ok(Some(e_ctx.context_node)),
        Some(XPathValue::NodeSet(nodes)) => Ok(nodes.into_iter().min()),
        Some(v) => Err(XPathError::TypeError(format!(
            "{}() argument must be a node-set, got {:?}",
            function, v
        ))),
    }
}

fn generate_id<'a, N: DataSourceNode<'a>>(node: N) -> String {
    let mut hasher = DefaultHasher::new();
    node.hash(&mut hasher);
    // A leading letter keeps the id a valid NCName.
    format!("id{}", hasher.finish())
}

fn func_count<'a, N: DataSourceNode<'a>>(
    mut args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    arity("count", &args, 1, 1)?;
    match args.remove(0) {
        XPathValue::NodeSet(nodes) => Ok(XPathValue::Integer(BigInt::from(nodes.len()))),
        v => Err(XPathError::TypeError(format!(
            "count() argument must be a node-set, got {:?}",
            v
        ))),
    }
}

fn func_id<'a, 'd, N: DataSourceNode<'a>>(
    mut args: Vec<XPathValue<N>>,
    e_ctx: &EvaluationContext<'a, 'd, N>,
) -> Result<XPathValue<N>, XPathError> {
    arity("id", &args, 1, 1)?;
    let id_string = match args.remove(0) {
        XPathValue::NodeSet(nodes) => nodes
            .iter()
            .map(|n| n.string_value())
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    };
    let ids_to_find: HashSet<_> = id_string.split_whitespace().collect();
    if ids_to_find.is_empty() {
        return Ok(XPathValue::NodeSet(vec![]));
    }

    // Without a DTD, `id` and `xml:id` attributes are the ID-typed attributes.
    let mut results = Vec::new();
    let mut stack = vec![e_ctx.root_node];
    while let Some(node) = stack.pop() {
        if node.node_type() == NodeType::Element {
            let matched = node.attributes().any(|attr| {
                attr.name().is_some_and(|q| {
                    q.local_part == "id"
                        && (q.namespace.is_none() || q.namespace == Some(XML_NAMESPACE))
                        && ids_to_find.contains(attr.string_value().as_str())
                })
            });
            if matched {
                results.push(node);
            }
        }
        stack.extend(node.children());
    }

    results.sort();
    results.dedup();
    Ok(XPathValue::NodeSet(results))
}

fn func_substring<'a, N: DataSourceNode<'a>>(
    args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    arity("substring", &args, 2, 3)?;
    let s = args[0].to_string();
    let first = (args[1].to_number() + 0.5).floor();
    let last = match args.get(2) {
        Some(len) => first + (len.to_number() + 0.5).floor(),
        None => f64::INFINITY,
    };

    let result = s
        .chars()
        .enumerate()
        .filter_map(|(i, c)| {
            let pos = (i + 1) as f64; // XPath positions are 1-based
            (pos >= first && pos < last).then_some(c)
        })
        .collect::<String>();
    Ok(XPathValue::String(result))
}

fn func_translate<'a, N: DataSourceNode<'a>>(
    args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    arity("translate", &args, 3, 3)?;
    let source = args[0].to_string();
    let from: Vec<char> = args[1].to_string().chars().collect();
    let to: Vec<char> = args[2].to_string().chars().collect();
    let result = source
        .chars()
        .filter_map(|c| match from.iter().position(|&fc| fc == c) {
            Some(pos) => to.get(pos).copied(),
            None => Some(c),
        })
        .collect::<String>();
    Ok(XPathValue::String(result))
}

fn func_lang<'a, 'd, N: DataSourceNode<'a>>(
    args: Vec<XPathValue<N>>,
    e_ctx: &EvaluationContext<'a, 'd, N>,
) -> Result<XPathValue<N>, XPathError> {
    arity("lang", &args, 1, 1)?;
    let test_lang = args[0].to_string().to_lowercase();
    let mut current = Some(e_ctx.context_node);
    if current.is_some_and(|n| n.node_type() != NodeType::Element) {
        current = current.and_then(|n| n.parent());
    }

    while let Some(node) = current {
        let lang_attr = node.attributes().find(|attr| {
            attr.name()
                .is_some_and(|q| q.local_part == "lang" && q.namespace == Some(XML_NAMESPACE))
        });
        if let Some(attr) = lang_attr {
            let node_lang = attr.string_value().to_lowercase();
            let matches =
                node_lang == test_lang || node_lang.starts_with(&format!("{}-", test_lang));
            return Ok(XPathValue::Boolean(matches));
        }
        current = node.parent();
    }
    Ok(XPathValue::Boolean(false))
}

fn func_sum<'a, N: DataSourceNode<'a>>(
    mut args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    arity("sum", &args, 1, 1)?;
    match args.remove(0) {
        XPathValue::NodeSet(nodes) => Ok(XPathValue::Number(
            nodes
                .iter()
                .map(|node| string_to_number(&node.string_value()))
                .sum(),
        )),
        v => Err(XPathError::TypeError(format!(
            "sum() argument must be a node-set, got {:?}",
            v
        ))),
    }
}

/// `floor`, `ceiling` and `round`: integers pass through unchanged.
fn rounding<'a, N: DataSourceNode<'a>>(
    function: &str,
    mut args: Vec<XPathValue<N>>,
    f: impl Fn(f64) -> f64,
) -> Result<XPathValue<N>, XPathError> {
    arity(function, &args, 1, 1)?;
    match args.remove(0) {
        XPathValue::Integer(i) => Ok(XPathValue::Integer(i)),
        other => {
            let n = other.to_number();
            if n.is_nan() || n.is_infinite() {
                Ok(XPathValue::Number(n))
            } else {
                Ok(XPathValue::Number(f(n)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::mock::{MockNode, MockTree, create_test_tree};
    use crate::engine::evaluate;
    use crate::parser::parse_expression;
    use std::collections::HashMap;

    fn eval<'a>(tree: &'a MockTree<'a>, xpath: &str) -> XPathValue<MockNode<'a>> {
        eval_at(tree, xpath, 0).unwrap()
    }

    fn eval_at<'a>(
        tree: &'a MockTree<'a>,
        xpath: &str,
        context: usize,
    ) -> Result<XPathValue<MockNode<'a>>, XPathError> {
        let funcs = FunctionRegistry::xslt();
        let vars = HashMap::new();
        let e_ctx = EvaluationContext::new(tree.node(context), tree.node(0), &funcs, &vars);
        evaluate(&parse_expression(xpath)?, &e_ctx)
    }

    #[test]
    fn test_count_is_an_integer() {
        let tree = create_test_tree();
        assert!(matches!(
            eval(&tree, "count(//para)"),
            XPathValue::Integer(i) if i == BigInt::from(2)
        ));
        assert!(eval_at(&tree, "count('x')", 0).is_err());
    }

    #[test]
    fn test_boolean_and_number() {
        let tree = create_test_tree();
        assert!(matches!(eval(&tree, "boolean(//div)"), XPathValue::Boolean(true)));
        assert!(matches!(eval(&tree, "boolean(//missing)"), XPathValue::Boolean(false)));
        assert!(matches!(eval(&tree, "number('12.5')"), XPathValue::Number(n) if n == 12.5));
        assert!(matches!(eval(&tree, "number('abc')"), XPathValue::Number(n) if n.is_nan()));
    }

    #[test]
    fn test_string_functions() {
        let tree = create_test_tree();
        assert_eq!(eval(&tree, "concat('a', 'b', 1)").to_string(), "ab1");
        assert_eq!(eval(&tree, "substring('12345', 1.5, 2.6)").to_string(), "234");
        assert_eq!(eval(&tree, "substring('12345', 0, 3)").to_string(), "12");
        assert_eq!(eval(&tree, "substring-before('1999/04/01', '/')").to_string(), "1999");
        assert_eq!(eval(&tree, "substring-after('1999/04/01', '/')").to_string(), "04/01");
        assert_eq!(eval(&tree, "normalize-space('  a   b ')").to_string(), "a b");
        assert_eq!(eval(&tree, "translate('--aaa--', 'abc-', 'ABC')").to_string(), "AAA");
        assert_eq!(eval(&tree, "string-length('héllo')").to_string(), "5");
        assert!(matches!(eval(&tree, "starts-with('Burning', 'Burn')"), XPathValue::Boolean(true)));
    }

    #[test]
    fn test_name_functions() {
        let tree = create_test_tree();
        assert_eq!(eval(&tree, "name(//para/@*[2])").to_string(), "xml:lang");
        assert_eq!(eval(&tree, "local-name(//para/@*[2])").to_string(), "lang");
        assert_eq!(
            eval(&tree, "namespace-uri(//para/@*[2])").to_string(),
            XML_NAMESPACE
        );
        assert_eq!(eval(&tree, "name()").to_string(), "");
    }

    #[test]
    fn test_rounding_functions() {
        let tree = create_test_tree();
        assert_eq!(eval(&tree, "floor(2.7)").to_string(), "2");
        assert_eq!(eval(&tree, "ceiling(2.1)").to_string(), "3");
        assert_eq!(eval(&tree, "round(2.5)").to_string(), "3");
        assert_eq!(eval(&tree, "round(-2.5)").to_string(), "-2");
        assert!(matches!(eval(&tree, "floor(7)"), XPathValue::Integer(_)));
    }

    #[test]
    fn test_lang_and_id() {
        let tree = create_test_tree();
        assert!(matches!(eval_at(&tree, "lang('EN')", 4).unwrap(), XPathValue::Boolean(true)));
        match eval(&tree, "id('p1 nope')") {
            XPathValue::NodeSet(nodes) => assert_eq!(nodes.len(), 1),
            other => panic!("Expected NodeSet, got {:?}", other),
        }
    }

    #[test]
    fn test_current_is_preserved_inside_predicates() {
        let tree = create_test_tree();
        // From the first para, select paras whose text differs from the current node's.
        let result = eval_at(&tree, "//para[. != current()]", 1).unwrap();
        match result {
            XPathValue::NodeSet(nodes) => {
                assert_eq!(nodes.iter().map(|n| n.id).collect::<Vec<_>>(), vec![8])
            }
            other => panic!("Expected NodeSet, got {:?}", other),
        }
    }

    #[test]
    fn test_unregistered_function_is_rejected() {
        let tree = create_test_tree();
        let funcs = FunctionRegistry::default();
        let vars = HashMap::new();
        let e_ctx = EvaluationContext::new(tree.node(0), tree.node(0), &funcs, &vars);
        let err = evaluate(&parse_expression("current()").unwrap(), &e_ctx).unwrap_err();
        assert_eq!(err, XPathError::UnknownFunction("current".to_string()));
    }
}
