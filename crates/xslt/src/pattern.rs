//! A dedicated engine for parsing and evaluating XSLT `match` patterns.
use crate::error::XsltError;
use nom::IResult;
use nom::Parser;
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{char, multispace0};
use nom::combinator::{map, opt};
use nom::multi::{many0, separated_list1};
use nom::sequence::{delimited, pair, preceded};
use std::fmt;
use xmlbridge_xpath::ast::{Expression, NodeTest};
use xmlbridge_xpath::datasource::{DataSourceNode, NodeType};
use xmlbridge_xpath::engine::{self, EvaluationContext};
use xmlbridge_xpath::parser as xpath_parser;
use xmlbridge_xpath::{Axis, XPathCompiler, XPathError};

/// The axes allowed in a pattern step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchAxis {
    Child,
    Attribute,
}

/// How a step relates to the step before it: `/` or `//`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Separator {
    Child,
    Descendant,
}

/// Where the first step of a path must sit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    /// `foo/bar`: anywhere.
    Relative,
    /// `/foo/bar`, or `/` alone.
    Root,
    /// `//foo/bar`.
    AnyDepth,
}

/// A single location step in a match pattern (e.g., `foo`, `@id`, `item[2]`).
#[derive(Debug, Clone, PartialEq)]
struct MatchStep {
    axis: MatchAxis,
    node_test: NodeTest,
    predicates: Vec<Expression>,
    /// The separator written before this step. Ignored for the first step.
    separator: Separator,
}

/// A single location path within a pattern, e.g., "/doc/section//para".
#[derive(Debug, Clone, PartialEq)]
struct LocationPathPattern {
    anchor: Anchor,
    steps: Vec<MatchStep>,
}

/// A compiled representation of an XSLT match pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    /// A pattern can be a union of multiple paths, e.g., "para|note".
    paths: Vec<LocationPathPattern>,
    original_text: String,
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original_text)
    }
}

impl Pattern {
    /// Parses `text` and resolves its prefixes and functions with `compiler`.
    pub fn compile(text: &str, compiler: &XPathCompiler) -> Result<Self, XsltError> {
        let mut pattern = parse(text)?;
        let xpath_error = |source: XPathError| XsltError::XPath {
            expression: text.to_string(),
            source,
        };
        for step in pattern.paths.iter_mut().flat_map(|p| p.steps.iter_mut()) {
            compiler.resolve_node_test(&mut step.node_test).map_err(xpath_error)?;
            for predicate in &mut step.predicates {
                compiler.resolve(predicate).map_err(xpath_error)?;
            }
        }
        Ok(pattern)
    }

    /// Splits a union into one pattern per alternative.
    pub fn alternatives(&self) -> Vec<Pattern> {
        self.paths
            .iter()
            .map(|path| Pattern {
                paths: vec![path.clone()],
                original_text: self.original_text.clone(),
            })
            .collect()
    }

    /// The XSLT 1.0 default priority. For a union, the highest of its alternatives.
    pub fn default_priority(&self) -> f64 {
        self.paths
            .iter()
            .map(LocationPathPattern::default_priority)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Evaluates if a given node matches this pattern. `e_ctx` supplies the root, the
    /// function library and the variables visible to predicates.
    pub fn matches<'a, N>(&self, node: N, e_ctx: &EvaluationContext<'a, '_, N>) -> Result<bool, XPathError>
    where
        N: DataSourceNode<'a> + 'a,
    {
        for path in &self.paths {
            if path.matches(node, e_ctx)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl LocationPathPattern {
    fn default_priority(&self) -> f64 {
        if self.steps.is_empty() {
            return 0.5;
        }
        match (self.anchor, self.steps.as_slice()) {
            (Anchor::Relative, [step]) if step.predicates.is_empty() => match step.node_test {
                NodeTest::Name(_) => 0.0,
                NodeTest::NamespaceWildcard { .. } => -0.25,
                NodeTest::Wildcard | NodeTest::NodeType(_) => -0.5,
            },
            _ => 0.5,
        }
    }

    fn matches<'a, N>(&self, node: N, e_ctx: &EvaluationContext<'a, '_, N>) -> Result<bool, XPathError>
    where
        N: DataSourceNode<'a> + 'a,
    {
        if self.steps.is_empty() {
            // "/"
            return Ok(node == e_ctx.root_node);
        }
        self.match_from(self.steps.len() - 1, node, e_ctx)
    }

    /// Matches steps right to left. A `//` separator backtracks over every ancestor.
    fn match_from<'a, N>(
        &self,
        index: usize,
        node: N,
        e_ctx: &EvaluationContext<'a, '_, N>,
    ) -> Result<bool, XPathError>
    where
        N: DataSourceNode<'a> + 'a,
    {
        let step = &self.steps[index];
        if !step.matches(node, e_ctx)? {
            return Ok(false);
        }
        let Some(parent) = node.parent() else {
            return Ok(false);
        };
        if index == 0 {
            return Ok(match self.anchor {
                Anchor::Root => parent == e_ctx.root_node,
                Anchor::Relative | Anchor::AnyDepth => true,
            });
        }
        match step.separator {
            Separator::Child => self.match_from(index - 1, parent, e_ctx),
            Separator::Descendant => {
                let mut ancestor = Some(parent);
                while let Some(candidate) = ancestor {
                    if self.match_from(index - 1, candidate, e_ctx)? {
                        return Ok(true);
                    }
                    ancestor = candidate.parent();
                }
                Ok(false)
            }
        }
    }
}

impl MatchStep {
    fn matches<'a, N>(&self, node: N, e_ctx: &EvaluationContext<'a, '_, N>) -> Result<bool, XPathError>
    where
        N: DataSourceNode<'a> + 'a,
    {
        let Some(parent) = node.parent() else {
            // The root is never the target of a step.
            return Ok(false);
        };
        let is_attribute = node.node_type() == NodeType::Attribute;
        let axis = match self.axis {
            MatchAxis::Attribute if is_attribute => Axis::Attribute,
            MatchAxis::Child if !is_attribute => Axis::Child,
            _ => return Ok(false),
        };
        if !engine::node_test_matches(&self.node_test, axis, &node) {
            return Ok(false);
        }
        if self.predicates.is_empty() {
            return Ok(true);
        }

        // Positions in a step predicate count siblings that pass the same node test.
        let siblings: Vec<N> = match axis {
            Axis::Attribute => parent.attributes().collect(),
            _ => parent.children().collect(),
        };
        let candidates: Vec<N> = siblings
            .into_iter()
            .filter(|n| engine::node_test_matches(&self.node_test, axis, n))
            .collect();
        let kept = engine::apply_predicates(&candidates, &self.predicates, e_ctx)?;
        Ok(kept.contains(&node))
    }
}

// --- Parser ---

pub fn parse(text: &str) -> Result<Pattern, XsltError> {
    match pattern_parser(text.trim()) {
        Ok(("", paths)) => Ok(Pattern {
            paths,
            original_text: text.to_string(),
        }),
        Ok((rem, _)) => Err(XsltError::PatternParse(
            text.to_string(),
            format!("Unconsumed input in pattern: {}", rem),
        )),
        Err(e) => Err(XsltError::PatternParse(text.to_string(), e.to_string())),
    }
}

fn step_parser(input: &str) -> IResult<&str, MatchStep> {
    let (i, (axis, node_test)) = alt((
        map(
            preceded(alt((tag("@"), tag("attribute::"))), xpath_parser::node_test),
            |nt| (MatchAxis::Attribute, nt),
        ),
        map(preceded(opt(tag("child::")), xpath_parser::node_test), |nt| {
            (MatchAxis::Child, nt)
        }),
    ))
    .parse(input)?;
    let (i, predicates) = many0(xpath_parser::predicate).parse(i)?;
    Ok((
        i,
        MatchStep {
            axis,
            node_test,
            predicates,
            separator: Separator::Child,
        },
    ))
}

fn separator(input: &str) -> IResult<&str, Separator> {
    alt((
        map(tag("//"), |_| Separator::Descendant),
        map(tag("/"), |_| Separator::Child),
    ))
    .parse(input)
}

fn relative_steps(input: &str) -> IResult<&str, Vec<MatchStep>> {
    let (i, first) = step_parser(input)?;
    let (i, rest) = many0(pair(separator, step_parser)).parse(i)?;
    let mut steps = vec![first];
    for (sep, mut step) in rest {
        step.separator = sep;
        steps.push(step);
    }
    Ok((i, steps))
}

fn path_parser(input: &str) -> IResult<&str, LocationPathPattern> {
    if let Some(rem) = input.strip_prefix("//") {
        let (rem, steps) = relative_steps(rem)?;
        return Ok((
            rem,
            LocationPathPattern {
                anchor: Anchor::AnyDepth,
                steps,
            },
        ));
    }
    if let Some(rem) = input.strip_prefix('/') {
        // Either `/` alone or `/` followed by steps.
        let (rem, steps) = match relative_steps(rem) {
            Ok((rem, steps)) => (rem, steps),
            Err(_) => (rem, vec![]),
        };
        return Ok((
            rem,
            LocationPathPattern {
                anchor: Anchor::Root,
                steps,
            },
        ));
    }
    let (rem, steps) = relative_steps(input)?;
    Ok((
        rem,
        LocationPathPattern {
            anchor: Anchor::Relative,
            steps,
        },
    ))
}

fn pattern_parser(input: &str) -> IResult<&str, Vec<LocationPathPattern>> {
    separated_list1(delimited(multispace0, char('|'), multispace0), path_parser).parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use xmlbridge_xpath::datasource::mock::{MockNode, MockTree, create_test_tree};
    use xmlbridge_xpath::{FunctionRegistry, NamespaceContext};

    fn compile(text: &str) -> Pattern {
        let compiler = XPathCompiler::with_functions(NamespaceContext::new(), FunctionRegistry::xslt());
        Pattern::compile(text, &compiler).unwrap()
    }

    fn matches<'a>(pattern: &Pattern, tree: &'a MockTree<'a>, id: usize) -> bool {
        let functions = FunctionRegistry::xslt();
        let variables = HashMap::new();
        let node: MockNode<'a> = tree.node(id);
        let e_ctx = EvaluationContext::new(node, tree.node(0), &functions, &variables);
        pattern.matches(node, &e_ctx).unwrap()
    }

    #[test]
    fn test_pattern_parsing() {
        assert!(parse("foo").is_ok());
        assert!(parse("foo/bar").is_ok());
        assert!(parse("/").is_ok());
        assert!(parse("/*").is_ok());
        assert!(parse("/root/item").is_ok());
        assert!(parse("foo | bar").is_ok());
        assert!(parse("text()").is_ok());
        assert!(parse("//para[@id='p1']").is_ok());
        assert!(parse("a//b/@c").is_ok());
        assert!(parse("child::para").is_ok());
        assert!(parse("foo/").is_err());
        assert!(parse("ancestor::foo").is_err());
    }

    #[test]
    fn test_simple_matching() {
        let tree = create_test_tree();
        let para = compile("para");
        assert!(matches(&para, &tree, 1));
        assert!(matches(&para, &tree, 8));
        assert!(!matches(&para, &tree, 6));

        let text = compile("text()");
        assert!(matches(&text, &tree, 4));
        assert!(!matches(&text, &tree, 1));

        let star = compile("*");
        assert!(matches(&star, &tree, 6));
        assert!(!matches(&star, &tree, 2), "'*' is a child step and skips attributes");
    }

    #[test]
    fn test_root_and_absolute_patterns() {
        let tree = create_test_tree();
        assert!(matches(&compile("/"), &tree, 0));
        assert!(!matches(&compile("/"), &tree, 1));
        assert!(matches(&compile("/para"), &tree, 8));
        assert!(!matches(&compile("node()"), &tree, 0), "a step never matches the root");
        assert!(matches(&compile("//text()"), &tree, 9));
    }

    #[test]
    fn test_attribute_patterns() {
        let tree = create_test_tree();
        assert!(matches(&compile("@id"), &tree, 2));
        assert!(matches(&compile("para/@*"), &tree, 3));
        assert!(matches(&compile("@xml:lang"), &tree, 3));
        assert!(!matches(&compile("@id"), &tree, 1));
    }

    #[test]
    fn test_predicates_count_matching_siblings() {
        let tree = create_test_tree();
        let first = compile("para[1]");
        assert!(matches(&first, &tree, 1));
        assert!(!matches(&first, &tree, 8));
        let last = compile("para[last()]");
        assert!(matches(&last, &tree, 8));
        assert!(matches(&compile("para[@id='p1']"), &tree, 1));
        assert!(!matches(&compile("para[@id='p1']"), &tree, 8));
    }

    #[test]
    fn test_descendant_separator() {
        let tree = create_test_tree();
        assert!(matches(&compile("//para//text()"), &tree, 4));
        assert!(!matches(&compile("div//text()"), &tree, 4));
        assert!(matches(&compile("para//text()"), &tree, 4));
    }

    #[test]
    fn test_default_priorities() {
        assert_eq!(compile("para").default_priority(), 0.0);
        assert_eq!(compile("@id").default_priority(), 0.0);
        assert_eq!(compile("*").default_priority(), -0.5);
        assert_eq!(compile("text()").default_priority(), -0.5);
        assert_eq!(compile("para[1]").default_priority(), 0.5);
        assert_eq!(compile("root/para").default_priority(), 0.5);
        assert_eq!(compile("/").default_priority(), 0.5);
        assert_eq!(compile("para|*").alternatives().len(), 2);
    }

    #[test]
    fn test_namespace_patterns_resolve_against_the_compiler() {
        let mut ns = NamespaceContext::new();
        ns.bind("b", "urn:books").unwrap();
        let compiler = XPathCompiler::with_functions(ns, FunctionRegistry::xslt());
        let pattern = Pattern::compile("b:*", &compiler).unwrap();
        assert_eq!(pattern.default_priority(), -0.25);
        assert!(matches!(
            Pattern::compile("x:book", &compiler),
            Err(XsltError::XPath { .. })
        ));
    }
}
