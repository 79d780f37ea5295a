//! Turns expression text into a [`CompiledXPath`]: parsed, with every prefix resolved
//! against a [`NamespaceContext`] and every function call checked against a
//! [`FunctionRegistry`].

use crate::ast::{Expression, LocationPath, NodeTest, Step};
use crate::datasource::DataSourceNode;
use crate::document::{XML_NAMESPACE, XmlDocument, XmlNode};
use crate::engine::{self, EvaluationContext, XPathValue};
use crate::error::XPathError;
use crate::functions::FunctionRegistry;
use crate::parser::parse_expression;
use std::collections::{BTreeMap, HashMap};

const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

/// Prefix to namespace URI bindings visible to compiled expressions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceContext {
    bindings: BTreeMap<String, String>,
}

impl NamespaceContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `prefix` to `uri`, replacing any earlier binding of the same prefix.
    ///
    /// Rejects prefixes that are not NCNames, URIs that are empty or contain
    /// whitespace, and any attempt to rebind `xml` or `xmlns`.
    pub fn bind(&mut self, prefix: &str, uri: &str) -> Result<(), XPathError> {
        let invalid = |message: &str| XPathError::InvalidBinding {
            prefix: prefix.to_string(),
            uri: uri.to_string(),
            message: message.to_string(),
        };
        if !is_nc_name(prefix) {
            return Err(invalid("prefix is not a valid NCName"));
        }
        if uri.is_empty() {
            return Err(invalid("namespace URI is empty"));
        }
        if uri.chars().any(char::is_whitespace) {
            return Err(invalid("namespace URI contains whitespace"));
        }
        if prefix == "xmlns" || (prefix == "xml" && uri != XML_NAMESPACE) {
            return Err(invalid("reserved prefix cannot be rebound"));
        }
        if uri == XMLNS_NAMESPACE || (uri == XML_NAMESPACE && prefix != "xml") {
            return Err(invalid("reserved namespace cannot be bound to another prefix"));
        }
        self.bindings.insert(prefix.to_string(), uri.to_string());
        Ok(())
    }

    /// The URI bound to `prefix`. `xml` is always bound.
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(XML_NAMESPACE);
        }
        self.bindings.get(prefix).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings.iter().map(|(p, u)| (p.as_str(), u.as_str()))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

fn is_nc_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// A reusable compiler bound to a fixed namespace context and function library.
#[derive(Debug, Clone)]
pub struct XPathCompiler {
    namespaces: NamespaceContext,
    functions: FunctionRegistry,
}

impl XPathCompiler {
    pub fn new(namespaces: NamespaceContext) -> Self {
        Self::with_functions(namespaces, FunctionRegistry::default())
    }

    pub fn with_functions(namespaces: NamespaceContext, functions: FunctionRegistry) -> Self {
        Self {
            namespaces,
            functions,
        }
    }

    pub fn namespaces(&self) -> &NamespaceContext {
        &self.namespaces
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    pub fn compile(&self, source: &str) -> Result<CompiledXPath, XPathError> {
        let mut expression = parse_expression(source)?;
        self.resolve(&mut expression)?;
        log::debug!("Compiled XPath expression '{}'", source);
        Ok(CompiledXPath {
            source: source.to_string(),
            expression,
            functions: self.functions.clone(),
        })
    }

    /// Binds the prefix of a name test or namespace wildcard to its URI.
    pub fn resolve_node_test(&self, test: &mut NodeTest) -> Result<(), XPathError> {
        match test {
            NodeTest::Name(name_test) => {
                if let Some(prefix) = &name_test.prefix {
                    name_test.namespace = Some(self.resolve_prefix(prefix)?);
                }
            }
            NodeTest::NamespaceWildcard { prefix, namespace } => {
                *namespace = Some(self.resolve_prefix(prefix)?);
            }
            NodeTest::Wildcard | NodeTest::NodeType(_) => {}
        }
        Ok(())
    }

    fn resolve_prefix(&self, prefix: &str) -> Result<String, XPathError> {
        self.namespaces
            .resolve(prefix)
            .map(str::to_string)
            .ok_or_else(|| XPathError::UnknownPrefix(prefix.to_string()))
    }

    /// Resolves prefixes and checks function names in an already parsed expression.
    pub fn resolve(&self, expr: &mut Expression) -> Result<(), XPathError> {
        match expr {
            Expression::Literal(_)
            | Expression::Integer(_)
            | Expression::Number(_)
            | Expression::Variable(_) => Ok(()),
            Expression::LocationPath(path) => self.resolve_path(path),
            Expression::Filter { base, predicates } => {
                self.resolve(base)?;
                predicates
                    .iter_mut()
                    .try_for_each(|p| self.resolve(p))
            }
            Expression::FunctionCall { name, args } => {
                if !self.functions.contains(name) {
                    return Err(XPathError::UnknownFunction(name.clone()));
                }
                args.iter_mut().try_for_each(|a| self.resolve(a))
            }
            Expression::BinaryOp { left, right, .. } => {
                self.resolve(left)?;
                self.resolve(right)
            }
            Expression::UnaryOp { expr, .. } => self.resolve(expr),
        }
    }

    fn resolve_path(&self, path: &mut LocationPath) -> Result<(), XPathError> {
        if let Some(start) = path.start_point.as_mut() {
            self.resolve(start)?;
        }
        path.steps.iter_mut().try_for_each(|s| self.resolve_step(s))
    }

    fn resolve_step(&self, step: &mut Step) -> Result<(), XPathError> {
        self.resolve_node_test(&mut step.node_test)?;
        step.predicates
            .iter_mut()
            .try_for_each(|p| self.resolve(p))
    }
}

/// A parsed and namespace-resolved expression. Immutable and shareable across threads.
#[derive(Debug, Clone)]
pub struct CompiledXPath {
    source: String,
    expression: Expression,
    functions: FunctionRegistry,
}

impl CompiledXPath {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    /// Evaluates with a caller-built context.
    pub fn evaluate_in<'a, N>(
        &self,
        e_ctx: &EvaluationContext<'a, '_, N>,
    ) -> Result<XPathValue<N>, XPathError>
    where
        N: DataSourceNode<'a> + 'a,
    {
        engine::evaluate(&self.expression, e_ctx)
    }

    /// Evaluates with the document node as the context item and no variables in scope.
    pub fn evaluate<'d>(
        &self,
        document: &'d XmlDocument,
    ) -> Result<XPathValue<XmlNode<'d>>, XPathError> {
        let root = document.root();
        let variables = HashMap::new();
        let e_ctx = EvaluationContext::new(root, root, &self.functions, &variables);
        engine::evaluate(&self.expression, &e_ctx)
    }
}
