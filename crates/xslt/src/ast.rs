//! The compiled, executable form of a stylesheet.

use crate::pattern::Pattern;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use xmlbridge_xpath::Expression;

/// A pre-compiled, executable block of instructions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreparsedTemplate(pub Vec<XsltInstruction>);

/// An expanded name for something written to the result tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResultName {
    pub prefix: Option<String>,
    pub local: String,
    pub namespace: Option<String>,
}

impl ResultName {
    pub fn local(local: &str) -> Self {
        Self {
            prefix: None,
            local: local.to_string(),
            namespace: None,
        }
    }

    /// `prefix:local` or just `local`.
    pub fn lexical(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{}:{}", p, self.local),
            None => self.local.clone(),
        }
    }

    /// Same namespace and local name; the prefix is not significant.
    pub fn same_expanded_name(&self, other: &ResultName) -> bool {
        self.local == other.local && self.namespace == other.namespace
    }
}

/// The stylesheet namespaces in scope at an instruction, used to resolve names computed at
/// run time by `xsl:element` and `xsl:attribute`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamespaceScope {
    pub default: Option<String>,
    pub prefixes: BTreeMap<String, String>,
}

impl NamespaceScope {
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(xmlbridge_xpath::XML_NAMESPACE);
        }
        self.prefixes.get(prefix).map(String::as_str)
    }
}

/// An attribute value with embedded `{expr}` parts.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValueTemplate {
    Static(String),
    Dynamic(Vec<AvtPart>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AvtPart {
    Static(String),
    Dynamic(Expression),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDataType {
    Text,
    Number,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub select: Expression,
    pub order: SortOrder,
    pub data_type: SortDataType,
}

/// How a variable, parameter or `xsl:with-param` obtains its value.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableValue {
    Select(Expression),
    /// Content instructions; the result is used as a string.
    Content(PreparsedTemplate),
    /// Neither `select` nor content: the empty string.
    Empty,
}

/// `xsl:param` in a template or at the top level, or a top-level `xsl:variable`.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub value: VariableValue,
}

/// A parameter passed to a template.
#[derive(Debug, Clone, PartialEq)]
pub struct WithParam {
    pub name: String,
    pub value: VariableValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct When {
    pub test: Expression,
    pub body: PreparsedTemplate,
}

/// One alternative of an `xsl:template match="..."`. Unions are split into one rule per
/// alternative, each with its own default priority.
#[derive(Debug, Clone)]
pub struct TemplateRule {
    pub pattern: Pattern,
    pub priority: f64,
    /// Declaration order; later rules win priority ties.
    pub position: usize,
    pub mode: Option<String>,
    pub params: Vec<Param>,
    pub body: Arc<PreparsedTemplate>,
}

#[derive(Debug, Clone)]
pub struct NamedTemplate {
    pub params: Vec<Param>,
    pub body: Arc<PreparsedTemplate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMethod {
    Xml,
    Html,
    Text,
}

/// Settings from `xsl:output`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutputSettings {
    /// `None` picks html or xml from the first element produced.
    pub method: Option<OutputMethod>,
    pub indent: bool,
    pub omit_xml_declaration: bool,
    pub standalone: Option<bool>,
}

/// One name test from `xsl:strip-space` or `xsl:preserve-space`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpaceTest {
    Any,
    Namespace(String),
    Name {
        namespace: Option<String>,
        local: String,
    },
}

impl SpaceTest {
    /// The default priority the test would have as a pattern, or `None` if it does not match.
    fn priority(&self, namespace: Option<&str>, local: &str) -> Option<f64> {
        match self {
            SpaceTest::Any => Some(-0.5),
            SpaceTest::Namespace(ns) => (namespace == Some(ns.as_str())).then_some(-0.25),
            SpaceTest::Name {
                namespace: ns,
                local: l,
            } => (ns.as_deref() == namespace && l == local).then_some(0.0),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SpaceRules {
    pub strip: Vec<SpaceTest>,
    pub preserve: Vec<SpaceTest>,
}

impl SpaceRules {
    pub fn is_empty(&self) -> bool {
        self.strip.is_empty()
    }

    /// Whether whitespace-only text children of the named element are removed. The more
    /// specific test wins; on a tie the element is preserved.
    pub fn strips(&self, namespace: Option<&str>, local: &str) -> bool {
        let best = |tests: &[SpaceTest]| {
            tests
                .iter()
                .filter_map(|t| t.priority(namespace, local))
                .fold(None, |acc: Option<f64>, p| Some(acc.map_or(p, |a| a.max(p))))
        };
        match (best(&self.strip), best(&self.preserve)) {
            (Some(s), Some(p)) => s > p,
            (Some(_), None) => true,
            _ => false,
        }
    }
}

/// The complete output of the compiler.
#[derive(Debug, Clone, Default)]
pub struct CompiledStylesheet {
    pub output: OutputSettings,
    pub space: SpaceRules,
    /// Top-level parameters and variables, in declaration order.
    pub globals: Vec<Param>,
    /// Match rules grouped by mode, highest precedence first.
    pub template_rules: HashMap<Option<String>, Vec<TemplateRule>>,
    pub named_templates: HashMap<String, NamedTemplate>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum XsltInstruction {
    Text(String),
    /// A literal result element from the stylesheet.
    LiteralElement {
        name: ResultName,
        namespaces: Vec<(Option<String>, String)>,
        attributes: Vec<(ResultName, AttributeValueTemplate)>,
        body: PreparsedTemplate,
    },
    ValueOf {
        select: Expression,
    },
    CopyOf {
        select: Expression,
    },
    Copy {
        body: PreparsedTemplate,
    },
    ApplyTemplates {
        select: Option<Expression>,
        mode: Option<String>,
        sort_keys: Vec<SortKey>,
        params: Vec<WithParam>,
    },
    CallTemplate {
        name: String,
        params: Vec<WithParam>,
    },
    ForEach {
        select: Expression,
        sort_keys: Vec<SortKey>,
        body: PreparsedTemplate,
    },
    If {
        test: Expression,
        body: PreparsedTemplate,
    },
    Choose {
        whens: Vec<When>,
        otherwise: Option<PreparsedTemplate>,
    },
    Element {
        name: AttributeValueTemplate,
        namespace: Option<AttributeValueTemplate>,
        scope: NamespaceScope,
        body: PreparsedTemplate,
    },
    Attribute {
        name: AttributeValueTemplate,
        namespace: Option<AttributeValueTemplate>,
        scope: NamespaceScope,
        body: PreparsedTemplate,
    },
    Comment {
        body: PreparsedTemplate,
    },
    ProcessingInstruction {
        name: AttributeValueTemplate,
        body: PreparsedTemplate,
    },
    Variable {
        name: String,
        value: VariableValue,
    },
    Message {
        body: PreparsedTemplate,
        terminate: bool,
    },
}
