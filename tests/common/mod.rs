#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use xmlbridge::{
    DynamicString, FilesystemResourceProvider, FlowContext, Message, NativeEngine,
    ScriptEngineService, XPathConfiguration, XmlEngine, XmlError,
};
use xmlbridge_xpath::{CompiledXPath, XPathCompiler, XPathValue, XmlDocument, XmlNode};
use xmlbridge_xslt::Stylesheet;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub const BOOKSTORE_NS: &str = "http://bookstore.com/schemes";

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

/// Reads a file from `tests/fixtures`.
pub fn fixture(name: &str) -> Vec<u8> {
    std::fs::read(fixtures_dir().join(name))
        .unwrap_or_else(|e| panic!("cannot read fixture {}: {}", name, e))
}

pub fn fixture_resources() -> Arc<FilesystemResourceProvider> {
    Arc::new(FilesystemResourceProvider::new(fixtures_dir()))
}

pub fn bookstore_namespaces() -> XPathConfiguration {
    XPathConfiguration::from_pairs([("ns2", BOOKSTORE_NS)])
}

/// Counts the calls that reach the processor, then delegates to [`NativeEngine`].
#[derive(Debug, Default)]
pub struct CountingEngine {
    inner: NativeEngine,
    pub parses: AtomicUsize,
    pub expression_compiles: AtomicUsize,
    pub stylesheet_compiles: AtomicUsize,
    pub transforms: AtomicUsize,
}

impl CountingEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn parses(&self) -> usize {
        self.parses.load(Ordering::SeqCst)
    }

    pub fn expression_compiles(&self) -> usize {
        self.expression_compiles.load(Ordering::SeqCst)
    }

    pub fn stylesheet_compiles(&self) -> usize {
        self.stylesheet_compiles.load(Ordering::SeqCst)
    }

    pub fn transforms(&self) -> usize {
        self.transforms.load(Ordering::SeqCst)
    }
}

impl XmlEngine for CountingEngine {
    fn build_compiler(&self, config: &XPathConfiguration) -> Result<XPathCompiler, XmlError> {
        self.inner.build_compiler(config)
    }

    fn parse_document(&self, bytes: &[u8]) -> Result<XmlDocument, XmlError> {
        self.parses.fetch_add(1, Ordering::SeqCst);
        self.inner.parse_document(bytes)
    }

    fn compile_expression(
        &self,
        compiler: &XPathCompiler,
        expression: &str,
    ) -> Result<CompiledXPath, XmlError> {
        self.expression_compiles.fetch_add(1, Ordering::SeqCst);
        self.inner.compile_expression(compiler, expression)
    }

    fn evaluate<'d>(
        &self,
        expression: &CompiledXPath,
        document: &'d XmlDocument,
    ) -> Result<XPathValue<XmlNode<'d>>, XmlError> {
        self.inner.evaluate(expression, document)
    }

    fn compile_stylesheet(&self, source: &[u8]) -> Result<Stylesheet, XmlError> {
        self.stylesheet_compiles.fetch_add(1, Ordering::SeqCst);
        self.inner.compile_stylesheet(source)
    }

    fn transform(&self, stylesheet: &Stylesheet, input: &[u8]) -> Result<String, XmlError> {
        self.transforms.fetch_add(1, Ordering::SeqCst);
        self.inner.transform(stylesheet, input)
    }
}

/// Resolves `#[attributes.<name>]` and `#[vars.<name>]` templates; anything else, or a
/// missing value, does not resolve.
#[derive(Debug, Default)]
pub struct LookupScriptEngine;

impl ScriptEngineService for LookupScriptEngine {
    fn evaluate(&self, template: &DynamicString, context: &FlowContext, message: &Message) -> Option<String> {
        let script = template.script()?.trim();
        if let Some(name) = script.strip_prefix("attributes.") {
            return message.attributes().get(name).map(str::to_string);
        }
        if let Some(name) = script.strip_prefix("vars.") {
            return context.variable(name).map(str::to_string);
        }
        None
    }
}
