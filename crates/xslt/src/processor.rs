use crate::ast::{CompiledStylesheet, OutputSettings};
use crate::compiler;
use crate::error::XsltError;
use crate::executor::{ExecutionError, TemplateExecutor};
use crate::output::{OutputBuilder, ResultTree};
use crate::serializer;
use std::sync::Arc;
use xmlbridge_xpath::{XmlDocument, encoding};


/// Stack reserved for the thread that runs a transformation, enough for
/// [`crate::executor::MAX_TEMPLATE_DEPTH`] nested templates in debug builds.
pub const EXECUTOR_STACK_SIZE: usize = 128 * 1024 * 1024;

/// A compiled stylesheet. Cloning is cheap and every clone shares the same immutable
/// compiled form, so one stylesheet can run on many threads at once.
#[derive(Debug, Clone)]
pub struct Stylesheet {
    compiled: Arc<CompiledStylesheet>,
}

impl Stylesheet {
    pub fn compile(source: &str) -> Result<Self, XsltError> {
        Ok(Self {
            compiled: Arc::new(compiler::compile(source)?),
        })
    }

    /// Compiles stylesheet bytes, decoded the same way as input documents.
    pub fn compile_bytes(bytes: &[u8]) -> Result<Self, XsltError> {
        let source = encoding::decode(bytes)?;
        Self::compile(&source)
    }

    pub fn output_settings(&self) -> &OutputSettings {
        &self.compiled.output
    }

    /// Parses `input` the way this stylesheet expects it, applying its
    /// `xsl:strip-space`/`xsl:preserve-space` rules.
    pub fn parse_input(&self, input: &[u8]) -> Result<XmlDocument, XsltError> {
        let space = &self.compiled.space;
        let document = if space.is_empty() {
            XmlDocument::parse(input)?
        } else {
            XmlDocument::parse_stripping(input, |namespace, local| space.strips(namespace, local))?
        };
        Ok(document)
    }

    /// Parses `input` and transforms it. Nothing is returned unless the whole run succeeds.
    pub fn transform(&self, input: &[u8]) -> Result<String, XsltError> {
        let document = self.parse_input(input)?;
        self.transform_document(&document)
    }

    /// Transforms an already parsed document. Whitespace stripping only happens when the
    /// document came from [`Stylesheet::parse_input`].
    ///
    /// The templates run on a scoped thread with [`EXECUTOR_STACK_SIZE`] of stack, so a
    /// runaway recursion ends in [`ExecutionError::RecursionLimit`] whatever the
    /// caller's stack size.
    pub fn transform_document(&self, document: &XmlDocument) -> Result<String, XsltError> {
        let tree = std::thread::scope(|scope| -> Result<ResultTree, XsltError> {
            let worker = std::thread::Builder::new()
                .name("xslt-executor".to_string())
                .stack_size(EXECUTOR_STACK_SIZE)
                .spawn_scoped(scope, || {
                    let mut tree = ResultTree::new();
                    self.run(document, &mut tree).map(|_| tree)
                })
                .map_err(|e| ExecutionError::Spawn(e.to_string()))?;
            match worker.join() {
                Ok(result) => result,
                Err(panic) => std::panic::resume_unwind(panic),
            }
        })?;
        serializer::serialize(&tree.finish(), &self.compiled.output)
    }

    /// Runs the stylesheet on the calling thread, sending the result to `builder`
    /// instead of serializing it.
    pub fn run(&self, document: &XmlDocument, builder: &mut dyn OutputBuilder) -> Result<(), XsltError> {
        let mut executor = TemplateExecutor::new(&self.compiled, document.root());
        executor.execute(builder)?;
        Ok(())
    }
}
