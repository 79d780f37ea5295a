use crate::executor::ExecutionError;
use thiserror::Error;
use xmlbridge_xpath::{DocumentError, XPathError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub col: usize,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.col)
    }
}

impl From<(usize, usize)> for Location {
    fn from((line, col): (usize, usize)) -> Self {
        Location { line, col }
    }
}

#[derive(Error, Debug)]
pub enum XsltError {
    #[error("Stylesheet is not well-formed XML: {0}")]
    XmlParse(#[from] roxmltree::Error),

    #[error("Input document error: {0}")]
    Document(#[from] DocumentError),

    #[error("XPath error in '{expression}': {source}")]
    XPath {
        expression: String,
        #[source]
        source: XPathError,
    },

    #[error("Invalid match pattern '{0}': {1}")]
    PatternParse(String, String),

    #[error("Stylesheet compilation error: {message} at {location}")]
    Compilation { message: String, location: Location },

    #[error("Template execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Output serialization error: {0}")]
    Serialization(String),

    #[error("UTF-8 encoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl XsltError {
    /// True when the failure came from the stylesheet rather than the input or the run.
    pub fn is_compilation(&self) -> bool {
        matches!(
            self,
            XsltError::XmlParse(_)
                | XsltError::XPath { .. }
                | XsltError::PatternParse(..)
                | XsltError::Compilation { .. }
        )
    }
}

impl From<std::io::Error> for XsltError {
    fn from(e: std::io::Error) -> Self {
        XsltError::Serialization(e.to_string())
    }
}
