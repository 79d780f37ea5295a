use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum XPathError {
    #[error("XPath parse error in '{0}': {1}")]
    XPathParse(String, String),

    #[error("Undeclared namespace prefix '{0}'")]
    UnknownPrefix(String),

    #[error("Unknown function '{0}()'")]
    UnknownFunction(String),

    #[error("Invalid namespace binding '{prefix}' -> '{uri}': {message}")]
    InvalidBinding {
        prefix: String,
        uri: String,
        message: String,
    },

    #[error("Function '{function}' error: {message}")]
    FunctionError { function: String, message: String },

    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Variable '{0}' not found")]
    UnknownVariable(String),
}

/// Failure to turn payload bytes into an [`XmlDocument`](crate::XmlDocument).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DocumentError {
    #[error("Document is empty")]
    Empty,

    #[error("Document is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("Document is not valid {0}")]
    InvalidEncoding(&'static str),

    #[error("Unsupported document encoding '{0}'")]
    UnsupportedEncoding(String),

    #[error("Document is not well-formed: {0}")]
    NotWellFormed(String),
}

impl From<roxmltree::Error> for DocumentError {
    fn from(e: roxmltree::Error) -> Self {
        DocumentError::NotWellFormed(e.to_string())
    }
}
