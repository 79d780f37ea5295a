use crate::resource::ResourceError;
use thiserror::Error;
use xmlbridge_xpath::{DocumentError, XPathError};
use xmlbridge_xslt::XsltError;

/// What went wrong, without the details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    MalformedDocument,
    InvalidExpression,
    Transformation,
    Resource,
}

/// Failures of the XPath and XSLT adapters.
#[derive(Error, Debug)]
pub enum XmlError {
    #[error("Invalid configuration: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<XPathError>,
    },

    #[error("Malformed XML document: {0}")]
    MalformedDocument(#[from] DocumentError),

    #[error("Invalid XPath expression '{expression}': {source}")]
    InvalidExpression {
        expression: String,
        #[source]
        source: XPathError,
    },

    #[error("XSLT transformation failed: {message}")]
    Transformation {
        message: String,
        #[source]
        source: Option<XsltError>,
    },

    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),
}

impl XmlError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            XmlError::Configuration { .. } => ErrorKind::Configuration,
            XmlError::MalformedDocument(_) => ErrorKind::MalformedDocument,
            XmlError::InvalidExpression { .. } => ErrorKind::InvalidExpression,
            XmlError::Transformation { .. } => ErrorKind::Transformation,
            XmlError::Resource(_) => ErrorKind::Resource,
        }
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        XmlError::Configuration {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn transformation(message: impl Into<String>) -> Self {
        XmlError::Transformation {
            message: message.into(),
            source: None,
        }
    }
}

/// Splits processor errors: a bad input document is malformed, anything else is a
/// failed transformation.
impl From<XsltError> for XmlError {
    fn from(e: XsltError) -> Self {
        match e {
            XsltError::Document(document) => XmlError::MalformedDocument(document),
            other => XmlError::Transformation {
                message: other.to_string(),
                source: Some(other),
            },
        }
    }
}

/// The single error type components hand back to the host. The cause stays reachable
/// through [`std::error::Error::source`].
#[derive(Error, Debug)]
#[error("{source}")]
pub struct PlatformError {
    #[from]
    source: XmlError,
}

impl PlatformError {
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }

    pub fn cause(&self) -> &XmlError {
        &self.source
    }

    pub fn into_cause(self) -> XmlError {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_platform_error_keeps_cause_and_kind() {
        let error = PlatformError::from(XmlError::MalformedDocument(DocumentError::Empty));
        assert_eq!(error.kind(), ErrorKind::MalformedDocument);
        assert_eq!(error.to_string(), "Malformed XML document: Document is empty");
        let source = error.source().unwrap();
        assert!(source.downcast_ref::<XmlError>().is_some());
    }

    #[test]
    fn test_xslt_errors_split_by_cause() {
        let malformed = XmlError::from(XsltError::Document(DocumentError::Empty));
        assert_eq!(malformed.kind(), ErrorKind::MalformedDocument);

        let failed = XmlError::from(XsltError::Serialization("boom".to_string()));
        assert_eq!(failed.kind(), ErrorKind::Transformation);
        assert!(failed.source().is_some());
    }
}
