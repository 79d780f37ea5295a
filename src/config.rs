//! Component configuration, deserialized from the host's JSON definitions.

use crate::error::XmlError;
use crate::script::DynamicString;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parses a component definition, reporting bad JSON as a configuration error.
pub fn from_json<T: DeserializeOwned>(json: &str) -> Result<T, XmlError> {
    serde_json::from_str(json)
        .map_err(|e| XmlError::configuration(format!("invalid component configuration: {}", e)))
}

/// Namespace prefixes available to XPath expressions. Later bindings of the same prefix
/// replace earlier ones.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XPathConfiguration {
    #[serde(default)]
    prefix_namespaces: BTreeMap<String, String>,
}

impl XPathConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, P, U>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (P, U)>,
        P: Into<String>,
        U: Into<String>,
    {
        let mut config = Self::new();
        for (prefix, uri) in pairs {
            config.bind(prefix, uri);
        }
        config
    }

    pub fn bind(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        self.prefix_namespaces.insert(prefix.into(), uri.into());
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefix_namespaces
            .iter()
            .map(|(p, u)| (p.as_str(), u.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.prefix_namespaces.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XPathComponentConfig {
    pub expression: DynamicString,
    #[serde(default)]
    pub configuration: Option<XPathConfiguration>,
}

/// A stylesheet given as a resource path fixed at configuration time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XsltComponentConfig {
    pub style_sheet_file: String,
}

/// A stylesheet file name that may be computed per message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XsltFileComponentConfig {
    pub file_name: DynamicString,
}
