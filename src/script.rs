//! Dynamic values and the script engine that resolves them.

use crate::message::{FlowContext, Message};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A configuration string that is either a fixed value or, when written as `#[...]`,
/// a script template resolved per message by a [`ScriptEngineService`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct DynamicString {
    value: String,
}

impl DynamicString {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// The text as configured, including the `#[` `]` markers of a template.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_dynamic(&self) -> bool {
        let trimmed = self.value.trim();
        trimmed.starts_with("#[") && trimmed.ends_with(']')
    }

    /// The script between the markers, or `None` for a fixed value.
    pub fn script(&self) -> Option<&str> {
        let trimmed = self.value.trim();
        trimmed.strip_prefix("#[")?.strip_suffix(']')
    }

    pub fn is_blank(&self) -> bool {
        self.value.trim().is_empty()
    }
}

impl From<String> for DynamicString {
    fn from(value: String) -> Self {
        Self { value }
    }
}

impl From<&str> for DynamicString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<DynamicString> for String {
    fn from(value: DynamicString) -> Self {
        value.value
    }
}

impl fmt::Display for DynamicString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Resolves dynamic templates. Implemented by the host; the call blocks.
pub trait ScriptEngineService: Send + Sync + fmt::Debug {
    /// The string the template evaluates to, or `None` when it yields nothing.
    fn evaluate(
        &self,
        template: &DynamicString,
        context: &FlowContext,
        message: &Message,
    ) -> Option<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dynamic_markers() {
        let dynamic = DynamicString::from("#['//book/title']");
        assert!(dynamic.is_dynamic());
        assert_eq!(dynamic.script(), Some("'//book/title'"));

        let fixed = DynamicString::from("//book/title");
        assert!(!fixed.is_dynamic());
        assert_eq!(fixed.script(), None);
    }

    #[test]
    fn test_deserializes_from_plain_string() {
        let parsed: DynamicString = serde_json::from_str(r##""#[flow.name]""##).unwrap();
        assert!(parsed.is_dynamic());
        assert_eq!(serde_json::to_string(&parsed).unwrap(), r##""#[flow.name]""##);
    }
}
