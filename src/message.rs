//! Minimal stand-ins for the host's message and flow types.

use crate::xpath::XPathResult;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

/// The content a message carries.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Payload {
    #[default]
    Empty,
    Text(String),
    Binary(Vec<u8>),
    /// The typed result of an XPath evaluation.
    XPath(XPathResult),
}

impl Payload {
    /// The payload as bytes for parsing. Typed values are written in their string form.
    pub fn to_bytes(&self) -> Cow<'_, [u8]> {
        match self {
            Payload::Empty => Cow::Borrowed(&[]),
            Payload::Text(text) => Cow::Borrowed(text.as_bytes()),
            Payload::Binary(bytes) => Cow::Borrowed(bytes),
            Payload::XPath(result) => Cow::Owned(result.to_string().into_bytes()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Payload::Empty)
    }
}

/// String attributes travelling with a message, ordered by key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageAttributes(BTreeMap<String, String>);

impl MessageAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Message {
    payload: Payload,
    attributes: MessageAttributes,
}

impl Message {
    pub fn new(payload: Payload, attributes: MessageAttributes) -> Self {
        Self {
            payload,
            attributes,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Payload::Text(text.into()), MessageAttributes::new())
    }

    pub fn binary(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(Payload::Binary(bytes.into()), MessageAttributes::new())
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key, value);
        self
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn attributes(&self) -> &MessageAttributes {
        &self.attributes
    }

    pub fn into_parts(self) -> (Payload, MessageAttributes) {
        (self.payload, self.attributes)
    }
}

/// Per-flow state shared by the components handling one message.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlowContext {
    flow_id: String,
    variables: HashMap<String, String>,
}

impl FlowContext {
    pub fn new(flow_id: impl Into<String>) -> Self {
        Self {
            flow_id: flow_id.into(),
            variables: HashMap::new(),
        }
    }

    pub fn flow_id(&self) -> &str {
        &self.flow_id
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }
}
