//! XSLT transformation of message payloads.

mod strategy;

pub use strategy::{DynamicResourceTransformer, StaticResourceTransformer, XsltTransformerStrategy};
