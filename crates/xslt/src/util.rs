use crate::ast::{AttributeValueTemplate, AvtPart};
use xmlbridge_xpath::{Expression, XPathCompiler, XPathError};

/// Splits an attribute value template into literal text and `{expression}` parts.
/// `{{` and `}}` stand for literal braces. Braces inside quoted strings in an expression
/// do not end it.
pub(crate) fn parse_avt(
    text: &str,
    compiler: &XPathCompiler,
) -> Result<AttributeValueTemplate, AvtError> {
    if !text.contains(['{', '}']) {
        return Ok(AttributeValueTemplate::Static(text.to_string()));
    }

    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '}' => return Err(AvtError::Syntax(format!("Unmatched '}}' in '{}'", text))),
            '{' => {
                let mut source = String::new();
                let mut quote: Option<char> = None;
                let mut closed = false;
                for c in chars.by_ref() {
                    match (c, quote) {
                        ('}', None) => {
                            closed = true;
                            break;
                        }
                        ('"' | '\'', None) => quote = Some(c),
                        (q, Some(open)) if q == open => quote = None,
                        _ => {}
                    }
                    source.push(c);
                }
                if !closed {
                    return Err(AvtError::Syntax(format!("Unclosed '{{' in '{}'", text)));
                }
                if !literal.is_empty() {
                    parts.push(AvtPart::Static(std::mem::take(&mut literal)));
                }
                parts.push(AvtPart::Dynamic(compile_expression(&source, compiler)?));
            }
            other => literal.push(other),
        }
    }
    if !literal.is_empty() {
        parts.push(AvtPart::Static(literal));
    }
    Ok(AttributeValueTemplate::Dynamic(parts))
}

fn compile_expression(source: &str, compiler: &XPathCompiler) -> Result<Expression, AvtError> {
    let mut expression = xmlbridge_xpath::parse_expression(source)
        .map_err(|e| AvtError::XPath(source.to_string(), e))?;
    compiler
        .resolve(&mut expression)
        .map_err(|e| AvtError::XPath(source.to_string(), e))?;
    Ok(expression)
}

#[derive(Debug)]
pub(crate) enum AvtError {
    Syntax(String),
    XPath(String, XPathError),
}

/// Splits `prefix:local` into its parts.
pub(crate) fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, qname),
    }
}
