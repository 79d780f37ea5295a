//! Turns raw XML bytes into text.
//!
//! The encoding is taken from, in order: a byte order mark, the UTF-16 form of `<?` at
//! the start of the input, the `encoding` pseudo-attribute of the XML declaration, and
//! finally the UTF-8 default. Labels are resolved the way `encoding_rs` resolves them,
//! so `ISO-8859-1` decodes as windows-1252.

use crate::error::DocumentError;
use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};
use std::borrow::Cow;

/// How far into the input the XML declaration is looked for.
const DECLARATION_LIMIT: usize = 1024;

/// Decodes `bytes` as an XML document. Whitespace-only input is [`DocumentError::Empty`].
pub fn decode(bytes: &[u8]) -> Result<Cow<'_, str>, DocumentError> {
    let (encoding, bom_len) = detect(bytes)?;
    let body = &bytes[bom_len..];

    let text = if encoding == UTF_8 {
        Cow::Borrowed(std::str::from_utf8(body)?)
    } else {
        encoding
            .decode_without_bom_handling_and_without_replacement(body)
            .ok_or_else(|| DocumentError::InvalidEncoding(encoding.name()))?
    };
    if text.trim().is_empty() {
        return Err(DocumentError::Empty);
    }
    if encoding != UTF_8 {
        log::debug!("Decoded {} bytes of {} input", bytes.len(), encoding.name());
    }
    Ok(text)
}

fn detect(bytes: &[u8]) -> Result<(&'static Encoding, usize), DocumentError> {
    if let Some(found) = Encoding::for_bom(bytes) {
        return Ok(found);
    }
    match bytes {
        [0x3C, 0x00, 0x3F, 0x00, ..] => return Ok((UTF_16LE, 0)),
        [0x00, 0x3C, 0x00, 0x3F, ..] => return Ok((UTF_16BE, 0)),
        _ => {}
    }
    match declared_label(bytes) {
        Some(label) => Encoding::for_label(label.as_bytes())
            // A UTF-16 label on single-byte input cannot be true; read it as UTF-8.
            .map(|encoding| (encoding.output_encoding(), 0))
            .ok_or_else(|| DocumentError::UnsupportedEncoding(label.to_string())),
        None => Ok((UTF_8, 0)),
    }
}

/// The value of `encoding="..."` in a leading `<?xml ... ?>` declaration.
fn declared_label(bytes: &[u8]) -> Option<&str> {
    if !bytes.starts_with(b"<?xml") {
        return None;
    }
    let window = &bytes[..bytes.len().min(DECLARATION_LIMIT)];
    let end = window.windows(2).position(|pair| pair == b"?>")?;
    let declaration = std::str::from_utf8(&window[..end]).ok()?;

    let rest = &declaration[declaration.find("encoding")? + "encoding".len()..];
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &rest[1..];
    Some(&value[..value.find(quote)?])
}
