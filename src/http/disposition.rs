//! `Content-Disposition` header parsing.

use crate::error::{Error, Result};

/// Parsed `Content-Disposition` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    /// Lowercased disposition type (`attachment`, `inline`, ...)
    pub disposition: String,
    /// Parameters in header order, names lowercased
    pub params: Vec<(String, String)>,
}

impl ContentDisposition {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// `filename*` when present, otherwise `filename`.
    pub fn filename(&self) -> Option<&str> {
        self.param("filename*").or_else(|| self.param("filename"))
    }
}

/// Parse a header such as `attachment; filename="GeoLite2-ASN-CSV_20220705.zip"`.
pub fn parse_content_disposition(value: &str) -> Result<ContentDisposition> {
    let mut rest = value.trim();
    let disposition_end = rest.find(';').unwrap_or(rest.len());
    let disposition = rest[..disposition_end].trim().to_lowercase();
    if disposition.is_empty() || !disposition.chars().all(is_token_char) {
        return Err(Error::Parse(format!("invalid content-disposition {:?}", value)));
    }
    rest = &rest[disposition_end..];

    let mut params = Vec::new();
    while let Some(stripped) = rest.strip_prefix(';') {
        rest = stripped.trim_start();
        if rest.is_empty() {
            break;
        }

        let eq = rest
            .find('=')
            .ok_or_else(|| Error::Parse(format!("parameter without value in {:?}", value)))?;
        let name = rest[..eq].trim().to_lowercase();
        if name.is_empty() || !name.chars().all(is_token_char) {
            return Err(Error::Parse(format!("invalid parameter name in {:?}", value)));
        }
        rest = rest[eq + 1..].trim_start();

        let (raw, remaining) = if let Some(quoted) = rest.strip_prefix('"') {
            read_quoted(quoted).ok_or_else(|| Error::Parse(format!("unterminated quote in {:?}", value)))?
        } else {
            let end = rest.find(';').unwrap_or(rest.len());
            (rest[..end].trim().to_string(), &rest[end..])
        };
        rest = remaining.trim_start();

        let decoded = if name.ends_with('*') {
            decode_ext_value(&raw).ok_or_else(|| Error::Parse(format!("invalid extended value in {:?}", value)))?
        } else {
            raw
        };
        params.push((name, decoded));
    }

    if !rest.is_empty() {
        return Err(Error::Parse(format!("trailing data in content-disposition {:?}", value)));
    }

    Ok(ContentDisposition { disposition, params })
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
}

/// Read a quoted-string body (opening quote already consumed).
fn read_quoted(input: &str) -> Option<(String, &str)> {
    let mut out = String::new();
    let mut chars = input.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                let (_, escaped) = chars.next()?;
                out.push(escaped);
            }
            '"' => return Some((out, &input[i + 1..])),
            _ => out.push(c),
        }
    }
    None
}

/// RFC 5987 `charset'lang'percent-encoded`.
fn decode_ext_value(raw: &str) -> Option<String> {
    let mut parts = raw.splitn(3, '\'');
    let charset = parts.next()?;
    let _lang = parts.next()?;
    let encoded = parts.next()?;
    if !charset.eq_ignore_ascii_case("utf-8") {
        return None;
    }

    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return None;
            }
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
