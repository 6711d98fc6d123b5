//! `multipart/form-data` parser.
//!
//! Works on the already-collected body bytes; the size cap is enforced while
//! collecting, before this parser sees anything.

use std::collections::HashMap;

use bytes::Bytes;

use crate::error::BodyError;

/// A parsed `multipart/form-data` submission.
#[derive(Debug, Default)]
pub struct MultipartForm {
    /// Text fields, name → values in submission order.
    pub fields: HashMap<String, Vec<String>>,
    /// File fields, name → files in submission order.
    pub files: HashMap<String, Vec<FilePart>>,
}

/// One uploaded file.
#[derive(Clone, Debug)]
pub struct FilePart {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl MultipartForm {
    /// First value of a text field.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.fields.get(name)?.first().map(String::as_str)
    }

    /// First file uploaded under `name`.
    pub fn file(&self, name: &str) -> Option<&FilePart> {
        self.files.get(name)?.first()
    }
}

/// Parse a multipart body delimited by `boundary`.
pub(crate) fn parse(body: &Bytes, boundary: &str) -> Result<MultipartForm, BodyError> {
    let delimiter = format!("--{boundary}");
    let mut form = MultipartForm::default();

    for (start, end) in split_parts(body, delimiter.as_bytes())? {
        let part = &body[start..end];
        let Some(sep) = find_bytes(part, b"\r\n\r\n") else {
            return Err(BodyError::Multipart("part without header terminator".to_owned()));
        };
        let headers = String::from_utf8_lossy(&part[..sep]);
        let data = body.slice(start + sep + 4..end);

        let disposition = parse_content_disposition(&headers);
        let Some(name) = disposition.name else {
            continue;
        };

        match disposition.filename {
            Some(filename) => form.files.entry(name).or_default().push(FilePart {
                filename,
                content_type: part_content_type(&headers),
                data,
            }),
            None => form
                .fields
                .entry(name)
                .or_default()
                .push(String::from_utf8_lossy(&data).into_owned()),
        }
    }

    Ok(form)
}

/// Byte ranges of each part's content (headers included, framing CRLFs excluded).
fn split_parts(body: &[u8], delimiter: &[u8]) -> Result<Vec<(usize, usize)>, BodyError> {
    let Some(first) = find_bytes(body, delimiter) else {
        return Err(BodyError::Multipart("boundary not found".to_owned()));
    };

    let mut parts = Vec::new();
    let mut pos = first + delimiter.len();

    loop {
        let rest = &body[pos..];
        if rest.starts_with(b"--") {
            return Ok(parts);
        }
        let Some(rest) = rest.strip_prefix(b"\r\n") else {
            return Err(BodyError::Multipart("malformed boundary line".to_owned()));
        };
        let start = body.len() - rest.len();

        let Some(next) = find_bytes(rest, delimiter) else {
            return Err(BodyError::Multipart("missing closing boundary".to_owned()));
        };
        // The CRLF before a delimiter belongs to the framing, not the part.
        let mut end = start + next;
        if next >= 2 && body[..end].ends_with(b"\r\n") {
            end -= 2;
        }
        parts.push((start, end));
        pos = start + next + delimiter.len();
    }
}

struct ContentDisposition {
    name: Option<String>,
    filename: Option<String>,
}

fn parse_content_disposition(headers: &str) -> ContentDisposition {
    let mut disposition = ContentDisposition { name: None, filename: None };

    for line in headers.split("\r\n") {
        if !line.to_ascii_lowercase().starts_with("content-disposition:") {
            continue;
        }
        for param in line.split(';').skip(1) {
            let Some((key, value)) = param.trim().split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"').to_owned();
            match key.trim() {
                "name" => disposition.name = Some(value),
                "filename" => disposition.filename = Some(value),
                _ => {}
            }
        }
    }

    disposition
}

fn part_content_type(headers: &str) -> Option<String> {
    headers.split("\r\n").find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.trim()
            .eq_ignore_ascii_case("content-type")
            .then(|| value.trim().to_owned())
    })
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
