//! Single-pass decoder for multipart form bodies.
//!
//! The gateway hands us a fully decoded byte body plus the boundary token
//! from the `Content-Type` header. One forward pass splits the body into
//! parts: the part named `file` contributes the upload's filename and raw
//! bytes, every other part lands in a flat string field map. Any malformed
//! part aborts the whole decode with a `BadRequest`.

use std::collections::HashMap;

use bytes::{Bytes, BytesMut};

use shelf_http::error::AppError;

/// Field name under which the binary upload travels.
const FILE_FIELD: &str = "file";

/// Result of decoding a multipart body.
///
/// An absent `file` part leaves `file_name` empty; entry points that require
/// an upload must treat that as "no file supplied".
#[derive(Debug, Clone, Default)]
pub struct DecodedForm {
    pub file_name: String,
    pub file_bytes: Bytes,
    pub fields: HashMap<String, String>,
}

/// Extract the boundary token from a `Content-Type` header value of the form
/// `multipart/*; boundary=X`.
pub fn boundary_from_content_type(header: &str) -> Result<String, AppError> {
    let mut sections = header.split(';');

    let media_type = sections.next().unwrap_or_default().trim().to_ascii_lowercase();
    if media_type.is_empty() {
        return Err(AppError::bad_request("could not parse media type"));
    }
    if !media_type.starts_with("multipart/") {
        return Err(AppError::bad_request("media type is not multipart"));
    }

    for param in sections {
        let Some((key, value)) = param.split_once('=') else {
            return Err(AppError::bad_request("could not parse media type parameter"));
        };
        if key.trim().eq_ignore_ascii_case("boundary") {
            return Ok(value.trim().trim_matches('"').to_string());
        }
    }

    Err(AppError::bad_request("content type is missing a boundary"))
}

/// Decode a multipart body into the upload's filename, its bytes, and a
/// last-write-wins map of the remaining form fields.
pub fn decode(raw: &[u8], boundary: &str) -> Result<DecodedForm, AppError> {
    let mut reader = PartReader::new(raw, boundary)?;

    let mut file_name = String::new();
    let mut file_bytes = BytesMut::new();
    let mut fields = HashMap::new();

    while let Some(part) = reader.next_part()? {
        if part.name == FILE_FIELD {
            file_name = part.file_name.unwrap_or_default();
            file_bytes.extend_from_slice(part.body);
        } else {
            fields.insert(
                part.name,
                String::from_utf8_lossy(part.body).into_owned(),
            );
        }
    }

    Ok(DecodedForm {
        file_name,
        file_bytes: file_bytes.freeze(),
        fields,
    })
}

/// One decoded part: its form field name, declared filename, and body slice.
struct Part<'a> {
    name: String,
    file_name: Option<String>,
    body: &'a [u8],
}

/// Forward-only cursor over the delimiter-structured body.
struct PartReader<'a> {
    buf: &'a [u8],
    pos: usize,
    // "\r\n--{boundary}", the terminator of every part body
    terminator: Vec<u8>,
}

impl<'a> PartReader<'a> {
    fn new(buf: &'a [u8], boundary: &str) -> Result<Self, AppError> {
        if boundary.is_empty() {
            return Err(AppError::bad_request("multipart boundary is empty"));
        }

        let delimiter = format!("--{}", boundary).into_bytes();
        let Some(start) = find(buf, &delimiter, 0) else {
            return Err(AppError::bad_request("multipart body has no opening boundary"));
        };

        let mut terminator = b"\r\n".to_vec();
        terminator.extend_from_slice(&delimiter);

        Ok(Self {
            buf,
            pos: start + delimiter.len(),
            terminator,
        })
    }

    /// Advance to the next part, or `None` once the close delimiter is hit.
    fn next_part(&mut self) -> Result<Option<Part<'a>>, AppError> {
        if self.buf[self.pos..].starts_with(b"--") {
            return Ok(None);
        }

        // CRLF separating the delimiter line from the part headers.
        if self.buf[self.pos..].starts_with(b"\r\n") {
            self.pos += 2;
        }

        let Some(header_end) = find(self.buf, b"\r\n\r\n", self.pos) else {
            return Err(AppError::bad_request("part headers are not terminated"));
        };
        let headers = &self.buf[self.pos..header_end];
        let body_start = header_end + 4;

        let (name, file_name) = parse_disposition(headers)?;

        let Some(body_end) = find(self.buf, &self.terminator, body_start) else {
            return Err(AppError::bad_request("part body is not terminated"));
        };
        let body = &self.buf[body_start..body_end];
        self.pos = body_end + self.terminator.len();

        Ok(Some(Part {
            name,
            file_name,
            body,
        }))
    }
}

/// Pull the field name and optional filename out of a part's header block.
fn parse_disposition(headers: &[u8]) -> Result<(String, Option<String>), AppError> {
    for line in headers.split(|&b| b == b'\n') {
        let line = String::from_utf8_lossy(line);
        let line = line.trim_end_matches('\r');

        let Some((header_name, value)) = line.split_once(':') else {
            continue;
        };
        if !header_name.trim().eq_ignore_ascii_case("content-disposition") {
            continue;
        }

        let mut name = None;
        let mut file_name = None;
        // Skip the leading "form-data" token, then read name/filename params.
        for param in value.split(';').skip(1) {
            let Some((key, raw)) = param.split_once('=') else {
                continue;
            };
            let unquoted = raw.trim().trim_matches('"').to_string();
            match key.trim().to_ascii_lowercase().as_str() {
                "name" => name = Some(unquoted),
                "filename" => file_name = Some(unquoted),
                _ => {}
            }
        }

        return match name {
            Some(name) => Ok((name, file_name)),
            None => Err(AppError::bad_request("part is missing a field name")),
        };
    }

    Err(AppError::bad_request("part has no content-disposition header"))
}

/// First occurrence of `needle` in `haystack` at or after `from`.
fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|idx| idx + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDARY: &str = "xYzZY";

    fn field_part(name: &str, value: &str) -> Vec<u8> {
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        )
        .into_bytes()
    }

    fn file_part(file_name: &str, content: &[u8]) -> Vec<u8> {
        let mut part = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        part.extend_from_slice(content);
        part.extend_from_slice(b"\r\n");
        part
    }

    fn close(mut body: Vec<u8>) -> Vec<u8> {
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    #[test]
    fn boundary_is_extracted_from_header() {
        let boundary =
            boundary_from_content_type("multipart/form-data; boundary=xYzZY").unwrap();
        assert_eq!(boundary, "xYzZY");
    }

    #[test]
    fn quoted_boundary_is_unquoted() {
        let boundary =
            boundary_from_content_type("multipart/mixed; boundary=\"abc 123\"").unwrap();
        assert_eq!(boundary, "abc 123");
    }

    #[test]
    fn non_multipart_content_type_is_rejected() {
        let err = boundary_from_content_type("application/json").unwrap_err();
        assert!(matches!(err, AppError::BadRequest { .. }));
    }

    #[test]
    fn missing_boundary_parameter_is_rejected() {
        let err = boundary_from_content_type("multipart/form-data").unwrap_err();
        assert!(matches!(err, AppError::BadRequest { .. }));
    }

    #[test]
    fn empty_header_is_rejected() {
        assert!(boundary_from_content_type("").is_err());
    }

    #[test]
    fn decodes_file_and_field_parts() {
        let mut body = file_part("cover.png", &[0xFF, 0xD8]);
        body.extend(field_part("name", "Dune"));
        let body = close(body);

        let form = decode(&body, BOUNDARY).unwrap();
        assert_eq!(form.file_name, "cover.png");
        assert_eq!(form.file_bytes.as_ref(), &[0xFF, 0xD8]);
        assert_eq!(form.fields.len(), 1);
        assert_eq!(form.fields["name"], "Dune");
    }

    #[test]
    fn repeated_fields_are_last_write_wins() {
        let mut body = field_part("name", "first");
        body.extend(field_part("name", "second"));
        let body = close(body);

        let form = decode(&body, BOUNDARY).unwrap();
        assert_eq!(form.fields["name"], "second");
    }

    #[test]
    fn multiple_file_parts_accumulate() {
        let mut body = file_part("a.bin", &[1, 2]);
        body.extend(file_part("b.bin", &[3, 4]));
        let body = close(body);

        let form = decode(&body, BOUNDARY).unwrap();
        // Filename follows the last file part, bytes accumulate.
        assert_eq!(form.file_name, "b.bin");
        assert_eq!(form.file_bytes.as_ref(), &[1, 2, 3, 4]);
    }

    #[test]
    fn absent_file_part_yields_empty_name_and_buffer() {
        let body = close(field_part("name", "Dune"));

        let form = decode(&body, BOUNDARY).unwrap();
        assert!(form.file_name.is_empty());
        assert!(form.file_bytes.is_empty());
    }

    #[test]
    fn binary_file_bytes_survive_crlf_lookalikes() {
        let content = b"\r\n--not-the-boundary\r\n\x00\x01";
        let body = close(file_part("raw.bin", content));

        let form = decode(&body, BOUNDARY).unwrap();
        assert_eq!(form.file_bytes.as_ref(), content.as_slice());
    }

    #[test]
    fn body_without_opening_boundary_is_rejected() {
        let err = decode(b"no boundary here", BOUNDARY).unwrap_err();
        assert!(matches!(err, AppError::BadRequest { .. }));
    }

    #[test]
    fn unterminated_part_is_rejected() {
        let body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nDune"
        );
        let err = decode(body.as_bytes(), BOUNDARY).unwrap_err();
        assert!(matches!(err, AppError::BadRequest { .. }));
    }

    #[test]
    fn part_without_field_name_is_rejected() {
        let body = close(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data\r\n\r\nDune\r\n").into_bytes(),
        );
        let err = decode(&body, BOUNDARY).unwrap_err();
        assert!(matches!(err, AppError::BadRequest { .. }));
    }

    #[test]
    fn empty_boundary_is_rejected() {
        assert!(decode(b"----\r\n", "").is_err());
    }
}
