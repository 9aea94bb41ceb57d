//! `[Content_Types].xml` edits.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::PackageError;

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// MIME type for a picture file extension the tool can embed
pub fn image_content_type(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Ensure a `<Default>` entry exists for `extension`.
///
/// Returns the rewritten XML, or `None` when the entry is already present.
pub fn ensure_default(
    xml: &str,
    extension: &str,
    content_type: &str,
) -> Result<Option<String>, PackageError> {
    let mut reader = Reader::from_str(xml);
    let mut insert_at = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"Types" => {
                insert_at = Some(reader.buffer_position() as usize);
            }
            Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"Default" => {
                for attr in e.attributes() {
                    let attr = attr.map_err(|err| PackageError::xml(CONTENT_TYPES_PART, err))?;
                    if attr.key.as_ref() == b"Extension" {
                        let value = attr
                            .unescape_value()
                            .map_err(|err| PackageError::xml(CONTENT_TYPES_PART, err))?;
                        if value.eq_ignore_ascii_case(extension) {
                            return Ok(None);
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(PackageError::xml(CONTENT_TYPES_PART, err)),
            _ => {}
        }
    }

    let insert_at = insert_at.ok_or_else(|| {
        PackageError::Invalid("content types part has no Types element".to_string())
    })?;

    let mut out = String::with_capacity(xml.len() + 96);
    out.push_str(&xml[..insert_at]);
    out.push_str(&format!(
        r#"<Default Extension="{}" ContentType="{}"/>"#,
        extension, content_type
    ));
    out.push_str(&xml[insert_at..]);
    Ok(Some(out))
}

/// Drop `<Override>` entries whose part name is in `removed`.
///
/// Returns the rewritten XML, or `None` when nothing matched.
pub fn remove_overrides(xml: &str, removed: &[String]) -> Result<Option<String>, PackageError> {
    let mut reader = Reader::from_str(xml);
    let mut cuts: Vec<(usize, usize)> = Vec::new();

    loop {
        let before = reader.buffer_position() as usize;
        match reader.read_event() {
            Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"Override" => {
                for attr in e.attributes() {
                    let attr = attr.map_err(|err| PackageError::xml(CONTENT_TYPES_PART, err))?;
                    if attr.key.as_ref() == b"PartName" {
                        let value = attr
                            .unescape_value()
                            .map_err(|err| PackageError::xml(CONTENT_TYPES_PART, err))?;
                        let name = value.trim_start_matches('/');
                        if removed.iter().any(|r| r == name) {
                            cuts.push((before, reader.buffer_position() as usize));
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(PackageError::xml(CONTENT_TYPES_PART, err)),
            _ => {}
        }
    }

    if cuts.is_empty() {
        return Ok(None);
    }

    let mut out = String::with_capacity(xml.len());
    let mut last = 0;
    for (start, end) in cuts {
        out.push_str(&xml[last..start]);
        last = end;
    }
    out.push_str(&xml[last..]);
    Ok(Some(out))
}
