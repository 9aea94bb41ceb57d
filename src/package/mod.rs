//! OOXML package access: the zip container and the parts this tool edits.

pub mod content_types;
pub mod drawing;
#[cfg(test)]
pub(crate) mod fixture;
pub mod metrics;
pub mod relationships;

use std::collections::BTreeMap;
use std::fs;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::PackageError;

pub use content_types::CONTENT_TYPES_PART;
pub use drawing::{Anchor, AnchorKind, Drawing, Marker, PictureAnchor, PictureLayout};
pub use metrics::SheetMetrics;
pub use relationships::{Relationship, Relationships};

use relationships::{rels_part_for, resolve_target, source_part_for_rels};

const MEDIA_PREFIX: &str = "xl/media/";

/// A worksheet as listed in the workbook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRef {
    pub name: String,
    /// Worksheet part, e.g. `xl/worksheets/sheet1.xml`
    pub part: String,
}

/// An in-memory OOXML package
#[derive(Debug, Clone, Default)]
pub struct Package {
    parts: BTreeMap<String, Vec<u8>>,
}

impl Package {
    pub fn open(path: &Path) -> Result<Self, PackageError> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PackageError> {
        let mut zip = ZipArchive::new(Cursor::new(bytes))?;
        let mut parts = BTreeMap::new();

        for i in 0..zip.len() {
            let mut file = zip.by_index(i)?;
            if !file.is_file() {
                continue;
            }
            let name = file.name().trim_start_matches('/').to_string();
            let mut buf = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut buf)?;
            parts.insert(name, buf);
        }

        if !parts.contains_key(CONTENT_TYPES_PART) {
            return Err(PackageError::MissingPart(CONTENT_TYPES_PART.to_string()));
        }

        Ok(Self { parts })
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts.get(name).map(Vec::as_slice)
    }

    pub fn require_part(&self, name: &str) -> Result<&[u8], PackageError> {
        self.part(name)
            .ok_or_else(|| PackageError::MissingPart(name.to_string()))
    }

    /// A part decoded as UTF-8 text
    pub fn part_str(&self, name: &str) -> Result<&str, PackageError> {
        let bytes = self.require_part(name)?;
        std::str::from_utf8(bytes)
            .map_err(|err| PackageError::Invalid(format!("{} is not UTF-8: {}", name, err)))
    }

    pub fn has_part(&self, name: &str) -> bool {
        self.parts.contains_key(name)
    }

    pub fn set_part(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.parts.insert(name.into(), bytes);
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    /// Relationships declared by `part`; empty when it has no `.rels` part
    pub fn relationships(&self, part: &str) -> Result<Relationships, PackageError> {
        let rels_part = rels_part_for(part);
        match self.part(&rels_part) {
            Some(xml) => Relationships::parse(xml, &rels_part),
            None => Ok(Relationships::default()),
        }
    }

    pub fn set_relationships(&mut self, part: &str, rels: &Relationships) {
        self.set_part(rels_part_for(part), rels.to_xml().into_bytes());
    }

    /// The main workbook part
    pub fn workbook_part(&self) -> Result<String, PackageError> {
        let root = self.relationships("")?;
        Ok(root
            .first_of_type(relationships::RT_OFFICE_DOCUMENT)
            .map(|rel| resolve_target("", &rel.target))
            .unwrap_or_else(|| "xl/workbook.xml".to_string()))
    }

    /// Worksheets in workbook order
    pub fn sheets(&self) -> Result<Vec<SheetRef>, PackageError> {
        let workbook = self.workbook_part()?;
        let rels = self.relationships(&workbook)?;
        let xml = self.require_part(&workbook)?;

        let mut sheets = Vec::new();
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                    if e.local_name().as_ref() == b"sheet" =>
                {
                    let mut name = None;
                    let mut rel_id = None;
                    for attr in e.attributes() {
                        let attr = attr.map_err(|err| PackageError::xml(&workbook, err))?;
                        let value = attr
                            .unescape_value()
                            .map_err(|err| PackageError::xml(&workbook, err))?;
                        if attr.key.as_ref() == b"name" {
                            name = Some(value.into_owned());
                        } else if attr.key.local_name().as_ref() == b"id"
                            && attr.key.prefix().is_some()
                        {
                            rel_id = Some(value.into_owned());
                        }
                    }

                    let target = rel_id
                        .as_deref()
                        .and_then(|id| rels.get(id))
                        .filter(|rel| rel.rel_type == relationships::RT_WORKSHEET);
                    if let (Some(name), Some(rel)) = (name, target) {
                        sheets.push(SheetRef {
                            name,
                            part: resolve_target(&workbook, &rel.target),
                        });
                    }
                }
                Ok(Event::Eof) => break,
                Err(err) => return Err(PackageError::xml(&workbook, err)),
                _ => {}
            }
            buf.clear();
        }

        Ok(sheets)
    }

    /// The drawing part attached to a worksheet, if any
    pub fn drawing_part(&self, sheet_part: &str) -> Result<Option<String>, PackageError> {
        let rels = self.relationships(sheet_part)?;
        Ok(rels
            .first_of_type(relationships::RT_DRAWING)
            .filter(|rel| !rel.external)
            .map(|rel| resolve_target(sheet_part, &rel.target)))
    }

    /// Drop media parts no relationship points at; returns the removed names
    pub fn prune_unreferenced_media(&mut self) -> Result<Vec<String>, PackageError> {
        let mut referenced = std::collections::HashSet::new();
        for name in self.parts.keys().filter(|n| n.ends_with(".rels")) {
            let Some(source) = source_part_for_rels(name) else {
                continue;
            };
            let rels = Relationships::parse(&self.parts[name], name)?;
            for rel in rels.iter().filter(|r| !r.external) {
                referenced.insert(resolve_target(&source, &rel.target));
            }
        }

        let orphans: Vec<String> = self
            .parts
            .keys()
            .filter(|name| name.starts_with(MEDIA_PREFIX) && !referenced.contains(*name))
            .cloned()
            .collect();

        for name in &orphans {
            self.parts.remove(name);
        }

        if !orphans.is_empty() {
            let types = self.part_str(CONTENT_TYPES_PART)?;
            if let Some(updated) = content_types::remove_overrides(types, &orphans)? {
                self.set_part(CONTENT_TYPES_PART, updated.into_bytes());
            }
        }

        Ok(orphans)
    }

    /// Register a `<Default>` content type for a file extension
    pub fn ensure_content_type(&mut self, extension: &str, content_type: &str) -> Result<(), PackageError> {
        let types = self.part_str(CONTENT_TYPES_PART)?;
        if let Some(updated) = content_types::ensure_default(types, extension, content_type)? {
            self.set_part(CONTENT_TYPES_PART, updated.into_bytes());
        }
        Ok(())
    }

    /// A media part name not yet used, e.g. `xl/media/image7.png`
    pub fn unused_media_name(&self, extension: &str) -> String {
        let mut n = self
            .parts
            .keys()
            .filter(|name| name.starts_with(MEDIA_PREFIX))
            .count()
            + 1;
        loop {
            let candidate = format!("{}image{}.{}", MEDIA_PREFIX, n, extension);
            if !self.parts.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Write the package as a zip archive, content types first
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<W, PackageError> {
        let mut zip = ZipWriter::new(writer);

        let ordered = self
            .parts
            .iter()
            .filter(|(name, _)| name.as_str() == CONTENT_TYPES_PART)
            .chain(
                self.parts
                    .iter()
                    .filter(|(name, _)| name.as_str() != CONTENT_TYPES_PART),
            );

        for (name, bytes) in ordered {
            let method = if is_precompressed(name) {
                CompressionMethod::Stored
            } else {
                CompressionMethod::Deflated
            };
            let options = SimpleFileOptions::default().compression_method(method);
            zip.start_file(name.as_str(), options)?;
            zip.write_all(bytes)?;
        }

        Ok(zip.finish()?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, PackageError> {
        Ok(self.write_to(Cursor::new(Vec::new()))?.into_inner())
    }

    pub fn save(&self, path: &Path) -> Result<(), PackageError> {
        let bytes = self.to_bytes()?;
        fs::write(path, bytes)?;
        Ok(())
    }
}

/// Formats that gain nothing from deflate
fn is_precompressed(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    [".png", ".jpg", ".jpeg", ".gif", ".webp"]
        .iter()
        .any(|ext| lower.ends_with(ext))
}
