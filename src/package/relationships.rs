//! `.rels` parts: parsing, editing and target resolution.

use std::fmt::Write as _;

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::PackageError;

pub const RT_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
pub const RT_WORKSHEET: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
pub const RT_DRAWING: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/drawing";
pub const RT_IMAGE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relationships {
    items: Vec<Relationship>,
}

impl Relationships {
    pub fn parse(xml: &[u8], part: &str) -> Result<Self, PackageError> {
        let mut items = Vec::new();
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                    if e.local_name().as_ref() == b"Relationship" =>
                {
                    let mut id = None;
                    let mut rel_type = None;
                    let mut target = None;
                    let mut external = false;

                    for attr in e.attributes() {
                        let attr = attr.map_err(|err| PackageError::xml(part, err))?;
                        let value = attr
                            .unescape_value()
                            .map_err(|err| PackageError::xml(part, err))?;
                        match attr.key.as_ref() {
                            b"Id" => id = Some(value.to_string()),
                            b"Type" => rel_type = Some(value.to_string()),
                            b"Target" => target = Some(value.to_string()),
                            b"TargetMode" => external = value == "External",
                            _ => {}
                        }
                    }

                    if let (Some(id), Some(rel_type), Some(target)) = (id, rel_type, target) {
                        items.push(Relationship {
                            id,
                            rel_type,
                            target,
                            external,
                        });
                    }
                }
                Ok(Event::Eof) => break,
                Err(err) => return Err(PackageError::xml(part, err)),
                _ => {}
            }
            buf.clear();
        }

        Ok(Self { items })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.items.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.items.iter().find(|r| r.id == id)
    }

    pub fn first_of_type(&self, rel_type: &str) -> Option<&Relationship> {
        self.items.iter().find(|r| r.rel_type == rel_type)
    }

    /// Add an internal relationship under the lowest free `rIdN`
    pub fn add(&mut self, rel_type: &str, target: &str) -> String {
        let mut n = 1;
        let id = loop {
            let candidate = format!("rId{}", n);
            if self.get(&candidate).is_none() {
                break candidate;
            }
            n += 1;
        };

        self.items.push(Relationship {
            id: id.clone(),
            rel_type: rel_type.to_string(),
            target: target.to_string(),
            external: false,
        });
        id
    }

    pub fn remove(&mut self, id: &str) -> Option<Relationship> {
        let index = self.items.iter().position(|r| r.id == id)?;
        Some(self.items.remove(index))
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(256 + self.items.len() * 160);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        let _ = write!(xml, r#"<Relationships xmlns="{}">"#, RELATIONSHIPS_NS);
        for rel in &self.items {
            let _ = write!(
                xml,
                r#"<Relationship Id="{}" Type="{}" Target="{}""#,
                escape(rel.id.as_str()),
                escape(rel.rel_type.as_str()),
                escape(rel.target.as_str())
            );
            if rel.external {
                xml.push_str(r#" TargetMode="External""#);
            }
            xml.push_str("/>");
        }
        xml.push_str("</Relationships>");
        xml
    }
}

/// The `.rels` part holding relationships of `part`
pub fn rels_part_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, name)) => format!("{}/_rels/{}.rels", dir, name),
        None => format!("_rels/{}.rels", part),
    }
}

/// The source part a `.rels` part belongs to; the package root is `""`
pub fn source_part_for_rels(rels_part: &str) -> Option<String> {
    let name = rels_part.strip_suffix(".rels")?;
    let (dir, file) = match name.rsplit_once("_rels/") {
        Some((dir, file)) => (dir, file),
        None => return None,
    };
    if file.contains('/') {
        return None;
    }
    Some(format!("{}{}", dir, file))
}

/// Resolve a relationship target against the part that declares it
pub fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return normalize(absolute.split('/'));
    }

    let base = source_part
        .rsplit_once('/')
        .map(|(dir, _)| dir)
        .unwrap_or("");
    normalize(base.split('/').chain(target.split('/')))
}

fn normalize<'a>(segments: impl Iterator<Item = &'a str>) -> String {
    let mut out: Vec<&str> = Vec::new();
    for segment in segments {
        match segment {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            s => out.push(s),
        }
    }
    out.join("/")
}

/// Relative target from `source_part` to `target_part`
pub fn relative_target(source_part: &str, target_part: &str) -> String {
    let source_dir: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    let target: Vec<&str> = target_part.split('/').collect();

    let common = source_dir
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();
    // Never consume the file name of the target as a shared directory
    let common = common.min(target.len().saturating_sub(1));

    let mut parts: Vec<&str> = vec![".."; source_dir.len() - common];
    parts.extend_from_slice(&target[common..]);
    parts.join("/")
}
