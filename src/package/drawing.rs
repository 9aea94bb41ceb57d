//! SpreadsheetML drawing parts (`xl/drawings/drawingN.xml`).
//!
//! A drawing is kept as its root start tag plus the raw XML of each top-level
//! anchor, so anchors the tool does not touch are written back verbatim.

use std::fmt::Write as _;

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::PackageError;
use crate::model::{emu_to_points, CellAnchor, Size};

use super::metrics::SheetMetrics;

const DRAWINGML_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const RELATIONSHIPS_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorKind {
    TwoCell,
    OneCell,
    Absolute,
    /// Anything else at the top level, e.g. `mc:AlternateContent`
    Other,
}

/// A `from` / `to` cell marker, offsets in EMU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Marker {
    pub col: u32,
    pub col_off: i64,
    pub row: u32,
    pub row_off: i64,
}

impl Marker {
    pub fn to_cell_anchor(self) -> CellAnchor {
        CellAnchor::new(
            self.col,
            self.row,
            emu_to_points(self.col_off),
            emu_to_points(self.row_off),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    /// Unique within the drawing for the lifetime of the parsed value
    pub key: u32,
    pub kind: AnchorKind,
    /// `editAs` of a two-cell anchor
    pub edit_as: Option<String>,
    pub from: Option<Marker>,
    pub to: Option<Marker>,
    /// `absoluteAnchor` position, EMU
    pub pos: Option<(i64, i64)>,
    /// Anchor-level extent, EMU
    pub ext: Option<(i64, i64)>,
    /// Picture transform offset and extent, EMU
    pub xfrm_off: Option<(i64, i64)>,
    pub xfrm_ext: Option<(i64, i64)>,
    pub is_picture: bool,
    /// Relationship id of the embedded picture
    pub embed: Option<String>,
    pub shape_id: Option<u32>,
    pub name: Option<String>,
    raw: String,
}

impl Anchor {
    fn parse(raw: &str, key: u32, part: &str) -> Result<Self, PackageError> {
        let mut anchor = Anchor {
            key,
            kind: AnchorKind::Other,
            edit_as: None,
            from: None,
            to: None,
            pos: None,
            ext: None,
            xfrm_off: None,
            xfrm_ext: None,
            is_picture: false,
            embed: None,
            shape_id: None,
            name: None,
            raw: raw.to_string(),
        };

        let mut reader = Reader::from_str(raw);
        reader.config_mut().trim_text(true);
        let mut path: Vec<Vec<u8>> = Vec::new();
        let mut marker = Marker::default();

        loop {
            let event = reader.read_event().map_err(|err| PackageError::xml(part, err))?;
            match event {
                Event::Start(ref e) => {
                    anchor.visit(e, &path, part)?;
                    path.push(e.local_name().as_ref().to_vec());
                }
                Event::Empty(ref e) => anchor.visit(e, &path, part)?,
                Event::Text(ref t) => {
                    let text = String::from_utf8_lossy(t);
                    let text = text.trim();
                    if let [.., parent, field] = path.as_slice() {
                        if parent.as_slice() == b"from" || parent.as_slice() == b"to" {
                            match field.as_slice() {
                                b"col" => marker.col = text.parse().unwrap_or(0),
                                b"row" => marker.row = text.parse().unwrap_or(0),
                                b"colOff" => marker.col_off = text.parse().unwrap_or(0),
                                b"rowOff" => marker.row_off = text.parse().unwrap_or(0),
                                _ => {}
                            }
                        }
                    }
                }
                Event::End(ref e) => {
                    match e.local_name().as_ref() {
                        b"from" if path.len() == 2 => anchor.from = Some(marker),
                        b"to" if path.len() == 2 => anchor.to = Some(marker),
                        _ => {}
                    }
                    if matches!(e.local_name().as_ref(), b"from" | b"to") {
                        marker = Marker::default();
                    }
                    path.pop();
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(anchor)
    }

    fn visit(&mut self, e: &BytesStart<'_>, path: &[Vec<u8>], part: &str) -> Result<(), PackageError> {
        let name = e.local_name();
        let depth = path.len();

        if depth == 0 {
            self.kind = match name.as_ref() {
                b"twoCellAnchor" => AnchorKind::TwoCell,
                b"oneCellAnchor" => AnchorKind::OneCell,
                b"absoluteAnchor" => AnchorKind::Absolute,
                _ => AnchorKind::Other,
            };
            if self.kind == AnchorKind::TwoCell {
                for attr in e.attributes() {
                    let attr = attr.map_err(|err| PackageError::xml(part, err))?;
                    if attr.key.as_ref() == b"editAs" {
                        let value = attr
                            .unescape_value()
                            .map_err(|err| PackageError::xml(part, err))?;
                        self.edit_as = Some(value.into_owned());
                    }
                }
            }
            return Ok(());
        }

        let inside_xfrm = path.last().map(|p| p.as_slice() == b"xfrm").unwrap_or(false);
        match name.as_ref() {
            b"pic" if depth == 1 => self.is_picture = true,
            b"pos" if depth == 1 => self.pos = Some(pair(e, b"x", b"y", part)?),
            b"ext" if depth == 1 => self.ext = Some(pair(e, b"cx", b"cy", part)?),
            b"off" if inside_xfrm && self.is_picture => {
                self.xfrm_off = Some(pair(e, b"x", b"y", part)?)
            }
            b"ext" if inside_xfrm && self.is_picture => {
                self.xfrm_ext = Some(pair(e, b"cx", b"cy", part)?)
            }
            b"cNvPr" if self.shape_id.is_none() => {
                for attr in e.attributes() {
                    let attr = attr.map_err(|err| PackageError::xml(part, err))?;
                    let value = attr
                        .unescape_value()
                        .map_err(|err| PackageError::xml(part, err))?;
                    match attr.key.as_ref() {
                        b"id" => self.shape_id = value.trim().parse().ok(),
                        b"name" => self.name = Some(value.into_owned()),
                        _ => {}
                    }
                }
            }
            b"blip" if self.is_picture => {
                for attr in e.attributes() {
                    let attr = attr.map_err(|err| PackageError::xml(part, err))?;
                    if attr.key.local_name().as_ref() == b"embed" {
                        let value = attr
                            .unescape_value()
                            .map_err(|err| PackageError::xml(part, err))?;
                        self.embed = Some(value.into_owned());
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Picture anchor with an embedded (not linked) image
    pub fn is_embedded_picture(&self) -> bool {
        self.is_picture && self.kind != AnchorKind::Other && self.embed.is_some()
    }

    /// Anchor cell of a cell-anchored shape
    pub fn cell_anchor(&self) -> Option<CellAnchor> {
        match self.kind {
            AnchorKind::TwoCell | AnchorKind::OneCell => self.from.map(Marker::to_cell_anchor),
            _ => None,
        }
    }

    /// Absolute position and size in points
    pub fn bounds(&self, metrics: &SheetMetrics) -> Option<(f64, f64, Size)> {
        let (left, top) = match self.kind {
            AnchorKind::Absolute => {
                let (x, y) = self.pos.or(self.xfrm_off)?;
                (emu_to_points(x), emu_to_points(y))
            }
            AnchorKind::OneCell | AnchorKind::TwoCell => {
                metrics.position_of(&self.from?.to_cell_anchor())
            }
            AnchorKind::Other => return None,
        };

        let size = match (self.kind, self.to) {
            (AnchorKind::TwoCell, Some(to)) => {
                let (right, bottom) = metrics.position_of(&to.to_cell_anchor());
                Size::new((right - left).max(0.0), (bottom - top).max(0.0))
            }
            _ => {
                let (cx, cy) = self.ext.or(self.xfrm_ext)?;
                Size::new(emu_to_points(cx), emu_to_points(cy))
            }
        };

        Some((left, top, size))
    }
}

fn pair(e: &BytesStart<'_>, a: &[u8], b: &[u8], part: &str) -> Result<(i64, i64), PackageError> {
    let mut first = 0;
    let mut second = 0;
    for attr in e.attributes() {
        let attr = attr.map_err(|err| PackageError::xml(part, err))?;
        let value = attr
            .unescape_value()
            .map_err(|err| PackageError::xml(part, err))?;
        let key = attr.key.as_ref();
        if key == a {
            first = value.trim().parse().unwrap_or(0);
        } else if key == b {
            second = value.trim().parse().unwrap_or(0);
        }
    }
    Ok((first, second))
}

/// Which anchor element a new picture is written as
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PictureLayout {
    #[default]
    OneCell,
    TwoCell {
        to: Marker,
        edit_as: Option<String>,
    },
    /// Positioned by `off` alone
    Absolute,
}

/// Everything needed to write a new picture anchor
#[derive(Debug, Clone, PartialEq)]
pub struct PictureAnchor {
    pub layout: PictureLayout,
    pub from: Marker,
    /// Absolute offset in EMU, mirrored into the picture transform
    pub off: (i64, i64),
    pub ext: (i64, i64),
    pub shape_id: u32,
    pub name: String,
    pub embed: String,
}

fn write_marker(xml: &mut String, p: &str, tag: &str, marker: Marker) -> std::fmt::Result {
    write!(
        xml,
        "<{p}{tag}><{p}col>{}</{p}col><{p}colOff>{}</{p}colOff><{p}row>{}</{p}row><{p}rowOff>{}</{p}rowOff></{p}{tag}>",
        marker.col, marker.col_off, marker.row, marker.row_off
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct Drawing {
    part: String,
    /// Root element qualified name, e.g. `xdr:wsDr`
    root: String,
    /// Text up to and including the root start tag
    head: String,
    /// Root end tag and anything after it
    tail: String,
    anchors: Vec<Anchor>,
    next_key: u32,
}

impl Drawing {
    pub fn parse(xml: &str, part: &str) -> Result<Self, PackageError> {
        let mut reader = Reader::from_str(xml);
        let mut depth = 0usize;
        let mut root = None;
        let mut head = None;
        let mut tail = String::new();
        let mut child_start = 0usize;
        let mut raws: Vec<String> = Vec::new();

        loop {
            let before = reader.buffer_position() as usize;
            let event = reader.read_event().map_err(|err| PackageError::xml(part, err))?;
            let after = reader.buffer_position() as usize;
            match event {
                Event::Start(ref e) => {
                    if depth == 0 {
                        root = Some(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                        head = Some(xml[..after].to_string());
                    } else if depth == 1 {
                        child_start = before;
                    }
                    depth += 1;
                }
                Event::Empty(ref e) => {
                    if depth == 0 {
                        // Self-closing root: no anchors yet
                        let qname = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                        let tag = xml[before..after].trim_end_matches('>').trim_end_matches('/');
                        head = Some(format!("{}{}>", &xml[..before], tag));
                        tail = format!("</{}>{}", qname, &xml[after..]);
                        root = Some(qname);
                        break;
                    } else if depth == 1 {
                        raws.push(xml[before..after].to_string());
                    }
                }
                Event::End(_) => {
                    depth = depth.saturating_sub(1);
                    if depth == 1 {
                        raws.push(xml[child_start..after].to_string());
                    } else if depth == 0 {
                        tail = xml[before..].to_string();
                        break;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        let (root, head) = match (root, head) {
            (Some(root), Some(head)) => (root, head),
            _ => return Err(PackageError::Invalid(format!("{} has no root element", part))),
        };

        let anchors = raws
            .iter()
            .enumerate()
            .map(|(i, raw)| Anchor::parse(raw, i as u32 + 1, part))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            part: part.to_string(),
            root,
            head,
            tail,
            next_key: anchors.len() as u32 + 1,
            anchors,
        })
    }

    pub fn part(&self) -> &str {
        &self.part
    }

    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    pub fn anchor(&self, key: u32) -> Option<&Anchor> {
        self.anchors.iter().find(|a| a.key == key)
    }

    pub fn pictures(&self) -> impl Iterator<Item = &Anchor> {
        self.anchors.iter().filter(|a| a.is_embedded_picture())
    }

    pub fn remove(&mut self, key: u32) -> Option<Anchor> {
        let index = self.anchors.iter().position(|a| a.key == key)?;
        Some(self.anchors.remove(index))
    }

    /// Whether any remaining anchor still embeds relationship `rel_id`
    pub fn references(&self, rel_id: &str) -> bool {
        self.anchors
            .iter()
            .any(|a| a.embed.as_deref() == Some(rel_id))
    }

    /// Next free `cNvPr` id
    pub fn next_shape_id(&self) -> u32 {
        self.anchors
            .iter()
            .filter_map(|a| a.shape_id)
            .max()
            .unwrap_or(0)
            + 1
    }

    fn prefix(&self) -> &str {
        match self.root.rsplit_once(':') {
            Some((prefix, _)) => &self.root[..prefix.len() + 1],
            None => "",
        }
    }

    /// Append a picture anchor and return its key
    pub fn push_picture(&mut self, picture: &PictureAnchor) -> Result<u32, PackageError> {
        let raw = self
            .picture_xml(picture)
            .map_err(|err| PackageError::Invalid(format!("drawing write error: {}", err)))?;
        let key = self.next_key;
        self.next_key += 1;
        let anchor = Anchor::parse(&raw, key, &self.part)?;
        self.anchors.push(anchor);
        Ok(key)
    }

    fn picture_xml(&self, picture: &PictureAnchor) -> Result<String, std::fmt::Error> {
        let p = self.prefix();
        let mut xml = String::with_capacity(1024);

        let element = match &picture.layout {
            PictureLayout::OneCell => {
                write!(xml, "<{p}oneCellAnchor>")?;
                write_marker(&mut xml, p, "from", picture.from)?;
                "oneCellAnchor"
            }
            PictureLayout::TwoCell { to, edit_as } => {
                match edit_as {
                    Some(edit_as) => write!(
                        xml,
                        r#"<{p}twoCellAnchor editAs="{}">"#,
                        escape(edit_as.as_str())
                    )?,
                    None => write!(xml, "<{p}twoCellAnchor>")?,
                }
                write_marker(&mut xml, p, "from", picture.from)?;
                write_marker(&mut xml, p, "to", *to)?;
                "twoCellAnchor"
            }
            PictureLayout::Absolute => {
                write!(xml, "<{p}absoluteAnchor>")?;
                write!(
                    xml,
                    r#"<{p}pos x="{}" y="{}"/>"#,
                    picture.off.0, picture.off.1
                )?;
                "absoluteAnchor"
            }
        };
        if !matches!(picture.layout, PictureLayout::TwoCell { .. }) {
            write!(
                xml,
                r#"<{p}ext cx="{}" cy="{}"/>"#,
                picture.ext.0, picture.ext.1
            )?;
        }
        write!(
            xml,
            r#"<{p}pic xmlns:a="{}" xmlns:r="{}">"#,
            DRAWINGML_NS, RELATIONSHIPS_NS
        )?;
        write!(
            xml,
            r#"<{p}nvPicPr><{p}cNvPr id="{}" name="{}"/><{p}cNvPicPr><a:picLocks noChangeAspect="1"/></{p}cNvPicPr></{p}nvPicPr>"#,
            picture.shape_id,
            escape(picture.name.as_str())
        )?;
        write!(
            xml,
            r#"<{p}blipFill><a:blip r:embed="{}"/><a:stretch><a:fillRect/></a:stretch></{p}blipFill>"#,
            escape(picture.embed.as_str())
        )?;
        write!(
            xml,
            r#"<{p}spPr><a:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></{p}spPr>"#,
            picture.off.0, picture.off.1, picture.ext.0, picture.ext.1
        )?;
        write!(xml, "</{p}pic><{p}clientData/></{p}{element}>")?;
        Ok(xml)
    }

    pub fn to_xml(&self) -> String {
        let body: usize = self.anchors.iter().map(|a| a.raw.len()).sum();
        let mut xml = String::with_capacity(self.head.len() + body + self.tail.len());
        xml.push_str(&self.head);
        for anchor in &self.anchors {
            xml.push_str(&anchor.raw);
        }
        xml.push_str(&self.tail);
        xml
    }
}
