//! Positional text watermarks stamped onto every page of a rendered PDF.
//!
//! Four stamps are placed relative to the page corners. Text is drawn with a
//! CID-keyed GB1 font (`UniGB-UTF16-H`) so CJK watermark content renders
//! without embedding a font program.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use log::{info, warn};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::error::ReportError;

const FONT_RESOURCE: &str = "WmFont";
const GSTATE_RESOURCE: &str = "GSwm";
const DEFAULT_FONT_SIZE: f32 = 24.0;
const DEFAULT_GRAY: [f32; 3] = [0.5, 0.5, 0.5];
const A4: [f32; 4] = [0.0, 0.0, 595.28, 841.89];
const MAX_INHERITANCE_DEPTH: usize = 32;

/// Caller-supplied watermark parameters. `opacity` is a percentage (0-100).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WatermarkSpec {
    pub content: String,
    pub color: String,
    pub opacity: f32,
    pub font_size: f32,
    pub angle: f32,
}

impl WatermarkSpec {
    pub fn is_active(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomLeft,
        Corner::BottomRight,
    ];

    /// Offset (points) from the corner anchor; positive `y` moves up.
    fn offset(self) -> (f32, f32) {
        match self {
            Corner::TopLeft => (55.0, -100.0),
            Corner::TopRight => (-55.0, -200.0),
            Corner::BottomLeft => (55.0, 250.0),
            Corner::BottomRight => (-55.0, 150.0),
        }
    }
}

/// One fully-resolved stamp, ready to be emitted as content operations.
#[derive(Debug, Clone)]
pub struct WatermarkStamp {
    corner: Corner,
    text: Vec<u8>,
    width: f32,
    font_size: f32,
    rgb: [f32; 3],
    angle: f32,
}

impl WatermarkStamp {
    pub fn new(spec: &WatermarkSpec, corner: Corner) -> Result<Self, String> {
        let content = spec.content.trim();
        if content.is_empty() {
            return Err("watermark content is empty".to_string());
        }
        if !spec.angle.is_finite() {
            return Err(format!("invalid rotation {}", spec.angle));
        }
        let font_size = if spec.font_size.is_finite() && spec.font_size > 0.0 {
            spec.font_size
        } else {
            DEFAULT_FONT_SIZE
        };
        let rgb = parse_color(&spec.color)?;

        let text = content
            .encode_utf16()
            .flat_map(|unit| unit.to_be_bytes())
            .collect();
        let em: f32 = content
            .chars()
            .map(|c| if c.is_ascii() { 0.5 } else { 1.0 })
            .sum();

        Ok(Self {
            corner,
            text,
            width: em * font_size,
            font_size,
            rgb,
            angle: spec.angle,
        })
    }

    /// Text matrix placing the rotated text box at its corner of `media_box`.
    fn text_matrix(&self, media_box: [f32; 4]) -> [f32; 6] {
        let [llx, lly, urx, ury] = media_box;
        let (w, h) = (self.width, self.font_size);
        let (dx, dy) = self.corner.offset();
        let (x0, y0) = match self.corner {
            Corner::TopLeft => (llx + dx, ury - h + dy),
            Corner::TopRight => (urx - w + dx, ury - h + dy),
            Corner::BottomLeft => (llx + dx, lly + dy),
            Corner::BottomRight => (urx - w + dx, lly + dy),
        };
        let (cx, cy) = (x0 + w / 2.0, y0 + h / 2.0);
        let (sin, cos) = self.angle.to_radians().sin_cos();
        let tx = cx - (cos * w / 2.0 - sin * h / 2.0);
        let ty = cy - (sin * w / 2.0 + cos * h / 2.0);
        [cos, sin, -sin, cos, tx, ty]
    }

    fn operations(&self, media_box: [f32; 4]) -> Vec<Operation> {
        let m = self.text_matrix(media_box);
        vec![
            Operation::new("q", vec![]),
            Operation::new("gs", vec![Object::Name(GSTATE_RESOURCE.as_bytes().to_vec())]),
            Operation::new(
                "rg",
                self.rgb.iter().map(|c| Object::from(*c)).collect(),
            ),
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![
                    Object::Name(FONT_RESOURCE.as_bytes().to_vec()),
                    Object::from(self.font_size),
                ],
            ),
            Operation::new("Tm", m.iter().map(|v| Object::from(*v)).collect()),
            Operation::new(
                "Tj",
                vec![Object::String(self.text.clone(), StringFormat::Hexadecimal)],
            ),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ]
    }
}

/// Accepts `#RGB`, `#RRGGBB` or three space/comma separated components in 0..=1.
pub fn parse_color(raw: &str) -> Result<[f32; 3], String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(DEFAULT_GRAY);
    }
    if let Some(hex) = raw.strip_prefix('#') {
        if !hex.is_ascii() {
            return Err(format!("invalid color '{}'", raw));
        }
        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 => hex.to_string(),
            _ => return Err(format!("invalid color '{}'", raw)),
        };
        let mut rgb = [0.0; 3];
        for (i, slot) in rgb.iter_mut().enumerate() {
            let byte = u8::from_str_radix(&expanded[i * 2..i * 2 + 2], 16)
                .map_err(|_| format!("invalid color '{}'", raw))?;
            *slot = byte as f32 / 255.0;
        }
        return Ok(rgb);
    }

    let parts: Vec<f32> = raw
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f32>())
        .collect::<Result<_, _>>()
        .map_err(|_| format!("invalid color '{}'", raw))?;
    match parts.as_slice() {
        [r, g, b] if [r, g, b].iter().all(|c| (0.0..=1.0).contains(*c)) => Ok([*r, *g, *b]),
        _ => Err(format!("invalid color '{}'", raw)),
    }
}

/// Stamps watermarks on PDFs, staging the input in a scratch directory.
#[derive(Debug, Clone)]
pub struct Watermarker {
    font: String,
    scratch_dir: PathBuf,
}

impl Watermarker {
    pub fn new(font: impl Into<String>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            font: font.into(),
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Apply the four corner stamps to every page. The scratch file is removed on return.
    pub fn apply(&self, pdf: &[u8], spec: &WatermarkSpec) -> Result<Vec<u8>, ReportError> {
        fs::create_dir_all(&self.scratch_dir)
            .map_err(|e| ReportError::io("create directory", &self.scratch_dir, e))?;
        let mut scratch = tempfile::Builder::new()
            .prefix("export-")
            .suffix(".pdf")
            .tempfile_in(&self.scratch_dir)
            .map_err(|e| ReportError::io("create temp file in", &self.scratch_dir, e))?;
        scratch
            .write_all(pdf)
            .and_then(|_| scratch.flush())
            .map_err(|e| ReportError::io("write", scratch.path(), e))?;

        let mut doc = Document::load(scratch.path())
            .map_err(|e| ReportError::Pdf(format!("failed to read rendered PDF: {}", e)))?;
        let pages = doc.get_pages();
        if pages.is_empty() {
            return Err(ReportError::Pdf("rendered PDF has no pages".to_string()));
        }

        let stamps: Vec<WatermarkStamp> = Corner::ALL
            .into_iter()
            .filter_map(|corner| match WatermarkStamp::new(spec, corner) {
                Ok(stamp) => Some(stamp),
                Err(e) => {
                    warn!("Skipping {:?} watermark: {}", corner, e);
                    None
                }
            })
            .collect();
        if stamps.is_empty() {
            warn!("No watermark stamp could be built, returning the PDF unchanged");
            return Ok(pdf.to_vec());
        }

        let font_id = self.add_font(&mut doc);
        let opacity = (spec.opacity / 100.0).clamp(0.0, 1.0);
        let gstate_id = doc.add_object(dictionary! {
            "Type" => "ExtGState",
            "ca" => opacity,
            "CA" => opacity,
        });

        for (_, page_id) in pages.iter() {
            stamp_page(&mut doc, *page_id, &stamps, font_id, gstate_id)?;
        }

        let mut out = Vec::with_capacity(pdf.len() + 4096);
        doc.save_to(&mut out)
            .map_err(|e| ReportError::Pdf(format!("failed to write watermarked PDF: {}", e)))?;
        info!(
            "Applied {} watermark stamps to {} pages",
            stamps.len(),
            pages.len()
        );
        Ok(out)
    }

    fn add_font(&self, doc: &mut Document) -> ObjectId {
        let name = self.font.as_bytes().to_vec();
        let descriptor_id = doc.add_object(dictionary! {
            "Type" => "FontDescriptor",
            "FontName" => Object::Name(name.clone()),
            "Flags" => 6,
            "FontBBox" => vec![(-25).into(), (-254).into(), 1000.into(), 880.into()],
            "ItalicAngle" => 0,
            "Ascent" => 880,
            "Descent" => -120,
            "CapHeight" => 880,
            "StemV" => 93,
        });
        let cid_font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType0",
            "BaseFont" => Object::Name(name.clone()),
            "CIDSystemInfo" => dictionary! {
                "Registry" => Object::string_literal("Adobe"),
                "Ordering" => Object::string_literal("GB1"),
                "Supplement" => 4,
            },
            "FontDescriptor" => descriptor_id,
            "DW" => 1000,
        });
        doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => Object::Name(name),
            "Encoding" => "UniGB-UTF16-H",
            "DescendantFonts" => vec![Object::Reference(cid_font_id)],
        })
    }
}

fn stamp_page(
    doc: &mut Document,
    page_id: ObjectId,
    stamps: &[WatermarkStamp],
    font_id: ObjectId,
    gstate_id: ObjectId,
) -> Result<(), ReportError> {
    let media_box = inherited(doc, page_id, b"MediaBox")
        .and_then(|obj| rectangle(doc, &obj))
        .unwrap_or(A4);

    let mut resources = match inherited(doc, page_id, b"Resources") {
        Some(Object::Dictionary(dict)) => dict,
        _ => Dictionary::new(),
    };
    add_resource(doc, &mut resources, b"Font", FONT_RESOURCE, font_id);
    add_resource(doc, &mut resources, b"ExtGState", GSTATE_RESOURCE, gstate_id);

    let mut contents = existing_contents(doc, page_id);
    let mut operations = vec![Operation::new("Q", vec![])];
    for stamp in stamps {
        operations.extend(stamp.operations(media_box));
    }
    let pre = encode_stream(vec![Operation::new("q", vec![])])?;
    let post = encode_stream(operations)?;
    let pre_id = doc.add_object(pre);
    let post_id = doc.add_object(post);
    contents.insert(0, Object::Reference(pre_id));
    contents.push(Object::Reference(post_id));

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| ReportError::Pdf(format!("page {:?} is not a dictionary: {}", page_id, e)))?;
    page.set("Contents", Object::Array(contents));
    page.set("Resources", Object::Dictionary(resources));
    Ok(())
}

fn encode_stream(operations: Vec<Operation>) -> Result<Stream, ReportError> {
    let bytes = Content { operations }
        .encode()
        .map_err(|e| ReportError::Pdf(format!("failed to encode watermark content: {}", e)))?;
    Ok(Stream::new(Dictionary::new(), bytes))
}

fn resolve<'a>(doc: &'a Document, mut obj: &'a Object) -> Option<&'a Object> {
    for _ in 0..MAX_INHERITANCE_DEPTH {
        match obj {
            Object::Reference(id) => obj = doc.get_object(*id).ok()?,
            _ => return Some(obj),
        }
    }
    None
}

/// Look `key` up on the page, then up its `Parent` chain.
fn inherited(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_INHERITANCE_DEPTH {
        if let Ok(obj) = current.get(key) {
            return resolve(doc, obj).cloned();
        }
        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn rectangle(doc: &Document, obj: &Object) -> Option<[f32; 4]> {
    let items = obj.as_array().ok()?;
    if items.len() != 4 {
        return None;
    }
    let mut out = [0.0f32; 4];
    for (slot, item) in out.iter_mut().zip(items) {
        *slot = match resolve(doc, item)? {
            Object::Integer(i) => *i as f32,
            Object::Real(r) => *r as f32,
            _ => return None,
        };
    }
    Some(out)
}

fn add_resource(doc: &Document, resources: &mut Dictionary, category: &[u8], name: &str, id: ObjectId) {
    let mut entries = match resources.get(category).ok().and_then(|o| resolve(doc, o)) {
        Some(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };
    entries.set(name, Object::Reference(id));
    resources.set(category.to_vec(), Object::Dictionary(entries));
}

fn existing_contents(doc: &Document, page_id: ObjectId) -> Vec<Object> {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };
    match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}
