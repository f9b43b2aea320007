//! PresentationML (pptx) reading and writing.
//!
//! Reading resolves the slide order the way PowerPoint does:
//! `ppt/presentation.xml` lists `p:sldId` entries whose `r:id` points into
//! `ppt/_rels/presentation.xml.rels`, which names each slide part.
//!
//! Writing produces a minimal package: one master, one "Title Only" layout,
//! one theme and one slide per [`SlideContent`].

use crate::error::RoutineError;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::path::Path;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

/// English Metric Units per inch.
pub const EMU_PER_INCH: i64 = 914_400;

// ── Reading ──────────────────────────────────────────────────────────────────

/// The text of every slide, in presentation order.
///
/// A slide's text is the text of each text-bearing shape joined with `\n`;
/// within a shape, paragraphs are joined with `\n`.
pub fn read_slide_texts(path: &Path) -> Result<Vec<String>, RoutineError> {
    let file = File::open(path).map_err(|e| RoutineError::io(path, e))?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;

    let rels = parse_relationships(&read_part(&mut archive, "ppt/_rels/presentation.xml.rels")?)?;
    let slide_ids = parse_slide_ids(&read_part(&mut archive, "ppt/presentation.xml")?)?;

    let mut slides = Vec::with_capacity(slide_ids.len());
    for rel_id in slide_ids {
        let target = rels.get(&rel_id).ok_or_else(|| {
            RoutineError::Presentation(format!("slide relationship '{rel_id}' is missing"))
        })?;
        let part = match target.strip_prefix('/') {
            Some(absolute) => absolute.to_string(),
            None => format!("ppt/{}", target),
        };
        let xml = read_part(&mut archive, &part)?;
        slides.push(slide_text(&xml)?);
    }

    debug!("{}: {} slides", path.display(), slides.len());
    Ok(slides)
}

fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<String, RoutineError> {
    let mut entry = archive
        .by_name(name)
        .map_err(|e| RoutineError::Presentation(format!("{name}: {e}")))?;
    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| RoutineError::Presentation(format!("{name}: {e}")))?;
    Ok(xml)
}

/// `Id → Target` for every relationship in a `.rels` part.
fn parse_relationships(xml: &str) -> Result<HashMap<String, String>, RoutineError> {
    let mut reader = Reader::from_str(xml);
    let mut rels = HashMap::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Empty(e) | Event::Start(e) if e.local_name().as_ref() == b"Relationship" => {
                let mut id = None;
                let mut target = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Id" => id = Some(String::from_utf8_lossy(&attr.value).to_string()),
                        b"Target" => {
                            target = Some(String::from_utf8_lossy(&attr.value).to_string())
                        }
                        _ => {}
                    }
                }
                if let (Some(id), Some(target)) = (id, target) {
                    rels.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

/// The `r:id` of each `p:sldId`, in document order.
fn parse_slide_ids(xml: &str) -> Result<Vec<String>, RoutineError> {
    let mut reader = Reader::from_str(xml);
    let mut ids = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Empty(e) | Event::Start(e) if e.local_name().as_ref() == b"sldId" => {
                // The relationship id is the namespaced `r:id`, not the bare `id`.
                let rel = e.attributes().flatten().find(|a| {
                    a.key.prefix().is_some() && a.key.local_name().as_ref() == b"id"
                });
                if let Some(attr) = rel {
                    ids.push(String::from_utf8_lossy(&attr.value).to_string());
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(ids)
}

/// Text of one slide part.
fn slide_text(xml: &str) -> Result<String, RoutineError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut shapes: Vec<String> = Vec::new();
    let mut paragraphs: Vec<String> = Vec::new();
    let mut paragraph = String::new();
    let mut shape_depth = 0usize;
    let mut has_text_body = false;
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"sp" => {
                    shape_depth += 1;
                    if shape_depth == 1 {
                        paragraphs.clear();
                        has_text_body = false;
                    }
                }
                b"txBody" if shape_depth > 0 => has_text_body = true,
                b"p" if shape_depth > 0 => paragraph.clear(),
                b"t" if shape_depth > 0 => in_text = true,
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"br" if shape_depth > 0 => paragraph.push('\n'),
                b"p" if shape_depth > 0 => paragraphs.push(String::new()),
                _ => {}
            },
            Event::Text(t) if in_text => {
                let text = t
                    .unescape()
                    .map_err(|e| RoutineError::Presentation(e.to_string()))?;
                paragraph.push_str(&text);
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" if shape_depth > 0 => paragraphs.push(std::mem::take(&mut paragraph)),
                b"sp" if shape_depth > 0 => {
                    if shape_depth == 1 && has_text_body {
                        shapes.push(paragraphs.join("\n"));
                    }
                    shape_depth -= 1;
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(shapes.join("\n"))
}

// ── Writing ──────────────────────────────────────────────────────────────────

const CONTENT_TYPES: &str = include_str!("parts/content_types.xml");
const ROOT_RELS: &str = include_str!("parts/root_rels.xml");
const PRESENTATION: &str = include_str!("parts/presentation.xml");
const PRESENTATION_RELS: &str = include_str!("parts/presentation_rels.xml");
const SLIDE_MASTER: &str = include_str!("parts/slide_master.xml");
const SLIDE_MASTER_RELS: &str = include_str!("parts/slide_master_rels.xml");
const SLIDE_LAYOUT: &str = include_str!("parts/slide_layout.xml");
const SLIDE_LAYOUT_RELS: &str = include_str!("parts/slide_layout_rels.xml");
const SLIDE: &str = include_str!("parts/slide.xml");
const SLIDE_RELS: &str = include_str!("parts/slide_rels.xml");
const THEME: &str = include_str!("parts/theme.xml");

/// Position and size of a slide's text box, in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextBox {
    pub x: i64,
    pub y: i64,
    pub cx: i64,
    pub cy: i64,
}

impl TextBox {
    pub fn inches(x: f64, y: f64, width: f64, height: f64) -> Self {
        let emu = |v: f64| (v * EMU_PER_INCH as f64).round() as i64;
        Self {
            x: emu(x),
            y: emu(y),
            cx: emu(width),
            cy: emu(height),
        }
    }
}

/// One slide: a title and a monospace text box.
#[derive(Debug, Clone, PartialEq)]
pub struct SlideContent {
    pub title: String,
    pub body: String,
    pub text_box: TextBox,
}

/// Write a pptx package with one slide per entry, in order.
pub fn write_presentation(path: &Path, slides: &[SlideContent]) -> Result<(), RoutineError> {
    let file = File::create(path).map_err(|e| RoutineError::io(path, e))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    let mut overrides = String::new();
    let mut slide_ids = String::new();
    let mut slide_rels = String::new();
    for n in 1..=slides.len() {
        overrides.push_str(&format!(
            "<Override PartName=\"/ppt/slides/slide{n}.xml\" \
             ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slide+xml\"/>"
        ));
        // Slide ids start at 256; rId1/rId2 are the master and theme.
        slide_ids.push_str(&format!("<p:sldId id=\"{}\" r:id=\"rId{}\"/>", 255 + n, n + 2));
        slide_rels.push_str(&format!(
            "<Relationship Id=\"rId{}\" \
             Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide\" \
             Target=\"slides/slide{n}.xml\"/>",
            n + 2
        ));
    }

    let mut parts: Vec<(String, String)> = vec![
        ("[Content_Types].xml".into(), fill(CONTENT_TYPES, &[("slides", overrides.as_str())])),
        ("_rels/.rels".into(), ROOT_RELS.to_string()),
        ("ppt/presentation.xml".into(), fill(PRESENTATION, &[("slides", slide_ids.as_str())])),
        (
            "ppt/_rels/presentation.xml.rels".into(),
            fill(PRESENTATION_RELS, &[("slides", slide_rels.as_str())]),
        ),
        ("ppt/slideMasters/slideMaster1.xml".into(), SLIDE_MASTER.to_string()),
        ("ppt/slideMasters/_rels/slideMaster1.xml.rels".into(), SLIDE_MASTER_RELS.to_string()),
        ("ppt/slideLayouts/slideLayout1.xml".into(), SLIDE_LAYOUT.to_string()),
        ("ppt/slideLayouts/_rels/slideLayout1.xml.rels".into(), SLIDE_LAYOUT_RELS.to_string()),
        ("ppt/theme/theme1.xml".into(), THEME.to_string()),
    ];
    for (i, slide) in slides.iter().enumerate() {
        let n = i + 1;
        parts.push((format!("ppt/slides/slide{n}.xml"), slide_xml(slide)));
        parts.push((format!("ppt/slides/_rels/slide{n}.xml.rels"), SLIDE_RELS.to_string()));
    }

    for (name, xml) in parts {
        zip.start_file(name.as_str(), options)?;
        zip.write_all(xml.as_bytes())
            .map_err(|e| RoutineError::io(path, e))?;
    }
    zip.finish()?;
    debug!("{}: wrote {} slides", path.display(), slides.len());
    Ok(())
}

fn slide_xml(slide: &SlideContent) -> String {
    let mut paragraphs = String::new();
    for line in slide.body.lines() {
        if line.is_empty() {
            paragraphs.push_str("<a:p><a:endParaRPr lang=\"en-US\" sz=\"1000\"/></a:p>");
            continue;
        }
        paragraphs.push_str(&format!(
            "<a:p><a:r><a:rPr lang=\"en-US\" sz=\"1000\" dirty=\"0\">\
             <a:latin typeface=\"Courier New\"/></a:rPr><a:t>{}</a:t></a:r></a:p>",
            escape(line)
        ));
    }
    if paragraphs.is_empty() {
        paragraphs.push_str("<a:p><a:endParaRPr lang=\"en-US\"/></a:p>");
    }

    let b = slide.text_box;
    let title = escape(&slide.title);
    let (x, y, cx, cy) = (b.x.to_string(), b.y.to_string(), b.cx.to_string(), b.cy.to_string());
    fill(
        SLIDE,
        &[
            ("title", title.as_ref()),
            ("x", x.as_str()),
            ("y", y.as_str()),
            ("cx", cx.as_str()),
            ("cy", cy.as_str()),
            ("paragraphs", paragraphs.as_str()),
        ],
    )
}

/// Substitute `{key}` placeholders in one pass; unknown braces are kept.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let hit = tail.find('}').and_then(|end| {
            values
                .iter()
                .find(|(key, _)| *key == &tail[..end])
                .map(|(_, value)| (end, *value))
        });
        match hit {
            Some((end, value)) => {
                out.push_str(value);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}
