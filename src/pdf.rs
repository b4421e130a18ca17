use crate::canvas::{Command, Document, Page};
use crate::error::{ReportError, Result};
use crate::font::{FontRegistry, RegisteredFont, winansi_byte};
use crate::types::{Color, Pt, Size};
use fixed::types::I32F32;
use lopdf::{
    Dictionary, Document as LoDocument, Object as LoObject, ObjectId, Stream as LoStream, StringFormat,
    dictionary,
};
use std::collections::{BTreeMap, BTreeSet};

/// Document-level entries written alongside the pages.
#[derive(Debug, Clone)]
pub struct PdfOptions {
    pub lang: Option<String>,
    pub title: Option<String>,
    pub producer: String,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            lang: None,
            title: None,
            producer: concat!("shipment-report ", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

struct FontResource {
    resource: String,
    object_id: ObjectId,
    /// Glyph ids of an embedded Identity-H font; `None` for Type1 references.
    glyphs: Option<BTreeMap<char, u16>>,
}

/// Serializes a laid-out document. Registered fonts are embedded as
/// Type0 fonts over a CIDFontType2 descendant with Identity-H encoding
/// and a ToUnicode map, so any character the font covers prints and
/// extracts as itself. Any other font name is written as a standard
/// Type1 reference in WinAnsi. No timestamps or IDs are written, so
/// equal inputs give byte-identical output.
pub fn document_to_pdf(
    document: &Document,
    registry: &FontRegistry,
    options: &PdfOptions,
) -> Result<Vec<u8>> {
    if document.pages.is_empty() {
        return Err(ReportError::EmptyDocument);
    }

    let mut doc = LoDocument::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut fonts: BTreeMap<String, FontResource> = BTreeMap::new();
    for (idx, (name, chars)) in collect_font_usage(document).into_iter().enumerate() {
        let (object_id, glyphs) = match registry.resolve(&name) {
            Some(font) => {
                let (object_id, glyphs) = add_cid_font(&mut doc, font, &chars);
                (object_id, Some(glyphs))
            }
            None => {
                log::debug!("font {name} is not registered; writing a Type1 reference");
                (doc.add_object(type1_font_object(&name)), None)
            }
        };
        fonts.insert(
            name,
            FontResource {
                resource: format!("F{}", idx + 1),
                object_id,
                glyphs,
            },
        );
    }

    let mut font_dict = Dictionary::new();
    for font in fonts.values() {
        font_dict.set(font.resource.as_str(), font.object_id);
    }
    let resources_id = doc.add_object(dictionary! {
        "Font" => font_dict,
    });

    let mut kids: Vec<LoObject> = Vec::with_capacity(document.pages.len());
    for page in &document.pages {
        let content = render_page(page, document.page_size.height, &fonts);
        let content_id = doc.add_object(LoStream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => media_box(document.page_size),
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        LoObject::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let mut catalog = dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    };
    if let Some(lang) = options.lang.as_deref() {
        catalog.set("Lang", LoObject::string_literal(lang));
    }
    let catalog_id = doc.add_object(catalog);

    let mut info = dictionary! {
        "Producer" => text_string(&options.producer),
    };
    if let Some(title) = options.title.as_deref() {
        info.set("Title", text_string(title));
    }
    let info_id = doc.add_object(info);

    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|err| ReportError::Pdf(err.to_string()))?;
    Ok(out)
}

/// PDF text string: a literal when ASCII, UTF-16BE with a byte order mark
/// otherwise.
fn text_string(value: &str) -> LoObject {
    if value.is_ascii() {
        return LoObject::string_literal(value);
    }
    let mut bytes = vec![0xFE, 0xFF];
    bytes.extend(value.encode_utf16().flat_map(u16::to_be_bytes));
    LoObject::String(bytes, StringFormat::Hexadecimal)
}

fn media_box(size: Size) -> Vec<LoObject> {
    vec![0.into(), 0.into(), pt_object(size.width), pt_object(size.height)]
}

fn pt_object(value: Pt) -> LoObject {
    let milli = value.to_milli_i64();
    if milli % 1000 == 0 {
        LoObject::Integer(milli / 1000)
    } else {
        LoObject::from(value.to_f32())
    }
}

/// Characters drawn in each font, keyed by font name.
fn collect_font_usage(document: &Document) -> BTreeMap<String, BTreeSet<char>> {
    let mut usage: BTreeMap<String, BTreeSet<char>> = BTreeMap::new();
    for page in &document.pages {
        // Text drawn before any SetFontName uses the canvas default.
        let mut current = "Helvetica";
        for cmd in &page.commands {
            match cmd {
                Command::SetFontName(name) => current = name.as_str(),
                Command::DrawString { text, .. } => {
                    usage
                        .entry(current.to_string())
                        .or_default()
                        .extend(text.chars());
                }
                _ => {}
            }
        }
    }
    usage
}

/// Embeds `font` as Type0 + CIDFontType2 with an identity CID-to-GID map.
/// Widths and ToUnicode entries cover only the glyphs `chars` resolve to.
/// Returns the Type0 font object and the character-to-glyph map used to
/// encode text.
fn add_cid_font(
    doc: &mut LoDocument,
    font: &RegisteredFont,
    chars: &BTreeSet<char>,
) -> (ObjectId, BTreeMap<char, u16>) {
    let base = sanitize_font_name(&font.name);
    let metrics = &font.metrics;

    let mut glyphs: BTreeMap<char, u16> = BTreeMap::new();
    let mut advances: BTreeMap<u16, u16> = BTreeMap::new();
    let mut unicode: BTreeMap<u16, String> = BTreeMap::new();
    let mut missing = 0usize;
    for glyph in font.glyphs(chars.iter().copied()) {
        glyphs.insert(glyph.ch, glyph.id);
        advances.entry(glyph.id).or_insert(glyph.advance);
        if glyph.id == 0 {
            missing += 1;
        } else {
            unicode.entry(glyph.id).or_insert_with(|| glyph.ch.to_string());
        }
    }
    if missing > 0 {
        log::warn!("{missing} character(s) have no glyph in {}; printed as .notdef", font.name);
    }

    let font_file_id = doc.add_object(LoStream::new(
        dictionary! {
            "Length1" => font.data.len() as i64,
        },
        font.data.clone(),
    ));
    let mut flags = 4;
    if metrics.is_fixed_pitch {
        flags |= 1;
    }
    let (x0, y0, x1, y1) = metrics.bbox;
    let descriptor_id = doc.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => base.as_str(),
        "Flags" => flags,
        "FontBBox" => vec![x0.into(), y0.into(), x1.into(), y1.into()],
        "ItalicAngle" => metrics.italic_angle,
        "Ascent" => metrics.ascent,
        "Descent" => metrics.descent,
        "CapHeight" => metrics.cap_height,
        "StemV" => metrics.stem_v,
        "MissingWidth" => metrics.missing_width as i64,
        "FontFile2" => font_file_id,
    });

    let mut widths: Vec<LoObject> = Vec::with_capacity(advances.len() * 2);
    for (gid, advance) in &advances {
        let width = if *advance > 0 { *advance } else { metrics.missing_width };
        widths.push((*gid as i64).into());
        widths.push(vec![LoObject::from(width as i64)].into());
    }
    let cid_font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType2",
        "BaseFont" => base.as_str(),
        "CIDSystemInfo" => dictionary! {
            "Registry" => LoObject::string_literal("Adobe"),
            "Ordering" => LoObject::string_literal("Identity"),
            "Supplement" => 0,
        },
        "FontDescriptor" => descriptor_id,
        "DW" => metrics.missing_width as i64,
        "W" => widths,
        "CIDToGIDMap" => "Identity",
    });
    let to_unicode_id = doc.add_object(LoStream::new(
        dictionary! {},
        to_unicode_cmap(&unicode).into_bytes(),
    ));
    let type0_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => base.as_str(),
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![LoObject::Reference(cid_font_id)],
        "ToUnicode" => to_unicode_id,
    });
    (type0_id, glyphs)
}

/// ToUnicode CMap for an Identity-H font: one `bfchar` entry per glyph,
/// in blocks of 100, with supplementary-plane text as UTF-16 surrogates.
fn to_unicode_cmap(unicode: &BTreeMap<u16, String>) -> String {
    let entries: Vec<(&u16, &String)> = unicode.iter().collect();

    let mut out = String::new();
    out.push_str("/CIDInit /ProcSet findresource begin\n");
    out.push_str("12 dict begin\n");
    out.push_str("begincmap\n");
    out.push_str("/CIDSystemInfo << /Registry (Adobe) /Ordering (Identity) /Supplement 0 >> def\n");
    out.push_str("/CMapName /Adobe-Identity-UCS def\n");
    out.push_str("/CMapType 2 def\n");
    out.push_str("1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n");

    for chunk in entries.chunks(100) {
        out.push_str(&format!("{} beginbfchar\n", chunk.len()));
        for (gid, text) in chunk {
            let mut units = [0u16; 2];
            let hex: String = text
                .chars()
                .flat_map(|ch| ch.encode_utf16(&mut units).to_vec())
                .map(|unit| format!("{unit:04X}"))
                .collect();
            out.push_str(&format!("<{gid:04X}> <{hex}>\n"));
        }
        out.push_str("endbfchar\n");
    }

    out.push_str("endcmap\n");
    out.push_str("CMapName currentdict /CMap defineresource pop\n");
    out.push_str("end\nend\n");
    out
}

fn type1_font_object(name: &str) -> Dictionary {
    let base = sanitize_font_name(name);
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base.as_str(),
        "Encoding" => "WinAnsiEncoding",
    }
}

fn sanitize_font_name(name: &str) -> String {
    let mut out = String::new();
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' {
            out.push(ch);
        } else if ch == ' ' {
            out.push('-');
        }
    }
    if out.is_empty() {
        "Helvetica".to_string()
    } else {
        out
    }
}

fn render_page(page: &Page, page_height: Pt, fonts: &BTreeMap<String, FontResource>) -> String {
    let mut out = String::new();
    let mut current_font_size = Pt::from_f32(12.0);
    let mut current_font_name = "Helvetica";

    for cmd in &page.commands {
        match cmd {
            Command::SaveState => out.push_str("q\n"),
            Command::RestoreState => out.push_str("Q\n"),
            Command::Meta { .. } => {}
            Command::SetFillColor(color) => out.push_str(&color_operands(*color, "rg")),
            Command::SetStrokeColor(color) => out.push_str(&color_operands(*color, "RG")),
            Command::SetLineWidth(width) => {
                out.push_str(&format!("{} w\n", fmt_pt(*width)));
            }
            Command::SetFontName(name) => current_font_name = name.as_str(),
            Command::SetFontSize(size) => current_font_size = *size,
            Command::MoveTo { x, y } => {
                out.push_str(&format!("{} {} m\n", fmt_pt(*x), fmt_pt(page_height - *y)));
            }
            Command::LineTo { x, y } => {
                out.push_str(&format!("{} {} l\n", fmt_pt(*x), fmt_pt(page_height - *y)));
            }
            Command::Stroke => out.push_str("S\n"),
            Command::DrawString { x, y, text } => {
                let Some(font) = fonts.get(current_font_name) else {
                    continue;
                };
                let operand = match &font.glyphs {
                    Some(glyphs) => encode_cid_hex(text, glyphs),
                    None => {
                        let encoded = encode_winansi_pdf_string(text);
                        if encoded.replaced > 0 {
                            log::debug!(
                                "{} character(s) outside WinAnsi replaced in {text:?}",
                                encoded.replaced
                            );
                        }
                        format!("({})", encoded.text)
                    }
                };
                out.push_str("BT\n");
                out.push_str(&format!("/{} {} Tf\n", font.resource, fmt_pt(current_font_size)));
                out.push_str(&format!(
                    "{} {} Td\n",
                    fmt_pt(*x),
                    fmt_pt(page_height - *y - current_font_size)
                ));
                out.push_str(&format!("{operand} Tj\nET\n"));
            }
            Command::DrawRect {
                x,
                y,
                width,
                height,
            } => {
                let draw_y = page_height - *y - *height;
                out.push_str(&format!(
                    "{} {} {} {} re\nf\n",
                    fmt_pt(*x),
                    fmt_pt(draw_y),
                    fmt_pt(*width),
                    fmt_pt(*height)
                ));
            }
        }
    }
    out
}

fn color_operands(color: Color, op: &str) -> String {
    format!("{} {} {} {op}\n", fmt(color.r), fmt(color.g), fmt(color.b))
}

/// Two-byte glyph ids as a hex string; characters without a glyph use 0.
fn encode_cid_hex(text: &str, glyphs: &BTreeMap<char, u16>) -> String {
    let mut out = String::with_capacity(text.len() * 4 + 2);
    out.push('<');
    for ch in text.chars() {
        let gid = glyphs.get(&ch).copied().unwrap_or(0);
        out.push_str(&format!("{gid:04X}"));
    }
    out.push('>');
    out
}

struct WinAnsiEncoded {
    text: String,
    replaced: usize,
}

fn encode_winansi_pdf_string(input: &str) -> WinAnsiEncoded {
    let mut out = String::new();
    let mut replaced = 0usize;
    for ch in input.chars() {
        let byte = winansi_byte(ch).unwrap_or_else(|| {
            replaced += 1;
            b'?'
        });
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b if !(0x20..0x7f).contains(&b) => out.push_str(&format!("\\{:03o}", b)),
            b => out.push(b as char),
        }
    }
    WinAnsiEncoded {
        text: out,
        replaced,
    }
}

fn fmt(value: f32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let fixed = I32F32::from_num(value.clamp(0.0, 1.0));
    let scaled = (fixed * I32F32::from_num(1000)).round();
    let milli: i64 = scaled.to_num();
    format_milli(milli)
}

fn format_milli(milli: i64) -> String {
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.abs();
    let int_part = abs / 1000;
    let frac_part = abs % 1000;
    if frac_part == 0 {
        format!("{}{}", sign, int_part)
    } else {
        let mut s = format!("{}{}.{:03}", sign, int_part, frac_part);
        while s.ends_with('0') {
            s.pop();
        }
        s
    }
}

fn fmt_pt(value: Pt) -> String {
    format_milli(value.to_milli_i64())
}
