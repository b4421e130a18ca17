use crate::canvas::{Canvas, Document};
use crate::columns::{COMMENTS, STATUS};
use crate::doc_template::DocTemplate;
use crate::error::{ReportError, Result};
use crate::finalize::merge_with_template;
use crate::flowable::{
    EdgeSizes, TableCell, TableFlowable, TableRule, TextAlign, TextStyle, VerticalAlign,
    equal_column_widths,
};
use crate::font::FontRegistry;
use crate::inspect::{inspect_template_bytes, require_composable};
use crate::page_template::{DocContext, PageTemplate};
use crate::pdf::{PdfOptions, document_to_pdf};
use crate::status::{Language, translate_status};
use crate::table::Table;
use crate::types::{Color, Margins, Pt, Size};
use chrono::NaiveDate;
use log::info;
use std::path::Path;
use std::sync::Arc;

/// A point in PDF space (origin bottom-left), the way the header band
/// anchors are specified.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub x: Pt,
    pub y: Pt,
}

impl Anchor {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x: Pt::from_f32(x),
            y: Pt::from_f32(y),
        }
    }
}

/// Geometry and typography of the overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportLayout {
    pub margins: Margins,
    pub client_name_size: Pt,
    /// Left end of the client name baseline.
    pub client_name_anchor: Anchor,
    pub date_size: Pt,
    /// Right end of the date baseline.
    pub date_anchor: Anchor,
    pub header_size: Pt,
    pub header_color: Color,
    pub body_size: Pt,
    pub body_color: Color,
    pub cell_padding: EdgeSizes,
    pub divider: TableRule,
    pub divider_min_rows: usize,
}

impl Default for ReportLayout {
    fn default() -> Self {
        Self {
            margins: Margins::new(300.0, 65.0, 100.0, 100.0),
            client_name_size: Pt::from_i32(30),
            client_name_anchor: Anchor::new(680.0, 915.0),
            date_size: Pt::from_i32(12),
            date_anchor: Anchor::new(1620.0, 925.0),
            header_size: Pt::from_i32(12),
            header_color: Color::from_hex("#333333").unwrap_or(Color::BLACK),
            body_size: Pt::from_i32(9),
            body_color: Color::BLACK,
            cell_padding: EdgeSizes::new(10.0, 6.0, 6.0, 6.0),
            divider: TableRule {
                width: Pt::from_f32(0.5),
                color: Color::from_hex("#E0E0E0").unwrap_or(Color::BLACK),
            },
            divider_min_rows: 2,
        }
    }
}

/// The regular and bold faces the overlay is set in.
#[derive(Debug, Clone)]
pub struct ReportFonts {
    pub registry: Arc<FontRegistry>,
    pub regular: String,
    pub bold: String,
}

impl ReportFonts {
    pub fn load(regular: &Path, bold: &Path) -> Result<Self> {
        let mut registry = FontRegistry::new();
        let regular = registry.register_file(regular)?;
        let bold = registry.register_file(bold)?;
        Ok(Self {
            registry: Arc::new(registry),
            regular,
            bold,
        })
    }
}

/// The table the operator edits: STATUS translated into `language`,
/// projected onto the selected columns that exist, with an empty
/// COMENTARIOS column added last when the table has none.
pub fn prepare_operator_view(table: &Table, selected_columns: &[String], language: Language) -> Table {
    let mut view = table.clone();
    view.map_column(STATUS, |v| translate_status(v, language).into_owned());
    if !view.has_column(COMMENTS) {
        view.set_column(COMMENTS, Vec::new());
    }
    let mut columns: Vec<&str> = selected_columns
        .iter()
        .map(String::as_str)
        .filter(|c| *c != COMMENTS)
        .collect();
    columns.push(COMMENTS);
    view.select(&columns)
}

/// Prepares an edited operator table for rendering. STATUS is translated
/// again; COMENTARIOS is dropped when every value is blank or `None` and
/// moved to the last position otherwise.
pub fn finalize_for_render(table: &Table, language: Language) -> Table {
    let mut out = table.clone();
    out.map_column(STATUS, |v| translate_status(v, language).into_owned());
    let all_blank = out.column_values(COMMENTS).map(|mut values| {
        values.all(|v| {
            let v = v.trim();
            v.is_empty() || v == "None"
        })
    });
    match all_blank {
        Some(true) => {
            out.remove_column(COMMENTS);
        }
        Some(false) => out.move_column_to_end(COMMENTS),
        None => {}
    }
    out
}

fn draw_header_band(
    canvas: &mut Canvas,
    ctx: &DocContext,
    fonts: &ReportFonts,
    layout: &ReportLayout,
    client_name: &str,
    date_text: &str,
) {
    let page_height = ctx.page_size.height;
    canvas.save_state();
    canvas.set_fill_color(Color::BLACK);
    canvas.set_font_name(&fonts.bold);

    canvas.set_font_size(layout.client_name_size);
    let anchor = layout.client_name_anchor;
    canvas.draw_string(
        anchor.x,
        page_height - anchor.y - layout.client_name_size,
        client_name,
    );

    canvas.set_font_size(layout.date_size);
    let width = fonts
        .registry
        .measure_text_width(&fonts.bold, layout.date_size, date_text);
    let anchor = layout.date_anchor;
    canvas.draw_string(
        anchor.x - width,
        page_height - anchor.y - layout.date_size,
        date_text,
    );
    canvas.restore_state();
}

fn table_flowable(
    table: &Table,
    fonts: &ReportFonts,
    layout: &ReportLayout,
    width: Pt,
) -> TableFlowable {
    let registry = Some(fonts.registry.clone());
    let header_style = TextStyle::new(fonts.bold.as_str(), layout.header_size.to_f32())
        .with_color(layout.header_color);
    let body_style =
        TextStyle::new(fonts.regular.as_str(), layout.body_size.to_f32()).with_color(layout.body_color);
    let cell = |text: &str, style: &TextStyle| {
        TableCell::new(text, style.clone(), registry.clone())
            .with_align(TextAlign::Center)
            .with_valign(VerticalAlign::Middle)
            .with_padding(layout.cell_padding)
    };

    let header = vec![
        table
            .columns()
            .iter()
            .map(|name| cell(name.as_str(), &header_style))
            .collect(),
    ];
    let body = table
        .raw_rows()
        .iter()
        .map(|row| row.iter().map(|value| cell(value.as_str(), &body_style)).collect())
        .collect();

    TableFlowable::new(body)
        .with_header(header)
        .repeat_header(true)
        .with_column_widths(equal_column_widths(width, table.columns().len()))
        .with_row_divider(layout.divider, layout.divider_min_rows)
}

/// Lays out the overlay pages without serializing them. Every page gets
/// the header band; the table flows across as many pages as it needs.
pub fn build_overlay_document(
    table: &Table,
    client_name: &str,
    geometry: Size,
    layout: &ReportLayout,
    fonts: &ReportFonts,
    date: NaiveDate,
) -> Result<Document> {
    let frame = layout.margins.content_rect(geometry);
    if frame.width <= Pt::ZERO || frame.height <= Pt::ZERO {
        return Err(ReportError::InvalidConfiguration(format!(
            "margins leave no room for the table on a {}x{}pt page",
            geometry.width.to_f32(),
            geometry.height.to_f32()
        )));
    }

    let band_fonts = fonts.clone();
    let band_layout = layout.clone();
    let band_client = client_name.to_string();
    let band_date = date.format("%Y-%m-%d").to_string();
    let template = PageTemplate::new("table_template", geometry)
        .with_frame(frame)
        .set_on_page(move |canvas: &mut Canvas, ctx: &DocContext| {
            draw_header_band(canvas, ctx, &band_fonts, &band_layout, &band_client, &band_date);
        });

    let mut doc = DocTemplate::new(vec![template]);
    if !table.columns().is_empty() {
        doc.add_flowable(Box::new(table_flowable(table, fonts, layout, frame.width)));
    }
    doc.build()
}

/// Renders the overlay document: header bands plus the flowing table, and
/// nothing else. Apart from `date`, equal inputs give equal bytes.
pub fn build_overlay(
    table: &Table,
    client_name: &str,
    language: Language,
    geometry: Size,
    layout: &ReportLayout,
    fonts: &ReportFonts,
    date: NaiveDate,
) -> Result<Vec<u8>> {
    let document = build_overlay_document(table, client_name, geometry, layout, fonts, date)?;
    let pages = document.pages.len();
    let options = PdfOptions {
        lang: Some(language.pdf_lang().to_string()),
        title: Some(report_title(language, client_name)),
        ..PdfOptions::default()
    };
    let bytes = document_to_pdf(&document, &fonts.registry, &options)?;
    info!("overlay rendered: {} rows on {pages} page(s)", table.len());
    Ok(bytes)
}

fn report_title(language: Language, client_name: &str) -> String {
    let label = match language {
        Language::Es => "Reporte de cargas",
        Language::En => "Shipment report",
    };
    let client_name = client_name.trim();
    if client_name.is_empty() {
        label.to_string()
    } else {
        format!("{label} - {client_name}")
    }
}

/// Overlay plus merge: reads the template at `template_path`, sizes the
/// overlay to its first page and composites the two.
pub fn render_report(
    table: &Table,
    client_name: &str,
    language: Language,
    template_path: &Path,
    layout: &ReportLayout,
    fonts: &ReportFonts,
    date: NaiveDate,
) -> Result<Vec<u8>> {
    let template = std::fs::read(template_path).map_err(|err| {
        ReportError::Asset(format!("cannot read template {}: {err}", template_path.display()))
    })?;
    let report = inspect_template_bytes(&template)?;
    require_composable(&report)?;
    let overlay = build_overlay(
        table,
        client_name,
        language,
        report.geometry,
        layout,
        fonts,
        date,
    )?;
    merge_with_template(&template, &overlay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Command;
    use crate::flowable::BODY_ROW_META_KEY;
    use crate::font::tests::font_path;
    use crate::inspect::tests::make_pdf_bytes;
    use lopdf::Document as LoDocument;

    fn fonts() -> ReportFonts {
        ReportFonts::load(&font_path("DejaVuSans.ttf"), &font_path("DejaVuSans-Bold.ttf"))
            .expect("fonts")
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).expect("date")
    }

    fn shipments(rows: usize) -> Table {
        Table::from_rows(
            vec!["CASE ID".into(), "SHIPPER".into(), "STATUS".into()],
            (0..rows)
                .map(|i| vec![format!("C{i}"), "Acme".into(), "CARGO IN TRANSIT".into()])
                .collect(),
        )
    }

    fn draw_positions(doc: &Document, page: usize, text: &str) -> Option<(Pt, Pt)> {
        doc.pages[page].commands.iter().find_map(|cmd| match cmd {
            Command::DrawString { x, y, text: t } if t == text => Some((*x, *y)),
            _ => None,
        })
    }

    #[test]
    fn empty_table_still_renders_header_band_and_header_row() {
        let doc = build_overlay_document(
            &shipments(0),
            "ACME CORP",
            Size::a2_landscape(),
            &ReportLayout::default(),
            &fonts(),
            date(),
        )
        .expect("layout");
        assert_eq!(doc.pages.len(), 1);
        let strings: Vec<&str> = doc.pages[0].strings().collect();
        assert_eq!(strings, vec!["ACME CORP", "2024-05-01", "CASE ID", "SHIPPER", "STATUS"]);
    }

    #[test]
    fn table_without_columns_renders_only_the_band() {
        let doc = build_overlay_document(
            &Table::default(),
            "ACME",
            Size::a2_landscape(),
            &ReportLayout::default(),
            &fonts(),
            date(),
        )
        .expect("layout");
        assert_eq!(doc.pages.len(), 1);
        assert_eq!(doc.pages[0].strings().count(), 2);
    }

    #[test]
    fn header_band_sits_at_its_anchors() {
        let fonts = fonts();
        let doc = build_overlay_document(
            &shipments(1),
            "ACME",
            Size::a2_landscape(),
            &ReportLayout::default(),
            &fonts,
            date(),
        )
        .expect("layout");
        // Baselines at 915 and 925 from the bottom of a 1191pt page.
        assert_eq!(
            draw_positions(&doc, 0, "ACME"),
            Some((Pt::from_i32(680), Pt::from_i32(1191 - 915 - 30)))
        );
        let width = fonts
            .registry
            .measure_text_width(&fonts.bold, Pt::from_i32(12), "2024-05-01");
        assert_eq!(
            draw_positions(&doc, 0, "2024-05-01"),
            Some((Pt::from_i32(1620) - width, Pt::from_i32(1191 - 925 - 12)))
        );
    }

    #[test]
    fn long_tables_flow_with_repeated_header() {
        let doc = build_overlay_document(
            &shipments(100),
            "ACME",
            Size::a2_landscape(),
            &ReportLayout::default(),
            &fonts(),
            date(),
        )
        .expect("layout");
        // 30.4pt header row, 26.8pt body rows, 791pt frame: 28 rows per page.
        assert_eq!(doc.pages.len(), 4);

        let mut rows = Vec::new();
        for page in &doc.pages {
            let strings: Vec<&str> = page.strings().collect();
            assert_eq!(&strings[..5], ["ACME", "2024-05-01", "CASE ID", "SHIPPER", "STATUS"]);
            rows.extend(page.meta_values(BODY_ROW_META_KEY).map(str::to_string));
        }
        let expected: Vec<String> = (0..100).map(|i| i.to_string()).collect();
        assert_eq!(rows, expected);
    }

    #[test]
    fn divider_needs_two_data_rows() {
        let count_strokes = |rows: usize| {
            let doc = build_overlay_document(
                &shipments(rows),
                "ACME",
                Size::a2_landscape(),
                &ReportLayout::default(),
                &fonts(),
                date(),
            )
            .expect("layout");
            doc.pages[0]
                .commands
                .iter()
                .filter(|cmd| matches!(cmd, Command::Stroke))
                .count()
        };
        assert_eq!(count_strokes(1), 0);
        assert_eq!(count_strokes(3), 3);
    }

    #[test]
    fn overlay_bytes_are_deterministic_for_a_fixed_date() {
        let fonts = fonts();
        let render = || {
            build_overlay(
                &shipments(40),
                "ACME",
                Language::En,
                Size::a2_landscape(),
                &ReportLayout::default(),
                &fonts,
                date(),
            )
            .expect("overlay")
        };
        let bytes = render();
        assert_eq!(bytes, render());
        let doc = LoDocument::load_mem(&bytes).expect("parse");
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn operator_view_translates_and_appends_comments() {
        let table = Table::from_rows(
            vec!["STATUS".into(), "SHIPPER".into(), "ORIGIN".into()],
            vec![vec!["T".into(), "Acme".into(), "SCL".into()]],
        );
        let selected = vec!["SHIPPER".to_string(), "STATUS".to_string(), "ETA".to_string()];
        let view = prepare_operator_view(&table, &selected, Language::Es);
        assert_eq!(view.columns(), ["SHIPPER", "STATUS", "COMENTARIOS"]);
        assert_eq!(view.raw_rows()[0], vec!["Acme", "CARGA EN TRANSITO", ""]);
    }

    #[test]
    fn blank_comments_are_dropped_before_rendering() {
        let table = Table::from_rows(
            vec!["COMENTARIOS".into(), "STATUS".into()],
            vec![
                vec![" ".into(), "CARGA EN TRANSITO".into()],
                vec!["None".into(), "D".into()],
            ],
        );
        let out = finalize_for_render(&table, Language::En);
        assert_eq!(out.columns(), ["STATUS"]);
        assert_eq!(out.raw_rows()[0], vec!["CARGO IN TRANSIT"]);
        assert_eq!(out.raw_rows()[1], vec!["EMPTY CONTAINER NOT RETURNED"]);
    }

    #[test]
    fn filled_comments_move_last() {
        let table = Table::from_rows(
            vec!["COMENTARIOS".into(), "STATUS".into()],
            vec![vec!["call agent".into(), "T".into()], vec!["".into(), "D".into()]],
        );
        let out = finalize_for_render(&table, Language::Es);
        assert_eq!(out.columns(), ["STATUS", "COMENTARIOS"]);
        assert_eq!(out.raw_rows()[0], vec!["CARGA EN TRANSITO", "call agent"]);
    }

    #[test]
    fn render_report_merges_every_overlay_page() {
        let dir = tempfile::tempdir().expect("tempdir");
        let template_path = dir.path().join("reporte.pdf");
        std::fs::write(&template_path, make_pdf_bytes(&["BG"], 1684, 1191, false)).expect("write");
        let bytes = render_report(
            &shipments(60),
            "ACME",
            Language::Es,
            &template_path,
            &ReportLayout::default(),
            &fonts(),
            date(),
        )
        .expect("render");
        let doc = LoDocument::load_mem(&bytes).expect("parse");
        assert_eq!(doc.get_pages().len(), 3);

        let info_id = doc
            .trailer
            .get(b"Info")
            .and_then(lopdf::Object::as_reference)
            .expect("info");
        let title = doc
            .get_dictionary(info_id)
            .and_then(|info| info.get(b"Title"))
            .and_then(lopdf::Object::as_str)
            .expect("title");
        assert_eq!(title, b"Reporte de cargas - ACME");
    }

    #[test]
    fn default_layout_uses_the_report_palette() {
        let layout = ReportLayout::default();
        assert_eq!(layout.header_color, Color::rgb(0.2, 0.2, 0.2));
        assert_eq!(
            layout.divider.color,
            Color::rgb(224.0 / 255.0, 224.0 / 255.0, 224.0 / 255.0)
        );
        assert_eq!(report_title(Language::En, "  "), "Shipment report");
    }

    fn glyph_ids(font_file: &str, text: &str) -> Vec<u16> {
        let data = std::fs::read(font_path(font_file)).expect("font bytes");
        let face = ttf_parser::Face::parse(&data, 0).expect("face");
        text.chars()
            .map(|ch| face.glyph_index(ch).map(|id| id.0).expect("glyph in font"))
            .collect()
    }

    fn hex(ids: &[u16]) -> String {
        ids.iter().map(|id| format!("{id:04X}")).collect()
    }

    #[test]
    fn central_european_names_print_with_their_own_glyphs() {
        let table = Table::from_rows(
            vec!["SHIPPER".into(), "STATUS".into()],
            vec![vec!["Łódź Trading".into(), "CARGO IN TRANSIT".into()]],
        );
        let bytes = build_overlay(
            &table,
            "Šťastný s.r.o.",
            Language::En,
            Size::a2_landscape(),
            &ReportLayout::default(),
            &fonts(),
            date(),
        )
        .expect("overlay");
        let doc = LoDocument::load_mem(&bytes).expect("parse");
        let page = doc.get_pages()[&1];
        let content = String::from_utf8_lossy(&doc.get_page_content(page).expect("content")).to_string();

        let client = glyph_ids("DejaVuSans-Bold.ttf", "Šťastný s.r.o.");
        assert!(content.contains(&format!("<{}> Tj", hex(&client))));
        let shipper = glyph_ids("DejaVuSans.ttf", "Łódź");
        assert!(content.contains(&format!("<{}", hex(&shipper))));
        assert!(!content.contains("(?"));

        let cmap = crate::pdf::tests::to_unicode_text(&doc);
        assert!(cmap.contains(&format!("<{:04X}> <0141>", shipper[0])));
        assert!(cmap.contains(&format!("<{:04X}> <0160>", client[0])));
        assert!(cmap.contains(&format!("<{:04X}> <0165>", client[1])));
    }

    #[test]
    fn missing_template_is_an_asset_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = render_report(
            &shipments(1),
            "ACME",
            Language::Es,
            &dir.path().join("missing.pdf"),
            &ReportLayout::default(),
            &fonts(),
            date(),
        )
        .err();
        assert!(matches!(err, Some(ReportError::Asset(_))));
    }

    #[test]
    fn missing_fonts_fail_loading() {
        let err = ReportFonts::load(Path::new("/nonexistent/regular.ttf"), &font_path("DejaVuSans-Bold.ttf")).err();
        assert!(matches!(err, Some(ReportError::Asset(_))));
    }
}
