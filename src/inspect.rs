use crate::error::{ReportError, Result, lopdf_err};
use crate::types::Size;
use lopdf::{Dictionary, Document as LoDocument, Object as LoObject, ObjectId};
use std::path::Path;

/// US Letter, used when a page carries no usable MediaBox.
const DEFAULT_PAGE_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateReport {
    pub pdf_version: String,
    pub page_count: usize,
    pub encrypted: bool,
    pub file_size_bytes: usize,
    /// Size of the first page; every generated page uses it.
    pub geometry: Size,
}

pub fn inspect_template_bytes(bytes: &[u8]) -> Result<TemplateReport> {
    let pdf = LoDocument::load_mem(bytes).map_err(lopdf_err)?;
    let pages = pdf.get_pages();
    let geometry = match pages.values().next() {
        Some(first) => page_size(&pdf, *first),
        None => Size::new(0.0, 0.0),
    };
    Ok(TemplateReport {
        pdf_version: pdf.version.clone(),
        page_count: pages.len(),
        encrypted: pdf.is_encrypted(),
        file_size_bytes: bytes.len(),
        geometry,
    })
}

pub fn inspect_template_path(path: &Path) -> Result<TemplateReport> {
    let data = std::fs::read(path).map_err(|err| {
        ReportError::Asset(format!("cannot read template {}: {err}", path.display()))
    })?;
    inspect_template_bytes(&data)
}

/// Fails unless the template can serve as a background: readable,
/// unencrypted and with at least one page.
pub fn require_composable(report: &TemplateReport) -> Result<()> {
    if report.encrypted {
        return Err(ReportError::Pdf(
            "encrypted pdf templates are not supported".to_string(),
        ));
    }
    if report.page_count == 0 {
        return Err(ReportError::Pdf("pdf has no pages".to_string()));
    }
    Ok(())
}

/// Reads the template at `path` and returns its first-page size.
pub fn template_geometry(path: &Path) -> Result<Size> {
    let report = inspect_template_path(path)?;
    require_composable(&report)?;
    Ok(report.geometry)
}

/// Page width and height from the page's MediaBox, inherited through
/// the page tree when the page itself does not carry one.
pub(crate) fn page_size(doc: &LoDocument, page_id: ObjectId) -> Size {
    let [x0, y0, x1, y1] = page_box(doc, page_id, b"MediaBox").unwrap_or_else(|| {
        log::warn!("page {page_id:?} has no MediaBox; assuming US Letter");
        DEFAULT_PAGE_BOX
    });
    Size::new((x1 - x0).abs(), (y1 - y0).abs())
}

pub(crate) fn page_box(doc: &LoDocument, page_id: ObjectId, key: &[u8]) -> Option<[f32; 4]> {
    let mut current = doc.get_dictionary(page_id).ok();
    // Bounded walk so a cyclic Parent chain cannot loop forever.
    for _ in 0..32 {
        let dict = current?;
        if let Some(rect) = dict_box(doc, dict, key) {
            return Some(rect);
        }
        current = match dict.get(b"Parent") {
            Ok(LoObject::Reference(parent)) => doc.get_dictionary(*parent).ok(),
            _ => None,
        };
    }
    None
}

fn dict_box(doc: &LoDocument, dict: &Dictionary, key: &[u8]) -> Option<[f32; 4]> {
    let obj = match dict.get(key).ok()? {
        LoObject::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    let values: Vec<f32> = obj
        .as_array()
        .ok()?
        .iter()
        .filter_map(number)
        .collect();
    match values.as_slice() {
        [x0, y0, x1, y1] => Some([*x0, *y0, *x1, *y1]),
        _ => None,
    }
}

fn number(obj: &LoObject) -> Option<f32> {
    match obj {
        LoObject::Integer(value) => Some(*value as f32),
        LoObject::Real(value) => Some(*value as f32),
        _ => None,
    }
}
