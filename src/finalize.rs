use crate::error::{ReportError, Result, lopdf_err};
use crate::inspect::page_box;
use lopdf::{Dictionary, Document as LoDocument, Object as LoObject, ObjectId, Stream as LoStream, dictionary};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Fixed name of the rendered report inside the output directory.
pub const OUTPUT_FILE_NAME: &str = "reporte_cargas.pdf";

const DEFAULT_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

fn load(bytes: &[u8], what: &str) -> Result<LoDocument> {
    let doc = LoDocument::load_mem(bytes)
        .map_err(|err| ReportError::Pdf(format!("invalid {what} pdf: {err}")))?;
    if doc.is_encrypted() {
        return Err(ReportError::Pdf(format!("{what} pdf is encrypted")));
    }
    if doc.get_pages().is_empty() {
        return Err(ReportError::Pdf(format!("{what} pdf has no pages")));
    }
    Ok(doc)
}

fn box_object(rect: [f32; 4]) -> LoObject {
    LoObject::Array(rect.iter().map(|v| LoObject::from(*v)).collect())
}

/// MediaBox of a page, inherited through the page tree. The overlay is
/// laid out on the template's MediaBox, so the merged page uses it too.
fn media_box(doc: &LoDocument, page_id: ObjectId) -> [f32; 4] {
    page_box(doc, page_id, b"MediaBox").unwrap_or_else(|| {
        log::warn!("page {page_id:?} has no MediaBox; assuming US Letter");
        DEFAULT_BOX
    })
}

fn page_resources_object(doc: &LoDocument, page_id: ObjectId) -> LoObject {
    let mut current = doc.get_dictionary(page_id).ok();
    for _ in 0..32 {
        let Some(dict) = current else {
            break;
        };
        match dict.get(b"Resources") {
            Ok(LoObject::Reference(id)) => {
                return doc
                    .get_object(*id)
                    .cloned()
                    .unwrap_or_else(|_| LoObject::Dictionary(Dictionary::new()));
            }
            Ok(LoObject::Dictionary(d)) => return LoObject::Dictionary(d.clone()),
            _ => {}
        }
        current = match dict.get(b"Parent") {
            Ok(LoObject::Reference(parent)) => doc.get_dictionary(*parent).ok(),
            _ => None,
        };
    }
    LoObject::Dictionary(Dictionary::new())
}

fn import_document_objects(dst: &mut LoDocument, mut src: LoDocument) -> Vec<ObjectId> {
    let start_id = dst.max_id + 1;
    src.renumber_objects_with(start_id);
    let page_ids: Vec<ObjectId> = src.get_pages().values().copied().collect();
    if src.max_id > dst.max_id {
        dst.max_id = src.max_id;
    }
    dst.objects.extend(src.objects);
    page_ids
}

/// Wraps a page's content and resources into a Form XObject so it can be
/// painted onto another page at its original position.
fn page_form(doc: &mut LoDocument, page_id: ObjectId, bbox: [f32; 4]) -> Result<ObjectId> {
    let content = doc.get_page_content(page_id).map_err(lopdf_err)?;
    let resources = page_resources_object(doc, page_id);
    Ok(doc.add_object(LoStream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "FormType" => 1,
            "BBox" => box_object(bbox),
            "Resources" => resources,
        },
        content,
    )))
}

/// Paints every overlay page on top of a background page. Overlay page `i`
/// gets template page `i` when the template has one and the template's
/// first page otherwise. Each output page takes the background page's box;
/// neither layer is scaled or moved. The overlay's language and document
/// info carry over.
pub fn merge_with_template(template_pdf: &[u8], overlay_pdf: &[u8]) -> Result<Vec<u8>> {
    let template = load(template_pdf, "template")?;
    let overlay = load(overlay_pdf, "overlay")?;
    let lang = overlay
        .catalog()
        .ok()
        .and_then(|catalog| catalog.get(b"Lang").ok())
        .cloned();
    let info = overlay
        .trailer
        .get(b"Info")
        .and_then(LoObject::as_reference)
        .and_then(|id| overlay.get_dictionary(id))
        .ok()
        .cloned();

    let mut composed = LoDocument::with_version("1.5");
    let template_pages = import_document_objects(&mut composed, template);
    let overlay_pages = import_document_objects(&mut composed, overlay);
    if overlay_pages.len() > template_pages.len() {
        log::debug!(
            "overlay has {} pages, template {}; extra pages reuse template page 1",
            overlay_pages.len(),
            template_pages.len()
        );
    }

    let pages_id = composed.new_object_id();
    let mut kids: Vec<LoObject> = Vec::with_capacity(overlay_pages.len());
    let mut background_forms: HashMap<ObjectId, (ObjectId, [f32; 4])> = HashMap::new();

    for (idx, overlay_page_id) in overlay_pages.iter().copied().enumerate() {
        let Some(background_page_id) = template_pages
            .get(idx)
            .or_else(|| template_pages.first())
            .copied()
        else {
            return Err(ReportError::Pdf("template pdf has no pages".to_string()));
        };

        let (background_form_id, background_box) = match background_forms.get(&background_page_id) {
            Some(entry) => *entry,
            None => {
                let bbox = media_box(&composed, background_page_id);
                let form_id = page_form(&mut composed, background_page_id, bbox)?;
                background_forms.insert(background_page_id, (form_id, bbox));
                (form_id, bbox)
            }
        };
        let overlay_box = media_box(&composed, overlay_page_id);
        let overlay_form_id = page_form(&mut composed, overlay_page_id, overlay_box)?;

        let content = b"q /BG Do Q\nq /OV Do Q\n".to_vec();
        let content_id = composed.add_object(LoStream::new(dictionary! {}, content));
        let page_id = composed.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    "BG" => background_form_id,
                    "OV" => overlay_form_id,
                },
            },
            "MediaBox" => box_object(background_box),
        });
        kids.push(LoObject::Reference(page_id));
    }

    let count = kids.len() as i64;
    composed.objects.insert(
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
    if let Some(lang) = lang {
        catalog.set("Lang", lang);
    }
    let catalog_id = composed.add_object(catalog);
    composed.trailer.set("Root", catalog_id);
    if let Some(info) = info {
        let info_id = composed.add_object(info);
        composed.trailer.set("Info", info_id);
    }
    composed.prune_objects();
    composed.renumber_objects();
    composed.compress();

    let mut out = Vec::new();
    composed
        .save_to(&mut out)
        .map_err(|err| ReportError::Pdf(err.to_string()))?;
    Ok(out)
}

/// Writes the merged report as `output_dir/reporte_cargas.pdf`, creating
/// the directory when needed.
pub fn write_report(output_dir: &Path, bytes: &[u8]) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join(OUTPUT_FILE_NAME);
    let mut file = std::fs::File::create(&path)?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::tests::make_pdf_bytes;

    fn xobject_content(doc: &LoDocument, page_id: ObjectId, name: &[u8]) -> String {
        let page = doc.get_dictionary(page_id).expect("page");
        let resources = page
            .get(b"Resources")
            .and_then(LoObject::as_dict)
            .expect("resources");
        let xobjects = resources
            .get(b"XObject")
            .and_then(LoObject::as_dict)
            .expect("xobjects");
        let form_id = xobjects
            .get(name)
            .and_then(LoObject::as_reference)
            .expect("form ref");
        let stream = doc
            .get_object(form_id)
            .and_then(LoObject::as_stream)
            .expect("form stream");
        let content = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        String::from_utf8_lossy(&content).to_string()
    }

    #[test]
    fn extra_overlay_pages_reuse_first_template_page() {
        let template = make_pdf_bytes(&["T0", "T1"], 1684, 1191, false);
        let overlay = make_pdf_bytes(&["O0", "O1", "O2"], 1684, 1191, false);
        let merged = merge_with_template(&template, &overlay).expect("merge");

        let doc = LoDocument::load_mem(&merged).expect("parse merged");
        let pages: Vec<ObjectId> = doc.get_pages().values().copied().collect();
        assert_eq!(pages.len(), 3);

        let backgrounds: Vec<String> = pages
            .iter()
            .map(|id| xobject_content(&doc, *id, b"BG"))
            .collect();
        assert!(backgrounds[0].contains("(T0)"));
        assert!(backgrounds[1].contains("(T1)"));
        assert!(backgrounds[2].contains("(T0)"));

        for (idx, id) in pages.iter().enumerate() {
            assert!(xobject_content(&doc, *id, b"OV").contains(&format!("(O{idx})")));
            let content = String::from_utf8_lossy(&doc.get_page_content(*id).expect("content")).to_string();
            let bg = content.find("/BG Do").expect("background drawn");
            let ov = content.find("/OV Do").expect("overlay drawn");
            assert!(bg < ov);
        }
    }

    #[test]
    fn output_pages_take_the_background_box() {
        let template = make_pdf_bytes(&["T0"], 1684, 1191, true);
        let overlay = make_pdf_bytes(&["O0"], 612, 792, false);
        let merged = merge_with_template(&template, &overlay).expect("merge");
        let report = crate::inspect::inspect_template_bytes(&merged).expect("inspect");
        assert_eq!(report.page_count, 1);
        assert_eq!(report.geometry, crate::types::Size::a2_landscape());
    }

    #[test]
    fn merged_pages_match_template_geometry_despite_crop_box() {
        let mut template = LoDocument::load_mem(&make_pdf_bytes(&["T0"], 1684, 1191, true)).expect("parse");
        let page_ids: Vec<ObjectId> = template.get_pages().values().copied().collect();
        for id in page_ids {
            let page = template.get_dictionary_mut(id).expect("page");
            page.set("CropBox", vec![0.into(), 0.into(), 842.into(), 595.into()]);
        }
        let dir = tempfile::tempdir().expect("tempdir");
        let template_path = dir.path().join("cropped.pdf");
        template.save(&template_path).expect("save template");

        let geometry = crate::inspect::template_geometry(&template_path).expect("geometry");
        assert_eq!(geometry, crate::types::Size::a2_landscape());

        let template_bytes = std::fs::read(&template_path).expect("read template");
        let overlay = make_pdf_bytes(&["O0", "O1"], 1684, 1191, false);
        let merged = merge_with_template(&template_bytes, &overlay).expect("merge");

        let doc = LoDocument::load_mem(&merged).expect("parse merged");
        for id in doc.get_pages().values() {
            assert_eq!(page_box(&doc, *id, b"MediaBox"), Some([0.0, 0.0, 1684.0, 1191.0]));
        }
    }

    #[test]
    fn malformed_inputs_are_surfaced() {
        let good = make_pdf_bytes(&["X"], 100, 100, false);
        assert!(matches!(
            merge_with_template(b"garbage", &good),
            Err(ReportError::Pdf(_))
        ));
        assert!(matches!(
            merge_with_template(&good, b"not a pdf either"),
            Err(ReportError::Pdf(_))
        ));
    }

    #[test]
    fn merging_is_deterministic() {
        let template = make_pdf_bytes(&["T0"], 1684, 1191, false);
        let overlay = make_pdf_bytes(&["O0", "O1"], 1684, 1191, false);
        let a = merge_with_template(&template, &overlay).expect("merge");
        let b = merge_with_template(&template, &overlay).expect("merge");
        assert_eq!(a, b);
    }

    #[test]
    fn write_report_uses_fixed_file_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out_dir = dir.path().join("nested").join("output");
        let path = write_report(&out_dir, b"%PDF-1.5").expect("write");
        assert_eq!(path, out_dir.join(OUTPUT_FILE_NAME));
        assert_eq!(std::fs::read(&path).expect("read"), b"%PDF-1.5");
    }
}
