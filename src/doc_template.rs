use crate::canvas::{Canvas, Document};
use crate::error::{ReportError, Result};
use crate::flowable::Flowable;
use crate::frame::{AddResult, Frame};
use crate::page_template::PageTemplate;
use log::debug;
use std::collections::VecDeque;

/// Lays a story of flowables out over pages. Page `n` uses template
/// `min(n, len) - 1`, so the last template repeats.
pub struct DocTemplate {
    page_templates: Vec<PageTemplate>,
    story: Vec<Box<dyn Flowable>>,
}

struct PageCursor {
    page_number: usize,
    frames: Vec<Frame>,
    frame_index: usize,
    placed_on_page: bool,
}

impl DocTemplate {
    pub fn new(page_templates: Vec<PageTemplate>) -> Self {
        Self {
            page_templates,
            story: Vec::new(),
        }
    }

    pub fn add_flowable(&mut self, flowable: Box<dyn Flowable>) {
        self.story.push(flowable);
    }

    fn select_template(&self, page_number: usize) -> Option<&PageTemplate> {
        let idx = page_number
            .saturating_sub(1)
            .min(self.page_templates.len().saturating_sub(1));
        self.page_templates.get(idx)
    }

    fn start_page(&self, canvas: &mut Canvas, page_number: usize) -> Result<PageCursor> {
        let template = self
            .select_template(page_number)
            .ok_or(ReportError::MissingPageTemplate)?;
        Ok(PageCursor {
            page_number,
            frames: template.begin_page(canvas, page_number),
            frame_index: 0,
            placed_on_page: false,
        })
    }

    fn next_page(&self, canvas: &mut Canvas, cursor: &PageCursor, reason: &str) -> Result<PageCursor> {
        debug!(
            "page break {} -> {} ({reason})",
            cursor.page_number,
            cursor.page_number + 1
        );
        canvas.show_page();
        self.start_page(canvas, cursor.page_number + 1)
    }

    /// Produces at least one page, even for an empty story.
    pub fn build(mut self) -> Result<Document> {
        let page_size = self
            .select_template(1)
            .ok_or(ReportError::MissingPageTemplate)?
            .page_size;
        let mut canvas = Canvas::new(page_size);
        let mut story: VecDeque<Box<dyn Flowable>> = std::mem::take(&mut self.story).into();
        let mut cursor = self.start_page(&mut canvas, 1)?;

        while let Some(flowable) = story.pop_front() {
            let mut current = flowable;
            loop {
                if cursor.frame_index >= cursor.frames.len() {
                    cursor = self.next_page(&mut canvas, &cursor, "frame_exhausted")?;
                }
                if cursor.frames.is_empty() {
                    return Err(ReportError::MissingPageTemplate);
                }

                let is_last_frame = cursor.frame_index + 1 >= cursor.frames.len();
                let name = current.debug_name();
                let frame = &mut cursor.frames[cursor.frame_index];
                let frame_rect = frame.rect();
                match frame.add(current, &mut canvas) {
                    AddResult::Placed => {
                        cursor.placed_on_page = true;
                        break;
                    }
                    AddResult::Split(remaining) => {
                        debug!("{name} split on page {}", cursor.page_number);
                        cursor.placed_on_page = true;
                        current = remaining;
                        cursor.frame_index += 1;
                    }
                    AddResult::Overflow(remaining) => {
                        if !cursor.placed_on_page && is_last_frame {
                            let size = remaining.wrap(frame_rect.width, frame_rect.height);
                            return Err(ReportError::UnplaceableFlowable(format!(
                                "{name} size={}x{}pt frame={}x{}pt",
                                size.width.to_f32(),
                                size.height.to_f32(),
                                frame_rect.width.to_f32(),
                                frame_rect.height.to_f32(),
                            )));
                        }
                        current = remaining;
                        cursor.frame_index += 1;
                    }
                }
            }
        }

        Ok(canvas.finish())
    }
}
