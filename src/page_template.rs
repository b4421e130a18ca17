use crate::canvas::Canvas;
use crate::frame::Frame;
use crate::types::{Rect, Size};
use std::sync::Arc;

/// What a page decoration knows about the page being started.
#[derive(Debug, Clone, PartialEq)]
pub struct DocContext {
    /// One-based: the first page of a document is 1.
    pub page_number: usize,
    pub page_size: Size,
    pub template_name: String,
}

pub type OnPageCallback = Arc<dyn Fn(&mut Canvas, &DocContext) + Send + Sync>;

/// A page layout: its size, the frames the story flows through, and the
/// decoration drawn before any content of every page.
#[derive(Clone)]
pub struct PageTemplate {
    pub name: String,
    pub page_size: Size,
    frames: Vec<Rect>,
    on_page: Option<OnPageCallback>,
}

impl PageTemplate {
    pub fn new(name: impl Into<String>, page_size: Size) -> Self {
        Self {
            name: name.into(),
            page_size,
            frames: Vec::new(),
            on_page: None,
        }
    }

    /// Frames are filled in the order they are added.
    pub fn with_frame(mut self, rect: Rect) -> Self {
        self.frames.push(rect);
        self
    }

    pub fn set_on_page<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut Canvas, &DocContext) + Send + Sync + 'static,
    {
        self.on_page = Some(Arc::new(callback));
        self
    }

    /// Decorates a fresh page and hands back empty frames for its content.
    pub(crate) fn begin_page(&self, canvas: &mut Canvas, page_number: usize) -> Vec<Frame> {
        if let Some(callback) = &self.on_page {
            let ctx = DocContext {
                page_number,
                page_size: self.page_size,
                template_name: self.name.clone(),
            };
            callback(canvas, &ctx);
        }
        self.frames.iter().copied().map(Frame::new).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Pt;
    use std::sync::Mutex;

    #[test]
    fn begin_page_runs_decoration_with_page_context() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let frame = Rect {
            x: Pt::from_i32(10),
            y: Pt::from_i32(20),
            width: Pt::from_i32(100),
            height: Pt::from_i32(50),
        };
        let template = PageTemplate::new("table_template", Size::a2_landscape())
            .with_frame(frame)
            .set_on_page(move |_canvas, ctx| {
                sink.lock().expect("lock").push(ctx.clone());
            });

        let mut canvas = Canvas::new(Size::a2_landscape());
        let frames = template.begin_page(&mut canvas, 2);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].rect(), frame);
        assert_eq!(
            seen.lock().expect("lock").as_slice(),
            [DocContext {
                page_number: 2,
                page_size: Size::a2_landscape(),
                template_name: "table_template".to_string(),
            }]
        );
    }
}
