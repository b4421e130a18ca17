use crate::canvas::Canvas;
use crate::flowable::Flowable;
use crate::types::{Pt, Rect};

pub enum AddResult {
    Placed,
    Split(Box<dyn Flowable>),
    Overflow(Box<dyn Flowable>),
}

/// A rectangular region of a page that flowables fill top to bottom.
pub struct Frame {
    rect: Rect,
    cursor_y: Pt,
}

impl Frame {
    pub fn new(rect: Rect) -> Self {
        Self {
            rect,
            cursor_y: Pt::ZERO,
        }
    }

    pub fn remaining_height(&self) -> Pt {
        (self.rect.height - self.cursor_y).max(Pt::ZERO)
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn is_empty(&self) -> bool {
        self.cursor_y <= Pt::ZERO
    }

    pub fn add(&mut self, flowable: Box<dyn Flowable>, canvas: &mut Canvas) -> AddResult {
        let avail_width = self.rect.width;
        let avail_height = self.remaining_height();
        if avail_height <= Pt::ZERO {
            return AddResult::Overflow(flowable);
        }

        let size = flowable.wrap(avail_width, avail_height);
        if size.height <= avail_height {
            self.place(flowable.as_ref(), canvas, size.height);
            return AddResult::Placed;
        }

        if let Some((first, second)) = flowable.split(avail_width, avail_height) {
            let first_size = first.wrap(avail_width, avail_height);
            // An overfull first part is only accepted on an empty frame; moving
            // it to a fresh frame would not help.
            if first_size.height > Pt::ZERO
                && (first_size.height <= avail_height || self.is_empty())
            {
                self.place(first.as_ref(), canvas, first_size.height);
                return AddResult::Split(second);
            }
        }

        // Taller than a full frame and cannot be split: place it anyway so
        // pagination keeps moving forward.
        if self.is_empty() {
            self.place(flowable.as_ref(), canvas, self.rect.height);
            return AddResult::Placed;
        }

        AddResult::Overflow(flowable)
    }

    fn place(&mut self, flowable: &dyn Flowable, canvas: &mut Canvas, height: Pt) {
        flowable.draw(
            canvas,
            self.rect.x,
            self.rect.y + self.cursor_y,
            self.rect.width,
            self.remaining_height(),
        );
        self.cursor_y = (self.cursor_y + height).min(self.rect.height);
    }
}
