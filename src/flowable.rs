use crate::canvas::Canvas;
use crate::font::FontRegistry;
use crate::types::{Color, Pt, Size};
use std::borrow::Cow;
use std::sync::{Arc, OnceLock};

/// Meta key recorded before each body row is drawn; the value is the row's
/// index in the unsplit table.
pub const BODY_ROW_META_KEY: &str = "table.body_row";

pub trait Flowable: FlowableClone + Send + Sync {
    fn wrap(&self, avail_width: Pt, avail_height: Pt) -> Size;
    fn split(
        &self,
        avail_width: Pt,
        avail_height: Pt,
    ) -> Option<(Box<dyn Flowable>, Box<dyn Flowable>)>;
    fn draw(&self, canvas: &mut Canvas, x: Pt, y: Pt, avail_width: Pt, avail_height: Pt);

    fn debug_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

pub trait FlowableClone {
    fn clone_box(&self) -> Box<dyn Flowable>;
}

impl<T> FlowableClone for T
where
    T: 'static + Flowable + Clone,
{
    fn clone_box(&self) -> Box<dyn Flowable> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn Flowable> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

#[derive(Debug, Clone)]
pub struct TextStyle {
    pub font_name: Arc<str>,
    pub font_size: Pt,
    pub line_height: Pt,
    pub line_height_is_auto: bool,
    pub color: Color,
}

impl TextStyle {
    pub fn new(font_name: impl Into<Arc<str>>, font_size: f32) -> Self {
        let font_size = Pt::from_f32(font_size);
        Self {
            font_name: font_name.into(),
            font_size,
            line_height: font_size.mul_ratio(6, 5),
            line_height_is_auto: true,
            color: Color::BLACK,
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }
}

impl Default for TextStyle {
    fn default() -> Self {
        Self::new("Helvetica", 12.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalAlign {
    Top,
    Middle,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeSizes {
    pub top: Pt,
    pub right: Pt,
    pub bottom: Pt,
    pub left: Pt,
}

impl EdgeSizes {
    pub fn zero() -> Self {
        Self {
            top: Pt::ZERO,
            right: Pt::ZERO,
            bottom: Pt::ZERO,
            left: Pt::ZERO,
        }
    }

    pub fn new(top: f32, right: f32, bottom: f32, left: f32) -> Self {
        Self {
            top: Pt::from_f32(top),
            right: Pt::from_f32(right),
            bottom: Pt::from_f32(bottom),
            left: Pt::from_f32(left),
        }
    }
}

/// A stroked horizontal rule, e.g. the divider under table rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableRule {
    pub width: Pt,
    pub color: Color,
}

/// Splits `total` into `columns` equal widths. Each share is truncated to the
/// millipoint and the last column takes the remainder, so the widths always
/// sum to `total` exactly.
pub fn equal_column_widths(total: Pt, columns: usize) -> Vec<Pt> {
    if columns == 0 {
        return Vec::new();
    }
    let share = total / (columns as i32);
    let mut widths = vec![share; columns - 1];
    let used: Pt = widths.iter().sum();
    widths.push(total - used);
    widths
}

#[derive(Debug, Clone, PartialEq)]
struct LineLayout {
    text: String,
    width: Pt,
}

#[derive(Debug, Clone)]
pub struct TableCell {
    pub text: String,
    pub style: TextStyle,
    pub align: TextAlign,
    pub valign: VerticalAlign,
    pub padding: EdgeSizes,
    font_registry: Option<Arc<FontRegistry>>,
    cached_line_height: Pt,
}

impl TableCell {
    pub fn new(
        text: impl Into<String>,
        style: TextStyle,
        font_registry: Option<Arc<FontRegistry>>,
    ) -> Self {
        let cached_line_height = if style.line_height_is_auto {
            if let Some(registry) = font_registry.as_deref() {
                registry.line_height(&style.font_name, style.font_size, style.line_height)
            } else {
                style.line_height
            }
        } else {
            style.line_height
        };
        Self {
            text: text.into(),
            style,
            align: TextAlign::Left,
            valign: VerticalAlign::Top,
            padding: EdgeSizes::zero(),
            font_registry,
            cached_line_height,
        }
    }

    pub fn with_align(mut self, align: TextAlign) -> Self {
        self.align = align;
        self
    }

    pub fn with_valign(mut self, valign: VerticalAlign) -> Self {
        self.valign = valign;
        self
    }

    pub fn with_padding(mut self, padding: EdgeSizes) -> Self {
        self.padding = padding;
        self
    }

    fn measure_text_width(&self, text: &str) -> Pt {
        if let Some(registry) = self.font_registry.as_deref() {
            return registry.measure_text_width(&self.style.font_name, self.style.font_size, text);
        }
        let char_width = (self.style.font_size * 0.6).max(Pt::from_f32(1.0));
        char_width * (text.chars().count() as i32)
    }

    fn effective_line_height(&self) -> Pt {
        self.cached_line_height
    }

    fn layout_lines(&self, avail_width: Pt) -> Vec<LineLayout> {
        let max_width = avail_width.max(Pt::from_f32(1.0));
        let space_width = self.measure_text_width(" ");
        let mut lines = Vec::new();
        for segment in self.text.split('\n') {
            let before = lines.len();
            let mut current = String::new();
            let mut current_width = Pt::ZERO;
            for word in segment.split_whitespace() {
                let word_width = self.measure_text_width(word);
                if !current.is_empty() {
                    let next_width = current_width + space_width + word_width;
                    if next_width <= max_width {
                        current.push(' ');
                        current.push_str(word);
                        current_width = next_width;
                        continue;
                    }
                    lines.push(LineLayout {
                        text: std::mem::take(&mut current),
                        width: current_width,
                    });
                }
                if word_width > max_width {
                    let mut parts = self.split_long_word(word, max_width);
                    let last = parts.pop().unwrap_or(LineLayout {
                        text: String::new(),
                        width: Pt::ZERO,
                    });
                    lines.extend(parts);
                    current = last.text;
                    current_width = last.width;
                } else {
                    current.push_str(word);
                    current_width = word_width;
                }
            }
            if !current.is_empty() {
                lines.push(LineLayout {
                    text: current,
                    width: current_width,
                });
            }
            if lines.len() == before {
                lines.push(LineLayout {
                    text: String::new(),
                    width: Pt::ZERO,
                });
            }
        }
        lines
    }

    fn split_long_word(&self, word: &str, max_width: Pt) -> Vec<LineLayout> {
        let mut parts = Vec::new();
        let mut current = String::new();
        let mut current_width = Pt::ZERO;
        for ch in word.chars() {
            let w = self.measure_text_width(ch.encode_utf8(&mut [0u8; 4]));
            if !current.is_empty() && current_width + w > max_width {
                parts.push(LineLayout {
                    text: std::mem::take(&mut current),
                    width: current_width,
                });
                current_width = Pt::ZERO;
            }
            current.push(ch);
            current_width = current_width + w;
        }
        if !current.is_empty() {
            parts.push(LineLayout {
                text: current,
                width: current_width,
            });
        }
        parts
    }
}

/// Row-splitting table. A table taller than the frame is split between body
/// rows; continuation parts carry the header again when `repeat_header` is
/// set. Row heights follow the wrapped cell text, so page breaks land where
/// the content actually runs out.
#[derive(Clone)]
pub struct TableFlowable {
    data: Arc<TableFlowableData>,
    body_range: std::ops::Range<usize>,
    include_header: bool,
    repeat_header: bool,
    divider: Option<TableRule>,
    divider_min_rows: usize,
}

impl TableFlowable {
    pub fn new(rows: Vec<Vec<TableCell>>) -> Self {
        let len = rows.len();
        Self {
            data: Arc::new(TableFlowableData {
                header_rows: Vec::new(),
                body_rows: rows,
                column_widths: None,
                layout_cache: OnceLock::new(),
            }),
            body_range: 0..len,
            include_header: true,
            repeat_header: false,
            divider: None,
            divider_min_rows: 1,
        }
    }

    fn data_mut(&mut self) -> &mut TableFlowableData {
        let data = Arc::make_mut(&mut self.data);
        data.layout_cache = OnceLock::new();
        data
    }

    pub fn with_header(mut self, header_rows: Vec<Vec<TableCell>>) -> Self {
        self.data_mut().header_rows = header_rows;
        self
    }

    pub fn repeat_header(mut self, repeat: bool) -> Self {
        self.repeat_header = repeat;
        self
    }

    /// Fixed column widths. Without them the available width is split
    /// with [`equal_column_widths`].
    pub fn with_column_widths(mut self, widths: Vec<Pt>) -> Self {
        self.data_mut().column_widths = Some(widths);
        self
    }

    /// Draws `rule` under every body row, provided the whole table has at
    /// least `min_rows` body rows. Header rows never get the rule.
    pub fn with_row_divider(mut self, rule: TableRule, min_rows: usize) -> Self {
        self.divider = Some(rule);
        self.divider_min_rows = min_rows;
        self
    }

    fn columns(&self) -> usize {
        if let Some(widths) = self.data.column_widths.as_ref() {
            return widths.len().max(1);
        }
        self.data
            .header_rows
            .iter()
            .chain(self.data.body_rows.iter())
            .map(Vec::len)
            .max()
            .unwrap_or(0)
            .max(1)
    }

    fn layout(&self, avail_width: Pt) -> Cow<'_, TableLayoutCache> {
        let columns = self.columns();
        let key = avail_width.to_milli_i64();
        let cache = self
            .data
            .layout_cache
            .get_or_init(|| TableLayoutCache::new(&self.data, avail_width, columns));
        if cache.avail_width_milli == key {
            Cow::Borrowed(cache)
        } else {
            // Width changed since the cache was built. Prefer correctness over caching.
            Cow::Owned(TableLayoutCache::new(&self.data, avail_width, columns))
        }
    }

    fn part(&self, body_range: std::ops::Range<usize>, include_header: bool) -> Self {
        Self {
            data: self.data.clone(),
            body_range,
            include_header,
            repeat_header: self.repeat_header,
            divider: self.divider,
            divider_min_rows: self.divider_min_rows,
        }
    }

    fn draw_row_at(
        canvas: &mut Canvas,
        x: Pt,
        y: Pt,
        col_widths: &[Pt],
        row: &[TableCell],
        row_height: Pt,
        row_lines: &[Vec<LineLayout>],
    ) {
        let mut cursor_x = x;
        for ((cell, col_width), lines) in row.iter().zip(col_widths).zip(row_lines) {
            let col_width = *col_width;
            let padding = cell.padding;
            let content_width = (col_width - padding.left - padding.right).max(Pt::ZERO);
            let content_height = (row_height - padding.top - padding.bottom).max(Pt::ZERO);
            let line_height = cell.effective_line_height();
            let text_block_height = line_height * (lines.len() as i32);
            let text_y = match cell.valign {
                VerticalAlign::Top => y + padding.top,
                VerticalAlign::Middle => {
                    y + padding.top + (content_height - text_block_height).mul_ratio(1, 2)
                }
                VerticalAlign::Bottom => y + row_height - padding.bottom - text_block_height,
            };

            canvas.set_fill_color(cell.style.color);
            canvas.set_font_name(&cell.style.font_name);
            canvas.set_font_size(cell.style.font_size);
            let mut line_y = text_y.max(y + padding.top);
            for line in lines {
                if !line.text.is_empty() {
                    let line_width = line.width.min(content_width);
                    let text_x = match cell.align {
                        TextAlign::Left => cursor_x + padding.left,
                        TextAlign::Center => {
                            cursor_x + padding.left + (content_width - line_width).mul_ratio(1, 2)
                        }
                        TextAlign::Right => cursor_x + col_width - padding.right - line_width,
                    };
                    canvas.draw_string(text_x, line_y, line.text.clone());
                }
                line_y = line_y + line_height;
            }
            cursor_x = cursor_x + col_width;
        }
    }
}

impl Flowable for TableFlowable {
    fn wrap(&self, avail_width: Pt, _avail_height: Pt) -> Size {
        let layout = self.layout(avail_width);
        let mut height = layout.body_height(self.body_range.clone());
        if self.include_header {
            height += layout.header_total;
        }
        Size {
            width: layout.col_widths.iter().sum(),
            height,
        }
    }

    fn split(
        &self,
        avail_width: Pt,
        avail_height: Pt,
    ) -> Option<(Box<dyn Flowable>, Box<dyn Flowable>)> {
        let start = self.body_range.start;
        let end = self.body_range.end;
        if end.saturating_sub(start) < 2 {
            return None;
        }
        let layout = self.layout(avail_width);
        let header_height = if self.include_header {
            layout.header_total
        } else {
            Pt::ZERO
        };
        let available = avail_height - header_height;

        // Binary search for the largest end index where sum(row_heights[start..end]) <= available.
        let mut lo = start;
        let mut hi = end;
        while lo < hi {
            let mid = lo + (hi - lo + 1) / 2;
            if layout.body_height(start..mid) <= available {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        // A leading row taller than the frame still moves alone; the frame
        // decides whether it may overfill an empty page.
        let split_at = lo.max(start + 1);
        if split_at >= end {
            return None;
        }

        let first = self.part(start..split_at, self.include_header);
        let second = self.part(split_at..end, self.repeat_header);
        Some((Box::new(first), Box::new(second)))
    }

    fn draw(&self, canvas: &mut Canvas, x: Pt, y: Pt, avail_width: Pt, _avail_height: Pt) {
        let layout = self.layout(avail_width);
        let col_widths = layout.col_widths.as_slice();
        let mut cursor_y = y;
        if self.include_header {
            for ((row, height), lines) in self
                .data
                .header_rows
                .iter()
                .zip(&layout.header_row_heights)
                .zip(&layout.header_row_lines)
            {
                Self::draw_row_at(canvas, x, cursor_y, col_widths, row, *height, lines);
                cursor_y = cursor_y + *height;
            }
        }

        let divider = self
            .divider
            .filter(|_| self.data.body_rows.len() >= self.divider_min_rows);
        let table_width: Pt = col_widths.iter().sum();
        let range = self.body_range.clone();
        for (offset, ((row, height), lines)) in self.data.body_rows[range.clone()]
            .iter()
            .zip(&layout.body_row_heights[range.clone()])
            .zip(&layout.body_row_lines[range.clone()])
            .enumerate()
        {
            canvas.meta(BODY_ROW_META_KEY, (range.start + offset).to_string());
            Self::draw_row_at(canvas, x, cursor_y, col_widths, row, *height, lines);
            cursor_y = cursor_y + *height;
            if let Some(rule) = divider {
                canvas.set_stroke_color(rule.color);
                canvas.set_line_width(rule.width);
                canvas.draw_line(x, cursor_y, x + table_width, cursor_y);
            }
        }
    }
}

#[derive(Debug)]
struct TableFlowableData {
    header_rows: Vec<Vec<TableCell>>,
    body_rows: Vec<Vec<TableCell>>,
    column_widths: Option<Vec<Pt>>,
    layout_cache: OnceLock<TableLayoutCache>,
}

impl Clone for TableFlowableData {
    fn clone(&self) -> Self {
        Self {
            header_rows: self.header_rows.clone(),
            body_rows: self.body_rows.clone(),
            column_widths: self.column_widths.clone(),
            layout_cache: OnceLock::new(),
        }
    }
}

#[derive(Debug, Clone)]
struct TableLayoutCache {
    avail_width_milli: i64,
    col_widths: Vec<Pt>,
    header_row_heights: Vec<Pt>,
    body_row_heights: Vec<Pt>,
    header_row_lines: Vec<Vec<Vec<LineLayout>>>,
    body_row_lines: Vec<Vec<Vec<LineLayout>>>,
    header_total: Pt,
    body_prefix: Vec<Pt>,
}

impl TableLayoutCache {
    fn new(data: &TableFlowableData, avail_width: Pt, columns: usize) -> Self {
        let col_widths = data
            .column_widths
            .clone()
            .unwrap_or_else(|| equal_column_widths(avail_width, columns));

        let mut header_row_heights = Vec::with_capacity(data.header_rows.len());
        let mut header_row_lines = Vec::with_capacity(data.header_rows.len());
        let mut header_total = Pt::ZERO;
        for row in &data.header_rows {
            let (height, lines) = Self::row_height_and_lines(row, &col_widths);
            header_total = header_total + height;
            header_row_heights.push(height);
            header_row_lines.push(lines);
        }

        let mut body_row_heights = Vec::with_capacity(data.body_rows.len());
        let mut body_row_lines = Vec::with_capacity(data.body_rows.len());
        let mut body_prefix = Vec::with_capacity(data.body_rows.len() + 1);
        body_prefix.push(Pt::ZERO);
        let mut acc = Pt::ZERO;
        for row in &data.body_rows {
            let (height, lines) = Self::row_height_and_lines(row, &col_widths);
            acc = acc + height;
            body_prefix.push(acc);
            body_row_heights.push(height);
            body_row_lines.push(lines);
        }

        Self {
            avail_width_milli: avail_width.to_milli_i64(),
            col_widths,
            header_row_heights,
            body_row_heights,
            header_row_lines,
            body_row_lines,
            header_total,
            body_prefix,
        }
    }

    fn body_height(&self, range: std::ops::Range<usize>) -> Pt {
        match (self.body_prefix.get(range.end), self.body_prefix.get(range.start)) {
            (Some(end), Some(start)) if range.end > range.start => *end - *start,
            _ => Pt::ZERO,
        }
    }

    fn row_height_and_lines(row: &[TableCell], col_widths: &[Pt]) -> (Pt, Vec<Vec<LineLayout>>) {
        let mut max_height = Pt::ZERO;
        let mut lines_out = Vec::with_capacity(row.len());
        for (cell, col_width) in row.iter().zip(col_widths) {
            let padding = cell.padding;
            let content_width = (*col_width - padding.left - padding.right).max(Pt::ZERO);
            let lines = cell.layout_lines(content_width);
            let height = cell.effective_line_height() * (lines.len() as i32)
                + padding.top
                + padding.bottom;
            max_height = max_height.max(height);
            lines_out.push(lines);
        }
        (max_height, lines_out)
    }
}
