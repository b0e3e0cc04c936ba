//! Lays block lists out onto US-Letter pages and returns the finished
//! document as bytes. Headings, tables and QR codes are drawn with the
//! built-in Helvetica faces; nothing is written to disk here.

use printpdf::path::{PaintMode, WindingOrder};
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, PdfPageIndex, Point, Polygon, Rgb,
};
use qrcode::QrCode;

use crate::error::ExportError;
use crate::render::{Block, TableBlock};

// Geometry is f32 throughout; that is the width `Mm` wraps.
const PAGE_WIDTH_MM: f32 = 215.9;
const PAGE_HEIGHT_MM: f32 = 279.4;
const MARGIN_MM: f32 = 20.0;
const CONTENT_WIDTH_MM: f32 = PAGE_WIDTH_MM - 2.0 * MARGIN_MM;
const PT_TO_MM: f32 = 0.352_778;

const BODY_SIZE: f32 = 10.0;
const BODY_LEADING_MM: f32 = 12.0 * PT_TO_MM;
const FOOTER_SIZE: f32 = 8.0;
const FOOTER_QR_MM: f32 = 12.0;
const CELL_PAD_MM: f32 = 1.5;

/// Renders the block list into a complete PDF and returns the document
/// bytes together with the page count. The footer pass runs after layout
/// so every page carries the timestamp, its page number and a QR pointing
/// back at the project.
pub fn render_document(
    title: &str,
    blocks: &[Block],
    footer_timestamp: &str,
    footer_url: &str,
) -> Result<(Vec<u8>, usize), ExportError> {
    let mut writer = PageWriter::new(title)?;
    for block in blocks {
        writer.write_block(block)?;
    }
    writer.finish(footer_timestamp, footer_url)
}

struct PageWriter {
    doc: PdfDocumentReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    pages: Vec<PdfPageIndex>,
    layer: PdfLayerReference,
    /// Cursor in mm from the page bottom; text baselines move down from
    /// the top margin.
    y: f32,
    fresh_page: bool,
}

impl PageWriter {
    fn new(title: &str) -> Result<Self, ExportError> {
        let (doc, page, layer) =
            PdfDocument::new(title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| ExportError::Pdf(format!("{e:?}")))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| ExportError::Pdf(format!("{e:?}")))?;
        let layer_ref = doc.get_page(page).get_layer(layer);
        Ok(Self {
            doc,
            regular,
            bold,
            pages: vec![page],
            layer: layer_ref,
            y: PAGE_HEIGHT_MM - MARGIN_MM,
            fresh_page: true,
        })
    }

    fn new_page(&mut self) {
        let (page, layer) = self
            .doc
            .add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
        self.pages.push(page);
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = PAGE_HEIGHT_MM - MARGIN_MM;
        self.fresh_page = true;
    }

    fn ensure_fits(&mut self, height_mm: f32) {
        if self.y - height_mm < MARGIN_MM {
            self.new_page();
        }
    }

    fn write_block(&mut self, block: &Block) -> Result<(), ExportError> {
        match block {
            Block::Heading1(text) => self.heading(text, 18.0, 0.0, 10.0),
            Block::Heading2(text) => self.heading(text, 14.0, 12.0, 6.0),
            Block::Heading3(text) => self.heading(text, 12.0, 10.0, 4.0),
            Block::Labelled { label, value } => self.labelled(label, value, true, None),
            Block::LinkLine { label, url } => self.labelled(label, url, false, Some(link_blue())),
            Block::Text(text) => self.paragraph(text),
            Block::Table(table) => self.table(table),
            Block::QrImage { url, side_inches } => {
                let side = side_inches * 25.4;
                let code = qr_matrix(url)?;
                self.ensure_fits(side);
                draw_qr(&self.layer, MARGIN_MM, self.y, side, &code);
                self.y -= side;
                self.fresh_page = false;
            }
            Block::Spacer => {
                self.y -= 12.0 * PT_TO_MM;
            }
            Block::PageBreak => self.new_page(),
        }
        Ok(())
    }

    fn heading(&mut self, text: &str, size: f32, space_before_pt: f32, space_after_pt: f32) {
        if !self.fresh_page {
            self.y -= space_before_pt * PT_TO_MM;
        }
        let leading = size * 1.2 * PT_TO_MM;
        for line in wrap_text(text, max_chars(CONTENT_WIDTH_MM, size)) {
            self.ensure_fits(leading);
            self.y -= leading;
            show_text(&self.layer, &line, size, MARGIN_MM, self.y, &self.bold);
        }
        self.y -= space_after_pt * PT_TO_MM;
        self.fresh_page = false;
    }

    fn paragraph(&mut self, text: &str) {
        for line in wrap_text(text, max_chars(CONTENT_WIDTH_MM, BODY_SIZE)) {
            self.ensure_fits(BODY_LEADING_MM);
            self.y -= BODY_LEADING_MM;
            show_text(&self.layer, &line, BODY_SIZE, MARGIN_MM, self.y, &self.regular);
        }
        self.fresh_page = false;
    }

    /// "Label: value" on one flow; the label keeps its face, continuation
    /// lines start back at the margin.
    fn labelled(&mut self, label: &str, value: &str, bold_label: bool, value_color: Option<Color>) {
        let prefix = format!("{label}: ");
        let prefix_mm = text_width_mm(&prefix, BODY_SIZE);
        let first_cap = max_chars((CONTENT_WIDTH_MM - prefix_mm).max(20.0), BODY_SIZE);
        let rest_cap = max_chars(CONTENT_WIDTH_MM, BODY_SIZE);
        let lines = wrap_first_rest(value, first_cap, rest_cap);

        self.ensure_fits(BODY_LEADING_MM);
        self.y -= BODY_LEADING_MM;
        let label_font = if bold_label { &self.bold } else { &self.regular };
        show_text(&self.layer, &prefix, BODY_SIZE, MARGIN_MM, self.y, label_font);
        if let Some(color) = &value_color {
            self.layer.set_fill_color(color.clone());
        }
        if let Some(first) = lines.first() {
            show_text(
                &self.layer,
                first,
                BODY_SIZE,
                MARGIN_MM + prefix_mm,
                self.y,
                &self.regular,
            );
        }
        for line in lines.iter().skip(1) {
            self.ensure_fits(BODY_LEADING_MM);
            self.y -= BODY_LEADING_MM;
            show_text(&self.layer, line, BODY_SIZE, MARGIN_MM, self.y, &self.regular);
        }
        if value_color.is_some() {
            self.layer.set_fill_color(black());
        }
        self.fresh_page = false;
    }

    fn table(&mut self, table: &TableBlock) {
        let total_in: f32 = table.col_widths.iter().sum();
        let scale = (CONTENT_WIDTH_MM / (total_in * 25.4)).min(1.0);
        let cols_mm: Vec<f32> = table.col_widths.iter().map(|w| w * 25.4 * scale).collect();
        self.table_row(&table.headers, &cols_mm, table.header_font_size, true);
        for row in &table.rows {
            self.table_row(row, &cols_mm, table.body_font_size, false);
        }
        self.fresh_page = false;
    }

    fn table_row(&mut self, cells: &[String], cols_mm: &[f32], size: f32, is_header: bool) {
        let leading = size * 1.2 * PT_TO_MM;
        let wrapped: Vec<Vec<String>> = cells
            .iter()
            .zip(cols_mm)
            .map(|(cell, width)| {
                wrap_text(cell, max_chars((width - 2.0 * CELL_PAD_MM).max(4.0), size))
            })
            .collect();
        let line_count = wrapped.iter().map(|w| w.len()).max().unwrap_or(1).max(1);
        let row_h = line_count as f32 * leading + 2.0 * CELL_PAD_MM;
        self.ensure_fits(row_h);

        let top = self.y;
        let bottom = top - row_h;
        let table_w: f32 = cols_mm.iter().sum();

        if is_header {
            self.layer.set_fill_color(light_blue());
            self.layer.add_polygon(rect(MARGIN_MM, bottom, table_w, row_h));
        }

        self.layer.set_outline_color(grey());
        set_thickness(&self.layer, 0.25);
        let mut x_bounds = vec![MARGIN_MM];
        for width in cols_mm {
            x_bounds.push(x_bounds.last().copied().unwrap_or(MARGIN_MM) + width);
        }
        for &x in &x_bounds {
            self.layer.add_line(line((x, top), (x, bottom)));
        }
        self.layer
            .add_line(line((MARGIN_MM, top), (MARGIN_MM + table_w, top)));
        self.layer
            .add_line(line((MARGIN_MM, bottom), (MARGIN_MM + table_w, bottom)));

        // Text is painted with the fill color, so reset after the band.
        self.layer.set_fill_color(black());
        let font = if is_header { &self.bold } else { &self.regular };
        let mut x = MARGIN_MM;
        for (cell_lines, width) in wrapped.iter().zip(cols_mm) {
            let mut baseline = top - CELL_PAD_MM - size * 0.8 * PT_TO_MM;
            for cell_line in cell_lines {
                show_text(&self.layer, cell_line, size, x + CELL_PAD_MM, baseline, font);
                baseline -= leading;
            }
            x += width;
        }
        self.y = bottom;
    }

    fn finish(
        self,
        footer_timestamp: &str,
        footer_url: &str,
    ) -> Result<(Vec<u8>, usize), ExportError> {
        let total = self.pages.len();
        let code = qr_matrix(footer_url)?;
        for (index, page) in self.pages.iter().enumerate() {
            let layer = self.doc.get_page(*page).add_layer("Footer");
            layer.set_fill_color(black());
            show_text(
                &layer,
                footer_timestamp,
                FOOTER_SIZE,
                MARGIN_MM,
                10.0,
                &self.regular,
            );
            let label = format!("Page {} of {}", index + 1, total);
            let label_mm = text_width_mm(&label, FOOTER_SIZE);
            show_text(
                &layer,
                &label,
                FOOTER_SIZE,
                PAGE_WIDTH_MM - MARGIN_MM - label_mm,
                10.0,
                &self.regular,
            );
            draw_qr(
                &layer,
                (PAGE_WIDTH_MM - FOOTER_QR_MM) / 2.0,
                4.0 + FOOTER_QR_MM,
                FOOTER_QR_MM,
                &code,
            );
        }
        let bytes = self
            .doc
            .save_to_bytes()
            .map_err(|e| ExportError::Pdf(format!("{e:?}")))?;
        Ok((bytes, total))
    }
}

struct QrMatrix {
    width: usize,
    dark: Vec<bool>,
}

fn qr_matrix(url: &str) -> Result<QrMatrix, ExportError> {
    let code = QrCode::new(url.as_bytes()).map_err(|e| ExportError::Qr(format!("{e:?}")))?;
    let width = code.width();
    let dark = code
        .to_colors()
        .into_iter()
        .map(|c| c == qrcode::Color::Dark)
        .collect();
    Ok(QrMatrix { width, dark })
}

/// Paints the QR as filled squares, top-down from `y_top`, with a four
/// module quiet zone inside the given side length.
fn draw_qr(layer: &PdfLayerReference, x: f32, y_top: f32, side_mm: f32, code: &QrMatrix) {
    let module = side_mm / (code.width + 8) as f32;
    layer.set_fill_color(black());
    for row in 0..code.width {
        for col in 0..code.width {
            if code.dark[row * code.width + col] {
                let left = x + (col + 4) as f32 * module;
                let top = y_top - (row + 4) as f32 * module;
                layer.add_polygon(rect(left, top - module, module, module));
            }
        }
    }
}

fn rect(x: f32, y_bottom: f32, width: f32, height: f32) -> Polygon {
    let ring = vec![
        (Point::new(Mm(x), Mm(y_bottom)), false),
        (Point::new(Mm(x + width), Mm(y_bottom)), false),
        (Point::new(Mm(x + width), Mm(y_bottom + height)), false),
        (Point::new(Mm(x), Mm(y_bottom + height)), false),
    ];
    Polygon {
        rings: vec![ring],
        mode: PaintMode::Fill,
        winding_order: WindingOrder::NonZero,
    }
}

fn line(from: (f32, f32), to: (f32, f32)) -> Line {
    Line {
        points: vec![
            (Point::new(Mm(from.0), Mm(from.1)), false),
            (Point::new(Mm(to.0), Mm(to.1)), false),
        ],
        is_closed: false,
    }
}

fn show_text(
    layer: &PdfLayerReference,
    text: &str,
    size: f32,
    x_mm: f32,
    y_mm: f32,
    font: &IndirectFontRef,
) {
    layer.use_text(text, size.into(), Mm(x_mm), Mm(y_mm), font);
}

fn set_thickness(layer: &PdfLayerReference, thickness: f32) {
    layer.set_outline_thickness(thickness.into());
}

fn black() -> Color {
    Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None))
}

fn grey() -> Color {
    Color::Rgb(Rgb::new(0.5, 0.5, 0.5, None))
}

fn light_blue() -> Color {
    Color::Rgb(Rgb::new(0.68, 0.85, 0.9, None))
}

fn link_blue() -> Color {
    Color::Rgb(Rgb::new(0.0, 0.0, 0.8, None))
}

/// Helvetica has no exposed metrics here; half the point size per
/// character is close enough for wrapping and right-alignment.
fn text_width_mm(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * 0.5 * PT_TO_MM
}

fn max_chars(width_mm: f32, size: f32) -> usize {
    let char_mm = size * 0.5 * PT_TO_MM;
    ((width_mm / char_mm).floor() as usize).max(1)
}

/// Greedy word wrap; words longer than a line are hard-split. Paragraph
/// breaks in the input survive as empty lines.
fn wrap_text(text: &str, width_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for raw_line in text.split('\n') {
        if raw_line.trim().is_empty() {
            lines.push(String::new());
            continue;
        }
        let mut current = String::new();
        for word in raw_line.split_whitespace() {
            for piece in split_long_word(word, width_chars) {
                let needed = if current.is_empty() {
                    piece.chars().count()
                } else {
                    current.chars().count() + 1 + piece.chars().count()
                };
                if needed > width_chars && !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(&piece);
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// First line may be narrower than the rest (label indents).
fn wrap_first_rest(text: &str, first_chars: usize, rest_chars: usize) -> Vec<String> {
    let mut lines = wrap_text(text, first_chars);
    if lines.len() > 1 {
        let tail = lines.split_off(1).join(" ");
        lines.extend(wrap_text(&tail, rest_chars));
    }
    lines
}

fn split_long_word(word: &str, width_chars: usize) -> Vec<String> {
    if word.chars().count() <= width_chars {
        return vec![word.to_string()];
    }
    let chars: Vec<char> = word.chars().collect();
    chars
        .chunks(width_chars)
        .map(|chunk| chunk.iter().collect())
        .collect()
}
