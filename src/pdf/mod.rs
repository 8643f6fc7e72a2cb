mod canvas;
mod layout;
mod table;

use std::collections::HashSet;

use pdf_writer::Name;

use crate::error::Error;
use crate::fonts::FontSet;
use crate::model::{Block, HeaderBlock};
use crate::style::ReportStyle;

pub(crate) use canvas::{DirectCanvas, DocumentWriter, PageCanvas, PaginatingCanvas};

use layout::{build_paragraph_lines, first_baseline, paragraph_height, render_paragraph_lines};
use table::render_table;

const A4: (f32, f32) = (595.2756, 841.8898);

/// Page size and the single layout frame inside the margins.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PageGeometry {
    pub(crate) size: (f32, f32),
    /// Page width minus the left and right margins.
    pub(crate) doc_width: f32,
    frame_x: f32,
    frame_width: f32,
    frame_top: f32,
    frame_bottom: f32,
}

impl PageGeometry {
    pub(crate) fn a4(landscape: bool, style: &ReportStyle) -> Self {
        let (w, h) = if landscape { (A4.1, A4.0) } else { A4 };
        let m = &style.margins;
        let pad = style.frame_padding;
        let doc_width = w - m.left - m.right;
        Self {
            size: (w, h),
            doc_width,
            frame_x: m.left + pad,
            frame_width: doc_width - 2.0 * pad,
            frame_top: h - m.top - pad,
            frame_bottom: m.bottom + pad,
        }
    }
}

/// Vertical cursor of the frame on the current page.
pub(super) struct Frame {
    pub(super) x: f32,
    pub(super) width: f32,
    top: f32,
    bottom: f32,
    pub(super) y: f32,
    prev_space_after: f32,
}

impl Frame {
    fn new(geometry: &PageGeometry) -> Self {
        Self {
            x: geometry.frame_x,
            width: geometry.frame_width,
            top: geometry.frame_top,
            bottom: geometry.frame_bottom,
            y: geometry.frame_top,
            prev_space_after: 0.0,
        }
    }

    pub(super) fn at_top(&self) -> bool {
        self.y >= self.top - 0.01
    }

    pub(super) fn height(&self) -> f32 {
        self.top - self.bottom
    }

    pub(super) fn remaining(&self) -> f32 {
        self.y - self.bottom
    }

    /// Advance past the gap before the next flowable. Adjacent spacing collapses to the
    /// larger of the two and is dropped at the top of a page.
    pub(super) fn space_before(&mut self, before: f32) {
        if !self.at_top() {
            self.y -= before.max(self.prev_space_after);
        }
        self.prev_space_after = 0.0;
    }

    pub(super) fn new_page(&mut self, canvas: &mut dyn PageCanvas) -> Result<(), Error> {
        canvas.show_page()?;
        log::debug!("page break, {} pages ended", canvas.page_count());
        self.y = self.top;
        self.prev_space_after = 0.0;
        Ok(())
    }
}

fn collect_used_chars(blocks: &[Block], style: &ReportStyle) -> HashSet<char> {
    let mut used: HashSet<char> = style.page_stamp.template.chars().collect();
    used.extend('0'..='9');
    used.insert(' ');
    for block in blocks {
        match block {
            Block::Header(header) => {
                for para in &header.lines {
                    used.extend(para.text.chars());
                }
            }
            Block::Table(table) => {
                for cell in table.rows.iter().flat_map(|r| r.cells.iter()) {
                    used.extend(cell.paragraph.text.chars());
                }
            }
        }
    }
    used
}

/// Lay `blocks` out top-down on pages of `geometry` and draw them through the canvas that
/// `make_canvas` builds around the document writer.
pub(crate) fn render<F>(
    blocks: &[Block],
    geometry: &PageGeometry,
    style: &ReportStyle,
    title: &str,
    make_canvas: F,
) -> Result<Vec<u8>, Error>
where
    F: FnOnce(DocumentWriter, &FontSet) -> Box<dyn PageCanvas>,
{
    let t0 = std::time::Instant::now();

    // Phase 1: fonts, subset to the characters the document uses
    let used_chars = collect_used_chars(blocks, style);
    let mut writer = DocumentWriter::new(geometry.size, title);
    let fonts = writer.register_fonts(&style.fonts, &used_chars)?;
    let t_fonts = t0.elapsed();

    // Phase 2: images, registered before any page is committed
    let image_names: Vec<Option<String>> = blocks
        .iter()
        .map(|block| match block {
            Block::Header(header) => Some(writer.embed_image(&header.logo)),
            Block::Table(_) => None,
        })
        .collect();
    let t_images = t0.elapsed();

    // Phase 3: flow
    let mut canvas = make_canvas(writer, &fonts);
    let mut frame = Frame::new(geometry);
    for (block, image_name) in blocks.iter().zip(&image_names) {
        match (block, image_name) {
            (Block::Header(header), Some(name)) => {
                render_header(header, name, &fonts, canvas.as_mut(), &mut frame)?;
            }
            (Block::Table(table), _) => {
                render_table(table, &fonts, canvas.as_mut(), &mut frame)?;
            }
            (Block::Header(_), None) => {}
        }
    }
    canvas.show_page()?;
    let t_layout = t0.elapsed();

    let pages = canvas.page_count();
    let bytes = canvas.save()?;
    let t_save = t0.elapsed();

    log::info!(
        "Render phases: font_embed={:.1}ms, images={:.1}ms, layout={:.1}ms, save={:.1}ms ({} pages)",
        t_fonts.as_secs_f64() * 1000.0,
        (t_images - t_fonts).as_secs_f64() * 1000.0,
        (t_layout - t_images).as_secs_f64() * 1000.0,
        (t_save - t_layout).as_secs_f64() * 1000.0,
        pages,
    );

    Ok(bytes)
}

fn header_text_width(header: &HeaderBlock, frame: &Frame) -> f32 {
    (frame.width - header.logo.display_width - header.logo_gap).max(1.0)
}

/// Height of the stacked heading lines beside the logo.
fn header_text_height(header: &HeaderBlock, fonts: &FontSet, width: f32) -> f32 {
    let mut h = 0.0;
    let mut prev_after = None;
    for para in &header.lines {
        if let Some(after) = prev_after {
            h += para.style.space_before.max(after);
        }
        h += paragraph_height(para, fonts, width);
        prev_after = Some(para.style.space_after);
    }
    h
}

/// Logo at the top-left of the frame with the heading lines beside it.
fn render_header(
    header: &HeaderBlock,
    image_name: &str,
    fonts: &FontSet,
    canvas: &mut dyn PageCanvas,
    frame: &mut Frame,
) -> Result<(), Error> {
    let text_w = header_text_width(header, frame);
    let logo = &header.logo;
    let height =
        (logo.display_height + header.logo_gap).max(header_text_height(header, fonts, text_w));

    frame.space_before(0.0);
    if height > frame.remaining() && !frame.at_top() {
        frame.new_page(canvas)?;
    }
    if height > frame.height() {
        return Err(Error::Layout(format!(
            "header block is {height:.1}pt tall, the frame holds {:.1}pt",
            frame.height()
        )));
    }

    let top = frame.y;
    let content = canvas.content();

    content.save_state();
    content.transform([
        logo.display_width,
        0.0,
        0.0,
        logo.display_height,
        frame.x,
        top - logo.display_height,
    ]);
    content.x_object(Name(image_name.as_bytes()));
    content.restore_state();

    let text_x = frame.x + logo.display_width + header.logo_gap;
    let mut cursor = top;
    let mut prev_after = None;
    for para in &header.lines {
        if let Some(after) = prev_after {
            cursor -= para.style.space_before.max(after);
        }
        let font = fonts.get(para.style.face);
        let lines = build_paragraph_lines(&para.text, font, para.style.font_size, text_w);
        let baseline = first_baseline(cursor, font, para.style.font_size, para.style.leading);
        render_paragraph_lines(content, &lines, para, font, text_x, text_w, baseline);
        cursor -= lines.len().max(1) as f32 * para.style.leading;
        prev_after = Some(para.style.space_after);
    }

    log::debug!("HEADER lines={} height={:.2} y={:.2}", header.lines.len(), height, top);
    frame.y -= height;
    frame.prev_space_after = header.space_after;
    Ok(())
}
