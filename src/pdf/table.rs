use pdf_writer::Content;

use crate::error::Error;
use crate::fonts::FontSet;
use crate::model::{RowKind, Table, TableRow};
use crate::style::CellVAlign;

use super::Frame;
use super::canvas::PageCanvas;
use super::layout::{TextLine, build_paragraph_lines, first_baseline, render_paragraph_lines};

struct RowLayout {
    height: f32,
    cell_lines: Vec<Vec<TextLine>>,
}

fn compute_row_layouts(table: &Table, fonts: &FontSet) -> Vec<RowLayout> {
    let pad = &table.cell_padding;
    table
        .rows
        .iter()
        .map(|row| {
            let mut max_h: f32 = 0.0;
            let cell_lines = row
                .cells
                .iter()
                .zip(&table.col_widths)
                .map(|(cell, &col_w)| {
                    let style = &cell.paragraph.style;
                    let text_w = (col_w - pad.left - pad.right).max(0.0);
                    let lines = build_paragraph_lines(
                        &cell.paragraph.text,
                        fonts.get(style.face),
                        style.font_size,
                        text_w,
                    );
                    let h = pad.top + pad.bottom + lines.len().max(1) as f32 * style.leading;
                    max_h = max_h.max(h);
                    lines
                })
                .collect();
            RowLayout {
                height: max_h,
                cell_lines,
            }
        })
        .collect()
}

/// Flow `table` into the frame, starting a new page between rows whenever the next row does
/// not fit. A header row is kept together with the first body row.
pub(super) fn render_table(
    table: &Table,
    fonts: &FontSet,
    canvas: &mut dyn PageCanvas,
    frame: &mut Frame,
) -> Result<(), Error> {
    let row_layouts = compute_row_layouts(table, fonts);
    let table_w: f32 = table.col_widths.iter().sum();
    let table_left = frame.x + (frame.width - table_w) / 2.0;
    let header = table
        .rows
        .iter()
        .zip(&row_layouts)
        .find(|(row, _)| row.kind == RowKind::Header);

    frame.space_before(0.0);

    for (ri, (row, layout)) in table.rows.iter().zip(&row_layouts).enumerate() {
        let row_h = layout.height;
        if row_h > frame.height() {
            return Err(Error::Layout(format!(
                "table row {ri} is {row_h:.1}pt tall, the frame holds {:.1}pt",
                frame.height()
            )));
        }

        let keep_with_next = match (row.kind, row_layouts.get(ri + 1)) {
            (RowKind::Header, Some(next)) => next.height,
            _ => 0.0,
        };
        let needed = if row_h + keep_with_next <= frame.height() {
            row_h + keep_with_next
        } else {
            row_h
        };

        if !frame.at_top() && frame.remaining() < needed {
            frame.new_page(canvas)?;
            if table.repeat_header
                && row.kind != RowKind::Header
                && let Some((header_row, header_layout)) = header
            {
                if header_layout.height + row_h > frame.height() {
                    return Err(Error::Layout(format!(
                        "table row {ri} does not fit below the repeated header row"
                    )));
                }
                draw_row(canvas.content(), table, header_row, header_layout, table_left, frame.y, fonts);
                frame.y -= header_layout.height;
            }
        }

        log::debug!(
            "TABLE row={} kind={:?} row_h={:.2} y={:.2}",
            ri,
            row.kind,
            row_h,
            frame.y
        );
        draw_row(canvas.content(), table, row, layout, table_left, frame.y, fonts);
        frame.y -= row_h;
    }

    Ok(())
}

fn draw_row(
    content: &mut Content,
    table: &Table,
    row: &TableRow,
    layout: &RowLayout,
    table_left: f32,
    row_top: f32,
    fonts: &FontSet,
) {
    let pad = &table.cell_padding;
    let row_h = layout.height;
    let row_bottom = row_top - row_h;

    if let Some(bg) = row.background {
        let (r, g, b) = bg.rgb_f32();
        let row_w: f32 = table.col_widths.iter().sum();
        content.save_state();
        content.set_fill_rgb(r, g, b);
        content.rect(table_left, row_bottom, row_w, row_h);
        content.fill_nonzero();
        content.restore_state();
    }

    let mut cell_x = table_left;
    for ((cell, lines), &col_w) in row
        .cells
        .iter()
        .zip(&layout.cell_lines)
        .zip(&table.col_widths)
    {
        let para = &cell.paragraph;
        let style = &para.style;
        let font = fonts.get(style.face);

        let content_h = lines.len().max(1) as f32 * style.leading;
        let avail = row_h - pad.top - pad.bottom;
        let offset = match table.v_align {
            CellVAlign::Top => 0.0,
            CellVAlign::Center => (avail - content_h) / 2.0,
            CellVAlign::Bottom => avail - content_h,
        };
        let top = row_top - pad.top - offset.max(0.0);
        let baseline = first_baseline(top, font, style.font_size, style.leading);
        let text_w = (col_w - pad.left - pad.right).max(0.0);

        render_paragraph_lines(content, lines, para, font, cell_x + pad.left, text_w, baseline);
        cell_x += col_w;
    }

    // Grid: every cell boxed, which also draws the outer border.
    let (r, g, b) = table.grid.color.rgb_f32();
    content.save_state();
    content.set_line_width(table.grid.width);
    content.set_stroke_rgb(r, g, b);
    let mut cell_x = table_left;
    for &col_w in &table.col_widths {
        content.rect(cell_x, row_bottom, col_w, row_h);
        cell_x += col_w;
    }
    content.stroke();
    content.restore_state();
}
