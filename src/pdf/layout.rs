use pdf_writer::{Content, Name, Str};

use crate::fonts::{FontEntry, FontSet};
use crate::model::{Align, Paragraph};

pub(super) struct TextLine {
    pub(super) text: String,
    pub(super) width: f32,
}

/// Wrap `text` into lines no wider than `max_width`. Explicit newlines always break; runs of
/// whitespace collapse to one space. A word wider than the line sits on a line of its own.
pub(super) fn build_paragraph_lines(
    text: &str,
    font: &FontEntry,
    font_size: f32,
    max_width: f32,
) -> Vec<TextLine> {
    let space_w = font.space_width(font_size);
    let mut lines = Vec::new();

    for segment in text.split('\n') {
        let mut current = String::new();
        let mut current_w = 0.0f32;
        let mut any_word = false;

        for word in segment.split_whitespace() {
            let ww = font.text_width(word, font_size);
            if any_word && current_w + space_w + ww > max_width {
                lines.push(TextLine {
                    text: std::mem::take(&mut current),
                    width: current_w,
                });
                current_w = 0.0;
                any_word = false;
            }
            if any_word {
                current.push(' ');
                current_w += space_w;
            }
            current.push_str(word);
            current_w += ww;
            any_word = true;
        }

        lines.push(TextLine {
            text: current,
            width: current_w,
        });
    }

    // Trailing blank lines carry no height.
    while lines.last().is_some_and(|l| l.text.is_empty()) {
        lines.pop();
    }
    lines
}

/// Height a paragraph needs when wrapped to `width`. An empty paragraph still takes a line.
pub(super) fn paragraph_height(para: &Paragraph, fonts: &FontSet, width: f32) -> f32 {
    let font = fonts.get(para.style.face);
    let lines = build_paragraph_lines(&para.text, font, para.style.font_size, width);
    lines.len().max(1) as f32 * para.style.leading
}

/// First baseline of a block whose top edge is `top`: the glyphs sit centred in the leading.
pub(super) fn first_baseline(top: f32, font: &FontEntry, font_size: f32, leading: f32) -> f32 {
    top - (leading - font_size).max(0.0) / 2.0 - font_size * font.ascender_ratio
}

/// Draw pre-built lines with the paragraph's alignment inside `[x, x + width]`.
pub(super) fn render_paragraph_lines(
    content: &mut Content,
    lines: &[TextLine],
    para: &Paragraph,
    font: &FontEntry,
    x: f32,
    width: f32,
    first_baseline_y: f32,
) {
    if lines.iter().all(|l| l.text.is_empty()) {
        return;
    }
    let style = &para.style;
    let (r, g, b) = style.color.rgb_f32();

    content.save_state();
    content.set_fill_rgb(r, g, b);
    content.begin_text();
    content.set_font(Name(font.pdf_name.as_bytes()), style.font_size);

    let mut td_x = 0.0f32;
    let mut td_y = 0.0f32;
    for (i, line) in lines.iter().enumerate() {
        if line.text.is_empty() {
            continue;
        }
        let line_x = match style.align {
            Align::Left => x,
            Align::Center => x + (width - line.width) / 2.0,
            Align::Right => x + width - line.width,
        };
        let y = first_baseline_y - i as f32 * style.leading;

        content.next_line(line_x - td_x, y - td_y);
        td_x = line_x;
        td_y = y;
        content.show(Str(&font.encode(&line.text)));
    }

    content.end_text();
    content.restore_state();
}
