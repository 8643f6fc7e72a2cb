use std::path::PathBuf;

use crate::model::Align;

const INCH: f32 = 72.0;
const MM: f32 = 72.0 / 25.4;

/// Default size of body cell text in points.
const CELL_FONT_SIZE: f32 = 8.0;
const CELL_LEADING: f32 = 12.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FontFace {
    Regular,
    Bold,
    BoldOblique,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color(pub [u8; 3]);

impl Color {
    pub const BLACK: Color = Color([0, 0, 0]);
    pub const WHITE: Color = Color([255, 255, 255]);

    /// Build a colour from a `0xRRGGBB` literal.
    pub const fn from_hex(rgb: u32) -> Self {
        Color([(rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8])
    }

    pub(crate) fn rgb_f32(self) -> (f32, f32, f32) {
        let [r, g, b] = self.0;
        (r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextStyle {
    pub face: FontFace,
    pub font_size: f32,
    /// Baseline-to-baseline distance in points.
    pub leading: f32,
    pub align: Align,
    pub color: Color,
    pub space_before: f32,
    pub space_after: f32,
}

impl TextStyle {
    fn body() -> Self {
        Self {
            face: FontFace::Regular,
            font_size: CELL_FONT_SIZE,
            leading: CELL_LEADING,
            align: Align::Left,
            color: Color::BLACK,
            space_before: 0.0,
            space_after: 0.0,
        }
    }

    fn heading(face: FontFace, font_size: f32, leading: f32, before: f32, after: f32) -> Self {
        Self {
            face,
            font_size,
            leading,
            align: Align::Left,
            color: Color::BLACK,
            space_before: before,
            space_after: after,
        }
    }
}

/// Text style for a body cell: Helvetica 8pt on a 12pt leading with the column's alignment.
pub fn cell_style(align: Align) -> TextStyle {
    TextStyle {
        align,
        ..TextStyle::body()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellPadding {
    pub top: f32,
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
}

impl CellPadding {
    pub const fn uniform(pt: f32) -> Self {
        Self {
            top: pt,
            left: pt,
            bottom: pt,
            right: pt,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridLine {
    pub color: Color,
    pub width: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CellVAlign {
    Top,
    Center,
    #[default]
    Bottom,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Margins {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

/// Where the "page X of Y" label goes. Coordinates are the right edge and baseline of the
/// label, in points from the bottom-left corner of the page.
#[derive(Clone, Debug, PartialEq)]
pub struct PageStamp {
    /// `{page}` and `{total}` are substituted.
    pub template: String,
    pub font_size: f32,
    pub portrait: (f32, f32),
    pub landscape: (f32, f32),
}

impl PageStamp {
    pub fn label(&self, page: usize, total: usize) -> String {
        self.template
            .replace("{page}", &page.to_string())
            .replace("{total}", &total.to_string())
    }

    pub(crate) fn position(&self, landscape: bool) -> (f32, f32) {
        if landscape {
            self.landscape
        } else {
            self.portrait
        }
    }
}

impl Default for PageStamp {
    fn default() -> Self {
        Self {
            template: "Página {page} de {total}".to_string(),
            font_size: 9.0,
            portrait: (200.0 * MM, 0.2 * INCH),
            landscape: (280.0 * MM, 0.2 * INCH),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum FontSource {
    /// PDF base-14 Helvetica family, nothing embedded.
    #[default]
    Builtin,
    /// TrueType/OpenType files embedded and subsetted. `bold` falls back to `regular`.
    TrueType {
        regular: PathBuf,
        bold: Option<PathBuf>,
    },
}

/// Styling and geometry for a report. Every field has a documented default matching the
/// classic layout: slate-blue header and footer bands with white text, hairline grid,
/// Helvetica throughout, A4 with narrow margins.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportStyle {
    /// Background of the header and footer rows. Default `#426B8E`.
    pub band_background: Color,
    /// Text colour of the header and footer rows. Default white.
    pub band_text: Color,
    /// Font size of header and footer row text. Default 9pt.
    pub band_font_size: f32,
    /// Template for body cells; the alignment is replaced per column. Default 8/12pt.
    pub cell_text: TextStyle,
    /// Inner grid and outer box. Default 0.05pt black.
    pub grid: GridLine,
    /// Default 2pt on every side.
    pub cell_padding: CellPadding,
    pub cell_v_align: CellVAlign,
    /// Redraw the header row at the top of continuation pages. Default off.
    pub repeat_header: bool,
    /// Company line. Default Helvetica-BoldOblique 12/14.
    pub company_style: TextStyle,
    /// Title line. Default Helvetica-Bold 9/10.8.
    pub title_style: TextStyle,
    /// Extra filter lines. Default Helvetica-Bold 7/8.4.
    pub filter_style: TextStyle,
    /// Logo box in points. Default 80×80.
    pub logo_size: (f32, f32),
    /// Gap to the right of and below the logo. Default 3pt.
    pub logo_gap: f32,
    /// Space between the header block and the body. Default 10pt.
    pub header_space_after: f32,
    /// Default: left/right 1/6in, top 1/9in, bottom 1/4in.
    pub margins: Margins,
    /// Inset of the layout frame inside the margins. Default 6pt.
    pub frame_padding: f32,
    pub page_stamp: PageStamp,
    pub fonts: FontSource,
}

impl Default for ReportStyle {
    fn default() -> Self {
        Self {
            band_background: Color::from_hex(0x426B8E),
            band_text: Color::WHITE,
            band_font_size: 9.0,
            cell_text: TextStyle::body(),
            grid: GridLine {
                color: Color::BLACK,
                width: 0.05,
            },
            cell_padding: CellPadding::uniform(2.0),
            cell_v_align: CellVAlign::Bottom,
            repeat_header: false,
            company_style: TextStyle::heading(FontFace::BoldOblique, 12.0, 14.0, 12.0, 6.0),
            title_style: TextStyle::heading(FontFace::Bold, 9.0, 10.8, 8.0, 4.0),
            filter_style: TextStyle::heading(FontFace::Bold, 7.0, 8.4, 6.0, 2.0),
            logo_size: (80.0, 80.0),
            logo_gap: 3.0,
            header_space_after: 10.0,
            margins: Margins {
                top: INCH / 9.0,
                bottom: INCH / 4.0,
                left: INCH / 6.0,
                right: INCH / 6.0,
            },
            frame_padding: 6.0,
            page_stamp: PageStamp::default(),
            fonts: FontSource::Builtin,
        }
    }
}

impl ReportStyle {
    /// Defaults, with the font source taken from `REPORT_PDF_FONT` and
    /// `REPORT_PDF_FONT_BOLD` when the former is set.
    pub fn from_env() -> Self {
        let mut style = Self::default();
        if let Ok(regular) = std::env::var("REPORT_PDF_FONT") {
            let regular = regular.trim();
            if !regular.is_empty() {
                let bold = std::env::var("REPORT_PDF_FONT_BOLD")
                    .ok()
                    .map(|b| b.trim().to_string())
                    .filter(|b| !b.is_empty())
                    .map(PathBuf::from);
                log::debug!("font source from environment: {regular} bold={bold:?}");
                style.fonts = FontSource::TrueType {
                    regular: PathBuf::from(regular),
                    bold,
                };
            }
        }
        style
    }

    pub fn cell_style(&self, align: Align) -> TextStyle {
        TextStyle {
            align,
            ..self.cell_text
        }
    }

    /// Style of a header or footer band cell.
    pub(crate) fn band_style(&self, align: Align) -> TextStyle {
        TextStyle {
            face: FontFace::Regular,
            font_size: self.band_font_size,
            leading: self.band_font_size * 1.2,
            align,
            color: self.band_text,
            space_before: 0.0,
            space_after: 0.0,
        }
    }

    pub fn with_fonts(mut self, fonts: FontSource) -> Self {
        self.fonts = fonts;
        self
    }

    pub fn with_repeat_header(mut self, repeat: bool) -> Self {
        self.repeat_header = repeat;
        self
    }

    pub fn with_page_stamp(mut self, stamp: PageStamp) -> Self {
        self.page_stamp = stamp;
        self
    }
}
