use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::Error;
use crate::style::{CellPadding, CellVAlign, Color, GridLine, TextStyle};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

/// Lenient: anything other than `RIGHT` or `CENTER` (any case) is `Left`.
impl From<&str> for Align {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "RIGHT" => Align::Right,
            "CENTER" | "CENTRE" => Align::Center,
            _ => Align::Left,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReportType {
    #[default]
    Table,
    Normal,
    Graph,
    Custom,
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReportType::Table => "TABLE",
            ReportType::Normal => "NORMAL",
            ReportType::Graph => "GRAPH",
            ReportType::Custom => "CUSTOM",
        })
    }
}

impl FromStr for ReportType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TABLE" => Ok(ReportType::Table),
            "NORMAL" => Ok(ReportType::Normal),
            "GRAPH" => Ok(ReportType::Graph),
            "CUSTOM" => Ok(ReportType::Custom),
            _ => Err(Error::Configuration(format!("unknown report type {s:?}"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Column {
    /// Share of the document width, 0..=100.
    pub width_percent: f32,
    pub align: Align,
}

impl Column {
    pub fn new(width_percent: f32, align: Align) -> Self {
        Self {
            width_percent,
            align,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum LogoSource {
    /// Generated fallback emblem.
    #[default]
    Builtin,
    Path(PathBuf),
    /// Fetched over HTTP(S); requires the `remote-logo` feature.
    Url(String),
    Bytes(Vec<u8>),
}

impl LogoSource {
    /// `http://` and `https://` references are URLs, anything else a filesystem path.
    pub fn from_reference(reference: &str) -> Self {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            LogoSource::Url(reference.to_string())
        } else {
            LogoSource::Path(PathBuf::from(reference))
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReportRequest {
    pub company: String,
    pub title: String,
    pub columns: Vec<Column>,
    pub table_header: Vec<String>,
    pub table_rows: Vec<Vec<String>>,
    pub table_footer: Option<Vec<String>>,
    /// Filter lines printed under the title.
    pub extra_header_lines: Vec<String>,
    pub report_type: ReportType,
    /// `None` uses the built-in logo.
    pub logo: Option<LogoSource>,
    pub show_page_numbers: bool,
    pub landscape: bool,
}

fn stringify<I, V>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = V>,
    V: ToString,
{
    values.into_iter().map(|v| v.to_string()).collect()
}

impl ReportRequest {
    pub fn new(company: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            company: company.into(),
            title: title.into(),
            columns: Vec::new(),
            table_header: Vec::new(),
            table_rows: Vec::new(),
            table_footer: None,
            extra_header_lines: Vec::new(),
            report_type: ReportType::Table,
            logo: None,
            show_page_numbers: true,
            landscape: false,
        }
    }

    pub fn column(mut self, width_percent: f32, align: Align) -> Self {
        self.columns.push(Column::new(width_percent, align));
        self
    }

    pub fn header<I, V>(mut self, titles: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        self.table_header = stringify(titles);
        self
    }

    pub fn row<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        self.table_rows.push(stringify(values));
        self
    }

    pub fn footer<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        self.table_footer = Some(stringify(values));
        self
    }

    pub fn header_line(mut self, line: impl Into<String>) -> Self {
        self.extra_header_lines.push(line.into());
        self
    }

    pub fn report_type(mut self, report_type: ReportType) -> Self {
        self.report_type = report_type;
        self
    }

    pub fn logo(mut self, logo: LogoSource) -> Self {
        self.logo = Some(logo);
        self
    }

    pub fn show_page_numbers(mut self, show: bool) -> Self {
        self.show_page_numbers = show;
        self
    }

    pub fn landscape(mut self, landscape: bool) -> Self {
        self.landscape = landscape;
        self
    }

    /// Check that every row agrees with the column definitions and that the widths fit
    /// the page.
    pub fn validate(&self) -> Result<(), Error> {
        let ncols = self.columns.len();
        if ncols == 0 {
            return Err(Error::Configuration("report has no columns".into()));
        }
        if self.table_header.len() != ncols {
            return Err(Error::Configuration(format!(
                "table header has {} cells, expected {ncols}",
                self.table_header.len()
            )));
        }
        for (ri, row) in self.table_rows.iter().enumerate() {
            if row.len() != ncols {
                return Err(Error::Configuration(format!(
                    "row {ri} has {} cells, expected {ncols}",
                    row.len()
                )));
            }
        }
        if let Some(footer) = &self.table_footer
            && footer.len() != ncols
        {
            return Err(Error::Configuration(format!(
                "table footer has {} cells, expected {ncols}",
                footer.len()
            )));
        }

        let mut total = 0.0f32;
        for (ci, col) in self.columns.iter().enumerate() {
            if !col.width_percent.is_finite() || col.width_percent < 0.0 {
                return Err(Error::Configuration(format!(
                    "column {ci} has invalid width {}",
                    col.width_percent
                )));
            }
            total += col.width_percent;
        }
        if total > 100.01 {
            return Err(Error::Configuration(format!(
                "column widths sum to {total:.2}%, more than 100%"
            )));
        }
        Ok(())
    }
}

/// Decoded logo or other raster image ready for embedding.
#[derive(Clone, Debug)]
pub struct EmbeddedImage {
    pub(crate) data: ImageData,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub display_width: f32,  // points
    pub display_height: f32, // points
}

#[derive(Clone, Debug)]
pub(crate) enum ImageData {
    /// Passed through with DCTDecode.
    Jpeg(Vec<u8>),
    Rgba(image::RgbaImage),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Paragraph {
    pub text: String,
    pub style: TextStyle,
}

/// Logo on the left with the heading lines flowing beside it.
#[derive(Clone, Debug)]
pub struct HeaderBlock {
    pub logo: EmbeddedImage,
    pub logo_gap: f32,
    pub lines: Vec<Paragraph>,
    pub space_after: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowKind {
    Header,
    Body,
    Footer,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableCell {
    pub paragraph: Paragraph,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableRow {
    pub kind: RowKind,
    pub cells: Vec<TableCell>,
    pub background: Option<Color>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    pub col_widths: Vec<f32>, // points
    pub rows: Vec<TableRow>,
    pub cell_padding: CellPadding,
    pub v_align: CellVAlign,
    pub grid: GridLine,
    pub repeat_header: bool,
}

/// A flowable handed to the document engine.
#[derive(Clone, Debug)]
pub enum Block {
    Header(HeaderBlock),
    Table(Table),
}
