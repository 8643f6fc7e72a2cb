use std::io::Write;

use crate::error::Error;
use crate::images::load_logo;
use crate::model::{
    Align, Block, HeaderBlock, LogoSource, Paragraph, ReportRequest, ReportType, RowKind, Table,
    TableCell, TableRow,
};
use crate::pdf::{DirectCanvas, DocumentWriter, PageCanvas, PageGeometry, PaginatingCanvas};
use crate::style::{FontFace, ReportStyle, TextStyle};

/// Turns a [`ReportRequest`] into a finished PDF.
#[derive(Clone, Debug, Default)]
pub struct ReportBuilder {
    style: ReportStyle,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_style(mut self, style: ReportStyle) -> Self {
        self.style = style;
        self
    }

    pub fn style(&self) -> &ReportStyle {
        &self.style
    }

    /// Validate the request and assemble the flowables that `build` would render: the
    /// header block followed by the table.
    pub fn layout(&self, request: &ReportRequest) -> Result<Vec<Block>, Error> {
        self.plan(request).map(|(blocks, _)| blocks)
    }

    /// Render the report. With page numbers on, every page is held back until the last one
    /// is laid out so that the total can be stamped on each.
    pub fn build(&self, request: &ReportRequest) -> Result<Vec<u8>, Error> {
        let (blocks, geometry) = self.plan(request)?;
        let title = request.title.to_uppercase();
        let stamp = self.style.page_stamp.clone();
        let paginate = request.show_page_numbers;
        let landscape = request.landscape;

        crate::pdf::render(&blocks, &geometry, &self.style, &title, |writer, fonts| {
            make_canvas(writer, fonts.get(FontFace::Regular).clone(), stamp, paginate, landscape)
        })
    }

    /// Render the report and write it to `sink`. Nothing is written when rendering fails.
    /// Returns the number of bytes written.
    pub fn build_into<W: Write>(&self, request: &ReportRequest, sink: &mut W) -> Result<usize, Error> {
        let bytes = self.build(request)?;
        sink.write_all(&bytes)?;
        sink.flush()?;
        Ok(bytes.len())
    }

    /// Blocks together with the page geometry their column widths were computed for.
    fn plan(&self, request: &ReportRequest) -> Result<(Vec<Block>, PageGeometry), Error> {
        request.validate()?;
        let geometry = PageGeometry::a4(request.landscape, &self.style);

        let table = match request.report_type {
            ReportType::Table => self.table(request, geometry.doc_width),
            other => return Err(Error::UnsupportedReportType(other)),
        };

        let blocks = vec![Block::Header(self.header(request)?), Block::Table(table)];
        Ok((blocks, geometry))
    }

    fn header(&self, request: &ReportRequest) -> Result<HeaderBlock, Error> {
        let style = &self.style;
        let (logo_w, logo_h) = style.logo_size;
        let source = request.logo.clone().unwrap_or(LogoSource::Builtin);
        let logo = load_logo(&source, logo_w, logo_h)?;

        let heading = |text: &str, style: TextStyle| Paragraph {
            text: text.to_uppercase(),
            style,
        };
        let mut lines = vec![
            heading(request.company.as_str(), style.company_style),
            heading(request.title.as_str(), style.title_style),
        ];
        lines.extend(
            request
                .extra_header_lines
                .iter()
                .map(|line| heading(line.as_str(), style.filter_style)),
        );

        Ok(HeaderBlock {
            logo,
            logo_gap: style.logo_gap,
            lines,
            space_after: style.header_space_after,
        })
    }

    fn table(&self, request: &ReportRequest, doc_width: f32) -> Table {
        let style = &self.style;
        let mut rows = Vec::with_capacity(request.table_rows.len() + 2);
        rows.push(self.band_row(RowKind::Header, &request.table_header, |_| Align::Center));
        rows.extend(request.table_rows.iter().map(|values| TableRow {
            kind: RowKind::Body,
            cells: values
                .iter()
                .zip(&request.columns)
                .map(|(text, col)| TableCell {
                    paragraph: Paragraph {
                        text: text.clone(),
                        style: style.cell_style(col.align),
                    },
                })
                .collect(),
            background: None,
        }));
        if let Some(footer) = &request.table_footer {
            rows.push(self.band_row(RowKind::Footer, footer, |ci| request.columns[ci].align));
        }

        log::debug!(
            "table: {} columns, {} body rows, footer={}",
            request.columns.len(),
            request.table_rows.len(),
            request.table_footer.is_some()
        );

        Table {
            col_widths: request
                .columns
                .iter()
                .map(|c| doc_width / 100.0 * c.width_percent)
                .collect(),
            rows,
            cell_padding: style.cell_padding,
            v_align: style.cell_v_align,
            grid: style.grid,
            repeat_header: style.repeat_header,
        }
    }

    /// Header or footer row: band colours on every cell.
    fn band_row(&self, kind: RowKind, texts: &[String], align: impl Fn(usize) -> Align) -> TableRow {
        let style = &self.style;
        TableRow {
            kind,
            cells: texts
                .iter()
                .enumerate()
                .map(|(ci, text)| TableCell {
                    paragraph: Paragraph {
                        text: text.clone(),
                        style: style.band_style(align(ci)),
                    },
                })
                .collect(),
            background: Some(style.band_background),
        }
    }
}

fn make_canvas(
    writer: DocumentWriter,
    stamp_font: crate::fonts::FontEntry,
    stamp: crate::style::PageStamp,
    paginate: bool,
    landscape: bool,
) -> Box<dyn PageCanvas> {
    let direct = DirectCanvas::new(writer);
    match (paginate, landscape) {
        (false, _) => Box::new(direct),
        (true, false) => Box::new(PaginatingCanvas::portrait(direct, stamp, stamp_font)),
        (true, true) => Box::new(PaginatingCanvas::landscape(direct, stamp, stamp_font)),
    }
}
