//! Tabular business reports rendered to paginated PDF.
//!
//! A [`ReportRequest`] describes a company/title header, column definitions and the rows of
//! a table. [`ReportBuilder`] lays it out on A4 pages and, when page numbers are requested,
//! buffers every page until the last one is laid out so each can be stamped
//! "Página X de Y".

mod error;
mod fonts;
mod images;
mod model;
mod pdf;
mod report;
mod style;

pub use error::Error;
pub use model::{
    Align, Block, Column, EmbeddedImage, HeaderBlock, LogoSource, Paragraph, ReportRequest,
    ReportType, RowKind, Table, TableCell, TableRow,
};
pub use report::ReportBuilder;
pub use style::{
    CellPadding, CellVAlign, Color, FontFace, FontSource, GridLine, Margins, PageStamp,
    ReportStyle, TextStyle, cell_style,
};

use std::time::Instant;

/// Render `request` with the default style, taking the font source from the environment
/// (see [`ReportStyle::from_env`]).
pub fn build_report(request: &ReportRequest) -> Result<Vec<u8>, Error> {
    let t0 = Instant::now();

    let builder = ReportBuilder::new().with_style(ReportStyle::from_env());
    let bytes = builder.build(request)?;

    log::info!(
        "Timing: total={:.1}ms (output {} bytes, {} body rows)",
        t0.elapsed().as_secs_f64() * 1000.0,
        bytes.len(),
        request.table_rows.len(),
    );

    Ok(bytes)
}
