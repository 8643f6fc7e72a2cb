use thiserror::Error;

use crate::model::ReportType;

#[derive(Debug, Error)]
pub enum Error {
    /// The request is inconsistent: column/header/row lengths disagree, widths are invalid,
    /// or a report type name could not be parsed.
    #[error("invalid report configuration: {0}")]
    Configuration(String),

    #[error("report type {0} has no layout strategy")]
    UnsupportedReportType(ReportType),

    /// A logo or font could not be read, fetched or decoded.
    #[error("failed to load resource: {0}")]
    ResourceLoad(String),

    #[error("layout failed: {0}")]
    Layout(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
