use thiserror::Error;

#[derive(Debug, Error)]
pub enum TablexlError {
    #[error("a sheet named {0:?} already exists in the workbook")]
    DuplicateSheetName(String),
    #[error("invalid sheet name {0:?}")]
    InvalidSheetName(String),
    #[error("no sheet with id {0} in the workbook")]
    UnknownSheet(usize),
    #[error("cell position row={row} column={column} is outside the spreadsheet grid")]
    CellOutOfRange { row: u32, column: u32 },
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("xlsx error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
