use crate::cell_type::CellType;
use crate::error::TablexlError;
use crate::resolved::ResolvedStyle;
use std::fmt;
use std::sync::Arc;

pub const MAX_ROWS: u32 = 1_048_576;
pub const MAX_COLUMNS: u32 = 16_384;
const MAX_SHEET_NAME_CHARS: usize = 31;
const FORBIDDEN_SHEET_NAME_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SheetId(pub usize);

/// A cell position on one sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRef {
    pub sheet: SheetId,
    pub row: u32,
    pub column: u32,
}

impl CellRef {
    pub fn new(sheet: SheetId, row: u32, column: u32) -> Self {
        Self { sheet, row, column }
    }

    pub fn a1(&self) -> String {
        a1(self.row, self.column)
    }
}

/// Inclusive rectangle of cells merged into its top-left anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MergeRange {
    pub first_row: u32,
    pub first_column: u32,
    pub last_row: u32,
    pub last_column: u32,
}

impl MergeRange {
    pub fn rows(&self) -> u32 {
        self.last_row - self.first_row + 1
    }

    pub fn contains(&self, row: u32, column: u32) -> bool {
        (self.first_row..=self.last_row).contains(&row)
            && (self.first_column..=self.last_column).contains(&column)
    }
}

impl fmt::Display for MergeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            a1(self.first_row, self.first_column),
            a1(self.last_row, self.last_column)
        )
    }
}

/// Everything the sink needs to materialize one cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CellWrite {
    /// Literal cell text; never coerced.
    pub value: String,
    pub style: Arc<ResolvedStyle>,
    pub cell_type: CellType,
    pub number_format: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteInstruction {
    SetCell { row: u32, column: u32, write: CellWrite },
    MergeRange(MergeRange),
    SetColumnWidth { column: u32, width: f64 },
}

pub trait SheetSink {
    /// Creates a sheet. `None` asks the sink for a generated name.
    fn create_sheet(&mut self, name: Option<&str>) -> Result<SheetId, TablexlError>;

    fn write_cell(&mut self, at: CellRef, write: CellWrite) -> Result<(), TablexlError>;

    fn merge_range(&mut self, sheet: SheetId, range: MergeRange) -> Result<(), TablexlError>;

    fn set_column_width(
        &mut self,
        sheet: SheetId,
        column: u32,
        width: f64,
    ) -> Result<(), TablexlError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    name: String,
    instructions: Vec<WriteInstruction>,
}

impl Sheet {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instructions(&self) -> &[WriteInstruction] {
        &self.instructions
    }

    /// Latest write at `(row, column)`.
    pub fn cell(&self, row: u32, column: u32) -> Option<&CellWrite> {
        self.instructions.iter().rev().find_map(|instruction| match instruction {
            WriteInstruction::SetCell {
                row: r,
                column: c,
                write,
            } if *r == row && *c == column => Some(write),
            _ => None,
        })
    }

    pub fn merges(&self) -> Vec<MergeRange> {
        self.instructions
            .iter()
            .filter_map(|instruction| match instruction {
                WriteInstruction::MergeRange(range) => Some(*range),
                _ => None,
            })
            .collect()
    }

    pub fn column_width(&self, column: u32) -> Option<f64> {
        self.instructions.iter().rev().find_map(|instruction| match instruction {
            WriteInstruction::SetColumnWidth { column: c, width } if *c == column => Some(*width),
            _ => None,
        })
    }

    pub fn cell_count(&self) -> usize {
        self.instructions
            .iter()
            .filter(|instruction| matches!(instruction, WriteInstruction::SetCell { .. }))
            .count()
    }
}

/// Records sheets and their write instructions in creation order.
#[derive(Debug, Clone, PartialEq)]
pub struct Workbook {
    sheets: Vec<Sheet>,
    default_sheet_name: String,
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

impl Workbook {
    pub fn new() -> Self {
        Self::with_default_sheet_name("Sheet")
    }

    /// Unnamed sheets become `base`, then `base1`, `base2`, ...
    pub fn with_default_sheet_name(base: impl Into<String>) -> Self {
        Self {
            sheets: Vec::new(),
            default_sheet_name: base.into(),
        }
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet(&self, id: SheetId) -> Option<&Sheet> {
        self.sheets.get(id.0)
    }

    pub fn sheet_by_name(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }

    pub fn sheet_id(&self, name: &str) -> Option<SheetId> {
        self.sheets
            .iter()
            .position(|sheet| sheet.name == name)
            .map(SheetId)
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|sheet| sheet.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// `(sheet name, instructions)` per sheet, in creation order.
    pub fn into_instructions(self) -> Vec<(String, Vec<WriteInstruction>)> {
        self.sheets
            .into_iter()
            .map(|sheet| (sheet.name, sheet.instructions))
            .collect()
    }

    fn name_taken(&self, name: &str) -> bool {
        self.sheets
            .iter()
            .any(|sheet| sheet.name.eq_ignore_ascii_case(name))
    }

    fn generated_name(&self) -> String {
        let base = self.default_sheet_name.as_str();
        if !self.name_taken(base) {
            return base.to_string();
        }
        (1..)
            .map(|idx| format!("{base}{idx}"))
            .find(|candidate| !self.name_taken(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    fn sheet_mut(&mut self, id: SheetId) -> Result<&mut Sheet, TablexlError> {
        self.sheets
            .get_mut(id.0)
            .ok_or(TablexlError::UnknownSheet(id.0))
    }
}

impl SheetSink for Workbook {
    fn create_sheet(&mut self, name: Option<&str>) -> Result<SheetId, TablexlError> {
        let name = match name {
            Some(name) => name.to_string(),
            None => self.generated_name(),
        };
        validate_sheet_name(&name)?;
        if self.name_taken(&name) {
            return Err(TablexlError::DuplicateSheetName(name));
        }
        self.sheets.push(Sheet {
            name,
            instructions: Vec::new(),
        });
        Ok(SheetId(self.sheets.len() - 1))
    }

    fn write_cell(&mut self, at: CellRef, write: CellWrite) -> Result<(), TablexlError> {
        check_position(at.row, at.column)?;
        self.sheet_mut(at.sheet)?
            .instructions
            .push(WriteInstruction::SetCell {
                row: at.row,
                column: at.column,
                write,
            });
        Ok(())
    }

    fn merge_range(&mut self, sheet: SheetId, range: MergeRange) -> Result<(), TablexlError> {
        check_position(range.first_row, range.first_column)?;
        check_position(range.last_row, range.last_column)?;
        if range.last_row < range.first_row || range.last_column < range.first_column {
            return Err(TablexlError::CellOutOfRange {
                row: range.last_row,
                column: range.last_column,
            });
        }
        self.sheet_mut(sheet)?
            .instructions
            .push(WriteInstruction::MergeRange(range));
        Ok(())
    }

    /// Widths only grow, so tables embedded into one sheet keep the widest hint.
    fn set_column_width(
        &mut self,
        sheet: SheetId,
        column: u32,
        width: f64,
    ) -> Result<(), TablexlError> {
        check_position(1, column)?;
        let target = self.sheet_mut(sheet)?;
        let width = match target.column_width(column) {
            Some(existing) if existing >= width => return Ok(()),
            _ => width,
        };
        target
            .instructions
            .push(WriteInstruction::SetColumnWidth { column, width });
        Ok(())
    }
}

fn validate_sheet_name(name: &str) -> Result<(), TablexlError> {
    let invalid = name.trim().is_empty()
        || name.chars().count() > MAX_SHEET_NAME_CHARS
        || name.contains(FORBIDDEN_SHEET_NAME_CHARS)
        || name.starts_with('\'')
        || name.ends_with('\'');
    if invalid {
        return Err(TablexlError::InvalidSheetName(name.to_string()));
    }
    Ok(())
}

fn check_position(row: u32, column: u32) -> Result<(), TablexlError> {
    if row == 0 || column == 0 || row > MAX_ROWS || column > MAX_COLUMNS {
        return Err(TablexlError::CellOutOfRange { row, column });
    }
    Ok(())
}

/// Spreadsheet column letters for a 1-based column index (`1` -> `A`, `27` -> `AA`).
pub fn column_letters(column: u32) -> String {
    let mut n = column;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

fn a1(row: u32, column: u32) -> String {
    format!("{}{}", column_letters(column), row)
}
