use crate::error::TablexlError;
use crate::resolved::StyleCache;
use crate::sheet::{CellRef, CellWrite, SheetSink};
use crate::table::CellNode;

pub const TYPE_STRING: &str = "TYPE_STRING";
pub const TYPE_FORMULA: &str = "TYPE_FORMULA";
pub const TYPE_NUMERIC: &str = "TYPE_NUMERIC";
pub const TYPE_BOOL: &str = "TYPE_BOOL";
pub const TYPE_CURRENCY: &str = "TYPE_CURRENCY";
pub const TYPE_INTEGER: &str = "TYPE_INTEGER";
pub const TYPE_DATE: &str = "TYPE_DATE";
pub const TYPE_NULL: &str = "TYPE_NULL";
pub const TYPE_INLINE: &str = "TYPE_INLINE";
pub const TYPE_ERROR: &str = "TYPE_ERROR";
pub const TYPE_FORMULA_CACHE_STRING: &str = "TYPE_FORMULA_CACHE_STRING";

pub const FORMAT_CURRENCY: &str = "\"$\"#,##0.00_-";
pub const FORMAT_INTEGER: &str = "#,##0";
pub const FORMAT_DECIMAL: &str = "#,##0.##";
pub const FORMAT_DATE: &str = "mm/dd/yyyy";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellType {
    String,
    Numeric,
    Formula,
    Bool,
    Date,
    Null,
    Inline,
    Error,
    FormulaCacheString,
}

/// Single-marker types, in the order used when a cell carries several.
const MARKER_PRIORITY: [(&str, CellType); 8] = [
    (TYPE_NUMERIC, CellType::Numeric),
    (TYPE_DATE, CellType::Date),
    (TYPE_BOOL, CellType::Bool),
    (TYPE_ERROR, CellType::Error),
    (TYPE_INLINE, CellType::Inline),
    (TYPE_FORMULA_CACHE_STRING, CellType::FormulaCacheString),
    (TYPE_NULL, CellType::Null),
    (TYPE_STRING, CellType::String),
];

impl CellType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CellType::String => "string",
            CellType::Numeric => "numeric",
            CellType::Formula => "formula",
            CellType::Bool => "bool",
            CellType::Date => "date",
            CellType::Null => "null",
            CellType::Inline => "inline",
            CellType::Error => "error",
            CellType::FormulaCacheString => "formula_cache_string",
        }
    }
}

fn has(classes: &[String], marker: &str) -> bool {
    classes.iter().any(|class| class == marker)
}

/// Resolves the type from class tokens. `TYPE_FORMULA` wins, then
/// `TYPE_CURRENCY`/`TYPE_INTEGER` (both numeric), then the remaining markers.
pub fn type_of(classes: &[String]) -> CellType {
    if has(classes, TYPE_FORMULA) {
        return CellType::Formula;
    }
    if has(classes, TYPE_CURRENCY) || has(classes, TYPE_INTEGER) {
        return CellType::Numeric;
    }
    MARKER_PRIORITY
        .iter()
        .find(|(marker, _)| has(classes, marker))
        .map(|(_, cell_type)| *cell_type)
        .unwrap_or(CellType::String)
}

pub fn number_format_of(classes: &[String], text: &str) -> Option<&'static str> {
    if has(classes, TYPE_CURRENCY) {
        return Some(FORMAT_CURRENCY);
    }
    if has(classes, TYPE_INTEGER) {
        return Some(FORMAT_INTEGER);
    }
    if has(classes, TYPE_DATE) {
        return Some(FORMAT_DATE);
    }
    if type_of(classes) == CellType::Numeric {
        return Some(if text.trim().parse::<i64>().is_ok() {
            FORMAT_INTEGER
        } else {
            FORMAT_DECIMAL
        });
    }
    None
}

impl CellNode {
    pub fn cell_type(&self) -> CellType {
        type_of(&self.classes)
    }

    pub fn number_format(&self) -> Option<&'static str> {
        number_format_of(&self.classes, &self.text)
    }

    /// Value, resolved style, type and number format for this cell.
    pub fn to_write(&self, cache: &mut StyleCache) -> CellWrite {
        CellWrite {
            value: self.text.clone(),
            style: cache.compile(&self.style),
            cell_type: self.cell_type(),
            number_format: self.number_format(),
        }
    }

    /// Writes this cell to `at` on `sink`.
    pub fn apply(
        &self,
        at: CellRef,
        sink: &mut impl SheetSink,
        cache: &mut StyleCache,
    ) -> Result<(), TablexlError> {
        sink.write_cell(at, self.to_write(cache))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom;
    use crate::sheet::{SheetId, Workbook};
    use crate::table::TableNode;

    fn classes(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn formula_wins_over_everything() {
        let tokens = classes(&[TYPE_INTEGER, TYPE_FORMULA, TYPE_CURRENCY]);
        assert_eq!(type_of(&tokens), CellType::Formula);
        assert_eq!(number_format_of(&tokens, "=SUM(A1:A3)"), Some(FORMAT_CURRENCY));
        let tokens = classes(&[TYPE_FORMULA, TYPE_INTEGER]);
        assert_eq!(type_of(&tokens), CellType::Formula);
        assert_eq!(number_format_of(&tokens, "=A1+B1"), Some("#,##0"));
    }

    #[test]
    fn currency_and_integer_collapse_to_numeric() {
        assert_eq!(type_of(&classes(&[TYPE_CURRENCY])), CellType::Numeric);
        assert_eq!(type_of(&classes(&[TYPE_INTEGER, TYPE_DATE])), CellType::Numeric);
        assert_eq!(
            number_format_of(&classes(&[TYPE_CURRENCY]), "12.5"),
            Some("\"$\"#,##0.00_-")
        );
    }

    #[test]
    fn numeric_format_depends_on_the_text() {
        let numeric = classes(&[TYPE_NUMERIC]);
        assert_eq!(number_format_of(&numeric, "1234"), Some("#,##0"));
        assert_eq!(number_format_of(&numeric, " -42 "), Some("#,##0"));
        assert_eq!(number_format_of(&numeric, "12.5"), Some("#,##0.##"));
        assert_eq!(number_format_of(&numeric, "n/a"), Some("#,##0.##"));
    }

    #[test]
    fn other_markers_and_default() {
        assert_eq!(type_of(&classes(&["wide", "bold"])), CellType::String);
        assert_eq!(type_of(&classes(&[TYPE_BOOL])), CellType::Bool);
        assert_eq!(type_of(&classes(&[TYPE_NULL, TYPE_DATE])), CellType::Date);
        assert_eq!(
            type_of(&classes(&[TYPE_FORMULA_CACHE_STRING])),
            CellType::FormulaCacheString
        );
        assert_eq!(number_format_of(&classes(&[TYPE_DATE]), "01/02/2024"), Some(FORMAT_DATE));
        assert_eq!(number_format_of(&classes(&[TYPE_BOOL]), "true"), None);
        assert_eq!(number_format_of(&[], "1234"), None);
    }

    #[test]
    fn apply_writes_value_style_type_and_format() {
        let document = dom::parse_document(
            "<table style='font-weight: bold'><tr><td class='TYPE_NUMERIC'>12.5</td></tr></table>",
        );
        let table = TableNode::build(&dom::find_first(&document, "table").expect("table"));
        let cell = &table.body.rows[0].cells[0];

        let mut book = Workbook::new();
        let mut cache = StyleCache::new();
        let sheet = book.create_sheet(None).expect("sheet");
        cell.apply(CellRef::new(sheet, 3, 2), &mut book, &mut cache)
            .expect("apply");

        let written = book.sheet(SheetId(0)).and_then(|s| s.cell(3, 2)).expect("cell");
        assert_eq!(written.value, "12.5");
        assert_eq!(written.cell_type, CellType::Numeric);
        assert_eq!(written.number_format, Some(FORMAT_DECIMAL));
        assert!(written.style.font.bold);
    }
}
