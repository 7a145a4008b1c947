use crate::debug::DebugLogger;
use crate::error::TablexlError;
use crate::resolved::StyleCache;
use crate::sheet::{CellRef, MAX_COLUMNS, MAX_ROWS, MergeRange, SheetId, SheetSink};
use crate::table::TableNode;
use std::collections::BTreeMap;

/// Where a table ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TablePlacement {
    pub sheet: SheetId,
    /// First row below the table.
    pub next_row: u32,
}

/// Places table models on sheets.
///
/// Open row spans are tracked per column as the number of rows still covered
/// below the current one. Every cell skips covered columns and a colspan is
/// clipped to the run of free columns in front of it.
#[derive(Clone, Default)]
pub struct LayoutEngine {
    column_width_padding: f64,
    debug: Option<DebugLogger>,
}

impl LayoutEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Added to every computed column width.
    pub fn column_width_padding(mut self, padding: f64) -> Self {
        self.column_width_padding = padding;
        self
    }

    pub(crate) fn with_debug(mut self, debug: Option<DebugLogger>) -> Self {
        self.debug = debug;
        self
    }

    /// Creates a sheet for `table` (named by its `name` attribute) and writes the
    /// table starting at `start_row`/`start_column`.
    pub fn write_table(
        &self,
        table: &TableNode,
        sink: &mut impl SheetSink,
        cache: &mut StyleCache,
        start_row: u32,
        start_column: u32,
    ) -> Result<TablePlacement, TablexlError> {
        let sheet = sink.create_sheet(table.name.as_deref())?;
        let next_row = self.insert_table(
            table,
            sink,
            cache,
            CellRef::new(sheet, start_row, start_column),
        )?;
        Ok(TablePlacement { sheet, next_row })
    }

    /// Writes `table` into an existing sheet with its top-left cell at `at`.
    /// Returns the first row below the table and every merge it opened.
    pub fn insert_table(
        &self,
        table: &TableNode,
        sink: &mut impl SheetSink,
        cache: &mut StyleCache,
        at: CellRef,
    ) -> Result<u32, TablexlError> {
        let mut covered: BTreeMap<u32, u32> = BTreeMap::new();
        let mut widths: BTreeMap<u32, usize> = BTreeMap::new();
        let mut row = at.row;
        let mut cells_written = 0u64;
        let mut merges = 0u64;

        for row_node in table.rows() {
            let mut column = at.column;
            let mut opened: Vec<(u32, u32)> = Vec::new();

            for cell in &row_node.cells {
                while covered.contains_key(&column) {
                    column += 1;
                }
                let column_room = MAX_COLUMNS.saturating_sub(column) + 1;
                let mut colspan = 1;
                while colspan < cell.colspan.min(column_room)
                    && !covered.contains_key(&(column + colspan))
                {
                    colspan += 1;
                }
                if colspan < cell.colspan {
                    self.log_span_clipped("colspan", row, column, cell.colspan, colspan);
                }
                let rowspan = cell.rowspan.min(MAX_ROWS.saturating_sub(row) + 1);
                if rowspan < cell.rowspan {
                    self.log_span_clipped("rowspan", row, column, cell.rowspan, rowspan);
                }

                cell.apply(CellRef::new(at.sheet, row, column), sink, cache)?;
                cells_written += 1;
                let width = widths.entry(column).or_insert(0);
                *width = (*width).max(cell.text.chars().count());

                if colspan > 1 || rowspan > 1 {
                    sink.merge_range(
                        at.sheet,
                        MergeRange {
                            first_row: row,
                            first_column: column,
                            last_row: row + rowspan - 1,
                            last_column: column + colspan - 1,
                        },
                    )?;
                    merges += 1;
                }
                if rowspan > 1 {
                    opened.extend((column..column + colspan).map(|c| (c, rowspan - 1)));
                }
                column += colspan;
            }

            covered.retain(|_, remaining| {
                *remaining -= 1;
                *remaining > 0
            });
            covered.extend(opened);
            row += 1;
        }

        for (column, width) in widths {
            if width == 0 {
                continue;
            }
            sink.set_column_width(at.sheet, column, width as f64 + self.column_width_padding)?;
        }

        if let Some(logger) = &self.debug {
            logger.increment("cells.written", cells_written);
            logger.increment("merges.registered", merges);
        }
        log::debug!(
            "placed table {:?} at {}: {cells_written} cells, {merges} merges",
            table.name,
            at.a1()
        );
        // Rowspans opened by the last rows still cover the rows below them.
        let trailing = covered.values().copied().max().unwrap_or(0);
        Ok(row + trailing)
    }

    fn log_span_clipped(&self, span: &str, row: u32, column: u32, requested: u32, granted: u32) {
        log::warn!("{span} {requested} at row {row}, column {column} clipped to {granted}");
        if let Some(logger) = &self.debug {
            let row = row.to_string();
            let column = column.to_string();
            let requested = requested.to_string();
            let granted = granted.to_string();
            logger.log_event(
                "layout.span_clipped",
                &[
                    ("span", span),
                    ("row", row.as_str()),
                    ("column", column.as_str()),
                    ("requested", requested.as_str()),
                    ("granted", granted.as_str()),
                ],
            );
        }
    }
}

/// Embeds `table` into an existing sheet at `at` using default layout options.
pub fn compile_table_at_cell(
    table: &TableNode,
    at: CellRef,
    sink: &mut impl SheetSink,
    cache: &mut StyleCache,
) -> Result<u32, TablexlError> {
    LayoutEngine::new().insert_table(table, sink, cache, at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom;
    use crate::sheet::{Sheet, Workbook};

    fn place(html: &str) -> (Workbook, TablePlacement) {
        let document = dom::parse_document(html);
        let table = TableNode::build(&dom::find_first(&document, "table").expect("table"));
        let mut book = Workbook::new();
        let mut cache = StyleCache::new();
        let placement = LayoutEngine::new()
            .write_table(&table, &mut book, &mut cache, 1, 1)
            .expect("write table");
        (book, placement)
    }

    fn value(sheet: &Sheet, row: u32, column: u32) -> Option<&str> {
        sheet.cell(row, column).map(|w| w.value.as_str())
    }

    #[test]
    fn colspan_pushes_the_next_cell_past_the_region() {
        let (book, placement) = place(
            "<table name='t'><tr><td colspan='3'>wide</td><td>next</td></tr></table>",
        );
        let sheet = book.sheet(placement.sheet).expect("sheet");
        assert_eq!(value(sheet, 1, 1), Some("wide"));
        assert_eq!(value(sheet, 1, 4), Some("next"));
        assert_eq!(value(sheet, 1, 2), None);
        assert_eq!(sheet.merges().len(), 1);
        assert_eq!(sheet.merges()[0].to_string(), "A1:C1");
        assert_eq!(placement.next_row, 2);
    }

    #[test]
    fn rowspan_shifts_later_rows() {
        let (book, _) = place(
            "<table><tr><td rowspan='4'>tall</td><td>b1</td></tr>\
             <tr><td>b2</td></tr><tr><td>b3</td></tr><tr><td>b4</td></tr>\
             <tr><td>a5</td><td>b5</td></tr></table>",
        );
        let sheet = &book.sheets()[0];
        assert_eq!(sheet.merges()[0].to_string(), "A1:A4");
        for row in 2..=4 {
            assert_eq!(value(sheet, row, 1), None, "row {row} column A is covered");
            assert_eq!(value(sheet, row, 2), Some(format!("b{row}").as_str()));
        }
        assert_eq!(value(sheet, 5, 1), Some("a5"));
        assert_eq!(value(sheet, 5, 2), Some("b5"));
    }

    #[test]
    fn spans_carry_from_head_into_body() {
        let (book, placement) = place(
            "<table><thead><tr><th rowspan='2'>h</th><th>x</th></tr></thead>\
             <tbody><tr><td>y</td></tr></tbody></table>",
        );
        let sheet = &book.sheets()[0];
        assert_eq!(value(sheet, 2, 2), Some("y"));
        assert_eq!(placement.next_row, 3);
    }

    #[test]
    fn colspan_is_clipped_by_open_rowspan() {
        let (book, _) = place(
            "<table><tr><td>a</td><td>b</td><td rowspan='2'>c</td></tr>\
             <tr><td colspan='3'>wide</td><td>d</td></tr></table>",
        );
        let sheet = &book.sheets()[0];
        let merges: Vec<String> = sheet.merges().iter().map(|m| m.to_string()).collect();
        assert_eq!(merges, vec!["C1:C2", "A2:B2"]);
        assert_eq!(value(sheet, 2, 4), Some("d"));
    }

    #[test]
    fn column_width_is_the_longest_anchor_text() {
        let (book, _) = place(
            "<table><tr><td>ab</td></tr><tr><td>abcdefghi</td></tr>\
             <tr><td>abcd</td></tr><tr><td>abc</td></tr></table>",
        );
        assert_eq!(book.sheets()[0].column_width(1), Some(9.0));
    }

    #[test]
    fn covered_columns_do_not_contribute_width() {
        let (book, _) = place(
            "<table><tr><td colspan='2'>a very long header</td></tr><tr><td>a</td><td>bb</td></tr></table>",
        );
        let sheet = &book.sheets()[0];
        assert_eq!(sheet.column_width(1), Some(18.0));
        assert_eq!(sheet.column_width(2), Some(2.0));
    }

    #[test]
    fn padding_is_added_to_widths() {
        let document = dom::parse_document("<table><tr><td>abcd</td></tr></table>");
        let table = TableNode::build(&dom::find_first(&document, "table").expect("table"));
        let mut book = Workbook::new();
        LayoutEngine::new()
            .column_width_padding(2.0)
            .write_table(&table, &mut book, &mut StyleCache::new(), 1, 1)
            .expect("write");
        assert_eq!(book.sheets()[0].column_width(1), Some(6.0));
    }

    #[test]
    fn embedding_at_a_cell_offsets_everything() {
        let document = dom::parse_document(
            "<table><tr><td colspan='2'>x</td><td>y</td></tr><tr><td>z</td></tr></table>",
        );
        let table = TableNode::build(&dom::find_first(&document, "table").expect("table"));
        let mut book = Workbook::new();
        let mut cache = StyleCache::new();
        let sheet = book.create_sheet(Some("host")).expect("sheet");
        let next = compile_table_at_cell(&table, CellRef::new(sheet, 2, 2), &mut book, &mut cache)
            .expect("insert");
        assert_eq!(next, 4);
        let host = &book.sheets()[0];
        assert_eq!(value(host, 2, 2), Some("x"));
        assert_eq!(value(host, 2, 4), Some("y"));
        assert_eq!(value(host, 3, 2), Some("z"));
        assert_eq!(host.merges()[0].to_string(), "B2:C2");

        let after = compile_table_at_cell(&table, CellRef::new(sheet, next, 2), &mut book, &mut cache)
            .expect("append");
        assert_eq!(after, 6);
        assert_eq!(value(&book.sheets()[0], 4, 2), Some("x"));
    }

    #[test]
    fn spans_stop_at_the_sheet_edge() {
        let (book, _) = place("<table><tr><td>a</td><td colspan='20000'>wide</td></tr></table>");
        let sheet = &book.sheets()[0];
        assert_eq!(sheet.merges()[0].to_string(), "B1:XFD1");
        assert_eq!(sheet.merges()[0].last_column, MAX_COLUMNS);

        let document = dom::parse_document("<table><tr><td rowspan='9'>tall</td></tr></table>");
        let table = TableNode::build(&dom::find_first(&document, "table").expect("table"));
        let mut book = Workbook::new();
        let sheet = book.create_sheet(None).expect("sheet");
        let next = compile_table_at_cell(
            &table,
            CellRef::new(sheet, MAX_ROWS - 1, 1),
            &mut book,
            &mut StyleCache::new(),
        )
        .expect("insert near the last row");
        assert_eq!(book.sheets()[0].merges()[0].rows(), 2);
        assert_eq!(next, MAX_ROWS + 1);
    }

    #[test]
    fn trailing_rowspans_push_the_next_row_down() {
        let document = dom::parse_document("<table><tr><td rowspan='3'>a</td><td>b</td></tr></table>");
        let table = TableNode::build(&dom::find_first(&document, "table").expect("table"));
        let mut book = Workbook::new();
        let mut cache = StyleCache::new();
        let sheet = book.create_sheet(Some("stack")).expect("sheet");
        let next = compile_table_at_cell(&table, CellRef::new(sheet, 1, 1), &mut book, &mut cache)
            .expect("first");
        assert_eq!(next, 4);
        let after = compile_table_at_cell(&table, CellRef::new(sheet, next, 1), &mut book, &mut cache)
            .expect("second");
        assert_eq!(after, 7);
        let merges: Vec<String> = book.sheets()[0].merges().iter().map(|m| m.to_string()).collect();
        assert_eq!(merges, vec!["A1:A3", "A4:A6"]);
        let bytes = book.to_xlsx_bytes().expect("stacked tables render");
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn empty_rows_still_advance() {
        let (book, placement) = place("<table><tr></tr><tr><td>x</td></tr></table>");
        assert_eq!(value(&book.sheets()[0], 2, 1), Some("x"));
        assert_eq!(placement.next_row, 3);
    }
}
