mod cell_type;
mod debug;
mod dom;
mod error;
mod inline;
mod layout;
mod perf;
#[cfg(feature = "python")]
mod python;
mod resolved;
mod sheet;
mod style;
mod table;
mod xlsx;

pub use cell_type::{
    CellType, FORMAT_CURRENCY, FORMAT_DATE, FORMAT_DECIMAL, FORMAT_INTEGER, TYPE_BOOL,
    TYPE_CURRENCY, TYPE_DATE, TYPE_ERROR, TYPE_FORMULA, TYPE_FORMULA_CACHE_STRING, TYPE_INLINE,
    TYPE_INTEGER, TYPE_NULL, TYPE_NUMERIC, TYPE_STRING, number_format_of, type_of,
};
pub use dom::{TextPolicy, text_content};
pub use error::TablexlError;
pub use inline::{CssInliner, inline_styles};
pub use layout::{LayoutEngine, TablePlacement, compile_table_at_cell};
pub use resolved::{
    Alignment, Border, BorderSide, Fill, Font, ResolvedStyle, StyleCache, colormap,
};
pub use sheet::{
    CellRef, CellWrite, MergeRange, Sheet, SheetId, SheetSink, Workbook, WriteInstruction,
    column_letters,
};
pub use style::{StyleKey, StyleMapping, parse_style_declarations};
pub use table::{CellNode, ModelNode, NodeKind, RowNode, SectionNode, TableNode, build_tables};

use debug::DebugLogger;
use perf::{PerfLogger, timed};
use std::path::{Path, PathBuf};

/// Ordered `(sheet name, write instructions)` pairs produced by one conversion.
pub type CompiledDocument = Vec<(String, Vec<WriteInstruction>)>;

/// Configured HTML-table to spreadsheet converter.
#[derive(Clone)]
pub struct Tablexl {
    inline_css: bool,
    inliner: CssInliner,
    default_sheet_name: String,
    layout: LayoutEngine,
    debug: Option<DebugLogger>,
    perf: Option<PerfLogger>,
}

#[derive(Clone)]
pub struct TablexlBuilder {
    inline_css: bool,
    base_url: Option<String>,
    stylesheets: Vec<String>,
    default_sheet_name: String,
    column_width_padding: f64,
    debug_path: Option<PathBuf>,
    perf_enabled: bool,
    perf_path: Option<PathBuf>,
}

impl Tablexl {
    pub fn builder() -> TablexlBuilder {
        TablexlBuilder::new()
    }

    /// Converts every table of `html` into its own sheet and returns the
    /// recorded writes, one entry per table in document order.
    pub fn compile_document(
        &self,
        html: &str,
        base_url: Option<&str>,
    ) -> Result<CompiledDocument, TablexlError> {
        Ok(self
            .document_to_workbook(html, base_url, None)?
            .into_instructions())
    }

    /// Appends one sheet per table to `existing` (or to a new workbook).
    pub fn document_to_workbook(
        &self,
        html: &str,
        base_url: Option<&str>,
        existing: Option<Workbook>,
    ) -> Result<Workbook, TablexlError> {
        let mut workbook = existing
            .unwrap_or_else(|| Workbook::with_default_sheet_name(self.default_sheet_name.clone()));
        let tables = self.get_tables(html, base_url)?;
        let mut cache = StyleCache::with_debug(self.debug.clone());

        let result = timed(self.perf.as_ref(), "write_sheets", None, || {
            for (idx, table) in tables.iter().enumerate() {
                let placement = self
                    .layout
                    .write_table(table, &mut workbook, &mut cache, 1, 1)?;
                self.log_sheet_written(idx, &workbook, placement);
            }
            Ok::<(), TablexlError>(())
        });
        log::debug!(
            "converted {} tables with {} distinct styles",
            tables.len(),
            cache.len()
        );
        self.emit_debug_summary("document");
        result.map(|_| workbook)
    }

    pub fn document_to_xlsx(
        &self,
        html: &str,
        path: impl AsRef<Path>,
        base_url: Option<&str>,
    ) -> Result<(), TablexlError> {
        self.document_to_workbook(html, base_url, None)?.save(path)
    }

    pub fn document_to_xlsx_bytes(
        &self,
        html: &str,
        base_url: Option<&str>,
    ) -> Result<Vec<u8>, TablexlError> {
        self.document_to_workbook(html, base_url, None)?
            .to_xlsx_bytes()
    }

    /// Table models of `html` after CSS inlining, in document order.
    pub fn get_tables(
        &self,
        html: &str,
        base_url: Option<&str>,
    ) -> Result<Vec<TableNode>, TablexlError> {
        let document = dom::parse_document(html);
        if self.inline_css {
            let inliner = match base_url {
                Some(base) => self.inliner.clone().base_url(base)?,
                None => self.inliner.clone(),
            };
            timed(self.perf.as_ref(), "inline_css", None, || {
                inliner.inline_document(&document)
            });
        }
        let tables = timed(self.perf.as_ref(), "build_tables", None, || {
            build_tables(&document)
        });
        if let Some(logger) = &self.debug {
            for (idx, table) in tables.iter().enumerate() {
                let index = idx.to_string();
                let rows = table.rows().count().to_string();
                let cells = table.cell_count().to_string();
                logger.log_event(
                    "table.built",
                    &[
                        ("table", index.as_str()),
                        ("name", table.name.as_deref().unwrap_or("")),
                        ("head", if table.head.is_some() { "true" } else { "false" }),
                        ("rows", rows.as_str()),
                        ("cells", cells.as_str()),
                    ],
                );
            }
        }
        Ok(tables)
    }

    /// Embeds `table` into an existing sheet at `at` with this converter's
    /// layout options. Returns the row after the table.
    pub fn insert_table_at_cell(
        &self,
        table: &TableNode,
        at: CellRef,
        sink: &mut impl SheetSink,
        cache: &mut StyleCache,
    ) -> Result<u32, TablexlError> {
        self.layout.insert_table(table, sink, cache, at)
    }

    fn log_sheet_written(&self, idx: usize, workbook: &Workbook, placement: TablePlacement) {
        let Some(logger) = &self.debug else {
            return;
        };
        let Some(sheet) = workbook.sheet(placement.sheet) else {
            return;
        };
        let index = idx.to_string();
        let rows = placement.next_row.saturating_sub(1).to_string();
        let cells = sheet.cell_count().to_string();
        logger.log_event(
            "sheet.written",
            &[
                ("table", index.as_str()),
                ("sheet", sheet.name()),
                ("rows", rows.as_str()),
                ("cells", cells.as_str()),
            ],
        );
    }

    fn emit_debug_summary(&self, context: &str) {
        if let Some(logger) = &self.debug {
            logger.emit_summary(context);
            logger.flush();
        }
        if let Some(perf) = &self.perf {
            perf.flush();
        }
    }
}

impl TablexlBuilder {
    pub fn new() -> Self {
        Self {
            inline_css: true,
            base_url: None,
            stylesheets: Vec::new(),
            default_sheet_name: "Sheet".to_string(),
            column_width_padding: 0.0,
            debug_path: None,
            perf_enabled: false,
            perf_path: None,
        }
    }

    pub fn inline_css(mut self, enabled: bool) -> Self {
        self.inline_css = enabled;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn stylesheet(mut self, css: impl Into<String>) -> Self {
        self.stylesheets.push(css.into());
        self
    }

    pub fn default_sheet_name(mut self, name: impl Into<String>) -> Self {
        self.default_sheet_name = name.into();
        self
    }

    pub fn column_width_padding(mut self, padding: f64) -> Self {
        self.column_width_padding = padding;
        self
    }

    pub fn debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    pub fn perf_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.perf_path = Some(path.into());
        self
    }

    pub fn perf_enabled(mut self, enabled: bool) -> Self {
        self.perf_enabled = enabled;
        self
    }

    pub fn build(self) -> Result<Tablexl, TablexlError> {
        if self.default_sheet_name.trim().is_empty() {
            return Err(TablexlError::InvalidConfiguration(
                "default_sheet_name must not be empty".to_string(),
            ));
        }
        if !self.column_width_padding.is_finite() || self.column_width_padding < 0.0 {
            return Err(TablexlError::InvalidConfiguration(
                "column_width_padding must be a finite value >= 0".to_string(),
            ));
        }
        let debug = match self.debug_path {
            Some(path) => Some(DebugLogger::new(path)?),
            None => None,
        };
        let perf = if self.perf_enabled || self.perf_path.is_some() {
            let path = self
                .perf_path
                .unwrap_or_else(|| PathBuf::from("tablexl_perf.log"));
            Some(PerfLogger::new(path)?)
        } else {
            None
        };

        let mut inliner = CssInliner::new().with_debug(debug.clone());
        if let Some(base) = &self.base_url {
            inliner = inliner.base_url(base)?;
        }
        for css in self.stylesheets {
            inliner = inliner.stylesheet(css);
        }
        let layout = LayoutEngine::new()
            .column_width_padding(self.column_width_padding)
            .with_debug(debug.clone());

        Ok(Tablexl {
            inline_css: self.inline_css,
            inliner,
            default_sheet_name: self.default_sheet_name,
            layout,
            debug,
            perf,
        })
    }
}

impl Default for TablexlBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// [`Tablexl::compile_document`] with default options.
pub fn compile_document(
    html: &str,
    base_url: Option<&str>,
) -> Result<CompiledDocument, TablexlError> {
    Tablexl::builder().build()?.compile_document(html, base_url)
}

/// [`Tablexl::document_to_workbook`] with default options.
pub fn document_to_workbook(
    html: &str,
    existing: Option<Workbook>,
    base_url: Option<&str>,
) -> Result<Workbook, TablexlError> {
    Tablexl::builder()
        .build()?
        .document_to_workbook(html, base_url, existing)
}

/// [`Tablexl::document_to_xlsx`] with default options.
pub fn document_to_xlsx(
    html: &str,
    path: impl AsRef<Path>,
    base_url: Option<&str>,
) -> Result<(), TablexlError> {
    Tablexl::builder()
        .build()?
        .document_to_xlsx(html, path, base_url)
}

/// Table models of `html` with `<style>` blocks inlined.
pub fn get_tables(html: &str) -> Result<Vec<TableNode>, TablexlError> {
    Tablexl::builder().build()?.get_tables(html, None)
}
