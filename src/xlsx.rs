use crate::cell_type::CellType;
use crate::error::TablexlError;
use crate::resolved::{BorderSide, ResolvedStyle, FILL_SOLID};
use crate::sheet::{CellWrite, MAX_COLUMNS, MAX_ROWS, Sheet, WriteInstruction, Workbook};
use rust_xlsxwriter::{
    Color, ExcelDateTime, Format, FormatAlign, FormatBorder, FormatDiagonalBorder, FormatPattern,
    Worksheet,
};
use std::collections::HashMap;
use std::path::Path;

impl Workbook {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TablexlError> {
        let mut book = self.render()?;
        book.save(path.as_ref())?;
        Ok(())
    }

    pub fn to_xlsx_bytes(&self) -> Result<Vec<u8>, TablexlError> {
        let mut book = self.render()?;
        Ok(book.save_to_buffer()?)
    }

    fn render(&self) -> Result<rust_xlsxwriter::Workbook, TablexlError> {
        let mut book = rust_xlsxwriter::Workbook::new();
        let mut formats = FormatCache::default();
        for sheet in self.sheets() {
            let worksheet = book.add_worksheet();
            worksheet.set_name(sheet.name())?;
            render_sheet(sheet, worksheet, &mut formats)?;
        }
        if self.is_empty() {
            // An xlsx package needs at least one sheet.
            book.add_worksheet();
        }
        Ok(book)
    }
}

/// One `Format` per (resolved style, number format) pair.
#[derive(Default)]
struct FormatCache {
    formats: HashMap<(String, Option<&'static str>), Format>,
}

impl FormatCache {
    fn get(&mut self, write: &CellWrite) -> &Format {
        self.formats
            .entry((write.style.name.clone(), write.number_format))
            .or_insert_with(|| build_format(&write.style, write.number_format))
    }
}

fn render_sheet(
    sheet: &Sheet,
    worksheet: &mut Worksheet,
    formats: &mut FormatCache,
) -> Result<(), TablexlError> {
    // Merges go first; writing a merge afterwards would blank the anchor value.
    for instruction in sheet.instructions() {
        if let WriteInstruction::MergeRange(range) = instruction {
            let (first_row, first_column) = grid(range.first_row, range.first_column)?;
            let (last_row, last_column) = grid(range.last_row, range.last_column)?;
            let format = match sheet.cell(range.first_row, range.first_column) {
                Some(anchor) => formats.get(anchor).clone(),
                None => Format::new(),
            };
            worksheet.merge_range(first_row, first_column, last_row, last_column, "", &format)?;
        }
    }

    for instruction in sheet.instructions() {
        if let WriteInstruction::SetCell { row, column, write } = instruction {
            let (row, column) = grid(*row, *column)?;
            let format = formats.get(write);
            write_cell(worksheet, row, column, write, format)?;
        }
    }

    for instruction in sheet.instructions() {
        if let WriteInstruction::SetColumnWidth { column, width } = instruction {
            let (_, column) = grid(1, *column)?;
            worksheet.set_column_width(column, *width)?;
        }
    }
    Ok(())
}

/// 1-based model position to 0-based worksheet indices.
fn grid(row: u32, column: u32) -> Result<(u32, u16), TablexlError> {
    if row == 0 || column == 0 || row > MAX_ROWS || column > MAX_COLUMNS {
        return Err(TablexlError::CellOutOfRange { row, column });
    }
    let column = u16::try_from(column - 1)
        .map_err(|_| TablexlError::CellOutOfRange { row, column })?;
    Ok((row - 1, column))
}

fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    column: u16,
    write: &CellWrite,
    format: &Format,
) -> Result<(), TablexlError> {
    let value = write.value.as_str();
    if value.is_empty() || write.cell_type == CellType::Null {
        worksheet.write_blank(row, column, format)?;
        return Ok(());
    }
    match write.cell_type {
        CellType::Numeric => match parse_number(value) {
            Some(number) => {
                worksheet.write_number_with_format(row, column, number, format)?;
            }
            None => {
                worksheet.write_string_with_format(row, column, value, format)?;
            }
        },
        CellType::Formula => {
            worksheet.write_formula_with_format(row, column, value, format)?;
        }
        CellType::Bool => match parse_bool(value) {
            Some(flag) => {
                worksheet.write_boolean_with_format(row, column, flag, format)?;
            }
            None => {
                worksheet.write_string_with_format(row, column, value, format)?;
            }
        },
        CellType::Date => match parse_date(value) {
            Some(date) => {
                worksheet.write_datetime_with_format(row, column, &date, format)?;
            }
            None => {
                worksheet.write_string_with_format(row, column, value, format)?;
            }
        },
        _ => {
            worksheet.write_string_with_format(row, column, value, format)?;
        }
    }
    Ok(())
}

fn parse_number(value: &str) -> Option<f64> {
    let cleaned: String = value
        .chars()
        .filter(|c| *c != ',' && *c != '$' && !c.is_whitespace())
        .collect();
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// `mm/dd/yyyy` or `yyyy-mm-dd`.
fn parse_date(value: &str) -> Option<ExcelDateTime> {
    let value = value.trim();
    let (year, month, day) = if let Some((month, rest)) = value.split_once('/') {
        let (day, year) = rest.split_once('/')?;
        (year, month, day)
    } else {
        let mut parts = value.splitn(3, '-');
        (parts.next()?, parts.next()?, parts.next()?)
    };
    let year = year.trim().parse::<u16>().ok()?;
    let month = month.trim().parse::<u8>().ok()?;
    let day = day.trim().parse::<u8>().ok()?;
    ExcelDateTime::from_ymd(year, month, day).ok()
}

fn build_format(style: &ResolvedStyle, number_format: Option<&str>) -> Format {
    let mut format = Format::new();

    if style.font.bold {
        format = format.set_bold();
    }
    if let Some(color) = style.font.color.as_deref().and_then(parse_color) {
        format = format.set_font_color(color);
    }
    if let Some(size) = style.font.size {
        format = format.set_font_size(size);
    }

    if let Some(align) = horizontal_align(&style.alignment.horizontal) {
        format = format.set_align(align);
    }
    if let Some(align) = style.alignment.vertical.as_deref().and_then(vertical_align) {
        format = format.set_align(align);
    }
    if style.alignment.wrap_text {
        format = format.set_text_wrap();
    }

    if let Some(fill) = &style.fill {
        let start = parse_color(&fill.start_color);
        if fill.pattern.eq_ignore_ascii_case(FILL_SOLID) {
            if let Some(color) = start {
                format = format.set_background_color(color);
            }
        } else {
            format = format.set_pattern(fill_pattern(&fill.pattern));
            if let Some(color) = start {
                format = format.set_foreground_color(color);
            }
            if let Some(color) = fill.end_color.as_deref().and_then(parse_color) {
                format = format.set_background_color(color);
            }
        }
    }

    let border = &style.border;
    if let Some(side) = border_style(&border.left) {
        format = format.set_border_left(side);
    }
    if let Some(color) = border_color(&border.left) {
        format = format.set_border_left_color(color);
    }
    if let Some(side) = border_style(&border.right) {
        format = format.set_border_right(side);
    }
    if let Some(color) = border_color(&border.right) {
        format = format.set_border_right_color(color);
    }
    if let Some(side) = border_style(&border.top) {
        format = format.set_border_top(side);
    }
    if let Some(color) = border_color(&border.top) {
        format = format.set_border_top_color(color);
    }
    if let Some(side) = border_style(&border.bottom) {
        format = format.set_border_bottom(side);
    }
    if let Some(color) = border_color(&border.bottom) {
        format = format.set_border_bottom_color(color);
    }
    if let Some(side) = border_style(&border.diagonal) {
        format = format
            .set_border_diagonal(side)
            .set_border_diagonal_type(FormatDiagonalBorder::BorderUpDown);
        if let Some(color) = border_color(&border.diagonal) {
            format = format.set_border_diagonal_color(color);
        }
    }

    if let Some(number_format) = number_format {
        format = format.set_num_format(number_format);
    }
    format
}

/// `rrggbb` or CSS `rrggbbaa` hex to an RGB color. Alpha is dropped.
fn parse_color(hex: &str) -> Option<Color> {
    let hex = hex.trim().trim_start_matches('#');
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let rgb = match hex.len() {
        6 | 8 => &hex[..6],
        _ => return None,
    };
    u32::from_str_radix(rgb, 16).ok().map(Color::RGB)
}

fn horizontal_align(value: &str) -> Option<FormatAlign> {
    match value.trim().to_ascii_lowercase().as_str() {
        "left" | "start" => Some(FormatAlign::Left),
        "center" | "centre" => Some(FormatAlign::Center),
        "right" | "end" => Some(FormatAlign::Right),
        "fill" => Some(FormatAlign::Fill),
        "justify" => Some(FormatAlign::Justify),
        "centercontinuous" | "center-across" => Some(FormatAlign::CenterAcross),
        _ => None,
    }
}

fn vertical_align(value: &str) -> Option<FormatAlign> {
    match value.trim().to_ascii_lowercase().as_str() {
        "top" | "text-top" => Some(FormatAlign::Top),
        "middle" | "center" => Some(FormatAlign::VerticalCenter),
        "bottom" | "text-bottom" => Some(FormatAlign::Bottom),
        "justify" => Some(FormatAlign::VerticalJustify),
        "distributed" => Some(FormatAlign::VerticalDistributed),
        _ => None,
    }
}

fn fill_pattern(value: &str) -> FormatPattern {
    match value.trim().to_ascii_lowercase().as_str() {
        "darkgray" => FormatPattern::DarkGray,
        "mediumgray" => FormatPattern::MediumGray,
        "lightgray" => FormatPattern::LightGray,
        "gray125" => FormatPattern::Gray125,
        "gray0625" => FormatPattern::Gray0625,
        "darkhorizontal" => FormatPattern::DarkHorizontal,
        "darkvertical" => FormatPattern::DarkVertical,
        "darkdown" => FormatPattern::DarkDown,
        "darkup" => FormatPattern::DarkUp,
        "darkgrid" => FormatPattern::DarkGrid,
        "darktrellis" => FormatPattern::DarkTrellis,
        "lighthorizontal" => FormatPattern::LightHorizontal,
        "lightvertical" => FormatPattern::LightVertical,
        "lightdown" => FormatPattern::LightDown,
        "lightup" => FormatPattern::LightUp,
        "lightgrid" => FormatPattern::LightGrid,
        "lighttrellis" => FormatPattern::LightTrellis,
        _ => FormatPattern::Solid,
    }
}

fn border_style(side: &BorderSide) -> Option<FormatBorder> {
    let style = side.style.as_deref()?;
    let border = match style.trim().to_ascii_lowercase().as_str() {
        "thin" | "solid" => FormatBorder::Thin,
        "medium" => FormatBorder::Medium,
        "thick" => FormatBorder::Thick,
        "double" => FormatBorder::Double,
        "dashed" => FormatBorder::Dashed,
        "dotted" => FormatBorder::Dotted,
        "hair" => FormatBorder::Hair,
        "mediumdashed" => FormatBorder::MediumDashed,
        "dashdot" => FormatBorder::DashDot,
        "mediumdashdot" => FormatBorder::MediumDashDot,
        "dashdotdot" => FormatBorder::DashDotDot,
        "mediumdashdotdot" => FormatBorder::MediumDashDotDot,
        "slantdashdot" => FormatBorder::SlantDashDot,
        "none" | "hidden" | "" => FormatBorder::None,
        _ => FormatBorder::Thin,
    };
    Some(border)
}

fn border_color(side: &BorderSide) -> Option<Color> {
    side.color.as_deref().and_then(parse_color)
}
