//! Spreadsheet I/O.
//!
//! Reading goes through calamine (xls and xlsx), writing through
//! rust_xlsxwriter (xlsx only). In between, a sheet is just its name and a
//! grid of display strings.

use crate::error::RoutineError;
use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::{DocProperties, ExcelDateTime, Workbook};
use std::path::Path;
use tracing::debug;

/// Excel's per-cell string limit.
const MAX_CELL_CHARS: usize = 32_767;

/// A sheet read from a workbook: rows of cell display strings.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetTable {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

/// A cell to write.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

/// A sheet to write.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSheet {
    pub name: String,
    pub rows: Vec<Vec<CellValue>>,
}

impl OutputSheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
        }
    }

    pub fn push_row<I, C>(&mut self, cells: I)
    where
        I: IntoIterator<Item = C>,
        C: Into<CellValue>,
    {
        self.rows.push(cells.into_iter().map(Into::into).collect());
    }
}

/// Read every sheet of an xls/xlsx workbook, in workbook order.
pub fn read_sheets(path: &Path) -> Result<Vec<SheetTable>, RoutineError> {
    let mut workbook = open_workbook_auto(path)?;
    let names = workbook.sheet_names().to_vec();
    let mut sheets = Vec::with_capacity(names.len());

    for name in names {
        let range = workbook.worksheet_range(&name)?;
        let rows: Vec<Vec<String>> = range
            .rows()
            .map(|row| row.iter().map(cell_text).collect())
            .collect();
        debug!("Sheet '{}': {} rows", name, rows.len());
        sheets.push(SheetTable { name, rows });
    }

    Ok(sheets)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

/// Write `sheets` to a new xlsx file at `path`.
///
/// The document timestamp is fixed, so the same sheets always give the
/// same bytes.
pub fn write_workbook(path: &Path, sheets: &[OutputSheet]) -> Result<(), RoutineError> {
    let mut workbook = Workbook::new();
    let created = ExcelDateTime::from_ymd(2000, 1, 1)?;
    workbook.set_properties(&DocProperties::new().set_creation_datetime(&created));

    for sheet in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&sheet.name)?;
        for (r, row) in sheet.rows.iter().enumerate() {
            let r = u32::try_from(r)
                .map_err(|_| RoutineError::Spreadsheet("too many rows".into()))?;
            for (c, cell) in row.iter().enumerate() {
                let c = u16::try_from(c)
                    .map_err(|_| RoutineError::Spreadsheet("too many columns".into()))?;
                match cell {
                    CellValue::Text(s) if s.is_empty() => {}
                    CellValue::Text(s) => {
                        worksheet.write_string(r, c, clip_chars(s, MAX_CELL_CHARS))?;
                    }
                    CellValue::Number(n) => {
                        worksheet.write_number(r, c, *n)?;
                    }
                }
            }
        }
    }

    workbook.save(path)?;
    Ok(())
}

/// The first `max` characters of `s` (not bytes).
pub fn clip_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Render a sheet as a fixed-width text table.
///
/// Columns are right-aligned to their widest cell and separated by two
/// spaces; ragged rows are padded. Trailing spaces are trimmed.
pub fn render_text_table(rows: &[Vec<String>]) -> String {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0usize; columns];
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let mut out = String::new();
    for row in rows {
        let mut line = String::new();
        for (i, width) in widths.iter().enumerate() {
            if i > 0 {
                line.push_str("  ");
            }
            let cell = row.get(i).map(String::as_str).unwrap_or("");
            line.push_str(&format!("{:>width$}", cell, width = *width));
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// All sheets as text, each preceded by its name.
pub fn render_sheets_text(sheets: &[SheetTable]) -> String {
    sheets
        .iter()
        .map(|s| format!("{}\n{}", s.name, render_text_table(&s.rows)))
        .collect::<Vec<_>>()
        .join("\n")
}
