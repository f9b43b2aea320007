//! Table extraction from positioned PDF text.
//!
//! pdfium reports each page's text as segments with bounding boxes. A table
//! is recognised the way a reader spots one: several consecutive lines that
//! split into the same number (≥ 2) of horizontally aligned cells.
//!
//! ```text
//! fragments ──▶ lines (shared baseline) ──▶ cells (split at wide gaps)
//!           ──▶ runs of ≥ 2 lines with equal, aligned cell columns ──▶ tables
//! ```
//!
//! The grouping works on plain [`TextFragment`]s so it is testable without a
//! pdfium library.

use crate::error::RoutineError;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::debug;

/// One extracted table: rows of cell strings.
pub type Table = Vec<Vec<String>>;

/// A run of text with its bounding box, in PDF points (y grows upward).
#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
    pub text: String,
}

impl TextFragment {
    fn height(&self) -> f32 {
        (self.top - self.bottom).abs().max(1.0)
    }

    fn center_y(&self) -> f32 {
        (self.top + self.bottom) / 2.0
    }
}

/// A cell: merged fragments and their horizontal extent.
#[derive(Debug, Clone)]
struct Cell {
    left: f32,
    right: f32,
    text: String,
}

#[derive(Debug, Clone)]
struct Line {
    center_y: f32,
    height: f32,
    cells: Vec<Cell>,
}

/// Minimum rows for a run of aligned lines to count as a table.
const MIN_TABLE_ROWS: usize = 2;

/// Gap (in multiples of text height) that separates two cells on a line.
const CELL_GAP_FACTOR: f32 = 1.2;

/// Vertical gap (in multiples of line height) that ends a table.
const ROW_GAP_FACTOR: f32 = 2.5;

/// Horizontal slack when comparing column extents, in points.
const ALIGN_TOLERANCE: f32 = 4.0;

/// Find every table on one page, top to bottom.
pub fn detect_tables(fragments: &[TextFragment]) -> Vec<Table> {
    let lines = group_lines(fragments);
    let mut tables = Vec::new();
    let mut run: Vec<&Line> = Vec::new();

    for line in &lines {
        let continues = run.last().is_some_and(|prev| rows_align(prev, line));
        if !continues {
            flush_run(&mut run, &mut tables);
        }
        if line.cells.len() >= 2 {
            run.push(line);
        }
    }
    flush_run(&mut run, &mut tables);
    tables
}

fn flush_run(run: &mut Vec<&Line>, tables: &mut Vec<Table>) {
    if run.len() >= MIN_TABLE_ROWS {
        tables.push(
            run.iter()
                .map(|line| line.cells.iter().map(|c| c.text.clone()).collect())
                .collect(),
        );
    }
    run.clear();
}

/// Group fragments sharing a baseline into lines, each split into cells.
fn group_lines(fragments: &[TextFragment]) -> Vec<Line> {
    let mut sorted: Vec<&TextFragment> = fragments
        .iter()
        .filter(|f| !f.text.trim().is_empty())
        .collect();
    // Top of page first, then left to right.
    sorted.sort_by(|a, b| {
        b.center_y()
            .total_cmp(&a.center_y())
            .then(a.left.total_cmp(&b.left))
    });

    let mut rows: Vec<Vec<&TextFragment>> = Vec::new();
    for frag in sorted {
        match rows.last_mut() {
            Some(row)
                if (row[0].center_y() - frag.center_y()).abs()
                    <= row[0].height().min(frag.height()) / 2.0 =>
            {
                row.push(frag)
            }
            _ => rows.push(vec![frag]),
        }
    }

    rows.into_iter()
        .map(|mut row| {
            row.sort_by(|a, b| a.left.total_cmp(&b.left));
            let height = row.iter().map(|f| f.height()).fold(0.0, f32::max);
            let center_y = row[0].center_y();
            let mut cells: Vec<Cell> = Vec::new();
            for frag in row {
                match cells.last_mut() {
                    Some(cell) if frag.left - cell.right < height * CELL_GAP_FACTOR => {
                        cell.text.push(' ');
                        cell.text.push_str(frag.text.trim());
                        cell.right = cell.right.max(frag.right);
                    }
                    _ => cells.push(Cell {
                        left: frag.left,
                        right: frag.right,
                        text: frag.text.trim().to_string(),
                    }),
                }
            }
            Line {
                center_y,
                height,
                cells,
            }
        })
        .collect()
}

/// True if `next` continues the table whose last row is `prev`.
fn rows_align(prev: &Line, next: &Line) -> bool {
    if prev.cells.len() != next.cells.len() || next.cells.len() < 2 {
        return false;
    }
    let gap = prev.center_y - next.center_y;
    if gap > prev.height.max(next.height) * ROW_GAP_FACTOR {
        return false;
    }
    prev.cells.iter().zip(&next.cells).all(|(a, b)| {
        a.left <= b.right + ALIGN_TOLERANCE && b.left <= a.right + ALIGN_TOLERANCE
    })
}

/// Extract every table of every page, in page order then top to bottom.
pub fn extract_tables_blocking(
    pdfium: &Pdfium,
    pdf_path: &Path,
) -> Result<Vec<Table>, RoutineError> {
    let document = super::render::load_document(pdfium, pdf_path)?;
    let mut tables = Vec::new();

    for (idx, page) in document.pages().iter().enumerate() {
        let fragments = page_fragments(&page)
            .map_err(|e| RoutineError::TableExtraction(format!("page {}: {}", idx + 1, e)))?;
        let found = detect_tables(&fragments);
        debug!(
            "Page {}: {} text fragments, {} tables",
            idx + 1,
            fragments.len(),
            found.len()
        );
        tables.extend(found);
    }

    Ok(tables)
}

fn page_fragments(page: &PdfPage) -> Result<Vec<TextFragment>, String> {
    let text = page.text().map_err(|e| format!("{:?}", e))?;
    let mut fragments = Vec::new();
    for segment in text.segments().iter() {
        let content = segment.text();
        if content.trim().is_empty() {
            continue;
        }
        let bounds = segment.bounds();
        fragments.push(TextFragment {
            left: bounds.left().value,
            right: bounds.right().value,
            top: bounds.top().value,
            bottom: bounds.bottom().value,
            text: content,
        });
    }
    Ok(fragments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(left: f32, width: f32, baseline: f32, text: &str) -> TextFragment {
        TextFragment {
            left,
            right: left + width,
            top: baseline + 10.0,
            bottom: baseline,
            text: text.to_string(),
        }
    }

    fn grid(rows: &[(f32, [&str; 3])]) -> Vec<TextFragment> {
        rows.iter()
            .flat_map(|(y, cells)| {
                cells
                    .iter()
                    .enumerate()
                    .map(move |(i, t)| frag(50.0 + i as f32 * 150.0, 60.0, *y, t))
            })
            .collect()
    }

    #[test]
    fn aligned_rows_form_one_table() {
        let fragments = grid(&[
            (700.0, ["Item", "Qty", "Price"]),
            (685.0, ["Apple", "3", "1.20"]),
            (670.0, ["Pear", "5", "0.80"]),
        ]);
        let tables = detect_tables(&fragments);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].len(), 3);
        assert_eq!(tables[0][0], vec!["Item", "Qty", "Price"]);
        assert_eq!(tables[0][2], vec!["Pear", "5", "0.80"]);
    }

    #[test]
    fn prose_is_not_a_table() {
        // Words of one sentence sit close together and merge into one cell.
        let fragments = vec![
            frag(50.0, 30.0, 700.0, "The"),
            frag(84.0, 40.0, 700.0, "quick"),
            frag(128.0, 40.0, 700.0, "brown"),
            frag(50.0, 30.0, 685.0, "fox"),
            frag(84.0, 40.0, 685.0, "jumps"),
        ];
        assert!(detect_tables(&fragments).is_empty());
    }

    #[test]
    fn single_aligned_row_is_not_a_table() {
        let fragments = grid(&[(700.0, ["a", "b", "c"])]);
        assert!(detect_tables(&fragments).is_empty());
    }

    #[test]
    fn large_vertical_gap_splits_tables() {
        let fragments = grid(&[
            (700.0, ["a", "b", "c"]),
            (685.0, ["d", "e", "f"]),
            (400.0, ["g", "h", "i"]),
            (385.0, ["j", "k", "l"]),
        ]);
        let tables = detect_tables(&fragments);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[1][0], vec!["g", "h", "i"]);
    }

    #[test]
    fn column_count_change_splits_tables() {
        let mut fragments = grid(&[(700.0, ["a", "b", "c"]), (685.0, ["d", "e", "f"])]);
        fragments.push(frag(50.0, 60.0, 670.0, "x"));
        fragments.push(frag(350.0, 60.0, 670.0, "y"));
        fragments.push(frag(50.0, 60.0, 655.0, "z"));
        fragments.push(frag(350.0, 60.0, 655.0, "w"));
        let tables = detect_tables(&fragments);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[1], vec![vec!["x", "y"], vec!["z", "w"]]);
    }

    #[test]
    fn fragment_order_does_not_matter() {
        let mut fragments = grid(&[(700.0, ["1", "2", "3"]), (685.0, ["4", "5", "6"])]);
        fragments.reverse();
        let tables = detect_tables(&fragments);
        assert_eq!(tables, vec![vec![vec!["1", "2", "3"], vec!["4", "5", "6"]]]);
    }
}
