//! Sheet → HTML rendering and the external HTML-to-PDF engine.

use crate::error::RoutineError;
use crate::pipeline::workbook::SheetTable;
use quick_xml::escape::escape;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Render every sheet as `<h2>name</h2>` followed by a table whose first
/// row is the header, concatenated in sheet order.
pub fn sheets_to_html(sheets: &[SheetTable]) -> String {
    let mut body = String::new();
    for sheet in sheets {
        body.push_str(&format!("<h2>{}</h2>\n", escape(&sheet.name)));
        body.push_str("<table border=\"1\">\n");
        let mut rows = sheet.rows.iter();
        if let Some(header) = rows.next() {
            body.push_str("<thead><tr>");
            for cell in header {
                body.push_str(&format!("<th>{}</th>", escape(cell)));
            }
            body.push_str("</tr></thead>\n");
        }
        body.push_str("<tbody>\n");
        for row in rows {
            body.push_str("<tr>");
            for cell in row {
                body.push_str(&format!("<td>{}</td>", escape(cell)));
            }
            body.push_str("</tr>\n");
        }
        body.push_str("</tbody>\n</table>\n");
    }

    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">\
         <style>table{{border-collapse:collapse}}td,th{{padding:2px 6px}}</style>\
         </head><body>\n{body}</body></html>\n"
    )
}

/// Render `html` to `out` with the `wkhtmltopdf`-compatible `binary`.
///
/// The HTML is staged next to `out` and removed afterwards. The child is
/// killed if this future is dropped.
pub async fn render_pdf(binary: &Path, html: &str, out: &Path) -> Result<(), RoutineError> {
    let dir = out
        .parent()
        .ok_or_else(|| RoutineError::Renderer(format!("no parent for {}", out.display())))?;
    let mut staged = tempfile::Builder::new()
        .prefix("sheets-")
        .suffix(".html")
        .tempfile_in(dir)
        .map_err(|e| RoutineError::io(dir, e))?;
    staged
        .write_all(html.as_bytes())
        .map_err(|e| RoutineError::io(staged.path(), e))?;

    debug!("Running {} → {}", binary.display(), out.display());
    let output = tokio::process::Command::new(binary)
        .arg("--quiet")
        .arg("--encoding")
        .arg("utf-8")
        .arg(staged.path())
        .arg(out)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| RoutineError::Renderer(format!("{}: {e}", binary.display())))?;

    if !output.status.success() {
        return Err(RoutineError::Renderer(format!(
            "exit {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    if !out.is_file() {
        return Err(RoutineError::Renderer("no PDF was written".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_row_becomes_header() {
        let sheets = vec![SheetTable {
            name: "Q1".into(),
            rows: vec![
                vec!["region".into(), "total".into()],
                vec!["north".into(), "<5".into()],
            ],
        }];
        let html = sheets_to_html(&sheets);
        assert!(html.contains("<h2>Q1</h2>"));
        assert!(html.contains("<th>region</th><th>total</th>"));
        assert!(html.contains("<td>north</td><td>&lt;5</td>"));
    }

    #[test]
    fn sheets_appear_in_order() {
        let sheets = vec![
            SheetTable { name: "B".into(), rows: vec![] },
            SheetTable { name: "A".into(), rows: vec![] },
        ];
        let html = sheets_to_html(&sheets);
        let b = html.find("<h2>B</h2>").unwrap();
        let a = html.find("<h2>A</h2>").unwrap();
        assert!(b < a);
    }

    #[tokio::test]
    async fn missing_renderer_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = render_pdf(
            Path::new("/definitely/not/wkhtmltopdf"),
            "<html></html>",
            &dir.path().join("out.pdf"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RoutineError::Renderer(_)), "got {err:?}");
    }
}
