//! The fixed (tool, extension) → routine table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Client-selectable conversion tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    PdfToExcel,
    ExcelToPdf,
    JpgToExcel,
    ImgConvert,
    PptxToXlsx,
    XlsxToPptx,
}

impl Tool {
    /// Every tool, in the order the upload form lists them.
    pub const ALL: [Tool; 6] = [
        Tool::PdfToExcel,
        Tool::ExcelToPdf,
        Tool::JpgToExcel,
        Tool::ImgConvert,
        Tool::PptxToXlsx,
        Tool::XlsxToPptx,
    ];

    /// Wire identifier, as sent in the `tool` form field.
    pub fn id(&self) -> &'static str {
        match self {
            Tool::PdfToExcel => "pdf_to_excel",
            Tool::ExcelToPdf => "excel_to_pdf",
            Tool::JpgToExcel => "jpg_to_excel",
            Tool::ImgConvert => "img_convert",
            Tool::PptxToXlsx => "pptx_to_xlsx",
            Tool::XlsxToPptx => "xlsx_to_pptx",
        }
    }

    /// Label shown on the upload form.
    pub fn label(&self) -> &'static str {
        match self {
            Tool::PdfToExcel => "PDF → Excel",
            Tool::ExcelToPdf => "Excel → PDF",
            Tool::JpgToExcel => "Image → Excel (OCR)",
            Tool::ImgConvert => "PNG ⇄ JPG",
            Tool::PptxToXlsx => "PowerPoint → Excel",
            Tool::XlsxToPptx => "Excel → PowerPoint",
        }
    }

    /// Extensions this tool accepts.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Tool::PdfToExcel => &["pdf"],
            Tool::ExcelToPdf => &["xls", "xlsx"],
            Tool::JpgToExcel | Tool::ImgConvert => &["jpg", "jpeg", "png"],
            Tool::PptxToXlsx => &["pptx"],
            Tool::XlsxToPptx => &["xlsx"],
        }
    }

    pub fn accepts(&self, ext: &str) -> bool {
        self.extensions().contains(&ext)
    }

    /// The routine this tool runs.
    pub fn routine(&self) -> Routine {
        match self {
            Tool::PdfToExcel => Routine::PdfToSpreadsheet,
            Tool::ExcelToPdf => Routine::SpreadsheetToPdf,
            Tool::JpgToExcel => Routine::ImageToSpreadsheet,
            Tool::ImgConvert => Routine::ImageFormatConvert,
            Tool::PptxToXlsx => Routine::PresentationToSpreadsheet,
            Tool::XlsxToPptx => Routine::SpreadsheetToPresentation,
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Unknown tool identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tool '{0}'")]
pub struct UnknownTool(pub String);

impl FromStr for Tool {
    type Err = UnknownTool;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tool::ALL
            .into_iter()
            .find(|t| t.id() == s)
            .ok_or_else(|| UnknownTool(s.to_string()))
    }
}

/// The six conversion routines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Routine {
    PdfToSpreadsheet,
    SpreadsheetToPdf,
    ImageToSpreadsheet,
    ImageFormatConvert,
    PresentationToSpreadsheet,
    SpreadsheetToPresentation,
}

impl Routine {
    pub fn name(&self) -> &'static str {
        match self {
            Routine::PdfToSpreadsheet => "pdf_to_spreadsheet",
            Routine::SpreadsheetToPdf => "spreadsheet_to_pdf",
            Routine::ImageToSpreadsheet => "image_to_spreadsheet",
            Routine::ImageFormatConvert => "image_format_convert",
            Routine::PresentationToSpreadsheet => "presentation_to_spreadsheet",
            Routine::SpreadsheetToPresentation => "spreadsheet_to_presentation",
        }
    }
}

impl fmt::Display for Routine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Look up the routine for a raw tool identifier and lowercase extension.
///
/// `None` for unknown tools and for extensions the tool does not accept.
pub fn lookup(tool: &str, ext: &str) -> Option<Routine> {
    let tool: Tool = tool.parse().ok()?;
    tool.accepts(ext).then(|| tool.routine())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXTS: &[&str] = &["pdf", "xls", "xlsx", "jpg", "jpeg", "png", "ppt", "pptx", "docx", ""];

    #[test]
    fn table_matches_expected_routines() {
        let expected = [
            ("pdf_to_excel", "pdf", Routine::PdfToSpreadsheet),
            ("excel_to_pdf", "xls", Routine::SpreadsheetToPdf),
            ("excel_to_pdf", "xlsx", Routine::SpreadsheetToPdf),
            ("jpg_to_excel", "jpg", Routine::ImageToSpreadsheet),
            ("jpg_to_excel", "jpeg", Routine::ImageToSpreadsheet),
            ("jpg_to_excel", "png", Routine::ImageToSpreadsheet),
            ("img_convert", "jpg", Routine::ImageFormatConvert),
            ("img_convert", "jpeg", Routine::ImageFormatConvert),
            ("img_convert", "png", Routine::ImageFormatConvert),
            ("pptx_to_xlsx", "pptx", Routine::PresentationToSpreadsheet),
            ("xlsx_to_pptx", "xlsx", Routine::SpreadsheetToPresentation),
        ];
        for (tool, ext, routine) in expected {
            assert_eq!(lookup(tool, ext), Some(routine), "{tool}/{ext}");
        }
    }

    #[test]
    fn every_other_pair_yields_nothing() {
        for tool in Tool::ALL {
            for ext in EXTS {
                let found = lookup(tool.id(), ext);
                assert_eq!(found.is_some(), tool.accepts(ext), "{tool}/{ext}");
            }
        }
        // pptx_to_xlsx deliberately rejects legacy .ppt, xlsx_to_pptx rejects .xls
        assert_eq!(lookup("pptx_to_xlsx", "ppt"), None);
        assert_eq!(lookup("xlsx_to_pptx", "xls"), None);
    }

    #[test]
    fn unknown_tool_yields_nothing() {
        assert_eq!(lookup("docx_to_pdf", "pdf"), None);
        assert_eq!(lookup("", "pdf"), None);
        assert_eq!(lookup("PDF_TO_EXCEL", "pdf"), None);
    }

    #[test]
    fn tool_ids_round_trip() {
        for tool in Tool::ALL {
            assert_eq!(tool.id().parse::<Tool>().unwrap(), tool);
        }
        assert_eq!("nope".parse::<Tool>(), Err(UnknownTool("nope".into())));
    }
}
