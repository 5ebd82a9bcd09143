//! Export packaging
//!
//! Serializes formatted sheets into the single artifact handed back to the
//! caller: a zip of one workbook per brand (archive mode), or one workbook
//! with a tab per brand (workbook mode). Each worksheet is rendered on its
//! own so one bad sheet cannot take the others down.

use rust_xlsxwriter::{
    Color, Format, FormatAlign, FormatBorder, Image, ObjectMovement, Workbook, Worksheet,
    XlsxError,
};
use std::collections::HashSet;
use std::io::{Cursor, Write};
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ExportError;
use crate::models::layout::IMAGE_ROW_HEIGHT;
use crate::models::{CellValue, FormattedSheet, PackagingMode, RetailerLayout};

pub const ZIP_CONTENT_TYPE: &str = "application/zip";
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Excel's worksheet name limit
const MAX_TAB_CHARS: usize = 31;

/// The downloadable result of one export job
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
    /// Archive entry names or workbook tab names, in output order
    pub entries: Vec<String>,
    pub total_items: usize,
    pub images_found: usize,
}

pub struct ExportPackager<'a> {
    layout: &'a RetailerLayout,
}

impl<'a> ExportPackager<'a> {
    pub fn new(layout: &'a RetailerLayout) -> Self {
        Self { layout }
    }

    pub fn package(
        &self,
        sheets: &[FormattedSheet],
        artifact_name: &str,
    ) -> Result<ExportArtifact, ExportError> {
        if sheets.is_empty() {
            return Err(ExportError::NoSheets);
        }

        let artifact = match self.layout.packaging {
            PackagingMode::Archive => self.package_archive(sheets, artifact_name)?,
            PackagingMode::Workbook => self.package_workbook(sheets, artifact_name)?,
        };

        info!(
            filename = %artifact.filename,
            entries = artifact.entries.len(),
            items = artifact.total_items,
            bytes = artifact.bytes.len(),
            "Artifact packaged"
        );
        Ok(artifact)
    }

    fn package_archive(
        &self,
        sheets: &[FormattedSheet],
        artifact_name: &str,
    ) -> Result<ExportArtifact, ExportError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        let mut total_items = 0;
        let mut images_found = 0;

        for sheet in sheets {
            let bytes = match self.single_sheet_workbook(sheet) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(bucket = %sheet.bucket, error = %e, "Worksheet skipped");
                    continue;
                }
            };

            let entry = unique_entry_name(&sheet.file_stem, &mut seen);
            zip.start_file(entry.as_str(), options)
                .map_err(|e| ExportError::Packaging(e.to_string()))?;
            zip.write_all(&bytes)
                .map_err(|e| ExportError::Packaging(e.to_string()))?;
            debug!(entry = %entry, rows = sheet.rows.len(), "Archive entry written");

            total_items += sheet.rows.len();
            images_found += sheet.images_found;
            entries.push(entry);
        }

        if entries.is_empty() {
            return Err(ExportError::NoSheets);
        }

        let bytes = zip
            .finish()
            .map_err(|e| ExportError::Packaging(e.to_string()))?
            .into_inner();

        Ok(ExportArtifact {
            filename: artifact_name.to_string(),
            content_type: ZIP_CONTENT_TYPE,
            bytes,
            entries,
            total_items,
            images_found,
        })
    }

    fn package_workbook(
        &self,
        sheets: &[FormattedSheet],
        artifact_name: &str,
    ) -> Result<ExportArtifact, ExportError> {
        let mut workbook = Workbook::new();

        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        let mut total_items = 0;
        let mut images_found = 0;

        for sheet in sheets {
            let mut worksheet = match render_worksheet(self.layout, sheet) {
                Ok(worksheet) => worksheet,
                Err(e) => {
                    warn!(bucket = %sheet.bucket, error = %e, "Worksheet skipped");
                    continue;
                }
            };

            let tab = unique_tab_name(&sheet.bucket, &mut seen);
            if let Err(e) = worksheet.set_name(&tab) {
                warn!(bucket = %sheet.bucket, tab = %tab, error = %e, "Worksheet skipped");
                continue;
            }
            workbook.push_worksheet(worksheet);

            total_items += sheet.rows.len();
            images_found += sheet.images_found;
            entries.push(tab);
        }

        if entries.is_empty() {
            return Err(ExportError::NoSheets);
        }

        let bytes = workbook
            .save_to_buffer()
            .map_err(|e| ExportError::Packaging(e.to_string()))?;

        Ok(ExportArtifact {
            filename: artifact_name.to_string(),
            content_type: XLSX_CONTENT_TYPE,
            bytes,
            entries,
            total_items,
            images_found,
        })
    }

    fn single_sheet_workbook(&self, sheet: &FormattedSheet) -> Result<Vec<u8>, XlsxError> {
        let mut worksheet = render_worksheet(self.layout, sheet)?;
        worksheet.set_name(&self.layout.sheet_name)?;

        let mut workbook = Workbook::new();
        workbook.push_worksheet(worksheet);
        workbook.save_to_buffer()
    }
}

/// Render one formatted sheet onto a fresh (unnamed) worksheet
pub fn render_worksheet(
    layout: &RetailerLayout,
    sheet: &FormattedSheet,
) -> Result<Worksheet, XlsxError> {
    let mut worksheet = Worksheet::new();
    let last_col = layout.columns.len().saturating_sub(1) as u16;

    if let Some(banner) = &layout.banner {
        let format = Format::new()
            .set_bold()
            .set_background_color(Color::RGB(banner.fill))
            .set_align(FormatAlign::Center);
        write_merged(&mut worksheet, banner.row, 0, last_col, &banner.text, &format)?;
    }

    for cell in &sheet.preamble {
        let mut format = Format::new();
        if cell.bold {
            format = format.set_bold();
        }
        if let Some(size) = cell.font_size {
            format = format.set_font_size(size);
        }
        worksheet.write_string_with_format(cell.row, cell.col, &cell.text, &format)?;
    }

    // Section titles sit directly above the field headers
    if layout.header_row > 0 {
        for section in &layout.sections {
            let format = Format::new()
                .set_bold()
                .set_background_color(Color::RGB(section.color))
                .set_border(FormatBorder::Thin)
                .set_align(FormatAlign::Center);
            write_merged(
                &mut worksheet,
                layout.header_row - 1,
                section.first_col,
                section.last_col,
                &section.title,
                &format,
            )?;
        }
    }

    let mut header_format = Format::new()
        .set_bold()
        .set_border(FormatBorder::Thin)
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_font_size(layout.header_style.font_size);
    if layout.header_style.wrap {
        header_format = header_format.set_text_wrap();
    }

    for (idx, column) in layout.columns.iter().enumerate() {
        let col = idx as u16;
        worksheet.set_column_width(col, column.width)?;
        if column.is_spacer() {
            continue;
        }

        let fill = layout
            .sections
            .iter()
            .find(|s| (s.first_col..=s.last_col).contains(&col))
            .map(|s| s.color)
            .unwrap_or(layout.header_style.fill);
        let format = header_format.clone().set_background_color(Color::RGB(fill));
        worksheet.write_string_with_format(layout.header_row, col, &column.header, &format)?;
    }

    let photo_rows = layout.image_column.is_some();
    for (offset, row) in sheet.rows.iter().enumerate() {
        let row_num = layout.data_start_row + offset as u32;
        if photo_rows {
            worksheet.set_row_height(row_num, IMAGE_ROW_HEIGHT)?;
        }

        for (idx, cell) in row.iter().enumerate() {
            let col = idx as u16;
            match cell {
                CellValue::Text(text) if text.is_empty() => {}
                CellValue::Text(text) => {
                    worksheet.write_string(row_num, col, text)?;
                }
                CellValue::Image { png, .. } => {
                    let image = Image::new_from_buffer(png)?
                        .set_object_movement(ObjectMovement::MoveButDontSizeWithCells);
                    worksheet.insert_image(row_num, col, &image)?;
                }
            }
        }
    }

    Ok(worksheet)
}

/// Merge a horizontal range, or write a single cell when the range is one wide
fn write_merged(
    worksheet: &mut Worksheet,
    row: u32,
    first_col: u16,
    last_col: u16,
    text: &str,
    format: &Format,
) -> Result<(), XlsxError> {
    if last_col > first_col {
        worksheet.merge_range(row, first_col, row, last_col, text, format)?;
    } else {
        worksheet.write_string_with_format(row, first_col, text, format)?;
    }
    Ok(())
}

/// `{stem}.xlsx`, with `_1`, `_2`, … before the extension on collision
///
/// Comparison ignores case so archives extract cleanly on Windows.
pub fn unique_entry_name(stem: &str, seen: &mut HashSet<String>) -> String {
    let stem: String = stem
        .trim()
        .chars()
        .map(|c| if c == '/' || c == '\\' { '-' } else { c })
        .collect();
    let stem = if stem.is_empty() { "sheet".to_string() } else { stem };

    let mut candidate = format!("{}.xlsx", stem);
    let mut n = 1;
    while !seen.insert(candidate.to_lowercase()) {
        candidate = format!("{}_{}.xlsx", stem, n);
        n += 1;
    }
    candidate
}

/// Worksheet-safe tab name for a brand bucket
///
/// Slashes become dashes, `[ ] : * ?` are dropped, leading and trailing
/// apostrophes are trimmed and the result is cut to 31 characters.
pub fn sanitize_tab_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?'))
        .map(|c| if c == '/' || c == '\\' { '-' } else { c })
        .collect();
    let cleaned = cleaned.trim().trim_matches('\'').trim();

    if cleaned.is_empty() {
        "Sheet".to_string()
    } else {
        let truncated: String = cleaned.chars().take(MAX_TAB_CHARS).collect();
        truncated.trim_end().to_string()
    }
}

/// Sanitized tab name, de-duplicated case-insensitively with a numeric suffix
pub fn unique_tab_name(raw: &str, seen: &mut HashSet<String>) -> String {
    let base = sanitize_tab_name(raw);
    let mut candidate = base.clone();
    let mut n = 1;
    while !seen.insert(candidate.to_lowercase()) {
        let suffix = format!("_{}", n);
        let room = MAX_TAB_CHARS - suffix.chars().count();
        let head: String = base.chars().take(room).collect();
        candidate = format!("{}{}", head.trim_end(), suffix);
        n += 1;
    }
    candidate
}
