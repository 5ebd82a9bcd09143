//! Retailer layouts and the formatted sheets produced from them

use crate::models::BrandHierarchy;

/// How formatted sheets are packaged into one downloadable artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackagingMode {
    /// One workbook per brand bucket, all zipped together
    Archive,
    /// One workbook with one tab per brand bucket
    Workbook,
}

/// One output column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    /// Key the template fills in `build_row`
    pub key: String,
    /// Text written in the header row
    pub header: String,
    /// Column width in Excel character units
    pub width: f64,
}

impl ColumnSpec {
    pub fn new(key: impl Into<String>, header: impl Into<String>, width: f64) -> Self {
        Self {
            key: key.into(),
            header: header.into(),
            width,
        }
    }

    /// Column whose header is its key
    pub fn keyed(key: &str, width: f64) -> Self {
        Self::new(key, key, width)
    }

    pub fn is_spacer(&self) -> bool {
        self.key.starts_with(SPACER_PREFIX)
    }
}

/// Key prefix of the narrow blank columns between sections
pub const SPACER_PREFIX: &str = "GAP_";

/// A titled group of adjacent columns with a merged title cell
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub title: String,
    /// RGB fill, e.g. 0xBDD7EE
    pub color: u32,
    pub first_col: u16,
    pub last_col: u16,
}

/// Header-row styling
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderStyle {
    pub fill: u32,
    pub font_size: f64,
    pub wrap: bool,
}

/// Merged full-width instruction row above the header
#[derive(Debug, Clone, PartialEq)]
pub struct Banner {
    pub row: u32,
    pub text: String,
    pub fill: u32,
}

/// Static per-chain sheet specification
#[derive(Debug, Clone, PartialEq)]
pub struct RetailerLayout {
    pub chain: String,
    /// Worksheet name in archive mode (workbook mode names tabs by brand)
    pub sheet_name: String,
    pub columns: Vec<ColumnSpec>,
    pub header_row: u32,
    pub data_start_row: u32,
    /// Empty for single-header layouts
    pub sections: Vec<Section>,
    pub header_style: HeaderStyle,
    pub banner: Option<Banner>,
    /// Key of the photo column, if the layout embeds product photos
    pub image_column: Option<String>,
    pub packaging: PackagingMode,
}

/// Pixel footprint of embedded product photos
pub const IMAGE_SIZE_PX: u32 = 240;
/// Row height (points) of rows carrying a photo
pub const IMAGE_ROW_HEIGHT: f64 = 180.0;
/// Width of the photo column
pub const IMAGE_COLUMN_WIDTH: f64 = 35.0;
/// Width of spacer columns between sections
pub const SPACER_WIDTH: f64 = 2.0;

impl RetailerLayout {
    /// Position of a column key
    pub fn column_index(&self, key: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.key == key)
    }

    /// Position of the photo column, if any
    pub fn image_column_index(&self) -> Option<usize> {
        self.image_column
            .as_deref()
            .and_then(|key| self.column_index(key))
    }

    /// Lay out titled column groups left to right with a spacer between groups
    ///
    /// Returns the flattened column list and the computed sections.
    pub fn sectioned(groups: Vec<(&str, u32, Vec<ColumnSpec>)>) -> (Vec<ColumnSpec>, Vec<Section>) {
        let mut columns = Vec::new();
        let mut sections = Vec::new();
        let group_count = groups.len();

        for (idx, (title, color, group)) in groups.into_iter().enumerate() {
            if group.is_empty() {
                continue;
            }
            let first_col = columns.len() as u16;
            let last_col = first_col + group.len() as u16 - 1;
            columns.extend(group);
            sections.push(Section {
                title: title.to_string(),
                color,
                first_col,
                last_col,
            });

            if idx + 1 < group_count {
                columns.push(ColumnSpec::new(
                    format!("{}{}", SPACER_PREFIX, idx),
                    "",
                    SPACER_WIDTH,
                ));
            }
        }

        (columns, sections)
    }
}

/// A single output cell
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    /// Re-encoded PNG thumbnail
    Image { name: String, png: Vec<u8> },
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }

    pub fn empty() -> Self {
        CellValue::Text(String::new())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            CellValue::Image { .. } => None,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, CellValue::Image { .. })
    }
}

impl Default for CellValue {
    fn default() -> Self {
        CellValue::empty()
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

/// Free-form cell written above the header (sheet titles, form fields)
#[derive(Debug, Clone, PartialEq)]
pub struct PreambleCell {
    pub row: u32,
    pub col: u16,
    pub text: String,
    pub bold: bool,
    pub font_size: Option<f64>,
}

impl PreambleCell {
    pub fn plain(row: u32, col: u16, text: impl Into<String>) -> Self {
        Self {
            row,
            col,
            text: text.into(),
            bold: false,
            font_size: None,
        }
    }

    pub fn bold(row: u32, col: u16, text: impl Into<String>) -> Self {
        Self {
            bold: true,
            ..Self::plain(row, col, text)
        }
    }
}

/// One brand bucket, formatted and ready to serialize
#[derive(Debug, Clone)]
pub struct FormattedSheet {
    /// Brand bucket name; also the raw tab name in workbook mode
    pub bucket: String,
    pub hierarchy: BrandHierarchy,
    /// Archive entry name without extension
    pub file_stem: String,
    pub preamble: Vec<PreambleCell>,
    /// Rows in layout column order
    pub rows: Vec<Vec<CellValue>>,
    pub images_found: usize,
}
