//! RUSTANS layout: NPIS form, one workbook with a tab per brand

use super::text::{format_price, join_words, truncate_chars};
use super::{RetailerTemplate, Row, SheetContext, TemplateError};
use crate::models::layout::IMAGE_COLUMN_WIDTH;
use crate::models::{
    attr, Banner, CatalogItem, CellValue, ColumnSpec, HeaderStyle, JobContext, PackagingMode,
    PreambleCell, RetailerLayout,
};

const MEDIUM_DESCRIPTION: &str = "PRODUCT MEDIUM DESCRIPTION (CHAR. LIMIT = 30)";
const SHORT_DESCRIPTION: &str = "PRODUCT SHORT DESCRIPTION (CHAR. LIMIT = 10)";
const LONG_DESCRIPTION: &str = "PRODUCT LONG DESCRIPTION (CHAR. LIMIT = 50)";

const BANNER_TEXT: &str = "ALL HIGHLIGHTED COLUMNS IN CHART ARE TO BE FILLED UP BY CONCESSIONAIRE";

/// Column headers in sheet order
const COLUMNS: [&str; 36] = [
    "RCC SKU",
    "IMAGE",
    "VENDOR ITEM CODE",
    MEDIUM_DESCRIPTION,
    SHORT_DESCRIPTION,
    LONG_DESCRIPTION,
    "VENDOR CODE",
    "BRAND CODE",
    "RETAIL PRICE",
    "DEPARTMENT",
    "SUBDEPARTMENT",
    "CLASS",
    "SUB CLASS",
    "MERCHANDISER",
    "BUYER",
    "SEASON CODE",
    "THEME",
    "COLLECTION",
    attr::COLOR,
    "SIZE RUN",
    attr::SIZE,
    "SET / PC",
    "MAKATI",
    "SHANG",
    "ATC",
    "GW",
    "CEBU",
    "SOLENAD",
    "E-COMM (FOR PO)",
    "TOTAL",
    "TOTAL RETAIL VALUE",
    "SIZE SPECIFICATIONS",
    "PRODUCT & CARE DETAILS",
    "MATERIAL",
    "LINK TO HI-RES IMAGE",
    attr::GENDER,
];

fn column_width(header: &str) -> f64 {
    if header == "IMAGE" {
        IMAGE_COLUMN_WIDTH
    } else if header.contains("DESCRIPTION") {
        40.0
    } else if header == "RCC SKU" {
        15.0
    } else if header.contains("Size")
        || header.contains("Color")
        || header.contains("PRICE")
        || header == "SIZE RUN"
    {
        12.0
    } else {
        18.0
    }
}

pub struct RustansTemplate {
    layout: RetailerLayout,
}

impl RustansTemplate {
    pub fn new() -> Self {
        let columns = COLUMNS
            .iter()
            .map(|header| ColumnSpec::keyed(header, column_width(header)))
            .collect();

        Self {
            layout: RetailerLayout {
                chain: "RUSTANS".to_string(),
                sheet_name: "Rustans Template".to_string(),
                columns,
                header_row: 11,
                data_start_row: 12,
                sections: Vec::new(),
                header_style: HeaderStyle {
                    fill: 0xF2F2F2,
                    font_size: 9.0,
                    wrap: true,
                },
                banner: Some(Banner {
                    row: 10,
                    text: BANNER_TEXT.to_string(),
                    fill: 0xFFFF00,
                }),
                image_column: Some("IMAGE".to_string()),
                packaging: PackagingMode::Workbook,
            },
        }
    }
}

impl Default for RustansTemplate {
    fn default() -> Self {
        Self::new()
    }
}

impl RetailerTemplate for RustansTemplate {
    fn layout(&self) -> &RetailerLayout {
        &self.layout
    }

    fn build_row(&self, item: &CatalogItem, sheet: &SheetContext<'_>) -> Result<Row, TemplateError> {
        let description = join_words(&[
            item.get(attr::DESCRIPTION),
            item.get(attr::COLOR),
            item.get(attr::STYLE),
            item.get(attr::BRAND),
        ]);

        let mut row = Row::new();
        let mut set = |key: &str, value: String| {
            row.insert(key.to_string(), CellValue::Text(value));
        };

        set("VENDOR ITEM CODE", item.item_no.clone());
        set(MEDIUM_DESCRIPTION, truncate_chars(&description, 30));
        set(SHORT_DESCRIPTION, truncate_chars(item.get(attr::DESCRIPTION), 10));
        set(LONG_DESCRIPTION, truncate_chars(&description, 50));
        set("VENDOR CODE", sheet.vendor.vendor_code.clone());
        set("RETAIL PRICE", format_price(item.unit_price, false)?);
        set("DEPARTMENT", sheet.hierarchy.dept.clone());
        set("SUBDEPARTMENT", sheet.hierarchy.sub_dept.clone());
        set("CLASS", sheet.hierarchy.class.clone());
        set("SUB CLASS", sheet.hierarchy.sub_class.clone());
        set(attr::COLOR, item.get(attr::COLOR).to_string());
        set(attr::SIZE, item.get(attr::SIZE).to_string());
        set(attr::GENDER, item.get(attr::GENDER).to_string());

        Ok(row)
    }

    fn preamble(&self, sheet: &SheetContext<'_>) -> Vec<PreambleCell> {
        let mut title = PreambleCell::bold(0, 0, "RUSTAN COMMERCIAL CORPORATION");
        title.font_size = Some(11.0);

        vec![
            title,
            PreambleCell::bold(1, 0, "CONCESSIONAIRE MANAGEMENT DIVISION"),
            PreambleCell::bold(2, 0, "NEW PRODUCT INFORMATION SHEET (NPIS)"),
            PreambleCell::bold(4, 0, "DATE:"),
            PreambleCell::plain(4, 1, sheet.job.generated_at.format("%Y-%m-%d").to_string()),
            PreambleCell::bold(4, 5, "TARGET DELIVERY TO STORES:"),
            PreambleCell::bold(5, 0, "DIVISION:"),
            PreambleCell::bold(5, 5, "DELIVERY TO E-COMMERCE WAREHOUSE:"),
            PreambleCell::bold(6, 0, "COMPANY NAME:"),
            PreambleCell::plain(6, 1, sheet.job.company.code),
            PreambleCell::bold(7, 0, "BRAND:"),
            PreambleCell::plain(7, 1, sheet.bucket),
        ]
    }

    fn entry_stem(&self, sheet: &SheetContext<'_>) -> String {
        format!(
            "RUSTANS {} {} - {}",
            sheet.job.generated_at.format("%m%d%Y"),
            sheet.job.company.code,
            sheet.bucket
        )
    }

    fn artifact_name(&self, job: &JobContext) -> String {
        format!(
            "RUSTANS {} {}.xlsx",
            job.generated_at.format("%m%d%Y"),
            job.company.code
        )
    }
}
