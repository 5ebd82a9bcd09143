//! SM layout, also the generic default for unregistered chains
//!
//! Flat 19-column sheet, blue header on row 0, one workbook per brand zipped
//! together. Entries are named from the vendor code and hierarchy codes.

use super::text::{delivery_date, format_price, join_words, strip_special, truncate_chars};
use super::{RetailerTemplate, Row, SheetContext, TemplateError};
use crate::models::layout::IMAGE_COLUMN_WIDTH;
use crate::models::{
    attr, CatalogItem, CellValue, ColumnSpec, HeaderStyle, JobContext, PackagingMode,
    RetailerLayout,
};

const DESCRIPTION_LIMIT: usize = 50;
const DIMENSION_PLACEHOLDER: &str = "-";

const DIMENSION_COLUMNS: [&str; 6] = [
    "PACKAGE LENGTH IN CM",
    "PACKAGE WIDTH IN CM",
    "PACKAGE HEIGHT IN CM",
    "PRODUCT LENGTH IN CM",
    "PRODUCT WIDTH IN CM",
    "PRODUCT HEIGHT IN CM",
];

pub struct SmTemplate {
    layout: RetailerLayout,
}

impl SmTemplate {
    pub fn new() -> Self {
        let columns = vec![
            ColumnSpec::keyed("DESCRIPTION", 45.0),
            ColumnSpec::keyed("COLOR", 13.0),
            ColumnSpec::keyed("SIZES", 13.0),
            ColumnSpec::keyed(attr::STYLE, 18.0),
            ColumnSpec::keyed("SOURCE_MARKED", 18.0),
            ColumnSpec::keyed("SRP", 13.0),
            ColumnSpec::keyed(attr::UNIT_OF_MEASURE, 18.0),
            ColumnSpec::keyed("EXP_DEL_MONTH", 18.0),
            ColumnSpec::keyed("REMARKS", 18.0),
            ColumnSpec::keyed("IMAGES", IMAGE_COLUMN_WIDTH),
            ColumnSpec::keyed("ONLINE ITEMS", 18.0),
            ColumnSpec::keyed("PACKAGE LENGTH IN CM", 18.0),
            ColumnSpec::keyed("PACKAGE WIDTH IN CM", 18.0),
            ColumnSpec::keyed("PACKAGE HEIGHT IN CM", 18.0),
            ColumnSpec::keyed("PACKAGE WEIGHT IN KG", 18.0),
            ColumnSpec::keyed("PRODUCT LENGTH IN CM", 18.0),
            ColumnSpec::keyed("PRODUCT WIDTH IN CM", 18.0),
            ColumnSpec::keyed("PRODUCT HEIGHT IN CM", 18.0),
            ColumnSpec::keyed("PRODUCT WEIGHT IN KG", 18.0),
        ];

        Self {
            layout: RetailerLayout {
                chain: "SM".to_string(),
                sheet_name: "Template".to_string(),
                columns,
                header_row: 0,
                data_start_row: 1,
                sections: Vec::new(),
                header_style: HeaderStyle {
                    fill: 0xBDD7EE,
                    font_size: 11.0,
                    wrap: false,
                },
                banner: None,
                image_column: Some("IMAGES".to_string()),
                packaging: PackagingMode::Archive,
            },
        }
    }
}

impl Default for SmTemplate {
    fn default() -> Self {
        Self::new()
    }
}

impl RetailerTemplate for SmTemplate {
    fn layout(&self) -> &RetailerLayout {
        &self.layout
    }

    fn build_row(&self, item: &CatalogItem, sheet: &SheetContext<'_>) -> Result<Row, TemplateError> {
        let description = join_words(&[
            item.get(attr::BRAND),
            item.get(attr::DESCRIPTION),
            item.get(attr::COLOR),
            item.get(attr::SIZE),
            item.get(attr::STYLE),
        ]);
        let delivery = delivery_date(sheet.job.generated_at.date());

        let mut row = Row::new();
        let mut set = |key: &str, value: String| {
            row.insert(key.to_string(), CellValue::Text(value));
        };

        set(
            "DESCRIPTION",
            truncate_chars(&strip_special(&description), DESCRIPTION_LIMIT),
        );
        set("COLOR", item.get(attr::COLOR).to_string());
        set("SIZES", item.get(attr::SIZE).to_string());
        set(attr::STYLE, item.get(attr::STYLE).to_string());
        set("SRP", format_price(item.unit_price, true)?);
        set(attr::UNIT_OF_MEASURE, item.get(attr::UNIT_OF_MEASURE).to_string());
        set("EXP_DEL_MONTH", delivery.format("%m/%d/%Y").to_string());
        set("ONLINE ITEMS", "NO".to_string());
        set("PACKAGE WEIGHT IN KG", item.get(attr::GROSS_WEIGHT).to_string());
        set("PRODUCT WEIGHT IN KG", item.get(attr::NET_WEIGHT).to_string());
        for column in DIMENSION_COLUMNS {
            set(column, DIMENSION_PLACEHOLDER.to_string());
        }

        Ok(row)
    }

    fn entry_stem(&self, sheet: &SheetContext<'_>) -> String {
        format!(
            "SC{}_{}_{}_{}",
            sheet.vendor.vendor_code,
            sheet.hierarchy.dept_code(),
            sheet.hierarchy.class_code(),
            sheet.job.generated_at.format("%m%d%H%M")
        )
    }

    fn artifact_name(&self, job: &JobContext) -> String {
        format!("{}{}.zip", job.chain, job.generated_at.format("%m%d%Y"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BrandHierarchy, CompanyProfile, VendorMapping};
    use crate::services::formatter::project;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn job(chain: &str) -> JobContext {
        JobContext {
            job_id: Uuid::new_v4(),
            chain: chain.to_string(),
            company: CompanyProfile::lookup("NIC").unwrap(),
            sales_code: "S1".to_string(),
            price_memo: "M1".to_string(),
            generated_at: NaiveDate::from_ymd_opt(2024, 1, 31)
                .unwrap()
                .and_hms_opt(9, 5, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_nineteen_columns_with_images() {
        let template = SmTemplate::new();
        let layout = template.layout();
        assert_eq!(layout.columns.len(), 19);
        assert_eq!(layout.image_column_index(), Some(9));
        assert_eq!(layout.packaging, PackagingMode::Archive);
    }

    #[test]
    fn test_row_values() {
        let template = SmTemplate::new();
        let job = job("SM");
        let vendor = VendorMapping::default();
        let hierarchy = BrandHierarchy::placeholder();
        let sheet = SheetContext {
            job: &job,
            vendor: &vendor,
            bucket: "CASIO",
            hierarchy: &hierarchy,
        };
        let item = CatalogItem::new("W100", 1234.5)
            .with(attr::BRAND, "CASIO")
            .with(attr::DESCRIPTION, "G-Shock (Digital)")
            .with(attr::COLOR, "Black")
            .with(attr::GROSS_WEIGHT, "0.4");

        let row = project(template.layout(), template.build_row(&item, &sheet).unwrap());
        let text = |idx: usize| row[idx].as_text().unwrap_or_default().to_string();

        assert_eq!(text(0), "CASIO GShock Digital Black");
        assert_eq!(text(2), "");
        assert_eq!(text(5), "1,234.50");
        assert_eq!(text(7), "02/29/2024");
        assert_eq!(text(10), "NO");
        assert_eq!(text(11), "-");
        assert_eq!(text(14), "0.4");
    }

    #[test]
    fn test_names() {
        let template = SmTemplate::new();
        let job = job("LANDMARK");
        let vendor = VendorMapping {
            vendor_code: "123456".to_string(),
            mfg_part_no: String::new(),
        };
        let hierarchy = BrandHierarchy::placeholder();
        let sheet = SheetContext {
            job: &job,
            vendor: &vendor,
            bucket: "CASIO",
            hierarchy: &hierarchy,
        };

        assert_eq!(template.entry_stem(&sheet), "SC123456_000000_000000_01310905");
        assert_eq!(template.artifact_name(&job), "LANDMARK01312024.zip");
    }
}
