//! RDS layout: eight maintenance "pages" side by side
//!
//! Page titles are merged across their columns on row 0, field headers sit on
//! row 1 in the page colour, and a narrow spacer column separates pages.
//! No photo column. One workbook per brand, zipped.

use super::text::{format_price, truncate_chars};
use super::{RetailerTemplate, Row, SheetContext, TemplateError};
use crate::models::{
    attr, CatalogItem, CellValue, ColumnSpec, HeaderStyle, JobContext, PackagingMode,
    RetailerLayout,
};

/// Page title, fill colour, and (key, header) of each field
type Page = (&'static str, u32, &'static [(&'static str, &'static str)]);

/// Keys equal their headers except where a header repeats across pages
const PAGES: [Page; 8] = [
    (
        "PAGE 1 - Item Base Data Maintenance",
        0xBDD7EE,
        &[
            ("SKU Number", "SKU Number"),
            ("SKU Number with check digit", "SKU Number with check digit"),
            ("Sku Number", "Sku Number"),
            ("Item Description", "Item Description"),
            ("Short name", "Short name"),
            ("Item Status", "Item Status"),
            ("Buyer", "Buyer"),
            ("W/SCD 5% DISC", "W/SCD 5% DISC"),
            ("Inventory Grp", "Inventory Grp"),
            ("W/PWD 5% DISC", "W/PWD 5% DISC"),
            ("SKU Type", "SKU Type"),
            ("Merchandiser", "Merchandiser"),
            ("POS Tax Code", "POS Tax Code"),
            ("Primary Vendor", "Primary Vendor"),
            ("Ship Pt", "Ship Pt"),
            ("Manufacturer", "Manufacturer"),
            ("Vendor Part#", "Vendor Part#"),
            ("Manufacturer Part#", "Manufacturer Part#"),
            ("Dept", "Dept"),
            ("Sub-Dept", "Sub-Dept"),
            ("Class-", "Class-"),
            ("Sub-Class", "Sub-Class"),
        ],
    ),
    (
        "PAGE 2 - UPC Maintenance",
        0xE2EFDA,
        &[
            ("Product Code", "Product Code"),
            ("TYPE", "TYPE"),
            ("Primary Buy UPC", "Primary Buy UPC"),
            ("Saleable UPC", "Saleable UPC"),
        ],
    ),
    (
        "PAGE 3 - Item Cost and Price Maintenance",
        0xFFF2CC,
        &[
            ("Competitive Priced", "Competitive Priced"),
            ("Display on Web", "Display on Web"),
            ("Competitive Price", "Competitive Price"),
            ("POS Price Prompt", "POS Price Prompt"),
            ("Original Price", "Original Price"),
            ("Prevent POS Download", "Prevent POS Download"),
            ("Next Regular Retail", "Next Regular Retail"),
            ("Effective", "Effective"),
            ("Current Vendor Cost", "Current Vendor Cost"),
            ("Buying U/M", "Buying U/M"),
            ("Selling U/M", "Selling U/M"),
            ("Standard Pack", "Standard Pack"),
            ("Minimum (Inner) Pack", "Minimum (Inner) Pack"),
        ],
    ),
    (
        "PAGE 4 - Item Code Maintenance",
        0xEAD1DC,
        &[
            ("Coordinate Group", "Coordinate Group"),
            ("Super Brand", "Super Brand"),
            ("Brand_Maint", "Brand"),
            ("Buy Code(C/S)", "Buy Code(C/S)"),
            ("Season", "Season"),
            ("Set Code", "Set Code"),
            ("Mfg. No.", "Mfg. No."),
            ("Age Code", "Age Code"),
            ("Label", "Label"),
            ("Origin", "Origin"),
            ("Tag", "Tag"),
            ("Fair Event", "Fair Event"),
            ("Blank Field", "Blank Field"),
            ("Price Point", "Price Point"),
            ("Merchandise Flag", "Merchandise Flag"),
            ("Hold Wholesale Order", "Hold Wholesale Order"),
            ("Size", "Size"),
            ("Substitute SKU", "Substitute SKU"),
            ("Core SKU", "Core SKU"),
            ("Replacement SKU", "Replacement SKU"),
        ],
    ),
    (
        "PAGE 5 - Item Replenishment Maintenance",
        0xFCE4D6,
        &[
            ("Replenishment Code", "Replenishment Code"),
            ("Sales $ (Blank)", "Sales $ (Blank)"),
            ("Distribution Method", "Distribution Method"),
            ("Sales Units", "Sales Units"),
            ("Rpl Start Date", "Rpl Start Date"),
            ("Gross Margin", "Gross Margin"),
            ("Rpl End Date", "Rpl End Date"),
            ("User Defined", "User Defined"),
            ("Avg. Model Stock", "Avg. Model Stock"),
            ("Avg. Order at", "Avg. Order at"),
            ("Maximum Stock", "Maximum Stock"),
            ("Display Minimum", "Display Minimum"),
            ("Stock in Mult. of", "Stock in Mult. of"),
            ("Minimum Rpl Qty", "Minimum Rpl Qty"),
            ("Item Profile", "Item Profile"),
            ("Hold Order", "Hold Order"),
            ("Plan Lead Time", "Plan Lead Time"),
        ],
    ),
    (
        "PAGE 6 - Physical Dimension Maintenance",
        0xD9E1F2,
        &[
            ("Item Weight", "Item Weight"),
            ("Item Length", "Item Length"),
            ("Width", "Width"),
            ("Height", "Height"),
            ("Item Cube", "Item Cube"),
            ("Pallet Tie", "Pallet Tie"),
            ("Pallet High", "Pallet High"),
            ("Container Type", "Container Type"),
            ("Container Multiple", "Container Multiple"),
        ],
    ),
    (
        "PAGE 7 - Label, Tag, and Ticket Maintenance",
        0xF2F2F2,
        &[
            ("Regular Label Type", "Regular Label Type"),
            ("Ad Label Type", "Ad Label Type"),
            ("Regular Ticket  Type", "Regular Ticket  Type"),
            ("Ad Ticket Type", "Ad Ticket Type"),
            ("Tickets per Item", "Tickets per Item"),
            ("Is Sign Age Required", "Is Sign Age Required"),
        ],
    ),
    (
        "PAGE 8 - Item Descriptions Maintenance",
        0xE7E6E6,
        &[
            ("Commercial Inv Product", "Commercial Inv Product"),
            ("Selling Unit Weight", "Selling Unit Weight"),
            ("Descriptor", "Descriptor"),
            ("Derived Description", "Derived Description"),
            ("12 Character", "12 Character"),
            ("15 Character", "15 Character"),
            ("18 Character", "18 Character"),
            ("21 Character", "21 Character"),
            ("20 Character", "20 Character"),
            ("Shelf Label", "Shelf Label"),
            ("Blank Field_P8", "Blank Field"),
            ("Color", "Color"),
            ("Size_P8", "Size"),
            ("Dimension", "Dimension"),
        ],
    ),
];

/// Fixed values the RDS form expects for every item
const CONSTANTS: [(&str, &str); 30] = [
    ("Item Status", "A"),
    ("Buyer", "B92"),
    ("W/SCD 5% DISC", "N"),
    ("W/PWD 5% DISC", "N"),
    ("POS Tax Code", "V"),
    ("Prevent POS Download", "N"),
    ("Buying U/M", "PCS"),
    ("Selling U/M", "PCS"),
    ("Standard Pack", "-"),
    ("Minimum (Inner) Pack", "-"),
    ("Coordinate Group", "RDS"),
    ("Buy Code(C/S)", "S"),
    ("Season", "NA"),
    ("Set Code", "-"),
    ("Mfg. No.", "-"),
    ("Age Code", "-"),
    ("Label", "-"),
    ("Origin", "-"),
    ("Tag", "-"),
    ("Fair Event", "-"),
    ("Blank Field", "-"),
    ("Merchandise Flag", "-"),
    ("Hold Wholesale Order", "N"),
    ("Replenishment Code", "0"),
    ("Minimum Rpl Qty", "-"),
    ("Hold Order", "N"),
    ("Is Sign Age Required", "N"),
    ("Sales $ (Blank)", ""),
    ("Super Brand", ""),
    ("Blank Field_P8", ""),
];

pub struct RdsTemplate {
    layout: RetailerLayout,
}

impl RdsTemplate {
    pub fn new() -> Self {
        let groups = PAGES
            .iter()
            .map(|(title, color, fields)| {
                let columns = fields
                    .iter()
                    .map(|(key, header)| {
                        let width = if header.contains("Description") { 18.0 } else { 13.0 };
                        ColumnSpec::new(*key, *header, width)
                    })
                    .collect();
                (*title, *color, columns)
            })
            .collect();
        let (columns, sections) = RetailerLayout::sectioned(groups);

        Self {
            layout: RetailerLayout {
                chain: "RDS".to_string(),
                sheet_name: "TEMPLATE".to_string(),
                columns,
                header_row: 1,
                data_start_row: 2,
                sections,
                header_style: HeaderStyle {
                    fill: 0xBDD7EE,
                    font_size: 9.0,
                    wrap: false,
                },
                banner: None,
                image_column: None,
                packaging: PackagingMode::Archive,
            },
        }
    }
}

impl Default for RdsTemplate {
    fn default() -> Self {
        Self::new()
    }
}

impl RetailerTemplate for RdsTemplate {
    fn layout(&self) -> &RetailerLayout {
        &self.layout
    }

    fn build_row(&self, item: &CatalogItem, sheet: &SheetContext<'_>) -> Result<Row, TemplateError> {
        let description = item.get(attr::DESCRIPTION);

        let mut row = Row::new();
        let mut set = |key: &str, value: String| {
            row.insert(key.to_string(), CellValue::Text(value));
        };

        for (key, value) in CONSTANTS {
            set(key, value.to_string());
        }

        set("Item Description", truncate_chars(description, 30));
        set("Short name", truncate_chars(description, 10));
        set("Primary Vendor", sheet.vendor.vendor_code.clone());
        set("Manufacturer Part#", sheet.vendor.mfg_part_no.clone());
        set("Dept", sheet.hierarchy.dept.clone());
        set("Sub-Dept", sheet.hierarchy.sub_dept.clone());
        set("Class-", sheet.hierarchy.class.clone());
        set("Sub-Class", sheet.hierarchy.sub_class.clone());
        set("Original Price", format_price(item.unit_price, false)?);
        set("Brand_Maint", item.get(attr::BRAND).to_string());
        set("Price Point", item.get(attr::PRICE_POINT).to_string());
        set("Size", item.get(attr::SIZE).to_string());
        set("Item Weight", item.get(attr::GROSS_WEIGHT).to_string());
        set("Selling Unit Weight", item.get(attr::NET_WEIGHT).to_string());
        set("Color", item.get(attr::COLOR).to_string());
        set("Size_P8", item.get(attr::SIZE).to_string());

        Ok(row)
    }

    fn entry_stem(&self, sheet: &SheetContext<'_>) -> String {
        format!(
            "RDS {} {} - {}",
            sheet.job.company.code,
            sheet.job.generated_at.format("%m%d%Y"),
            sheet.bucket
        )
    }

    fn artifact_name(&self, job: &JobContext) -> String {
        format!(
            "RDS {} {}.zip",
            job.company.code,
            job.generated_at.format("%m%d%Y")
        )
    }
}
